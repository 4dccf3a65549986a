//! mural watch — follow a stream and load new posts on request.
//!
//! Connects to the stream socket, feeds open/frame/close events into the
//! controller, and reconnects with a fixed delay when the connection
//! drops. User intent arrives as lines on stdin.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use mural_core::{Catalog, ContentId, Controller, MediaKey, Outbound};
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::render::TermPane;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Send half handed to the controller; frames drain to the socket task.
struct ChannelOutbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound for ChannelOutbound {
    fn send(&mut self, frame: String) {
        // Dropped silently when the socket task is gone.
        let _ = self.tx.send(frame);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UserCmd {
    Load,
    Click(MediaKey),
    Quit,
    Noop,
}

pub async fn run_watch(server: &str, stream: &str) -> Result<()> {
    let ws_url = stream_socket_url(server, stream)?;
    tracing::info!("following stream at {}", ws_url);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let view = TermPane::new(Catalog::new());
    let mut controller = Controller::new(view, ChannelOutbound { tx: out_tx });

    // One stdin reader for the whole run; EOF turns into a quit.
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<UserCmd>();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if cmd_tx.send(parse_cmd(&line)).is_err() {
                return;
            }
        }
        let _ = cmd_tx.send(UserCmd::Quit);
    });

    loop {
        match connect_async(ws_url.as_str()).await {
            Ok((socket, _)) => {
                tracing::info!("stream socket open");
                controller.handle_open();
                let quit = session(socket, &mut controller, &mut cmd_rx, &mut out_rx).await;
                controller.handle_close();
                tracing::info!("stream socket closed");
                if quit {
                    return Ok(());
                }
            }
            Err(err) => {
                tracing::warn!(
                    "connect failed: {err}, retrying in {}s",
                    RECONNECT_DELAY.as_secs()
                );
            }
        }

        // Frames queued against the dead socket are stale; discard them.
        while out_rx.try_recv().is_ok() {}

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            cmd = cmd_rx.recv() => {
                if matches!(cmd, Some(UserCmd::Quit) | None) {
                    return Ok(());
                }
            }
        }
    }
}

/// One connected session. Returns true when the user asked to quit.
async fn session(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    controller: &mut Controller<TermPane, ChannelOutbound>,
    cmd_rx: &mut mpsc::UnboundedReceiver<UserCmd>,
    out_rx: &mut mpsc::UnboundedReceiver<String>,
) -> bool {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            Some(cmd) = cmd_rx.recv() => match cmd {
                UserCmd::Load => controller.request_content(),
                UserCmd::Click(key) => {
                    controller.view_mut().click(&key);
                }
                UserCmd::Quit => {
                    let _ = write.send(Message::Close(None)).await;
                    return true;
                }
                UserCmd::Noop => {}
            },

            Some(frame) = out_rx.recv() => {
                if let Err(err) = write.send(Message::Text(frame.into())).await {
                    tracing::warn!("send failed: {err}");
                    return false;
                }
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(raw))) => {
                    if let Err(err) = controller.handle_frame(raw.as_str()) {
                        tracing::warn!("dropping malformed frame: {err}");
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!("socket error: {err}");
                    return false;
                }
            },
        }
    }
}

/// Stream socket address for a server base URL: the secure socket scheme
/// follows the secure page scheme.
fn stream_socket_url(server: &str, stream: &str) -> Result<String> {
    let base =
        url::Url::parse(server).with_context(|| format!("invalid server url: {server}"))?;
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => anyhow::bail!("unsupported server url scheme: {other}"),
    };
    let host = base.host_str().context("server url has no host")?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!("{scheme}://{authority}/ch/streams/{stream}/"))
}

/// Stdin command language: empty line or `load` fetches buffered posts,
/// `show`/`hide` click a cover by post id (and optional image index),
/// `q` quits.
fn parse_cmd(line: &str) -> UserCmd {
    let mut words = line.split_whitespace();
    match words.next() {
        None | Some("load") | Some("l") => UserCmd::Load,
        Some("q") | Some("quit") => UserCmd::Quit,
        Some(verb @ ("show" | "hide")) => match words.next().map(parse_media_key) {
            Some(key) => UserCmd::Click(key),
            None => {
                eprintln!("usage: {verb} <post-id>[.<image-index>]");
                UserCmd::Noop
            }
        },
        Some(other) => {
            eprintln!("unknown command: {other} (try: load, show, hide, q)");
            UserCmd::Noop
        }
    }
}

/// `<post-id>` or `<post-id>.<image-index>`; the index defaults to 0.
fn parse_media_key(raw: &str) -> MediaKey {
    if let Some((id, index)) = raw.rsplit_once('.') {
        if let Ok(index) = index.parse::<usize>() {
            let content: ContentId = id.parse().unwrap_or(ContentId::Text(id.to_string()));
            return MediaKey::new(content, index);
        }
    }
    let content: ContentId = raw.parse().unwrap_or(ContentId::Text(raw.to_string()));
    MediaKey::new(content, 0)
}
