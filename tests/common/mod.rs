#![allow(dead_code)]

use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub fn mural_bin() -> &'static str {
    env!("CARGO_BIN_EXE_mural")
}

pub fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("127.0.0.1:{port}")
}

pub fn spawn_server(addr: &str) -> Child {
    Command::new(mural_bin())
        .args(["serve", "--listen", addr, "--log-level", "warn"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn mural serve")
}

pub fn wait_for_server(addr: &str, child: &mut Child) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("server failed to start before deadline");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Publish a post through the real binary.
pub fn post_item(addr: &str, stream: &str, text: &str) -> Output {
    Command::new(mural_bin())
        .args([
            "post",
            "--server",
            &format!("http://{addr}"),
            "--log-level",
            "warn",
            stream,
            text,
        ])
        .output()
        .expect("run mural post")
}

pub fn assert_ok(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} failed\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
