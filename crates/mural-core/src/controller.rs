//! Stream connection controller.
//!
//! Owns the pending-id buffer and translates socket events into view
//! mutations. One method runs to completion per event; all timing lives in
//! the transport layer.

use crate::grid::{Fragment, StreamView};
use crate::protocol::{ClientRequest, ProtocolError, StreamEvent};
use crate::types::{ConnectionState, ContentId, ContentItem};

/// Send half of the connection, injected so tests can record frames.
pub trait Outbound {
    /// Best-effort: the transport may drop the frame if the socket is gone.
    fn send(&mut self, frame: String);
}

pub struct Controller<V, O> {
    pending: Vec<ContentId>,
    state: ConnectionState,
    view: V,
    outbound: O,
}

impl<V: StreamView, O: Outbound> Controller<V, O> {
    pub fn new(view: V, outbound: O) -> Self {
        Controller {
            pending: Vec::new(),
            state: ConnectionState::Connecting,
            view,
            outbound,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Announced-but-unfetched ids, in announcement order.
    pub fn pending(&self) -> &[ContentId] {
        &self.pending
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Socket (re)opened. A stale non-empty buffer from a previous session
    /// re-shows the affordance; see the reopen note in DESIGN.md.
    pub fn handle_open(&mut self) {
        self.state = ConnectionState::Open;
        if !self.pending.is_empty() {
            self.view.show_new_label();
        }
    }

    /// Socket closed. Hides the affordance and disarms `request_content`,
    /// so nothing can be sent while disconnected.
    pub fn handle_close(&mut self) {
        self.state = ConnectionState::Closed;
        self.view.hide_new_label();
    }

    /// One inbound text frame. A malformed frame is surfaced to the caller
    /// and leaves the buffer untouched.
    pub fn handle_frame(&mut self, raw: &str) -> Result<(), ProtocolError> {
        match StreamEvent::parse(raw)? {
            StreamEvent::New { id } => self.handle_new(id),
            StreamEvent::Content { contents } => self.handle_content(contents),
        }
        Ok(())
    }

    fn handle_new(&mut self, id: ContentId) {
        if self.pending.contains(&id) {
            // Duplicate announcement.
            return;
        }
        self.pending.push(id);
        self.view.update_new_count(self.pending.len());
        self.view.show_new_label();
    }

    fn handle_content(&mut self, contents: Vec<ContentItem>) {
        let mut delivered = Vec::with_capacity(contents.len());
        let mut batch = Vec::with_capacity(contents.len());
        for item in contents {
            delivered.push(item.id.clone());
            batch.push(Fragment::from_item(item));
        }

        self.pending.retain(|id| !delivered.contains(id));
        if self.pending.is_empty() {
            self.view.hide_new_label();
        }
        // The label settles before any content lands in the grid.
        self.view.update_new_count(self.pending.len());
        self.view.insert_batch(batch);
    }

    /// User asked for the buffered content. Armed only while the connection
    /// is open; otherwise a click has nowhere to go and does nothing.
    pub fn request_content(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }
        let request = ClientRequest::LoadContent {
            ids: self.pending.clone(),
        };
        self.outbound.send(request.encode());
        self.view.scroll_to_top();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ViewCall {
        ShowLabel,
        HideLabel,
        Count(usize),
        Insert(Vec<ContentId>),
        ScrollTop,
    }

    #[derive(Default)]
    struct RecordingView {
        calls: Vec<ViewCall>,
    }

    impl StreamView for RecordingView {
        fn show_new_label(&mut self) {
            self.calls.push(ViewCall::ShowLabel);
        }

        fn hide_new_label(&mut self) {
            self.calls.push(ViewCall::HideLabel);
        }

        fn update_new_count(&mut self, count: usize) {
            self.calls.push(ViewCall::Count(count));
        }

        fn insert_batch(&mut self, batch: Vec<Fragment>) {
            self.calls
                .push(ViewCall::Insert(batch.into_iter().map(|f| f.id).collect()));
        }

        fn scroll_to_top(&mut self) {
            self.calls.push(ViewCall::ScrollTop);
        }
    }

    #[derive(Clone, Default)]
    struct SharedOutbound {
        frames: Rc<RefCell<Vec<String>>>,
    }

    impl Outbound for SharedOutbound {
        fn send(&mut self, frame: String) {
            self.frames.borrow_mut().push(frame);
        }
    }

    fn controller() -> (Controller<RecordingView, SharedOutbound>, SharedOutbound) {
        let outbound = SharedOutbound::default();
        (
            Controller::new(RecordingView::default(), outbound.clone()),
            outbound,
        )
    }

    #[test]
    fn test_new_announcements_are_idempotent() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();

        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();
        ctrl.handle_frame(r#"{"event": "new", "id": 2}"#).unwrap();

        assert_eq!(
            ctrl.pending(),
            &[ContentId::Number(1), ContentId::Number(2)]
        );
        // The duplicate produced no view traffic at all.
        assert_eq!(
            ctrl.view().calls,
            vec![
                ViewCall::Count(1),
                ViewCall::ShowLabel,
                ViewCall::Count(2),
                ViewCall::ShowLabel,
            ]
        );
    }

    #[test]
    fn test_content_removes_exactly_delivered_ids() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();
        for id in 1..=3 {
            ctrl.handle_frame(&format!(r#"{{"event": "new", "id": {id}}}"#))
                .unwrap();
        }

        ctrl.handle_frame(
            r#"{"event": "content", "contents": [{"id": 2, "rendered": "<p>b</p>"}]}"#,
        )
        .unwrap();

        // Survivor order is preserved.
        assert_eq!(
            ctrl.pending(),
            &[ContentId::Number(1), ContentId::Number(3)]
        );
        let tail = &ctrl.view().calls[ctrl.view().calls.len() - 2..];
        assert_eq!(
            tail,
            &[
                ViewCall::Count(2),
                ViewCall::Insert(vec![ContentId::Number(2)]),
            ]
        );
    }

    #[test]
    fn test_label_settles_before_insertion() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();

        ctrl.handle_frame(
            r#"{"event": "content", "contents": [{"id": 1, "rendered": "<p>x</p>"}]}"#,
        )
        .unwrap();

        let calls = &ctrl.view().calls;
        let insert_at = calls
            .iter()
            .position(|c| matches!(c, ViewCall::Insert(_)))
            .unwrap();
        let hide_at = calls.iter().position(|c| *c == ViewCall::HideLabel).unwrap();
        let count_at = calls
            .iter()
            .rposition(|c| matches!(c, ViewCall::Count(_)))
            .unwrap();
        assert!(hide_at < insert_at);
        assert!(count_at < insert_at);
        assert_eq!(calls[count_at], ViewCall::Count(0));
    }

    #[test]
    fn test_unannounced_content_still_renders() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();

        ctrl.handle_frame(
            r#"{"event": "content", "contents": [{"id": 9, "rendered": "<p>y</p>"}]}"#,
        )
        .unwrap();

        assert!(ctrl.pending().is_empty());
        assert!(ctrl
            .view()
            .calls
            .contains(&ViewCall::Insert(vec![ContentId::Number(9)])));
    }

    #[test]
    fn test_request_content_sends_buffer_and_scrolls() {
        let (mut ctrl, outbound) = controller();
        ctrl.handle_open();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();
        ctrl.handle_frame(r#"{"event": "new", "id": 2}"#).unwrap();

        ctrl.request_content();

        let frames = outbound.frames.borrow();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], r#"{"action":"load_content","ids":[1,2]}"#);
        assert_eq!(ctrl.view().calls.last(), Some(&ViewCall::ScrollTop));
    }

    #[test]
    fn test_request_content_disarmed_unless_open() {
        let (mut ctrl, outbound) = controller();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();

        // Still connecting.
        ctrl.request_content();
        assert!(outbound.frames.borrow().is_empty());

        ctrl.handle_open();
        ctrl.handle_close();
        ctrl.request_content();
        assert!(outbound.frames.borrow().is_empty());
    }

    #[test]
    fn test_close_hides_label_and_reopen_shows_stale_buffer() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();

        ctrl.handle_close();
        assert_eq!(ctrl.view().calls.last(), Some(&ViewCall::HideLabel));
        assert_eq!(ctrl.state(), ConnectionState::Closed);

        // Reopen with the stale buffer: the label comes straight back.
        ctrl.handle_open();
        assert_eq!(ctrl.view().calls.last(), Some(&ViewCall::ShowLabel));
        assert_eq!(ctrl.pending(), &[ContentId::Number(1)]);
    }

    #[test]
    fn test_reopen_with_empty_buffer_stays_quiet() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();
        assert!(ctrl.view().calls.is_empty());
    }

    #[test]
    fn test_malformed_frame_leaves_buffer_untouched() {
        let (mut ctrl, _) = controller();
        ctrl.handle_open();
        ctrl.handle_frame(r#"{"event": "new", "id": 1}"#).unwrap();

        assert!(ctrl.handle_frame("{broken").is_err());
        assert!(ctrl.handle_frame(r#"{"event": "reticulate"}"#).is_err());

        assert_eq!(ctrl.pending(), &[ContentId::Number(1)]);
    }
}
