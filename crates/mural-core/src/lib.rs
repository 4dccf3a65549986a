//! Mural Core Library
//!
//! Stream controller, wire protocol, and grid view model shared by the
//! mural client, the dev server, and the tests. Everything here is
//! synchronous and deterministic; the binary owns all I/O.

pub mod controller;
pub mod grid;
pub mod i18n;
pub mod markup;
pub mod protocol;
pub mod shield;
pub mod types;

// Re-export controller types
pub use controller::{Controller, Outbound};

// Re-export grid types
pub use grid::{
    Cover, CoverAction, CountingLayout, Fragment, GridPane, LayoutEngine, MediaRef, StreamView,
    SENSITIVE_CLASS,
};

// Re-export i18n types
pub use i18n::{Catalog, MSG_HIDE_SENSITIVE, MSG_SHOW_SENSITIVE};

// Re-export protocol types
pub use protocol::{ClientRequest, ProtocolError, StreamEvent};

// Re-export shield types
pub use shield::{MediaKey, ShieldRegistry, ShieldState};

// Re-export core types
pub use types::{ConnectionState, ContentId, ContentItem};
