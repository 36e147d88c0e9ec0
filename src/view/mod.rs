//! Dashboard View
//!
//! The page the watcher and creator write into. A view exposes elements by
//! id; writing to an element the page does not have is silently ignored.
//!
//! - [`MemoryView`]: in-process page used by tests and the CLI
//! - [`crate::websocket::LiveView`]: page mirrored to browsers over WebSocket

mod format;
mod memory;

pub use format::{balance_markup, balance_text, revenue_text};
pub use memory::MemoryView;

use async_trait::async_trait;
use serde::Serialize;

/// Content written into a page element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ViewContent {
    /// Plain text (the element's text content)
    Text(String),
    /// Simple markup (the element's inner HTML)
    Markup(String),
}

impl ViewContent {
    pub fn as_str(&self) -> &str {
        match self {
            ViewContent::Text(s) | ViewContent::Markup(s) => s,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, ViewContent::Markup(_))
    }
}

/// A page with addressable elements
#[async_trait]
pub trait View: Send + Sync {
    /// Write content into an element. Returns `false` when the page has no
    /// such element; that is not an error.
    async fn render(&self, element: &str, content: ViewContent) -> bool;

    /// Current value of an input element, if the page has it
    async fn input_value(&self, element: &str) -> Option<String>;

    /// Show a modal-style notice to the user
    async fn prompt(&self, message: &str);
}
