//! WebSocket Message Types
//!
//! Defines all message types exchanged between browsers showing the
//! dashboard and the server.

use serde::{Deserialize, Serialize};

use crate::view::ViewContent;

/// Topic prefix for page element updates
pub const VIEW_TOPIC_PREFIX: &str = "view.";
/// Topic for every page element at once
pub const VIEW_ALL_TOPIC: &str = "view.*";
pub const PROMPTS_TOPIC: &str = "prompts";
pub const SYSTEM_TOPIC: &str = "system";

/// Topic carrying updates for one element
pub fn view_topic(element: &str) -> String {
    format!("{}{}", VIEW_TOPIC_PREFIX, element)
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics (e.g., "view.*", "view.main-balance", "prompts")
    Subscribe { topics: Vec<String> },
    /// Unsubscribe from topics
    Unsubscribe { topics: Vec<String> },
    /// Ping for keepalive
    Ping,
    /// The user typed into a form input
    Input { element: String, value: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// Subscription confirmed
    Subscribed { topics: Vec<String> },
    /// Unsubscription confirmed
    Unsubscribed { topics: Vec<String> },
    /// New content for a page element
    Render {
        element: String,
        content: String,
        /// Whether `content` is markup (inner HTML) or plain text
        markup: bool,
    },
    /// Modal notice for the user
    Prompt { message: String },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    pub fn render(element: &str, content: &ViewContent) -> Self {
        ServerMessage::Render {
            element: element.to_string(),
            content: content.as_str().to_string(),
            markup: content.is_markup(),
        }
    }
}

/// Event routed through the hub to the subscribers of a topic
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    /// Element content changed
    pub fn render(element: &str, content: &ViewContent) -> Self {
        Self {
            topic: view_topic(element),
            message: ServerMessage::render(element, content),
        }
    }

    /// Prompt shown to the user
    pub fn prompt(message: &str) -> Self {
        Self {
            topic: PROMPTS_TOPIC.to_string(),
            message: ServerMessage::Prompt {
                message: message.to_string(),
            },
        }
    }

    /// Server-side condition browsers should know about (e.g. watch ended)
    pub fn system(message: &str) -> Self {
        Self {
            topic: SYSTEM_TOPIC.to_string(),
            message: ServerMessage::Error {
                message: message.to_string(),
            },
        }
    }
}
