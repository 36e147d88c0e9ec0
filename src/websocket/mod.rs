//! WebSocket Live Dashboard
//!
//! Mirrors the dashboard page to browsers in real time.
//!
//! ## Architecture
//!
//! - **LiveView**: the server-side page; renders and prompts are published
//! - **ConnectionHub**: manages connections and topic subscriptions
//! - **Handler**: WebSocket upgrade and message processing
//! - **Messages**: client and server message formats
//!
//! ## Topics
//!
//! - `view.*` - every page element
//! - `view.{element}` - one element (e.g., `view.main-balance`)
//! - `prompts` - notices shown to the user
//! - `system` - server events
//!
//! Subscribing to a view topic replays the element's current content.
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: ['view.*', 'prompts']}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'render') {
//!     const el = document.getElementById(msg.element);
//!     if (el) msg.markup ? (el.innerHTML = msg.content) : (el.innerText = msg.content);
//!   }
//! };
//! ```

mod handler;
mod hub;
mod live_view;
mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHub, HubConfig, HubError};
pub use live_view::LiveView;
pub use messages::{view_topic, ClientMessage, ServerMessage, WsEvent};
