//! Live View
//!
//! The dashboard page as the server sees it. Element contents and input
//! values live here; every render and prompt is also pushed to connected
//! browsers through the hub.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::hub::ConnectionHub;
use super::messages::{ServerMessage, WsEvent, VIEW_ALL_TOPIC, VIEW_TOPIC_PREFIX};
use crate::view::{View, ViewContent};

/// Server-side page mirrored to browsers
pub struct LiveView {
    hub: Arc<ConnectionHub>,
    /// Declared elements and their current content
    elements: RwLock<BTreeMap<String, Option<ViewContent>>>,
    /// Declared inputs and their current values
    inputs: RwLock<HashMap<String, String>>,
}

impl LiveView {
    pub fn new<E, I>(hub: Arc<ConnectionHub>, elements: E, inputs: I) -> Self
    where
        E: IntoIterator<Item = String>,
        I: IntoIterator<Item = String>,
    {
        Self {
            hub,
            elements: RwLock::new(elements.into_iter().map(|e| (e, None)).collect()),
            inputs: RwLock::new(inputs.into_iter().map(|i| (i, String::new())).collect()),
        }
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Current contents of every declared element that has been rendered
    pub async fn snapshot(&self) -> BTreeMap<String, ViewContent> {
        self.elements
            .read()
            .await
            .iter()
            .filter_map(|(element, content)| content.clone().map(|c| (element.clone(), c)))
            .collect()
    }

    /// Set a form input from the browser; `false` when the page has no such input
    pub async fn set_input(&self, element: &str, value: impl Into<String>) -> bool {
        match self.inputs.write().await.get_mut(element) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => {
                tracing::debug!(element = %element, "Input for undeclared element ignored");
                false
            }
        }
    }

    /// Render messages that bring a new subscriber of `topics` up to date
    pub async fn replay(&self, topics: &[String]) -> Vec<ServerMessage> {
        let all = topics.iter().any(|t| t == VIEW_ALL_TOPIC);

        self.snapshot()
            .await
            .iter()
            .filter(|(element, _)| {
                all || topics.iter().any(|t| {
                    t.strip_prefix(VIEW_TOPIC_PREFIX) == Some(element.as_str())
                })
            })
            .map(|(element, content)| ServerMessage::render(element, content))
            .collect()
    }
}

#[async_trait]
impl View for LiveView {
    async fn render(&self, element: &str, content: ViewContent) -> bool {
        let event = {
            let mut elements = self.elements.write().await;
            let Some(slot) = elements.get_mut(element) else {
                return false;
            };
            let event = WsEvent::render(element, &content);
            *slot = Some(content);
            event
        };

        self.hub.publish(&event).await;
        true
    }

    async fn input_value(&self, element: &str) -> Option<String> {
        self.inputs.read().await.get(element).cloned()
    }

    async fn prompt(&self, message: &str) {
        let reached = self.hub.publish(&WsEvent::prompt(message)).await;
        tracing::info!(message = %message, browsers = reached, "Prompt shown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::HubConfig;
    use tokio::sync::mpsc;

    fn live_view() -> LiveView {
        LiveView::new(
            Arc::new(ConnectionHub::new(HubConfig::default())),
            vec!["main-balance".to_string(), "ingresos-totales".to_string()],
            vec!["hija-nombre".to_string(), "hija-id".to_string()],
        )
    }

    #[tokio::test]
    async fn test_render_keeps_state_and_publishes() {
        let view = live_view();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = view.hub().register(tx).await.unwrap();
        view.hub()
            .subscribe(&id, vec!["view.*".to_string()])
            .await
            .unwrap();

        assert!(
            view.render("main-balance", ViewContent::Markup("150 FC".to_string()))
                .await
        );
        assert!(!view.render("sidebar", ViewContent::Text("x".to_string())).await);

        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["main-balance"].as_str(), "150 FC");

        match rx.try_recv() {
            Ok(ServerMessage::Render {
                element, markup, ..
            }) => {
                assert_eq!(element, "main-balance");
                assert!(markup);
            }
            other => panic!("Expected Render, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replay_filters_by_topic() {
        let view = live_view();
        view.render("main-balance", ViewContent::Text("1 FC".to_string()))
            .await;
        view.render("ingresos-totales", ViewContent::Text("$1.00 MXN".to_string()))
            .await;

        assert_eq!(view.replay(&["view.*".to_string()]).await.len(), 2);
        assert_eq!(
            view.replay(&["view.ingresos-totales".to_string()])
                .await
                .len(),
            1
        );
        assert!(view.replay(&["prompts".to_string()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_inputs() {
        let view = live_view();

        assert_eq!(view.input_value("hija-nombre").await.as_deref(), Some(""));
        assert!(view.set_input("hija-nombre", "Ana").await);
        assert!(!view.set_input("unknown", "x").await);
        assert_eq!(view.input_value("hija-nombre").await.as_deref(), Some("Ana"));
        assert!(view.input_value("unknown").await.is_none());
    }
}
