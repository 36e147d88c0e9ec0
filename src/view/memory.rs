//! In-Memory View
//!
//! A page held in memory: a fixed set of elements and inputs, plus a log of
//! every prompt shown. The CLI prints renders and prompts as they happen.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{View, ViewContent};

/// Page state kept in memory
pub struct MemoryView {
    /// Declared elements and their current content
    elements: RwLock<HashMap<String, Option<ViewContent>>>,
    /// Declared inputs and their current values
    inputs: RwLock<HashMap<String, String>>,
    prompts: RwLock<Vec<String>>,
    echo: bool,
}

impl MemoryView {
    /// Page that has the given elements and no inputs
    pub fn with_elements<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elements: RwLock::new(elements.into_iter().map(|e| (e.into(), None)).collect()),
            inputs: RwLock::new(HashMap::new()),
            prompts: RwLock::new(Vec::new()),
            echo: false,
        }
    }

    /// Print renders and prompts to stdout as they happen
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Declare an input element with an initial value
    pub async fn add_input(&self, element: impl Into<String>, value: impl Into<String>) {
        self.inputs.write().await.insert(element.into(), value.into());
    }

    /// Change the value of a declared input; ignored if the page lacks it
    pub async fn set_input(&self, element: &str, value: impl Into<String>) -> bool {
        match self.inputs.write().await.get_mut(element) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Current content of an element
    pub async fn content(&self, element: &str) -> Option<ViewContent> {
        self.elements.read().await.get(element).cloned().flatten()
    }

    /// Text of an element, markup included
    pub async fn text(&self, element: &str) -> Option<String> {
        self.content(element).await.map(|c| c.as_str().to_string())
    }

    /// Every prompt shown so far, oldest first
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

#[async_trait]
impl View for MemoryView {
    async fn render(&self, element: &str, content: ViewContent) -> bool {
        let mut elements = self.elements.write().await;
        let Some(slot) = elements.get_mut(element) else {
            return false;
        };

        if self.echo {
            println!("[{}] {}", element, content.as_str());
        }
        *slot = Some(content);
        true
    }

    async fn input_value(&self, element: &str) -> Option<String> {
        self.inputs.read().await.get(element).cloned()
    }

    async fn prompt(&self, message: &str) {
        if self.echo {
            println!(">> {}", message);
        }
        self.prompts.write().await.push(message.to_string());
    }
}
