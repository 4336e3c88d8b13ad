use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
    #[error("No element matches selector: {0}")]
    ElementNotFound(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Resource fetch failed: {0}")]
    Fetch(String),
    #[error("Not ready")]
    NotReady,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Other: {0}")]
    Other(String),
}

/// The automation seam every resolution strategy runs through: one live
/// document session that can be navigated, waited on, clicked and evaluated.
/// Implementations own the underlying browser session exclusively.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Launch the underlying session (start browser, open document context).
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Close the session and release every resource it holds.
    async fn close(&mut self) -> Result<(), DriverError>;

    /// Navigate the document context to a URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError>;

    /// Block until at least one element matches `selector`, bounded by
    /// `budget_ms`. A blown budget is `DriverError::Timeout`.
    async fn wait_for_selector(&mut self, selector: &str, budget_ms: u64)
        -> Result<(), DriverError>;

    /// Block until the document's network has been idle for `idle_ms`
    /// continuously, bounded by `budget_ms`.
    async fn wait_for_network_idle(
        &mut self,
        idle_ms: u64,
        budget_ms: u64,
    ) -> Result<(), DriverError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Evaluate an expression inside the document and return its value as
    /// plain data.
    async fn evaluate(&mut self, expression: &str) -> Result<Value, DriverError>;

    /// Fetch a resource through the document session (required for
    /// session-scoped locators such as blob: URLs) and return its bytes.
    async fn fetch_resource(&mut self, url: &str) -> Result<Vec<u8>, DriverError>;
}
