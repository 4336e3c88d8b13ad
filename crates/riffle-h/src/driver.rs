use crate::cdp::CdpClient;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use riffle_core::driver::{DriverError, NavigationResult, PageDriver};
use riffle_core::resolve::js_string;
use std::time::{Duration, Instant};
use tracing::info;

const SELECTOR_POLL_MS: u64 = 100;

/// `PageDriver` backed by a launched Chromium instance over CDP.
pub struct CdpDriver {
    client: Option<CdpClient>,
    headless: bool,
}

impl CdpDriver {
    pub fn new(headless: bool) -> Self {
        Self {
            client: None,
            headless,
        }
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching Chromium session...");
        let client = CdpClient::launch(self.headless)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        let client = self.client.as_mut().ok_or(DriverError::NotReady)?;

        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        let title = client
            .page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let current_url = client
            .page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            url: current_url,
            title,
        })
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        budget_ms: u64,
    ) -> Result<(), DriverError> {
        let client = self.client.as_mut().ok_or(DriverError::NotReady)?;
        let probe = format!("document.querySelector({}) !== null", js_string(selector));
        let deadline = Instant::now() + Duration::from_millis(budget_ms);

        loop {
            let present: bool = client
                .page
                .evaluate(probe.as_str())
                .await
                .map_err(|e| DriverError::Evaluation(e.to_string()))?
                .into_value()
                .map_err(|e| DriverError::Evaluation(e.to_string()))?;
            if present {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!("selector {}", selector)));
            }
            tokio::time::sleep(Duration::from_millis(SELECTOR_POLL_MS)).await;
        }
    }

    async fn wait_for_network_idle(
        &mut self,
        idle_ms: u64,
        budget_ms: u64,
    ) -> Result<(), DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        if client.network.wait_idle(idle_ms, budget_ms).await {
            Ok(())
        } else {
            Err(DriverError::Timeout(format!(
                "network idle window of {}ms",
                idle_ms
            )))
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        let client = self.client.as_mut().ok_or(DriverError::NotReady)?;
        let element = client
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Other(format!("click failed: {}", e)))?;
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, DriverError> {
        let client = self.client.as_mut().ok_or(DriverError::NotReady)?;
        client
            .page
            .evaluate(expression)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn fetch_resource(&mut self, url: &str) -> Result<Vec<u8>, DriverError> {
        let client = self.client.as_mut().ok_or(DriverError::NotReady)?;

        // Session-scoped locators (blob: URLs) only resolve inside the
        // document that minted them, so the fetch runs in-page and the body
        // comes back base64-encoded.
        let expression = format!(
            "(async () => {{ \
               const resp = await fetch({url}); \
               if (!resp.ok) throw new Error('fetch failed with status ' + resp.status); \
               const bytes = new Uint8Array(await resp.arrayBuffer()); \
               let out = ''; \
               const chunk = 0x8000; \
               for (let i = 0; i < bytes.length; i += chunk) {{ \
                 out += String.fromCharCode.apply(null, bytes.subarray(i, i + chunk)); \
               }} \
               return btoa(out); \
             }})()",
            url = js_string(url)
        );

        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| DriverError::Other(format!("failed to build evaluate params: {}", e)))?;

        let encoded: String = client
            .page
            .evaluate(params)
            .await
            .map_err(|e| DriverError::Fetch(e.to_string()))?
            .into_value()
            .map_err(|e| DriverError::Fetch(e.to_string()))?;

        STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Fetch(format!("response was not valid base64: {}", e)))
    }
}
