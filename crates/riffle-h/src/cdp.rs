use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    pub network: NetworkWatch,
    user_data_dir: Option<PathBuf>,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(
        headless: bool,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut config_builder = BrowserConfig::builder();
        config_builder = config_builder.no_sandbox(); // Often needed in docker/CI/restricted envs
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir()?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        // Cross-origin page images would otherwise taint the canvases we
        // snapshot, making toDataURL throw.
        config_builder = config_builder.arg("--disable-web-security");

        if headless {
            tracing::info!("Launching browser in headless mode");
        } else {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        }

        // Support custom Chrome path via CHROME_BIN environment variable
        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            tracing::info!("Using custom Chrome binary: {}", chrome_bin);
            config_builder = config_builder.chrome_executable(chrome_bin);
        }

        let (browser, mut handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        // Spawn handler loop
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::error!("Browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            tracing::info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;

        // Surface in-page console output in our logs.
        let mut console_events = page
            .event_listener::<chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled>()
            .await
            .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = console_events.next().await {
                let args_str: Vec<String> = event
                    .args
                    .iter()
                    .map(|arg| {
                        arg.description
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string())
                    })
                    .collect();
                tracing::debug!(
                    "Browser Console [{:?}]: {}",
                    event.r#type,
                    args_str.join(" ")
                );
            }
        });

        let network = NetworkWatch::attach(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            page,
            network,
            user_data_dir: Some(user_data_dir),
            cleanup_user_data_dir,
        })
    }

    pub async fn close(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;

        if self.cleanup_user_data_dir {
            if let Some(dir) = &self.user_data_dir {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    tracing::debug!("Failed to clean up user-data-dir {}: {}", dir.display(), e);
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
struct NetworkState {
    inflight: HashSet<String>,
    last_change: Instant,
}

/// Tracks outstanding document requests via CDP network events so callers
/// can wait for a continuous idle window.
#[derive(Clone)]
pub struct NetworkWatch {
    state: Arc<Mutex<NetworkState>>,
}

impl NetworkWatch {
    async fn attach(page: &Page) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let state = Arc::new(Mutex::new(NetworkState {
            inflight: HashSet::new(),
            last_change: Instant::now(),
        }));

        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| format!("Failed to subscribe to request events: {}", e))?;
        let on_start = state.clone();
        tokio::spawn(async move {
            while let Some(event) = started.next().await {
                if let Ok(mut state) = on_start.lock() {
                    state.inflight.insert(event.request_id.inner().clone());
                    state.last_change = Instant::now();
                }
            }
        });

        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| format!("Failed to subscribe to loading-finished events: {}", e))?;
        let on_finish = state.clone();
        tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                if let Ok(mut state) = on_finish.lock() {
                    state.inflight.remove(event.request_id.inner());
                    state.last_change = Instant::now();
                }
            }
        });

        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| format!("Failed to subscribe to loading-failed events: {}", e))?;
        let on_fail = state.clone();
        tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                if let Ok(mut state) = on_fail.lock() {
                    state.inflight.remove(event.request_id.inner());
                    state.last_change = Instant::now();
                }
            }
        });

        Ok(Self { state })
    }

    /// Waits until no request has been outstanding and nothing has changed
    /// for `idle_ms` continuously. Returns false once `budget_ms` elapses
    /// without the window ever holding.
    pub async fn wait_idle(&self, idle_ms: u64, budget_ms: u64) -> bool {
        let idle = Duration::from_millis(idle_ms);
        let deadline = Instant::now() + Duration::from_millis(budget_ms);
        loop {
            if let Ok(state) = self.state.lock() {
                if state.inflight.is_empty() && state.last_change.elapsed() >= idle {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn resolve_user_data_dir() -> Result<(PathBuf, bool), Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(dir) = std::env::var("RIFFLE_USER_DATA_DIR") {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)?;
        tracing::info!(
            "Using user data dir from RIFFLE_USER_DATA_DIR: {}",
            path.display()
        );
        return Ok((path, false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("riffle-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::info!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
