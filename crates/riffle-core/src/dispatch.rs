use crate::adapter::{Registry, Resolution};
use crate::driver::PageDriver;
use crate::error::ScrapeError;
use crate::model::{RunResult, Session};
use crate::resolve;
use crate::sync::{self, DEFAULT_READY_BUDGET_MS};
use tracing::info;

/// Runs one full resolution pass: adapter lookup, navigation, ready wait,
/// strategy execution. Returns the numbered descriptor sequence for the
/// caller to persist.
///
/// Lookup happens before any driver call, so an unsupported host leaves the
/// session untouched.
pub async fn dispatch(
    driver: &mut dyn PageDriver,
    session: &Session,
    registry: &Registry,
) -> Result<RunResult, ScrapeError> {
    let adapter = registry
        .lookup(&session.host)
        .ok_or_else(|| ScrapeError::UnsupportedSite(session.host.clone()))?;
    info!("Site hostname: {}", session.host);

    let nav = driver.navigate(&session.target_url).await?;
    info!("-> Page reached: {}", nav.url);

    sync::wait_ready(
        driver,
        &adapter.ready_selector,
        session.idle_ms,
        DEFAULT_READY_BUDGET_MS,
    )
    .await?;
    info!("Page elements loaded, proceeding with scraping...");

    let run = match &adapter.resolution {
        Resolution::Static { container_selector } => {
            RunResult::from_remote(resolve::resolve_static(driver, container_selector).await?)
        }
        Resolution::Convergence {
            forward_selector,
            max_cycles,
        } => RunResult::from_encoded(
            resolve::resolve_convergent(driver, forward_selector, *max_cycles).await?,
        ),
    };
    info!("Resolved {} pages", run.len());
    Ok(run)
}
