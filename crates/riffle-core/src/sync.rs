use crate::driver::{DriverError, PageDriver};
use crate::error::ScrapeError;
use tracing::info;

/// Bounding budget for each ready condition. The idle window itself is
/// configured per run; this caps how long we wait for either condition to
/// ever hold, so a dead page fails instead of hanging the run.
pub const DEFAULT_READY_BUDGET_MS: u64 = 30_000;

/// Blocks until the host's ready signal holds: at least one element matching
/// `selector` exists in the document AND the document's network has been idle
/// for `idle_ms` continuously. Both conditions must complete before scraping
/// starts; each is bounded by `budget_ms`.
pub async fn wait_ready(
    driver: &mut dyn PageDriver,
    selector: &str,
    idle_ms: u64,
    budget_ms: u64,
) -> Result<(), ScrapeError> {
    info!("Waiting for page elements to load...");
    driver
        .wait_for_selector(selector, budget_ms)
        .await
        .map_err(timeout_or_driver)?;
    info!("-> Page image elements detected.");

    driver
        .wait_for_network_idle(idle_ms, budget_ms)
        .await
        .map_err(timeout_or_driver)?;
    info!("-> Network idle window reached.");
    Ok(())
}

fn timeout_or_driver(err: DriverError) -> ScrapeError {
    match err {
        DriverError::Timeout(what) => ScrapeError::LoadTimeout(what),
        other => ScrapeError::Driver(other),
    }
}
