use crate::driver::DriverError;
use thiserror::Error;

/// Every failure a run can surface. All of them propagate unmodified to the
/// single top-level handler; nothing is retried or swallowed along the way.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),
    #[error("\"{0}\" is not a recognized host for scraping")]
    UnsupportedSite(String),
    #[error("Page never became ready: {0}")]
    LoadTimeout(String),
    #[error("No image reference found in container #{index}")]
    Extraction { index: usize },
    #[error("Malformed data URL: {0}")]
    MalformedPayload(String),
    #[error("Pagination did not converge within {cycles} cycles")]
    ConvergenceBudget { cycles: usize },
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
