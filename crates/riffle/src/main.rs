use anyhow::Context;
use clap::Parser;
use riffle_core::adapter::Registry;
use riffle_core::dispatch::dispatch;
use riffle_core::driver::PageDriver;
use riffle_core::model::Session;
use riffle_core::persist::PersistenceWriter;
use riffle_h::driver::CdpDriver;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "riffle",
    version,
    about = "Saves the page images of a client-rendered chapter viewer"
)]
struct Args {
    /// Chapter viewer URL
    url: String,

    /// Continuous network-idle window required before scraping starts, in ms
    #[arg(default_value_t = 1000)]
    idle_ms: u64,

    /// Pass "false" to run the browser with a visible window
    #[arg(default_value = "true")]
    headless: String,

    /// Directory the page images are written to
    #[arg(long, default_value = "images")]
    out_dir: PathBuf,
}

/// The literal "false" selects a visible browser; anything else, including
/// omission, is headless.
fn headless_from_arg(arg: &str) -> bool {
    arg != "false"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let session = Session::new(&args.url, args.idle_ms, headless_from_arg(&args.headless))?;

    let mut driver = CdpDriver::new(session.headless);
    driver.launch().await.context("failed to launch browser")?;

    let outcome = run(&mut driver, &session, &args.out_dir).await;

    // The browser comes down on every exit path.
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser cleanly: {}", e);
    }

    if let Err(e) = outcome {
        error!("An error occurred during scraping: {:#}", e);
        error!("Ensure your URL and options are correct and try again.");
        std::process::exit(1);
    }

    info!("-> Scraper closed successfully.");
    Ok(())
}

async fn run(
    driver: &mut dyn PageDriver,
    session: &Session,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let registry = Registry::builtin();
    let result = dispatch(driver, session, &registry).await?;
    PersistenceWriter::new(out_dir)
        .persist(driver, &result)
        .await?;
    Ok(())
}
