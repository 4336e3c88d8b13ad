use crate::codec;
use crate::driver::PageDriver;
use crate::error::ScrapeError;
use crate::model::{ImagePayload, RunResult};
use std::path::PathBuf;
use tracing::info;

/// Writes a run's descriptors to numbered image files.
pub struct PersistenceWriter {
    out_dir: PathBuf,
}

impl PersistenceWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Writes every descriptor, strictly in ascending index order. Remote
    /// references are fetched through the document session; encoded payloads
    /// are decoded locally. Re-running overwrites the same file names; there
    /// is no merge with earlier partial runs.
    pub async fn persist(
        &self,
        driver: &mut dyn PageDriver,
        run: &RunResult,
    ) -> Result<(), ScrapeError> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        info!(
            "Writing {} pages to {}...",
            run.len(),
            self.out_dir.display()
        );

        for descriptor in run.descriptors() {
            let (bytes, ext) = match &descriptor.payload {
                // Blob responses carry no usable name; the observed sites
                // serve PNG.
                ImagePayload::Remote(url) => (driver.fetch_resource(url).await?, "png"),
                ImagePayload::Encoded(data_url) => {
                    let image = codec::decode(data_url)?;
                    (image.bytes, codec::extension_for(&image.mime))
                }
            };
            let path = self.out_dir.join(format!("page_{}.{}", descriptor.index, ext));
            tokio::fs::write(&path, &bytes).await?;
            info!("-> Page #{} downloaded.", descriptor.index);
        }
        Ok(())
    }
}
