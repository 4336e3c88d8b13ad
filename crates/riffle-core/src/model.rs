use crate::error::ScrapeError;
use url::Url;

/// One scraping run against a single viewer URL. Immutable after creation;
/// owned exclusively by the run.
#[derive(Debug, Clone)]
pub struct Session {
    pub target_url: String,
    pub host: String,
    /// Continuous network-idle window the ready wait requires, in ms.
    pub idle_ms: u64,
    pub headless: bool,
}

impl Session {
    /// The host is taken from the URL itself rather than read back out of the
    /// loaded document, so adapter lookup can happen before any navigation.
    pub fn new(target_url: &str, idle_ms: u64, headless: bool) -> Result<Self, ScrapeError> {
        let parsed = Url::parse(target_url)
            .map_err(|e| ScrapeError::InvalidTarget(format!("{}: {}", target_url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ScrapeError::InvalidTarget(format!("{}: URL has no host", target_url)))?
            .to_string();
        Ok(Self {
            target_url: target_url.to_string(),
            host,
            idle_ms,
            headless,
        })
    }
}

/// Where a resolved page image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Temporary in-session resource locator (e.g. a blob: URL). Must be
    /// fetched through the same document session to yield bytes.
    Remote(String),
    /// Self-describing data URL carrying mime type and base64 body.
    Encoded(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// 1-based position in the final sequence. Assigned only after the full
    /// sequence is known, never from discovery order.
    pub index: usize,
    pub payload: ImagePayload,
}

/// The ordered outcome of one run, 1:1 with the files eventually written.
#[derive(Debug, Default)]
pub struct RunResult {
    descriptors: Vec<ImageDescriptor>,
}

impl RunResult {
    pub fn from_remote(refs: Vec<String>) -> Self {
        Self::number(refs.into_iter().map(ImagePayload::Remote).collect())
    }

    pub fn from_encoded(data_urls: Vec<String>) -> Self {
        Self::number(data_urls.into_iter().map(ImagePayload::Encoded).collect())
    }

    fn number(payloads: Vec<ImagePayload>) -> Self {
        let descriptors = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| ImageDescriptor {
                index: i + 1,
                payload,
            })
            .collect();
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[ImageDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_takes_host_from_url() {
        let session = Session::new("https://tonarinoyj.jp/episode/485", 1000, true).unwrap();
        assert_eq!(session.host, "tonarinoyj.jp");
        assert_eq!(session.idle_ms, 1000);
        assert!(session.headless);
    }

    #[test]
    fn session_rejects_hostless_url() {
        assert!(matches!(
            Session::new("data:text/html,hi", 1000, true),
            Err(ScrapeError::InvalidTarget(_))
        ));
        assert!(matches!(
            Session::new("not a url", 1000, true),
            Err(ScrapeError::InvalidTarget(_))
        ));
    }

    #[test]
    fn run_result_numbers_from_one() {
        let run = RunResult::from_remote(vec!["a".into(), "b".into()]);
        let indices: Vec<usize> = run.descriptors().iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
