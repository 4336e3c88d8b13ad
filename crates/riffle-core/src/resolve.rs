use crate::driver::PageDriver;
use crate::error::ScrapeError;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Snapshot of every renderable surface in document order, exported as data
/// URLs.
const SNAPSHOT_JS: &str =
    "(() => Array.from(document.getElementsByTagName('canvas')).map(c => c.toDataURL()))()";

/// Quotes a Rust string for embedding in an evaluated expression.
/// JSON string syntax is valid JavaScript string syntax.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).expect("strings always serialize")
}

/// Per-container view returned by the in-page query: the structured
/// `img[src]` lookup plus the serialized markup for the fallback scan.
#[derive(Debug, Deserialize)]
struct ContainerShot {
    src: Option<String>,
    markup: String,
}

fn container_query_js(container_selector: &str) -> String {
    format!(
        "(() => {{ \
           const nodes = document.querySelectorAll({sel}); \
           return Array.from(nodes).map(node => {{ \
             const img = node.querySelector('img[src]'); \
             return {{ src: img ? img.getAttribute('src') : null, markup: node.innerHTML }}; \
           }}); \
         }})()",
        sel = js_string(container_selector)
    )
}

/// Extracts an ordered list of remote image references from the containers
/// matching `container_selector`, in document order.
///
/// The primary path is the structured `img[src]` query. Containers the query
/// misses fall back to a token scan of their serialized markup; a container
/// that yields nothing either way is a broken structural assumption about the
/// site and fails the run.
pub async fn resolve_static(
    driver: &mut dyn PageDriver,
    container_selector: &str,
) -> Result<Vec<String>, ScrapeError> {
    let value = driver.evaluate(&container_query_js(container_selector)).await?;
    let shots: Vec<ContainerShot> = serde_json::from_value(value)?;
    info!("Found {} image containers", shots.len());

    let mut refs = Vec::with_capacity(shots.len());
    for (index, shot) in shots.into_iter().enumerate() {
        let src = match shot.src {
            Some(src) => src,
            None => src_from_markup(&shot.markup).ok_or(ScrapeError::Extraction { index })?,
        };
        refs.push(src);
    }
    Ok(refs)
}

/// Isolates the quoted value of the first `src=` token in serialized markup.
///
/// Adapter-specific fallback, not a generic HTML parser: it assumes the site
/// serializes the attribute with quotes.
pub fn src_from_markup(markup: &str) -> Option<String> {
    let at = markup.find("src=")?;
    let rest = &markup[at + "src=".len()..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    if end == 0 {
        return None;
    }
    Some(body[..end].to_string())
}

/// Order-preserving deduplicating accumulator keyed by exact string identity.
///
/// Identity is deliberately byte-exact. A rendering surface that embeds
/// anything non-deterministic defeats the dedup and stalls convergence, which
/// is what the cycle budget is for.
#[derive(Debug, Default)]
pub struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts if unseen; returns whether the value was new.
    pub fn insert(&mut self, value: String) -> bool {
        if self.seen.contains(&value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.items.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The accumulated values in first-seen order.
    pub fn into_items(self) -> Vec<String> {
        self.items
    }
}

/// Pages through the viewer by clicking the forward control, snapshotting
/// every canvas after each click, until a full cycle adds nothing new.
/// Returns the accumulated data URLs in first-seen order.
///
/// The click before the first snapshot is part of the site's navigation
/// semantics: the first spread only renders once the reader advances.
pub async fn resolve_convergent(
    driver: &mut dyn PageDriver,
    forward_selector: &str,
    max_cycles: usize,
) -> Result<Vec<String>, ScrapeError> {
    info!("This site renders pages dynamically. Beginning forward-click simulation...");
    let mut acc = OrderedSet::new();

    driver.click(forward_selector).await?;

    for cycle in 1..=max_cycles {
        let value = driver.evaluate(SNAPSHOT_JS).await?;
        let surfaces: Vec<String> = serde_json::from_value(value)?;
        debug!(cycle, surfaces = surfaces.len(), "snapshot cycle");

        let before = acc.len();
        for surface in surfaces {
            acc.insert(surface);
        }
        let added = acc.len() - before;

        if added == 0 {
            info!("Converged after {} cycles. Total pages: {}", cycle, acc.len());
            return Ok(acc.into_items());
        }

        info!("-> Got {} new pages. Total: {}", added, acc.len());
        driver.click(forward_selector).await?;
    }

    Err(ScrapeError::ConvergenceBudget { cycles: max_cycles })
}
