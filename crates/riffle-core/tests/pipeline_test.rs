use async_trait::async_trait;
use riffle_core::adapter::Registry;
use riffle_core::dispatch::dispatch;
use riffle_core::driver::{DriverError, NavigationResult, PageDriver};
use riffle_core::error::ScrapeError;
use riffle_core::model::{ImagePayload, RunResult, Session};
use riffle_core::persist::PersistenceWriter;
use riffle_core::resolve::{resolve_convergent, resolve_static};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

/// Driver that replays queued evaluation results and records every call it
/// receives, so tests can assert both outcomes and interaction order.
#[derive(Debug, Default)]
struct ScriptedDriver {
    evaluations: VecDeque<Value>,
    resources: HashMap<String, Vec<u8>>,
    selector_times_out: bool,
    calls: Vec<String>,
}

impl ScriptedDriver {
    fn with_evaluations(evaluations: Vec<Value>) -> Self {
        Self {
            evaluations: evaluations.into(),
            ..Self::default()
        }
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        self.calls.push(format!("navigate:{}", url));
        Ok(NavigationResult {
            url: url.to_string(),
            title: "scripted".to_string(),
        })
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _budget_ms: u64,
    ) -> Result<(), DriverError> {
        self.calls.push(format!("wait_selector:{}", selector));
        if self.selector_times_out {
            return Err(DriverError::Timeout(format!("selector {}", selector)));
        }
        Ok(())
    }

    async fn wait_for_network_idle(
        &mut self,
        _idle_ms: u64,
        _budget_ms: u64,
    ) -> Result<(), DriverError> {
        self.calls.push("wait_idle".to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.calls.push(format!("click:{}", selector));
        Ok(())
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<Value, DriverError> {
        self.calls.push("evaluate".to_string());
        self.evaluations
            .pop_front()
            .ok_or_else(|| DriverError::Other("no scripted evaluation left".into()))
    }

    async fn fetch_resource(&mut self, url: &str) -> Result<Vec<u8>, DriverError> {
        self.calls.push(format!("fetch:{}", url));
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Fetch(format!("no scripted resource for {}", url)))
    }
}

fn container(src: Option<&str>, markup: &str) -> Value {
    json!({ "src": src, "markup": markup })
}

#[tokio::test]
async fn static_resolution_preserves_document_order() {
    let mut driver = ScriptedDriver::with_evaluations(vec![json!([
        container(Some("blob:a/1"), "<img src=\"blob:a/1\">"),
        container(Some("blob:a/2"), "<img src=\"blob:a/2\">"),
        container(Some("blob:a/3"), "<img src=\"blob:a/3\">"),
    ])]);

    let refs = resolve_static(&mut driver, ".c-viewer__comic").await.unwrap();
    assert_eq!(refs, vec!["blob:a/1", "blob:a/2", "blob:a/3"]);
}

#[tokio::test]
async fn static_resolution_uses_markup_fallback() {
    let mut driver = ScriptedDriver::with_evaluations(vec![json!([
        container(Some("blob:a/1"), ""),
        container(None, "<picture><img class=\"p\" src=\"blob:a/2\"></picture>"),
    ])]);

    let refs = resolve_static(&mut driver, ".c-viewer__comic").await.unwrap();
    assert_eq!(refs, vec!["blob:a/1", "blob:a/2"]);
}

#[tokio::test]
async fn static_resolution_fails_on_refless_container() {
    let mut driver = ScriptedDriver::with_evaluations(vec![json!([
        container(Some("blob:a/1"), ""),
        container(None, "<div>nothing embedded</div>"),
    ])]);

    let err = resolve_static(&mut driver, ".c-viewer__comic")
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Extraction { index: 1 }));
}

#[tokio::test]
async fn convergence_stops_at_fixed_point() {
    // Growth pattern 3, 2, 2, 0: four cycles, seven distinct pages.
    let mut driver = ScriptedDriver::with_evaluations(vec![
        json!(["p1", "p2", "p3"]),
        json!(["p2", "p3", "p4", "p5"]),
        json!(["p4", "p5", "p6", "p7"]),
        json!(["p6", "p7"]),
    ]);

    let pages = resolve_convergent(&mut driver, ".forward", 256).await.unwrap();
    assert_eq!(pages, vec!["p1", "p2", "p3", "p4", "p5", "p6", "p7"]);
    assert_eq!(driver.count("evaluate"), 4);
    // Initial click plus one per growing cycle.
    assert_eq!(driver.count("click:"), 4);
}

#[tokio::test]
async fn convergence_ignores_replayed_payloads() {
    // Second cycle re-emits only already-seen content, so it counts as zero
    // growth and terminates the loop.
    let mut driver = ScriptedDriver::with_evaluations(vec![
        json!(["p1", "p2"]),
        json!(["p2", "p1"]),
    ]);

    let pages = resolve_convergent(&mut driver, ".forward", 256).await.unwrap();
    assert_eq!(pages, vec!["p1", "p2"]);
    assert_eq!(driver.count("evaluate"), 2);
}

#[tokio::test]
async fn convergence_budget_bounds_the_loop() {
    let mut driver = ScriptedDriver::with_evaluations(vec![
        json!(["a"]),
        json!(["b"]),
        json!(["c"]),
    ]);

    let err = resolve_convergent(&mut driver, ".forward", 3).await.unwrap_err();
    assert!(matches!(err, ScrapeError::ConvergenceBudget { cycles: 3 }));
}

#[tokio::test]
async fn dispatch_runs_static_adapter_end_to_end() {
    let mut driver = ScriptedDriver::with_evaluations(vec![json!([
        container(Some("blob:a/1"), ""),
        container(Some("blob:a/2"), ""),
    ])]);
    let session = Session::new(
        "https://ciao.shogakukan.co.jp/comics/title/00511/episode/9255",
        1000,
        true,
    )
    .unwrap();

    let run = dispatch(&mut driver, &session, &Registry::builtin())
        .await
        .unwrap();

    assert_eq!(run.len(), 2);
    assert_eq!(
        run.descriptors()[0].payload,
        ImagePayload::Remote("blob:a/1".into())
    );
    assert_eq!(run.descriptors()[1].index, 2);
    // Navigation happens once, before the ready wait.
    assert_eq!(driver.calls[0], "navigate:https://ciao.shogakukan.co.jp/comics/title/00511/episode/9255");
    assert_eq!(driver.calls[1], "wait_selector:.c-viewer__comic");
    assert_eq!(driver.calls[2], "wait_idle");
}

#[tokio::test]
async fn dispatch_rejects_unknown_host_without_touching_the_driver() {
    let mut driver = ScriptedDriver::default();
    let session = Session::new("https://example.com/whatever", 1000, true).unwrap();

    let err = dispatch(&mut driver, &session, &Registry::builtin())
        .await
        .unwrap_err();

    match err {
        ScrapeError::UnsupportedSite(host) => assert_eq!(host, "example.com"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(driver.calls.is_empty());
}

#[tokio::test]
async fn dispatch_surfaces_ready_timeout() {
    let mut driver = ScriptedDriver {
        selector_times_out: true,
        ..ScriptedDriver::default()
    };
    let session = Session::new("https://tonarinoyj.jp/episode/1", 1000, true).unwrap();

    let err = dispatch(&mut driver, &session, &Registry::builtin())
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::LoadTimeout(_)));
}

#[tokio::test]
async fn persist_writes_remote_refs_in_index_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = ScriptedDriver::default();
    driver
        .resources
        .insert("blob:a/1".to_string(), b"one".to_vec());
    driver
        .resources
        .insert("blob:a/2".to_string(), b"two".to_vec());
    driver
        .resources
        .insert("blob:a/3".to_string(), b"three".to_vec());

    let run = RunResult::from_remote(vec![
        "blob:a/1".into(),
        "blob:a/2".into(),
        "blob:a/3".into(),
    ]);
    PersistenceWriter::new(dir.path())
        .persist(&mut driver, &run)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("page_1.png")).unwrap(),
        b"one"
    );
    assert_eq!(
        std::fs::read(dir.path().join("page_2.png")).unwrap(),
        b"two"
    );
    assert_eq!(
        std::fs::read(dir.path().join("page_3.png")).unwrap(),
        b"three"
    );
    // Fetches were issued strictly in index order.
    let fetches: Vec<&String> = driver
        .calls
        .iter()
        .filter(|c| c.starts_with("fetch:"))
        .collect();
    assert_eq!(fetches, vec!["fetch:blob:a/1", "fetch:blob:a/2", "fetch:blob:a/3"]);
}

#[tokio::test]
async fn persist_decodes_encoded_payloads() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let dir = tempfile::tempdir().unwrap();
    let mut driver = ScriptedDriver::default();
    let body = STANDARD.encode(b"pixels");
    let run = RunResult::from_encoded(vec![format!("data:image/png;base64,{}", body)]);

    PersistenceWriter::new(dir.path())
        .persist(&mut driver, &run)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("page_1.png")).unwrap(),
        b"pixels"
    );
    // Encoded payloads never hit the network.
    assert_eq!(driver.count("fetch:"), 0);
}

#[tokio::test]
async fn persist_overwrites_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = ScriptedDriver::default();
    driver
        .resources
        .insert("blob:a/1".to_string(), b"fresh".to_vec());
    std::fs::write(dir.path().join("page_1.png"), b"stale").unwrap();

    let run = RunResult::from_remote(vec!["blob:a/1".into()]);
    PersistenceWriter::new(dir.path())
        .persist(&mut driver, &run)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("page_1.png")).unwrap(),
        b"fresh"
    );
}
