//! Dispatcher integration tests: batch containment and worker bounds

mod common;

use common::{descriptor, register_failing, register_ok, Calls, Overlap};
use quickcheck_macros::quickcheck;
use reconchain::dispatch::{BatchRequest, Dispatcher};
use reconchain::events::{EventBus, Status};
use reconchain::tools::{Params, ToolCatalog, ToolCategory, ToolError};
use reconchain::OrchestratorError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn dispatcher(catalog: ToolCatalog) -> Dispatcher {
    Dispatcher::new(Arc::new(catalog), Arc::new(EventBus::default()))
}

fn targets(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("host{}.example.com", i)).collect()
}

#[quickcheck]
fn prop_failing_batch_yields_one_failure_per_target(n: u8) -> bool {
    let n = (n % 24) as usize;
    let calls = Calls::default();
    let mut catalog = ToolCatalog::new();
    register_failing(&mut catalog, &calls, "probe", ToolCategory::Recon, &["target"]);

    let report = tokio_test::block_on(dispatcher(catalog).run_batch(BatchRequest::new("probe", targets(n))))
        .unwrap();

    report.total == n
        && report.results.len() == n
        && report.errors == n
        && report.results.iter().all(|e| !e.success && e.error.is_some())
}

#[tokio::test]
async fn test_mixed_batch_counts() {
    let mut catalog = ToolCatalog::new();
    catalog
        .register(
            descriptor("probe", ToolCategory::Recon, &["target"]),
            |params: &Params| match params["target"].as_str() {
                Some("found.example.com") => Ok(json!({"status": "found"})),
                Some("slow.example.com") => Err(ToolError::Timeout(5)),
                Some("refused.example.com") => Err(ToolError::Connection("refused".into())),
                _ => Ok(json!({"status": "not_found"})),
            },
        )
        .unwrap();

    let request = BatchRequest::new(
        "probe",
        vec![
            "found.example.com".into(),
            "slow.example.com".into(),
            "refused.example.com".into(),
            "quiet.example.com".into(),
        ],
    );
    let report = dispatcher(catalog).run_batch(request).await.unwrap();

    assert!(report.success);
    assert_eq!(report.total, 4);
    assert_eq!(report.found, 1);
    assert_eq!(report.errors, 2);
    assert!(report.found + report.errors <= report.total);

    let statuses: Vec<&str> = report.results.iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, vec!["found", "timeout", "connection_error", "not_found"]);
    assert_eq!(report.results[1].url, "slow.example.com");
}

#[tokio::test]
async fn test_batch_unknown_tool_is_rejected() {
    let err = dispatcher(ToolCatalog::new())
        .run_batch(BatchRequest::new("ghost", targets(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTool(_)));
}

#[tokio::test]
async fn test_batch_respects_worker_bound() {
    let overlap = Overlap::default();
    let mut catalog = ToolCatalog::new();
    let seen = overlap.clone();
    catalog
        .register(
            descriptor("probe", ToolCategory::Recon, &["target"]),
            move |_: &Params| {
                seen.enter();
                thread::sleep(Duration::from_millis(30));
                seen.leave();
                Ok(json!({"status": "not_found"}))
            },
        )
        .unwrap();

    let report = dispatcher(catalog)
        .run_batch(BatchRequest::new("probe", targets(8)).with_max_workers(2))
        .await
        .unwrap();
    assert_eq!(report.total, 8);
    assert!(overlap.peak() <= 2, "peak concurrency {}", overlap.peak());
}

#[tokio::test]
async fn test_batch_panic_is_contained() {
    let mut catalog = ToolCatalog::new();
    catalog
        .register(
            descriptor("probe", ToolCategory::Recon, &["target"]),
            |params: &Params| -> Result<Value, ToolError> {
                if params["target"] == "boom.example.com" {
                    panic!("wrapper bug");
                }
                Ok(json!({"status": "found"}))
            },
        )
        .unwrap();

    let report = dispatcher(catalog)
        .run_batch(BatchRequest::new(
            "probe",
            vec!["boom.example.com".into(), "ok.example.com".into()],
        ))
        .await
        .unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.found, 1);
    assert!(!report.results[0].success);
}

#[tokio::test]
async fn test_infer_and_execute_publishes_per_tool_events() {
    let calls = Calls::default();
    let mut catalog = ToolCatalog::new();
    register_ok(&mut catalog, &calls, "nmap_scan", ToolCategory::Recon, &["target"], json!({}));
    register_ok(&mut catalog, &calls, "msf_search", ToolCategory::Exploit, &["query"], json!({}));
    let dispatcher = dispatcher(catalog);

    let tools = vec!["msf_search".to_string(), "nmap_scan".to_string(), "ghost".to_string()];
    let report = dispatcher
        .infer_and_execute(&tools, "scan 10.0.0.5 please", &HashMap::new(), Some("s-1"))
        .await;

    let outcome: Vec<(&str, bool)> = report.results.iter().map(|e| (e.tool.as_str(), e.success)).collect();
    assert_eq!(outcome, vec![("msf_search", false), ("nmap_scan", true), ("ghost", false)]);
    assert_eq!(calls.params("nmap_scan").unwrap()["target"], "10.0.0.5");
    assert_eq!(calls.count("msf_search"), 0);

    let events = dispatcher.bus().replay_since(0);
    let warnings = events.iter().filter(|e| e.status == Status::Warning).count();
    assert_eq!(warnings, 2);
    assert!(events.iter().all(|e| e.session_id.as_deref() == Some("s-1")));
    assert!(events
        .iter()
        .any(|e| e.status == Status::Success && e.tool.as_deref() == Some("nmap_scan")));
}
