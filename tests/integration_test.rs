//! Orchestrator integration tests
//!
//! Exercises the facade end to end with closure-backed tools, so no
//! security tooling needs to be installed.

mod common;

use common::{installed_gate, register_failing, register_ok, Calls};
use futures_util::StreamExt;
use reconchain::chain::NodeState;
use reconchain::dispatch::BatchRequest;
use reconchain::events::{Level, Status, StreamFrame};
use reconchain::tools::{builtin_catalog, Params, ToolCatalog, ToolCategory, ToolRegistry};
use reconchain::{Config, Orchestrator, OrchestratorError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(calls: &Calls) -> Orchestrator {
    let mut catalog = ToolCatalog::new();
    register_ok(
        &mut catalog,
        calls,
        "nmap_scan",
        ToolCategory::Recon,
        &["target"],
        json!({"open_ports": [{"port": 22, "service": "ssh"}]}),
    );
    register_ok(&mut catalog, calls, "whatweb", ToolCategory::Recon, &["url"], json!({}));
    register_failing(&mut catalog, calls, "vuln_scan", ToolCategory::VulnScan, &["target"]);
    register_ok(&mut catalog, calls, "msf_search", ToolCategory::Exploit, &["query"], json!({}));

    Orchestrator::builder(Arc::new(catalog))
        .gate(installed_gate())
        .build()
}

#[test]
fn test_builtin_orchestrator_from_default_config() {
    let orchestrator = Orchestrator::from_config(Config::default()).unwrap();
    let report = orchestrator.link_status();
    assert_eq!(report.total_tools, orchestrator.registry().list_tools().len());
    assert_eq!(report.ok + report.missing, report.total_tools);

    let catalog = builtin_catalog(Duration::from_secs(1)).unwrap();
    assert_eq!(catalog.len(), report.total_tools);
}

#[tokio::test]
async fn test_execute_unknown_tool_is_an_error() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let err = orchestrator.execute("ghost", Params::new(), None).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTool(_)));
    assert!(orchestrator.replay_events(0).is_empty());
}

#[tokio::test]
async fn test_execute_failure_is_data() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let mut params = Params::new();
    params.insert("target".into(), json!("10.0.0.1"));
    let response = orchestrator.execute("vuln_scan", params, None).await.unwrap();
    assert!(!response.success);
    assert!(response.error.unwrap().contains("exited with code 1"));

    let events = orchestrator.replay_events(0);
    let statuses: Vec<Status> = events.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![Status::Running, Status::Error]);
    assert_eq!(events[1].level, Level::Error);
    assert_eq!(events[1].service, "/execute");
}

#[tokio::test]
async fn test_batch_scan_through_facade() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let report = orchestrator
        .batch_scan(BatchRequest::new("nmap_scan", vec!["10.0.0.1".into(), "10.0.0.2".into()]))
        .await
        .unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(calls.count("nmap_scan"), 2);
}

#[tokio::test]
async fn test_analyze_text_with_tools_and_overrides() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let tools = vec!["nmap_scan".to_string(), "msf_search".to_string()];
    let mut nmap = Params::new();
    nmap.insert("ports".into(), json!("22"));
    let overrides = HashMap::from([("nmap_scan".to_string(), nmap)]);
    let response = orchestrator
        .analyze_text(
            r#"check example.com {"tool_params": {"msf_search": {"query": "apache"}}}"#,
            &tools,
            &overrides,
            None,
        )
        .await;

    let results = response.results.unwrap();
    assert!(results.iter().all(|e| e.success));
    assert_eq!(calls.params("nmap_scan").unwrap()["target"], "example.com");
    assert_eq!(calls.params("nmap_scan").unwrap()["ports"], "22");
    assert_eq!(calls.params("msf_search").unwrap()["query"], "apache");
    assert_eq!(response.target.value, "example.com");

    let records = orchestrator.session_results(&response.session_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "chat");
}

#[tokio::test]
async fn test_analyze_text_without_tools() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);
    let session = orchestrator.create_session("recon");

    let response = orchestrator
        .analyze_text(
            "what should I run against https://shop.example.com/login",
            &[],
            &HashMap::new(),
            Some(&session.id),
        )
        .await;
    assert_eq!(response.session_id, session.id);
    let analysis = response.analysis.unwrap();
    assert!(analysis.target.value.starts_with("https://shop.example.com"));
    assert!(!analysis.recommended_tools.is_empty());
    assert_eq!(calls.total(), 0);

    let missing = orchestrator.analyze_text("hello there", &[], &HashMap::new(), None).await;
    assert!(missing.analysis.is_none());
    assert!(missing.message.is_some());
    let warning = orchestrator.replay_events(0).into_iter().last().unwrap();
    assert_eq!(warning.service, "/chat");
    assert_eq!(warning.status, Status::Warning);
    assert_eq!(warning.session_id.as_deref(), Some(missing.session_id.as_str()));
}

#[tokio::test]
async fn test_chain_lifecycle_through_facade() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let created = orchestrator
        .create_chain("example.com", "domain", &["exploit".to_string()])
        .unwrap();
    let mut stream = Box::pin(orchestrator.subscribe_events(0));
    assert_eq!(stream.next().await, Some(StreamFrame::Connected));

    let summary = orchestrator.execute_chain(&created.chain_id, None).await.unwrap();
    assert_eq!(summary.counts.success, 2);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.skipped, 1);

    let status = orchestrator.get_chain_status(&created.chain_id).unwrap();
    assert_eq!(status.node("vuln_scan").unwrap().state, NodeState::Failed);
    assert_eq!(status.node("msf_search").unwrap().state, NodeState::Skipped);
    assert!(orchestrator.suggest_next_steps(&created.chain_id).unwrap().is_empty());

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.as_event().map(|e| e.service.as_str()), Some("/chain"));

    assert!(matches!(
        orchestrator.get_chain_status("missing"),
        Err(OrchestratorError::ChainNotFound(_))
    ));
}

#[test]
fn test_generate_plan_marks_available_tools() {
    let calls = Calls::default();
    let orchestrator = orchestrator(&calls);

    let plan = orchestrator.generate_plan("10.0.0.9", &["recon".to_string()]);
    assert_eq!(plan.target, "10.0.0.9");
    assert!(!plan.phases.is_empty());
    let recon = &plan.phases[0];
    assert!(recon.available.iter().all(|t| recon.tools.contains(t)));
    assert!(recon.available.contains(&"nmap_scan".to_string()));
}
