//! Integration tests for submission, polling and the campaign runner
//! against a mocked task API

use campaign_runner::config::ApiConfig;
use campaign_runner::runner::run_entry;
use campaign_runner::{
    Campaign, CampaignEntry, CampaignRunner, PollOutcome, PollSettings, ResultStatus, ResultStore,
    RunOptions, Selection, SubmitError, TaskClient, WorkerAssignment, WorkerProfile,
};
use httpmock::prelude::*;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tempfile::tempdir;

// ============================================================================
// TEST HELPERS
// ============================================================================

fn api(server: &MockServer) -> ApiConfig {
    ApiConfig {
        task_url: server.url("/task"),
        master: "master.example.org".to_string(),
        ..ApiConfig::default()
    }
}

fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(200),
    }
}

fn client(server: &MockServer) -> TaskClient {
    TaskClient::new(api(server), fast_poll()).unwrap()
}

fn entry(id: u64, name: &str) -> CampaignEntry {
    CampaignEntry {
        id,
        name: name.to_string(),
        worker_1: WorkerAssignment::new(&WorkerProfile::new("alpha", "10.0.0.1"), "client", &Map::new()),
        worker_2: WorkerAssignment::new(&WorkerProfile::new("beta", "10.0.0.2"), "server", &Map::new()),
        parameters: json!({
            "domain": "x.test",
            "controller_conf_filename": "controller_configuration.json"
        })
        .as_object()
        .cloned()
        .unwrap(),
    }
}

fn worker_result() -> Value {
    json!({"Worker_1": {"Variables": {}}, "Worker_2": {"Variables": {}}})
}

// ============================================================================
// CLIENT
// ============================================================================

#[tokio::test]
async fn test_submit_returns_task_id() {
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/task")
                .body_contains("\"first-worker\":\"alpha.admin.worker.nopasaran.org\"")
                .body_contains("\"tests-tree\":\"https_sni.png\"");
            then.status(200).json_body(json!({"task_id": "abc"}));
        })
        .await;

    let client = client(&server);
    let payload = campaign_runner::client::build_payload(&entry(1, "https_sni"), client.api());
    let task_id = client.submit(&payload).await.unwrap();

    assert_eq!(task_id.as_deref(), Some("abc"));
    submit.assert_async().await;
}

#[tokio::test]
async fn test_submit_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(500);
        })
        .await;

    let client = client(&server);
    let payload = campaign_runner::client::build_payload(&entry(1, "https_sni"), client.api());
    let err = client.submit(&payload).await.unwrap_err();
    assert!(matches!(err, SubmitError::Status(status) if status.as_u16() == 500));
}

#[tokio::test]
async fn test_poll_completed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/abc");
            then.status(200)
                .json_body(json!({"status": "completed", "result": worker_result()}));
        })
        .await;

    let client = client(&server);
    let outcome = client.poll(&client.status_url("abc")).await;
    assert_eq!(outcome, PollOutcome::Completed(worker_result()));
}

#[tokio::test]
async fn test_poll_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/abc");
            then.status(200)
                .json_body(json!({"status": "failed", "error": "worker offline"}));
        })
        .await;

    let client = client(&server);
    let outcome = client.poll(&client.status_url("abc")).await;
    assert_eq!(outcome, PollOutcome::Failed(Some(json!("worker offline"))));
}

#[tokio::test]
async fn test_poll_aborts_on_http_error_without_retry() {
    let server = MockServer::start_async().await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/task/abc");
            then.status(502);
        })
        .await;

    let client = client(&server);
    let outcome = client.poll(&client.status_url("abc")).await;

    assert!(matches!(outcome, PollOutcome::Aborted(_)));
    status.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_poll_times_out_while_pending() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/abc");
            then.status(200).json_body(json!({"status": "pending"}));
        })
        .await;

    let settings = PollSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(50),
    };
    let client = TaskClient::new(api(&server), settings).unwrap();
    let outcome = client.poll(&client.status_url("abc")).await;
    assert_eq!(outcome, PollOutcome::TimedOut);
}

// ============================================================================
// RUNNER
// ============================================================================

#[tokio::test]
async fn test_run_entry_without_task_id_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(200).json_body(json!({"message": "queued"}));
        })
        .await;

    let record = run_entry(&client(&server), &entry(1, "https_sni")).await;
    assert_eq!(record.status, ResultStatus::Error);
    assert_eq!(record.error.as_deref(), Some("No task ID in response"));
    assert!(record.polling_url.is_none());
}

#[tokio::test]
async fn test_run_entry_with_empty_result_is_polling_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(200).json_body(json!({"task_id": 42}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/42");
            then.status(200).json_body(json!({"status": "completed", "result": {}}));
        })
        .await;

    let record = run_entry(&client(&server), &entry(1, "https_sni")).await;
    assert_eq!(record.status, ResultStatus::PollingFailed);
    assert_eq!(record.task_id.as_deref(), Some("42"));
    assert!(record.polling_url.unwrap().ends_with("/task/42"));
}

#[tokio::test]
async fn test_runner_persists_and_skips_completed() {
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(200).json_body(json!({"task_id": "t1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/t1");
            then.status(200)
                .json_body(json!({"status": "completed", "result": worker_result()}));
        })
        .await;

    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let campaign = Campaign::new(vec![entry(1, "https_sni"), entry(2, "https_sni"), entry(3, "other")]);
    let client = client(&server);

    let mut store = ResultStore::open(&path).unwrap();
    let options = RunOptions {
        selection: Selection::Name("https_sni".to_string()),
        rerun: false,
    };
    let summary = CampaignRunner::new(&client, &mut store)
        .run(&campaign, &options)
        .await
        .unwrap();

    assert_eq!(summary.selected, 2);
    assert_eq!(summary.completed, 2);
    submit.assert_hits_async(2).await;

    let reopened = ResultStore::open(&path).unwrap();
    assert!(reopened.is_completed(1));
    assert!(reopened.is_completed(2));
    assert!(reopened.get(3).is_none());
    assert_eq!(reopened.get(1).unwrap().worker_2, "beta");

    // A second run finds everything completed and submits nothing.
    let mut store = reopened;
    let summary = CampaignRunner::new(&client, &mut store)
        .run(&campaign, &options)
        .await
        .unwrap();
    assert_eq!(summary.skipped_completed, 2);
    assert_eq!(summary.attempted(), 0);
    submit.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_rerun_resubmits_completed_entries() {
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(200).json_body(json!({"task_id": "t1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/t1");
            then.status(200)
                .json_body(json!({"status": "completed", "result": worker_result()}));
        })
        .await;

    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let campaign = Campaign::new(vec![entry(1, "https_sni"), entry(2, "https_sni")]);
    let client = client(&server);

    let mut store = ResultStore::open(&path).unwrap();
    CampaignRunner::new(&client, &mut store)
        .run(&campaign, &RunOptions::default())
        .await
        .unwrap();
    submit.assert_hits_async(2).await;
    let first_stamp = store.get(1).unwrap().timestamp.unwrap();

    // Mark entry 1 with a stale result so the overwrite is visible.
    let mut stale = store.get(1).unwrap().clone();
    stale.result = Some(json!({"stale": true}));
    store.record(1, stale).unwrap();

    let options = RunOptions {
        selection: Selection::All,
        rerun: true,
    };
    let summary = CampaignRunner::new(&client, &mut store)
        .run(&campaign, &options)
        .await
        .unwrap();

    assert_eq!(summary.skipped_completed, 0);
    assert_eq!(summary.completed, 2);
    submit.assert_hits_async(4).await;

    let reopened = ResultStore::open(&path).unwrap();
    let rerun = reopened.get(1).unwrap();
    assert_eq!(rerun.status, ResultStatus::Completed);
    assert_eq!(rerun.result, Some(worker_result()));
    assert!(rerun.timestamp.unwrap() >= first_stamp);
}

#[tokio::test]
async fn test_timestamp_marks_end_of_attempt() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(200).json_body(json!({"task_id": "slow"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/task/slow");
            then.status(200)
                .delay(Duration::from_millis(50))
                .json_body(json!({"status": "completed", "result": worker_result()}));
        })
        .await;

    let started = chrono::Utc::now();
    let record = run_entry(&client(&server), &entry(1, "https_sni")).await;

    let stamp = record.timestamp.unwrap();
    assert!(stamp - started >= chrono::Duration::milliseconds(50));
}

#[tokio::test]
async fn test_submission_failure_is_recorded() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/task");
            then.status(503);
        })
        .await;

    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let mut store = ResultStore::open(&path).unwrap();
    let client = client(&server);

    let summary = CampaignRunner::new(&client, &mut store)
        .run(&Campaign::new(vec![entry(7, "https_sni")]), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.submission_failed, 1);
    let record = ResultStore::open(&path).unwrap().get(7).cloned().unwrap();
    assert_eq!(record.status, ResultStatus::SubmissionFailed);
    assert!(record.error.unwrap().contains("503"));
}
