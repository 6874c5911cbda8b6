use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xpulse_core::{MemoryRequestStore, NewRequest, RequestKind, RunState};
use xpulse_ingest::parse_author_list;

use super::*;

fn client(server: &MockServer) -> ContentApiClient {
    ContentApiClient::new("test-key", 5, "xpulse-test/0.1", 0, 0)
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
}

fn options() -> FetchOptions {
    FetchOptions {
        max_items: 20,
        filters: SearchFilters::default(),
        cancel: CancellationToken::new(),
    }
}

fn timeline(handle: &str, ids: &[u64]) -> serde_json::Value {
    json!({
        "tweets": ids.iter().map(|id| json!({
            "id": id.to_string(),
            "text": format!("post {id}"),
            "likeCount": 2,
            "replyCount": 0,
            "retweetCount": 1,
            "viewCount": 50,
            "author": {"userName": handle}
        })).collect::<Vec<_>>(),
        "has_next_page": false,
        "next_cursor": ""
    })
}

async fn profiles_request(store: &MemoryRequestStore) -> Uuid {
    store
        .insert(NewRequest::new(RequestKind::Profiles, json!({})))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn author_list_runs_end_to_end_with_one_failing_author() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweet/advanced_search"))
        .and(query_param("query", "from:alice -filter:replies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(timeline("alice", &[1, 2])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tweet/advanced_search"))
        .and(query_param("query", "from:bob -filter:replies"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let list = parse_author_list("alice, bob,, alice");
    assert_eq!(list.authors, ["alice", "bob"]);
    let subjects: Vec<Subject> = list.authors.into_iter().map(Subject::Author).collect();

    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;
    let counters = RequestCounters {
        profiles: 2,
        ..RequestCounters::default()
    };
    let report = fetch_into_request(
        &store,
        &client(&server),
        id,
        &subjects,
        &options(),
        BatchConfig::default().without_delay(),
        counters,
    )
    .await
    .unwrap();

    assert_eq!(report.results, [2]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item, Subject::Author("bob".to_owned()));
    assert!(report.failures[0].error.starts_with("@bob"));

    let stored = store.get(id).await.unwrap().unwrap();
    match stored.status {
        RequestStatus::Completed {
            stats,
            errors,
            counters,
            ..
        } => {
            assert_eq!(stats.success_count, 1);
            assert_eq!(stats.failure_count, 1);
            assert_eq!(stats.total_processed, 2);
            assert_eq!(errors.len(), 1);
            assert_eq!(counters.profiles, 2);
            assert_eq!(counters.items_fetched, 2);
        }
        other => panic!("expected completed status, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credential_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweet/advanced_search"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;
    let subjects = vec![
        Subject::Author("alice".to_owned()),
        Subject::Author("bob".to_owned()),
    ];
    let err = fetch_into_request(
        &store,
        &client(&server),
        id,
        &subjects,
        &options(),
        BatchConfig::default().without_delay(),
        RequestCounters::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("401"));

    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status.state(), RunState::Failed);
    assert!(stored.status.error().is_some_and(|e| e.contains("401")));
}

#[tokio::test]
async fn items_before_a_failure_are_still_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweet/advanced_search"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let mut first = timeline("alice", &[7]);
    first["has_next_page"] = json!(true);
    first["next_cursor"] = json!("c1");
    Mock::given(method("GET"))
        .and(path("/tweet/advanced_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .mount(&server)
        .await;

    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;
    let report = fetch_into_request(
        &store,
        &client(&server),
        id,
        &[Subject::Author("alice".to_owned())],
        &options(),
        BatchConfig::default().without_delay(),
        RequestCounters::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(store.count_items(id).await.unwrap(), 1);
}

#[tokio::test]
async fn tracked_run_completes_with_counters() {
    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;

    let mut run = TrackedRun::start(&store, id, 2).await.unwrap();
    assert_eq!(
        store.get(id).await.unwrap().unwrap().status.state(),
        RunState::Processing
    );
    run.record(1, Vec::new()).await;
    run.record(0, vec!["posts request: boom".to_owned()]).await;
    assert_eq!(run.progress().stats.completed_batches, 2);

    let progress = run
        .complete(RequestCounters {
            items_fetched: 9,
            ..RequestCounters::default()
        })
        .await
        .unwrap();
    assert_eq!(progress.state, RunState::Completed);

    match store.get(id).await.unwrap().unwrap().status {
        RequestStatus::Completed {
            stats,
            errors,
            counters,
            ..
        } => {
            assert_eq!(stats.total_processed, 2);
            assert_eq!(stats.failure_count, 1);
            assert_eq!(errors, ["posts request: boom"]);
            assert_eq!(counters.items_fetched, 9);
        }
        other => panic!("expected completed status, got {other:?}"),
    }
}

#[tokio::test]
async fn tracked_run_failure_is_persisted_once() {
    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;

    let mut run = TrackedRun::start(&store, id, 1).await.unwrap();
    run.fail("cancelled").await;
    run.fail("second message").await;

    let status = store.get(id).await.unwrap().unwrap().status;
    assert_eq!(status.state(), RunState::Failed);
    assert_eq!(status.error(), Some("cancelled"));
}

#[tokio::test]
async fn tracked_run_needs_an_existing_request() {
    let store = MemoryRequestStore::new();
    assert!(TrackedRun::start(&store, Uuid::new_v4(), 1).await.is_err());
}

#[tokio::test]
async fn failing_a_queued_request_records_the_message() {
    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;

    fail_request_best_effort(&store, id, "parent import aborted: boom").await;

    let status = store.get(id).await.unwrap().unwrap().status;
    assert_eq!(status.state(), RunState::Failed);
    assert_eq!(status.error(), Some("parent import aborted: boom"));
}

#[tokio::test]
async fn failing_a_finished_request_keeps_its_status() {
    let store = MemoryRequestStore::new();
    let id = profiles_request(&store).await;
    let mut run = TrackedRun::start(&store, id, 1).await.unwrap();
    run.fail("first failure").await;

    fail_request_best_effort(&store, id, "later failure").await;

    let status = store.get(id).await.unwrap().unwrap().status;
    assert_eq!(status.error(), Some("first failure"));
}
