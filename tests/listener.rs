//! The polling listener against a wiremock server.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use common::{api_path, client, document_json, ok};
use nebuia_copilot::{
    models::{BatchType, Document, StatusDocument},
    DocumentHandler, Listener, Watch,
};
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Default, Clone)]
struct Recorder {
    started: Arc<Mutex<Vec<StatusDocument>>>,
    documents: Arc<Mutex<Vec<(StatusDocument, String)>>>,
}

#[async_trait]
impl DocumentHandler for Recorder {
    async fn on_start(&self, status: StatusDocument) {
        self.started.lock().unwrap().push(status);
    }

    async fn on_document(&self, status: StatusDocument, document: &Document) {
        self.documents
            .lock()
            .unwrap()
            .push((status, document.uuid.clone()));
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn poll_reads_first_page_of_watch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/integrator/documents/by/execution/status/waiting_qa")))
        .and(query_param("page", "1"))
        .and(query_param("limit", "20"))
        .respond_with(ok(json!({
            "documents": [document_json("d1", "waiting_qa")],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listener = Listener::new(client(&server));
    let documents = listener
        .poll(&Watch::new(StatusDocument::WaitingQa, BatchType::Execution))
        .await
        .unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].uuid, "d1");
}

#[tokio::test]
async fn spawned_listener_delivers_documents_until_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/integrator/documents/by/execution/status/complete_qa")))
        .and(query_param("limit", "5"))
        .respond_with(ok(json!({
            "documents": [document_json("d1", "complete_qa"), document_json("d2", "complete_qa")],
            "total": 2
        })))
        .mount(&server)
        .await;

    let mut listener = Listener::new(client(&server));
    listener.add_watch(
        Watch::new(StatusDocument::CompleteQa, BatchType::Execution)
            .every(Duration::from_millis(20))
            .limit(5),
    );

    let recorder = Recorder::default();
    let handle = listener.spawn(recorder.clone());

    wait_for(|| recorder.documents.lock().unwrap().len() >= 4).await;
    handle.stop();
    handle.wait().await.unwrap();

    assert_eq!(*recorder.started.lock().unwrap(), [StatusDocument::CompleteQa]);
    let documents = recorder.documents.lock().unwrap();
    assert_eq!(
        documents[..2],
        [
            (StatusDocument::CompleteQa, "d1".to_string()),
            (StatusDocument::CompleteQa, "d2".to_string())
        ]
    );
}

#[tokio::test]
async fn failing_polls_keep_the_listener_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut listener = Listener::new(client(&server));
    listener.add_watch(
        Watch::new(StatusDocument::WaitingProcess, BatchType::Testing)
            .every(Duration::from_millis(10)),
    );

    let recorder = Recorder::default();
    let handle = listener.spawn(recorder.clone());

    let mut polls = 0;
    for _ in 0..100 {
        polls = server.received_requests().await.map_or(0, |r| r.len());
        if polls >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.stop();
    handle.wait().await.unwrap();

    assert!(polls >= 3, "only {polls} polls");
    assert!(recorder.documents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn watches_are_polled_independently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/integrator/documents/by/execution/status/waiting_qa")))
        .respond_with(ok(json!({"documents": [document_json("qa", "waiting_qa")], "total": 1})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/integrator/documents/by/testing/status/rejected")))
        .respond_with(ok(json!({"documents": [document_json("rj", "rejected")], "total": 1})))
        .mount(&server)
        .await;

    let mut listener = Listener::new(client(&server));
    listener
        .add_watch(
            Watch::new(StatusDocument::WaitingQa, BatchType::Execution)
                .every(Duration::from_millis(15)),
        )
        .add_watch(
            Watch::new(StatusDocument::Rejected, BatchType::Testing)
                .every(Duration::from_millis(15)),
        );
    assert_eq!(listener.watches().len(), 2);

    let recorder = Recorder::default();
    let handle = listener.spawn(recorder.clone());

    wait_for(|| {
        let documents = recorder.documents.lock().unwrap();
        documents.contains(&(StatusDocument::WaitingQa, "qa".to_string()))
            && documents.contains(&(StatusDocument::Rejected, "rj".to_string()))
    })
    .await;
    handle.stop();
    handle.wait().await.unwrap();

    let mut started = recorder.started.lock().unwrap().clone();
    started.sort_by_key(|status| status.as_str());
    assert_eq!(started, [StatusDocument::Rejected, StatusDocument::WaitingQa]);
}

#[tokio::test]
async fn run_without_watches_is_an_error() {
    let server = MockServer::start().await;
    let listener = Listener::new(client(&server));
    assert!(listener.run(&Recorder::default()).await.is_err());
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let server = MockServer::start().await;
    let mut listener = Listener::new(client(&server));
    listener.add_watch(
        Watch::new(StatusDocument::Assigned, BatchType::Execution).every(Duration::ZERO),
    );
    assert!(listener.run(&Recorder::default()).await.is_err());
}
