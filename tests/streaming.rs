//! Integration tests for long-poll streaming over range pagination.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use typed_rest::{
    CollectionEndpoint, Endpoint, Error, RestClient, StreamingCollectionEndpoint,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: i64,
}

async fn streaming_at(server: &MockServer, relative: &str) -> StreamingCollectionEndpoint<Event> {
    let uri = format!("{}{}", server.uri(), relative).parse().unwrap();
    let collection = CollectionEndpoint::new(Endpoint::new(RestClient::new(), uri));
    StreamingCollectionEndpoint::new(collection).with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn stream_advances_cursor_and_completes_at_known_end() {
    let server = MockServer::start().await;

    // First open read serves the two existing elements, upper bound
    // unknown, so the stream keeps polling.
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_json(serde_json::json!([{"id": 5}, {"id": 6}]))
                .insert_header("Content-Range", "elements 0-1"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // The follow-up read from one past the last served element picks up a
    // third element and a known total, which ends the stream.
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=2-"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_json(serde_json::json!([{"id": 7}]))
                .insert_header("Content-Range", "elements 2-2/3"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let events: Vec<Event> = streaming
        .get_stream(0)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![Event { id: 5 }, Event { id: 6 }, Event { id: 7 }]);
}

#[tokio::test]
async fn unsatisfiable_range_is_a_benign_empty_poll() {
    let server = MockServer::start().await;

    // No data yet: the first poll is told the range cannot be served.
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=0-"))
        .respond_with(ResponseTemplate::new(416))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_json(serde_json::json!([{"id": 1}]))
                .insert_header("Content-Range", "elements 0-0/1"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let events: Vec<Event> = streaming
        .get_stream(0)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![Event { id: 1 }]);
}

#[tokio::test]
async fn negative_start_index_is_a_tail_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=-1"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_json(serde_json::json!([{"id": 9}]))
                .insert_header("Content-Range", "elements 2-2/3"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let events: Vec<Event> = streaming
        .get_stream(-1)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![Event { id: 9 }]);
}

#[tokio::test]
async fn missing_content_range_ends_the_stream_after_the_batch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=0-"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 1}, {"id": 2}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let events: Vec<Event> = streaming
        .get_stream(0)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn non_range_errors_end_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let mut stream = streaming.get_stream(0);

    match stream.next().await {
        Some(Err(Error::Transport {
            status: Some(500), ..
        })) => {}
        other => panic!("unexpected: {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn dropping_the_stream_cancels_polling() {
    let server = MockServer::start().await;

    // The server never has data; the stream polls forever until dropped.
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(416))
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let mut stream = streaming.get_stream(0);

    let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(next.is_err(), "stream should still be polling");
    drop(stream);
}

#[tokio::test]
async fn each_subscription_gets_an_independent_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("Range", "elements=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_json(serde_json::json!([{"id": 1}]))
                .insert_header("Content-Range", "elements 0-0/1"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let streaming = streaming_at(&server, "/events").await;
    let first: Vec<Event> = streaming
        .get_stream(0)
        .map(|item| item.unwrap())
        .collect()
        .await;
    let second: Vec<Event> = streaming
        .get_stream(0)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(first, second);
}
