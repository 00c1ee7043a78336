//! Integration tests for `FormSink` using wiremock HTTP mocks.

use std::collections::BTreeMap;
use std::time::Duration;

use followtrack_core::{FieldSpec, FieldValue, FormSpec, FormSubmission};
use followtrack_forms::FormSink;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn field(label: &str, entry: &str) -> FieldSpec {
    FieldSpec {
        label: label.to_owned(),
        entry: Some(entry.to_owned()),
        target: "kit_daily".to_owned(),
        metric: "subscribers".to_owned(),
    }
}

fn test_sink(server: &MockServer, max_retries: u32) -> FormSink {
    let form = FormSpec {
        name: "kit".to_owned(),
        url: format!("{}/forms/kit/formResponse", server.uri()),
        fields: vec![
            field("Daily Subscribers", "entry.11"),
            field("Daily Cancellations", "entry.12"),
        ],
    };
    FormSink::new(&form, Duration::from_secs(5), "followtrack-test/0.1")
        .expect("sink construction should not fail")
        .with_retries(max_retries, Duration::ZERO)
}

fn submission() -> FormSubmission {
    FormSubmission {
        form: "kit".to_owned(),
        url: String::new(),
        values: BTreeMap::from([
            ("Daily Subscribers".to_owned(), FieldValue::Count(5120)),
            ("Daily Cancellations".to_owned(), FieldValue::NotFound),
        ]),
    }
}

#[tokio::test]
async fn posts_urlencoded_entry_pairs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/forms/kit/formResponse"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("entry.12=Not+Found&entry.11=5120"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ok = test_sink(&server, 3)
        .submit(&submission(), &CancellationToken::new())
        .await;

    assert!(ok);
}

#[tokio::test]
async fn any_2xx_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(
        test_sink(&server, 3)
            .submit(&submission(), &CancellationToken::new())
            .await
    );
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(
        test_sink(&server, 3)
            .submit(&submission(), &CancellationToken::new())
            .await
    );
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(4)
        .mount(&server)
        .await;

    let sink = test_sink(&server, 3);
    let result = sink
        .try_submit(&submission(), &CancellationToken::new())
        .await;

    let err = result.expect_err("should fail after retries");
    assert!(err.to_string().contains("HTTP 400"), "error was: {err}");
}
