use std::sync::Arc;

use futures::StreamExt;
use reverb_core::ReverbError;
use reverb_upstream::{FakeBackend, ProviderResponse, UpstreamClient, UpstreamConfig};
use serde_json::json;

fn setup(backend: Arc<FakeBackend>) -> UpstreamClient {
    let config = UpstreamConfig::new("test-key").with_base_url("https://upstream.test/v1");
    UpstreamClient::new(config, backend)
}

#[tokio::test]
async fn complete_returns_success_response_verbatim() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
        }),
    });

    let client = setup(backend);
    let response = client
        .complete(json!({"model": "gpt-4", "messages": []}))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(
        response.body["choices"][0]["message"]["content"],
        "Hello!"
    );
}

#[tokio::test]
async fn complete_forwards_server_credentials() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!({"choices": []}),
    });

    let client = setup(backend.clone());
    client
        .complete(json!({"messages": []}))
        .await
        .unwrap();

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://upstream.test/v1/chat/completions");
    assert!(requests[0]
        .headers
        .iter()
        .any(|(k, v)| k == "Authorization" && v == "Bearer test-key"));
}

#[tokio::test]
async fn complete_strips_no_cache_before_forwarding() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!({"choices": []}),
    });

    let client = setup(backend.clone());
    client
        .complete(json!({"model": "gpt-4", "noCache": true, "messages": []}))
        .await
        .unwrap();

    let requests = backend.requests().await;
    assert!(requests[0].body.get("noCache").is_none());
    assert_eq!(requests[0].body["model"], "gpt-4");
}

#[tokio::test]
async fn complete_surfaces_4xx_with_body() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 400,
        body: json!({"error": {"message": "bad request"}}),
    });

    let client = setup(backend);
    let err = client.complete(json!({"messages": []})).await.unwrap_err();

    match err {
        ReverbError::UpstreamStatus { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body["error"]["message"], "bad request");
        }
        other => panic!("expected UpstreamStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_forwards_4xx_with_non_json_body() {
    // What HttpBackend produces for a text/HTML error page: the original
    // status with the page preserved as a JSON string.
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 404,
        body: json!("no such route"),
    });

    let client = setup(backend);
    let err = client.complete(json!({"messages": []})).await.unwrap_err();

    match err {
        ReverbError::UpstreamStatus { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, json!("no such route"));
        }
        other => panic!("expected UpstreamStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_maps_5xx_to_upstream_error() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 503,
        body: json!({"error": {"message": "overloaded"}}),
    });

    let client = setup(backend);
    let err = client.complete(json!({"messages": []})).await.unwrap_err();
    assert!(matches!(err, ReverbError::Upstream(_)));
}

#[tokio::test]
async fn complete_stream_yields_upstream_bytes_in_order() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_stream_chunks(vec![
        bytes::Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n"),
        bytes::Bytes::from("data: [DONE]\n\n"),
    ]);

    let client = setup(backend);
    let stream = client
        .complete_stream(json!({"stream": true, "messages": []}))
        .await
        .unwrap();

    let chunks: Vec<_> = stream
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].starts_with(b"data: {"));
    assert_eq!(&chunks[1][..], b"data: [DONE]\n\n");
}

#[tokio::test]
async fn complete_stream_surfaces_4xx_with_collected_body() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_stream(
        429,
        vec![Ok(bytes::Bytes::from(
            "{\"error\":{\"message\":\"rate limited\"}}",
        ))],
    );

    let client = setup(backend);
    let err = match client
        .complete_stream(json!({"stream": true, "messages": []}))
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    match err {
        ReverbError::UpstreamStatus { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body["error"]["message"], "rate limited");
        }
        other => panic!("expected UpstreamStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_stream_keeps_non_json_error_body() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_stream(
        403,
        vec![Ok(bytes::Bytes::from("Forbidden by proxy"))],
    );

    let client = setup(backend);
    let err = match client
        .complete_stream(json!({"stream": true, "messages": []}))
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    match err {
        ReverbError::UpstreamStatus { status, body } => {
            assert_eq!(status, 403);
            // A plain-text error page survives as a JSON string.
            assert_eq!(body, serde_json::json!("Forbidden by proxy"));
        }
        other => panic!("expected UpstreamStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_stream_maps_5xx_to_upstream_error() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_stream(500, vec![Ok(bytes::Bytes::from("{}"))]);

    let client = setup(backend);
    let err = match client
        .complete_stream(json!({"stream": true, "messages": []}))
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(matches!(err, ReverbError::Upstream(_)));
}
