//! `CloudinaryClient` against wiremock HTTP mocks.

use opensase_catalog::domain::value_objects::EmbeddedImage;
use opensase_catalog::media::{CloudinaryClient, CloudinaryConfig, ImageStore, MediaError};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> CloudinaryClient {
    let config = CloudinaryConfig {
        cloud_name: "demo".into(),
        api_key: "key-123".into(),
        api_secret: "secret".into(),
        timeout_secs: 5,
    };
    CloudinaryClient::with_base_url(config, base_url).expect("client construction should not fail")
}

fn png() -> EmbeddedImage {
    EmbeddedImage::parse("data:image/png;base64,aGVsbG8=").unwrap()
}

#[tokio::test]
async fn upload_returns_hosted_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(body_string_contains("api_key=key-123"))
        .and(body_string_contains("folder=products"))
        .and(body_string_contains("signature="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public_id": "products/abc",
            "secure_url": "https://res.cloudinary.com/demo/image/upload/products/abc.png",
            "bytes": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let image = test_client(&server.uri()).upload(&png(), "products").await.expect("upload should succeed");
    assert_eq!(image.id, "products/abc");
    assert!(image.url.ends_with("abc.png"));
}

#[tokio::test]
async fn upload_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Invalid Signature" }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).upload(&png(), "products").await.unwrap_err();
    match err {
        MediaError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid Signature");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn destroy_treats_not_found_as_deleted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/destroy"))
        .and(body_string_contains("public_id=products%2Fgone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "not found" })))
        .mount(&server)
        .await;

    test_client(&server.uri()).delete("products/gone").await.expect("missing image counts as deleted");
}

#[tokio::test]
async fn destroy_reports_unexpected_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "error" })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).delete("products/x").await.unwrap_err();
    assert!(matches!(err, MediaError::Rejected(_)));
}
