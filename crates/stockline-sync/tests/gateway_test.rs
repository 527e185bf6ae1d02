//! HTTP gateway against an in-process product API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use url::Url;

use stockline_sync::{HttpGateway, ImageAttachment, ProductFields, RemoteGateway, SyncError};

#[derive(Debug, Clone, PartialEq)]
struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

type Captured = Arc<Mutex<Vec<Part>>>;

async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/api/public/")).unwrap()
}

fn gateway(base: Url) -> HttpGateway {
    HttpGateway::new(base, Duration::from_secs(5), Duration::from_secs(5)).unwrap()
}

fn pen() -> ProductFields {
    ProductFields {
        name: "Pen".into(),
        product_type: "Stationery".into(),
        price: 10.0,
        tax: 5.0,
    }
}

async fn capture(State(captured): State<Captured>, mut multipart: Multipart) -> Response {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let part = Part {
            name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            body: field.bytes().await.unwrap().to_vec(),
        };
        captured.lock().unwrap().push(part);
    }

    Json(json!({
        "message": "Product added Successfully!",
        "product_details": {
            "image": "",
            "price": 10.0,
            "product_name": "Pen",
            "product_type": "Stationery",
            "tax": 5.0
        },
        "product_id": 2735,
        "success": true
    }))
    .into_response()
}

#[tokio::test]
async fn create_posts_multipart_fields_and_image() {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route("/api/public/add", post(capture))
        .with_state(captured.clone());
    let gateway = gateway(serve(app).await);

    let image = ImageAttachment {
        file_name: "image_1.jpg".into(),
        bytes: b"jpeg".to_vec(),
    };
    let product = gateway.create_product(&pen(), Some(image)).await.unwrap();

    assert_eq!(product.id, Some(2735));
    assert_eq!(product.name, "Pen");
    assert_eq!(product.image, None);

    let parts = captured.lock().unwrap().clone();
    let text = |name: &str| {
        parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| String::from_utf8(p.body.clone()).unwrap())
    };
    assert_eq!(text("product_name").as_deref(), Some("Pen"));
    assert_eq!(text("product_type").as_deref(), Some("Stationery"));
    assert_eq!(text("price").as_deref(), Some("10.0"));
    assert_eq!(text("tax").as_deref(), Some("5.0"));

    let file = parts.iter().find(|p| p.name == "files[]").unwrap();
    assert_eq!(file.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(file.file_name.as_deref(), Some("image_1.jpg"));
    assert_eq!(file.body, b"jpeg");
}

#[tokio::test]
async fn create_without_image_sends_no_file_part() {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route("/api/public/add", post(capture))
        .with_state(captured.clone());
    let gateway = gateway(serve(app).await);

    gateway.create_product(&pen(), None).await.unwrap();

    let parts = captured.lock().unwrap().clone();
    assert_eq!(parts.len(), 4);
    assert!(parts.iter().all(|p| p.name != "files[]"));
}

#[tokio::test]
async fn error_status_uses_body_message() {
    let app = Router::new().route(
        "/api/public/add",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Server error" }))) }),
    );
    let gateway = gateway(serve(app).await);

    let err = gateway.create_product(&pen(), None).await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteRejected { .. }));
    assert_eq!(err.to_string(), "Server error");
}

#[tokio::test]
async fn error_status_without_message_uses_reason_phrase() {
    let app = Router::new().route(
        "/api/public/add",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
    );
    let gateway = gateway(serve(app).await);

    let err = gateway.create_product(&pen(), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Service Unavailable");
}

#[tokio::test]
async fn unsuccessful_body_is_rejected() {
    let app = Router::new().route(
        "/api/public/add",
        post(|| async { Json(json!({ "message": "Duplicate product", "success": false })) }),
    );
    let gateway = gateway(serve(app).await);

    let err = gateway.create_product(&pen(), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Duplicate product");
}

#[tokio::test]
async fn fetch_all_parses_product_list() {
    let app = Router::new().route(
        "/api/public/get",
        get(|| async {
            Json(json!([
                {
                    "image": "https://cdn.example.com/pen.jpg",
                    "price": 10.0,
                    "product_name": "Pen",
                    "product_type": "Stationery",
                    "tax": 5.0
                },
                {
                    "image": "",
                    "price": 250.5,
                    "product_name": "Lamp",
                    "product_type": "Home",
                    "tax": 18.0
                }
            ]))
        }),
    );
    let gateway = gateway(serve(app).await);

    let products = gateway.fetch_all().await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].image.as_deref(), Some("https://cdn.example.com/pen.jpg"));
    assert_eq!(products[1].name, "Lamp");
    assert_eq!(products[1].image, None);
}

#[tokio::test]
async fn fetch_all_bad_body_is_malformed() {
    let app = Router::new().route("/api/public/get", get(|| async { "not json" }));
    let gateway = gateway(serve(app).await);

    let err = gateway.fetch_all().await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = gateway(Url::parse(&format!("http://{addr}/api/public/")).unwrap());
    let err = gateway.fetch_all().await.unwrap_err();

    assert!(err.is_retryable());
}
