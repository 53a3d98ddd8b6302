//! Integration tests for the jobboard server

mod common;

use common::spawn_app;
use serde_json::Value;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/health_check"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "jobboard");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/nothing-here"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn public_listings_need_no_credentials() {
    let app = spawn_app().await;

    for path in ["/api/jobPosts", "/api/companies"] {
        let response = app
            .client
            .get(app.url(path))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(200, response.status().as_u16(), "{} should be public", path);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, Value::Array(vec![]));
    }
}
