mod support;

use reqwest::StatusCode;
use serde_json::{json, Value};

use support::{spawn_app, test_config};

fn limited_config(max_requests: u32) -> config::AppConfig {
    let mut config = test_config();
    config.rate_limit.max_requests = max_requests;
    config
}

#[tokio::test]
async fn writes_beyond_limit_get_429() {
    let app = spawn_app(limited_config(3)).await;

    for _ in 0..3 {
        let response = app
            .client
            .post(app.url("/reactions/balloon"))
            .header("x-forwarded-for", "198.51.100.1")
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .client
        .post(app.url("/reactions/balloon"))
        .header("x-forwarded-for", "198.51.100.1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn sources_are_limited_independently() {
    let app = spawn_app(limited_config(1)).await;

    let send = |source: &'static str| {
        app.client
            .post(app.url("/reactions/understand"))
            .header("x-forwarded-for", source)
            .json(&json!({}))
            .send()
    };

    assert_eq!(send("198.51.100.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(send("198.51.100.2").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        send("198.51.100.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn reads_are_not_limited() {
    let app = spawn_app(limited_config(1)).await;

    for _ in 0..5 {
        let response = app.client.get(app.url("/settings")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // 没有转发头时按对端地址计数
    let first = app
        .client
        .post(app.url("/messages"))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app
        .client
        .post(app.url("/messages"))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn wrong_method_requests_do_not_consume_budget() {
    let app = spawn_app(limited_config(1)).await;

    let rejected = [
        (reqwest::Method::POST, "/stream"),
        (reqwest::Method::POST, "/presence"),
        (reqwest::Method::GET, "/messages"),
        (reqwest::Method::DELETE, "/settings"),
        (reqwest::Method::PUT, "/reactions/balloon"),
    ];
    for (method, path) in rejected {
        let response = app
            .client
            .request(method.clone(), app.url(path))
            .header("x-forwarded-for", "198.51.100.7")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {path}");
    }
    assert_eq!(app.state.rate_limiter.status("198.51.100.7"), 0);

    let response = app
        .client
        .post(app.url("/messages"))
        .header("x-forwarded-for", "198.51.100.7")
        .json(&json!({"message": "still allowed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
