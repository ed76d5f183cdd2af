mod common;

use common::*;
use reqwest::StatusCode;

#[tokio::test]
async fn club_payment_is_confirmed_exactly_once() {
    let app = spawn_app().await;
    app.login("member@example.com", "member").await;

    let response = app.get("/payment-success?session_id=abc").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Payment successful"));
    assert_eq!(app.upstream.count("POST /api/payment-success"), 1);
}

#[tokio::test]
async fn success_page_renders_even_when_confirmation_fails() {
    let app = spawn_app().await;
    app.upstream.script.lock().unwrap().confirm_status = StatusCode::INTERNAL_SERVER_ERROR;

    let response = app.get("/payment-success?session_id=abc").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Payment successful"));
    assert_eq!(app.upstream.count("POST /api/payment-success"), 1);
}

#[tokio::test]
async fn event_payment_reports_verification_outcome() {
    let app = spawn_app().await;
    app.login("member@example.com", "member").await;

    let page = app
        .get("/event-payment-success?session_id=evt")
        .await
        .text()
        .await
        .unwrap();
    assert!(page.contains("Event registration successful!"));

    app.upstream.script.lock().unwrap().confirm_status = StatusCode::BAD_REQUEST;
    let page = app
        .get("/event-payment-success?session_id=evt2")
        .await
        .text()
        .await
        .unwrap();
    assert!(page.contains("Payment verification failed"));
    assert!(page.contains("Payment successful"));
    assert_eq!(app.upstream.count("POST /api/event-payment-success"), 2);
}

#[tokio::test]
async fn missing_session_id_skips_confirmation() {
    let app = spawn_app().await;

    let response = app.get("/payment-success").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.upstream.count("POST /api/payment-success"), 0);
}
