//! API integration tests
//!
//! Run against a live server and a seeded database:
//! `cargo test --test api_tests -- --ignored`. The business and service used
//! are read from `SLOTWISE_TEST_BUSINESS` / `SLOTWISE_TEST_SERVICE` (default 1).

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use slotwise_server::models::{Role, UserClaims};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn env_id(name: &str) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

/// Mint a token the way the authentication service would
fn token(role: Role, business_id: Option<i32>) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    UserClaims {
        user_id: 90_001,
        name: "Integration Tester".to_string(),
        email: Some("tester@example.com".to_string()),
        phone: None,
        role,
        business_id,
        exp: chrono::Utc::now().timestamp() + 600,
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_reaches_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_available_dates_listing() {
    let client = Client::new();
    let (business, service) = (env_id("SLOTWISE_TEST_BUSINESS"), env_id("SLOTWISE_TEST_SERVICE"));

    let response = client
        .get(format!(
            "{}/businesses/{}/services/{}/dates?days=7",
            BASE_URL, business, service
        ))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.as_array().map_or(false, |dates| dates.len() <= 7));
}

#[tokio::test]
#[ignore]
async fn test_booking_requires_token() {
    let client = Client::new();

    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .json(&json!({
            "business_id": 1,
            "service_id": 1,
            "slot_id": "1_1_1_any_2030-01-07_0900",
            "participants": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_malformed_slot_id_is_bad_request() {
    let client = Client::new();
    let (business, service) = (env_id("SLOTWISE_TEST_BUSINESS"), env_id("SLOTWISE_TEST_SERVICE"));

    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .bearer_auth(token(Role::Customer, None))
        .json(&json!({
            "business_id": business,
            "service_id": service,
            "slot_id": "tomorrow-morning",
            "participants": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_zero_participants_rejected() {
    let client = Client::new();

    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .bearer_auth(token(Role::Customer, None))
        .json(&json!({
            "business_id": 1,
            "service_id": 1,
            "slot_id": "1_1_1_any_2030-01-07_0900",
            "participants": 0
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_other_business_cannot_block_slots() {
    let client = Client::new();
    let business = env_id("SLOTWISE_TEST_BUSINESS");

    let response = client
        .put(format!(
            "{}/businesses/{}/slots/{}_1_1_any_2030-01-07_0900/block",
            BASE_URL, business, business
        ))
        .bearer_auth(token(Role::Owner, Some(business + 1)))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_my_bookings_lists_for_caller() {
    let client = Client::new();

    let response = client
        .get(format!("{}/me/bookings", BASE_URL))
        .bearer_auth(token(Role::Customer, None))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}
