//! HTTP surface over the in-process store: routing, identity and error mapping

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;

use slotwise_server::{
    api,
    config::{AppConfig, AuthConfig, BookingConfig, DatabaseConfig, LoggingConfig, ServerConfig},
    models::{Role, SlotKey, UserClaims},
    repository::{memory::MemoryStore, Repository},
    services::{clock::FixedClock, Services},
    AppState,
};

struct Api {
    router: Router,
    secret: String,
    business: i32,
    service: i32,
    slot_id: String,
}

async fn api() -> Api {
    let store = MemoryStore::new();
    let business = store
        .add_business(
            "Barber",
            json!({"monday": {"is_open": true, "start": "10:00", "end": "14:00"}}),
            "UTC",
        )
        .await;
    let venue = store.add_venue(business, "Shop", true).await;
    let service = store
        .add_service(business, "Haircut", 30, Decimal::new(2500, 2), 1)
        .await;

    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        auth: AuthConfig::default(),
        logging: LoggingConfig::default(),
        booking: BookingConfig::default(),
    };
    let secret = config.auth.jwt_secret.clone();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
    ));
    let services = Services::new(
        Repository::in_memory(store),
        config.booking.clone(),
        clock,
    );
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let slot_id = SlotKey {
        business_id: business,
        venue_id: venue,
        service_id: service,
        staff_id: None,
        date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        start_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
    }
    .token();

    Api {
        router: api::router(state, Duration::from_secs(5)),
        secret,
        business,
        service,
        slot_id,
    }
}

impl Api {
    fn token(&self, user_id: i32, role: Role, business_id: Option<i32>) -> String {
        UserClaims {
            user_id,
            name: "Grace".into(),
            email: None,
            phone: None,
            role,
            business_id,
            exp: Utc::now().timestamp() + 600,
        }
        .create_token(&self.secret)
        .unwrap()
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn booking_body(&self) -> Value {
        json!({
            "business_id": self.business,
            "service_id": self.service,
            "slot_id": self.slot_id,
            "participants": 1
        })
    }
}

#[tokio::test]
async fn slot_listing_returns_tokens() {
    let api = api().await;
    let (status, body) = api
        .call(
            Method::GET,
            &format!(
                "/api/v1/businesses/{}/services/{}/slots?date=2026-10-19",
                api.business, api.service
            ),
            None,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let slots = body.as_array().unwrap();
    assert_eq!(slots.len(), 8);
    assert_eq!(slots[1]["slot_id"], api.slot_id.as_str());
    assert_eq!(slots[1]["status"], "available");
}

#[tokio::test]
async fn booking_flow_maps_errors_to_statuses() {
    let api = api().await;
    let ada = api.token(7, Role::Customer, None);
    let bob = api.token(8, Role::Customer, None);

    let (status, _) = api
        .call(Method::POST, "/api/v1/bookings", None, Some(api.booking_body()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = api
        .call(Method::POST, "/api/v1/bookings", Some(&ada), Some(api.booking_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "unassigned");
    assert_eq!(created["customer_details"]["name"], "Grace");
    let id = created["id"].as_i64().unwrap();

    // Capacity 1 is taken
    let (status, body) = api
        .call(Method::POST, "/api/v1/bookings", Some(&bob), Some(api.booking_body()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "SlotUnavailable");

    // Someone else's booking
    let (status, _) = api
        .call(Method::GET, &format!("/api/v1/bookings/{}", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = api
        .call(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", id),
            Some(&ada),
            Some(json!({"reason": "moved away"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) = api
        .call(Method::POST, &format!("/api/v1/bookings/{}/cancel", id), Some(&ada), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn request_validation_and_capacity_ceiling() {
    let api = api().await;
    let ada = api.token(7, Role::Customer, None);

    let mut body = api.booking_body();
    body["participants"] = json!(0);
    let (status, _) = api
        .call(Method::POST, "/api/v1/bookings", Some(&ada), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = api.booking_body();
    body["participants"] = json!(2);
    let (status, body) = api
        .call(Method::POST, "/api/v1/bookings", Some(&ada), Some(body))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "CapacityExceeded");
}

#[tokio::test]
async fn slot_administration_requires_the_business() {
    let api = api().await;
    let uri = format!("/api/v1/businesses/{}/slots/{}/block", api.business, api.slot_id);

    let stranger = api.token(9, Role::Owner, Some(api.business + 50));
    let (status, _) = api.call(Method::PUT, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner = api.token(9, Role::Owner, Some(api.business));
    let (status, slot) = api.call(Method::PUT, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["status"], "blocked");

    let (status, slot) = api.call(Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["status"], "available");
}

#[tokio::test]
async fn health_endpoints_answer() {
    let api = api().await;
    let (status, body) = api.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = api.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let api = api().await;
    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = assert_ok!(api.router.clone().oneshot(request).await);
    assert_eq!(response.status(), StatusCode::OK);
}
