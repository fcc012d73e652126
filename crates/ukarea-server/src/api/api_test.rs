use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request};
use serde_json::{json, Value};
use tower::ServiceExt;
use ukarea_core::GeoPoint;
use ukarea_lookup::{ResolveOutcome, FETCH_FAILED_MESSAGE};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

fn city(name: &str, population: u64, lat: f64, lng: f64) -> CityRecord {
    CityRecord {
        name: name.to_string(),
        population,
        area_code: "0".to_string(),
        coordinates: Some(GeoPoint::new(lat, lng)),
    }
}

fn known_cities() -> Vec<CityRecord> {
    vec![
        city("London", 8_982_000, 51.5072, -0.1276),
        city("Leeds", 793_139, 53.8008, -1.5491),
        city("York", 210_618, 53.9600, -1.0873),
    ]
}

/// Directory whose startup resolution has run to completion.
async fn resolved_directory() -> Arc<CityDirectory> {
    let cities = known_cities();
    let outcomes: Vec<ResolveOutcome> = cities
        .iter()
        .filter_map(|c| c.coordinates.map(ResolveOutcome::Resolved))
        .collect();
    let directory = Arc::new(CityDirectory::new(cities));
    for (index, outcome) in outcomes.iter().enumerate() {
        directory.record(index, outcome).await;
    }
    directory.finish().await;
    directory
}

fn state_with(server: &MockServer, directory: Arc<CityDirectory>) -> AppState {
    let client = PostcodesClient::with_base_url(&server.uri(), 5, "ukarea-test/0.1", 0, 0)
        .expect("test client");
    AppState::new(Arc::new(client), SearchOptions::default(), directory)
}

async fn test_state(server: &MockServer) -> AppState {
    state_with(server, resolved_directory().await)
}

async fn test_app(server: &MockServer) -> Router {
    build_app(test_state(server).await, default_rate_limit_state())
}

fn hit(postcode: &str) -> Value {
    json!({ "query": {}, "result": [{ "postcode": postcode }] })
}

/// 0.02 degree square near Aberdeen: a 3 x 3 lattice, one request.
fn small_square() -> Value {
    json!({
        "shape": { "type": "rectangle", "south": 57.10, "west": -2.12, "north": 57.12, "east": -2.10 }
    })
}

/// Nine identical hits: one per lattice point of [`small_square`].
fn all_hits(postcode: &str) -> Value {
    let results: Vec<Value> = (0..9).map(|_| hit(postcode)).collect();
    json!({ "status": 200, "result": results })
}

/// Answers only the first bulk request, after `delay`.
async fn mount_first_bulk_response(server: &MockServer, status: u16, body: Value, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/postcodes"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body).set_delay(delay))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mount_bulk_response(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/postcodes"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

// -------------------------------------------------------------------------
// Envelope and middleware
// -------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("not_found", StatusCode::NOT_FOUND),
        ("conflict", StatusCode::CONFLICT),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "message").into_response();
        assert_eq!(response.status(), expected, "code {code}");
    }
}

#[tokio::test]
async fn health_reports_city_resolution() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let (status, json) = send_json(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["cities"]["state"], "ready");
    assert_eq!(json["data"]["cities"]["resolved"], 3);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "req-abc")
        .body(Body::empty())
        .expect("request");
    let (_, headers, body) = send(&app, request).await;
    assert_eq!(headers["x-request-id"], "req-abc");
    let json: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json["meta"]["request_id"], "req-abc");
}

#[tokio::test]
async fn session_routes_are_rate_limited() {
    let server = MockServer::start().await;
    let state = test_state(&server).await;
    let app = build_app(state, RateLimitState::new(1, Duration::from_secs(60)));

    let (first, _) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(first, StatusCode::OK);
    let (second, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");

    // Health stays reachable.
    let (health, _) = send_json(&app, get("/api/v1/health")).await;
    assert_eq!(health, StatusCode::OK);
}

// -------------------------------------------------------------------------
// Postcodes
// -------------------------------------------------------------------------

#[tokio::test]
async fn postcode_search_stores_result_and_exports_it() {
    let server = MockServer::start().await;
    let mut results: Vec<Value> = (0..8).map(|_| hit("AB12 3CD")).collect();
    results.push(hit("ab12 4ef"));
    mount_bulk_response(&server, 200, json!({ "status": 200, "result": results })).await;
    let app = test_app(&server).await;

    let (status, json) = send_json(&app, post_json("/api/v1/postcodes/search", &small_square())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ready");
    assert_eq!(json["data"]["data"]["outward_codes"], json!(["AB12"]));
    assert_eq!(json["data"]["data"]["codes"], json!(["AB12 3CD", "AB12 4EF"]));
    assert_eq!(json["data"]["data"]["points_sampled"], 9);

    let (status, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ready");

    let (status, headers, body) = send(&app, get("/api/v1/postcodes/export?format=csv")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv;charset=utf-8");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().expect("ascii");
    assert!(disposition.starts_with("attachment; filename=\"uk_postcodes_"));
    assert!(disposition.ends_with(".csv\""));
    assert_eq!(String::from_utf8(body).expect("utf8"), "Postcode\nAB12");

    let (status, headers, body) = send(&app, get("/api/v1/postcodes/export?format=xls")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/vnd.ms-excel");
    assert!(String::from_utf8(body).expect("utf8").contains("<td>AB12</td>"));
}

#[tokio::test]
async fn postcode_search_without_matches_is_empty() {
    let server = MockServer::start().await;
    let misses: Vec<Value> = (0..9).map(|_| json!({ "query": {}, "result": null })).collect();
    mount_bulk_response(&server, 200, json!({ "status": 200, "result": misses })).await;
    let app = test_app(&server).await;

    let (status, json) = send_json(&app, post_json("/api/v1/postcodes/search", &small_square())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "empty");

    let (status, json) = send_json(&app, get("/api/v1/postcodes/export")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway_and_fails_session() {
    let server = MockServer::start().await;
    mount_bulk_response(&server, 500, json!({ "status": 500, "error": "boom" })).await;
    let app = test_app(&server).await;

    let (status, json) = send_json(&app, post_json("/api/v1/postcodes/search", &small_square())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "upstream_error");
    assert_eq!(json["error"]["message"], FETCH_FAILED_MESSAGE);

    let (_, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(json["data"]["status"], "failed");
    assert_eq!(json["data"]["data"], FETCH_FAILED_MESSAGE);
}

#[tokio::test]
async fn abandoned_search_still_settles_session() {
    let server = MockServer::start().await;
    mount_first_bulk_response(&server, 200, all_hits("AB12 3CD"), Duration::from_millis(300)).await;
    let app = test_app(&server).await;

    let request = app
        .clone()
        .oneshot(post_json("/api/v1/postcodes/search", &small_square()));
    let gave_up = tokio::time::timeout(Duration::from_millis(50), request).await;
    assert!(gave_up.is_err(), "client should give up before the upstream answers");

    let mut status = Value::Null;
    for _ in 0..50 {
        let (_, json) = send_json(&app, get("/api/v1/postcodes")).await;
        status = json["data"]["status"].clone();
        if status != "loading" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "ready");
}

#[tokio::test]
async fn overlapping_searches_keep_the_newest_result() {
    let server = MockServer::start().await;
    mount_first_bulk_response(&server, 200, all_hits("AA1 1AA"), Duration::from_millis(300)).await;
    mount_bulk_response(&server, 200, all_hits("BB1 1BB")).await;
    let app = test_app(&server).await;

    let older_app = app.clone();
    let older = tokio::spawn(async move {
        send_json(&older_app, post_json("/api/v1/postcodes/search", &small_square())).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, json) = send_json(&app, post_json("/api/v1/postcodes/search", &small_square())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["data"]["outward_codes"], json!(["BB1"]));

    let (status, json) = older.await.expect("older search task");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");

    let (_, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(json["data"]["status"], "ready");
    assert_eq!(json["data"]["data"]["outward_codes"], json!(["BB1"]));
}

#[tokio::test]
async fn superseded_search_that_fails_upstream_is_a_conflict() {
    let server = MockServer::start().await;
    mount_first_bulk_response(
        &server,
        500,
        json!({ "status": 500, "error": "boom" }),
        Duration::from_millis(300),
    )
    .await;
    mount_bulk_response(&server, 200, all_hits("BB1 1BB")).await;
    let app = test_app(&server).await;

    let older_app = app.clone();
    let older = tokio::spawn(async move {
        send_json(&older_app, post_json("/api/v1/postcodes/search", &small_square())).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, _) = send_json(&app, post_json("/api/v1/postcodes/search", &small_square())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = older.await.expect("older search task");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");

    let (_, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(json["data"]["status"], "ready");
}

#[tokio::test]
async fn invalid_polygon_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = test_app(&server).await;

    let body = json!({
        "shape": { "type": "polygon", "vertices": [
            { "latitude": 51.5, "longitude": -0.1 },
            { "latitude": 51.6, "longitude": -0.1 }
        ] }
    });
    let (status, json) = send_json(&app, post_json("/api/v1/postcodes/search", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (_, json) = send_json(&app, get("/api/v1/postcodes")).await;
    assert_eq!(json["data"]["status"], "idle");
}

#[tokio::test]
async fn malformed_body_uses_error_envelope() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let (status, json) = send_json(
        &app,
        post_json("/api/v1/postcodes/search", &json!({ "shape": { "type": "circle" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(json["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn export_rejects_unknown_format() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let (status, json) = send_json(&app, get("/api/v1/postcodes/export?format=pdf")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

// -------------------------------------------------------------------------
// Cities
// -------------------------------------------------------------------------

#[tokio::test]
async fn city_search_unions_shapes_and_applies_population() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let body = json!({
        "shapes": [
            { "type": "rectangle", "south": 51.2, "west": -0.6, "north": 51.8, "east": 0.4 },
            { "type": "rectangle", "south": 53.7, "west": -1.7, "north": 54.1, "east": -1.0 }
        ],
        "min_population": 500000
    });
    let (status, json) = send_json(&app, post_json("/api/v1/cities/search", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ready");
    let names: Vec<&str> = json["data"]["data"]
        .as_array()
        .expect("city array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["London", "Leeds"]);

    let (status, _, body) = send(&app, get("/api/v1/cities/export")).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(body).expect("utf8");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("City,Population,Area Code,Latitude,Longitude")
    );
    assert_eq!(lines.count(), 2);
}

#[tokio::test]
async fn city_search_during_resolution_uses_resolved_cities() {
    let server = MockServer::start().await;
    let mut cities = known_cities();
    for city in &mut cities {
        city.coordinates = None;
    }
    let directory = Arc::new(CityDirectory::new(cities));
    directory
        .record(1, &ResolveOutcome::Resolved(GeoPoint::new(53.8008, -1.5491)))
        .await;
    let app = build_app(state_with(&server, directory), default_rate_limit_state());

    let (_, json) = send_json(&app, get("/api/v1/health")).await;
    assert_eq!(json["data"]["cities"]["state"], "pending");
    assert_eq!(json["data"]["cities"]["resolved"], 1);

    let body = json!({
        "shapes": [{ "type": "rectangle", "south": 53.7, "west": -1.7, "north": 54.1, "east": -1.0 }]
    });
    let (status, json) = send_json(&app, post_json("/api/v1/cities/search", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ready");
    let names: Vec<&str> = json["data"]["data"]
        .as_array()
        .expect("city array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Leeds"]);
}

#[tokio::test]
async fn city_search_outside_every_city_is_empty() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let body = json!({
        "shapes": [{ "type": "rectangle", "south": 57.0, "west": -5.0, "north": 57.5, "east": -4.5 }]
    });
    let (status, json) = send_json(&app, post_json("/api/v1/cities/search", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "empty");
}

#[tokio::test]
async fn city_search_mode_override_uses_polygon_outline() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    // York sits inside this triangle's bounding box but outside the triangle.
    let triangle = json!({ "type": "polygon", "vertices": [
        { "latitude": 53.7, "longitude": -1.7 },
        { "latitude": 53.7, "longitude": -1.0 },
        { "latitude": 54.0, "longitude": -1.7 }
    ] });

    let bounds = json!({ "shapes": [triangle.clone()], "mode": "bounds" });
    let (_, json) = send_json(&app, post_json("/api/v1/cities/search", &bounds)).await;
    assert_eq!(json["data"]["data"].as_array().map(Vec::len), Some(2));

    let exact = json!({ "shapes": [triangle], "mode": "exact" });
    let (_, json) = send_json(&app, post_json("/api/v1/cities/search", &exact)).await;
    let names: Vec<&str> = json["data"]["data"]
        .as_array()
        .expect("city array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Leeds"]);
}

#[tokio::test]
async fn reset_returns_both_sessions_to_idle() {
    let server = MockServer::start().await;
    let app = test_app(&server).await;

    let body = json!({
        "shapes": [{ "type": "rectangle", "south": 51.2, "west": -0.6, "north": 51.8, "east": 0.4 }]
    });
    let (status, _) = send_json(&app, post_json("/api/v1/cities/search", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send_json(&app, post_json("/api/v1/reset", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["cities"]["status"], "idle");

    let (_, json) = send_json(&app, get("/api/v1/cities")).await;
    assert_eq!(json["data"]["status"], "idle");
    let (status, _) = send_json(&app, get("/api/v1/cities/export")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
