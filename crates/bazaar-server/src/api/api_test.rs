use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use bazaar_core::{password, CustomerDetails};
use bazaar_db::ProductRow;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use super::*;
use crate::session::TokenService;

const SECRET: &str = "0123456789abcdef0123456789abcdef";
const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-password";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_state(pool: sqlx::PgPool) -> AppState {
    AppState {
        pool,
        tokens: TokenService::new(SECRET, 7, false),
        uploads: Arc::new(UploadSettings {
            dir: std::env::temp_dir().join(format!("bazaar-uploads-{}", Uuid::new_v4())),
            max_bytes: 1024,
            public_url: "http://localhost:5000".to_string(),
        }),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
    }
}

fn test_app(pool: sqlx::PgPool) -> Router {
    build_app(test_state(pool), default_rate_limit_state())
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, headers, json)
}

/// `token=...` pair from the response's `Set-Cookie` header.
fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("set-cookie header")
        .to_string()
}

async fn register(app: &Router, username: &str) -> String {
    let (status, headers, _) = send(
        app,
        request(
            Method::POST,
            "/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter2-but-longer",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}");
    session_cookie(&headers)
}

async fn admin_cookie(pool: &sqlx::PgPool, app: &Router) -> String {
    let hash = password::hash_password(ADMIN_PASSWORD).expect("hash");
    bazaar_db::seed_admin_account(pool, "admin", ADMIN_EMAIL, &hash)
        .await
        .expect("seed admin");

    let (status, headers, _) = send(
        app,
        request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login");
    session_cookie(&headers)
}

async fn insert_product(pool: &sqlx::PgPool, name: &str, cents: i64) -> ProductRow {
    let slug = bazaar_db::generate_unique_slug(pool, name)
        .await
        .expect("slug");
    bazaar_db::create_product(
        pool,
        &bazaar_db::NewProduct {
            name,
            slug: &slug,
            price: Decimal::new(cents, 2),
            category: "tea",
            image: "/uploads/tea.jpg",
        },
    )
    .await
    .expect("insert product")
}

async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count")
}

// ---------------------------------------------------------------------------
// Error envelope (no DB)
// ---------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    for (code, status) in [
        ("not_found", StatusCode::NOT_FOUND),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("forbidden", StatusCode::FORBIDDEN),
        ("bad_request", StatusCode::BAD_REQUEST),
        ("validation_error", StatusCode::BAD_REQUEST),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = ApiError::new("req-1", code, "message").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[test]
fn api_error_serializes_message_and_code() {
    let error = ApiError::new("req-9", "not_found", "Product not found");
    let json = serde_json::to_value(&error).expect("serialize");
    assert_eq!(json["message"], "Product not found");
    assert_eq!(json["code"], "not_found");
    assert_eq!(json["meta"]["request_id"], "req-9");
}

// ---------------------------------------------------------------------------
// Public catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (status, headers, json) = send(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert!(headers.contains_key("x-request-id"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn products_list_detail_and_search(pool: sqlx::PgPool) {
    let tea = insert_product(&pool, "Himalayan Black Tea", 500).await;
    let app = test_app(pool);

    let (status, _, json) = send(&app, request(Method::GET, "/products?category=TEA", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["data"][0]["price"].as_f64(), Some(5.0));

    let uri = format!("/products/{}", tea.slug);
    let (status, _, json) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Himalayan Black Tea");

    let (status, _, json) = send(&app, request(Method::GET, "/products/no-such-thing", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");

    let (_, _, json) = send(&app, request(Method::GET, "/search?q=black", None, None)).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));

    let (_, _, json) = send(&app, request(Method::GET, "/search?q=%20%20", None, None)).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn shipping_cities_lists_the_fee_table(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (status, _, json) = send(&app, request(Method::GET, "/shipping/cities", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    let cities = json["data"].as_array().expect("array");
    assert_eq!(cities.len(), 6);
    assert_eq!(cities[0]["name"], "Kathmandu");
    assert_eq!(cities[0]["fee"].as_f64(), Some(3.5));
}

// ---------------------------------------------------------------------------
// Accounts & sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn register_sets_cookie_and_me_reads_it(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;
    assert!(cookie.starts_with("token="));

    let (status, _, json) = send(&app, request(Method::GET, "/me", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["username"], "asha");
    assert_eq!(json["data"]["user"]["role"], "user");

    let (status, _, json) = send(&app, request(Method::GET, "/me", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["user"].is_null());

    let (status, _, json) = send(&app, request(Method::GET, "/me", Some("token=garbage"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["user"].is_null());
}

#[sqlx::test(migrations = "../../migrations")]
async fn register_rejects_duplicates_and_missing_fields(pool: sqlx::PgPool) {
    let app = test_app(pool);
    register(&app, "asha").await;

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "other", "email": "ASHA@example.com", "password": "pw" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Username or email already taken");

    let (status, _, _) = send(
        &app,
        request(Method::POST, "/register", None, Some(json!({ "username": "x" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn login_rejects_wrong_password(pool: sqlx::PgPool) {
    let app = test_app(pool);
    register(&app, "asha").await;

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": "wrong" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Invalid email or password");

    let (status, headers, _) = send(
        &app,
        request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "Asha@Example.com", "password": "hunter2-but-longer" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(session_cookie(&headers).starts_with("token="));
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_json_is_a_bad_request(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");

    let (status, _, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn unauthenticated_mutations_are_rejected_without_side_effects(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Masala Chai", 450).await;
    let app = test_app(pool.clone());

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            None,
            Some(json!({ "product_id": product.public_id, "quantity": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(count(&pool, "cart_items").await, 0);

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/admin/products",
            None,
            Some(json!({ "name": "Sneaky", "price": 1, "category": "x", "image": "x.jpg" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/admin/products/{}", product.slug);
    let (status, _, _) = send(&app, request(Method::DELETE, &uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(count(&pool, "products").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn regular_users_cannot_reach_admin_routes(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;

    let (status, _, json) = send(&app, request(Method::GET, "/admin/users", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_sessions_have_no_cart(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Singing Bowl", 2499).await;
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;

    let (status, _, json) = send(&app, request(Method::GET, "/cart", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            Some(&admin),
            Some(json!({ "product_id": product.public_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(count(&pool, "cart_items").await, 0);
}

// ---------------------------------------------------------------------------
// Cart, wishlist & checkout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn cart_add_merges_quantities(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Dhaka Topi", 1250).await;
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;

    send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            Some(&cookie),
            Some(json!({ "product_id": product.public_id, "quantity": 2 })),
        ),
    )
    .await;
    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            Some(&cookie),
            Some(json!({ "productId": product.public_id, "quantity": 3 })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let lines = json["data"].as_array().expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 5);
    assert_eq!(lines[0]["product"]["name"], "Dhaka Topi");
}

#[sqlx::test(migrations = "../../migrations")]
async fn cart_add_validates_quantity_and_product(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Dhaka Topi", 1250).await;
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            Some(&cookie),
            Some(json!({ "product_id": product.public_id, "quantity": 0 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/cart/add",
            Some(&cookie),
            Some(json!({ "product_id": Uuid::new_v4() })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cart_update_sets_removes_and_reports_missing_lines(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Pashmina Shawl", 3900).await;
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;
    let body = |quantity: i64| Some(json!({ "product_id": product.public_id, "quantity": quantity }));

    let (status, _, _) = send(&app, request(Method::POST, "/cart/update", Some(&cookie), body(2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, request(Method::POST, "/cart/add", Some(&cookie), body(1))).await;
    let (status, _, json) = send(&app, request(Method::POST, "/cart/update", Some(&cookie), body(4))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["quantity"], 4);

    let (status, _, json) = send(&app, request(Method::POST, "/cart/update", Some(&cookie), body(0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_toggle_round_trip(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Prayer Flags", 300).await;
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;
    let body = Some(json!({ "productId": product.public_id }));

    let (status, _, json) = send(&app, request(Method::POST, "/wishlist/toggle", Some(&cookie), body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["wishlisted"], true);

    let (_, _, json) = send(&app, request(Method::GET, "/wishlist", Some(&cookie), None)).await;
    assert_eq!(json["data"][0]["slug"], product.slug);

    let (_, _, json) = send(&app, request(Method::POST, "/wishlist/toggle", Some(&cookie), body)).await;
    assert_eq!(json["data"]["wishlisted"], false);
    assert_eq!(json["data"]["wishlist"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn checkout_computes_totals_and_empties_cart(pool: sqlx::PgPool) {
    let a = insert_product(&pool, "Product A", 500).await;
    let b = insert_product(&pool, "Product B", 300).await;
    let app = test_app(pool);
    let cookie = register(&app, "asha").await;

    for (id, quantity) in [(a.public_id, 2), (b.public_id, 1)] {
        send(
            &app,
            request(
                Method::POST,
                "/cart/add",
                Some(&cookie),
                Some(json!({ "product_id": id, "quantity": quantity })),
            ),
        )
        .await;
    }

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/orders/checkout",
            Some(&cookie),
            Some(json!({
                "name": "Asha",
                "email": "asha@example.com",
                "address": { "street": "Thamel", "city": "Kathmandu" },
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let order = &json["data"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal"].as_f64(), Some(13.0));
    assert_eq!(order["delivery_fee"].as_f64(), Some(3.5));
    assert_eq!(order["grand_total"].as_f64(), Some(16.5));
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));

    let (_, _, json) = send(&app, request(Method::GET, "/cart", Some(&cookie), None)).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));

    let (_, _, json) = send(&app, request(Method::GET, "/orders", Some(&cookie), None)).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn checkout_rejects_missing_fields_and_empty_cart(pool: sqlx::PgPool) {
    let app = test_app(pool.clone());
    let cookie = register(&app, "asha").await;

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/orders/checkout",
            Some(&cookie),
            Some(json!({ "name": "Asha", "email": "asha@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "name, email, city are required");

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/orders/checkout",
            Some(&cookie),
            Some(json!({ "name": "Asha", "email": "a@b.c", "address": { "city": "Pokhara" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Cart is empty");
    assert_eq!(count(&pool, "orders").await, 0);
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn admin_product_create_generates_unique_slugs(pool: sqlx::PgPool) {
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;

    let create = |name: &str| {
        Some(json!({ "name": name, "price": 9.999, "category": "Gadgets", "image": "w.jpg" }))
    };

    let (status, _, json) = send(&app, request(Method::POST, "/admin/products", Some(&admin), create("Widget"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["slug"], "widget");
    assert_eq!(json["data"]["price"].as_f64(), Some(10.0));
    assert_eq!(json["data"]["category"], "gadgets");

    let (status, _, json) = send(&app, request(Method::POST, "/admin/products", Some(&admin), create("Widget!"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["slug"], "widget-2");

    let (status, _, json) = send(&app, request(Method::POST, "/admin/products", Some(&admin), create("WIDGET"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Product name already exists");

    let (status, _, json) = send(
        &app,
        request(Method::POST, "/admin/products", Some(&admin), Some(json!({ "name": "Half" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing fields");
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_product_price_beyond_column_range_is_a_bad_request(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Brass Lamp", 1500).await;
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;

    let (status, _, json) = send(
        &app,
        request(
            Method::POST,
            "/admin/products",
            Some(&admin),
            Some(json!({
                "name": "Gold Bar",
                "price": 100_000_000_000.0,
                "category": "metals",
                "image": "gold.jpg",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
    assert_eq!(count(&pool, "products").await, 1);

    let uri = format!("/admin/products/{}", product.slug);
    let (status, _, _) = send(
        &app,
        request(Method::PATCH, &uri, Some(&admin), Some(json!({ "price": 100_000_000_000.0 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored: Decimal = sqlx::query_scalar("SELECT price FROM products WHERE slug = $1")
        .bind(&product.slug)
        .fetch_one(&pool)
        .await
        .expect("price");
    assert_eq!(stored, Decimal::new(1500, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_product_update_keeps_slug(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Old Tea", 500).await;
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;

    let uri = format!("/admin/products/{}", product.slug);
    let (status, _, json) = send(
        &app,
        request(Method::PATCH, &uri, Some(&admin), Some(json!({ "name": "New Tea", "price": 6 }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "New Tea");
    assert_eq!(json["data"]["slug"], "old-tea");
    assert_eq!(json["data"]["price"].as_f64(), Some(6.0));

    let (status, _, _) = send(
        &app,
        request(Method::PATCH, "/admin/products/missing", Some(&admin), Some(json!({ "price": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_product_delete_cascades_but_keeps_orders(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Prayer Flags", 300).await;
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;
    let buyer = register(&app, "buyer").await;
    let browser = register(&app, "browser").await;
    let add = Some(json!({ "product_id": product.public_id, "quantity": 1 }));

    send(&app, request(Method::POST, "/cart/add", Some(&buyer), add.clone())).await;
    send(
        &app,
        request(
            Method::POST,
            "/orders/checkout",
            Some(&buyer),
            Some(json!({ "name": "B", "email": "b@example.com", "address": { "city": "Butwal" } })),
        ),
    )
    .await;
    send(&app, request(Method::POST, "/cart/add", Some(&browser), add)).await;

    let uri = format!("/admin/products/{}", product.slug);
    let (status, _, json) = send(&app, request(Method::DELETE, &uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["cart_lines_removed"], 1);

    let (_, _, json) = send(&app, request(Method::GET, "/cart", Some(&browser), None)).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));

    let (_, _, json) = send(&app, request(Method::GET, "/orders", Some(&buyer), None)).await;
    assert_eq!(json["data"][0]["items"][0]["name"], "Prayer Flags");
    assert_eq!(json["data"][0]["grand_total"].as_f64(), Some(7.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_order_status_changes_nothing(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "Tea", 500).await;
    let user = bazaar_db::create_user(&pool, "asha", "asha@example.com", "hash", "user")
        .await
        .expect("user");
    bazaar_db::add_to_cart(&pool, user.id, product.public_id, 1)
        .await
        .expect("add");
    let customer = CustomerDetails::new(Some("Asha"), Some("asha@example.com"), None, Some("Pokhara"))
        .expect("customer");
    let bazaar_db::CheckoutOutcome::Placed(placed) = bazaar_db::checkout(&pool, user.id, &customer)
        .await
        .expect("checkout")
    else {
        panic!("order expected");
    };

    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;
    let uri = format!("/admin/orders/{}", placed.order.public_id);

    let (status, _, json) = send(
        &app,
        request(Method::PATCH, &uri, Some(&admin), Some(json!({ "status": "shipped" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid status");

    let stored: String = sqlx::query_scalar("SELECT status FROM orders WHERE public_id = $1")
        .bind(placed.order.public_id)
        .fetch_one(&pool)
        .await
        .expect("status");
    assert_eq!(stored, "pending");

    let (status, _, json) = send(
        &app,
        request(Method::PATCH, &uri, Some(&admin), Some(json!({ "status": "delivered" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "delivered");

    let (status, _, _) = send(
        &app,
        request(Method::PATCH, "/admin/orders/not-a-uuid", Some(&admin), Some(json!({ "status": "pending" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, json) = send(&app, request(Method::GET, "/admin/orders", Some(&admin), None)).await;
    assert_eq!(json["data"][0]["user"]["username"], "asha");

    let (status, _, _) = send(&app, request(Method::DELETE, &uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, request(Method::DELETE, &uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_user_management(pool: sqlx::PgPool) {
    let app = test_app(pool.clone());
    let admin = admin_cookie(&pool, &app).await;
    let shopper = register(&app, "asha").await;

    let (status, _, json) = send(&app, request(Method::GET, "/admin/users", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    let users = json["data"].as_array().expect("users");
    assert_eq!(users.len(), 2);
    let find = |role: &str| {
        users
            .iter()
            .find(|u| u["role"] == role)
            .and_then(|u| u["id"].as_str())
            .expect("user with role")
            .to_string()
    };
    let (admin_id, shopper_id) = (find("admin"), find("user"));

    let (status, _, _) = send(&app, request(Method::DELETE, &format!("/admin/users/{admin_id}"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, request(Method::DELETE, &format!("/admin/users/{}", Uuid::new_v4()), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, request(Method::DELETE, &format!("/admin/users/{shopper_id}"), Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);

    // The deleted user's still-valid token reads empty and cannot mutate.
    let (status, _, json) = send(&app, request(Method::GET, "/cart", Some(&shopper), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));

    let (status, _, _) = send(
        &app,
        request(Method::POST, "/wishlist/toggle", Some(&shopper), Some(json!({ "product_id": Uuid::new_v4() }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn multipart_request(cookie: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "bazaar-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"tea.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

#[sqlx::test(migrations = "../../migrations")]
async fn upload_stores_images_and_rejects_others(pool: sqlx::PgPool) {
    let state = test_state(pool.clone());
    let upload_dir = state.uploads.dir.clone();
    let app = build_app(state, default_rate_limit_state());
    let admin = admin_cookie(&pool, &app).await;

    let (status, _, json) = send(&app, multipart_request(&admin, "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Only image uploads are allowed");

    let (status, _, _) = send(&app, multipart_request(&admin, "image/png", &[0u8; 2048])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, json) = send(&app, multipart_request(&admin, "image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::CREATED);
    let path = json["data"]["path"].as_str().expect("path").to_string();
    assert!(path.starts_with("/uploads/") && path.ends_with(".png"));
    assert_eq!(
        json["data"]["url"].as_str(),
        Some(format!("http://localhost:5000{path}").as_str())
    );

    let stored = upload_dir.join(path.trim_start_matches("/uploads/"));
    assert_eq!(std::fs::read(&stored).expect("stored file"), b"\x89PNG fake");

    let served = app
        .clone()
        .oneshot(request(Method::GET, &path, None, None))
        .await
        .expect("response");
    assert_eq!(served.status(), StatusCode::OK);
    let bytes = to_bytes(served.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(&bytes[..], b"\x89PNG fake");

    std::fs::remove_dir_all(&upload_dir).ok();
}
