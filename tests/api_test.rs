//! HTTP tests driving the full router: auth, item listing and writes,
//! rentals and categories.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rentshare::config::Config;
use rentshare::state::AppState;
use rentshare::{db, routes};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // For oneshot()

struct TestApp {
    router: Router,
    _temp: TempDir,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let pool = db::create_pool(&temp.path().join("test.db"), 4).unwrap();
        db::run_migrations(&pool).unwrap();

        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        let router = routes::app(AppState::new(pool, config));
        Self {
            router,
            _temp: temp,
        }
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "testserver")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        let mut builder = Request::builder()
            .uri(uri)
            .header(header::HOST, "testserver");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn signup(&self, username: &str) -> Reply {
        self.json(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret"
            }),
        )
        .await
    }

    async fn login(&self, username: &str, password: &str) -> Reply {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={username}&password={password}")))
            .unwrap();
        self.send(request).await
    }

    /// Signs up and logs in, returning the bearer token.
    async fn user(&self, username: &str) -> String {
        assert_eq!(self.signup(username).await.status, StatusCode::CREATED);
        let reply = self.login(username, "secret").await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.body["access_token"].as_str().unwrap().to_string()
    }

    async fn create_item(&self, token: &str, body: Value) -> Value {
        let reply = self.json(Method::POST, "/api/items", Some(token), body).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body
    }
}

fn drill() -> Value {
    json!({
        "name": "Bosch drill",
        "description": "800 W",
        "price_per_h": 4.5,
        "image_urls": ["https://img.example/drill.jpg"]
    })
}

fn two_hours(item_id: &Value) -> Value {
    json!({
        "item_id": item_id,
        "start_at": "2025-01-01T10:00:00Z",
        "end_at": "2025-01-01T12:00:00Z"
    })
}

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new();
    let reply = app.get("/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Value::String("ok".into()));
}

#[tokio::test]
async fn signup_and_login() {
    let app = TestApp::new();

    let reply = app.signup("alice").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["username"], "alice");
    assert_eq!(reply.body["email"], "alice@example.com");
    assert!(reply.body.get("password_hash").is_none());

    let reply = app.login("alice", "secret").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["token_type"], "bearer");
    assert!(reply.body["access_token"].as_str().is_some());

    assert_eq!(app.signup("alice").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.login("alice", "wrong").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn malformed_signup_is_unprocessable() {
    let app = TestApp::new();
    let reply = app
        .json(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "username": "al", "email": "not-an-email", "password": "x" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["detail"][0]["field"], "username");
    assert_eq!(reply.body["detail"][1]["field"], "email");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new();
    let reply = app.json(Method::POST, "/api/items", None, drill()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.headers[header::WWW_AUTHENTICATE], "Bearer");

    let reply = app.get("/api/rentals/me", Some("not-a-token")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rent_and_return_flow() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let item = app.create_item(&alice, drill()).await;
    assert_eq!(item["available"], true);
    assert_eq!(item["image_url"], "https://img.example/drill.jpg");
    let item_uri = format!("/api/items/{}", item["id"]);

    let reply = app
        .json(Method::POST, "/api/rentals", Some(&bob), two_hours(&item["id"]))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let rental = reply.body;
    assert_eq!(rental["deposit"], 10.8);
    assert_eq!(rental["returned"], false);
    assert_eq!(rental["item_id"], item["id"]);

    assert_eq!(app.get(&item_uri, None).await.body["available"], false);

    // a second renter is turned away while the item is out
    let carol = app.user("carol").await;
    let reply = app
        .json(Method::POST, "/api/rentals", Some(&carol), two_hours(&item["id"]))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let mine = app.get("/api/rentals/me", Some(&bob)).await.body;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let return_uri = format!("/api/rentals/{}/return", rental["id"]);
    // only the renter may return it
    let reply = app.json(Method::POST, &return_uri, Some(&alice), Value::Null).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.json(Method::POST, &return_uri, Some(&bob), Value::Null).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["returned"], true);
    assert_eq!(app.get(&item_uri, None).await.body["available"], true);
}

#[tokio::test]
async fn rental_period_must_be_positive() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let item = app.create_item(&alice, drill()).await;

    let reply = app
        .json(
            Method::POST,
            "/api/rentals",
            Some(&alice),
            json!({
                "item_id": item["id"],
                "start_at": "2025-01-01T12:00:00Z",
                "end_at": "2025-01-01T10:00:00Z"
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["detail"][0]["field"], "end_at");
    assert_eq!(app.get("/api/items/1", None).await.body["available"], true);
}

#[tokio::test]
async fn listing_sets_total_count_and_link_headers() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    for name in ["Drill", "Ladder", "Saw"] {
        app.create_item(
            &alice,
            json!({
                "name": name,
                "price_per_h": 2.0,
                "image_urls": ["https://img.example/x.jpg"]
            }),
        )
        .await;
    }

    let first = app.get("/api/items?limit=2", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers["x-total-count"], "3");
    assert_eq!(first.body.as_array().unwrap().len(), 2);
    assert_eq!(
        first.headers[header::LINK],
        "<http://testserver/api/items?skip=2&limit=2>; rel=\"next\""
    );

    let last = app.get("/api/items?skip=2&limit=2", None).await;
    assert_eq!(last.body.as_array().unwrap().len(), 1);
    assert_eq!(
        last.headers[header::LINK],
        "<http://testserver/api/items?skip=0&limit=2>; rel=\"prev\""
    );

    let all = app.get("/api/items", None).await;
    assert_eq!(all.headers["x-total-count"], "3");
    assert!(all.headers.get(header::LINK).is_none());

    let none = app.get("/api/items?name=kayak", None).await;
    assert_eq!(none.headers["x-total-count"], "0");
    assert_eq!(none.body, json!([]));
}

#[tokio::test]
async fn links_carry_filters_and_repeat_categories() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let tools = app
        .json(Method::POST, "/api/categories", None, json!({ "name": "tools" }))
        .await
        .body;
    let garden = app
        .json(Method::POST, "/api/categories", None, json!({ "name": "garden" }))
        .await
        .body;
    for _ in 0..3 {
        app.create_item(
            &alice,
            json!({
                "name": "Shears",
                "price_per_h": 3.0,
                "image_urls": ["https://img.example/s.jpg"],
                "categories": [tools["id"], garden["id"]]
            }),
        )
        .await;
    }

    let uri = format!(
        "/api/items?categories={}&categories={}&max_price=5&order_by=price&limit=1",
        tools["id"], garden["id"]
    );
    let reply = app.get(&uri, None).await;
    assert_eq!(reply.headers["x-total-count"], "3");
    let link = reply.headers[header::LINK].to_str().unwrap();
    assert_eq!(
        link,
        format!(
            "<http://testserver/api/items?max_price=5&categories={}&categories={}\
             &order_by=price&skip=1&limit=1>; rel=\"next\"",
            tools["id"], garden["id"]
        )
    );
}

#[tokio::test]
async fn invalid_sort_parameters_are_rejected() {
    let app = TestApp::new();
    let reply = app.get("/api/items?order_by=owner", None).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let reply = app.get("/api/items?limit=0", None).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_categories_are_named_in_the_error() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let tools = app
        .json(Method::POST, "/api/categories", None, json!({ "name": "tools" }))
        .await
        .body;

    let mut body = drill();
    body["categories"] = json!([tools["id"], 99]);
    let reply = app.json(Method::POST, "/api/items", Some(&alice), body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["missing"], json!([99]));

    let listing = app.get("/api/items", None).await;
    assert_eq!(listing.headers["x-total-count"], "0");
}

#[tokio::test]
async fn gallery_replacement_resyncs_legacy_image() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let mut body = drill();
    body["image_urls"] = json!([
        "https://img.example/1.jpg",
        "https://img.example/2.jpg",
        "https://img.example/3.jpg"
    ]);
    let item = app.create_item(&alice, body).await;
    assert_eq!(item["images"].as_array().unwrap().len(), 3);

    let uri = format!("/api/items/{}", item["id"]);
    let reply = app
        .json(
            Method::PATCH,
            &uri,
            Some(&alice),
            json!({ "image_urls": ["https://cdn.example/a.jpg", "https://cdn.example/b.jpg"] }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["images"].as_array().unwrap().len(), 2);
    assert_eq!(reply.body["image_url"], "https://cdn.example/a.jpg");
    assert_eq!(reply.body["name"], "Bosch drill");
}

#[tokio::test]
async fn patch_rejects_unknown_fields_and_null_names() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let item = app.create_item(&alice, drill()).await;
    let uri = format!("/api/items/{}", item["id"]);

    let reply = app
        .json(Method::PATCH, &uri, Some(&alice), json!({ "owner_id": 2 }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = app
        .json(Method::PATCH, &uri, Some(&alice), json!({ "name": null }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["detail"][0]["field"], "name");
}

#[tokio::test]
async fn put_replaces_base_fields_only() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let item = app.create_item(&alice, drill()).await;
    let uri = format!("/api/items/{}", item["id"]);

    let reply = app
        .json(
            Method::PUT,
            &uri,
            Some(&alice),
            json!({ "name": "Hammer PRO", "price_per_h": 4 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["name"], "Hammer PRO");
    assert_eq!(reply.body["price_per_h"], 4.0);
    assert_eq!(reply.body["description"], Value::Null);
    // gallery untouched when omitted
    assert_eq!(reply.body["image_url"], "https://img.example/drill.jpg");
}

#[tokio::test]
async fn other_users_cannot_touch_an_item() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let item = app.create_item(&alice, drill()).await;
    let uri = format!("/api/items/{}", item["id"]);

    let reply = app
        .json(Method::PATCH, &uri, Some(&bob), json!({ "price_per_h": 1.0 }))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.json(Method::DELETE, &uri, Some(&bob), Value::Null).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    assert_eq!(app.get(&uri, None).await.body["price_per_h"], 4.5);
}

#[tokio::test]
async fn owner_lists_and_deletes_items() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let item = app.create_item(&alice, drill()).await;
    app.create_item(&bob, drill()).await;

    let mine = app.get("/api/items/me", Some(&alice)).await.body;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], item["id"]);

    let uri = format!("/api/items/{}", item["id"]);
    let reply = app.json(Method::DELETE, &uri, Some(&alice), Value::Null).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_rented_item_conflicts() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let item = app.create_item(&alice, drill()).await;
    app.json(Method::POST, "/api/rentals", Some(&bob), two_hours(&item["id"]))
        .await;

    let uri = format!("/api/items/{}", item["id"]);
    let reply = app.json(Method::DELETE, &uri, Some(&alice), Value::Null).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn categories_are_listed_alphabetically() {
    let app = TestApp::new();
    for name in ["tools", "camping"] {
        let reply = app
            .json(Method::POST, "/api/categories", None, json!({ "name": name }))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }
    let reply = app
        .json(Method::POST, "/api/categories", None, json!({ "name": "tools" }))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let list = app.get("/api/categories", None).await.body;
    assert_eq!(list[0]["name"], "camping");
    assert_eq!(list[1]["name"], "tools");

    let reply = app.get("/api/categories/999", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
