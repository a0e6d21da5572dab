use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use kicks_api::storage::{ImageStore, sha256_hex};
use kicks_api::{AppState, AppStateInner, router};
use kicks_db::Database;
use kicks_gateway::Dispatcher;

const SECRET: &str = "test-secret-for-api-tests";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

struct TestApp {
    app: Router,
    state: AppState,
    image_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.image_dir);
    }
}

struct User {
    id: Uuid,
    token: String,
}

async fn test_app() -> TestApp {
    let image_dir = std::env::temp_dir().join(format!("kicks_api_test_{}", Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        dispatcher: Dispatcher::new(),
        images: ImageStore::new(image_dir.clone()).await.unwrap(),
        max_image_bytes: 1024,
    });
    TestApp {
        app: router(state.clone()),
        state,
        image_dir,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn register(&self, email: &str) -> User {
        let (status, body) = self
            .json(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "hunter22",
                    "confirm_password": "hunter22",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        User {
            id: body["user_id"].as_str().unwrap().parse().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    async fn upload(&self, user: &User, content_type: &str, data: &[u8]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/images")
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(data.to_vec()))
            .unwrap();
        self.send(req).await
    }

    async fn post_listing(&self, user: &User, foot: &str, brand: &str, size: &str) -> Value {
        let (status, image) = self.upload(user, "image/png", PNG).await;
        assert_eq!(status, StatusCode::CREATED, "{image}");
        let (status, body) = self
            .json(
                "POST",
                "/listings",
                Some(&user.token),
                Some(json!({
                    "foot": foot,
                    "brand": brand,
                    "model": "Air Max 90",
                    "size": size,
                    "condition": "Like new",
                    "image_ids": [image["image_id"]],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn post_request(&self, user: &User, foot: &str, brand: &str, size: &str) -> Value {
        let (status, body) = self
            .json(
                "POST",
                "/requests",
                Some(&user.token),
                Some(json!({ "foot": foot, "brand": brand, "size": size })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn notifications(&self, user: &User) -> Vec<Value> {
        let (status, body) = self
            .json("GET", "/notifications", Some(&user.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().unwrap().clone()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;
    let (status, body) = app.json("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_and_login() {
    let app = test_app().await;

    let (status, body) = app
        .json(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "a@kicks.io", "password": "hunter22", "confirm_password": "hunter23" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Passwords don't match!");

    let (status, body) = app
        .json(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "a@kicks.io", "password": "abc", "confirm_password": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");

    let user = app.register("A@Kicks.io").await;

    let (status, _) = app
        .json(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "a@kicks.io", "password": "hunter22", "confirm_password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "a@kicks.io", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, body) = app
        .json(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "a@kicks.io", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user.id.to_string());
    assert_eq!(body["display_name"], "a");

    let (status, me) = app.json("GET", "/users/me", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@kicks.io");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app().await;

    let (status, body) = app.json("GET", "/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to continue");

    let (status, body) = app
        .json("GET", "/notifications", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to continue");
}

#[tokio::test]
async fn listing_notifies_matching_requester_only() {
    let app = test_app().await;
    let buyer = app.register("buyer@kicks.io").await;
    let seller = app.register("seller@kicks.io").await;

    app.post_request(&buyer, "left", "nike", "10").await;

    let created = app.post_listing(&seller, "left", " Nike ", "10").await;
    assert_eq!(created["notified"], 1);
    assert_eq!(created["listing"]["brand"], "nike");

    let inbox = app.notifications(&buyer).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["kind"], "match");
    assert_eq!(inbox[0]["read"], false);
    assert_eq!(inbox[0]["source"]["source_type"], "listing");
    assert_eq!(inbox[0]["source"]["source_id"], created["listing"]["id"]);
    assert_eq!(
        inbox[0]["message"],
        "A left foot nike Air Max 90 (Size 10) is now available!"
    );

    let other_size = app.post_listing(&seller, "left", "nike", "10.5").await;
    assert_eq!(other_size["notified"], 0);
    let other_foot = app.post_listing(&seller, "right", "nike", "10").await;
    assert_eq!(other_foot["notified"], 0);
    assert_eq!(app.notifications(&buyer).await.len(), 1);

    assert!(app.notifications(&seller).await.is_empty());
}

#[tokio::test]
async fn request_notifies_matching_seller() {
    let app = test_app().await;
    let seller = app.register("seller@kicks.io").await;
    let buyer = app.register("buyer@kicks.io").await;

    app.post_listing(&seller, "right", "adidas", "9").await;
    let created = app.post_request(&buyer, "right", "ADIDAS", "9").await;
    assert_eq!(created["notified"], 1);

    let inbox = app.notifications(&seller).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["source"]["source_type"], "request");
    assert_eq!(inbox[0]["source"]["source_id"], created["request"]["id"]);
    assert!(app.notifications(&buyer).await.is_empty());
}

#[tokio::test]
async fn own_posts_never_match() {
    let app = test_app().await;
    let user = app.register("solo@kicks.io").await;

    app.post_request(&user, "left", "vans", "8").await;
    let created = app.post_listing(&user, "left", "vans", "8").await;
    assert_eq!(created["notified"], 0);
    assert!(app.notifications(&user).await.is_empty());
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let app = test_app().await;
    let buyer = app.register("buyer@kicks.io").await;
    let seller = app.register("seller@kicks.io").await;

    app.post_request(&buyer, "left", "nike", "10").await;
    app.post_listing(&seller, "left", "nike", "10").await;
    app.post_listing(&seller, "left", "nike", "10").await;

    let inbox = app.notifications(&buyer).await;
    assert_eq!(inbox.len(), 2);
    let first = inbox[0]["id"].as_str().unwrap();

    let (status, _) = app
        .json("POST", &format!("/notifications/{first}/read"), Some(&seller.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("POST", &format!("/notifications/{first}/read"), Some(&buyer.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, unread) = app
        .json("GET", "/notifications?unread_only=true", Some(&buyer.token), None)
        .await;
    assert_eq!(unread.as_array().unwrap().len(), 1);

    let (status, body) = app
        .json("POST", "/notifications/read-all", Some(&buyer.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);
}

#[tokio::test]
async fn listing_validation_and_ownership() {
    let app = test_app().await;
    let seller = app.register("seller@kicks.io").await;
    let other = app.register("other@kicks.io").await;

    let (status, body) = app
        .json(
            "POST",
            "/listings",
            Some(&seller.token),
            Some(json!({
                "foot": "left",
                "brand": "nike",
                "size": "10",
                "condition": "new",
                "image_ids": [],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please fill all fields and add an image");

    // Someone else's image can't be attached.
    let (_, image) = app.upload(&other, "image/jpeg", PNG).await;
    let (status, _) = app
        .json(
            "POST",
            "/listings",
            Some(&seller.token),
            Some(json!({
                "foot": "left",
                "brand": "nike",
                "size": "10",
                "condition": "new",
                "image_ids": [image["image_id"]],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let created = app.post_listing(&seller, "left", "nike", "10").await;
    let id = created["listing"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json("DELETE", &format!("/listings/{id}"), Some(&other.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("DELETE", &format!("/listings/{id}"), Some(&seller.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("GET", &format!("/listings/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_is_public_and_newest_first() {
    let app = test_app().await;
    let seller = app.register("seller@kicks.io").await;

    let first = app.post_listing(&seller, "left", "nike", "10").await;
    let second = app.post_listing(&seller, "right", "vans", "9").await;

    let (status, feed) = app.json("GET", "/listings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0]["id"], second["listing"]["id"]);
    assert_eq!(feed[1]["id"], first["listing"]["id"]);
    assert_eq!(feed[0]["owner_display_name"], "seller");

    let (_, filtered) = app.json("GET", "/listings?brand=VANS", None, None).await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (status, _) = app.json("GET", "/listings?foot=middle", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, mine) = app
        .json("GET", "/users/me/listings", Some(&seller.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn images_upload_and_serve() {
    let app = test_app().await;
    let user = app.register("photo@kicks.io").await;

    let (status, _) = app.upload(&user, "text/plain", b"hello").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = app.upload(&user, "image/png", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.upload(&user, "image/png", &[0u8; 2048]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, body) = app.upload(&user, "image/png", PNG).await;
    assert_eq!(status, StatusCode::CREATED);
    let image_id = body["image_id"].as_str().unwrap();

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/images/{image_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::ETAG].to_str().unwrap(),
        format!("\"{}\"", body["sha256"].as_str().unwrap())
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG);

    let (status, _) = app.json("GET", "/images/../../etc/passwd", None, None).await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn chat_requires_login() {
    let app = test_app().await;

    let (status, body) = app.json("GET", "/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to message the seller");

    let (status, body) = app
        .json(
            "POST",
            "/conversations",
            None,
            Some(json!({ "user_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to message the seller");
}

#[tokio::test]
async fn opening_a_conversation_is_idempotent() {
    let app = test_app().await;
    let buyer = app.register("buyer@kicks.io").await;
    let seller = app.register("seller@kicks.io").await;

    let (status, first) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": seller.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, again) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": seller.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], again["id"]);

    let (status, reverse) = app
        .json(
            "POST",
            "/conversations",
            Some(&seller.token),
            Some(json!({ "user_id": buyer.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], reverse["id"]);

    let (status, body) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": buyer.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You can't message yourself");

    let (status, _) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_are_ordered_and_private() {
    let app = test_app().await;
    let buyer = app.register("buyer@kicks.io").await;
    let seller = app.register("seller@kicks.io").await;
    let stranger = app.register("stranger@kicks.io").await;

    let (_, conversation) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": seller.id })),
        )
        .await;
    let id = conversation["id"].as_str().unwrap().to_string();
    let messages_uri = format!("/conversations/{id}/messages");

    for (user, text) in [(&buyer, "Is the left one still available?"), (&seller, "Yes!"), (&buyer, "  Great  ")] {
        let (status, _) = app
            .json("POST", &messages_uri, Some(&user.token), Some(json!({ "text": text })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, messages) = app.json("GET", &messages_uri, Some(&seller.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["Is the left one still available?", "Yes!", "Great"]);

    let (_, list) = app.json("GET", "/conversations", Some(&seller.token), None).await;
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["last_message"], "Great");

    let (status, _) = app
        .json("POST", &messages_uri, Some(&buyer.token), Some(json!({ "text": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("POST", &messages_uri, Some(&buyer.token), Some(json!({ "text": "x".repeat(2001) })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json("GET", &messages_uri, Some(&stranger.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .json("POST", &messages_uri, Some(&stranger.token), Some(json!({ "text": "hi" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("GET", "/conversations/garbage/messages", Some(&buyer.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sent_messages_reach_both_participants() {
    let app = test_app().await;
    let buyer = app.register("buyer@kicks.io").await;
    let seller = app.register("seller@kicks.io").await;

    let (_conn, mut seller_rx) = app.state.dispatcher.register_connection(seller.id).await;

    let (_, conversation) = app
        .json(
            "POST",
            "/conversations",
            Some(&buyer.token),
            Some(json!({ "user_id": seller.id })),
        )
        .await;
    let id = conversation["id"].as_str().unwrap();
    app.json(
        "POST",
        &format!("/conversations/{id}/messages"),
        Some(&buyer.token),
        Some(json!({ "text": "hey" })),
    )
    .await;

    let first = seller_rx.recv().await.unwrap();
    let second = seller_rx.recv().await.unwrap();
    let first = serde_json::to_value(first).unwrap();
    let second = serde_json::to_value(second).unwrap();
    assert_eq!(first["type"], "MessageCreate");
    assert_eq!(first["data"]["message"]["text"], "hey");
    assert_eq!(second["type"], "ConversationUpdate");
    assert_eq!(second["data"]["conversation"]["last_message"], "hey");
}

#[tokio::test]
async fn profile_updates() {
    let app = test_app().await;
    let user = app.register("kid@kicks.io").await;

    let (status, me) = app
        .json(
            "PATCH",
            "/users/me",
            Some(&user.token),
            Some(json!({ "display_name": "  Sneakerhead " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["display_name"], "Sneakerhead");

    let (status, _) = app
        .json("PATCH", "/users/me", Some(&user.token), Some(json!({ "display_name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, profile) = app
        .json("GET", &format!("/users/{}", user.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["display_name"], "Sneakerhead");
    assert!(profile.get("email").is_none());
}

#[tokio::test]
async fn foot_side_is_case_insensitive() {
    let app = test_app().await;
    let seller = app.register("seller@kicks.io").await;
    let buyer = app.register("buyer@kicks.io").await;

    app.post_listing(&seller, "LEFT", "Nike", "10").await;
    let created = app.post_request(&buyer, "Left", "nike", "10").await;
    assert_eq!(created["request"]["foot"], "left");
    assert_eq!(created["notified"], 1);

    let (status, feed) = app.json("GET", "/listings?foot=Left", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed.as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(
            "POST",
            "/requests",
            Some(&buyer.token),
            Some(json!({ "foot": "middle", "brand": "nike", "size": "10" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn rejected_input_still_gets_an_error_body() {
    let app = test_app().await;
    let user = app.register("kid@kicks.io").await;

    // Missing field.
    let (status, body) = app
        .json(
            "POST",
            "/requests",
            Some(&user.token),
            Some(json!({ "brand": "nike", "size": "10" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("foot"), "{body}");

    // Not JSON at all.
    let req = Request::builder()
        .method("POST")
        .uri("/requests")
        .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    // Wrong content type.
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"email":"kid@kicks.io","password":"hunter22"}"#))
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "Expected a JSON body");

    // Bad query and path parameters.
    let (status, body) = app.json("GET", "/listings?limit=lots", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = app.json("GET", "/listings/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_with_one_email() {
    let app = test_app().await;
    let body = json!({
        "email": "race@kicks.io",
        "password": "hunter22",
        "confirm_password": "hunter22",
    });
    let attempt = || app.json("POST", "/auth/register", None, Some(body.clone()));

    let results = tokio::join!(attempt(), attempt(), attempt(), attempt(), attempt(), attempt());
    let statuses = [results.0, results.1, results.2, results.3, results.4, results.5]
        .into_iter()
        .map(|(status, body)| {
            if status != StatusCode::CREATED {
                assert_eq!(body["error"], "An account with this email already exists");
            }
            status
        })
        .collect::<Vec<_>>();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 5);
}

#[tokio::test]
async fn email_verification_flow() {
    let app = test_app().await;
    let user = app.register("new@kicks.io").await;

    let (_, me) = app.json("GET", "/users/me", Some(&user.token), None).await;
    assert_eq!(me["email_verified"], false);

    // Registration already issued a token we can't see; add one we can.
    app.state
        .db
        .insert_verification_token(
            &user.id.to_string(),
            &sha256_hex(b"known-token"),
            chrono::Utc::now() + chrono::Duration::hours(1),
        )
        .unwrap();

    let (status, body) = app
        .json("POST", "/auth/verify-email", None, Some(json!({ "token": "guess" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Verification link is invalid or has expired");

    let (status, _) = app
        .json("POST", "/auth/verify-email", None, Some(json!({ "token": "known-token" })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, me) = app.json("GET", "/users/me", Some(&user.token), None).await;
    assert_eq!(me["email_verified"], true);

    let (status, _) = app
        .json("POST", "/auth/verify-email", None, Some(json!({ "token": "known-token" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json("POST", "/auth/verify-email/resend", Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Your email is already verified");
}

#[tokio::test]
async fn expired_verification_link_is_refused() {
    let app = test_app().await;
    let user = app.register("late@kicks.io").await;

    app.state
        .db
        .insert_verification_token(
            &user.id.to_string(),
            &sha256_hex(b"old-token"),
            chrono::Utc::now() - chrono::Duration::minutes(1),
        )
        .unwrap();

    let (status, _) = app
        .json("POST", "/auth/verify-email", None, Some(json!({ "token": "old-token" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("POST", "/auth/verify-email/resend", Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("POST", "/auth/verify-email/resend", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn feed_pages_through_tied_timestamps() {
    let app = test_app().await;
    let seller = app.register("seller@kicks.io").await;
    let posted: Vec<String> = (0..3)
        .map(|_| Uuid::new_v4())
        .map(|id| id.to_string())
        .collect();

    // Same second, same microsecond: only the id can order these.
    let at = chrono::Utc::now();
    for id in &posted {
        app.state
            .db
            .insert_listing(&kicks_types::models::Listing {
                id: id.parse().unwrap(),
                owner_id: seller.id,
                owner_display_name: String::new(),
                foot: kicks_types::models::FootSide::Right,
                brand: "vans".into(),
                model: None,
                size: "9".into(),
                condition: "worn".into(),
                image_ids: Vec::new(),
                created_at: at,
            })
            .unwrap();
    }

    let (status, first) = app.json("GET", "/listings?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let first = first.as_array().unwrap().clone();
    assert_eq!(first.len(), 2);

    let oldest = &first[1];
    let before = oldest["created_at"].as_str().unwrap().replace('+', "%2B");
    let uri = format!(
        "/listings?limit=2&before={}&before_id={}",
        before,
        oldest["id"].as_str().unwrap()
    );
    let (status, rest) = app.json("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK, "{rest}");

    let mut seen: Vec<&str> = first.iter().map(|l| l["id"].as_str().unwrap()).collect();
    seen.extend(rest.as_array().unwrap().iter().map(|l| l["id"].as_str().unwrap()));
    seen.sort();
    let mut expected: Vec<&str> = posted.iter().map(String::as_str).collect();
    expected.sort();
    assert_eq!(seen, expected);

    let (status, _) = app
        .json("GET", &format!("/listings?before_id={}", posted[0]), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
