use std::net::SocketAddr;
use std::time::Duration;

use langblog::config::Config;
use langblog::db;
use langblog::routes::build_router;
use langblog::state::{AppState, DbPool};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    base: String,
    client: reqwest::Client,
    pool: DbPool,
    _dir: TempDir,
}

async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.password_cost = 4;
    configure(&mut config);

    let app = build_router(AppState::new(pool.clone(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        pool,
        _dir: dir,
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.put(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.delete(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    /// Register and log in; returns (user id, token).
    async fn sign_up(&self, name: &str, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .post(
                "/api/v1/auth/login",
                None,
                json!({ "email": email, "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        let token = body["data"]["token"].as_str().unwrap().to_string();
        (id, token)
    }

    fn stored_comments(&self) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap()
    }

    fn promote(&self, user_id: &str) {
        let conn = self.pool.get().unwrap();
        conn.execute("UPDATE users SET is_admin = 1 WHERE id = ?1", [user_id])
            .unwrap();
    }

    async fn create_blog(&self, admin_token: &str, title: &str) -> String {
        pause().await;
        let (status, body) = self
            .post(
                "/api/v1/blogs",
                Some(admin_token),
                json!({ "title": title, "content": "body text", "image": "cover.png" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create blog failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn comment(&self, token: &str, blog_id: &str, parent: Option<&str>, text: &str) -> Value {
        pause().await;
        let (status, body) = self
            .post(
                "/api/v1/comments",
                Some(token),
                json!({ "content": text, "blogId": blog_id, "parentId": parent }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment failed: {}", body);
        body["data"].clone()
    }
}

/// Keeps millisecond `created_at` values distinct between inserts.
async fn pause() {
    tokio::time::sleep(Duration::from_millis(3)).await;
}

/// Admin plus a blog to hang comments on. Returns (admin token, blog id).
async fn seeded(app: &TestApp) -> (String, String) {
    let (admin_id, admin_token) = app.sign_up("Admin", "admin@example.com").await;
    app.promote(&admin_id);
    let blog_id = app.create_blog(&admin_token, "Why Rust").await;
    (admin_token, blog_id)
}

fn ids(nodes: &Value) -> Vec<String> {
    nodes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");

    let (status, body) = app.get("/api/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "UP");

    let (status, body) = app.get("/api/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ALIVE");

    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn unknown_route_gets_error_envelope() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/v1/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("/api/v1/nothing-here"));
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = spawn_app().await;
    app.sign_up("Ann", "ann@example.com").await;

    let (status, body) = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "name": "Ann Again", "email": "ANN@example.com", "password": "secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    app.sign_up("Ann", "ann@example.com").await;

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "email": "ann@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn logout_invalidates_token() {
    let app = spawn_app().await;
    let (_, token) = app.sign_up("Ann", "ann@example.com").await;

    let (status, body) = app.get("/api/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ann@example.com");

    let (status, _) = app.post("/api/v1/auth/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admin_cannot_create_blog() {
    let app = spawn_app().await;
    let (_, token) = app.sign_up("Ann", "ann@example.com").await;

    let (status, _) = app
        .post(
            "/api/v1/blogs",
            Some(&token),
            json!({ "title": "t", "content": "c", "image": "i" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn comment_requires_authentication() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;

    let (status, body) = app
        .post(
            "/api/v1/comments",
            None,
            json!({ "content": "hi", "blogId": blog_id }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn comment_validation_errors() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, token) = app.sign_up("Ann", "ann@example.com").await;

    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&token),
            json!({ "content": "   ", "blogId": blog_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_comments(), 0);

    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&token),
            json!({ "content": "x".repeat(1001), "blogId": blog_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_comments(), 0);

    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&token),
            json!({ "content": "x".repeat(1000), "blogId": blog_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&token),
            json!({ "content": "hello", "blogId": "no-such-blog" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&token),
            json!({ "content": "hello", "blogId": blog_id, "parentId": "no-such-comment" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_are_returned_as_a_forest() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    let (_, bob) = app.sign_up("Bob", "bob@example.com").await;

    let first = app.comment(&ann, &blog_id, None, "first").await;
    let first_id = first["id"].as_str().unwrap();
    let reply = app.comment(&bob, &blog_id, Some(first_id), "reply").await;
    let reply_id = reply["id"].as_str().unwrap();
    let nested = app.comment(&ann, &blog_id, Some(reply_id), "nested").await;
    let second = app.comment(&bob, &blog_id, None, "second").await;

    let (status, body) = app.get(&format!("/api/v1/comments/{}", blog_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let roots = &body["data"];
    // Newest root first.
    assert_eq!(
        ids(roots),
        vec![second["id"].as_str().unwrap(), first_id]
    );
    let first_node = &roots[1];
    assert_eq!(first_node["author"]["name"], "Ann");
    assert_eq!(ids(&first_node["replies"]), vec![reply_id]);
    assert_eq!(
        ids(&first_node["replies"][0]["replies"]),
        vec![nested["id"].as_str().unwrap()]
    );
    assert!(roots[0]["replies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn comments_of_unknown_blog_are_empty() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/v1/comments/missing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn like_toggles_membership() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    let (bob_id, bob) = app.sign_up("Bob", "bob@example.com").await;

    let c = app.comment(&ann, &blog_id, None, "like me").await;
    let path = format!("/api/v1/comments/{}/like", c["id"].as_str().unwrap());

    let (status, body) = app.post(&path, Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLiked"], true);
    assert_eq!(body["data"]["likeCount"], 1);
    assert_eq!(body["data"]["likes"], json!([bob_id]));

    let (status, body) = app.post(&path, Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLiked"], false);
    assert_eq!(body["data"]["likeCount"], 0);

    let (status, _) = app
        .post("/api/v1/comments/no-such-comment/like", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_owner_or_admin_can_delete() {
    let app = spawn_app().await;
    let (admin, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    let (_, bob) = app.sign_up("Bob", "bob@example.com").await;

    let mine = app.comment(&ann, &blog_id, None, "mine").await;
    let mine_id = mine["id"].as_str().unwrap();
    let path = format!("/api/v1/comments/{}", mine_id);

    let (status, _) = app.delete(&path, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Still visible after the refused delete.
    let (_, body) = app.get(&format!("/api/v1/comments/{}", blog_id), None).await;
    assert_eq!(ids(&body["data"]), vec![mine_id]);
    assert_eq!(body["data"][0]["isDeleted"], false);

    let (status, body) = app.delete(&path, Some(&ann)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isDeleted"], true);

    // Already deleted.
    let (status, _) = app.delete(&path, Some(&ann)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let other = app.comment(&bob, &blog_id, None, "moderate me").await;
    let (status, _) = app
        .delete(
            &format!("/api/v1/comments/{}", other["id"].as_str().unwrap()),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/comments/{}", blog_id), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn replies_of_deleted_comment_drop_out_of_the_tree() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    let (_, bob) = app.sign_up("Bob", "bob@example.com").await;

    let parent = app.comment(&ann, &blog_id, None, "parent").await;
    let parent_id = parent["id"].as_str().unwrap();
    let reply = app.comment(&bob, &blog_id, Some(parent_id), "reply").await;
    let reply_id = reply["id"].as_str().unwrap();

    let (status, _) = app
        .delete(&format!("/api/v1/comments/{}", parent_id), Some(&ann))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/comments/{}", blog_id), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // The reply itself is untouched and can still be liked.
    let (status, body) = app
        .post(&format!("/api/v1/comments/{}/like", reply_id), Some(&ann), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likeCount"], 1);

    // But it can no longer be replied to through the deleted parent.
    let (status, _) = app
        .post(
            "/api/v1/comments",
            Some(&bob),
            json!({ "content": "late", "blogId": blog_id, "parentId": parent_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bookmarks_toggle_and_list() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    let path = format!("/api/v1/auth/bookmark/{}", blog_id);

    let (status, body) = app.post(&path, Some(&ann), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isBookmarked"], true);

    let (_, body) = app.get("/api/v1/auth/saved-posts", Some(&ann)).await;
    assert_eq!(ids(&body["data"]), vec![blog_id.clone()]);

    let (_, body) = app.post(&path, Some(&ann), json!({})).await;
    assert_eq!(body["data"]["isBookmarked"], false);

    let (_, body) = app.get("/api/v1/auth/saved-posts", Some(&ann)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_blog_removes_its_comments() {
    let app = spawn_app().await;
    let (admin, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;
    app.comment(&ann, &blog_id, None, "hello").await;

    let (status, _) = app
        .delete(&format!("/api/v1/blogs/{}", blog_id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let conn = app.pool.get().unwrap();
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn auth_routes_are_rate_limited() {
    let app = spawn_app_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.auth_max_requests = 2;
    })
    .await;

    let body = json!({ "email": "nobody@example.com", "password": "secret123" });
    for _ in 0..2 {
        let resp = app
            .client
            .post(app.url("/api/v1/auth/login"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()["x-ratelimit-limit"], "2");
    }

    let resp = app
        .client
        .post(app.url("/api/v1/auth/login"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("retry-after"));
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");

    // Health probes sit outside the limiter.
    let (status, _) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reply_chains_stop_at_the_depth_limit() {
    let app = spawn_app().await;
    let (_, blog_id) = seeded(&app).await;
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;

    let root = app.comment(&ann, &blog_id, None, "level 0").await;
    let mut parent = root["id"].as_str().unwrap().to_string();
    for level in 1..=32 {
        let reply = app
            .comment(&ann, &blog_id, Some(&parent), &format!("level {}", level))
            .await;
        parent = reply["id"].as_str().unwrap().to_string();
    }

    let (status, body) = app
        .post(
            "/api/v1/comments",
            Some(&ann),
            json!({ "content": "too deep", "blogId": blog_id, "parentId": parent }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(app.stored_comments(), 33);

    let (status, body) = app.get(&format!("/api/v1/comments/{}", blog_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blog_search_filters_sorts_and_counts() {
    let app = spawn_app().await;
    let (admin_id, admin) = app.sign_up("Admin", "admin@example.com").await;
    app.promote(&admin_id);
    let zig = app.create_blog(&admin, "Zig comptime").await;
    let rust = app.create_blog(&admin, "Async Rust").await;
    let go = app.create_blog(&admin, "Rust vs Go").await;

    let (status, body) = app.get("/api/v1/blogs/search", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(ids(&body["data"]), vec![go.clone(), rust.clone(), zig.clone()]);

    let (_, body) = app.get("/api/v1/blogs/search?keyword=rust", None).await;
    assert_eq!(body["count"], 2);
    assert_eq!(ids(&body["data"]), vec![go.clone(), rust.clone()]);

    let (_, body) = app
        .get("/api/v1/blogs/search?keyword=RUST&sort=oldest", None)
        .await;
    assert_eq!(ids(&body["data"]), vec![rust.clone(), go.clone()]);

    let (_, body) = app.get("/api/v1/blogs/search?sort=title", None).await;
    assert_eq!(ids(&body["data"]), vec![rust, go, zig]);

    let (status, body) = app.get("/api/v1/blogs/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 3);
}

#[tokio::test]
async fn count_users_returns_a_number() {
    let app = spawn_app().await;
    app.sign_up("Ann", "ann@example.com").await;
    app.sign_up("Bob", "bob@example.com").await;

    let (status, body) = app.get("/api/v1/auth/count-users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 2);
}

#[tokio::test]
async fn categories_are_managed_by_slug() {
    let app = spawn_app().await;
    let (admin_id, admin) = app.sign_up("Admin", "admin@example.com").await;
    app.promote(&admin_id);
    let (_, ann) = app.sign_up("Ann", "ann@example.com").await;

    let body = json!({ "name": "Systems Programming", "description": "Close to the metal", "image": "sys.png" });
    let (status, _) = app.post("/api/v1/categories", Some(&ann), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/v1/categories", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["slug"], "systems-programming");

    let (status, _) = app.post("/api/v1/categories", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, fetched) = app
        .get("/api/v1/categories/systems-programming", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["name"], "Systems Programming");

    // No image in the update keeps the stored one.
    let (status, updated) = app
        .put(
            "/api/v1/categories/systems-programming",
            Some(&admin),
            json!({ "name": "Systems" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["slug"], "systems");
    assert_eq!(updated["data"]["image"], "sys.png");

    let (_, listed) = app.get("/api/v1/categories", None).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    let (_, counted) = app.get("/api/v1/categories/count", None).await;
    assert_eq!(counted["data"], 1);

    let (status, _) = app.delete("/api/v1/categories/systems", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/v1/categories/systems", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
