use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    http::{Response, StatusCode, header},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use blogd::{
    api,
    config::Config,
    mail::Mailer,
    state::AppState,
    storage::{init_db_from_env, migrate},
};

struct TestApp {
    router: Router,
}

/// 生成不会和其他测试冲突的唯一后缀
fn unique() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{}-{}", nanos, COUNTER.fetch_add(1, Ordering::Relaxed))
}

impl TestApp {
    async fn new() -> Self {
        let db = init_db_from_env().await;

        migrate(&db, "sql/01-CREATE_TABLE.sql")
            .await
            .expect("初始化sql失败");

        let config = Config {
            site_url: "http://localhost:3000".to_string(),
            admin_password: "test-password".to_string(),
            smtp: None,
        };
        let mailer = Mailer::from_config(&config);

        let app = AppState::new(db, mailer, config);

        Self {
            router: api::setup_route(app),
        }
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail")
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = builder.body(Body::empty()).expect("请求构造失败");
        self.json_response(req).await
    }

    async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: Value,
        cookie: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = builder
            .body(Body::new(body.to_string()))
            .expect("请求构造失败");
        self.json_response(req).await
    }

    async fn json_response(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.request(req).await;
        let status = resp.status();
        let data = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("读取数据失败");
        let value = if data.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&data).expect("反序列化失败")
        };
        (status, value)
    }

    /// 登录一个新用户，返回可直接放进 Cookie 头的字符串
    async fn login_user(&self, name: &str) -> String {
        let email = format!("{}-{}@test.local", name, unique());
        let (status, body) = self
            .send_json(
                "POST",
                "/api/auth/login",
                json!({ "name": name, "email": email }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "登录失败");
        let user_id = body["user"]["id"].as_i64().expect("缺少用户 id");
        format!("user-id={user_id}; session-token=test")
    }

    fn admin_cookie() -> &'static str {
        "admin-auth=authenticated"
    }

    /// 在唯一分类下创建一篇文章，返回 (分类, slug, 文章 id)
    async fn create_post(&self, published: bool) -> (String, String, i64) {
        let category = format!("cat-{}", unique());
        let slug = format!("slug-{}", unique());
        let (status, body) = self
            .send_json(
                "POST",
                "/api/admin/posts",
                json!({
                    "title": "Test post",
                    "slug": slug,
                    "content": "<p>body</p>",
                    "excerpt": "excerpt",
                    "category": category,
                    "coverImage": "/cover.png",
                    "published": published,
                }),
                Some(Self::admin_cookie()),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "创建文章失败: {body}");
        let id = body["id"].as_i64().expect("缺少文章 id");
        (category, slug, id)
    }
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_admin_gate() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/admin/posts", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "无 cookie 应拒绝");

    let (status, _) = app
        .get("/api/admin/posts", Some("admin-auth=wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "cookie 值错误应拒绝");

    let (status, _) = app
        .get("/api/admin/posts", Some(TestApp::admin_cookie()))
        .await;
    assert_eq!(status, StatusCode::OK, "cookie 值正确应放行");

    let (status, _) = app
        .send_json(
            "POST",
            "/api/admin/login",
            json!({ "password": "wrong" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "错误密码应 401");

    let (status, body) = app
        .send_json(
            "POST",
            "/api/admin/login",
            json!({ "password": "test-password" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_post_slug_uniqueness() {
    let app = TestApp::new().await;
    let (category, slug, id) = app.create_post(true).await;

    // 同分类同 slug 冲突
    let (status, body) = app
        .send_json(
            "POST",
            "/api/admin/posts",
            json!({
                "title": "Another",
                "slug": slug,
                "content": "c",
                "excerpt": "e",
                "category": category,
                "coverImage": "",
                "published": false,
            }),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "同分类同 slug 应冲突");
    assert_eq!(body["success"], json!(false));

    // 原文章未被改动
    let (status, body) = app
        .get(
            &format!("/api/admin/posts/{id}"),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("Test post"), "冲突不应改动已有文章");

    // 不同分类同 slug 允许
    let other_category = format!("cat-{}", unique());
    let (status, _) = app
        .send_json(
            "POST",
            "/api/admin/posts",
            json!({
                "title": "Same slug elsewhere",
                "slug": slug,
                "content": "c",
                "excerpt": "e",
                "category": other_category,
                "coverImage": "",
                "published": true,
            }),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "跨分类同 slug 应允许");
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_publish_timestamp_transitions() {
    let app = TestApp::new().await;
    let (category, slug, id) = app.create_post(false).await;

    let draft = |published: bool| {
        json!({
            "title": "Test post",
            "slug": slug,
            "content": "c",
            "excerpt": "e",
            "category": category,
            "coverImage": "",
            "published": published,
        })
    };

    // 草稿无发布时间，公开接口不可见
    let (_, body) = app
        .get(
            &format!("/api/admin/posts/{id}"),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(body["publishedAt"], Value::Null);
    let (status, _) = app
        .get(&format!("/api/posts/{category}/{slug}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "草稿不应公开可见");

    // 首次发布盖章
    let uri = format!("/api/admin/posts/{id}");
    let (_, body) = app
        .send_json("PUT", &uri, draft(true), Some(TestApp::admin_cookie()))
        .await;
    let first_published_at = body["publishedAt"].clone();
    assert_ne!(first_published_at, Value::Null, "发布应盖发布时间");

    // 再次保存保持原时间戳
    let (_, body) = app
        .send_json("PUT", &uri, draft(true), Some(TestApp::admin_cookie()))
        .await;
    assert_eq!(
        body["publishedAt"], first_published_at,
        "重复保存不应改发布时间"
    );

    // 取消发布清空
    let (_, body) = app
        .send_json("PUT", &uri, draft(false), Some(TestApp::admin_cookie()))
        .await;
    assert_eq!(body["publishedAt"], Value::Null, "取消发布应清空发布时间");
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_post_vote_toggle() {
    let app = TestApp::new().await;
    let (_, _, post_id) = app.create_post(true).await;
    let user = app.login_user("voter").await;

    let vote_uri = format!("/api/posts/{post_id}/vote");

    // 第一次赞
    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "upvote" }),
            Some(&user),
        )
        .await;
    assert_eq!(body["upvotes"], json!(1));
    assert_eq!(body["downvotes"], json!(0));

    // 重复同向撤回
    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "upvote" }),
            Some(&user),
        )
        .await;
    assert_eq!(body["upvotes"], json!(0), "重复同向投票应撤回");
    assert_eq!(body["downvotes"], json!(0));

    // 赞后换踩，只留一条反向记录
    app.send_json(
        "POST",
        &vote_uri,
        json!({ "voteType": "upvote" }),
        Some(&user),
    )
    .await;
    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "downvote" }),
            Some(&user),
        )
        .await;
    assert_eq!(body["upvotes"], json!(0), "换向应清掉原投票");
    assert_eq!(body["downvotes"], json!(1));

    let (_, body) = app
        .get(&format!("/api/posts/{post_id}/votes/me"), Some(&user))
        .await;
    assert_eq!(body["voteType"], json!("downvote"));

    // 未登录投票拒绝
    let (status, _) = app
        .send_json("POST", &vote_uri, json!({ "voteType": "upvote" }), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_comments_tree_and_votes() {
    let app = TestApp::new().await;
    let (_, _, post_id) = app.create_post(true).await;
    let alice = app.login_user("alice").await;
    let bob = app.login_user("bob").await;

    let comments_uri = format!("/api/posts/{post_id}/comments");

    // 两条顶层评论 + 一条回复
    let (_, first) = app
        .send_json(
            "POST",
            &comments_uri,
            json!({ "content": "first" }),
            Some(&alice),
        )
        .await;
    let first_id = first["comment"]["id"].as_i64().unwrap();

    app.send_json(
        "POST",
        &comments_uri,
        json!({ "content": "second" }),
        Some(&bob),
    )
    .await;

    let (_, reply) = app
        .send_json(
            "POST",
            &comments_uri,
            json!({ "content": "reply", "parentId": first_id }),
            Some(&bob),
        )
        .await;
    let reply_id = reply["comment"]["id"].as_i64().unwrap();

    // 只允许两层
    let (status, _) = app
        .send_json(
            "POST",
            &comments_uri,
            json!({ "content": "nested", "parentId": reply_id }),
            Some(&alice),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "二层回复应被拒绝");

    // 顶层最新在前，回复挂在正确的父节点下
    let (_, tree) = app.get(&comments_uri, None).await;
    let tree = tree.as_array().expect("评论树应为数组");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0]["content"], json!("second"), "顶层应最新在前");
    assert_eq!(tree[1]["content"], json!("first"));
    assert_eq!(tree[1]["replies"][0]["content"], json!("reply"));

    // 评论投票与文章投票同一套切换语义
    let vote_uri = format!("/api/comments/{first_id}/vote");
    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "upvote" }),
            Some(&bob),
        )
        .await;
    assert_eq!(body["upvoteCount"], json!(1));

    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "upvote" }),
            Some(&bob),
        )
        .await;
    assert_eq!(body["upvoteCount"], json!(0), "重复同向应撤回");

    app.send_json(
        "POST",
        &vote_uri,
        json!({ "voteType": "upvote" }),
        Some(&bob),
    )
    .await;
    let (_, body) = app
        .send_json(
            "POST",
            &vote_uri,
            json!({ "voteType": "downvote" }),
            Some(&bob),
        )
        .await;
    assert_eq!(body["upvoteCount"], json!(0), "换向应清掉原投票");
    assert_eq!(body["downvoteCount"], json!(1));
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_newsletter_flow() {
    let app = TestApp::new().await;
    let email = format!("sub-{}@test.local", unique());

    // 新订阅
    let (status, body) = app
        .send_json(
            "POST",
            "/api/newsletter/subscribe",
            json!({ "email": email }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    // 激活状态下重复订阅失败
    let (_, body) = app
        .send_json(
            "POST",
            "/api/newsletter/subscribe",
            json!({ "email": email }),
            None,
        )
        .await;
    assert_eq!(body["success"], json!(false), "重复订阅应失败");

    // 缺 email 400
    let (status, _) = app
        .send_json("POST", "/api/newsletter/subscribe", json!({}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 从管理端拿到退订令牌
    let (_, subscribers) = app
        .get("/api/admin/subscribers", Some(TestApp::admin_cookie()))
        .await;
    let token = subscribers
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["email"] == json!(email))
        .and_then(|s| s["unsubscribeToken"].as_str())
        .expect("应能查到退订令牌")
        .to_string();

    // 未知令牌退订失败且无副作用
    let (_, body) = app
        .get("/api/newsletter/unsubscribe?token=bogus-token", None)
        .await;
    assert_eq!(body["success"], json!(false), "未知令牌应失败");

    // 正常退订；重复退订幂等返回相同消息
    let unsubscribe_uri = format!("/api/newsletter/unsubscribe?token={token}");
    let (_, first) = app.get(&unsubscribe_uri, None).await;
    assert_eq!(first["success"], json!(true));
    let (_, second) = app.get(&unsubscribe_uri, None).await;
    assert_eq!(second, first, "重复退订应返回相同消息");

    // 复活订阅：成功且保留原令牌
    let (_, body) = app
        .send_json(
            "POST",
            "/api/newsletter/subscribe",
            json!({ "email": email }),
            None,
        )
        .await;
    assert_eq!(body["success"], json!(true), "复活订阅应成功");

    let (_, subscribers) = app
        .get("/api/admin/subscribers", Some(TestApp::admin_cookie()))
        .await;
    let token_after = subscribers
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["email"] == json!(email))
        .and_then(|s| s["unsubscribeToken"].as_str())
        .expect("复活后应仍在激活列表")
        .to_string();
    assert_eq!(token_after, token, "复活订阅应保留原令牌");
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_posts_pagination() {
    let app = TestApp::new().await;
    let category = format!("cat-{}", unique());

    for i in 0..5 {
        let (status, _) = app
            .send_json(
                "POST",
                "/api/admin/posts",
                json!({
                    "title": format!("post {i}"),
                    "slug": format!("p{i}-{}", unique()),
                    "content": "c",
                    "excerpt": "e",
                    "category": category,
                    "coverImage": "",
                    "published": true,
                }),
                Some(TestApp::admin_cookie()),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    // 草稿不计入公开列表
    app.send_json(
        "POST",
        "/api/admin/posts",
        json!({
            "title": "draft",
            "slug": format!("draft-{}", unique()),
            "content": "c",
            "excerpt": "e",
            "category": category,
            "coverImage": "",
            "published": false,
        }),
        Some(TestApp::admin_cookie()),
    )
    .await;

    let (status, body) = app
        .get(
            &format!("/api/posts?limit=2&page=1&category={category}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["posts"].as_array().unwrap().len(),
        2,
        "单页不应超过 limit"
    );
    assert_eq!(body["pagination"]["total"], json!(5), "草稿不应计入总数");
    assert_eq!(body["pagination"]["pages"], json!(3));

    let (_, body) = app
        .get(
            &format!("/api/posts?limit=2&page=3&category={category}"),
            None,
        )
        .await;
    assert_eq!(body["posts"].as_array().unwrap().len(), 1, "末页只剩一篇");

    // 公开列表全部为已发布
    assert!(
        body["posts"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["published"] == json!(true)),
        "公开列表不应出现草稿"
    );
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_category_crud() {
    let app = TestApp::new().await;
    let slug = format!("cat-{}", unique());

    let (status, body) = app
        .send_json(
            "POST",
            "/api/admin/categories",
            json!({ "name": "Tech", "slug": slug, "description": "d" }),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();

    // slug 全局冲突，且不改动已有分类
    let (status, _) = app
        .send_json(
            "POST",
            "/api/admin/categories",
            json!({ "name": "Other", "slug": slug }),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "分类 slug 应全局唯一");

    let (_, body) = app.get(&format!("/api/categories/{slug}"), None).await;
    assert_eq!(body["name"], json!("Tech"), "冲突不应改动已有分类");

    // 更新时排除自身
    let (status, _) = app
        .send_json(
            "PUT",
            &format!("/api/admin/categories/{id}"),
            json!({ "name": "Tech Renamed", "slug": slug }),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "同 slug 更新自身应允许");

    let (status, _) = app
        .send_json(
            "DELETE",
            &format!("/api/admin/categories/{id}"),
            json!({}),
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/categories/{slug}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "删除后不应可见");
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_tracking_and_sitemap() {
    let app = TestApp::new().await;
    let (category, slug, _) = app.create_post(true).await;
    let user = app.login_user("tracker").await;

    // 埋点
    let (status, _) = app
        .send_json(
            "POST",
            "/api/track",
            json!({ "path": format!("/{category}/{slug}") }),
            Some(&user),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // 浏览文章后记录偏好分类
    let (_, me) = app.get("/api/auth/me", Some(&user)).await;
    assert!(
        me["preferredCategories"]
            .as_array()
            .unwrap()
            .contains(&json!(category)),
        "浏览文章后应记录偏好分类"
    );

    // 报表端点可用
    let (status, body) = app
        .get("/api/admin/analytics/visits", Some(TestApp::admin_cookie()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["totalVisits"].as_i64().unwrap() >= 1);

    let (status, body) = app
        .get(
            "/api/admin/analytics/daily?days=7",
            Some(TestApp::admin_cookie()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 7, "缺失天应补零");

    // sitemap 覆盖已发布文章
    let req = Request::get("/sitemap.xml").body(Body::empty()).unwrap();
    let resp = app.request(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let xml = String::from_utf8(
        to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(
        xml.contains(&format!("/{category}/{slug}")),
        "sitemap 应包含文章"
    );
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_cookie_consent() {
    let app = TestApp::new().await;
    let session_id = format!("session-{}", unique());

    let (status, body) = app
        .send_json(
            "POST",
            "/api/consent",
            json!({
                "sessionId": session_id,
                "preferences": {
                    "necessary": true,
                    "analytics": true,
                    "marketing": false,
                    "functional": false,
                }
            }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consent"]["analytics"], json!(true));

    // 同 session 再次保存是 upsert
    let (_, body) = app
        .send_json(
            "POST",
            "/api/consent",
            json!({
                "sessionId": session_id,
                "preferences": {
                    "necessary": true,
                    "analytics": false,
                    "marketing": true,
                    "functional": false,
                }
            }),
            None,
        )
        .await;
    assert_eq!(body["consent"]["analytics"], json!(false), "同 session 应覆盖");
    assert_eq!(body["consent"]["marketing"], json!(true));

    let (_, body) = app
        .get(&format!("/api/consent?sessionId={session_id}"), None)
        .await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["consent"]["marketing"], json!(true));

    let (_, body) = app
        .get("/api/consent?sessionId=missing-session", None)
        .await;
    assert_eq!(body["success"], json!(false), "无记录应报告失败");
}
