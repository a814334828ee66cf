//! Integration tests for the repair tally backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::auth::{SessionStore, SESSION_HEADER};
use crate::cache::ReportCache;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::stats::export::UTF8_BOM;
use crate::{create_router, AppState};

const ADMIN_PASSWORD: &str = "test-admin";
const DAY: &str = "2024-05-01";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_settings(None, Duration::from_secs(3600)).await
    }

    async fn with_cache_ttl(ttl: Option<Duration>) -> Self {
        Self::with_settings(ttl, Duration::from_secs(3600)).await
    }

    async fn with_session_idle(idle: Duration) -> Self {
        Self::with_settings(None, idle).await
    }

    async fn with_settings(ttl: Option<Duration>, session_idle: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool.clone()));

        // Create config
        let config = Config {
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            report_cache_ttl: ttl,
            session_idle_timeout: session_idle,
        };

        let state = AppState {
            repo,
            sessions: SessionStore::new(session_idle),
            report_cache: ReportCache::new(ttl),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/session/login"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Client carrying the token of a fresh session.
    async fn session(&self, body: Value) -> Client {
        let resp = self.login(body).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let token = body["data"]["token"].as_str().unwrap();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(SESSION_HEADER, token.parse().unwrap());
        Client::builder().default_headers(headers).build().unwrap()
    }

    async fn user(&self, author: &str) -> Client {
        self.session(json!({"mode": "user", "author": author})).await
    }

    async fn admin(&self) -> Client {
        self.session(json!({"mode": "admin", "password": ADMIN_PASSWORD}))
            .await
    }
}

async fn submit_report(fixture: &TestFixture, client: &Client, body: Value) -> reqwest::Response {
    client
        .post(fixture.url("/api/reports"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn save_counts(
    fixture: &TestFixture,
    client: &Client,
    date: &str,
    camp: &str,
    entries: Value,
) -> reqwest::Response {
    client
        .post(fixture.url("/api/counts"))
        .json(&json!({"date": date, "camp": camp, "entries": entries}))
        .send()
        .await
        .unwrap()
}

async fn get_json(fixture: &TestFixture, client: &Client, path: &str, query: &[(&str, &str)]) -> Value {
    let resp = client
        .get(fixture.url(path))
        .query(query)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "GET {} failed", path);
    resp.json().await.unwrap()
}

/// (device, issue, count) triples, sorted.
fn tally_set(body: &Value) -> Vec<(String, String, i64)> {
    let mut rows: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["device"].as_str().unwrap().to_string(),
                r["issue"].as_str().unwrap().to_string(),
                r["count"].as_i64().unwrap(),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_session_required() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/reports"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/reports"))
        .header(SESSION_HEADER, "not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_user_login_and_logout() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .login(json!({"mode": "user", "author": "아무개"}))
        .await;
    assert_eq!(resp.status(), 401);

    let client = fixture.user("김정비").await;
    let body = get_json(&fixture, &client, "/api/session", &[]).await;
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["name"], "김정비");

    let resp = client
        .post(fixture.url("/api/session/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(fixture.url("/api/session")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_admin_login() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .login(json!({"mode": "admin", "password": "wrong"}))
        .await;
    assert_eq!(resp.status(), 401);

    let client = fixture.admin().await;
    let body = get_json(&fixture, &client, "/api/session", &[]).await;
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_idle_session_is_logged_out() {
    let fixture = TestFixture::with_session_idle(Duration::from_millis(300)).await;
    let client = fixture.user("김정비").await;

    let resp = client.get(fixture.url("/api/session")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    tokio::time::sleep(Duration::from_millis(700)).await;

    let resp = client.get(fixture.url("/api/session")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_report_submit_and_list() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;
    let start = Utc::now();

    let resp = submit_report(
        &fixture,
        &client,
        json!({
            "equipmentId": "AB1234",
            "issue": "모터 불량",
            "parts": ["모터", "", "모터", " 배터리 "]
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["data"]["author"], "김정비");
    assert_eq!(created["data"]["parts"], json!(["모터", "배터리"]));

    let body = get_json(&fixture, &client, "/api/reports", &[]).await;
    let reports = body["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert_eq!(report["id"], created["data"]["id"]);
    assert_eq!(report["equipmentId"], "AB1234");
    assert_eq!(report["issue"], "모터 불량");
    assert_eq!(report["parts"], json!(["모터", "배터리"]));
    assert_eq!(report["createdAt"], created["data"]["createdAt"]);

    let created_at: DateTime<Utc> = report["createdAt"].as_str().unwrap().parse().unwrap();
    assert!(created_at >= start);
}

#[tokio::test]
async fn test_report_list_order_and_limit() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("이수리").await;

    for id in ["AA0001", "AA0002", "AA0003"] {
        let resp = submit_report(
            &fixture,
            &client,
            json!({"equipmentId": id, "issue": "IOT 오류"}),
        )
        .await;
        assert_eq!(resp.status(), 200);
    }

    let body = get_json(&fixture, &client, "/api/reports", &[("limit", "2")]).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["equipmentId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["AA0003", "AA0002"]);

    let body = get_json(&fixture, &client, "/api/reports", &[("order", "asc")]).await;
    assert_eq!(body["data"][0]["equipmentId"], "AA0001");
}

#[tokio::test]
async fn test_report_validation() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    let cases = [
        json!({"equipmentId": "", "issue": "모터 불량"}),
        json!({"equipmentId": "AB1234", "issue": ""}),
        json!({"equipmentId": "AB1234", "issue": "없는 고장"}),
        json!({"equipmentId": "AB1234", "issue": "모터 불량", "parts": ["없는 부품"]}),
        json!({
            "equipmentId": "AB1234",
            "issue": "모터 불량",
            "parts": [
                "모터", "배터리", "IOT", "컨트롤러", "브레이크 와이어", "배터리 커버락",
                "모터 케이블", "킥스탠드", "핸들바", "스로틀", "기타"
            ]
        }),
    ];

    for case in cases {
        let resp = submit_report(&fixture, &client, case.clone()).await;
        assert_eq!(resp.status(), 400, "accepted {}", case);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let body = get_json(&fixture, &client, "/api/reports", &[]).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_reports_need_listed_author() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let resp = submit_report(
        &fixture,
        &admin,
        json!({"equipmentId": "AB1234", "issue": "모터 불량"}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = submit_report(
        &fixture,
        &admin,
        json!({"author": "박엔지", "equipmentId": "AB1234", "issue": "모터 불량"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["author"], "박엔지");
}

#[tokio::test]
async fn test_report_update_and_delete() {
    let fixture = TestFixture::new().await;
    let owner = fixture.user("김정비").await;
    let other = fixture.user("이수리").await;

    let resp = submit_report(
        &fixture,
        &owner,
        json!({"equipmentId": "AB1234", "issue": "모터 불량", "parts": ["모터"]}),
    )
    .await;
    let created: Value = resp.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/reports/{}", id);

    // Someone else's report
    let resp = other
        .put(fixture.url(&path))
        .json(&json!({"issue": "IOT 오류"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let resp = other.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = owner
        .put(fixture.url(&path))
        .json(&json!({"issue": "배터리 문제", "parts": ["배터리", "배터리"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["data"]["issue"], "배터리 문제");
    assert_eq!(updated["data"]["parts"], json!(["배터리"]));
    assert_eq!(updated["data"]["equipmentId"], "AB1234");
    assert_eq!(updated["data"]["createdAt"], created["data"]["createdAt"]);

    let resp = owner.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["deleted"], true);

    let body = get_json(&fixture, &owner, "/api/reports", &[]).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Deleting again is not an error
    let resp = owner.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["deleted"], false);

    let resp = owner
        .put(fixture.url(&path))
        .json(&json!({"issue": "IOT 오류"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_report_visibility() {
    let fixture = TestFixture::new().await;
    let kim = fixture.user("김정비").await;
    let lee = fixture.user("이수리").await;
    let admin = fixture.admin().await;

    submit_report(&fixture, &kim, json!({"equipmentId": "AA0001", "issue": "모터 불량"})).await;
    submit_report(&fixture, &lee, json!({"equipmentId": "AA0002", "issue": "모터 불량"})).await;

    let body = get_json(&fixture, &kim, "/api/reports", &[]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["author"], "김정비");

    let resp = kim
        .get(fixture.url("/api/reports"))
        .query(&[("author", "이수리")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let body = get_json(&fixture, &admin, "/api/reports", &[]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let body = get_json(&fixture, &admin, "/api/reports", &[("author", "이수리")]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["equipmentId"], "AA0002");
}

#[tokio::test]
async fn test_scan_fills_blank_equipment_id() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    let resp = client
        .post(fixture.url("/api/session/scan"))
        .json(&json!({"raw": "https://scan.example.com/device/ab1234/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["equipmentId"], "AB1234");

    let body = get_json(&fixture, &client, "/api/session", &[]).await;
    assert_eq!(body["data"]["scannedEquipmentId"], "AB1234");

    let resp = submit_report(
        &fixture,
        &client,
        json!({"equipmentId": "", "issue": "모터 불량"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["equipmentId"], "AB1234");

    // The buffer is consumed by the submit
    let body = get_json(&fixture, &client, "/api/session", &[]).await;
    assert!(body["data"].get("scannedEquipmentId").is_none());

    let resp = submit_report(
        &fixture,
        &client,
        json!({"equipmentId": "", "issue": "모터 불량"}),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_resolve_equipment() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    let body = get_json(
        &fixture,
        &client,
        "/api/equipment/resolve",
        &[("url", "https://scan.example.com/?qr=XY9876")],
    )
    .await;
    assert_eq!(body["data"]["equipmentId"], "XY9876");

    let body = get_json(&fixture, &client, "/api/equipment/resolve", &[("qr", "CD4321")]).await;
    assert_eq!(body["data"]["equipmentId"], "CD4321");
}

#[tokio::test]
async fn test_count_replace_is_idempotent() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;
    let entries = json!([
        {"device": "S9", "issue": "모터", "count": 3},
        {"device": "S9", "issue": "스로틀", "count": 0},
        {"device": "W1", "issue": "IOT", "count": 2}
    ]);

    let resp = save_counts(&fixture, &client, DAY, "내유캠프", entries.clone()).await;
    assert_eq!(resp.status(), 200);
    let first = get_json(&fixture, &client, "/api/counts", &[("date", DAY)]).await;

    let resp = save_counts(&fixture, &client, DAY, "내유캠프", entries).await;
    assert_eq!(resp.status(), 200);
    let second = get_json(&fixture, &client, "/api/counts", &[("date", DAY)]).await;

    let expected = vec![
        ("S9".to_string(), "모터".to_string(), 3),
        ("W1".to_string(), "IOT".to_string(), 2),
    ];
    assert_eq!(tally_set(&first), expected);
    assert_eq!(tally_set(&second), expected);

    // A new save replaces the scope
    save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([{"device": "I9", "issue": "기타(증상 파악중)", "count": 1}]),
    )
    .await;
    let body = get_json(&fixture, &client, "/api/counts", &[("date", DAY)]).await;
    assert_eq!(
        tally_set(&body),
        vec![("I9".to_string(), "기타(증상 파악중)".to_string(), 1)]
    );

    // All zeros clear it
    save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([{"device": "I9", "issue": "기타(증상 파악중)", "count": 0}]),
    )
    .await;
    let body = get_json(&fixture, &client, "/api/counts", &[("date", DAY)]).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_count_scope_by_role() {
    let fixture = TestFixture::new().await;
    let kim = fixture.user("김정비").await;
    let lee = fixture.user("이수리").await;
    let admin = fixture.admin().await;

    save_counts(&fixture, &kim, DAY, "독산캠프", json!([{"device": "S9", "issue": "모터", "count": 1}])).await;
    save_counts(&fixture, &lee, DAY, "독산캠프", json!([{"device": "W9", "issue": "모터", "count": 2}])).await;
    save_counts(&fixture, &kim, DAY, "장안캠프", json!([{"device": "S9", "issue": "모터", "count": 7}])).await;

    // A user's save leaves other authors' rows alone
    save_counts(&fixture, &kim, DAY, "독산캠프", json!([{"device": "S9", "issue": "모터", "count": 4}])).await;
    let body = get_json(&fixture, &admin, "/api/counts", &[("camp", "독산캠프")]).await;
    assert_eq!(
        tally_set(&body),
        vec![
            ("S9".to_string(), "모터".to_string(), 4),
            ("W9".to_string(), "모터".to_string(), 2),
        ]
    );

    // An admin save replaces the whole (date, camp)
    save_counts(&fixture, &admin, DAY, "독산캠프", json!([{"device": "디어", "issue": "IOT", "count": 5}])).await;
    let body = get_json(&fixture, &admin, "/api/counts", &[("camp", "독산캠프")]).await;
    assert_eq!(tally_set(&body), vec![("디어".to_string(), "IOT".to_string(), 5)]);
    assert_eq!(body["data"][0]["author"], "admin");

    // Other camps are untouched
    let body = get_json(&fixture, &admin, "/api/counts", &[("camp", "장안캠프")]).await;
    assert_eq!(tally_set(&body), vec![("S9".to_string(), "모터".to_string(), 7)]);
}

#[tokio::test]
async fn test_count_validation() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    let resp = save_counts(&fixture, &client, "05/01/2024", "내유캠프", json!([])).await;
    assert_eq!(resp.status(), 400);

    let resp = save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([{"device": "S9", "issue": "모터", "count": -1}]),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = save_counts(&fixture, &client, DAY, " ", json!([])).await;
    assert_eq!(resp.status(), 400);

    // Camp, device and issue must come from their option lists
    let resp = save_counts(&fixture, &client, DAY, "성수캠프", json!([])).await;
    assert_eq!(resp.status(), 400);

    for entry in [
        json!({"device": "X7", "issue": "모터", "count": 1}),
        json!({"device": "S9", "issue": "모터 불량", "count": 1}),
    ] {
        let resp = save_counts(&fixture, &client, DAY, "내유캠프", json!([entry])).await;
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let body = get_json(&fixture, &client, "/api/counts", &[]).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_count_recent_window() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();

    save_counts(&fixture, &client, &today, "내유캠프", json!([{"device": "S9", "issue": "모터", "count": 1}])).await;
    save_counts(&fixture, &client, "2000-01-01", "내유캠프", json!([{"device": "S9", "issue": "모터", "count": 9}])).await;

    let body = get_json(&fixture, &client, "/api/counts", &[("days", "7")]).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["date"], today.as_str());

    let body = get_json(&fixture, &client, "/api/counts", &[]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_count_window_beyond_calendar() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    save_counts(&fixture, &client, "2000-01-01", "내유캠프", json!([{"device": "S9", "issue": "모터", "count": 2}])).await;

    let body = get_json(&fixture, &client, "/api/counts", &[("days", "4000000000")]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body = get_json(
        &fixture,
        &client,
        "/api/stats/group",
        &[("by", "camp"), ("days", "200000000")],
    )
    .await;
    assert_eq!(body["data"]["data"]["total"], 2);
}

#[tokio::test]
async fn test_group_stats() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    let body = get_json(&fixture, &client, "/api/stats/group", &[("by", "camp")]).await;
    assert_eq!(body["data"]["status"], "noData");

    save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([
            {"device": "S9", "issue": "모터", "count": 2},
            {"device": "W1", "issue": "모터", "count": 3}
        ]),
    )
    .await;
    save_counts(&fixture, &client, DAY, "독산캠프", json!([{"device": "S9", "issue": "IOT", "count": 5}])).await;

    let body = get_json(&fixture, &client, "/api/stats/group", &[("by", "camp")]).await;
    let data = &body["data"];
    assert_eq!(data["status"], "ready");
    assert_eq!(data["data"]["total"], 10);
    assert_eq!(
        data["data"]["groups"],
        json!([
            {"key": "내유캠프", "total": 5},
            {"key": "독산캠프", "total": 5}
        ])
    );

    let body = get_json(
        &fixture,
        &client,
        "/api/stats/group",
        &[("by", "device"), ("camp", "내유캠프")],
    )
    .await;
    assert_eq!(body["data"]["data"]["summary"], "S9 2, W1 3");
}

#[tokio::test]
async fn test_pivot_stats() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([
            {"device": "S9", "issue": "모터", "count": 4},
            {"device": "W1", "issue": "IOT", "count": 1},
            {"device": "W9", "issue": "모터", "count": 2}
        ]),
    )
    .await;

    // Rows can outlive the option value they were saved with
    let resp = client
        .delete(fixture.url("/api/options/devices/W9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = get_json(
        &fixture,
        &client,
        "/api/stats/pivot",
        &[("rows", "device"), ("cols", "issue")],
    )
    .await;
    assert_eq!(body["data"]["status"], "ready");
    let table = &body["data"]["data"];

    // Configured devices first, then unknown ones
    let labels: Vec<&str> = table["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["S9", "디어", "W1", "I9", "W9"]);

    let columns = table["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 11);
    let motor = columns.iter().position(|c| c == "모터").unwrap();
    assert_eq!(table["rows"][0]["cells"][motor], 4);
    assert_eq!(table["rows"][0]["total"], 4);
    assert_eq!(table["totals"]["cells"][motor], 6);
    assert_eq!(table["totals"]["total"], 7);

    let resp = client
        .get(fixture.url("/api/stats/pivot"))
        .query(&[("rows", "camp"), ("cols", "camp")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_report_stats_count_parts_once_each() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    submit_report(
        &fixture,
        &client,
        json!({"equipmentId": "AA0001", "issue": "모터 불량", "parts": ["모터", "배터리"]}),
    )
    .await;
    submit_report(
        &fixture,
        &client,
        json!({"equipmentId": "AA0002", "issue": "모터 불량", "parts": ["모터"]}),
    )
    .await;

    let body = get_json(&fixture, &client, "/api/stats/reports", &[("by", "part")]).await;
    assert_eq!(
        body["data"]["data"]["groups"],
        json!([
            {"key": "모터", "total": 2},
            {"key": "배터리", "total": 1}
        ])
    );

    let body = get_json(&fixture, &client, "/api/stats/reports", &[("by", "issue")]).await;
    assert_eq!(body["data"]["data"]["total"], 2);
}

#[tokio::test]
async fn test_stored_counts_are_coerced() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    for (id, count) in [("c1", "3"), ("c2", "abc"), ("c3", "")] {
        sqlx::query(
            "INSERT INTO issue_counts (id, date, camp, device, issue, author, count) VALUES (?, ?, '내유캠프', 'S9', '모터', 'admin', ?)",
        )
        .bind(id)
        .bind(DAY)
        .bind(count)
        .execute(&fixture.pool)
        .await
        .unwrap();
    }

    let body = get_json(&fixture, &client, "/api/stats/group", &[("by", "camp")]).await;
    assert_eq!(body["data"]["data"]["total"], 3);

    let body = get_json(&fixture, &client, "/api/counts", &[]).await;
    let mut counts: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["count"].as_i64().unwrap())
        .collect();
    counts.sort();
    assert_eq!(counts, vec![0, 0, 3]);
}

#[tokio::test]
async fn test_options_management() {
    let fixture = TestFixture::new().await;
    let user = fixture.user("김정비").await;
    let admin = fixture.admin().await;

    let body = get_json(&fixture, &user, "/api/options", &[]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 6);

    let body = get_json(&fixture, &user, "/api/options/camps", &[]).await;
    assert_eq!(body["data"]["items"], json!(["내유캠프", "독산캠프", "장안캠프"]));

    let resp = user
        .post(fixture.url("/api/options/camps"))
        .json(&json!({"value": "성수캠프"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = admin
        .post(fixture.url("/api/options/camps"))
        .json(&json!({"value": "성수캠프"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 4);

    let resp = admin
        .post(fixture.url("/api/options/camps"))
        .json(&json!({"value": "성수캠프"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");

    let resp = admin
        .delete(fixture.url("/api/options/camps/성수캠프"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = admin
        .delete(fixture.url("/api/options/camps/성수캠프"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = user
        .get(fixture.url("/api/options/colors"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_new_author_can_log_in() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin().await;

    let resp = fixture
        .login(json!({"mode": "user", "author": "최신입"}))
        .await;
    assert_eq!(resp.status(), 401);

    admin
        .post(fixture.url("/api/options/authors"))
        .json(&json!({"value": "최신입"}))
        .send()
        .await
        .unwrap();

    let resp = fixture
        .login(json!({"mode": "user", "author": "최신입"}))
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_export_pivot_csv() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    save_counts(
        &fixture,
        &client,
        DAY,
        "내유캠프",
        json!([{"device": "S9", "issue": "모터", "count": 4}]),
    )
    .await;

    let resp = client
        .get(fixture.url("/api/export/pivot"))
        .query(&[
            ("rows", "camp"),
            ("cols", "device"),
            ("format", "csv"),
            ("filename", "camp_device.csv"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let headers = resp.headers().clone();
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(headers["content-disposition"]
        .to_str()
        .unwrap()
        .contains("camp_device.csv"));

    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(UTF8_BOM));

    let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "camp,S9,디어,W1,W9,I9,total");
    assert_eq!(lines[1], "내유캠프,4,0,0,0,0,4");
    assert_eq!(lines.last().unwrap(), &"total,4,0,0,0,0,4");
}

#[tokio::test]
async fn test_export_group_csv() {
    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    save_counts(&fixture, &client, DAY, "내유캠프", json!([{"device": "S9", "issue": "모터", "count": 2}])).await;
    save_counts(&fixture, &client, DAY, "독산캠프", json!([{"device": "S9", "issue": "모터", "count": 3}])).await;

    let resp = client
        .get(fixture.url("/api/export/group"))
        .query(&[("by", "camp"), ("format", "csv"), ("filename", "camps.csv")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let bytes = resp.bytes().await.unwrap();
    let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["camp,count", "내유캠프,2", "독산캠프,3"]);
}

#[tokio::test]
async fn test_export_workbook_xlsx() {
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    let fixture = TestFixture::new().await;
    let client = fixture.admin().await;

    save_counts(
        &fixture,
        &client,
        DAY,
        "장안캠프",
        json!([
            {"device": "W9", "issue": "핸들바", "count": 2},
            {"device": "I9", "issue": "모터", "count": 1}
        ]),
    )
    .await;

    let resp = client
        .get(fixture.url("/api/export/workbook"))
        .query(&[("filename", "tally.xlsx"), ("camp", "장안캠프")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );

    let bytes = resp.bytes().await.unwrap();
    let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["raw".to_string(), "camp_device".to_string(), "device_issue".to_string()]
    );

    let raw = workbook.worksheet_range("raw").unwrap();
    assert_eq!(raw.height(), 3);

    let camp_device = workbook.worksheet_range("camp_device").unwrap();
    let total_row = camp_device.rows().last().unwrap();
    assert_eq!(total_row[0], Data::String("total".to_string()));
    assert_eq!(total_row.last().unwrap(), &Data::Float(3.0));
}

#[tokio::test]
async fn test_export_reports_and_no_data() {
    let fixture = TestFixture::new().await;
    let client = fixture.user("김정비").await;

    let resp = client
        .get(fixture.url("/api/export/reports"))
        .query(&[("format", "csv"), ("filename", "reports.csv")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "noData");

    submit_report(&fixture, &client, json!({"equipmentId": "AA0001", "issue": "모터 불량"})).await;
    submit_report(&fixture, &client, json!({"equipmentId": "AA0002", "issue": "IOT 오류"})).await;

    let resp = client
        .get(fixture.url("/api/export/reports"))
        .query(&[("format", "csv"), ("filename", "reports.csv")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let bytes = resp.bytes().await.unwrap();
    let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("AA0001"));
    assert!(lines[2].contains("AA0002"));

    let resp = client
        .get(fixture.url("/api/export/reports"))
        .query(&[("format", "csv"), ("filename", "../reports.csv")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_report_cache_serves_stale_listing() {
    let fixture = TestFixture::with_cache_ttl(Some(Duration::from_secs(60))).await;
    let client = fixture.user("김정비").await;

    let body = get_json(&fixture, &client, "/api/reports", &[]).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let resp = submit_report(
        &fixture,
        &client,
        json!({"equipmentId": "AB1234", "issue": "모터 불량"}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // Within the TTL the cached listing is returned as-is
    let body = get_json(&fixture, &client, "/api/reports", &[]).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Admin listings are cached separately
    let admin = fixture.admin().await;
    let body = get_json(&fixture, &admin, "/api/reports", &[]).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
