//! Integration tests for the Supabase client against a mocked project.

use bytes::Bytes;
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use wardline_config::SupabaseConfig;
use wardline_supabase::{in_filter, SupabaseClient, SupabaseError};

const ANON_KEY: &str = "anon-test-key";
const TOKEN: &str = "user-access-token";

#[derive(Debug, Deserialize)]
struct Department {
    id: Uuid,
    name: String,
}

fn client_for(server: &MockServer) -> SupabaseClient {
    SupabaseClient::new(&SupabaseConfig {
        url: server.base_url(),
        anon_key: ANON_KEY.to_string(),
        request_timeout_seconds: 5,
    })
    .expect("client should build")
}

#[tokio::test]
async fn get_user_forwards_token_and_api_key() {
    let server = MockServer::start_async().await;
    let user_id = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("apikey", ANON_KEY)
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(json!({
                "id": user_id,
                "email": "nurse@example.org",
                "role": "authenticated",
                "aud": "authenticated"
            }));
        })
        .await;

    let user = client_for(&server)
        .get_user(TOKEN)
        .await
        .expect("user should resolve");

    mock.assert_async().await;
    assert_eq!(user.id, user_id);
    assert_eq!(user.email.as_deref(), Some("nurse@example.org"));
}

#[tokio::test]
async fn get_user_maps_rejection_to_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/auth/v1/user");
            then.status(401)
                .json_body(json!({"code": 401, "msg": "invalid JWT: token is expired"}));
        })
        .await;

    let error = client_for(&server)
        .get_user("expired")
        .await
        .expect_err("expired token should be rejected");

    match error {
        SupabaseError::Auth { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("expired"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn select_applies_filters_order_and_pagination() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/departments")
                .query_param("select", "id,name")
                .query_param("is_active", "eq.true")
                .query_param("order", "name.asc")
                .query_param("limit", "10")
                .query_param("offset", "20")
                .header("prefer", "count=exact");
            then.status(200)
                .header("content-range", "20-20/21")
                .json_body(json!([{ "id": id, "name": "Emergency" }]));
        })
        .await;

    let page = client_for(&server)
        .for_user(TOKEN)
        .from("departments")
        .select("id,name")
        .eq("is_active", true)
        .order("name", true)
        .limit(10)
        .offset(20)
        .fetch_page::<Department>()
        .await
        .expect("query should succeed");

    mock.assert_async().await;
    assert_eq!(page.total, Some(21));
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].id, id);
    assert_eq!(page.rows[0].name, "Emergency");
}

#[tokio::test]
async fn or_filter_is_wrapped_in_parentheses() {
    let server = MockServer::start_async().await;
    let department = Uuid::new_v4();
    let expected = format!(
        "(is_system_wide.is.true,{})",
        in_filter("department_id", [department])
    );
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/announcements")
                .query_param("or", expected.as_str());
            then.status(200).json_body(json!([]));
        })
        .await;

    let rows: Vec<serde_json::Value> = client_for(&server)
        .for_user(TOKEN)
        .from("announcements")
        .or(format!(
            "is_system_wide.is.true,{}",
            in_filter("department_id", [department])
        ))
        .fetch()
        .await
        .expect("query should succeed");

    mock.assert_async().await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn fetch_one_maps_missing_row_to_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/incidents")
                .header("accept", "application/vnd.pgrst.object+json");
            then.status(406).json_body(json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            }));
        })
        .await;

    let error = client_for(&server)
        .for_user(TOKEN)
        .from("incidents")
        .eq("id", Uuid::new_v4())
        .fetch_one::<serde_json::Value>()
        .await
        .expect_err("missing row should fail");

    assert!(error.is_not_found());
    assert_eq!(error.status(), Some(406));
}

#[tokio::test]
async fn insert_surfaces_rls_denial() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/announcements")
                .header("prefer", "return=representation")
                .json_body(json!({"title": "Fire drill"}));
            then.status(403).json_body(json!({
                "code": "42501",
                "details": null,
                "hint": null,
                "message": "new row violates row-level security policy for table \"announcements\""
            }));
        })
        .await;

    let error = client_for(&server)
        .for_user(TOKEN)
        .from("announcements")
        .insert::<_, serde_json::Value>(&json!({"title": "Fire drill"}))
        .await
        .expect_err("insert should be denied");

    mock.assert_async().await;
    assert!(error.is_permission_denied());
}

#[tokio::test]
async fn upsert_sends_conflict_target_and_merge_preference() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/department_metrics_daily")
                .query_param("on_conflict", "department_id,metric_date")
                .header(
                    "prefer",
                    "resolution=merge-duplicates,return=representation",
                );
            then.status(201)
                .json_body(json!({"department_id": "d", "metric_date": "2024-03-01"}));
        })
        .await;

    let row: serde_json::Value = client_for(&server)
        .for_user(TOKEN)
        .from("department_metrics_daily")
        .on_conflict("department_id,metric_date")
        .upsert(&json!({"department_id": "d", "metric_date": "2024-03-01"}))
        .await
        .expect("upsert should succeed");

    mock.assert_async().await;
    assert_eq!(row["metric_date"], "2024-03-01");
}

#[tokio::test]
async fn storage_round_trip_uses_bucket_paths() {
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/documents/general/policy.pdf")
                .header("content-type", "application/pdf")
                .header("x-upsert", "false");
            then.status(200)
                .json_body(json!({"Key": "documents/general/policy.pdf"}));
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/storage/v1/object/documents/general/policy.pdf");
            then.status(200).body("%PDF-1.5");
        })
        .await;
    let remove = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/storage/v1/object/documents")
                .json_body(json!({"prefixes": ["general/policy.pdf"]}));
            then.status(200).json_body(json!([]));
        })
        .await;

    let bucket = client_for(&server).for_user(TOKEN).storage("documents");

    let key = bucket
        .upload("general/policy.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.5"))
        .await
        .expect("upload should succeed");
    assert_eq!(key, "documents/general/policy.pdf");

    let bytes = bucket
        .download("general/policy.pdf")
        .await
        .expect("download should succeed");
    assert_eq!(&bytes[..], b"%PDF-1.5");

    bucket
        .remove(&["general/policy.pdf".to_string()])
        .await
        .expect("remove should succeed");

    upload.assert_async().await;
    download.assert_async().await;
    remove.assert_async().await;
}

#[tokio::test]
async fn storage_missing_object_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/storage/v1/object/memos/missing.pdf");
            then.status(404).json_body(json!({
                "statusCode": "404",
                "error": "not_found",
                "message": "Object not found"
            }));
        })
        .await;

    let error = client_for(&server)
        .for_user(TOKEN)
        .storage("memos")
        .download("missing.pdf")
        .await
        .expect_err("missing object should fail");

    assert!(error.is_not_found());
}

#[tokio::test]
async fn and_groups_several_or_filters() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/announcements")
                .query_param("and", "(or(a.is.null,b.eq.1),or(c.is.true,d.eq.2))");
            then.status(200).json_body(json!([]));
        })
        .await;

    let rows: Vec<serde_json::Value> = client_for(&server)
        .for_user(TOKEN)
        .from("announcements")
        .and("or(a.is.null,b.eq.1),or(c.is.true,d.eq.2)")
        .fetch()
        .await
        .expect("query should succeed");

    mock.assert_async().await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn insert_only_asks_for_minimal_return() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/audit_logs")
                .header("prefer", "return=minimal")
                .json_body(json!({"action": "document.download"}));
            then.status(201);
        })
        .await;

    client_for(&server)
        .for_user(TOKEN)
        .from("audit_logs")
        .insert_only(&json!({"action": "document.download"}))
        .await
        .expect("insert should succeed");

    mock.assert_async().await;
}

#[tokio::test]
async fn page_past_the_end_is_empty_with_total() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/documents")
                .query_param("offset", "980");
            then.status(416)
                .header("content-range", "*/5")
                .json_body(json!({
                    "code": "PGRST103",
                    "details": "An offset of 980 was requested, but there are only 5 rows.",
                    "hint": null,
                    "message": "Requested range not satisfiable"
                }));
        })
        .await;

    let page = client_for(&server)
        .for_user(TOKEN)
        .from("documents")
        .limit(20)
        .offset(980)
        .fetch_page::<serde_json::Value>()
        .await
        .expect("out-of-range page should not fail");

    assert!(page.rows.is_empty());
    assert_eq!(page.total, Some(5));
}

#[tokio::test]
async fn storage_policy_denial_reported_in_body_is_forbidden() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/incident-files/ward-3/photo.png");
            then.status(400).json_body(json!({
                "statusCode": "403",
                "error": "Unauthorized",
                "message": "new row violates row-level security policy"
            }));
        })
        .await;

    let error = client_for(&server)
        .for_user(TOKEN)
        .storage("incident-files")
        .upload("ward-3/photo.png", "image/png", Bytes::from_static(b"png"))
        .await
        .expect_err("upload should be denied");

    assert_eq!(error.status(), Some(403));
    assert!(matches!(error, SupabaseError::Storage { status: 403, .. }));
}
