use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::{Query, Store, SupabaseClient};

#[tokio::test]
async fn test_select_sends_postgrest_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/backup_monitoring_alerts"))
        .and(query_param("status", "eq.active"))
        .and(query_param("processed_at", "is.null"))
        .and(header("apikey", "service-key"))
        .and(header("Authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"alert_id": "a-1", "status": "active", "processed_at": null}
        ])))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_credentials(&mock_server.uri(), "service-key");
    let rows = client
        .select(
            "backup_monitoring_alerts",
            &Query::new().eq("status", "active").is_null("processed_at"),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["alert_id"], "a-1");
}

#[tokio::test]
async fn test_insert_posts_row() {
    let mock_server = MockServer::start().await;
    let row = json!({"event_id": "e-1", "event_type": "recovery_started"});

    Mock::given(method("POST"))
        .and(path("/rest/v1/disaster_recovery_events"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(row.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row.clone()])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_credentials(&mock_server.uri(), "service-key");
    client.insert("disaster_recovery_events", row).await.unwrap();
}

#[tokio::test]
async fn test_update_counts_returned_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/backup_monitoring_alerts"))
        .and(query_param("alert_id", "eq.a-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"alert_id": "a-1", "status": "resolved"}
        ])))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_credentials(&mock_server.uri(), "service-key");
    let updated = client
        .update(
            "backup_monitoring_alerts",
            &Query::new().eq("alert_id", "a-1"),
            json!({"status": "resolved"}),
        )
        .await
        .unwrap();

    assert_eq!(updated, 1);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/backup_health_data"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_credentials(&mock_server.uri(), "bad-key");
    let err = client
        .select("backup_health_data", &Query::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Authentication error"));
}
