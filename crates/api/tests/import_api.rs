//! HTTP-level integration tests for the spreadsheet import workflow.
//!
//! Uses Axum's `tower::ServiceExt` to send requests directly to the router
//! without a TCP listener. The router runs over an in-memory store.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    body_json, delete, get, patch_json, post_empty, post_json, put_json, upload, upload_csv,
    wait_for_report,
};
use rolodex_core::store::{ImportStore, InMemoryStore, PersonFields};

const CONTACTS_CSV: &str = "Nome,Email,Empresa,CNPJ\n\
Ana Souza,ana@x.com,ACME LTDA,12.345.678/0001-99\n\
Bruno Lima,bruno@x.com,ACME LTDA,\n\
,sem-nome@x.com,,\n";

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_detects_mapping() {
    let app = common::build_test_app();
    let response = upload(&app, "contatos.csv", CONTACTS_CSV.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["step"], "mapping");
    assert_eq!(data["row_count"], 3);
    assert_eq!(data["headers"], serde_json::json!(["Nome", "Email", "Empresa", "CNPJ"]));
    assert_eq!(data["mapping"]["Nome"], "name");
    assert_eq!(data["mapping"]["Empresa"], "org_name");
    assert_eq!(data["mapping"]["CNPJ"], "cnpj");
    assert_eq!(data["can_advance"], true);
    assert!(data["preview"].is_null());
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let app = common::build_test_app();
    let response = upload(&app, "vazio.csv", b"").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "PARSE_ERROR");
    assert_eq!(json["error"], "Nenhum dado encontrado no arquivo");

    let health = body_json(get(&app, "/health").await).await;
    assert_eq!(health["active_sessions"], 0);
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let app = common::build_test_app();
    let response = upload(&app, "contatos.pdf", b"Nome\nAna\n").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PARSE_ERROR");
}

#[tokio::test]
async fn upload_over_configured_limit_returns_413() {
    let mut config = common::test_config();
    config.max_upload_bytes = 32;
    let app = common::build_test_app_with(Arc::new(InMemoryStore::new()), config);

    let response = upload(&app, "contatos.csv", CONTACTS_CSV.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn catalog_lists_required_name() {
    let app = common::build_test_app();
    let json = body_json(get(&app, "/api/v1/imports/catalog").await).await;
    let fields = json["data"].as_array().unwrap();
    assert_eq!(fields.len(), 17);
    assert_eq!(fields[0]["id"], "name");
    assert_eq!(fields[0]["required"], true);
    assert!(fields[1..].iter().all(|f| f["required"] == false));
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_requires_name_mapping() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Cliente,Email\nAna,ana@x.com\n").await;

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "MAPPING_INCOMPLETE");

    let response = patch_json(
        &app,
        &format!("/api/v1/imports/{id}/mapping"),
        serde_json::json!({"header": "Cliente", "field": "name"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["can_advance"], true);

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn assigning_a_taken_field_moves_it() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome,Contato\nAna,Ana S\n").await;

    let response = patch_json(
        &app,
        &format!("/api/v1/imports/{id}/mapping"),
        serde_json::json!({"header": "Contato", "field": "name"}),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["mapping"]["Contato"], "name");
    assert!(json["data"]["mapping"]["Nome"].is_null());
}

#[tokio::test]
async fn replace_mapping_rejects_duplicate_targets() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome,Contato\nAna,Ana S\n").await;

    let response = put_json(
        &app,
        &format!("/api/v1/imports/{id}/mapping"),
        serde_json::json!({"mapping": {"Nome": "name", "Contato": "name"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = put_json(
        &app,
        &format!("/api/v1/imports/{id}/mapping"),
        serde_json::json!({"mapping": {"Contato": "name"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["mapping"]["Nome"].is_null());
    assert_eq!(json["data"]["mapping"]["Contato"], "name");
}

// ---------------------------------------------------------------------------
// Preview and selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_classifies_rows_and_select_all_skips_errors() {
    let app = common::build_test_app();
    let id = upload_csv(&app, CONTACTS_CSV).await;

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let preview = &json["data"]["preview"];
    assert_eq!(json["data"]["step"], "preview");
    assert_eq!(preview["summary"]["total"], 3);
    assert_eq!(preview["summary"]["valid"], 2);
    assert_eq!(preview["summary"]["error"], 1);
    assert_eq!(preview["summary"]["selected"], 2);
    assert_eq!(preview["rows"][2]["status"], "error");
    assert_eq!(preview["rows"][2]["selected"], false);

    let response = post_json(
        &app,
        &format!("/api/v1/imports/{id}/rows/select-all"),
        serde_json::json!({"selected": false}),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["selected"], 0);

    let response = post_json(
        &app,
        &format!("/api/v1/imports/{id}/rows/select-all"),
        serde_json::json!({"selected": true}),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["selected"], 2);

    let response = patch_json(
        &app,
        &format!("/api/v1/imports/{id}/rows/2"),
        serde_json::json!({"selected": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["selected"], false);

    let response = patch_json(
        &app,
        &format!("/api/v1/imports/{id}/rows/9"),
        serde_json::json!({"selected": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_flags_existing_email() {
    let store = Arc::new(InMemoryStore::new());
    store
        .upsert_person(
            None,
            &PersonFields {
                name: "Bruno".to_string(),
                email: Some("bruno@x.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let app = common::build_test_app_with(store, common::test_config());
    let id = upload_csv(&app, CONTACTS_CSV).await;

    let json = body_json(post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await).await;
    let row = &json["data"]["preview"]["rows"][1];
    assert_eq!(row["status"], "warning");
    assert_eq!(row["selected"], true);
    assert_eq!(row["messages"][0]["message"], "Email existe");
}

// ---------------------------------------------------------------------------
// Commit and report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_import_creates_and_updates_records() {
    let store = Arc::new(InMemoryStore::new());
    let bruno = store
        .upsert_person(
            None,
            &PersonFields {
                name: "Bruno".to_string(),
                email: Some("bruno@x.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let app = common::build_test_app_with(Arc::clone(&store), common::test_config());
    let id = upload_csv(&app, CONTACTS_CSV).await;

    let response = get(&app, &format!("/api/v1/imports/{id}/report")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    let response = post_empty(&app, &format!("/api/v1/imports/{id}/commit")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let report = wait_for_report(&app, &id).await;
    let summary = &report["data"];
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["organizations"]["created"], 1);
    assert_eq!(summary["organizations"]["updated"], 1);
    assert_eq!(summary["people"]["created"], 1);
    assert_eq!(summary["people"]["updated"], 1);

    let orgs = store.organizations().await;
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].fields.cnpj.as_deref(), Some("12345678000199"));

    let people = store.people().await;
    assert_eq!(people.len(), 2);
    let updated = people.iter().find(|p| p.id == bruno).unwrap();
    assert_eq!(updated.fields.name, "Bruno Lima");
    assert!(people
        .iter()
        .all(|p| p.fields.organization_id == Some(orgs[0].id)));

    let json = body_json(get(&app, &format!("/api/v1/imports/{id}/progress")).await).await;
    assert_eq!(json["data"]["state"], "completed");
    assert_eq!(json["data"]["processed"], 2);
    assert_eq!(json["data"]["outcomes"].as_array().unwrap().len(), 2);

    let json = body_json(get(&app, &format!("/api/v1/imports/{id}")).await).await;
    assert_eq!(json["data"]["step"], "completed");
}

#[tokio::test]
async fn commit_without_selection_is_rejected() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome\nAna\n").await;
    post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    post_json(
        &app,
        &format!("/api/v1/imports/{id}/rows/select-all"),
        serde_json::json!({"selected": false}),
    )
    .await;

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/commit")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn commit_before_preview_conflicts() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome\nAna\n").await;

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/commit")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reset_after_commit_returns_to_mapping() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome\nAna\n").await;
    post_empty(&app, &format!("/api/v1/imports/{id}/preview")).await;
    post_empty(&app, &format!("/api/v1/imports/{id}/commit")).await;
    wait_for_report(&app, &id).await;

    let response = post_empty(&app, &format!("/api/v1/imports/{id}/reset")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["step"], "mapping");
    assert!(json["data"]["summary"].is_null());
    assert_eq!(json["data"]["progress"]["state"], "idle");
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_session_returns_404() {
    let app = common::build_test_app();
    let response = get(
        &app,
        "/api/v1/imports/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn discard_removes_session() {
    let app = common::build_test_app();
    let id = upload_csv(&app, "Nome\nAna\n").await;

    let response = delete(&app, &format!("/api/v1/imports/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app, &format!("/api/v1/imports/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
