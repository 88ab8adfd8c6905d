//! File uploads over HTTP: local validation gates every network call.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{test_config, Harness, MockServer, Reply};
use pomgmt_client::{UploadCandidate, UploadCoordinator};
use pomgmt_core::endpoints;
use pomgmt_core::upload::{FileKind, RejectionReason, UploadOutcome};

fn coordinator(harness: &Harness) -> UploadCoordinator {
    UploadCoordinator::new(harness.api.clone())
}

#[tokio::test]
async fn rejected_files_never_reach_the_server() {
    let server = MockServer::start().await;
    let harness = Harness::signed_in(&test_config(&server.base_url), "t");
    let uploads = coordinator(&harness);

    let pdf = uploads
        .submit(UploadCandidate::from_bytes("scan.pdf", vec![0; 10]), FileKind::PurchaseOrder)
        .await;
    let no_extension = uploads
        .submit(UploadCandidate::from_bytes("README", vec![0; 10]), FileKind::Acceptance)
        .await;

    assert_eq!(pdf.rejection_reason, Some(RejectionReason::UnsupportedType));
    assert_eq!(no_extension.rejection_reason, Some(RejectionReason::UnsupportedType));
    assert!(server.hits().is_empty());
}

#[tokio::test]
async fn accepted_file_hits_its_endpoint_once() {
    let server = MockServer::start().await;
    server.reply(
        endpoints::UPLOAD_ACCEPTANCE,
        Reply::json(StatusCode::OK, json!({ "message": "queued" })),
    );
    let harness = Harness::signed_in(&test_config(&server.base_url), "t");
    let uploads = coordinator(&harness);

    let attempt = uploads
        .submit(
            UploadCandidate::from_bytes("acceptance.xlsx", b"sheet".to_vec()),
            FileKind::Acceptance,
        )
        .await;

    assert_eq!(attempt.outcome, UploadOutcome::Accepted);
    assert_eq!(
        attempt.message.as_deref(),
        Some("Acceptance file uploaded successfully! Processing has started in the background.")
    );
    assert!(server.hits_for(endpoints::UPLOAD_PURCHASE_ORDER).is_empty());
    let hits = server.hits_for(endpoints::UPLOAD_ACCEPTANCE);
    assert_eq!(hits.len(), 1);
    assert!(hits[0]
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    assert_eq!(hits[0].header("authorization"), Some("Bearer t"));
    let body = String::from_utf8_lossy(&hits[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"acceptance.xlsx\""));
}

#[tokio::test]
async fn server_rejection_detail_is_shown() {
    let server = MockServer::start().await;
    server.reply(
        endpoints::UPLOAD_PURCHASE_ORDER,
        Reply::json(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "detail": "Missing required column: PO Number" }),
        ),
    );
    let harness = Harness::signed_in(&test_config(&server.base_url), "t");
    let uploads = coordinator(&harness);

    let attempt = uploads
        .submit(UploadCandidate::from_bytes("po.csv", b"a,b\n".to_vec()), FileKind::PurchaseOrder)
        .await;

    assert_eq!(attempt.outcome, UploadOutcome::Rejected);
    assert_eq!(attempt.message.as_deref(), Some("Missing required column: PO Number"));
    assert_eq!(uploads.banner().as_deref(), Some("Missing required column: PO Number"));
}
