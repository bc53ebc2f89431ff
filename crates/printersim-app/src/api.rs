// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP control plane: read and overwrite the consumables, serve the public
// directory (including received documents under `printjobs/`).

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use printersim_core::error::PrinterSimError;
use printersim_core::store::DeviceStore;
use printersim_core::types::PrinterSnapshot;

/// Body of `POST /printer`.  Both fields are required and must be JSON
/// booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConsumablesUpdate {
    pub has_ink: bool,
    pub has_paper: bool,
}

/// Control-plane failure rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(PrinterSimError);

impl From<PrinterSimError> for ApiError {
    fn from(err: PrinterSimError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PrinterSimError::MalformedControlInput(_) => StatusCode::BAD_REQUEST,
            PrinterSimError::JobNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the control-plane router.  Anything that is not `/printer` is
/// looked up in `public_dir`.
pub fn router(store: Arc<DeviceStore>, public_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/printer", get(read_printer).post(write_printer))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn read_printer(State(store): State<Arc<DeviceStore>>) -> Json<PrinterSnapshot> {
    Json(store.snapshot())
}

async fn write_printer(
    State(store): State<Arc<DeviceStore>>,
    payload: Result<Json<ConsumablesUpdate>, JsonRejection>,
) -> Result<Json<PrinterSnapshot>, ApiError> {
    let Json(update) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected consumables update");
        PrinterSimError::MalformedControlInput(rejection.body_text())
    })?;

    let snapshot = store.set_consumables(update.has_ink, update.has_paper);
    info!(has_ink = update.has_ink, has_paper = update.has_paper, "consumables set");
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    use super::*;

    fn setup() -> (TempDir, Arc<DeviceStore>, Router) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DeviceStore::new());
        let app = router(Arc::clone(&store), dir.path());
        (dir, store, app)
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_printer(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/printer")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get_printer() -> Request<Body> {
        Request::builder().uri("/printer").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn read_returns_defaults() {
        let (_dir, _store, app) = setup();
        let response = app.oneshot(get_printer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "has_ink": true, "has_paper": true, "jobs": [] })
        );
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, store, app) = setup();
        let job = store.begin_job("report.pdf".into(), None);
        store
            .complete_job(job.id, "printjobs/job-1.ps".into(), String::new())
            .unwrap();

        let payload = json!({ "has_ink": false, "has_paper": true });
        let response = app.clone().oneshot(post_printer(payload.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let written = body_json(response).await;

        let read = body_json(app.oneshot(get_printer()).await.unwrap()).await;
        assert_eq!(written, read);
        assert_eq!(
            read,
            json!({
                "has_ink": false,
                "has_paper": true,
                "jobs": [
                    { "id": 1, "name": "report.pdf", "href": "printjobs/job-1.ps", "status": "Printed" }
                ],
            })
        );
        assert!(!store.has_ink());
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_without_change() {
        let (_dir, store, app) = setup();
        let bad_bodies = [
            json!({ "has_ink": "no", "has_paper": true }).to_string(),
            json!({ "has_ink": false }).to_string(),
            json!({ "has_ink": 0, "has_paper": 1 }).to_string(),
            "{not json".to_string(),
        ];

        for body in bad_bodies {
            let response = app.clone().oneshot(post_printer(body.clone())).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
            let error = body_json(response).await;
            assert!(error["error"].is_string(), "body {body}");
        }

        assert!(store.has_ink());
        assert!(store.has_paper());
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request() {
        let (_dir, _store, app) = setup();
        let request = Request::builder()
            .method("POST")
            .uri("/printer")
            .body(Body::from(r#"{"has_ink":false,"has_paper":false}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn posted_consumables_reach_the_printer_mib() {
        use printersim_snmp::PrinterMibResponder;
        use printersim_snmp::ber::{Oid, SnmpValue};
        use printersim_snmp::printer_mib::{PRT_INPUT_CURRENT_LEVEL, PRT_MARKER_SUPPLIES_LEVEL};

        let (_dir, store, app) = setup();
        let registry = PrinterMibResponder::with_hostname(Arc::clone(&store), "test-host").into_registry();
        let ink = Oid::from(PRT_MARKER_SUPPLIES_LEVEL).child(0);
        let paper = Oid::from(PRT_INPUT_CURRENT_LEVEL).child(0);
        assert_eq!(registry.get(&ink), SnmpValue::Integer(100));

        let payload = json!({ "has_ink": false, "has_paper": true });
        let response = app.oneshot(post_printer(payload.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(registry.get(&ink), SnmpValue::Integer(0));
        assert_eq!(registry.get(&paper), SnmpValue::Integer(-3));
    }

    #[tokio::test]
    async fn stored_documents_are_served_statically() {
        let (dir, _store, app) = setup();
        std::fs::create_dir_all(dir.path().join("printjobs")).unwrap();
        std::fs::write(dir.path().join("printjobs/job-1.ps"), b"%!PS\nshowpage\n").unwrap();

        let request = Request::builder()
            .uri("/printjobs/job-1.ps")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"%!PS\nshowpage\n");

        let missing = Request::builder().uri("/nope.html").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(missing).await.unwrap().status(), StatusCode::NOT_FOUND);
    }
}
