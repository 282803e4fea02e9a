use std::sync::Arc;

use super::*;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{domain::StepId, geometry::ZoneRect};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct CatalogState {
    zones: Arc<Mutex<Vec<Zone>>>,
    steps: Arc<Mutex<Vec<ProcessStep>>>,
    next_id: Arc<Mutex<i64>>,
}

impl CatalogState {
    async fn assign_id(&self, zone: &mut Zone) {
        if zone.id.is_provisional() {
            let mut next = self.next_id.lock().await;
            *next += 1;
            zone.id = ZoneId(100 + *next);
        }
    }
}

async fn list_zones(
    State(state): State<CatalogState>,
    Path(environment_id): Path<i64>,
) -> Json<Vec<Zone>> {
    let zones = state.zones.lock().await;
    Json(
        zones
            .iter()
            .filter(|zone| zone.environment_id.0 == environment_id)
            .cloned()
            .collect(),
    )
}

async fn replace_zones(
    State(state): State<CatalogState>,
    Path(_environment_id): Path<i64>,
    Json(update): Json<ZoneListUpdate>,
) -> Json<Vec<Zone>> {
    let mut stored = Vec::new();
    for mut zone in update.zones {
        state.assign_id(&mut zone).await;
        stored.push(zone);
    }
    *state.zones.lock().await = stored.clone();
    Json(stored)
}

async fn create_zone(
    State(state): State<CatalogState>,
    Json(mut zone): Json<Zone>,
) -> (StatusCode, Json<Zone>) {
    state.assign_id(&mut zone).await;
    state.zones.lock().await.push(zone.clone());
    (StatusCode::CREATED, Json(zone))
}

async fn delete_zone(
    State(state): State<CatalogState>,
    Path(zone_id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    let mut zones = state.zones.lock().await;
    let before = zones.len();
    zones.retain(|zone| zone.id.0 != zone_id);
    if zones.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Zone not found" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "message": "Zone deleted successfully" })),
    )
}

async fn list_steps(State(state): State<CatalogState>) -> Json<Vec<ProcessStep>> {
    Json(state.steps.lock().await.clone())
}

async fn save_steps(
    State(state): State<CatalogState>,
    Json(update): Json<StepListUpdate>,
) -> (StatusCode, Json<Value>) {
    if update
        .steps
        .iter()
        .any(|step| step.target_duration_seconds <= 0.0)
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Step 1 duration must be positive" })),
        );
    }
    *state.steps.lock().await = update.steps.clone();
    (StatusCode::OK, Json(json!(update.steps)))
}

async fn spawn_catalog_server() -> Result<(String, CatalogState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = CatalogState::default();
    let app = Router::new()
        .route(
            "/api/environments/:environment_id/zones",
            get(list_zones).put(replace_zones),
        )
        .route("/api/zones", post(create_zone))
        .route("/api/zones/:zone_id", delete(delete_zone))
        .route(
            "/api/processes/:process_id/steps",
            get(list_steps).post(save_steps),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn zone(id: i64, name: &str) -> Zone {
    Zone {
        id: ZoneId(id),
        environment_id: EnvironmentId(3),
        name: name.to_string(),
        rect: ZoneRect::from_corners(100, 100, 200, 200),
        color: "#ff6b6b".into(),
        created_at: None,
        created_by: "admin".into(),
        active: true,
    }
}

fn step(number: u32, target: f64) -> ProcessStep {
    ProcessStep {
        id: StepId(i64::from(number)),
        process_id: ProcessId(4),
        step_number: number,
        name: format!("Step {number}"),
        target_zone_id: ZoneId(101),
        target_duration_seconds: target,
        description: String::new(),
    }
}

#[tokio::test]
async fn saving_zones_returns_persisted_ids() {
    let (base, state) = spawn_catalog_server().await.expect("spawn server");
    let catalog = CatalogClient::new(HttpTransport::new(&base).expect("transport"));

    let stored = catalog
        .replace_zones(EnvironmentId(3), vec![zone(-1, "Bin"), zone(-2, "Press")])
        .await
        .expect("save");
    assert!(stored.iter().all(|zone| !zone.id.is_provisional()));
    assert_eq!(stored[0].rect, ZoneRect::from_corners(100, 100, 200, 200));

    let listed = catalog.list_zones(EnvironmentId(3)).await.expect("list");
    assert_eq!(listed, stored);
    assert_eq!(state.zones.lock().await.len(), 2);
}

#[tokio::test]
async fn create_and_delete_single_zone() {
    let (base, _state) = spawn_catalog_server().await.expect("spawn server");
    let catalog = CatalogClient::new(HttpTransport::new(&base).expect("transport"));

    let created = catalog.create_zone(&zone(-1, "Fixture")).await.expect("create");
    assert_eq!(created.id, ZoneId(101));

    catalog.delete_zone(created.id).await.expect("delete");
    let err = catalog.delete_zone(created.id).await.expect_err("gone");
    assert!(matches!(err, TransportError::Status { status: 404, .. }));
}

#[tokio::test]
async fn steps_are_replaced_as_a_list() {
    let (base, _state) = spawn_catalog_server().await.expect("spawn server");
    let catalog = CatalogClient::new(HttpTransport::new(&base).expect("transport"));

    let stored = catalog
        .replace_steps(ProcessId(4), vec![step(1, 5.0), step(2, 7.5)])
        .await
        .expect("save");
    assert_eq!(stored.len(), 2);
    assert_eq!(catalog.list_steps(ProcessId(4)).await.expect("list"), stored);

    let err = catalog
        .replace_steps(ProcessId(4), vec![step(1, 0.0)])
        .await
        .expect_err("rejected");
    match err {
        TransportError::Status { error, .. } => {
            assert_eq!(error.code, shared::error::ErrorCode::Validation)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
