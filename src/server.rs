// server.rs — calibration trigger interface + status surface
//
// This is the boundary contract with the remote UI: three reset commands per
// tracker (optional reference orientation, identity when omitted), a
// pull-based corrected-orientation read, registry status, deregistration, and
// a WebSocket status push for the dashboard. The engine itself never touches
// HTTP; everything here goes through the shared registry lock.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::{sink::SinkExt, stream::StreamExt};
use nalgebra::Quaternion;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tower_http::cors::CorsLayer;

use crate::error::ResetError;
use crate::math::yaw_of;
use crate::sensors::now_ts;
use crate::tracker::{ResetKind, TrackerRegistry, TrackerStatus};

/// Registry shared between the ingestion drain loop and this server.
///
/// The write lock is held for the duration of one reset computation, which is
/// what guarantees a reset sees a consistent (raw, calibration) snapshot and
/// readers never observe a half-applied reset.
pub type SharedRegistry = Arc<RwLock<TrackerRegistry>>;

const INDEX_HTML: &str = "<!doctype html>\n<html><body>\n<h3>body tracker server</h3>\n<ul>\n<li>GET /trackers</li>\n<li>GET /trackers/{id}/orientation</li>\n<li>POST /trackers/{id}/reset/{full|yaw|mounting}</li>\n<li>DELETE /trackers/{id}</li>\n<li>GET /ws</li>\n</ul>\n</body></html>\n";

/// Optional reference orientation carried by a reset command.
#[derive(Debug, Deserialize)]
pub struct ReferenceBody {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ReferenceBody {
    fn quaternion(&self) -> Quaternion<f64> {
        Quaternion::new(self.w, self.x, self.y, self.z)
    }
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    ok: bool,
    tracker_id: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrientationResponse {
    tracker_id: String,
    w: f64,
    x: f64,
    y: f64,
    z: f64,
    yaw_deg: f64,
}

#[derive(Debug, Serialize)]
struct StatusPush {
    timestamp: f64,
    trackers: Vec<TrackerStatus>,
}

pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/trackers", get(list_handler))
        .route("/trackers/:id/orientation", get(orientation_handler))
        .route("/trackers/:id/reset/:kind", post(reset_handler))
        .route("/trackers/:id", delete(remove_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

pub async fn serve(registry: SharedRegistry, port: u16) -> anyhow::Result<()> {
    let app = router(registry);
    let addr = format!("0.0.0.0:{}", port);
    log::info!("trigger interface listening at http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn list_handler(State(registry): State<SharedRegistry>) -> impl IntoResponse {
    let statuses = registry.read().await.statuses();
    Json(statuses)
}

async fn orientation_handler(
    State(registry): State<SharedRegistry>,
    Path(id): Path<String>,
) -> Response {
    match registry.read().await.corrected(&id) {
        Some(q) => {
            let response = OrientationResponse {
                tracker_id: id,
                w: q.w,
                x: q.i,
                y: q.j,
                z: q.k,
                yaw_deg: yaw_of(&q).to_degrees(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no orientation for tracker", "tracker_id": id })),
        )
            .into_response(),
    }
}

async fn reset_handler(
    State(registry): State<SharedRegistry>,
    Path((id, kind)): Path<(String, String)>,
    body: Option<Json<ReferenceBody>>,
) -> impl IntoResponse {
    let kind = match kind.as_str() {
        "full" => ResetKind::Full,
        "yaw" => ResetKind::Yaw,
        "mounting" => ResetKind::Mounting,
        other => {
            return (
                StatusCode::NOT_FOUND,
                Json(ResetResponse {
                    ok: false,
                    tracker_id: id,
                    kind: other.to_string(),
                    error: Some("unknown reset kind".to_string()),
                }),
            );
        }
    };

    let reference = body.map(|Json(b)| b.quaternion());
    let result = registry.write().await.reset(&id, kind, reference);

    match result {
        Ok(()) => {
            log::info!("reset {} applied to tracker {}", kind.as_str(), id);
            (
                StatusCode::OK,
                Json(ResetResponse {
                    ok: true,
                    tracker_id: id,
                    kind: kind.as_str().to_string(),
                    error: None,
                }),
            )
        }
        Err(err) => {
            log::warn!("reset {} rejected for tracker {}: {}", kind.as_str(), id, err);
            let status = match err {
                ResetError::NoRawOrientationAvailable => StatusCode::CONFLICT,
                ResetError::InvalidReferenceOrientation => StatusCode::UNPROCESSABLE_ENTITY,
                ResetError::UnknownTracker(_) => StatusCode::NOT_FOUND,
            };
            (
                status,
                Json(ResetResponse {
                    ok: false,
                    tracker_id: id,
                    kind: kind.as_str().to_string(),
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn remove_handler(
    State(registry): State<SharedRegistry>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if registry.write().await.remove(&id) {
        log::info!("tracker {} deregistered", id);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<SharedRegistry>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: SharedRegistry) {
    let (mut sender, mut receiver) = socket.split();

    // Drain client frames so we notice a close.
    let drain = tokio::spawn(async move { while receiver.next().await.is_some() {} });

    // 5Hz status push
    loop {
        let push = StatusPush {
            timestamp: now_ts(),
            trackers: registry.read().await.statuses(),
        };
        let json = match serde_json::to_string(&push) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("status serialization failed: {}", err);
                break;
            }
        };
        if sender.send(Message::Text(json)).await.is_err() {
            // Client disconnected
            break;
        }
        sleep(Duration::from_millis(200)).await;
    }

    drain.abort();
}
