use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dcc_utils::{
    chrono::{DateTime, Utc},
    Requirements, TaskPayload, TaskStatus,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::TaskService;

/// Body of `POST /task`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub link: String,
    pub price_limit: u64,
    pub requirements: Requirements,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub private_key: String,
}

impl TaskRequest {
    /// A new payload created now.
    pub fn to_payload(&self) -> TaskPayload {
        TaskPayload {
            link: self.link.clone(),
            price_limit: self.price_limit,
            requirements: self.requirements,
            status: TaskStatus::New,
            created_at: Some(Utc::now()),
            expired_at: self.expired_at,
        }
    }
}

/// Response of an accepted `POST /task`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResponse {
    pub id: String,
}

#[derive(Clone)]
struct AppState {
    service: Arc<TaskService>,
    web_root: Arc<PathBuf>,
}

/// Routes of the HTTP front door.
pub fn router(service: Arc<TaskService>, web_root: PathBuf) -> Router {
    let state = AppState {
        service,
        web_root: Arc::new(web_root),
    };

    Router::new()
        .route("/healthcheck", get(handle_healthcheck))
        .route("/", get(handle_index))
        .route("/task", post(handle_task))
        .with_state(state)
}

/// Serves the router on `listener` until `cancellation` is cancelled,
/// then lets in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancellation: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Starting HTTP server on {}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancellation.cancelled().await })
        .await?;

    log::info!("HTTP server stopped.");
    Ok(())
}

/// Spawns [`serve`] on `task_tracker`.
///
/// If the server stops with an error, `cancellation` is cancelled so that the other
/// tasks stop too, and the error is returned by the handle.
pub fn spawn_server(
    task_tracker: &TaskTracker,
    listener: TcpListener,
    router: Router,
    cancellation: CancellationToken,
) -> JoinHandle<std::io::Result<()>> {
    task_tracker.spawn(async move {
        let result = serve(listener, router, cancellation.clone()).await;
        if let Err(err) = &result {
            log::error!("HTTP server error: {}", err);
            cancellation.cancel();
        }
        result
    })
}

async fn handle_healthcheck() -> StatusCode {
    StatusCode::OK
}

async fn handle_index(State(state): State<AppState>) -> Response {
    let path = state.web_root.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(index) => Html(index).into_response(),
        Err(err) => {
            log::debug!("Could not read {}: {}", path.display(), err);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn handle_task(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TaskRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("Could not decode task request: {}", err);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state
        .service
        .proceed_request(request.to_payload(), &request.public_key, &request.private_key)
        .await
    {
        Ok(task) => Json(TaskResponse {
            id: task.id().to_string(),
        })
        .into_response(),
        Err(err) => {
            log::warn!("Could not process task request: {}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}
