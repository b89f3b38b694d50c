use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use wave_core::plan::{
    ExerciseSpec, LibraryItemSpec, MealSpec, PersistedPlan, PlanProvisioner, PlanRequest,
    PlanStore, ProvisionError, RegisterError,
};
use wave_db::models::LibraryItem;

type Provisioner = Arc<PlanProvisioner<Arc<dyn PlanStore>>>;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
    details: Map<String, Value>,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: Map::new(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    /// Storage failure. The cause is logged, never sent to the client.
    pub fn unavailable(err: &anyhow::Error) -> Self {
        tracing::error!(error = format!("{err:#}"), "storage failure");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage temporarily unavailable, retry later",
        )
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Validation(v) => AppError::bad_request(v.to_string())
                .with_detail("missing_fields", v.missing_fields),
            ProvisionError::Conflict { .. } => AppError::conflict(err.to_string()),
            ProvisionError::Storage(ref cause) => AppError::unavailable(cause),
            ProvisionError::Cancelled => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "request cancelled")
            }
        }
    }
}

impl From<RegisterError> for AppError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Validation(v) => AppError::bad_request(v.to_string())
                .with_detail("missing_fields", v.missing_fields),
            RegisterError::AlreadyExists { id, .. } => {
                AppError::conflict(err.to_string()).with_detail("id", id.to_string())
            }
            RegisterError::Storage(ref cause) => AppError::unavailable(cause),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let mut body = self.details;
        body.insert("error".to_owned(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(store: Arc<dyn PlanStore>) -> Router {
    let provisioner: Provisioner = Arc::new(PlanProvisioner::new(store));
    Router::new()
        .route("/api/plans/meal", post(create_plan::<MealSpec>))
        .route("/api/plans/exercise", post(create_plan::<ExerciseSpec>))
        .route("/api/plans/{id}", get(get_plan))
        .route("/api/meals", post(register_item::<MealSpec>))
        .route("/api/exercises", post(register_item::<ExerciseSpec>))
        .layer(CorsLayer::permissive())
        .with_state(provisioner)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(store: Arc<dyn PlanStore>, bind: &str, port: u16) -> Result<()> {
    let app = build_router(store);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("wave serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("wave serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

// A dropped connection drops this future and with it the open transaction.
async fn create_plan<I: LibraryItemSpec>(
    State(provisioner): State<Provisioner>,
    Json(request): Json<PlanRequest<I>>,
) -> Result<(StatusCode, Json<PersistedPlan>), AppError> {
    let persisted = provisioner.provision(request).await?;
    Ok((StatusCode::CREATED, Json(persisted)))
}

async fn get_plan(
    State(provisioner): State<Provisioner>,
    Path(id): Path<Uuid>,
) -> Result<Json<PersistedPlan>, AppError> {
    let persisted = provisioner
        .load_plan_graph(id)
        .await
        .map_err(|e| AppError::unavailable(&e))?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(persisted))
}

async fn register_item<I: LibraryItemSpec>(
    State(provisioner): State<Provisioner>,
    Json(spec): Json<I>,
) -> Result<(StatusCode, Json<LibraryItem>), AppError> {
    let item = provisioner.register_library_item(spec).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
