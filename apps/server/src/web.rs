use axum::{
    extract::{Path, State},
    response::Html,
    routing::{delete, get, post},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use heater_core::{parse_setpoint, Controller, HeaterStatus};

use crate::error::ApiResult;

#[derive(Clone)]
pub struct WebState {
    pub controller: Arc<Controller>,
    pub static_dir: PathBuf,
}

/// Every API route refreshes the controller and answers with the fresh status.
pub fn create_router(
    controller: Arc<Controller>,
    static_dir: PathBuf,
    enable_cors: bool,
) -> Router {
    let app_state = WebState {
        controller,
        static_dir: static_dir.clone(),
    };

    let mut router = Router::new()
        .route("/", get(serve_status_page))
        .route("/status", get(get_status))
        .route("/enable", post(enable))
        .route("/disable", post(disable))
        .route("/set_desired_temp/:value", post(set_desired_temp))
        .route("/override", delete(clear_override))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    router
}

async fn serve_status_page(State(state): State<WebState>) -> Html<String> {
    match tokio::fs::read_to_string(state.static_dir.join("status.html")).await {
        Ok(content) => Html(content),
        Err(e) => {
            tracing::error!(error = %e, "Error reading status.html");
            Html("Error loading page".to_string())
        }
    }
}

async fn get_status(State(state): State<WebState>) -> Json<HeaterStatus> {
    Json(state.controller.refresh().await)
}

async fn enable(State(state): State<WebState>) -> Json<HeaterStatus> {
    Json(state.controller.enable().await)
}

async fn disable(State(state): State<WebState>) -> Json<HeaterStatus> {
    Json(state.controller.disable().await)
}

async fn set_desired_temp(
    State(state): State<WebState>,
    Path(value): Path<String>,
) -> ApiResult<Json<HeaterStatus>> {
    let temp = parse_setpoint(&value)?;
    Ok(Json(state.controller.set_desired_temp(temp).await?))
}

async fn clear_override(State(state): State<WebState>) -> Json<HeaterStatus> {
    Json(state.controller.clear_override().await)
}
