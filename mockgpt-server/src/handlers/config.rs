use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
};

/// Returns the configuration document as stored.
#[instrument(skip_all)]
pub async fn get_config(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let document = state.config_store.load_document().await?;
    Ok(Json(document))
}

/// Replaces the configuration document; takes effect on the next request.
#[instrument(skip_all)]
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let document: Value = serde_json::from_slice(&body).map_err(|err| {
        ApiError::invalid_request(format!("configuration is not valid JSON: {err}"))
    })?;

    state.config_store.save_document(document).await?;
    info!("configuration document replaced");

    Ok(Json(json!({"status": "success"})))
}
