//! Session Status Route

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{AppState, SessionStatus};

/// Get the latest session status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    let status = state.status.borrow().clone();
    Json(status)
}
