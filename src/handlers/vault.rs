use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::{AppError, Result},
    models::session::Session,
    state::AppState,
    validation::session::validate_data_type,
};

/// Lists the data types stored for the caller.
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<String>>> {
    let types = state.sessions.vault_for(&session).data_types().await?;
    Ok(Json(types))
}

/// Returns one of the caller's entries as JSON.
pub async fn get_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(data_type): Path<String>,
) -> Result<Response> {
    validate_data_type(&data_type)?;

    let value: sonic_rs::Value = state
        .sessions
        .vault_for(&session)
        .get(&data_type)
        .await?
        .ok_or(AppError::NotFound)?;

    let body = sonic_rs::to_string(&value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Stores a JSON document under one of the caller's data types.
pub async fn put_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(data_type): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    validate_data_type(&data_type)?;

    let value: sonic_rs::Value = sonic_rs::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Body must be JSON: {}", e)))?;

    state.sessions.vault_for(&session).set(&data_type, &value).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes one of the caller's entries.
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(data_type): Path<String>,
) -> Result<StatusCode> {
    validate_data_type(&data_type)?;

    if state.sessions.vault_for(&session).remove(&data_type).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
