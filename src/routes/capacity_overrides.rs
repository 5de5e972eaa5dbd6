//! `/capacity_overrides` admin CRUD (§4.6, §6). Override validation: adviser
//! known (checked against the CRM-sourced adviser list — adviser identity
//! is never mirrored into the Store, see `store::mod`), `effective_date`
//! parseable (handled by deserialization into `NaiveDate`),
//! `client_limit_monthly >= 0`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    middleware::actor::RequestActor,
    models::{CapacityOverride, PodType},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/capacity_overrides", get(list_overrides).post(create_override))
        .route(
            "/capacity_overrides/{id}",
            put(update_override).delete(delete_override),
        )
}

#[derive(Deserialize)]
struct OverrideBody {
    adviser_email: String,
    effective_date: NaiveDate,
    client_limit_monthly: i64,
    pod_type: Option<PodType>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct ListOverridesQuery {
    adviser_email: String,
}

#[derive(Deserialize)]
struct DeleteOverrideQuery {
    adviser_email: String,
}

async fn list_overrides(
    State(state): State<AppState>,
    Query(q): Query<ListOverridesQuery>,
) -> AppResult<Json<Vec<CapacityOverride>>> {
    Ok(Json(state.store.list_capacity_overrides(&q.adviser_email).await?))
}

async fn create_override(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<OverrideBody>,
) -> AppResult<Json<CapacityOverride>> {
    let mut errors = BTreeMap::new();

    if body.client_limit_monthly < 0 {
        errors.insert("client_limit_monthly".into(), "must be >= 0".into());
    }

    let known = state
        .crm
        .list_advisers()
        .await?
        .into_iter()
        .any(|a| a.email == body.adviser_email);
    if !known {
        errors.insert("adviser_email".into(), "no adviser with this email is known to the CRM".into());
    }

    if !errors.is_empty() {
        return Err(AppError::InvalidArgument(errors));
    }

    let created = state
        .store
        .create_capacity_override(
            &body.adviser_email,
            body.effective_date,
            body.client_limit_monthly,
            body.pod_type,
            body.notes.as_deref(),
        )
        .await?;
    tracing::info!(actor = %actor.email, override_id = %created.id, "capacity override created");
    Ok(Json(created))
}

async fn update_override(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<Uuid>,
    Json(body): Json<OverrideBody>,
) -> AppResult<Json<CapacityOverride>> {
    if body.client_limit_monthly < 0 {
        let mut errors = BTreeMap::new();
        errors.insert("client_limit_monthly".into(), "must be >= 0".into());
        return Err(AppError::InvalidArgument(errors));
    }

    let updated = state
        .store
        .update_capacity_override(
            id,
            &body.adviser_email,
            body.effective_date,
            body.client_limit_monthly,
            body.pod_type,
            body.notes.as_deref(),
        )
        .await?;
    tracing::info!(actor = %actor.email, override_id = %updated.id, "capacity override updated");
    Ok(Json(updated))
}

async fn delete_override(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<Uuid>,
    Query(q): Query<DeleteOverrideQuery>,
) -> AppResult<StatusCode> {
    state.store.delete_capacity_override(id, &q.adviser_email).await?;
    tracing::info!(actor = %actor.email, override_id = %id, "capacity override deleted");
    Ok(StatusCode::NO_CONTENT)
}
