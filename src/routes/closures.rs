//! `/closures` admin CRUD (§4.6, §6). Validates against the rules in §4.6:
//! dates parseable (handled by `axum::Json` deserialization into
//! `NaiveDate`), `end_date >= start_date`, description non-empty, tags
//! unique (enforced structurally by `BTreeSet`) and each <= 32 chars.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    middleware::actor::RequestActor,
    models::{ClosureScope, OfficeClosure},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/closures", get(list_closures).post(create_closure))
        .route("/closures/{id}", put(update_closure).delete(delete_closure))
}

#[derive(Debug, Deserialize, Validate)]
struct ClosureBody {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[validate(length(min = 1, message = "description must not be empty"))]
    description: String,
    tags: std::collections::BTreeSet<String>,
    #[serde(default)]
    scope: Option<ClosureScope>,
}

fn validate_closure_body(body: &ClosureBody) -> AppResult<()> {
    let mut errors = BTreeMap::new();

    if let Err(e) = body.validate() {
        for (field, field_errors) in e.field_errors() {
            let msg = field_errors
                .first()
                .and_then(|fe| fe.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{field} is invalid"));
            errors.insert(field.to_string(), msg);
        }
    }

    if body.end_date < body.start_date {
        errors.insert("end_date".into(), "end_date must not be before start_date".into());
    }

    for tag in &body.tags {
        if tag.len() > 32 {
            errors.insert("tags".into(), format!("tag '{tag}' exceeds 32 characters"));
            break;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(errors))
    }
}

async fn list_closures(State(state): State<AppState>) -> AppResult<Json<Vec<OfficeClosure>>> {
    Ok(Json(state.store.list_closures().await?))
}

async fn create_closure(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<ClosureBody>,
) -> AppResult<Json<OfficeClosure>> {
    validate_closure_body(&body)?;
    let closure = state
        .store
        .create_closure(
            body.start_date,
            body.end_date,
            &body.description,
            &body.tags,
            &body.scope.unwrap_or(ClosureScope::Global),
        )
        .await?;
    tracing::info!(actor = %actor.email, closure_id = %closure.id, "closure created");
    Ok(Json(closure))
}

async fn update_closure(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<Uuid>,
    Json(body): Json<ClosureBody>,
) -> AppResult<Json<OfficeClosure>> {
    validate_closure_body(&body)?;
    let closure = state
        .store
        .update_closure(id, body.start_date, body.end_date, &body.description, &body.tags)
        .await?;
    tracing::info!(actor = %actor.email, closure_id = %closure.id, "closure updated");
    Ok(Json(closure))
}

async fn delete_closure(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.store.delete_closure(id).await?;
    tracing::info!(actor = %actor.email, closure_id = %id, "closure deleted");
    Ok(StatusCode::NO_CONTENT)
}
