//! `POST /post/allocate` — the inbound deal-allocation webhook (§6).

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    allocator::{now_naive, AllocateRequest, RequesterMetadata},
    errors::{AppError, AppResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/post/allocate", post(allocate))
}

#[derive(Deserialize)]
struct AllocateFields {
    service_package: Option<String>,
    hs_deal_record_id: String,
    household_type: Option<String>,
    #[allow(dead_code)]
    agreement_start_date: Option<chrono::NaiveDate>,
}

#[derive(Deserialize)]
struct AllocateRequester {
    ip: Option<String>,
    user_agent: Option<String>,
}

#[derive(Deserialize)]
struct AllocateBody {
    fields: AllocateFields,
    requester: Option<AllocateRequester>,
}

#[derive(Serialize)]
struct AllocationPayload {
    deal_id: Uuid,
    adviser_email: String,
    earliest_available_week: chrono::NaiveDate,
}

#[derive(Serialize)]
struct AllocateResponse {
    status: &'static str,
    allocation: AllocationPayload,
}

async fn allocate(
    State(state): State<AppState>,
    Json(body): Json<AllocateBody>,
) -> AppResult<Json<AllocateResponse>> {
    let deal_id: Uuid = body
        .fields
        .hs_deal_record_id
        .parse()
        .map_err(|_| AppError::InvalidInput("hs_deal_record_id is not a valid deal id".into()))?;

    let requester = body.requester.unwrap_or(AllocateRequester { ip: None, user_agent: None });

    let req = AllocateRequest {
        deal_id,
        service_package: body.fields.service_package,
        household_type: body.fields.household_type,
        requester: RequesterMetadata {
            ip: requester.ip,
            user_agent: requester.user_agent,
        },
    };

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(state.config.allocation_deadline_secs),
        state.allocator.allocate(req, now_naive()),
    )
    .await
    .map_err(|_| AppError::Internal(anyhow::anyhow!("allocation deadline exceeded")))??;

    Ok(Json(AllocateResponse {
        status: "success",
        allocation: AllocationPayload {
            deal_id: outcome.record.deal_id,
            adviser_email: outcome.adviser_email,
            earliest_available_week: outcome.earliest_available_week,
        },
    }))
}
