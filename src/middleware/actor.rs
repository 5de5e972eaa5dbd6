//! Caller-identity guard for the admin surface (§4.6, §6 "Admin CRUD").
//!
//! Authenticated HTTP routing, session cookies, and the admin login form are
//! an explicit non-goal (§1): the spec treats them as an external
//! collaborator. This guard reflects that boundary literally — it trusts an
//! `X-Request-Actor` header set by whatever upstream layer terminates the
//! session, rather than validating a cookie or token itself. Requests
//! without the header are rejected before they reach a handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{errors::AppError, state::AppState};

const ACTOR_HEADER: &str = "x-request-actor";

/// The identity of whoever is calling the admin API, as vouched for by the
/// upstream layer. Carried only for audit logging — it plays no role in
/// authorization decisions here (those are the upstream layer's job).
#[derive(Debug, Clone)]
pub struct RequestActor {
    pub email: String,
}

pub async fn require_actor(
    State(_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let email = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    req.extensions_mut().insert(RequestActor { email });

    Ok(next.run(req).await)
}
