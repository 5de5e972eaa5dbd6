use axum::{middleware, Router};

use crate::{middleware::actor::require_actor, state::AppState};

mod allocate;
mod availability;
mod capacity_overrides;
mod closures;

/// Build the full `/api/v1` router (§6).
///
/// The webhook (`/post/allocate`) and the read views (`/availability/*`)
/// are left unguarded — they are the inbound CRM-facing surface and a
/// read-only operator dashboard, neither gated by the admin session per
/// the original spec. The closures/capacity-override CRUD (§4.6) requires
/// an upstream-vouched caller identity, enforced by [`require_actor`].
pub fn all_routes(state: AppState) -> Router<AppState> {
    let actor_guard = middleware::from_fn_with_state(state, require_actor);
    Router::new()
        .merge(allocate::router())
        .merge(availability::router())
        .merge(
            Router::new()
                .merge(closures::router())
                .merge(capacity_overrides::router())
                .route_layer(actor_guard),
        )
}
