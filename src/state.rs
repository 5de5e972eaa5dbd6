//! Shared application state — injected into every handler via `axum::extract::State`.

use std::sync::Arc;

use crate::{allocator::Allocator, config::Config, crm::CrmClient, db::Db, store::Store};

/// Application-wide state passed via axum `State<AppState>`.
///
/// `pool` and `config` are cheaply cloned (`MySqlPool` is already
/// `Arc`-backed; `Config` is all `String`/primitive fields); `store`, `crm`,
/// and `allocator` are already behind an `Arc` so cloning `AppState`
/// per-request never duplicates the underlying connections or caches.
///
/// `hr::HrClient` has no handle here: the HR-sync job that would call it is
/// an explicit non-goal (§1) — the engine only ever reads the `leave_requests`
/// table that sync populates, via `Store::get_leave_requests`.
#[derive(Clone)]
pub struct AppState {
    pub pool:      Db,
    pub config:    Config,
    pub store:     Arc<Store>,
    pub crm:       Arc<dyn CrmClient>,
    pub allocator: Arc<Allocator>,
}
