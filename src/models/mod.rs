#![allow(dead_code)]
//! Core data model (§3 of the spec).
//!
//! Adviser/Meeting/Deal are read-only to the engine, sourced from the CRM.
//! LeaveRequest is HR-sourced and read-only within this service. OfficeClosure
//! and CapacityOverride are admin-managed (CRUD via `routes::closures` /
//! `routes::capacity_overrides`). AllocationRecord is the append-only audit
//! log written exactly once per successful allocation.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

// ── Advisers ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PodType {
    Solo,
    Team,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adviser {
    pub id: Uuid,
    pub email: String,
    pub service_packages: BTreeSet<String>,
    pub household_types: BTreeSet<String>,
    pub pod_type: PodType,
    pub client_limit_monthly: i64,
    pub adviser_start_date: Option<NaiveDate>,
    pub taking_on_clients: bool,
}

// ── Meetings ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingKind {
    Clarify,
    KickOff,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub adviser_id: Uuid,
    pub kind: MeetingKind,
    pub start_date: NaiveDate,
    pub deal_id: Option<Uuid>,
}

// ── Deals ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub service_package: String,
    pub household_type: Option<String>,
    pub agreement_start_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub has_clarify: bool,
}

// ── Leave ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Approved,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
}

// ── Closures ─────────────────────────────────────────────────

// Adjacently tagged (not internally tagged): a newtype variant around a
// scalar like `String` can't serialize under an internally tagged
// representation, which only supports struct-shaped variant content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "email", rename_all = "snake_case")]
pub enum ClosureScope {
    Global,
    AdviserEmail(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeClosure {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub scope: ClosureScope,
}

// ── Capacity overrides ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityOverride {
    pub id: Uuid,
    pub adviser_email: String,
    pub effective_date: NaiveDate,
    pub client_limit_monthly: i64,
    pub pod_type: Option<PodType>,
    pub notes: Option<String>,
}

// ── Allocation records ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub adviser_id: Uuid,
    pub service_package: String,
    pub household_type: Option<String>,
    pub earliest_week_anchor: NaiveDate,
    pub decided_at: NaiveDateTime,
    pub requester_ip: Option<String>,
    pub extra: serde_json::Value,
}

// ── Out-of-office state (computed, §4.3) ─────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "business_days", rename_all = "snake_case")]
pub enum OooState {
    None,
    Partial(u8),
    Full,
}

impl OooState {
    /// Build the OOO state for a week from the business-day count of OOO
    /// overlap (§4.3): 0 -> None, 1..=4 -> Partial(n), 5 -> Full.
    pub fn from_business_days(n: u8) -> Self {
        match n {
            0 => OooState::None,
            1..=4 => OooState::Partial(n),
            _ => OooState::Full,
        }
    }

    pub fn is_full(self) -> bool {
        matches!(self, OooState::Full)
    }
}
