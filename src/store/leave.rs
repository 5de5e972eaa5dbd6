use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{LeaveRequest, LeaveStatus};

use super::Store;

#[derive(sqlx::FromRow)]
struct LeaveRow {
    employee_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
}

impl From<LeaveRow> for LeaveRequest {
    fn from(r: LeaveRow) -> Self {
        LeaveRequest {
            employee_id: r.employee_id,
            start_date: r.start_date,
            end_date: r.end_date,
            status: match r.status.as_str() {
                "approved" => LeaveStatus::Approved,
                "rejected" => LeaveStatus::Rejected,
                _ => LeaveStatus::Pending,
            },
        }
    }
}

impl Store {
    /// `GetLeaveRequests` (§4.2) — only `approved` records are returned;
    /// pending/rejected leave never contributes to OOO (§3: "Only records
    /// with status = approved apply").
    pub async fn get_leave_requests(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<LeaveRequest>> {
        let rows = self
            .call_bulk(
                sqlx::query_as::<_, LeaveRow>(
                    "SELECT employee_id, start_date, end_date, status
                     FROM leave_requests
                     WHERE employee_id = ? AND status = 'approved'
                       AND start_date <= ? AND end_date >= ?
                     ORDER BY start_date",
                )
                .bind(employee_id)
                .bind(to)
                .bind(from)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(LeaveRequest::from).collect())
    }
}
