use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::AllocationRecord;

use super::Store;

#[derive(sqlx::FromRow)]
struct AllocationRow {
    id: Uuid,
    deal_id: Uuid,
    adviser_id: Uuid,
    service_package: String,
    household_type: Option<String>,
    earliest_week_anchor: NaiveDate,
    decided_at: NaiveDateTime,
    requester_ip: Option<String>,
    extra_json: String,
}

impl From<AllocationRow> for AllocationRecord {
    fn from(r: AllocationRow) -> Self {
        AllocationRecord {
            id: r.id,
            deal_id: r.deal_id,
            adviser_id: r.adviser_id,
            service_package: r.service_package,
            household_type: r.household_type,
            earliest_week_anchor: r.earliest_week_anchor,
            decided_at: r.decided_at,
            requester_ip: r.requester_ip,
            extra: serde_json::from_str(&r.extra_json).unwrap_or(Value::Null),
        }
    }
}

impl Store {
    /// `PutAllocationRecord` (§5): idempotent per `deal_id` — a retried
    /// webhook delivery for the same deal upserts rather than duplicates,
    /// and only moves the decision forward when the incoming `decided_at`
    /// is the newer one (last-writer-wins by decision time).
    pub async fn put_allocation_record(&self, record: &AllocationRecord) -> AppResult<Uuid> {
        let extra_json = serde_json::to_string(&record.extra).unwrap_or_else(|_| "null".into());

        self.call(
            sqlx::query(
                "INSERT INTO allocation_records
                    (id, deal_id, adviser_id, service_package, household_type,
                     earliest_week_anchor, decided_at, requester_ip, extra_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON DUPLICATE KEY UPDATE
                    adviser_id = IF(VALUES(decided_at) >= decided_at, VALUES(adviser_id), adviser_id),
                    service_package = IF(VALUES(decided_at) >= decided_at, VALUES(service_package), service_package),
                    household_type = IF(VALUES(decided_at) >= decided_at, VALUES(household_type), household_type),
                    earliest_week_anchor = IF(VALUES(decided_at) >= decided_at, VALUES(earliest_week_anchor), earliest_week_anchor),
                    requester_ip = IF(VALUES(decided_at) >= decided_at, VALUES(requester_ip), requester_ip),
                    extra_json = IF(VALUES(decided_at) >= decided_at, VALUES(extra_json), extra_json),
                    decided_at = IF(VALUES(decided_at) >= decided_at, VALUES(decided_at), decided_at)",
            )
            .bind(record.id)
            .bind(record.deal_id)
            .bind(record.adviser_id)
            .bind(&record.service_package)
            .bind(&record.household_type)
            .bind(record.earliest_week_anchor)
            .bind(record.decided_at)
            .bind(&record.requester_ip)
            .bind(&extra_json)
            .execute(&self.pool),
        )
        .await?;

        let row = self
            .call(
                sqlx::query_as::<_, AllocationRow>(
                    "SELECT id, deal_id, adviser_id, service_package, household_type,
                            earliest_week_anchor, decided_at, requester_ip, extra_json
                     FROM allocation_records WHERE deal_id = ?",
                )
                .bind(record.deal_id)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.id)
    }

    pub async fn get_allocation_by_deal(&self, deal_id: Uuid) -> AppResult<Option<AllocationRecord>> {
        let row = self
            .call(
                sqlx::query_as::<_, AllocationRow>(
                    "SELECT id, deal_id, adviser_id, service_package, household_type,
                            earliest_week_anchor, decided_at, requester_ip, extra_json
                     FROM allocation_records WHERE deal_id = ?",
                )
                .bind(deal_id)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(AllocationRecord::from))
    }
}
