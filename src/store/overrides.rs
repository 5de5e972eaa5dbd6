use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{CapacityOverride, PodType};

use super::Store;

#[derive(sqlx::FromRow)]
struct OverrideRow {
    id: Uuid,
    adviser_email: String,
    effective_date: NaiveDate,
    client_limit_monthly: i64,
    pod_type: Option<String>,
    notes: Option<String>,
}

fn parse_pod_type(s: &str) -> PodType {
    match s {
        "team" => PodType::Team,
        _ => PodType::Solo,
    }
}

impl From<OverrideRow> for CapacityOverride {
    fn from(r: OverrideRow) -> Self {
        CapacityOverride {
            id: r.id,
            adviser_email: r.adviser_email,
            effective_date: r.effective_date,
            client_limit_monthly: r.client_limit_monthly,
            pod_type: r.pod_type.as_deref().map(parse_pod_type),
            notes: r.notes,
        }
    }
}

impl Store {
    /// `GetActiveCapacityOverride` (§4.2): the override with the greatest
    /// `effective_date <= as_of_date` wins (§3: "the most recent override
    /// effective on or before the week being evaluated applies"). Used by
    /// the `/availability/earliest` read view to show each adviser's
    /// currently-effective limit rather than their raw profile limit; the
    /// Capacity Engine itself takes the full override history so it can
    /// resolve precedence per future week, not just "as of today".
    pub async fn get_active_capacity_override(
        &self,
        adviser_email: &str,
        as_of_date: NaiveDate,
    ) -> AppResult<Option<CapacityOverride>> {
        let key = format!("override:{adviser_email}:{as_of_date}");
        if let Some(hit) = self.overrides_cache.get(&key) {
            return Ok(hit);
        }

        let row = self
            .call(
                sqlx::query_as::<_, OverrideRow>(
                    "SELECT id, adviser_email, effective_date, client_limit_monthly, pod_type, notes
                     FROM capacity_overrides
                     WHERE adviser_email = ? AND effective_date <= ?
                     ORDER BY effective_date DESC
                     LIMIT 1",
                )
                .bind(adviser_email)
                .bind(as_of_date)
                .fetch_optional(&self.pool),
            )
            .await?;

        let result = row.map(CapacityOverride::from);
        self.overrides_cache.put(key, result.clone());
        Ok(result)
    }

    pub async fn list_capacity_overrides(&self, adviser_email: &str) -> AppResult<Vec<CapacityOverride>> {
        let rows = self
            .call_bulk(
                sqlx::query_as::<_, OverrideRow>(
                    "SELECT id, adviser_email, effective_date, client_limit_monthly, pod_type, notes
                     FROM capacity_overrides WHERE adviser_email = ? ORDER BY effective_date DESC",
                )
                .bind(adviser_email)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(CapacityOverride::from).collect())
    }

    pub async fn create_capacity_override(
        &self,
        adviser_email: &str,
        effective_date: NaiveDate,
        client_limit_monthly: i64,
        pod_type: Option<PodType>,
        notes: Option<&str>,
    ) -> AppResult<CapacityOverride> {
        let id = Uuid::new_v4();
        let pod_type_str = pod_type.map(|p| match p {
            PodType::Solo => "solo",
            PodType::Team => "team",
        });

        self.call(
            sqlx::query(
                "INSERT INTO capacity_overrides
                    (id, adviser_email, effective_date, client_limit_monthly, pod_type, notes)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(adviser_email)
            .bind(effective_date)
            .bind(client_limit_monthly)
            .bind(pod_type_str)
            .bind(notes)
            .execute(&self.pool),
        )
        .await?;

        self.invalidate_overrides(adviser_email);

        Ok(CapacityOverride {
            id,
            adviser_email: adviser_email.to_string(),
            effective_date,
            client_limit_monthly,
            pod_type,
            notes: notes.map(str::to_string),
        })
    }

    pub async fn update_capacity_override(
        &self,
        id: Uuid,
        adviser_email: &str,
        effective_date: NaiveDate,
        client_limit_monthly: i64,
        pod_type: Option<PodType>,
        notes: Option<&str>,
    ) -> AppResult<CapacityOverride> {
        let pod_type_str = pod_type.map(|p| match p {
            PodType::Solo => "solo",
            PodType::Team => "team",
        });

        let affected = self
            .call(
                sqlx::query(
                    "UPDATE capacity_overrides
                     SET effective_date = ?, client_limit_monthly = ?, pod_type = ?, notes = ?
                     WHERE id = ? AND adviser_email = ?",
                )
                .bind(effective_date)
                .bind(client_limit_monthly)
                .bind(pod_type_str)
                .bind(notes)
                .bind(id)
                .bind(adviser_email)
                .execute(&self.pool),
            )
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound);
        }

        self.invalidate_overrides(adviser_email);

        Ok(CapacityOverride {
            id,
            adviser_email: adviser_email.to_string(),
            effective_date,
            client_limit_monthly,
            pod_type,
            notes: notes.map(str::to_string),
        })
    }

    pub async fn delete_capacity_override(&self, id: Uuid, adviser_email: &str) -> AppResult<()> {
        let affected = self
            .call(
                sqlx::query("DELETE FROM capacity_overrides WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound);
        }

        self.invalidate_overrides(adviser_email);
        Ok(())
    }
}
