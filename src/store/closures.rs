use std::collections::BTreeSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{ClosureScope, OfficeClosure};

use super::Store;

#[derive(sqlx::FromRow)]
struct ClosureRow {
    id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    description: String,
    tags_json: String,
    scope_type: String,
    adviser_email: Option<String>,
}

impl From<ClosureRow> for OfficeClosure {
    fn from(r: ClosureRow) -> Self {
        let scope = match r.scope_type.as_str() {
            "adviser" => ClosureScope::AdviserEmail(r.adviser_email.unwrap_or_default()),
            _ => ClosureScope::Global,
        };
        OfficeClosure {
            id: r.id,
            start_date: r.start_date,
            end_date: r.end_date,
            description: r.description,
            tags: serde_json::from_str(&r.tags_json).unwrap_or_default(),
            scope,
        }
    }
}

impl Store {
    pub async fn get_global_closures(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<OfficeClosure>> {
        let key = format!("closures:global:{from}:{to}");
        if let Some(hit) = self.closures_cache_get(&key) {
            return Ok(hit);
        }
        let rows = self
            .call_bulk(
                sqlx::query_as::<_, ClosureRow>(
                    "SELECT id, start_date, end_date, description, tags_json, scope_type, adviser_email
                     FROM office_closures
                     WHERE scope_type = 'global' AND start_date <= ? AND end_date >= ?
                     ORDER BY start_date",
                )
                .bind(to)
                .bind(from)
                .fetch_all(&self.pool),
            )
            .await?;
        let closures: Vec<OfficeClosure> = rows.into_iter().map(OfficeClosure::from).collect();
        self.closures_cache_put(key, closures.clone());
        Ok(closures)
    }

    pub async fn get_adviser_closures(
        &self,
        adviser_email: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<OfficeClosure>> {
        let key = format!("closures:adviser:{adviser_email}:{from}:{to}");
        if let Some(hit) = self.closures_cache_get(&key) {
            return Ok(hit);
        }
        let rows = self
            .call_bulk(
                sqlx::query_as::<_, ClosureRow>(
                    "SELECT id, start_date, end_date, description, tags_json, scope_type, adviser_email
                     FROM office_closures
                     WHERE scope_type = 'adviser' AND adviser_email = ?
                       AND start_date <= ? AND end_date >= ?
                     ORDER BY start_date",
                )
                .bind(adviser_email)
                .bind(to)
                .bind(from)
                .fetch_all(&self.pool),
            )
            .await?;
        let closures: Vec<OfficeClosure> = rows.into_iter().map(OfficeClosure::from).collect();
        self.closures_cache_put(key, closures.clone());
        Ok(closures)
    }

    pub async fn list_closures(&self) -> AppResult<Vec<OfficeClosure>> {
        let rows = self
            .call_bulk(
                sqlx::query_as::<_, ClosureRow>(
                    "SELECT id, start_date, end_date, description, tags_json, scope_type, adviser_email
                     FROM office_closures ORDER BY start_date DESC",
                )
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(OfficeClosure::from).collect())
    }

    pub async fn create_closure(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        description: &str,
        tags: &BTreeSet<String>,
        scope: &ClosureScope,
    ) -> AppResult<OfficeClosure> {
        let id = Uuid::new_v4();
        let (scope_type, adviser_email): (&str, Option<&str>) = match scope {
            ClosureScope::Global => ("global", None),
            ClosureScope::AdviserEmail(email) => ("adviser", Some(email.as_str())),
        };
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".into());

        self.call(
            sqlx::query(
                "INSERT INTO office_closures (id, start_date, end_date, description, tags_json, scope_type, adviser_email)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(start_date)
            .bind(end_date)
            .bind(description)
            .bind(&tags_json)
            .bind(scope_type)
            .bind(adviser_email)
            .execute(&self.pool),
        )
        .await?;

        self.invalidate_closures();

        Ok(OfficeClosure {
            id,
            start_date,
            end_date,
            description: description.to_string(),
            tags: tags.clone(),
            scope: scope.clone(),
        })
    }

    pub async fn update_closure(
        &self,
        id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        description: &str,
        tags: &BTreeSet<String>,
    ) -> AppResult<OfficeClosure> {
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".into());

        let affected = self
            .call(
                sqlx::query(
                    "UPDATE office_closures
                     SET start_date = ?, end_date = ?, description = ?, tags_json = ?
                     WHERE id = ?",
                )
                .bind(start_date)
                .bind(end_date)
                .bind(description)
                .bind(&tags_json)
                .bind(id)
                .execute(&self.pool),
            )
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(crate::errors::AppError::NotFound);
        }

        self.invalidate_closures();

        let row = self
            .call(
                sqlx::query_as::<_, ClosureRow>(
                    "SELECT id, start_date, end_date, description, tags_json, scope_type, adviser_email
                     FROM office_closures WHERE id = ?",
                )
                .bind(id)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(OfficeClosure::from(row))
    }

    pub async fn delete_closure(&self, id: Uuid) -> AppResult<()> {
        let affected = self
            .call(
                sqlx::query("DELETE FROM office_closures WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(crate::errors::AppError::NotFound);
        }

        self.invalidate_closures();
        Ok(())
    }

    fn closures_cache_get(&self, key: &str) -> Option<Vec<OfficeClosure>> {
        self.closures_cache.get(key)
    }

    fn closures_cache_put(&self, key: String, value: Vec<OfficeClosure>) {
        self.closures_cache.put(key, value);
    }
}
