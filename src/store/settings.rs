use super::Store;
use crate::errors::AppResult;

impl Store {
    /// `GetPrestartWeeks` (§4.2): falls back to the configured default
    /// (§4.1 `default_prestart_weeks`) when no row is present, since
    /// `system_settings` only ever holds an override.
    pub async fn get_prestart_weeks(&self, default_weeks: u32) -> AppResult<u32> {
        let row: Option<(i64,)> = self
            .call(
                sqlx::query_as(
                    "SELECT value_int FROM system_settings WHERE setting_key = 'prestart_weeks'",
                )
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|(v,)| v as u32).unwrap_or(default_weeks))
    }

    pub async fn set_prestart_weeks(&self, weeks: u32) -> AppResult<()> {
        self.call(
            sqlx::query(
                "INSERT INTO system_settings (setting_key, value_int) VALUES ('prestart_weeks', ?)
                 ON DUPLICATE KEY UPDATE value_int = VALUES(value_int)",
            )
            .bind(weeks as i64)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
