use serde_json::Value;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::settings::SystemSettingRow;
use crate::settings::cache::SettingsCache;

/// Cached value for `key`, loading it from the database on a miss.
pub async fn get_setting(pool: &PgPool, cache: &SettingsCache, key: &str) -> Result<Value, AppError> {
    if let Some(value) = cache.get(key) {
        return Ok(value);
    }
    let row = sqlx::query_as::<_, SystemSettingRow>("SELECT * FROM system_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Setting '{key}' not found")))?;
    cache.set(key, row.value.clone());
    Ok(row.value)
}

/// Persists `value` and drops the cached copy.
pub async fn put_setting(
    pool: &PgPool,
    cache: &SettingsCache,
    key: &str,
    value: Value,
) -> Result<SystemSettingRow, AppError> {
    let row = sqlx::query_as::<_, SystemSettingRow>(
        r#"
        INSERT INTO system_settings (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(key)
    .bind(value)
    .fetch_one(pool)
    .await?;
    cache.invalidate(key);
    Ok(row)
}
