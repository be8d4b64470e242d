//! Profile store

use acs_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::models::Profile;

const PROFILE_COLUMNS: &str = "id, external_id, display_name, template, created_at, updated_at";

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Profile {
        id: parse_uuid("id", &id)?,
        external_id: row.get("external_id"),
        display_name: row.get("display_name"),
        template: row.get("template"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Insert a new profile
///
/// Fails with a unique violation when `external_id` is already taken.
pub async fn insert_profile(pool: &SqlitePool, profile: &Profile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, external_id, display_name, template, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.id.to_string())
    .bind(&profile.external_id)
    .bind(&profile.display_name)
    .bind(&profile.template)
    .bind(profile.created_at.to_rfc3339())
    .bind(profile.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_profile(pool: &SqlitePool, id: Uuid) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

pub async fn find_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE external_id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Every stored profile, in insertion order
///
/// Used by the duplicate scan; cost grows linearly with the profile count.
pub async fn list_all_profiles(pool: &SqlitePool) -> Result<Vec<Profile>> {
    let sql = format!("SELECT {} FROM profiles ORDER BY rowid ASC", PROFILE_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.iter().map(profile_from_row).collect()
}

/// One page of profiles sorted by display name
pub async fn list_profiles_page(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Profile>> {
    let sql = format!(
        "SELECT {} FROM profiles ORDER BY display_name ASC, external_id ASC LIMIT ? OFFSET ?",
        PROFILE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.iter().map(profile_from_row).collect()
}

pub async fn count_profiles(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Delete by id; returns whether a row was removed
pub async fn delete_profile(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete by external id; returns whether a row was removed
pub async fn delete_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM profiles WHERE external_id = ?")
        .bind(external_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
