/// License registry
///
/// Storage access for the `licenses` table plus the validation and
/// registration rules built on top of it.

pub mod registrar;
pub mod validator;

pub use registrar::{register, LicenseRegistration};
pub use validator::{evaluate, parse_expiry, validate, LicenseVerdict};

use crate::{db, error::GateResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// License record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: i64,
    pub computer_id: String,
    pub license_key: String,
    pub max_computers: i64,
    /// Stored exactly as supplied by the key generator
    pub expires_at: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Validated input for an upsert
#[derive(Debug, Clone, PartialEq)]
pub struct NewLicense {
    pub computer_id: String,
    pub license_key: String,
    pub max_computers: i64,
    pub expires_at: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

const LICENSE_COLUMNS: &str = "id, computer_id, license_key, max_computers, expires_at, created_at, is_active, customer_name, customer_phone, notes";

/// License manager
#[derive(Clone)]
pub struct LicenseManager {
    db: SqlitePool,
}

impl LicenseManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find the active license for a machine holding exactly this key
    pub async fn find_active(
        &self,
        computer_id: &str,
        license_key: &str,
    ) -> GateResult<Option<License>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM licenses WHERE computer_id = ? AND license_key = ? AND is_active = 1",
            LICENSE_COLUMNS
        ))
        .bind(computer_id)
        .bind(license_key)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(license_from_row).transpose()
    }

    /// Find a license by machine identifier, active or not
    pub async fn find_by_computer(&self, computer_id: &str) -> GateResult<Option<License>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM licenses WHERE computer_id = ?",
            LICENSE_COLUMNS
        ))
        .bind(computer_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(license_from_row).transpose()
    }

    /// Insert a license, or overwrite the existing one for the same machine
    ///
    /// On conflict `id` and `created_at` are kept and the license is reactivated.
    pub async fn upsert(&self, license: &NewLicense) -> GateResult<()> {
        sqlx::query(
            r#"
            INSERT INTO licenses (
                computer_id, license_key, max_computers, expires_at,
                customer_name, customer_phone, notes, is_active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT(computer_id) DO UPDATE SET
                license_key = excluded.license_key,
                max_computers = excluded.max_computers,
                expires_at = excluded.expires_at,
                customer_name = excluded.customer_name,
                customer_phone = excluded.customer_phone,
                notes = excluded.notes,
                is_active = 1
            "#,
        )
        .bind(&license.computer_id)
        .bind(&license.license_key)
        .bind(license.max_computers)
        .bind(&license.expires_at)
        .bind(&license.customer_name)
        .bind(&license.customer_phone)
        .bind(&license.notes)
        .bind(db::now_timestamp())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// List all licenses, newest first
    pub async fn list(&self) -> GateResult<Vec<License>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM licenses ORDER BY created_at DESC, id DESC",
            LICENSE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(license_from_row).collect()
    }

    /// Soft-delete a license
    ///
    /// Returns whether a row matched; unknown ids are not an error.
    pub async fn deactivate(&self, id: i64) -> GateResult<bool> {
        let result = sqlx::query("UPDATE licenses SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn license_from_row(row: &SqliteRow) -> GateResult<License> {
    let created_at: String = row.try_get("created_at")?;

    Ok(License {
        id: row.try_get("id")?,
        computer_id: row.try_get("computer_id")?,
        license_key: row.try_get("license_key")?,
        max_computers: row.try_get("max_computers")?,
        expires_at: row.try_get("expires_at")?,
        created_at: db::parse_timestamp(&created_at)?,
        is_active: row.try_get("is_active")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        notes: row.try_get("notes")?,
    })
}

#[cfg(test)]
pub(crate) fn sample_license(computer_id: &str, license_key: &str) -> NewLicense {
    NewLicense {
        computer_id: computer_id.to_string(),
        license_key: license_key.to_string(),
        max_computers: 1,
        expires_at: None,
        customer_name: None,
        customer_phone: None,
        notes: None,
    }
}
