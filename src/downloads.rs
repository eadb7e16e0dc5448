/// Download log
use crate::{db, error::GateResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Identifier recorded when the caller did not name its machine
pub const UNKNOWN_CLIENT: &str = "UNKNOWN_CLIENT";

/// How many entries the admin listing returns
pub const RECENT_DOWNLOADS_LIMIT: i64 = 100;

/// Download attempt, joined with the customer of a matching license
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: i64,
    pub computer_id: String,
    pub downloaded_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    /// Set once the whole artifact was handed to the transport
    pub delivered: bool,
    pub customer_name: Option<String>,
}

/// Download log manager
#[derive(Clone)]
pub struct DownloadManager {
    db: SqlitePool,
}

impl DownloadManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a download attempt, returning its id
    pub async fn record(&self, computer_id: &str, ip_address: Option<&str>) -> GateResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO downloads (computer_id, downloaded_at, ip_address)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(computer_id)
        .bind(db::now_timestamp())
        .bind(ip_address)
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Mark a download as fully streamed
    pub async fn mark_delivered(&self, id: i64) -> GateResult<()> {
        sqlx::query("UPDATE downloads SET delivered = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Most recent downloads, newest first
    pub async fn recent(&self, limit: i64) -> GateResult<Vec<DownloadRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.computer_id, d.downloaded_at, d.ip_address, d.delivered,
                   l.customer_name
            FROM downloads d
            LEFT JOIN licenses l ON d.computer_id = l.computer_id
            ORDER BY d.downloaded_at DESC, d.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(download_from_row).collect()
    }
}

fn download_from_row(row: &SqliteRow) -> GateResult<DownloadRecord> {
    let downloaded_at: String = row.try_get("downloaded_at")?;

    Ok(DownloadRecord {
        id: row.try_get("id")?,
        computer_id: row.try_get("computer_id")?,
        downloaded_at: db::parse_timestamp(&downloaded_at)?,
        ip_address: row.try_get("ip_address")?,
        delivered: row.try_get("delivered")?,
        customer_name: row.try_get("customer_name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::{sample_license, LicenseManager};

    #[tokio::test]
    async fn test_record_and_list_with_customer() {
        let pool = db::memory_pool().await;
        let licenses = LicenseManager::new(pool.clone());
        let downloads = DownloadManager::new(pool);

        let mut license = sample_license("PC-1", "ABC");
        license.customer_name = Some("Alice".to_string());
        licenses.upsert(&license).await.unwrap();

        downloads.record("PC-1", Some("10.0.0.1")).await.unwrap();
        downloads.record(UNKNOWN_CLIENT, None).await.unwrap();

        let recent = downloads.recent(RECENT_DOWNLOADS_LIMIT).await.unwrap();
        assert_eq!(recent.len(), 2);

        assert_eq!(recent[0].computer_id, UNKNOWN_CLIENT);
        assert_eq!(recent[0].customer_name, None);
        assert_eq!(recent[0].ip_address, None);

        assert_eq!(recent[1].computer_id, "PC-1");
        assert_eq!(recent[1].customer_name.as_deref(), Some("Alice"));
        assert_eq!(recent[1].ip_address.as_deref(), Some("10.0.0.1"));
        assert!(!recent[1].delivered);
    }

    #[tokio::test]
    async fn test_mark_delivered() {
        let downloads = DownloadManager::new(db::memory_pool().await);
        let id = downloads.record("PC-1", Some("10.0.0.1")).await.unwrap();

        downloads.mark_delivered(id).await.unwrap();

        let recent = downloads.recent(10).await.unwrap();
        assert!(recent[0].delivered);
    }

    #[tokio::test]
    async fn test_recent_is_limited() {
        let downloads = DownloadManager::new(db::memory_pool().await);
        for i in 0..5 {
            downloads
                .record(&format!("PC-{}", i), Some("127.0.0.1"))
                .await
                .unwrap();
        }

        let recent = downloads.recent(3).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|d| d.computer_id.as_str()).collect();
        assert_eq!(ids, vec!["PC-4", "PC-3", "PC-2"]);
    }
}
