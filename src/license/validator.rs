/// License validation
use super::{License, LicenseManager};
use crate::error::{GateError, GateResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Outcome of checking a machine's license
#[derive(Debug, Clone, PartialEq)]
pub enum LicenseVerdict {
    Valid {
        max_computers: i64,
        expires_at: Option<String>,
    },
    Expired,
    NotFound,
}

impl LicenseVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, LicenseVerdict::Valid { .. })
    }

    /// Machine-readable reason for a rejection
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            LicenseVerdict::Valid { .. } => None,
            LicenseVerdict::Expired => Some("expired"),
            LicenseVerdict::NotFound => Some("not_found"),
        }
    }
}

/// Look up and judge the license for `(computer_id, license_key)`
///
/// Both inputs are trimmed; empty strings are matched literally.
pub async fn validate(
    licenses: &LicenseManager,
    computer_id: &str,
    license_key: &str,
) -> GateResult<LicenseVerdict> {
    let license = licenses
        .find_active(computer_id.trim(), license_key.trim())
        .await?;

    let verdict = evaluate(license.as_ref(), Utc::now())?;

    tracing::debug!(
        computer_id = computer_id.trim(),
        reason = verdict.reason().unwrap_or("valid"),
        "license checked"
    );

    Ok(verdict)
}

/// Decide validity from the stored row alone
///
/// Depends only on `is_active`, `expires_at` and `now`.
pub fn evaluate(license: Option<&License>, now: DateTime<Utc>) -> GateResult<LicenseVerdict> {
    let license = match license {
        Some(license) if license.is_active => license,
        _ => return Ok(LicenseVerdict::NotFound),
    };

    if let Some(expires_at) = license.expires_at.as_deref() {
        let expires = parse_expiry(expires_at).ok_or_else(|| {
            GateError::Internal(format!(
                "License {} has unreadable expiry {:?}",
                license.id, expires_at
            ))
        })?;

        if now > expires {
            return Ok(LicenseVerdict::Expired);
        }
    }

    Ok(LicenseVerdict::Valid {
        max_computers: license.max_computers,
        expires_at: license.expires_at.clone(),
    })
}

/// Parse an ISO-8601 expiry as written by the key generator
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates
/// (midnight UTC).
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, license::sample_license};

    fn license(expires_at: Option<&str>, is_active: bool) -> License {
        License {
            id: 1,
            computer_id: "PC-1".to_string(),
            license_key: "ABC".to_string(),
            max_computers: 2,
            expires_at: expires_at.map(str::to_string),
            created_at: Utc::now(),
            is_active,
            customer_name: None,
            customer_phone: None,
            notes: None,
        }
    }

    fn at(value: &str) -> DateTime<Utc> {
        parse_expiry(value).unwrap()
    }

    #[test]
    fn test_missing_license_is_not_found() {
        let verdict = evaluate(None, Utc::now()).unwrap();
        assert_eq!(verdict, LicenseVerdict::NotFound);
        assert_eq!(verdict.reason(), Some("not_found"));
    }

    #[test]
    fn test_inactive_license_is_not_found() {
        // Even with a future expiry the flag wins
        let l = license(Some("2999-01-01"), false);
        assert_eq!(evaluate(Some(&l), Utc::now()).unwrap(), LicenseVerdict::NotFound);
    }

    #[test]
    fn test_expired_license() {
        let l = license(Some("2025-06-01T00:00:00"), true);
        let verdict = evaluate(Some(&l), at("2025-06-02")).unwrap();
        assert_eq!(verdict, LicenseVerdict::Expired);
        assert_eq!(verdict.reason(), Some("expired"));
        assert!(!verdict.is_valid());
    }

    #[test]
    fn test_expiry_instant_is_still_valid() {
        let l = license(Some("2025-06-01T00:00:00"), true);
        assert!(evaluate(Some(&l), at("2025-06-01T00:00:00")).unwrap().is_valid());
    }

    #[test]
    fn test_valid_echoes_metadata() {
        let l = license(Some("2030-01-01T12:00:00+05:00"), true);
        let verdict = evaluate(Some(&l), at("2025-01-01")).unwrap();
        assert_eq!(
            verdict,
            LicenseVerdict::Valid {
                max_computers: 2,
                expires_at: Some("2030-01-01T12:00:00+05:00".to_string()),
            }
        );

        let l = license(None, true);
        assert!(evaluate(Some(&l), Utc::now()).unwrap().is_valid());
    }

    #[test]
    fn test_unreadable_expiry_is_an_error() {
        let l = license(Some("next tuesday"), true);
        assert!(matches!(
            evaluate(Some(&l), Utc::now()),
            Err(GateError::Internal(_))
        ));
    }

    #[test]
    fn test_parse_expiry_formats() {
        let midnight = at("2025-12-31T00:00:00Z");
        assert_eq!(parse_expiry("2025-12-31"), Some(midnight));
        assert_eq!(parse_expiry("2025-12-31T00:00:00"), Some(midnight));
        assert_eq!(parse_expiry("2025-12-31 00:00:00"), Some(midnight));
        assert_eq!(parse_expiry("2025-12-31T00:00"), Some(midnight));
        assert_eq!(parse_expiry("2025-12-31T00:00:00.000000"), Some(midnight));
        assert_eq!(parse_expiry("2025-12-31T05:00:00+05:00"), Some(midnight));
        assert_eq!(parse_expiry("31/12/2025"), None);
        assert_eq!(parse_expiry(""), None);
    }

    #[tokio::test]
    async fn test_validate_trims_inputs() {
        let manager = LicenseManager::new(db::memory_pool().await);
        manager.upsert(&sample_license("PC-1", "ABC")).await.unwrap();

        let verdict = validate(&manager, "  PC-1 ", "ABC\n").await.unwrap();
        assert!(verdict.is_valid());

        let verdict = validate(&manager, "PC-1", "WRONG").await.unwrap();
        assert_eq!(verdict, LicenseVerdict::NotFound);
    }

    #[tokio::test]
    async fn test_validate_deactivated_license() {
        let manager = LicenseManager::new(db::memory_pool().await);
        manager.upsert(&sample_license("PC-1", "ABC")).await.unwrap();
        let stored = manager.find_by_computer("PC-1").await.unwrap().unwrap();
        manager.deactivate(stored.id).await.unwrap();

        let verdict = validate(&manager, "PC-1", "ABC").await.unwrap();
        assert_eq!(verdict, LicenseVerdict::NotFound);
    }
}
