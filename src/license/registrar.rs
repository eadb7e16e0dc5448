/// License registration, used by the external key generator
use super::{parse_expiry, LicenseManager, NewLicense};
use crate::error::{GateError, GateResult};
use serde::Deserialize;

/// Registration payload; only `computer_id` and `license_key` are required
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LicenseRegistration {
    pub computer_id: Option<String>,
    pub license_key: Option<String>,
    pub max_computers: Option<i64>,
    pub expires_at: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

impl LicenseRegistration {
    /// Check required fields and defaults, producing a storable record
    pub fn into_license(self) -> GateResult<NewLicense> {
        let (computer_id, license_key) =
            match (required(self.computer_id), required(self.license_key)) {
                (Some(computer_id), Some(license_key)) => (computer_id, license_key),
                _ => {
                    return Err(GateError::Validation(
                        "computer_id and license_key are required".to_string(),
                    ))
                }
            };

        let max_computers = self.max_computers.unwrap_or(1);
        if max_computers < 1 {
            return Err(GateError::Validation(
                "max_computers must be at least 1".to_string(),
            ));
        }

        let expires_at = self
            .expires_at
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(expires_at) = &expires_at {
            if parse_expiry(expires_at).is_none() {
                return Err(GateError::Validation(format!(
                    "expires_at is not an ISO-8601 timestamp: {}",
                    expires_at
                )));
            }
        }

        Ok(NewLicense {
            computer_id,
            license_key,
            max_computers,
            expires_at,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            notes: self.notes,
        })
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Create or overwrite the license for the registration's machine
pub async fn register(
    licenses: &LicenseManager,
    registration: LicenseRegistration,
) -> GateResult<()> {
    let license = registration.into_license()?;
    licenses.upsert(&license).await?;

    tracing::info!(
        computer_id = %license.computer_id,
        max_computers = license.max_computers,
        expires_at = license.expires_at.as_deref().unwrap_or("never"),
        "license saved"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn registration(computer_id: &str, license_key: &str) -> LicenseRegistration {
        LicenseRegistration {
            computer_id: Some(computer_id.to_string()),
            license_key: Some(license_key.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let license = registration(" PC-1 ", "ABC").into_license().unwrap();
        assert_eq!(license.computer_id, "PC-1");
        assert_eq!(license.license_key, "ABC");
        assert_eq!(license.max_computers, 1);
        assert_eq!(license.expires_at, None);
    }

    #[test]
    fn test_required_fields() {
        let missing_key = LicenseRegistration {
            computer_id: Some("PC-1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            missing_key.into_license(),
            Err(GateError::Validation(_))
        ));

        assert!(registration("", "ABC").into_license().is_err());
        assert!(registration("PC-1", "   ").into_license().is_err());
    }

    #[test]
    fn test_rejects_bad_optional_fields() {
        let mut zero_seats = registration("PC-1", "ABC");
        zero_seats.max_computers = Some(0);
        assert!(zero_seats.into_license().is_err());

        let mut bad_expiry = registration("PC-1", "ABC");
        bad_expiry.expires_at = Some("soon".to_string());
        assert!(bad_expiry.into_license().is_err());

        let mut blank_expiry = registration("PC-1", "ABC");
        blank_expiry.expires_at = Some(String::new());
        assert_eq!(blank_expiry.into_license().unwrap().expires_at, None);
    }

    #[tokio::test]
    async fn test_register_missing_key_writes_nothing() {
        let manager = LicenseManager::new(db::memory_pool().await);
        let result = register(
            &manager,
            LicenseRegistration {
                computer_id: Some("PC-1".to_string()),
                ..Default::default()
            },
        )
        .await;

        assert!(result.is_err());
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_twice_keeps_one_row() {
        let manager = LicenseManager::new(db::memory_pool().await);

        register(&manager, registration("PC-1", "ABC")).await.unwrap();
        let first = manager.find_by_computer("PC-1").await.unwrap().unwrap();

        let mut second = registration("PC-1", "DEF");
        second.max_computers = Some(5);
        second.customer_phone = Some("+998 90 000 00 00".to_string());
        register(&manager, second).await.unwrap();

        let all = manager.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].license_key, "DEF");
        assert_eq!(all[0].max_computers, 5);
        assert_eq!(all[0].customer_phone.as_deref(), Some("+998 90 000 00 00"));
        assert_eq!(all[0].created_at, first.created_at);
    }
}
