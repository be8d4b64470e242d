//! Profile registration
//!
//! A registration passes the external identifier check, then the template
//! scan, before the profile is written. Any gate failure rejects it.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::profiles;
use crate::gate::{DuplicateGate, GateError};
use crate::models::{Profile, ProfileSummary};

/// Registration input after wire decoding
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub external_id: String,
    pub display_name: String,
    pub template: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    #[error("Profile with external id {external_id} already exists")]
    DuplicateExternalId { external_id: String },

    #[error("Template matches existing profile {} ({similarity:.2}% similarity)", .matched.external_id)]
    DuplicateTemplate {
        matched: ProfileSummary,
        similarity: f64,
    },

    #[error(transparent)]
    Unavailable(#[from] GateError),

    #[error(transparent)]
    Storage(acs_common::Error),
}

pub struct ProfileRegistry {
    db: SqlitePool,
    gate: DuplicateGate,
}

impl ProfileRegistry {
    pub fn new(db: SqlitePool, gate: DuplicateGate) -> Self {
        Self { db, gate }
    }

    /// Register a new identity
    pub async fn register(&self, new: NewProfile) -> Result<Profile, RegistrationError> {
        let external_id = new.external_id.trim().to_string();
        let display_name = new.display_name.trim().to_string();

        if external_id.is_empty() || display_name.is_empty() || new.template.is_empty() {
            return Err(RegistrationError::Validation(
                "externalId, displayName and template are required".to_string(),
            ));
        }

        if self.gate.check_external_id(&external_id).await?.is_some() {
            warn!(external_id = %external_id, "Registration rejected: external id in use");
            return Err(RegistrationError::DuplicateExternalId { external_id });
        }

        let check = self.gate.check_duplicate(&new.template).await?;
        if let (true, Some(matched)) = (check.is_duplicate, check.matched_profile.as_ref()) {
            warn!(
                external_id = %external_id,
                matched = %matched.external_id,
                similarity = check.similarity,
                "Registration rejected: template duplicate"
            );
            return Err(RegistrationError::DuplicateTemplate {
                matched: ProfileSummary::from(matched),
                similarity: check.similarity,
            });
        }

        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            external_id,
            display_name,
            template: new.template,
            created_at: now,
            updated_at: now,
        };

        match profiles::insert_profile(&self.db, &profile).await {
            Ok(()) => {
                info!(
                    id = %profile.id,
                    external_id = %profile.external_id,
                    "Profile registered"
                );
                Ok(profile)
            }
            // Lost a race with a concurrent registration of the same id
            Err(e) if e.is_unique_violation() => Err(RegistrationError::DuplicateExternalId {
                external_id: profile.external_id,
            }),
            Err(e) => Err(RegistrationError::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::SqliteProfileScan;
    use acs_common::db::init_memory_database;
    use std::sync::Arc;

    async fn registry() -> ProfileRegistry {
        let db = init_memory_database().await.unwrap();
        let gate = DuplicateGate::new(Arc::new(SqliteProfileScan::new(db.clone())));
        ProfileRegistry::new(db, gate)
    }

    fn new_profile(external_id: &str, template: Vec<u8>) -> NewProfile {
        NewProfile {
            external_id: external_id.to_string(),
            display_name: format!("User {}", external_id),
            template,
        }
    }

    #[tokio::test]
    async fn test_register_then_duplicate_external_id() {
        let registry = registry().await;
        registry.register(new_profile("E001", vec![1; 64])).await.unwrap();

        // Different template, same id
        let err = registry.register(new_profile("E001", vec![2; 64])).await.unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateExternalId { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_template_rejected() {
        let registry = registry().await;
        let stored = registry.register(new_profile("E001", vec![7; 64])).await.unwrap();

        let err = registry.register(new_profile("E002", vec![7; 64])).await.unwrap_err();
        match err {
            RegistrationError::DuplicateTemplate { matched, similarity } => {
                assert_eq!(matched.id, stored.id);
                assert_eq!(similarity, 100.0);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_distinct_template_accepted() {
        let registry = registry().await;
        registry.register(new_profile("E001", vec![7; 64])).await.unwrap();
        registry.register(new_profile("E002", vec![8; 64])).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let registry = registry().await;
        let err = registry.register(new_profile("  ", vec![1])).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Validation(_)));

        let err = registry.register(new_profile("E001", Vec::new())).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Validation(_)));
    }
}
