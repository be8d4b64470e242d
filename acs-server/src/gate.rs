//! Duplicate Gate
//!
//! Decides whether a registration collides with an existing identity.
//! External identifiers are matched exactly; templates are compared
//! against every stored profile with the byte-exact matcher.
//!
//! The gate only reads. Two concurrent registrations with similar
//! templates can both pass the scan; the storage-level UNIQUE constraint
//! still guarantees external identifier uniqueness.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error};

use crate::db::profiles;
use crate::matcher::similarity;
use crate::models::Profile;

/// Minimum similarity (percent) that counts as a duplicate
pub const DUPLICATE_THRESHOLD: f64 = 80.0;

/// Source of profiles for the duplicate scan
///
/// The SQLite implementation is a linear scan in insertion order; an
/// indexed implementation can replace it without touching callers.
#[async_trait]
pub trait ProfileScan: Send + Sync {
    /// Every stored profile, in a stable iteration order
    async fn scan_all(&self) -> acs_common::Result<Vec<Profile>>;

    async fn find_by_external_id(&self, external_id: &str) -> acs_common::Result<Option<Profile>>;
}

/// Linear scan over the profiles table
pub struct SqliteProfileScan {
    db: SqlitePool,
}

impl SqliteProfileScan {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileScan for SqliteProfileScan {
    async fn scan_all(&self) -> acs_common::Result<Vec<Profile>> {
        profiles::list_all_profiles(&self.db).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> acs_common::Result<Option<Profile>> {
        profiles::find_by_external_id(&self.db, external_id).await
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    /// Profiles could not be loaded; callers must fail closed
    #[error("Duplicate check unavailable: {0}")]
    Unavailable(#[source] acs_common::Error),
}

/// Outcome of a template scan
#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// Best match, reported only for duplicates
    pub matched_profile: Option<Profile>,
    /// Highest similarity found (0 with no profiles)
    pub similarity: f64,
}

/// First profile reaching the highest similarity, with that similarity
pub fn best_match<'a>(candidate: &[u8], profiles: &'a [Profile]) -> (Option<&'a Profile>, f64) {
    let mut best: Option<&Profile> = None;
    let mut max = 0.0;

    for profile in profiles {
        let score = similarity(Some(candidate), Some(&profile.template));
        // Strict comparison keeps the earliest profile on ties
        if score > max {
            max = score;
            best = Some(profile);
        }
    }

    (best, max)
}

#[derive(Clone)]
pub struct DuplicateGate {
    source: Arc<dyn ProfileScan>,
}

impl DuplicateGate {
    pub fn new(source: Arc<dyn ProfileScan>) -> Self {
        Self { source }
    }

    /// Compare a candidate template against every stored profile
    pub async fn check_duplicate(&self, candidate: &[u8]) -> Result<DuplicateCheck, GateError> {
        let profiles = self.source.scan_all().await.map_err(|e| {
            error!("Failed to load profiles for duplicate check: {}", e);
            GateError::Unavailable(e)
        })?;

        let (best, max) = best_match(candidate, &profiles);
        let is_duplicate = max >= DUPLICATE_THRESHOLD;

        debug!(
            scanned = profiles.len(),
            similarity = max,
            is_duplicate,
            "Template scan complete"
        );

        Ok(DuplicateCheck {
            is_duplicate,
            matched_profile: best.filter(|_| is_duplicate).cloned(),
            similarity: max,
        })
    }

    /// Existing profile holding `external_id`, if any
    pub async fn check_external_id(&self, external_id: &str) -> Result<Option<Profile>, GateError> {
        self.source
            .find_by_external_id(external_id)
            .await
            .map_err(|e| {
                error!("Failed to look up external id {}: {}", external_id, e);
                GateError::Unavailable(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    struct FixedScan {
        profiles: Vec<Profile>,
    }

    #[async_trait]
    impl ProfileScan for FixedScan {
        async fn scan_all(&self) -> acs_common::Result<Vec<Profile>> {
            Ok(self.profiles.clone())
        }

        async fn find_by_external_id(&self, external_id: &str) -> acs_common::Result<Option<Profile>> {
            Ok(self.profiles.iter().find(|p| p.external_id == external_id).cloned())
        }
    }

    struct BrokenScan;

    #[async_trait]
    impl ProfileScan for BrokenScan {
        async fn scan_all(&self) -> acs_common::Result<Vec<Profile>> {
            Err(acs_common::Error::Internal("store offline".to_string()))
        }

        async fn find_by_external_id(&self, _external_id: &str) -> acs_common::Result<Option<Profile>> {
            Err(acs_common::Error::Internal("store offline".to_string()))
        }
    }

    fn profile(external_id: &str, template: Vec<u8>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            display_name: external_id.to_string(),
            template,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn template(seed: u8) -> Vec<u8> {
        (0..100u8).map(|i| i.wrapping_mul(seed)).collect()
    }

    /// Copy of `base` with the first `n` positions altered
    fn altered(base: &[u8], n: usize) -> Vec<u8> {
        base.iter()
            .enumerate()
            .map(|(i, b)| if i < n { b ^ 0xff } else { *b })
            .collect()
    }

    fn gate(profiles: Vec<Profile>) -> DuplicateGate {
        DuplicateGate::new(Arc::new(FixedScan { profiles }))
    }

    #[tokio::test]
    async fn test_identical_template_is_duplicate() {
        let stored = template(3);
        let gate = gate(vec![profile("E001", stored.clone())]);

        let check = gate.check_duplicate(&stored).await.unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.similarity, 100.0);
        assert_eq!(check.matched_profile.unwrap().external_id, "E001");
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let stored = template(3);
        let gate = gate(vec![profile("E001", stored.clone())]);

        // 20% differing: exactly 80, still a duplicate
        let check = gate.check_duplicate(&altered(&stored, 20)).await.unwrap();
        assert!(check.is_duplicate);

        // 21% differing: below the threshold
        let check = gate.check_duplicate(&altered(&stored, 21)).await.unwrap();
        assert!(!check.is_duplicate);
        assert!((check.similarity - 79.0).abs() < 1e-9);
        assert!(check.matched_profile.is_none());
    }

    #[tokio::test]
    async fn test_first_profile_wins_ties() {
        let stored = template(5);
        let gate = gate(vec![
            profile("E001", stored.clone()),
            profile("E002", stored.clone()),
        ]);

        let check = gate.check_duplicate(&stored).await.unwrap();
        assert_eq!(check.matched_profile.unwrap().external_id, "E001");
    }

    #[tokio::test]
    async fn test_length_mismatch_never_duplicate() {
        let gate = gate(vec![profile("E001", template(3))]);
        let check = gate.check_duplicate(&template(3)[..50]).await.unwrap();
        assert!(!check.is_duplicate);
        assert_eq!(check.similarity, 0.0);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let gate = gate(Vec::new());
        let check = gate.check_duplicate(&template(3)).await.unwrap();
        assert!(!check.is_duplicate);
        assert_eq!(check.similarity, 0.0);
    }

    #[tokio::test]
    async fn test_load_failure_is_unavailable() {
        let gate = DuplicateGate::new(Arc::new(BrokenScan));
        assert!(matches!(
            gate.check_duplicate(&template(3)).await,
            Err(GateError::Unavailable(_))
        ));
        assert!(gate.check_external_id("E001").await.is_err());
    }

    #[tokio::test]
    async fn test_external_id_lookup() {
        let gate = gate(vec![profile("E001", template(3))]);
        assert!(gate.check_external_id("E001").await.unwrap().is_some());
        assert!(gate.check_external_id("e001").await.unwrap().is_none());
    }
}
