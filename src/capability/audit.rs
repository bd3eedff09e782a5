//! Timestamped audit copies of finalized configurations

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{CapabilityError, PersistedArtifact, SnapshotPersister};

/// Prefix of every audit artifact name
pub const ARTIFACT_PREFIX: &str = "config.final.";

/// Timestamp layout embedded in artifact names (one-second granularity)
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Writes `config.final.<YYYYMMDD>_<HHMMSS>` copies into a directory.
///
/// Two finalizations within the same second map to the same name; the
/// later copy replaces the earlier one.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    pub dir: PathBuf,
}

impl AuditTrail {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact file name for a timestamp
    pub fn artifact_name(at: NaiveDateTime) -> String {
        format!("{}{}", ARTIFACT_PREFIX, at.format(ARTIFACT_TIMESTAMP_FORMAT))
    }

    /// Full artifact path for a timestamp
    pub fn artifact_path(&self, at: NaiveDateTime) -> PathBuf {
        self.dir.join(Self::artifact_name(at))
    }
}

impl SnapshotPersister for AuditTrail {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn persist(
        &self,
        config_path: &Path,
        at: NaiveDateTime,
    ) -> Result<PersistedArtifact, CapabilityError> {
        fs::create_dir_all(&self.dir)?;

        let dest = self.artifact_path(at);
        let bytes = fs::copy(config_path, &dest)?;
        let digest = hex::encode(Sha256::digest(fs::read(&dest)?));

        info!(artifact = %dest.display(), bytes, "audit artifact written");

        Ok(PersistedArtifact {
            path: dest,
            digest,
            bytes,
            created_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(AuditTrail::artifact_name(at(9, 5, 1)), "config.final.20260307_090501");
    }

    #[test]
    fn test_persist_is_byte_copy() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join(".config");
        let contents = "#\n# header\n#\nCONFIG_A=y\n# CONFIG_B is not set\n";
        fs::write(&config, contents).unwrap();

        let trail = AuditTrail::new(dir.path().join("audit"));
        let artifact = trail.persist(&config, at(12, 0, 0)).unwrap();

        assert_eq!(fs::read_to_string(&artifact.path).unwrap(), contents);
        assert_eq!(artifact.bytes, contents.len() as u64);
        assert!(artifact.path.ends_with("config.final.20260307_120000"));
    }

    #[test]
    fn test_same_second_overwrites() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join(".config");
        let trail = AuditTrail::new(dir.path().join("audit"));

        fs::write(&config, "CONFIG_A=y\n").unwrap();
        let first = trail.persist(&config, at(12, 0, 0)).unwrap();
        fs::write(&config, "CONFIG_A=m\n").unwrap();
        let second = trail.persist(&config, at(12, 0, 0)).unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(fs::read_to_string(&second.path).unwrap(), "CONFIG_A=m\n");
        assert_eq!(fs::read_dir(dir.path().join("audit")).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let trail = AuditTrail::new(dir.path().join("audit"));
        let result = trail.persist(&dir.path().join("missing"), at(1, 2, 3));
        assert!(matches!(result, Err(CapabilityError::Io(_))));
    }
}
