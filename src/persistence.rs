//! Persisted state layout (spec §6): the orchestrator-owned state tree,
//! wrapped in a versioned envelope. Loading requires an exact schema version
//! match; the core attempts no migration.

use crate::errors::PersistenceError;
use serde::{Deserialize, Serialize};

/// Bumped whenever the shape of [`crate::orchestrator::OrchestratorState`]
/// changes in a way that would break a prior save.
pub const SCHEMA_VERSION: u32 = 1;

/// Versioned save/restore envelope (spec §6 "Persisted state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState<T> {
    pub schema_version: u32,
    pub content: T,
}

impl<T> PersistedState<T> {
    pub fn wrap(content: T) -> Self {
        PersistedState {
            schema_version: SCHEMA_VERSION,
            content,
        }
    }
}

impl<T: Serialize> PersistedState<T> {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: for<'de> Deserialize<'de>> PersistedState<T> {
    /// Deserializes and checks the schema version, rejecting any mismatch
    /// rather than attempting to migrate (spec §6).
    pub fn from_json(json: &str) -> Result<T, PersistenceError> {
        let envelope: PersistedState<T> = serde_json::from_str(json)?;
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(PersistenceError::SchemaVersionMismatch {
                persisted: envelope.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(envelope.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        value: f64,
    }

    #[test]
    fn round_trip_preserves_content() {
        let original = Dummy { value: 42.0 };
        let json = PersistedState::wrap(original.clone()).to_json().unwrap();
        let restored: Dummy = PersistedState::from_json(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn mismatched_schema_version_is_rejected() {
        let json = r#"{"schema_version":999,"content":{"value":1.0}}"#;
        let result: Result<Dummy, _> = PersistedState::from_json(json);
        assert!(matches!(
            result,
            Err(PersistenceError::SchemaVersionMismatch { persisted: 999, expected: _ })
        ));
    }
}
