//! Persistence state, result, and payload types

use serde::{Deserialize, Serialize};

use super::store::PersistenceStore;

/// Host-reported persisted-storage status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersistenceState {
    #[serde(rename = "access-granted")]
    AccessGranted,
    #[serde(rename = "no-access")]
    NoAccess,
    #[serde(rename = "unsupported")]
    Unsupported,
}

impl std::fmt::Display for PersistenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceState::AccessGranted => write!(f, "access-granted"),
            PersistenceState::NoAccess => write!(f, "no-access"),
            PersistenceState::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Quota/usage snapshot for the settings surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistenceStats {
    #[serde(rename = "quotaBytes")]
    pub quota_bytes: u64,
    #[serde(rename = "usageBytes")]
    pub usage_bytes: u64,
}

/// Server whose streamed media may be persisted locally. The id
/// namespaces one storage subdirectory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub id: String,
}

/// Media item addressable by a stream URL; the persisted file is named
/// by the raw id, with no extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Song {
    pub id: String,
    #[serde(rename = "streamUrl")]
    pub stream_url: String,
}

/// Outcome of the full persistence negotiation. Closed set: callers must
/// handle every case, and only success carries a store.
#[derive(Debug)]
pub enum PersistenceResult {
    /// Access granted and the server directory resolved.
    Success { store: PersistenceStore },
    /// The host (or the user) refused persistent storage.
    PermissionDenied,
    /// The host lacks the persisted-storage capability.
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::{PersistenceState, PersistenceStats};

    #[test]
    fn persistence_state_display_matches_expected_strings() {
        assert_eq!(PersistenceState::AccessGranted.to_string(), "access-granted");
        assert_eq!(PersistenceState::NoAccess.to_string(), "no-access");
        assert_eq!(PersistenceState::Unsupported.to_string(), "unsupported");
    }

    #[test]
    fn stats_serialize_with_camel_case_fields() {
        let stats = PersistenceStats {
            quota_bytes: 200,
            usage_bytes: 50,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["quotaBytes"], 200);
        assert_eq!(json["usageBytes"], 50);
    }
}
