//! Lock records exchanged with Terraform/OpenTofu clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix appended to a state key to derive its lock marker key
pub const LOCK_SUFFIX: &str = ".lock";

/// Derive the lock marker key for a state key
///
/// Marker keys share the keyspace with state blobs, so a state id ending
/// in `.lock` would collide with a marker; clients do not produce such ids.
pub fn lock_key(key: &str) -> String {
    format!("{key}{LOCK_SUFFIX}")
}

/// A state lock record
///
/// This is the wire shape the Terraform/OpenTofu HTTP backend client
/// sends: capitalized field names and an ISO-8601 creation timestamp.
/// Clients routinely send partial records, so every field other than the
/// creation time falls back to an empty string when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique identifier for the lock
    #[serde(rename = "ID", default)]
    pub id: String,
    /// The operation holding the lock (e.g. "OperationTypeApply")
    #[serde(rename = "Operation", default)]
    pub operation: String,
    /// Free-text information supplied by the client
    #[serde(rename = "Info", default)]
    pub info: String,
    /// Identity of the holder (e.g. "user@host")
    #[serde(rename = "Who", default)]
    pub who: String,
    /// Tool version of the holder
    #[serde(rename = "Version", default)]
    pub version: String,
    /// When the lock was created
    #[serde(rename = "Created", default = "Utc::now")]
    pub created: DateTime<Utc>,
    /// Path to the locked resource
    #[serde(rename = "Path", default)]
    pub path: String,
}

impl Default for LockInfo {
    fn default() -> Self {
        Self {
            id: String::new(),
            operation: String::new(),
            info: String::new(),
            who: String::new(),
            version: String::new(),
            created: Utc::now(),
            path: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key("envs/prod"), "envs/prod.lock");
        assert_eq!(lock_key("terraform.tfstate"), "terraform.tfstate.lock");
    }

    #[test]
    fn test_lock_info_wire_shape() {
        let data = serde_json::json!({
            "ID": "d3d67d5e-6695-2885-c52e-ebf6f5d71c78",
            "Operation": "OperationTypeApply",
            "Info": "",
            "Who": "mermoldy@Serhiis-MacBook-Pro.local",
            "Version": "1.9.0",
            "Created": "2025-02-19T15:47:52.732586Z",
            "Path": ""
        });

        let lock: LockInfo = serde_json::from_value(data).unwrap();
        assert_eq!(lock.id, "d3d67d5e-6695-2885-c52e-ebf6f5d71c78");
        assert_eq!(lock.operation, "OperationTypeApply");
        assert_eq!(lock.who, "mermoldy@Serhiis-MacBook-Pro.local");
        assert_eq!(lock.version, "1.9.0");

        let serialized = serde_json::to_value(&lock).unwrap();
        assert_eq!(serialized["ID"], "d3d67d5e-6695-2885-c52e-ebf6f5d71c78");
        assert_eq!(serialized["Operation"], "OperationTypeApply");
        assert_eq!(serialized["Created"], "2025-02-19T15:47:52.732586Z");
    }

    #[test]
    fn test_lock_info_partial_record() {
        let lock: LockInfo =
            serde_json::from_value(serde_json::json!({"ID": "L1", "Who": "a"})).unwrap();
        assert_eq!(lock.id, "L1");
        assert_eq!(lock.who, "a");
        assert_eq!(lock.operation, "");
        assert_eq!(lock.path, "");
    }

    #[test]
    fn test_lock_info_round_trip() {
        let lock = LockInfo {
            id: "abcd1234".to_string(),
            operation: "Apply".to_string(),
            info: "Some info".to_string(),
            who: "test@machine".to_string(),
            version: "2.0.0".to_string(),
            path: "/some/path".to_string(),
            ..LockInfo::default()
        };

        let json = serde_json::to_string(&lock).unwrap();
        let deserialized: LockInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, lock);
    }
}
