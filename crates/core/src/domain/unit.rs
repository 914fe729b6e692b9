// Unit of Work

use serde::{Deserialize, Serialize};

use super::job::{JobId, OrgId, UserId};
use super::resource_type::ResourceType;

/// Suffix distinguishing a unit's error file from its result file
pub const ERROR_FILE_SUFFIX: &str = "-error";

/// Extension of every payload file
pub const NDJSON_EXTENSION: &str = "ndjson";

/// One bounded batch of members, processed independently of its siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportUnit {
    pub job_id: JobId,
    pub org_id: OrgId,
    pub user_id: UserId,
    /// 0-based position of this unit within its job
    pub seq: u32,
    pub member_ids: Vec<String>,
    pub resource_type: ResourceType,
    pub encrypt: bool,
}

impl ExportUnit {
    /// Result file name. Deterministic, so a redelivered unit overwrites
    /// its own output instead of adding a new file.
    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.org_id, self.seq, NDJSON_EXTENSION)
    }

    pub fn error_file_name(&self) -> String {
        format!(
            "{}-{}{}.{}",
            self.org_id, self.seq, ERROR_FILE_SUFFIX, NDJSON_EXTENSION
        )
    }
}

/// A unit as handed out by the work queue
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Queue row id, used to ack/requeue/bury
    pub id: i64,
    pub unit: ExportUnit,
    /// 1-based attempt number of this delivery
    pub attempt: i32,
    pub max_attempts: i32,
}

impl Delivery {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(seq: u32) -> ExportUnit {
        ExportUnit {
            job_id: 7,
            org_id: "A0001".to_string(),
            user_id: "user-1".to_string(),
            seq,
            member_ids: vec!["m1".to_string()],
            resource_type: ResourceType::Patient,
            encrypt: true,
        }
    }

    #[test]
    fn test_file_names_are_deterministic() {
        assert_eq!(unit(3).file_name(), "A0001-3.ndjson");
        assert_eq!(unit(3).error_file_name(), "A0001-3-error.ndjson");
        assert_ne!(unit(0).file_name(), unit(1).file_name());
    }

    #[test]
    fn test_unit_payload_json() {
        let json = serde_json::to_value(unit(0)).unwrap();
        assert_eq!(json["resource_type"], "Patient");
        let back: ExportUnit = serde_json::from_value(json).unwrap();
        assert_eq!(back, unit(0));
    }
}
