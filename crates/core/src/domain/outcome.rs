// FHIR OperationOutcome
// Used both for per-member error lines and for error response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Exception,
    Invalid,
    NotFound,
    Security,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub coding: Vec<Coding>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    pub details: CodeableConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub issue: Vec<Issue>,
}

impl OperationOutcome {
    pub const RESOURCE_TYPE: &'static str = "OperationOutcome";

    /// Single-issue outcome whose coding display and text carry `message`
    pub fn single(severity: IssueSeverity, code: IssueType, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            issue: vec![Issue {
                severity,
                code,
                details: CodeableConcept {
                    coding: vec![Coding {
                        code: None,
                        display: message.clone(),
                    }],
                    text: message,
                },
                diagnostics: None,
            }],
        }
    }

    /// Error outcome for a boundary failure: a coarse category plus a short diagnostic
    pub fn error(code: IssueType, category: &str, diagnostics: Option<String>) -> Self {
        let mut outcome = Self::single(IssueSeverity::Error, code, category);
        if let Some(issue) = outcome.issue.first_mut() {
            issue.details.coding[0].code = Some(category.to_string());
            issue.diagnostics = diagnostics;
        }
        outcome
    }

    /// Line written to a unit's error file when a member's fetch fails
    pub fn member_fetch_failure(resource_type: &str, member_id: &str, org_id: &str) -> Self {
        Self::single(
            IssueSeverity::Error,
            IssueType::Exception,
            format!(
                "Error retrieving {} for beneficiary {} in ACO {}",
                resource_type, member_id, org_id
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_fetch_failure_line() {
        let outcome = OperationOutcome::member_fetch_failure("ExplanationOfBenefit", "10000", "A0001");
        let value = serde_json::to_value(&outcome).unwrap();
        let text = "Error retrieving ExplanationOfBenefit for beneficiary 10000 in ACO A0001";
        assert_eq!(
            value,
            json!({
                "resourceType": "OperationOutcome",
                "issue": [{
                    "severity": "error",
                    "code": "exception",
                    "details": {
                        "coding": [{ "display": text }],
                        "text": text
                    }
                }]
            })
        );
    }

    #[test]
    fn test_error_outcome_carries_category_and_diagnostics() {
        let outcome = OperationOutcome::error(
            IssueType::Exception,
            "Queue Error",
            Some("publish failed".to_string()),
        );
        let issue = &outcome.issue[0];
        assert_eq!(issue.details.text, "Queue Error");
        assert_eq!(issue.details.coding[0].code.as_deref(), Some("Queue Error"));
        assert_eq!(issue.diagnostics.as_deref(), Some("publish failed"));
    }
}
