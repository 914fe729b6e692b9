// Exportable FHIR resource types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    ExplanationOfBenefit,
    Patient,
    Coverage,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::ExplanationOfBenefit => "ExplanationOfBenefit",
            ResourceType::Patient => "Patient",
            ResourceType::Coverage => "Coverage",
        }
    }

    /// Derive the resource type from a request URL such as
    /// `https://host/api/v1/Patient/$export`.
    ///
    /// The segment immediately before `$export` names the type.
    pub fn from_request_url(url: &str) -> Result<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let mut previous: Option<&str> = None;
        for segment in path.split('/') {
            if segment == "$export" {
                return match previous {
                    Some(name) => name.parse(),
                    None => Err(DomainError::UnsupportedResourceType(url.to_string())),
                };
            }
            if !segment.is_empty() {
                previous = Some(segment);
            }
        }
        Err(DomainError::UnsupportedResourceType(url.to_string()))
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ExplanationOfBenefit" => Ok(ResourceType::ExplanationOfBenefit),
            "Patient" => Ok(ResourceType::Patient),
            "Coverage" => Ok(ResourceType::Coverage),
            other => Err(DomainError::UnsupportedResourceType(other.to_string())),
        }
    }
}
