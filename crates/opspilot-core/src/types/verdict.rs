//! Verdict type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Completeness of a pass relative to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Failed,
    Partial,
    Complete,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Partial => "partial",
            Self::Complete => "complete",
        }
    }

    /// Lenient parse used for LLM output ("Complete", " partial ", ...).
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "complete" | "completed" => Some(Self::Complete),
            "partial" | "incomplete" => Some(Self::Partial),
            "failed" | "failure" | "fail" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verifier's judgement on one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub completeness: Completeness,
    pub rationale: String,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_refinement: Option<String>,
}

impl Verdict {
    pub fn new(completeness: Completeness, rationale: impl Into<String>) -> Self {
        Self {
            completeness,
            rationale: rationale.into(),
            limitations: Vec::new(),
            suggested_refinement: None,
        }
    }

    pub fn push_limitation(&mut self, limitation: impl Into<String>) {
        let limitation = limitation.into();
        if !self.limitations.contains(&limitation) {
            self.limitations.push(limitation);
        }
    }
}
