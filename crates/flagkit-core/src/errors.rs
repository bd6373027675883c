/// Misuse of [`crate::builder::RuleBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    #[error("no group to end")]
    NoOpenGroup,
    #[error("{0} group(s) still open; call end_group() before build()")]
    UnclosedGroups(usize),
}

/// Structured check result for `flagkit check --json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    pub pass: bool,
    pub errors: Vec<CheckIssue>,
    pub warnings: Vec<CheckIssue>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckIssue {
    pub code: String,
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CheckIssue {
    pub fn new(code: &str, check: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            check: check.to_string(),
            message: message.into(),
            path: Some(path.into()),
        }
    }
}
