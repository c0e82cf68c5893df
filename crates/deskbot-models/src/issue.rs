//! Plain Jira issue types used by the ticket commands.

use serde::{Deserialize, Serialize};

/// Summary view of a Jira issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue key.
    pub key: String,
    /// Summary line.
    pub summary: String,
    /// Workflow status name.
    pub status: String,
    /// Issue type name.
    pub issue_type: String,
    /// Assignee display name.
    pub assignee: Option<String>,
    /// Priority name.
    pub priority: Option<String>,
}

/// Result of creating a Jira issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    /// Numeric issue id.
    pub id: String,
    /// Issue key.
    pub key: String,
}
