//! Visitor identity as seen by the view and comment services.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Locally minted surrogate used before sign-in.
    Anonymous,
    /// Id issued by the external authentication provider.
    Authenticated,
}

/// The single current identity of a client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitorIdentity {
    pub kind: IdentityKind,
    pub id: String,
}

impl VisitorIdentity {
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Anonymous,
            id: id.into(),
        }
    }

    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Authenticated,
            id: id.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.kind == IdentityKind::Authenticated
    }

    /// Short id prefix safe to put in log lines.
    pub fn log_tag(&self) -> String {
        let prefix: String = self.id.chars().take(8).collect();
        format!("{}:{prefix}", self.kind.as_str())
    }
}

impl IdentityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
        }
    }
}

impl Display for VisitorIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.log_tag())
    }
}
