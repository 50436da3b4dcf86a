use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PreconditionError;

/// Stable identifier (the handle) of the account being tracked.
///
/// Used as the key for run locking and for grouping snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountIdentity(String);

impl AccountIdentity {
    pub fn new(handle: impl Into<String>) -> Result<Self, PreconditionError> {
        let handle = handle.into().trim().to_string();
        if handle.is_empty() {
            return Err(PreconditionError::EmptyAccount);
        }
        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountIdentity {
    type Error = PreconditionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountIdentity> for String {
    fn from(value: AccountIdentity) -> Self {
        value.0
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which relationship list is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Followers,
    Following,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Followers, ListKind::Following];

    /// Path segment used by the remote list endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            ListKind::Followers => "followers",
            ListKind::Following => "following",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Followers => write!(f, "Followers"),
            ListKind::Following => write!(f, "Following"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_identity_is_trimmed_and_non_empty() {
        assert_eq!(AccountIdentity::new("  alice ").unwrap().as_str(), "alice");
        assert_eq!(
            AccountIdentity::new("   "),
            Err(PreconditionError::EmptyAccount)
        );
    }
}
