use std::collections::btree_map::{BTreeMap, Entry};

use serde::{Deserialize, Serialize};

use crate::PreconditionError;

/// A user observed in a follower/following list.
///
/// The username is never empty. `external_id` is `None` when the remote
/// did not report one; no synthetic id is ever invented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUserRef")]
pub struct UserRef {
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct RawUserRef {
    username: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

impl TryFrom<RawUserRef> for UserRef {
    type Error = PreconditionError;

    fn try_from(raw: RawUserRef) -> Result<Self, Self::Error> {
        Ok(UserRef::new(raw.username)?
            .with_external_id(raw.external_id)
            .with_full_name(raw.full_name))
    }
}

impl UserRef {
    pub fn new(username: impl Into<String>) -> Result<Self, PreconditionError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(PreconditionError::EmptyUsername);
        }
        Ok(Self {
            username,
            external_id: None,
            full_name: None,
        })
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_full_name(mut self, full_name: Option<String>) -> Self {
        self.full_name = full_name.filter(|name| !name.is_empty());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }
}

/// Set of users keyed by username.
///
/// Inserting a username that is already present keeps the first entry and
/// only fills in fields the first entry was missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserRef>", into = "Vec<UserRef>")]
pub struct UserSet {
    users: BTreeMap<String, UserRef>,
}

impl UserSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the username was not present before.
    pub fn insert(&mut self, user: UserRef) -> bool {
        match self.users.entry(user.username.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(user);
                true
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.external_id.is_none() {
                    existing.external_id = user.external_id;
                }
                if existing.full_name.is_none() {
                    existing.full_name = user.full_name;
                }
                false
            }
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn get(&self, username: &str) -> Option<&UserRef> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Usernames in ascending order.
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRef> {
        self.users.values()
    }

    /// Usernames present in `self` but not in `other`, ascending.
    pub fn difference<'a>(&'a self, other: &'a UserSet) -> impl Iterator<Item = &'a str> {
        self.usernames().filter(move |name| !other.contains(name))
    }
}

impl Extend<UserRef> for UserSet {
    fn extend<I: IntoIterator<Item = UserRef>>(&mut self, iter: I) {
        for user in iter {
            self.insert(user);
        }
    }
}

impl FromIterator<UserRef> for UserSet {
    fn from_iter<I: IntoIterator<Item = UserRef>>(iter: I) -> Self {
        let mut set = UserSet::new();
        set.extend(iter);
        set
    }
}

impl From<Vec<UserRef>> for UserSet {
    fn from(users: Vec<UserRef>) -> Self {
        users.into_iter().collect()
    }
}

impl From<UserSet> for Vec<UserRef> {
    fn from(set: UserSet) -> Self {
        set.users.into_values().collect()
    }
}
