use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Role attached to a user.
///
/// Unknown role strings coming from storage are kept as `Other` instead of
/// being rejected, so a row written by a newer deployment still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of roles without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.iter().any(|r| r == role)
    }

    pub fn add(mut self, role: Role) -> Self {
        if !self.contains(&role) {
            self.0.push(role);
        }
        self
    }

    // no handler drops roles yet
    #[allow(dead_code)]
    pub fn remove(mut self, role: &Role) -> Self {
        self.0.retain(|r| r != role);
        self
    }

    /// True when at least one role is present in both sets.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        self.0.iter().any(|r| other.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }

    pub fn from_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        strings
            .into_iter()
            .fold(Self::new(), |set, s| set.add(Role::parse(s.as_ref())))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        iter.into_iter().fold(Self::new(), |set, r| set.add(r))
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Role::as_str))
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_strings(strings))
    }
}
