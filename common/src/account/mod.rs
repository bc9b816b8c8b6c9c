// Account, domain and role identifiers.
//
// Accounts are written `name@domain`, roles are bare names. Names are lower
// case alphanumerics plus underscore; domains are dot separated labels.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{MAX_DOMAIN_LENGTH, MAX_NAME_LENGTH};
use crate::error::IdError;

pub(crate) fn validate_name(name: &str) -> Result<(), IdError> {
    if name.is_empty() {
        return Err(IdError::Empty);
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(IdError::InvalidName {
            name: name.to_string(),
            reason: "too long",
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(IdError::InvalidName {
            name: name.to_string(),
            reason: "only [a-z0-9_] are allowed",
        });
    }

    Ok(())
}

fn validate_domain(domain: &str) -> Result<(), IdError> {
    if domain.is_empty() {
        return Err(IdError::Empty);
    }

    let invalid = |reason| IdError::InvalidDomain {
        domain: domain.to_string(),
        reason,
    };

    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(invalid("too long"));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(invalid("empty label"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("label cannot start or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("only [a-zA-Z0-9-] are allowed in a label"));
        }
    }

    Ok(())
}

// Serialize any identifier through its Display / FromStr pair
macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}
pub(crate) use string_serde;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(domain: impl Into<String>) -> Result<Self, IdError> {
        let domain = domain.into();
        validate_domain(&domain)?;
        Ok(Self(domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DomainId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

string_serde!(DomainId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoleId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

string_serde!(RoleId);

/// Account identifier of the form `name@domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId {
    name: String,
    domain: DomainId,
}

impl AccountId {
    pub fn new(name: impl Into<String>, domain: DomainId) -> Result<Self, IdError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, domain })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &DomainId {
        &self.domain
    }
}

impl FromStr for AccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, domain) = s
            .split_once('@')
            .ok_or_else(|| IdError::MissingSeparator(s.to_string(), '@'))?;
        Self::new(name, domain.parse()?)
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

string_serde!(AccountId);
