mod amount;

pub use amount::Amount;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::account::{string_serde, validate_name, AccountId, DomainId};
use crate::error::IdError;

/// Asset identifier of the form `name#domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId {
    name: String,
    domain: DomainId,
}

impl AssetId {
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

impl FromStr for AssetId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, domain) = s
            .split_once('#')
            .ok_or_else(|| IdError::MissingSeparator(s.to_string(), '#'))?;
        Self::new(name, domain.parse()?)
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.domain)
    }
}

string_serde!(AssetId);

// Query results are compared as text in the same layout the network's
// reference client prints them: one `field: value` line per field.

/// Registered asset definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub domain_id: DomainId,
    pub precision: u8,
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "asset_id: \"{}\"", self.asset_id)?;
        writeln!(f, "domain_id: \"{}\"", self.domain_id)?;
        writeln!(f, "precision: {}", self.precision)
    }
}

/// Balance of one asset held by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAsset {
    pub asset_id: AssetId,
    pub account_id: AccountId,
    pub balance: Amount,
}

impl Display for AccountAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "asset_id: \"{}\"", self.asset_id)?;
        writeln!(f, "account_id: \"{}\"", self.account_id)?;
        writeln!(f, "balance: \"{}\"", self.balance)
    }
}

/// Render a list of items as `[a, b, ...]` using each item's text form.
pub fn render_list<T: Display>(items: &[T]) -> String {
    let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
