use serde::{Deserialize, Serialize};

use crate::{
    account::{validate_name, AccountId, DomainId, RoleId},
    asset::{Amount, AssetId},
    config::MAX_PRECISION,
    crypto::PublicKey,
    permission::{GrantablePermission, Permission},
};

pub const MAX_DESCRIPTION_LENGTH: usize = 64;

/// State changing instruction carried by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CreateRole {
        role_name: RoleId,
        permissions: Vec<Permission>,
    },
    CreateDomain {
        domain_id: DomainId,
        default_role: RoleId,
    },
    CreateAsset {
        asset_name: String,
        domain_id: DomainId,
        precision: u8,
    },
    CreateAccount {
        account_name: String,
        domain_id: DomainId,
        public_key: PublicKey,
    },
    AddAssetQuantity {
        asset_id: AssetId,
        amount: Amount,
    },
    TransferAsset {
        src_account_id: AccountId,
        dest_account_id: AccountId,
        asset_id: AssetId,
        description: String,
        amount: Amount,
    },
    GrantPermission {
        account_id: AccountId,
        permission: GrantablePermission,
    },
}

impl Command {
    pub fn transfer(
        src: &AccountId,
        dest: &AccountId,
        asset_id: &AssetId,
        description: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Command::TransferAsset {
            src_account_id: src.clone(),
            dest_account_id: dest.clone(),
            asset_id: asset_id.clone(),
            description: description.into(),
            amount,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateRole { .. } => "create_role",
            Command::CreateDomain { .. } => "create_domain",
            Command::CreateAsset { .. } => "create_asset",
            Command::CreateAccount { .. } => "create_account",
            Command::AddAssetQuantity { .. } => "add_asset_quantity",
            Command::TransferAsset { .. } => "transfer_asset",
            Command::GrantPermission { .. } => "grant_permission",
        }
    }

    /// Checks that need no ledger state: well formed names, positive
    /// amounts and bounded precision.
    pub fn validate_stateless(&self) -> Result<(), String> {
        match self {
            Command::CreateAsset {
                asset_name,
                precision,
                ..
            } => {
                validate_name(asset_name).map_err(|e| e.to_string())?;
                if *precision > MAX_PRECISION {
                    return Err(format!(
                        "precision {} exceeds maximum {}",
                        precision, MAX_PRECISION
                    ));
                }
            }
            Command::CreateAccount { account_name, .. } => {
                validate_name(account_name).map_err(|e| e.to_string())?;
            }
            Command::AddAssetQuantity { amount, .. } => {
                if amount.is_zero() {
                    return Err("amount must be positive".to_string());
                }
            }
            Command::TransferAsset {
                description,
                amount,
                ..
            } => {
                if amount.is_zero() {
                    return Err("amount must be positive".to_string());
                }
                if description.len() > MAX_DESCRIPTION_LENGTH {
                    return Err(format!(
                        "description longer than {} characters",
                        MAX_DESCRIPTION_LENGTH
                    ));
                }
            }
            Command::CreateRole { .. }
            | Command::CreateDomain { .. }
            | Command::GrantPermission { .. } => {}
        }
        Ok(())
    }
}
