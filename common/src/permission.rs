use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Role permissions understood by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CanCreateRole,
    CanCreateDomain,
    CanCreateAsset,
    CanCreateAccount,
    CanAddAssetQty,
    CanTransfer,
    CanReceive,
    CanGrantCanTransferMyAssets,
    CanGetAllAccAst,
    CanGetMyAccAst,
    CanReadAssets,
    CanGetBlocks,
}

impl Permission {
    pub const fn all() -> &'static [Permission] {
        &[
            Permission::CanCreateRole,
            Permission::CanCreateDomain,
            Permission::CanCreateAsset,
            Permission::CanCreateAccount,
            Permission::CanAddAssetQty,
            Permission::CanTransfer,
            Permission::CanReceive,
            Permission::CanGrantCanTransferMyAssets,
            Permission::CanGetAllAccAst,
            Permission::CanGetMyAccAst,
            Permission::CanReadAssets,
            Permission::CanGetBlocks,
        ]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::CanCreateRole => "can_create_role",
            Permission::CanCreateDomain => "can_create_domain",
            Permission::CanCreateAsset => "can_create_asset",
            Permission::CanCreateAccount => "can_create_account",
            Permission::CanAddAssetQty => "can_add_asset_qty",
            Permission::CanTransfer => "can_transfer",
            Permission::CanReceive => "can_receive",
            Permission::CanGrantCanTransferMyAssets => "can_grant_can_transfer_my_assets",
            Permission::CanGetAllAccAst => "can_get_all_acc_ast",
            Permission::CanGetMyAccAst => "can_get_my_acc_ast",
            Permission::CanReadAssets => "can_read_assets",
            Permission::CanGetBlocks => "can_get_blocks",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions one account hands to another over its own assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantablePermission {
    CanTransferMyAssets,
}

impl GrantablePermission {
    /// Role permission the granting account needs to hand this one out.
    pub const fn required_to_grant(&self) -> Permission {
        match self {
            GrantablePermission::CanTransferMyAssets => Permission::CanGrantCanTransferMyAssets,
        }
    }
}

impl Display for GrantablePermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantablePermission::CanTransferMyAssets => f.write_str("can_transfer_my_assets"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_name_matches_display() {
        for permission in Permission::all() {
            let json = serde_json::to_string(permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission));
        }
    }
}
