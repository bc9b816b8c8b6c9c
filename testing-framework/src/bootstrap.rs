// Environment bootstrap of the security suite.
//
// Expects a freshly started network. Every transaction goes through the
// first node and must commit, otherwise the run is over.

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::time::sleep;

use multinode_common::{
    permission::{GrantablePermission, Permission},
    transaction::{Command, TxStatus},
};

use crate::{
    assertions::assert_status,
    environment::{check_reachable, TestEnvironment},
};

/// Permissions of the restricted role every harness user gets.
pub const BASIC_USER_PERMISSIONS: [Permission; 3] = [
    Permission::CanReceive,
    Permission::CanTransfer,
    Permission::CanGrantCanTransferMyAssets,
];

async fn commit(env: &TestEnvironment, what: &str, commands: Vec<Command>) -> Result<()> {
    info!("{}", what);
    let tx = env.admin.transaction(commands);
    let status = env.submit(0, &tx).await?;
    assert_status(&status, TxStatus::Committed).with_context(|| format!("{} failed", what))
}

/// Create the role, domain, asset and user accounts of the suite and give
/// every user the baseline balance.
pub async fn set_up_test_environment(env: &TestEnvironment) -> Result<()> {
    let settings = &env.settings;

    check_reachable(&env.endpoints(), settings.reachability_timeout)
        .await
        .context("Network is not up")?;
    if !settings.settle_delay.is_zero() {
        debug!("Letting the network settle for {:?}", settings.settle_delay);
        sleep(settings.settle_delay).await;
    }

    commit(
        env,
        "Creating roles",
        vec![Command::CreateRole {
            role_name: settings.role.clone(),
            permissions: BASIC_USER_PERMISSIONS.to_vec(),
        }],
    )
    .await?;

    commit(
        env,
        "Creating domain",
        vec![Command::CreateDomain {
            domain_id: settings.domain.clone(),
            default_role: settings.role.clone(),
        }],
    )
    .await?;

    commit(
        env,
        "Creating assets",
        vec![Command::CreateAsset {
            asset_name: settings.asset_name.clone(),
            domain_id: settings.domain.clone(),
            precision: settings.precision,
        }],
    )
    .await?;

    let accounts = env
        .users
        .iter()
        .map(|user| Command::CreateAccount {
            account_name: user.id.name().to_string(),
            domain_id: settings.domain.clone(),
            public_key: user.keypair.public_key(),
        })
        .collect();
    commit(env, "Creating users", accounts).await?;

    // Lets the balance resetter move funds out of user accounts
    for user in &env.users {
        info!("{} grants transfer permission to {}", user.id, env.admin.id);
        let tx = user.transaction([Command::GrantPermission {
            account_id: env.admin.id.clone(),
            permission: GrantablePermission::CanTransferMyAssets,
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)
            .with_context(|| format!("{} could not grant transfer permission", user.id))?;
    }

    commit(
        env,
        &format!("Adding {} {} to {}", settings.admin_mint, env.asset, env.admin.id),
        vec![Command::AddAssetQuantity {
            asset_id: env.asset.clone(),
            amount: settings.admin_mint,
        }],
    )
    .await?;

    let transfers = env
        .users
        .iter()
        .map(|user| {
            Command::transfer(&env.admin.id, &user.id, &env.asset, "", settings.baseline)
        })
        .collect();
    commit(env, "Transferring assets to users", transfers).await?;

    info!("Set up complete");
    Ok(())
}
