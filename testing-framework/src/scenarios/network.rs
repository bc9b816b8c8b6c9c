// Basic network suite: the administrator sets up a domain and an asset and
// then talks to every node in turn. Expects a fresh network.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::info;

use multinode_common::{
    asset::Amount,
    transaction::{Command, TxStatus},
};

use super::{Pipeline, Step};
use crate::{
    assertions::{assert_asset_info_text, assert_status},
    environment::{check_reachable, TestEnvironment},
};

pub const NAME: &str = "network_testing";

pub const TOP_UP_DESCRIPTION: &str = "Top Up";

/// Amount the administrator sends to the user created on node `index`
/// (zero based): 1.11 times the node number.
pub fn top_up_amount(index: usize) -> Result<Amount> {
    let step = Amount::from_units(111, 2)?;
    Ok(step.checked_mul(index as u64 + 1)?)
}

fn node_reachable(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(check_reachable_all(env))
}

async fn check_reachable_all(env: &TestEnvironment) -> Result<()> {
    check_reachable(&env.endpoints(), env.settings.reachability_timeout).await
}

fn create_domain(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!("Creating domain {}", env.settings.domain);
        let tx = env.admin.transaction([Command::CreateDomain {
            domain_id: env.settings.domain.clone(),
            default_role: env.settings.role.clone(),
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("Successfully created domain");
        Ok(())
    })
}

fn create_asset(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!("Creating asset {}", env.asset);
        let tx = env.admin.transaction([Command::CreateAsset {
            asset_name: env.settings.asset_name.clone(),
            domain_id: env.settings.domain.clone(),
            precision: env.settings.precision,
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("Successfully created asset");
        Ok(())
    })
}

fn add_asset(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!(
            "Adding {} {} to {}",
            env.settings.admin_mint, env.asset, env.admin.id
        );
        let tx = env.admin.transaction([Command::AddAssetQuantity {
            asset_id: env.asset.clone(),
            amount: env.settings.admin_mint,
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("Successfully added asset");
        Ok(())
    })
}

fn create_users(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!("Creating one user per node");
        for (i, user) in env.users.iter().enumerate() {
            info!("Create {} on node {}", user.id, i + 1);
            let tx = env.admin.transaction([Command::CreateAccount {
                account_name: user.id.name().to_string(),
                domain_id: env.settings.domain.clone(),
                public_key: user.keypair.public_key(),
            }]);
            let status = env.submit(i, &tx).await?;
            assert_status(&status, TxStatus::Committed)
                .with_context(|| format!("Creating {} on node {}", user.id, i + 1))?;
        }
        info!("Successfully created users");
        Ok(())
    })
}

fn transfer_asset_to_users(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!("Transferring {} from {} to users", env.asset, env.admin.id);
        for (i, user) in env.users.iter().enumerate() {
            let amount = top_up_amount(i)?;
            info!("Transfer {} to {} via node {}", amount, user.id, i + 1);
            let tx = env.admin.transaction([Command::transfer(
                &env.admin.id,
                &user.id,
                &env.asset,
                TOP_UP_DESCRIPTION,
                amount,
            )]);
            let status = env.submit(i, &tx).await?;
            assert_status(&status, TxStatus::Committed)
                .with_context(|| format!("Transfer to {} via node {}", user.id, i + 1))?;
        }
        Ok(())
    })
}

fn query_on_asset(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        info!("Querying asset {} on each node", env.asset);
        for i in 0..env.nodes().len() {
            assert_asset_info_text(env, i).await?;
            info!("Successfully queried asset on node {}", i + 1);
        }
        Ok(())
    })
}

pub fn pipeline() -> Pipeline {
    Pipeline {
        name: NAME,
        setup: None,
        before_each: None,
        steps: vec![
            Step::new(
                "node_reachable",
                "Test if all nodes are reachable on their client ports",
                node_reachable,
            ),
            Step::new(
                "create_domain",
                "Test if admin can create a domain",
                create_domain,
            ),
            Step::new(
                "create_asset",
                "Test if an admin can create an asset in the new domain",
                create_asset,
            ),
            Step::new(
                "add_asset",
                "Test if an admin can add the new asset to their account",
                add_asset,
            ),
            Step::new(
                "create_users",
                "Test if an admin can create new users, using each node",
                create_users,
            ),
            Step::new(
                "transfer_asset_to_users",
                "Test if an admin can transfer the new asset to each new account",
                transfer_asset_to_users,
            ),
            Step::new(
                "query_on_asset",
                "Test if an admin can query the new asset on each node",
                query_on_asset,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_up_amounts_are_exact() {
        let amounts: Vec<String> = (0..4)
            .map(|i| top_up_amount(i).unwrap().to_string())
            .collect();
        assert_eq!(amounts, vec!["1.11", "2.22", "3.33", "4.44"]);
    }
}
