// Security suite: user_a tries to cheat, user_b and user_c stay honest.
//
// Expects a fresh network. Steps run in order and each starts from the
// baseline balance restored by the before-each hook.

use anyhow::{bail, Result};
use futures::future::BoxFuture;
use log::{debug, info};

use multinode_common::{
    account::AccountId,
    asset::Amount,
    crypto::KeyPair,
    permission::Permission,
    transaction::{Command, TxStatus},
};

use super::{Pipeline, Step, StepFn};
use crate::{
    assertions::{
        assert_account_absent, assert_account_assets_text, assert_balance, assert_not_committed,
        assert_status,
    },
    balance::reset_user_balances,
    bootstrap::set_up_test_environment,
    environment::{TestEnvironment, TestUser},
    probe::submit_concurrently,
};

pub const NAME: &str = "malicious_client_testing";

struct Cast<'a> {
    a: &'a TestUser,
    b: &'a TestUser,
    c: &'a TestUser,
}

fn cast(env: &TestEnvironment) -> Result<Cast<'_>> {
    Ok(Cast {
        a: env.user("user_a")?,
        b: env.user("user_b")?,
        c: env.user("user_c")?,
    })
}

fn coins(amount: u64) -> Amount {
    Amount::from_integer(amount)
}

fn set_up(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(set_up_test_environment(env))
}

fn reset(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(reset_user_balances(env))
}

fn honest_transfer(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { b, c, .. } = cast(env)?;
        info!("Honest transfer of 10 coin from B to C");

        let tx = b.transaction([Command::transfer(&b.id, &c.id, &env.asset, "", coins(10))]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;

        assert_account_assets_text(env, &b.id, &coins(90)).await?;
        assert_account_assets_text(env, &c.id, &coins(110)).await?;
        info!("Honest transfer complete");
        Ok(())
    })
}

fn double_spend_same_transaction(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, b, c } = cast(env)?;
        info!("Attempting double spend in one transaction");

        let tx = a.transaction([
            Command::transfer(&a.id, &b.id, &env.asset, "", coins(100)),
            Command::transfer(&a.id, &c.id, &env.asset, "", coins(100)),
        ]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Rejected)?;
        info!("Transaction rejected");

        for user in [a, b, c] {
            assert_account_assets_text(env, &user.id, &coins(100)).await?;
        }
        info!("No coin has been transferred");
        Ok(())
    })
}

fn double_spend_two_transactions(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, b, c } = cast(env)?;
        info!("Attempting double spend over two transactions and two nodes");

        let to_b = a.transaction([Command::transfer(&a.id, &b.id, &env.asset, "", coins(100))]);
        let to_c = a.transaction([Command::transfer(&a.id, &c.id, &env.asset, "", coins(100))]);

        let outcome = submit_concurrently(env.node(0)?, &to_b, env.node(1)?, &to_c).await?;
        debug!("Final statuses: {} / {}", outcome.first, outcome.second);
        if !outcome.exactly_one_committed() {
            bail!(
                "Double spend not prevented: expected one COMMITTED and one REJECTED, got {} and {}",
                outcome.first,
                outcome.second
            );
        }
        info!("One spend occurred, double spend prevented");
        Ok(())
    })
}

fn create_role_without_permission(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, .. } = cast(env)?;
        info!("Attempting to create a new role as {}", a.id);
        let admin_balance = env.balance_of(&env.admin.id).await?;

        // A role that could mint coins
        let tx = a.transaction([Command::CreateRole {
            role_name: "new_user".parse()?,
            permissions: vec![
                Permission::CanReceive,
                Permission::CanTransfer,
                Permission::CanAddAssetQty,
            ],
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Rejected)?;
        assert_not_committed(env, &tx.hash()).await?;
        assert_balance(env, &env.admin.id, &admin_balance).await?;
        info!("No role created");
        Ok(())
    })
}

fn create_account_without_permission(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, .. } = cast(env)?;
        info!("Attempting to create a new user as {}", a.id);

        let tx = a.transaction([Command::CreateAccount {
            account_name: "user_x".to_string(),
            domain_id: env.settings.domain.clone(),
            public_key: KeyPair::generate().public_key(),
        }]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Rejected)?;
        assert_not_committed(env, &tx.hash()).await?;
        assert_account_absent(env, &AccountId::new("user_x", env.settings.domain.clone())?).await?;
        info!("No user created");
        Ok(())
    })
}

fn sign_as_other_user(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, c, .. } = cast(env)?;
        info!("Attempting to move coin out of {} with {}'s own key", c.id, a.id);

        let tx = a.transaction([Command::transfer(&c.id, &a.id, &env.asset, "", coins(10))]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Rejected)?;
        info!("Transfer failed");
        Ok(())
    })
}

fn sign_with_compromised_key(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, c, .. } = cast(env)?;
        info!("Attempting to move coin out of {} with its compromised key", c.id);

        // Holding c's key is enough to act as c
        let tx = c.transaction([Command::transfer(&c.id, &a.id, &env.asset, "", coins(10))]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("Transfer successful");
        Ok(())
    })
}

fn replay_own_transaction(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { a, c, .. } = cast(env)?;
        info!("Attempting replay of own transaction");

        let tx = a.transaction([Command::transfer(&a.id, &c.id, &env.asset, "", coins(10))]);
        let status = env.submit(0, &tx).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("First transaction successful, replaying it");

        // The network answers with the original outcome and applies nothing
        let replay = env.submit(0, &tx).await?;
        assert_status(&replay, TxStatus::Committed)?;

        assert_account_assets_text(env, &a.id, &coins(90)).await?;
        assert_account_assets_text(env, &c.id, &coins(110)).await?;
        info!("Replay had no effect");
        Ok(())
    })
}

fn replay_others_transaction(env: &TestEnvironment) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Cast { b, c, .. } = cast(env)?;
        info!("Attempting replay of another user's transaction");

        let signed = c.transaction([Command::transfer(&c.id, &b.id, &env.asset, "", coins(10))]);
        let status = env.submit(0, &signed).await?;
        assert_status(&status, TxStatus::Committed)?;
        info!("First transaction committed");

        debug!("user_a resubmits a copy of {}", signed.hash());
        let replay = env.submit(0, &signed).await?;
        assert_status(&replay, TxStatus::Committed)?;

        assert_account_assets_text(env, &b.id, &coins(110)).await?;
        assert_account_assets_text(env, &c.id, &coins(90)).await?;
        info!("Replay attack failed");
        Ok(())
    })
}

pub fn pipeline() -> Pipeline {
    Pipeline {
        name: NAME,
        setup: Some(Step::new(
            "set_up_test_environment",
            "Set up test environment with users, domain, and assets",
            set_up,
        )),
        before_each: Some(reset as StepFn),
        steps: vec![
            Step::new(
                "honest_transfer",
                "Test that two honest users can transfer\nB sends 10 coins to C",
                honest_transfer,
            ),
            Step::new(
                "double_spending_same_transaction",
                "Test that a malicious client cannot double spend in the same transaction",
                double_spend_same_transaction,
            ),
            Step::new(
                "double_spending_two_transactions",
                "Test that a malicious client cannot double spend in different transactions",
                double_spend_two_transactions,
            ),
            Step::new(
                "create_role_without_permission",
                "Test that a malicious client cannot create a role with no permission",
                create_role_without_permission,
            ),
            Step::new(
                "create_account_without_permission",
                "Test that a malicious client cannot create a new user without permission",
                create_account_without_permission,
            ),
            Step::new(
                "sign_as_other_user",
                "Test that a malicious client cannot sign as a different user using malicious private key",
                sign_as_other_user,
            ),
            Step::new(
                "sign_as_other_user_compromised_private_key",
                "Test that a malicious client can sign as a different user when the private key has been compromised",
                sign_with_compromised_key,
            ),
            Step::new(
                "replay_own_transaction",
                "Test that a user cannot replay their own transactions",
                replay_own_transaction,
            ),
            Step::new(
                "replay_others_transaction",
                "Test that a malicious user cannot replay others transactions",
                replay_others_transaction,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let pipeline = pipeline();
        assert!(pipeline.setup.is_some());
        assert!(pipeline.before_each.is_some());
        let names: Vec<&str> = pipeline.steps.iter().map(|step| step.name).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "honest_transfer");
        assert_eq!(names[2], "double_spending_two_transactions");
        assert_eq!(names[8], "replay_others_transaction");
    }
}
