use anyhow::{Context, Result};
use log::{debug, info};

use multinode_common::transaction::{Command, TxStatus};

use crate::{
    assertions::{assert_account_assets_text, assert_status},
    environment::TestEnvironment,
};

pub const TOP_UP_DESCRIPTION: &str = "Top up 100 coin";
pub const RETURN_DESCRIPTION: &str = "Transfer excess user balance back";

/// Bring every user back to the baseline balance.
///
/// The administrator mints the baseline, hands it to the user and pulls back
/// whatever the user held before, all in one transaction. Relies on the
/// `can_transfer_my_assets` grant made during bootstrap.
pub async fn reset_user_balances(env: &TestEnvironment) -> Result<()> {
    info!("Resetting account balances");
    let baseline = env.settings.baseline;

    let mut commands = Vec::new();
    for user in &env.users {
        let current = env
            .balance_of(&user.id)
            .await
            .with_context(|| format!("Failed to read balance of {}", user.id))?;
        debug!("{} holds {} {}", user.id, current, env.asset);

        commands.push(Command::AddAssetQuantity {
            asset_id: env.asset.clone(),
            amount: baseline,
        });
        commands.push(Command::transfer(
            &env.admin.id,
            &user.id,
            &env.asset,
            TOP_UP_DESCRIPTION,
            baseline,
        ));
        // A zero transfer fails stateless validation
        if !current.is_zero() {
            commands.push(Command::transfer(
                &user.id,
                &env.admin.id,
                &env.asset,
                RETURN_DESCRIPTION,
                current,
            ));
        }
    }

    let tx = env.admin.transaction(commands);
    let status = env.submit(0, &tx).await?;
    assert_status(&status, TxStatus::Committed).context("Balance reset was not committed")?;

    for user in &env.users {
        assert_account_assets_text(env, &user.id, &baseline).await?;
    }
    debug!("User balances set");
    Ok(())
}
