//! Assertion helpers for scenario steps.
//!
//! Each helper fails with an "expected X, got Y" error instead of panicking,
//! so a failed check ends the current step and the run moves on.

use anyhow::{bail, Context, Result};

use multinode_common::{
    account::AccountId,
    asset::{render_list, AccountAsset, Amount},
    crypto::Hash,
    query::{Query, QueryResponse},
    transaction::{StatusReport, TxStatus},
};

use crate::{environment::TestEnvironment, export::fetch_all_blocks};

/// Assert that a transaction settled on `expected`.
///
/// # Example
///
/// ```rust,ignore
/// let status = env.submit(0, &tx).await?;
/// assert_status(&status, TxStatus::Committed)?;
/// ```
pub fn assert_status(report: &StatusReport, expected: TxStatus) -> Result<()> {
    if report.status != expected {
        bail!("Status mismatch: expected {}, got {}", expected, report);
    }
    Ok(())
}

/// Assert the harness-asset balance of `account`.
pub async fn assert_balance(
    env: &TestEnvironment,
    account: &AccountId,
    expected: &Amount,
) -> Result<()> {
    let actual = env
        .balance_of(account)
        .await
        .with_context(|| format!("Failed to get balance of {}", account))?;

    if actual != *expected {
        bail!(
            "Balance mismatch for {}: expected {}, got {}",
            account,
            expected,
            actual
        );
    }
    Ok(())
}

/// Expected text of an account holding exactly one asset.
pub fn single_asset_text(env: &TestEnvironment, account: &AccountId, balance: &Amount) -> String {
    render_list(&[AccountAsset {
        asset_id: env.asset.clone(),
        account_id: account.clone(),
        balance: *balance,
    }])
}

/// Assert that `account` holds only the harness asset, with `balance`, by
/// comparing the rendered query response.
pub async fn assert_account_assets_text(
    env: &TestEnvironment,
    account: &AccountId,
    balance: &Amount,
) -> Result<()> {
    let assets = env.account_assets(account).await?;
    let actual = render_list(&assets);
    let expected = single_asset_text(env, account, balance);
    if actual != expected {
        bail!(
            "Account assets mismatch for {}: expected {:?}, got {:?}",
            account,
            expected,
            actual
        );
    }
    Ok(())
}

/// Assert that no block on the first node carries transaction `hash`.
pub async fn assert_not_committed(env: &TestEnvironment, hash: &Hash) -> Result<()> {
    let blocks = fetch_all_blocks(env.node(0)?).await?;
    if let Some(block) = blocks
        .iter()
        .find(|block| block.transactions.iter().any(|tx| tx.hash() == *hash))
    {
        bail!(
            "Transaction {} expected nowhere in the chain, got it in block {}",
            hash,
            block.height
        );
    }
    Ok(())
}

/// Assert that the ledger does not know `account`.
pub async fn assert_account_absent(env: &TestEnvironment, account: &AccountId) -> Result<()> {
    let response = env
        .query(
            0,
            Query::GetAccountAssets {
                account_id: account.clone(),
            },
        )
        .await?;
    if !response.is_error() {
        bail!(
            "Account {} expected to be absent, got assets {}",
            account,
            response
        );
    }
    Ok(())
}

/// Assert the rendered asset definition returned by node `index`.
pub async fn assert_asset_info_text(env: &TestEnvironment, index: usize) -> Result<()> {
    let response = env
        .query(
            index,
            Query::GetAssetInfo {
                asset_id: env.asset.clone(),
            },
        )
        .await?;

    let asset = match response {
        QueryResponse::AssetInfo(asset) => asset,
        other => bail!("Unexpected response to asset query: {}", other),
    };

    let expected = format!(
        "asset_id: \"{}\"\ndomain_id: \"{}\"\nprecision: {}\n",
        env.asset, env.settings.domain, env.settings.precision
    );
    let actual = asset.to_string();
    if actual != expected {
        bail!(
            "Asset info mismatch on node {}: expected {:?}, got {:?}",
            index + 1,
            expected,
            actual
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_status() {
        let committed = StatusReport::new(TxStatus::Committed);
        assert!(assert_status(&committed, TxStatus::Committed).is_ok());

        let error = assert_status(&committed, TxStatus::Rejected).unwrap_err();
        assert!(error.to_string().contains("expected REJECTED"));
    }
}
