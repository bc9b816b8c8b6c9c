//! Shared state handed to every step of a suite.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use tokio::{net::TcpStream, time::timeout};

use multinode_common::{
    account::{AccountId, DomainId, RoleId},
    asset::{AccountAsset, Amount, AssetId},
    config::{
        ADMIN_ACCOUNT_ID, ADMIN_MINT, BASELINE_BALANCE, DEFAULT_USER_ROLE, HARNESS_ASSET_NAME,
        HARNESS_ASSET_PRECISION, HARNESS_DOMAIN, HARNESS_ROLE,
    },
    crypto::KeyPair,
    query::{Query, QueryResponse, SignedQuery},
    transaction::{Command, StatusReport, Transaction, TransactionBuilder},
};

use crate::client::{send_transaction, NodeClient, NodeEndpoint};

/// Names, amounts and timings a suite runs with.
#[derive(Debug, Clone)]
pub struct SuiteSettings {
    pub domain: DomainId,
    pub asset_name: String,
    pub precision: u8,
    /// Default role of the harness domain
    pub role: RoleId,
    pub user_names: Vec<String>,
    pub baseline: Amount,
    pub admin_mint: Amount,
    pub reachability_timeout: Duration,
    pub settle_delay: Duration,
}

impl SuiteSettings {
    /// Three users `user_a`, `user_b`, `user_c` under a restricted role.
    /// `user_a` plays the malicious client.
    pub fn malicious_client() -> Result<Self> {
        Self::build(
            HARNESS_ROLE,
            ["user_a", "user_b", "user_c"].map(String::from).to_vec(),
            Duration::from_secs(60),
            Duration::from_secs(3),
        )
    }

    /// One user per node, `user1` to `user<n>`, under the genesis user role.
    pub fn network(node_count: usize) -> Result<Self> {
        Self::build(
            DEFAULT_USER_ROLE,
            (1..=node_count).map(|i| format!("user{}", i)).collect(),
            Duration::from_secs(1),
            Duration::ZERO,
        )
    }

    fn build(
        role: &str,
        user_names: Vec<String>,
        reachability_timeout: Duration,
        settle_delay: Duration,
    ) -> Result<Self> {
        Ok(Self {
            domain: DomainId::new(HARNESS_DOMAIN)?,
            asset_name: HARNESS_ASSET_NAME.to_string(),
            precision: HARNESS_ASSET_PRECISION,
            role: RoleId::new(role)?,
            user_names,
            baseline: BASELINE_BALANCE.parse()?,
            admin_mint: ADMIN_MINT.parse()?,
            reachability_timeout,
            settle_delay,
        })
    }

    pub fn with_domain(mut self, domain: DomainId) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }
}

/// An account together with the key that signs for it.
#[derive(Clone)]
pub struct TestUser {
    pub id: AccountId,
    pub keypair: KeyPair,
}

impl TestUser {
    pub fn new(id: AccountId, keypair: KeyPair) -> Self {
        Self { id, keypair }
    }

    /// Transaction created by this user and signed with its key.
    pub fn transaction(&self, commands: impl IntoIterator<Item = Command>) -> Transaction {
        TransactionBuilder::new(self.id.clone())
            .commands(commands)
            .build()
            .sign(&self.keypair)
    }
}

impl std::fmt::Debug for TestUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestUser").field("id", &self.id).finish()
    }
}

pub struct TestEnvironment {
    pub settings: SuiteSettings,
    pub admin: TestUser,
    pub users: Vec<TestUser>,
    pub asset: AssetId,
    nodes: Vec<Arc<dyn NodeClient>>,
    query_counter: AtomicU64,
}

impl TestEnvironment {
    /// Fresh key pairs are generated for every user. The accounts only exist
    /// on the ledger once a suite creates them.
    pub fn new(
        settings: SuiteSettings,
        admin_keypair: KeyPair,
        nodes: Vec<Arc<dyn NodeClient>>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            bail!("No nodes to test against");
        }

        let admin = TestUser::new(ADMIN_ACCOUNT_ID.parse()?, admin_keypair);
        let users = settings
            .user_names
            .iter()
            .map(|name| {
                let id = AccountId::new(name.clone(), settings.domain.clone())
                    .with_context(|| format!("Invalid user name '{}'", name))?;
                Ok(TestUser::new(id, KeyPair::generate()))
            })
            .collect::<Result<Vec<_>>>()?;
        let asset = AssetId::new(settings.asset_name.clone(), settings.domain.clone())?;

        Ok(Self {
            settings,
            admin,
            users,
            asset,
            nodes,
            query_counter: AtomicU64::new(1),
        })
    }

    pub fn nodes(&self) -> &[Arc<dyn NodeClient>] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Result<&dyn NodeClient> {
        self.nodes
            .get(index)
            .map(|node| node.as_ref())
            .with_context(|| format!("No node {} in a network of {}", index + 1, self.nodes.len()))
    }

    pub fn endpoints(&self) -> Vec<NodeEndpoint> {
        self.nodes.iter().map(|node| node.endpoint().clone()).collect()
    }

    pub fn user(&self, name: &str) -> Result<&TestUser> {
        self.users
            .iter()
            .find(|user| user.id.name() == name)
            .with_context(|| format!("Unknown user '{}'", name))
    }

    /// Submit `tx` through node `index` and wait for its final status.
    pub async fn submit(&self, index: usize, tx: &Transaction) -> Result<StatusReport> {
        let node = self.node(index)?;
        let status = send_transaction(node, tx).await?;
        debug!("{} via {}: {}", tx.hash(), node.endpoint(), status);
        Ok(status)
    }

    /// Run `query` as the administrator through node `index`.
    pub async fn query(&self, index: usize, query: Query) -> Result<QueryResponse> {
        let counter = self.query_counter.fetch_add(1, Ordering::SeqCst);
        let signed = SignedQuery::new(self.admin.id.clone(), counter, query, &self.admin.keypair);
        let node = self.node(index)?;
        node.send_query(&signed)
            .await
            .with_context(|| format!("Query failed on {}", node.endpoint()))
    }

    /// Assets held by `account`, as seen by the first node.
    pub async fn account_assets(&self, account: &AccountId) -> Result<Vec<AccountAsset>> {
        let query = Query::GetAccountAssets {
            account_id: account.clone(),
        };
        match self.query(0, query).await? {
            QueryResponse::AccountAssets(assets) => Ok(assets),
            other => bail!("Unexpected response to assets query of {}: {}", account, other),
        }
    }

    /// Balance of the harness asset held by `account`, zero if none.
    pub async fn balance_of(&self, account: &AccountId) -> Result<Amount> {
        Ok(self
            .account_assets(account)
            .await?
            .into_iter()
            .find(|asset| asset.asset_id == self.asset)
            .map(|asset| asset.balance)
            .unwrap_or_default())
    }
}

/// Check that every endpoint accepts a TCP connection within `limit`.
pub async fn check_reachable(endpoints: &[NodeEndpoint], limit: Duration) -> Result<()> {
    for (i, endpoint) in endpoints.iter().enumerate() {
        info!("Reaching node {} at {}", i + 1, endpoint);
        match timeout(limit, TcpStream::connect((endpoint.host.as_str(), endpoint.port))).await {
            Ok(Ok(_)) => debug!("Connected to {}", endpoint),
            Ok(Err(e)) => bail!("Node {} at {} is unreachable: {}", i + 1, endpoint, e),
            Err(_) => bail!(
                "Node {} at {} did not accept a connection within {:?}",
                i + 1,
                endpoint,
                limit
            ),
        }
    }
    info!("All {} nodes are reachable", endpoints.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings() {
        let settings = SuiteSettings::malicious_client().unwrap();
        assert_eq!(settings.user_names, vec!["user_a", "user_b", "user_c"]);
        assert_eq!(settings.role.as_str(), "basic_user");
        assert_eq!(settings.baseline, Amount::from_integer(100));

        let settings = SuiteSettings::network(4).unwrap();
        assert_eq!(settings.user_names.last().map(String::as_str), Some("user4"));
        assert_eq!(settings.role.as_str(), "user");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoints = vec![NodeEndpoint::new("127.0.0.1", port)];
        assert!(check_reachable(&endpoints, Duration::from_millis(500)).await.is_err());
    }
}
