//! Security suite against the in-process network.

use async_trait::async_trait;
use futures::StreamExt;
use multinode_common::block::Block;
use multinode_common::query::SignedQuery;
use multinode_testing_framework::{
    assertions::{assert_account_absent, assert_not_committed},
    client::{ClientError, StatusStream},
    export::export_blocks,
    prelude::*,
};

struct Harness {
    network: LocalNetwork,
    env: TestEnvironment,
}

/// Node that reports every rejected transaction as committed.
struct LyingNode {
    inner: Arc<dyn NodeClient>,
}

#[async_trait]
impl NodeClient for LyingNode {
    fn endpoint(&self) -> &NodeEndpoint {
        self.inner.endpoint()
    }

    async fn send_tx(&self, tx: &Transaction) -> Result<Hash, ClientError> {
        self.inner.send_tx(tx).await
    }

    async fn tx_status_stream(&self, hash: &Hash) -> Result<StatusStream, ClientError> {
        let stream = self.inner.tx_status_stream(hash).await?;
        Ok(stream
            .map(|report| {
                report.map(|report| match report.status {
                    TxStatus::Rejected => StatusReport::new(TxStatus::Committed),
                    _ => report,
                })
            })
            .boxed())
    }

    async fn send_query(&self, query: &SignedQuery) -> Result<QueryResponse, ClientError> {
        self.inner.send_query(query).await
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ClientError> {
        self.inner.get_block(height).await
    }
}

async fn harness_with(wrap: fn(Arc<dyn NodeClient>) -> Arc<dyn NodeClient>) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let admin = KeyPair::generate();
    let network = LocalNetwork::builder()
        .with_admin_key(admin.public_key())
        .with_tcp_listeners(true)
        .build()
        .await
        .unwrap();
    let settings = SuiteSettings::malicious_client()
        .unwrap()
        .with_settle_delay(Duration::ZERO)
        .with_reachability_timeout(Duration::from_secs(5));
    let nodes = network.clients().into_iter().map(wrap).collect();
    let env = TestEnvironment::new(settings, admin, nodes).unwrap();
    Harness { network, env }
}

async fn harness() -> Harness {
    harness_with(|node| node).await
}

async fn bootstrapped() -> Harness {
    let harness = harness().await;
    set_up_test_environment(&harness.env).await.unwrap();
    harness
}

fn coins(amount: u64) -> Amount {
    Amount::from_integer(amount)
}

#[tokio::test]
async fn test_full_pipeline_passes() {
    let Harness { network, env } = harness().await;

    let pipeline = malicious_client::pipeline();
    let report = ScenarioExecutor::new(Box::new(NoGate))
        .execute(&pipeline, &env)
        .await;
    report.print();

    assert!(report.success, "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert!(!report.aborted);
    assert_eq!(report.outcomes.len(), 10);

    // The last scenario moved 10 from C to B once
    let asset = &env.asset;
    assert_eq!(network.balance(&env.user("user_a").unwrap().id, asset), Some(coins(100)));
    assert_eq!(network.balance(&env.user("user_b").unwrap().id, asset), Some(coins(110)));
    assert_eq!(network.balance(&env.user("user_c").unwrap().id, asset), Some(coins(90)));

    // Rejected escalation attempts left nothing behind
    assert!(!network.has_role(&"new_user".parse().unwrap()));
    assert!(!network.has_account(&"user_x@probe".parse().unwrap()));
    assert!(report.ensure_passed().is_ok());
}

#[tokio::test]
async fn test_suite_fails_when_rejections_are_reported_as_commits() {
    let Harness { network, env } =
        harness_with(|inner| Arc::new(LyingNode { inner }) as Arc<dyn NodeClient>).await;

    let report = ScenarioExecutor::new(Box::new(NoGate))
        .execute(&malicious_client::pipeline(), &env)
        .await;

    assert!(!report.aborted);
    assert!(!report.success);
    let failed: Vec<&str> = report.failures().map(|o| o.name.as_str()).collect();
    assert_eq!(
        failed,
        vec![
            "double_spending_same_transaction",
            "double_spending_two_transactions",
            "create_role_without_permission",
            "create_account_without_permission",
            "sign_as_other_user",
        ]
    );
    let error = report.ensure_passed().unwrap_err().to_string();
    assert!(error.starts_with("5 of 10 step(s)"), "{}", error);

    // The ledger itself still refused the escalation
    assert!(!network.has_role(&"new_user".parse().unwrap()));
}

#[tokio::test]
async fn test_state_checks_flag_existing_state() {
    let Harness { network, env } = bootstrapped().await;
    let b = env.user("user_b").unwrap();
    let c = env.user("user_c").unwrap();

    let error = assert_account_absent(&env, &b.id).await.unwrap_err();
    assert!(error.to_string().contains("expected to be absent"), "{}", error);

    let tx = b.transaction([Command::transfer(&b.id, &c.id, &env.asset, "", coins(1))]);
    assert_status(&env.submit(0, &tx).await.unwrap(), TxStatus::Committed).unwrap();
    assert!(network.is_committed(&tx.hash()));
    assert!(assert_not_committed(&env, &tx.hash()).await.is_err());

    let absent = AccountId::new("user_x", env.settings.domain.clone()).unwrap();
    assert_account_absent(&env, &absent).await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_gives_every_user_the_baseline() {
    let Harness { env, .. } = bootstrapped().await;
    for user in &env.users {
        assert_account_assets_text(&env, &user.id, &coins(100)).await.unwrap();
    }
    // 1000 minted, 300 handed out
    assert_balance(&env, &env.admin.id, &coins(700)).await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_requires_fresh_network() {
    let Harness { env, .. } = bootstrapped().await;

    let pipeline = malicious_client::pipeline();
    let report = ScenarioExecutor::new(Box::new(NoGate))
        .execute(&pipeline, &env)
        .await;
    assert!(report.aborted);
    assert!(!report.success);
    let error = report.outcomes[0].error.as_deref().unwrap();
    assert!(error.contains("REJECTED"), "{}", error);
}

#[tokio::test]
async fn test_reset_restores_baseline_from_empty_and_excess() {
    let Harness { env, .. } = bootstrapped().await;
    let a = env.user("user_a").unwrap();
    let b = env.user("user_b").unwrap();

    // a ends up with nothing, b with 200
    let tx = a.transaction([Command::transfer(&a.id, &b.id, &env.asset, "", coins(100))]);
    assert_status(&env.submit(0, &tx).await.unwrap(), TxStatus::Committed).unwrap();
    assert_balance(&env, &a.id, &Amount::zero()).await.unwrap();

    reset_user_balances(&env).await.unwrap();
    for user in &env.users {
        assert_account_assets_text(&env, &user.id, &coins(100)).await.unwrap();
    }
}

#[tokio::test]
async fn test_honest_transfer_conserves_supply() {
    let Harness { env, .. } = bootstrapped().await;
    let b = env.user("user_b").unwrap();
    let c = env.user("user_c").unwrap();

    let tx = b.transaction([Command::transfer(
        &b.id,
        &c.id,
        &env.asset,
        "",
        "12.5".parse().unwrap(),
    )]);
    assert_status(&env.submit(2, &tx).await.unwrap(), TxStatus::Committed).unwrap();

    let sum = env
        .balance_of(&b.id)
        .await
        .unwrap()
        .checked_add(&env.balance_of(&c.id).await.unwrap())
        .unwrap();
    assert_eq!(sum, coins(200));
    assert_balance(&env, &b.id, &"87.5".parse().unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_conflicting_submissions_to_two_nodes() {
    let Harness { network, env } = bootstrapped().await;
    let a = env.user("user_a").unwrap();
    let b = env.user("user_b").unwrap();
    let c = env.user("user_c").unwrap();

    let to_b = a.transaction([Command::transfer(&a.id, &b.id, &env.asset, "", coins(100))]);
    let to_c = a.transaction([Command::transfer(&a.id, &c.id, &env.asset, "", coins(100))]);
    let outcome = submit_concurrently(env.node(0).unwrap(), &to_b, env.node(1).unwrap(), &to_c)
        .await
        .unwrap();

    assert!(outcome.exactly_one_committed(), "{:?}", outcome);
    // Arrival order decides
    assert_eq!(outcome.first.status, TxStatus::Committed);
    assert_eq!(outcome.second.status, TxStatus::Rejected);
    assert_eq!(network.balance(&a.id, &env.asset), Some(Amount::zero()));
    assert_eq!(network.balance(&b.id, &env.asset), Some(coins(200)));
    assert_eq!(network.balance(&c.id, &env.asset), Some(coins(100)));
}

#[tokio::test]
async fn test_rejected_transaction_reports_reason() {
    let Harness { env, .. } = bootstrapped().await;
    let a = env.user("user_a").unwrap();

    let tx = a.transaction([Command::AddAssetQuantity {
        asset_id: env.asset.clone(),
        amount: coins(1_000_000),
    }]);
    let node = env.node(3).unwrap();
    let hash = node.send_tx(&tx).await.unwrap();
    let history = multinode_testing_framework::client::collect_statuses(node, &hash)
        .await
        .unwrap();

    let failed = &history[history.len() - 2];
    assert_eq!(failed.status, TxStatus::StatefulValidationFailed);
    assert!(failed.error_code > 0);
    assert!(failed.error_message.contains("can_add_asset_qty"), "{}", failed);
    assert_eq!(history.last().unwrap().status, TxStatus::Rejected);
    assert_balance(&env, &a.id, &coins(100)).await.unwrap();
}

#[tokio::test]
async fn test_replay_is_acknowledged_but_not_applied() {
    let Harness { network, env } = bootstrapped().await;
    let c = env.user("user_c").unwrap();
    let b = env.user("user_b").unwrap();

    let tx = c.transaction([Command::transfer(&c.id, &b.id, &env.asset, "", coins(10))]);
    let first = env.submit(0, &tx).await.unwrap();
    let height = network.height();
    // Replayed through another node
    let replay = env.submit(3, &tx).await.unwrap();

    assert_eq!(first, replay);
    assert_eq!(network.height(), height);
    assert_balance(&env, &b.id, &coins(110)).await.unwrap();
}

#[tokio::test]
async fn test_block_export_writes_one_log_per_node() {
    let Harness { network, env } = bootstrapped().await;
    let dir = tempfile::tempdir().unwrap();

    let paths = export_blocks(env.nodes(), dir.path()).await.unwrap();
    assert_eq!(paths.len(), 4);
    for (i, path) in paths.iter().enumerate() {
        assert_eq!(path, &dir.path().join(format!("node{}.log", i + 1)));
        let content = std::fs::read_to_string(path).unwrap();
        let blocks = serde_json::Deserializer::from_str(&content)
            .into_iter::<serde_json::Value>()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(blocks.len() as u64, network.height());
        assert_eq!(blocks[0]["height"], 1);
    }
}
