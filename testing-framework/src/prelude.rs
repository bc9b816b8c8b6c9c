//! Everything a suite or a test usually needs, in one import.

pub use std::{sync::Arc, time::Duration};

pub use anyhow::{Context, Result};

pub use multinode_common::{
    account::{AccountId, DomainId, RoleId},
    asset::{Amount, AssetId},
    crypto::{Hash, KeyPair},
    query::{Query, QueryResponse},
    transaction::{Command, StatusReport, Transaction, TransactionBuilder, TxStatus},
};

pub use crate::{
    assertions::{assert_account_assets_text, assert_balance, assert_status},
    balance::reset_user_balances,
    bootstrap::set_up_test_environment,
    client::{send_transaction, NodeClient, NodeEndpoint, RpcNodeClient},
    environment::{SuiteSettings, TestEnvironment, TestUser},
    network::LocalNetwork,
    probe::{submit_concurrently, DualSubmissionOutcome},
    scenarios::{malicious_client, network, NoGate, Pipeline, ScenarioExecutor, Step},
};
