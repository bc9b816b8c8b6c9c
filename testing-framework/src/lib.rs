//! # Multinode ledger probe
//!
//! Acceptance harness for a multinode permissioned ledger. It drives a
//! running network through its node clients, in a fixed order: honest
//! transfers, double spend attempts, privilege escalation attempts,
//! signature forgery attempts and transaction replays, and checks the final
//! transaction statuses and account balances.
//!
//! ## Layout
//!
//! - [`client`]: the [`client::NodeClient`] boundary and its JSON-RPC client
//! - [`network`]: an in-process network for running the suites without a
//!   deployment
//! - [`environment`], [`bootstrap`], [`balance`]: shared suite state, the
//!   one-time setup and the per-scenario balance reset
//! - [`scenarios`]: ordered pipelines of the two suites
//! - [`probe`]: concurrent submission of two conflicting transactions
//! - [`export`]: per-node block dumps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multinode_testing_framework::prelude::*;
//!
//! let admin = KeyPair::generate();
//! let network = LocalNetwork::builder()
//!     .with_admin_key(admin.public_key())
//!     .with_tcp_listeners(true)
//!     .build()
//!     .await?;
//! let settings = SuiteSettings::malicious_client()?.with_settle_delay(Duration::ZERO);
//! let env = TestEnvironment::new(settings, admin, network.clients())?;
//! let report = ScenarioExecutor::new(Box::new(NoGate))
//!     .execute(&malicious_client::pipeline(), &env)
//!     .await;
//! assert!(report.success);
//! ```

#![warn(clippy::all)]

pub mod assertions;
pub mod balance;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod environment;
pub mod export;
pub mod network;
pub mod probe;
pub mod scenarios;

// Convenient re-exports for common usage
pub mod prelude;

pub use client::{NodeClient, NodeEndpoint, RpcNodeClient};
pub use environment::{SuiteSettings, TestEnvironment, TestUser};
pub use network::{LocalNetwork, LocalNetworkBuilder};
