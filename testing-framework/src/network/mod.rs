// In-process stand-in for the multinode ledger.
//
// The harness normally drives a deployed network. `LocalNetwork` gives the
// suites something to run against in tests: N peers sharing one ledger,
// with the externally visible behaviour the scenarios check for. Conflicting
// transactions are serialized in arrival order, failed transactions leave no
// trace in the state, and replaying a known transaction changes nothing.
//
// There is no background task. Ordering rounds run when a status stream is
// waiting for a transaction that has not been ordered yet.

mod ledger;
mod node;

pub use ledger::{AccountState, LedgerError, WorldState};
pub use node::LocalNode;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, trace};
use parking_lot::Mutex;
use tokio::{net::TcpListener, task::JoinHandle};

use multinode_common::{
    account::{AccountId, RoleId},
    asset::{Amount, AssetId},
    block::{Block, GENESIS_HEIGHT},
    config::DEFAULT_NODE_COUNT,
    crypto::{Hash, Hashable, PublicKey},
    query::{QueryResponse, SignedQuery},
    time::get_current_time_in_millis,
    transaction::{StatusReport, Transaction, TxStatus},
};

use crate::client::{NodeClient, NodeEndpoint};

pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_millis(10);

// Port numbers handed out when nodes do not listen on a real socket
const FIRST_VIRTUAL_PORT: u16 = 50051;

pub(crate) enum StatusLookup {
    Unknown,
    Pending,
    Found(StatusReport),
}

struct LedgerState {
    world: WorldState,
    chain: Vec<Block>,
    // Full history per hash, kept for the life of the network. A network
    // lives for one run, and replays are answered from here.
    statuses: HashMap<Hash, Vec<StatusReport>>,
    queue: VecDeque<Transaction>,
}

pub(crate) struct Shared {
    state: Mutex<LedgerState>,
    round_interval: Duration,
}

fn stateless_check(tx: &Transaction) -> Result<(), LedgerError> {
    let fail = |reason: &str| Err(LedgerError::Stateless(reason.to_string()));
    if tx.signatures.is_empty() {
        return fail("transaction is not signed");
    }
    if tx.verify_signatures().is_err() {
        return fail("bad signature");
    }
    if tx.payload.commands.is_empty() {
        return fail("transaction has no commands");
    }
    if tx.payload.quorum == 0 || tx.payload.quorum as usize > tx.signatures.len() {
        return fail("quorum not met by attached signatures");
    }
    for command in &tx.payload.commands {
        command
            .validate_stateless()
            .map_err(|reason| LedgerError::Stateless(format!("{}: {}", command.name(), reason)))?;
    }
    Ok(())
}

impl Shared {
    fn submit(&self, node: usize, tx: &Transaction) -> Hash {
        let hash = tx.hash();
        let mut state = self.state.lock();

        // Known transactions are acknowledged again but never re-applied
        if state.statuses.contains_key(&hash) {
            debug!("node {} got replay of {}", node, hash);
            return hash;
        }

        let history = match stateless_check(tx) {
            Ok(()) => {
                state.queue.push_back(tx.clone());
                vec![
                    StatusReport::new(TxStatus::StatelessValidationSuccess),
                    StatusReport::new(TxStatus::EnoughSignaturesCollected),
                ]
            }
            Err(e) => {
                debug!("node {} rejected {} statelessly: {}", node, hash, e);
                vec![StatusReport::failed(
                    TxStatus::StatelessValidationFailed,
                    e.code(),
                    e.to_string(),
                )]
            }
        };
        state.statuses.insert(hash, history);
        hash
    }

    fn status_at(&self, hash: &Hash, position: usize) -> StatusLookup {
        let state = self.state.lock();
        match state.statuses.get(hash) {
            None => StatusLookup::Unknown,
            Some(history) => match history.get(position) {
                Some(report) => StatusLookup::Found(report.clone()),
                None => StatusLookup::Pending,
            },
        }
    }

    // Poll style lookup for gateways: order what is pending, then report
    // the most recent status
    fn latest_status(&self, hash: &Hash) -> StatusReport {
        self.run_round();
        self.state
            .lock()
            .statuses
            .get(hash)
            .and_then(|history| history.last().cloned())
            .unwrap_or_else(|| StatusReport::new(TxStatus::NotReceived))
    }

    /// Drain the ordering queue into one block.
    fn run_round(&self) {
        let mut guard = self.state.lock();
        if guard.queue.is_empty() {
            return;
        }

        let state = &mut *guard;
        let mut committed = Vec::new();
        let mut rejected = Vec::new();
        while let Some(tx) = state.queue.pop_front() {
            let hash = tx.hash();
            let mut next = state.world.clone();
            let reports = match next.apply_transaction(&tx) {
                Ok(()) => {
                    state.world = next;
                    committed.push(tx);
                    [
                        StatusReport::new(TxStatus::StatefulValidationSuccess),
                        StatusReport::new(TxStatus::Committed),
                    ]
                }
                Err(e) => {
                    debug!("{} rejected: {}", hash, e);
                    rejected.push(hash);
                    [
                        StatusReport::failed(
                            TxStatus::StatefulValidationFailed,
                            e.code(),
                            e.to_string(),
                        ),
                        StatusReport::new(TxStatus::Rejected),
                    ]
                }
            };
            state.statuses.entry(hash).or_default().extend(reports);
        }

        let (height, prev_hash) = match state.chain.last() {
            Some(tip) => (tip.height + 1, tip.hash()),
            None => (GENESIS_HEIGHT, Hash::zero()),
        };
        trace!(
            "block {}: {} committed, {} rejected",
            height,
            committed.len(),
            rejected.len()
        );
        state.chain.push(Block {
            height,
            prev_hash,
            created_time: get_current_time_in_millis(),
            transactions: committed,
            rejected_hashes: rejected,
        });
    }

    fn query(&self, query: &SignedQuery) -> QueryResponse {
        self.state.lock().world.query(query)
    }

    fn block(&self, height: u64) -> Option<Block> {
        let index = height.checked_sub(GENESIS_HEIGHT)?;
        self.state.lock().chain.get(index as usize).cloned()
    }
}

pub struct LocalNetworkBuilder {
    node_count: usize,
    admin_key: Option<PublicKey>,
    tcp_listeners: bool,
    round_interval: Duration,
}

impl Default for LocalNetworkBuilder {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            admin_key: None,
            tcp_listeners: false,
            round_interval: DEFAULT_ROUND_INTERVAL,
        }
    }
}

impl LocalNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    /// Key of the genesis administrator `admin@test`. Required.
    pub fn with_admin_key(mut self, key: PublicKey) -> Self {
        self.admin_key = Some(key);
        self
    }

    /// Bind an accept-and-drop TCP listener per node on `127.0.0.1:0`, so
    /// that reachability checks have a real port to connect to.
    pub fn with_tcp_listeners(mut self, enabled: bool) -> Self {
        self.tcp_listeners = enabled;
        self
    }

    pub fn with_round_interval(mut self, interval: Duration) -> Self {
        self.round_interval = interval;
        self
    }

    pub async fn build(self) -> Result<LocalNetwork> {
        if self.node_count == 0 {
            anyhow::bail!("A network needs at least one node");
        }
        let admin_key = self
            .admin_key
            .context("The genesis administrator key is not set")?;
        let world = WorldState::genesis(admin_key).context("Failed to build genesis state")?;

        let shared = Arc::new(Shared {
            state: Mutex::new(LedgerState {
                world,
                chain: vec![Block::genesis(get_current_time_in_millis())],
                statuses: HashMap::new(),
                queue: VecDeque::new(),
            }),
            round_interval: self.round_interval,
        });

        let mut nodes = Vec::with_capacity(self.node_count);
        let mut listeners = Vec::new();
        for index in 0..self.node_count {
            let endpoint = if self.tcp_listeners {
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .context("Failed to bind node listener")?;
                let addr = listener.local_addr()?;
                listeners.push(tokio::spawn(accept_and_drop(listener)));
                NodeEndpoint::new(addr.ip().to_string(), addr.port())
            } else {
                NodeEndpoint::new("127.0.0.1", FIRST_VIRTUAL_PORT + index as u16)
            };
            nodes.push(Arc::new(LocalNode::new(index, endpoint, shared.clone())));
        }

        info!("Local network of {} nodes ready", nodes.len());
        Ok(LocalNetwork {
            shared,
            nodes,
            listeners,
        })
    }
}

async fn accept_and_drop(listener: TcpListener) {
    while let Ok((socket, peer)) = listener.accept().await {
        trace!("connection from {}", peer);
        drop(socket);
    }
}

pub struct LocalNetwork {
    shared: Arc<Shared>,
    nodes: Vec<Arc<LocalNode>>,
    listeners: Vec<JoinHandle<()>>,
}

impl LocalNetwork {
    pub fn builder() -> LocalNetworkBuilder {
        LocalNetworkBuilder::new()
    }

    pub fn node(&self, index: usize) -> Option<&Arc<LocalNode>> {
        self.nodes.get(index)
    }

    /// Node handles as the scenarios see them.
    pub fn clients(&self) -> Vec<Arc<dyn NodeClient>> {
        self.nodes
            .iter()
            .map(|node| node.clone() as Arc<dyn NodeClient>)
            .collect()
    }

    pub fn endpoints(&self) -> Vec<NodeEndpoint> {
        self.nodes.iter().map(|node| node.endpoint().clone()).collect()
    }

    pub fn height(&self) -> u64 {
        self.shared
            .state
            .lock()
            .chain
            .last()
            .map_or(0, |tip| tip.height)
    }

    pub fn balance(&self, account: &AccountId, asset: &AssetId) -> Option<Amount> {
        self.shared.state.lock().world.balance(account, asset)
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.shared.state.lock().world.has_role(role)
    }

    pub fn has_account(&self, account: &AccountId) -> bool {
        self.shared.state.lock().world.has_account(account)
    }

    /// Whether `hash` was committed in some block.
    pub fn is_committed(&self, hash: &Hash) -> bool {
        self.shared
            .state
            .lock()
            .chain
            .iter()
            .any(|block| block.transactions.iter().any(|tx| tx.hash() == *hash))
    }

    /// Order whatever is queued without waiting for a status stream.
    pub fn run_round(&self) {
        self.shared.run_round();
    }
}

impl Drop for LocalNetwork {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{collect_statuses, send_transaction};
    use multinode_common::{
        config::ADMIN_ACCOUNT_ID,
        crypto::KeyPair,
        transaction::{Command, TransactionBuilder},
    };

    async fn network(admin: &KeyPair) -> LocalNetwork {
        LocalNetwork::builder()
            .with_admin_key(admin.public_key())
            .build()
            .await
            .unwrap()
    }

    fn create_domain(admin: &KeyPair, name: &str) -> Transaction {
        TransactionBuilder::new(ADMIN_ACCOUNT_ID.parse().unwrap())
            .command(Command::CreateDomain {
                domain_id: name.parse().unwrap(),
                default_role: "user".parse().unwrap(),
            })
            .build()
            .sign(admin)
    }

    #[tokio::test]
    async fn test_commit_reports_full_history() {
        let admin = KeyPair::generate();
        let network = network(&admin).await;
        let node = network.node(0).unwrap();

        let tx = create_domain(&admin, "probe");
        let hash = node.send_tx(&tx).await.unwrap();
        let statuses: Vec<TxStatus> = collect_statuses(node.as_ref(), &hash)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                TxStatus::StatelessValidationSuccess,
                TxStatus::EnoughSignaturesCollected,
                TxStatus::StatefulValidationSuccess,
                TxStatus::Committed,
            ]
        );
        assert_eq!(network.height(), 2);
    }

    #[tokio::test]
    async fn test_replay_is_not_reapplied() {
        let admin = KeyPair::generate();
        let network = network(&admin).await;
        let tx = create_domain(&admin, "probe");

        let first = send_transaction(network.node(0).unwrap().as_ref(), &tx).await.unwrap();
        let again = send_transaction(network.node(3).unwrap().as_ref(), &tx).await.unwrap();
        assert_eq!(first.status, TxStatus::Committed);
        assert_eq!(again, first);
        // A second application would have failed with "already exists"
        // and produced another block
        assert_eq!(network.height(), 2);
    }

    #[tokio::test]
    async fn test_unknown_hash_is_not_received() {
        let admin = KeyPair::generate();
        let network = network(&admin).await;
        let node = network.node(1).unwrap();
        let statuses = collect_statuses(node.as_ref(), &Hash::zero()).await.unwrap();
        assert_eq!(statuses, vec![StatusReport::new(TxStatus::NotReceived)]);
    }

    #[tokio::test]
    async fn test_unsigned_transaction_fails_statelessly() {
        let admin = KeyPair::generate();
        let network = network(&admin).await;
        let tx = TransactionBuilder::new(ADMIN_ACCOUNT_ID.parse().unwrap())
            .command(Command::CreateDomain {
                domain_id: "probe".parse().unwrap(),
                default_role: "user".parse().unwrap(),
            })
            .build();
        let report = send_transaction(network.node(0).unwrap().as_ref(), &tx).await.unwrap();
        assert_eq!(report.status, TxStatus::StatelessValidationFailed);
        assert_eq!(network.height(), 1);
    }

    #[tokio::test]
    async fn test_blocks_are_linked() {
        let admin = KeyPair::generate();
        let network = network(&admin).await;
        let node = network.node(2).unwrap();
        send_transaction(node.as_ref(), &create_domain(&admin, "one")).await.unwrap();
        send_transaction(node.as_ref(), &create_domain(&admin, "two")).await.unwrap();

        let genesis = node.get_block(1).await.unwrap().unwrap();
        let second = node.get_block(2).await.unwrap().unwrap();
        let third = node.get_block(3).await.unwrap().unwrap();
        assert_eq!(second.prev_hash, genesis.hash());
        assert_eq!(third.prev_hash, second.hash());
        assert!(node.get_block(4).await.unwrap().is_none());
        assert!(node.get_block(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listeners_accept_connections() {
        let admin = KeyPair::generate();
        let network = LocalNetwork::builder()
            .with_nodes(2)
            .with_admin_key(admin.public_key())
            .with_tcp_listeners(true)
            .build()
            .await
            .unwrap();
        for endpoint in network.endpoints() {
            tokio::net::TcpStream::connect((endpoint.host.as_str(), endpoint.port))
                .await
                .unwrap();
        }
    }
}
