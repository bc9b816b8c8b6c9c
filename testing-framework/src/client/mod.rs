// Client boundary to the ledger network.
//
// Every scenario talks to a node through `NodeClient`, whether the node is a
// real peer behind its JSON-RPC gateway or a peer of the in-process
// `LocalNetwork`.

pub mod rpc;

pub use rpc::{RpcClientConfig, RpcNodeClient};

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use multinode_common::{
    block::Block,
    crypto::Hash,
    query::{QueryResponse, SignedQuery},
    transaction::{StatusReport, Transaction},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("HTTP error {status} from {endpoint}")]
    Http { endpoint: String, status: u16 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No terminal status for transaction {hash} after {waited:?}")]
    StatusTimeout { hash: Hash, waited: Duration },

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// `host:port` of a node's client port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
}

impl NodeEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for NodeEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("endpoint '{}' is not of the form host:port", s))?;
        if host.is_empty() {
            return Err(format!("endpoint '{}' has an empty host", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("endpoint '{}' has an invalid port: {}", s, e))?;
        Ok(Self::new(host, port))
    }
}

impl Display for NodeEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Serialize for NodeEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeEndpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

pub type StatusStream = BoxStream<'static, Result<StatusReport, ClientError>>;

/// Operations a scenario can perform against one node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Address the node accepts client connections on.
    fn endpoint(&self) -> &NodeEndpoint;

    /// Hand a signed transaction to the node. Returns once the node accepted
    /// it for processing, not once it is final.
    async fn send_tx(&self, tx: &Transaction) -> Result<Hash, ClientError>;

    /// Successive statuses of a transaction, ending with a terminal one.
    async fn tx_status_stream(&self, hash: &Hash) -> Result<StatusStream, ClientError>;

    async fn send_query(&self, query: &SignedQuery) -> Result<QueryResponse, ClientError>;

    /// Block at `height`, or `None` past the tip.
    async fn get_block(&self, height: u64) -> Result<Option<Block>, ClientError>;
}

/// Drain the status stream of `hash`, logging every update.
pub async fn collect_statuses(node: &dyn NodeClient, hash: &Hash) -> Result<Vec<StatusReport>> {
    let mut stream = node
        .tx_status_stream(hash)
        .await
        .with_context(|| format!("Failed to open status stream of {} on {}", hash, node.endpoint()))?;

    let mut statuses = Vec::new();
    while let Some(report) = stream.next().await {
        let report = report.with_context(|| format!("Status stream of {} broke", hash))?;
        debug!("{} @ {}: {}", hash, node.endpoint(), report);
        statuses.push(report);
    }
    Ok(statuses)
}

/// Last status of a stream, the one the transaction settled on.
pub async fn final_status(node: &dyn NodeClient, hash: &Hash) -> Result<StatusReport> {
    collect_statuses(node, hash)
        .await?
        .pop()
        .with_context(|| format!("Node {} reported no status for {}", node.endpoint(), hash))
}

/// Submit `tx` to `node` and wait for its final status.
pub async fn send_transaction(node: &dyn NodeClient, tx: &Transaction) -> Result<StatusReport> {
    debug!("Sending {:?} to {}", tx, node.endpoint());
    let hash = node
        .send_tx(tx)
        .await
        .with_context(|| format!("Failed to send transaction to {}", node.endpoint()))?;
    final_status(node, &hash).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse() {
        let endpoint: NodeEndpoint = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(endpoint, NodeEndpoint::new("127.0.0.1", 50051));
        assert_eq!(endpoint.to_string(), "127.0.0.1:50051");

        assert!("localhost".parse::<NodeEndpoint>().is_err());
        assert!(":50051".parse::<NodeEndpoint>().is_err());
        assert!("localhost:99999".parse::<NodeEndpoint>().is_err());
    }
}
