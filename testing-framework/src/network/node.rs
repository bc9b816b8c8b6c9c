use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::time::sleep;

use multinode_common::{
    block::Block,
    crypto::Hash,
    query::{QueryResponse, SignedQuery},
    transaction::{StatusReport, Transaction, TxStatus},
};

use super::{Shared, StatusLookup};
use crate::client::{ClientError, NodeClient, NodeEndpoint, StatusStream};

/// One peer of a [`LocalNetwork`](super::LocalNetwork).
///
/// All peers share the same ledger, so a transaction sent to any of them is
/// ordered against transactions sent to the others.
pub struct LocalNode {
    index: usize,
    endpoint: NodeEndpoint,
    shared: Arc<Shared>,
}

impl LocalNode {
    pub(super) fn new(index: usize, endpoint: NodeEndpoint, shared: Arc<Shared>) -> Self {
        Self {
            index,
            endpoint,
            shared,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Most recent status of `hash`, after ordering anything queued.
    pub fn latest_status(&self, hash: &Hash) -> StatusReport {
        self.shared.latest_status(hash)
    }
}

struct StatusCursor {
    shared: Arc<Shared>,
    hash: Hash,
    position: usize,
    round_interval: Duration,
    finished: bool,
}

impl StatusCursor {
    async fn next(&mut self) -> Option<StatusReport> {
        if self.finished {
            return None;
        }

        loop {
            match self.shared.status_at(&self.hash, self.position) {
                StatusLookup::Unknown => {
                    self.finished = true;
                    return Some(StatusReport::new(TxStatus::NotReceived));
                }
                StatusLookup::Found(report) => {
                    self.position += 1;
                    self.finished = report.status.is_terminal();
                    return Some(report);
                }
                StatusLookup::Pending => {
                    sleep(self.round_interval).await;
                    self.shared.run_round();
                }
            }
        }
    }
}

#[async_trait]
impl NodeClient for LocalNode {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    async fn send_tx(&self, tx: &Transaction) -> Result<Hash, ClientError> {
        Ok(self.shared.submit(self.index, tx))
    }

    async fn tx_status_stream(&self, hash: &Hash) -> Result<StatusStream, ClientError> {
        let cursor = StatusCursor {
            shared: self.shared.clone(),
            hash: *hash,
            position: 0,
            round_interval: self.shared.round_interval,
            finished: false,
        };

        Ok(stream::unfold(cursor, |mut cursor| async move {
            cursor.next().await.map(|report| (Ok(report), cursor))
        })
        .boxed())
    }

    async fn send_query(&self, query: &SignedQuery) -> Result<QueryResponse, ClientError> {
        Ok(self.shared.query(query))
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ClientError> {
        Ok(self.shared.block(height))
    }
}
