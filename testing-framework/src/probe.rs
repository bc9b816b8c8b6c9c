// Submit two conflicting transactions to two nodes at once and see how the
// network settles them.

use anyhow::{Context, Result};
use futures::future::try_join;
use log::debug;

use multinode_common::transaction::{StatusReport, Transaction, TxStatus};

use crate::client::{collect_statuses, NodeClient};

/// Final statuses of the two transactions, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualSubmissionOutcome {
    pub first: StatusReport,
    pub second: StatusReport,
}

impl DualSubmissionOutcome {
    /// One of the two committed and the other was rejected, in either order.
    pub fn exactly_one_committed(&self) -> bool {
        let mut statuses = [self.first.status, self.second.status];
        statuses.sort_by_key(|status| status.as_str());
        statuses == [TxStatus::Committed, TxStatus::Rejected]
    }
}

/// Send `first` to `node_a` and `second` to `node_b` back to back, then
/// follow both status streams to the end concurrently.
pub async fn submit_concurrently(
    node_a: &dyn NodeClient,
    first: &Transaction,
    node_b: &dyn NodeClient,
    second: &Transaction,
) -> Result<DualSubmissionOutcome> {
    debug!("Transaction hash = {}, creator = {}", first.hash(), first.creator());
    debug!("Transaction hash = {}, creator = {}", second.hash(), second.creator());

    let hash_a = node_a
        .send_tx(first)
        .await
        .with_context(|| format!("Failed to send first transaction to {}", node_a.endpoint()))?;
    let hash_b = node_b
        .send_tx(second)
        .await
        .with_context(|| format!("Failed to send second transaction to {}", node_b.endpoint()))?;

    let (history_a, history_b) = try_join(
        collect_statuses(node_a, &hash_a),
        collect_statuses(node_b, &hash_b),
    )
    .await?;

    let last = |history: Vec<StatusReport>, hash| {
        history
            .into_iter()
            .last()
            .with_context(|| format!("No status reported for {}", hash))
    };
    Ok(DualSubmissionOutcome {
        first: last(history_a, hash_a)?,
        second: last(history_b, hash_b)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(first: TxStatus, second: TxStatus) -> DualSubmissionOutcome {
        DualSubmissionOutcome {
            first: StatusReport::new(first),
            second: StatusReport::new(second),
        }
    }

    #[test]
    fn test_exactly_one_committed() {
        assert!(outcome(TxStatus::Committed, TxStatus::Rejected).exactly_one_committed());
        assert!(outcome(TxStatus::Rejected, TxStatus::Committed).exactly_one_committed());
        assert!(!outcome(TxStatus::Committed, TxStatus::Committed).exactly_one_committed());
        assert!(!outcome(TxStatus::Rejected, TxStatus::Rejected).exactly_one_committed());
        assert!(
            !outcome(TxStatus::Committed, TxStatus::StatelessValidationFailed)
                .exactly_one_committed()
        );
    }
}
