use crate::{
    account::AccountId,
    config::DEFAULT_QUORUM,
    time::{next_created_time, TimestampMillis},
};

use super::{Command, Transaction, TransactionPayload};

pub struct TransactionBuilder {
    creator: AccountId,
    created_time: Option<TimestampMillis>,
    quorum: u32,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn new(creator: AccountId) -> Self {
        Self {
            creator,
            created_time: None,
            quorum: DEFAULT_QUORUM,
            commands: Vec::new(),
        }
    }

    // Pin the creation time, mostly useful to rebuild a known transaction
    pub fn created_time(mut self, created_time: TimestampMillis) -> Self {
        self.created_time = Some(created_time);
        self
    }

    pub fn quorum(mut self, quorum: u32) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Build the unsigned transaction.
    pub fn build(self) -> Transaction {
        Transaction::unsigned(TransactionPayload {
            creator_account_id: self.creator,
            created_time: self.created_time.unwrap_or_else(next_created_time),
            quorum: self.quorum,
            commands: self.commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_builds_get_distinct_hashes() {
        let creator: AccountId = "admin@test".parse().unwrap();
        let first = TransactionBuilder::new(creator.clone()).build();
        let second = TransactionBuilder::new(creator).build();
        assert_ne!(first.hash(), second.hash());
        assert_eq!(first.payload.quorum, DEFAULT_QUORUM);
    }
}
