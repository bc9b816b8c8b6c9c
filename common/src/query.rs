use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    account::AccountId,
    asset::{render_list, AccountAsset, Asset, AssetId},
    crypto::{Ed25519Error, Hash, Hashable, KeyPair},
    time::{next_created_time, TimestampMillis},
    transaction::SignaturePair,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    GetAccountAssets { account_id: AccountId },
    GetAssetInfo { asset_id: AssetId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub creator_account_id: AccountId,
    pub created_time: TimestampMillis,
    pub counter: u64,
    pub query: Query,
}

impl Hashable for QueryPayload {}

/// Query signed by one of the creator's signatories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedQuery {
    pub payload: QueryPayload,
    pub signature: SignaturePair,
}

impl SignedQuery {
    pub fn new(creator: AccountId, counter: u64, query: Query, keypair: &KeyPair) -> Self {
        let payload = QueryPayload {
            creator_account_id: creator,
            created_time: next_created_time(),
            counter,
            query,
        };
        let signature = SignaturePair::create(keypair, &payload.hash());
        Self { payload, signature }
    }

    pub fn hash(&self) -> Hash {
        self.payload.hash()
    }

    pub fn creator(&self) -> &AccountId {
        &self.payload.creator_account_id
    }

    pub fn verify(&self) -> Result<(), Ed25519Error> {
        self.signature.verify(&self.hash())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryResponse {
    AccountAssets(Vec<AccountAsset>),
    AssetInfo(Asset),
    Error { code: u32, message: String },
}

impl QueryResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResponse::Error { .. })
    }
}

// Text form compared by the scenarios
impl Display for QueryResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryResponse::AccountAssets(assets) => f.write_str(&render_list(assets)),
            QueryResponse::AssetInfo(asset) => write!(f, "{}", asset),
            QueryResponse::Error { code, message } => {
                write!(f, "error_code: {}\nmessage: \"{}\"\n", code, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_query_verifies() {
        let keypair = KeyPair::generate();
        let query = SignedQuery::new(
            "user_a@probe".parse().unwrap(),
            1,
            Query::GetAccountAssets {
                account_id: "user_a@probe".parse().unwrap(),
            },
            &keypair,
        );
        assert!(query.verify().is_ok());

        let mut forged = query.clone();
        forged.payload.counter = 2;
        assert!(forged.verify().is_err());
    }

    #[test]
    fn test_error_response_text() {
        let response = QueryResponse::Error {
            code: 2,
            message: "no permission".into(),
        };
        assert!(response.is_error());
        assert_eq!(
            response.to_string(),
            "error_code: 2\nmessage: \"no permission\"\n"
        );
    }
}
