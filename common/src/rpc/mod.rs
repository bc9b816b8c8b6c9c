// JSON-RPC 2.0 envelope spoken by node gateways at `/json_rpc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{crypto::Hash, query::SignedQuery, transaction::Transaction};

pub const JSON_RPC_VERSION: &str = "2.0";
pub const JSON_RPC_PATH: &str = "json_rpc";

pub const METHOD_SEND_TRANSACTION: &str = "send_transaction";
pub const METHOD_GET_TRANSACTION_STATUS: &str = "get_transaction_status";
pub const METHOD_SEND_QUERY: &str = "send_query";
pub const METHOD_GET_BLOCK: &str = "get_block";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u32,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u32, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: u32, result: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u32, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTransactionParams {
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxHashParams {
    pub hash: Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendQueryParams {
    pub query: SignedQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightParams {
    pub height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest::new(7, METHOD_GET_BLOCK, json!({ "height": 1 }));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "jsonrpc": "2.0", "id": 7, "method": "get_block", "params": { "height": 1 } })
        );
    }

    #[test]
    fn test_failure_omits_result() {
        let value = serde_json::to_value(RpcResponse::failure(1, -32601, "Method not found")).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32601);
    }
}
