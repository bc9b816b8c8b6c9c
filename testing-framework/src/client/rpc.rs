use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use log::{debug, trace};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{sleep, Instant};
use url::Url;

use multinode_common::{
    block::Block,
    crypto::Hash,
    query::{QueryResponse, SignedQuery},
    rpc::{
        HeightParams, RpcRequest, RpcResponse, SendQueryParams, SendTransactionParams,
        TxHashParams, JSON_RPC_PATH, METHOD_GET_BLOCK, METHOD_GET_TRANSACTION_STATUS,
        METHOD_SEND_QUERY, METHOD_SEND_TRANSACTION,
    },
    transaction::{StatusReport, Transaction, TxStatus},
};

use super::{ClientError, NodeClient, NodeEndpoint, StatusStream};

/// Timeouts for the node gateway client. Requests are never retried.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub status_poll_interval: Duration,
    // Upper bound on waiting for a terminal status
    pub status_timeout: Duration,
    // A transaction may be reported NOT_RECEIVED right after submission,
    // before the gateway has seen it. Only trust that status after this.
    pub not_received_grace: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            status_poll_interval: Duration::from_millis(200),
            status_timeout: Duration::from_secs(120),
            not_received_grace: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
struct Transport {
    client: Client,
    url: Url,
    endpoint: NodeEndpoint,
    request_timeout: Duration,
}

impl Transport {
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, ClientError> {
        let params = serde_json::to_value(params)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let request = RpcRequest::new(rand::random::<u32>(), method, params);
        trace!("JSON-RPC {} -> {}", method, self.url);

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout {
                        endpoint: self.endpoint.to_string(),
                        timeout: self.request_timeout,
                    }
                } else {
                    ClientError::Connection {
                        endpoint: self.endpoint.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(ClientError::Http {
                endpoint: self.endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        // A missing result is a JSON null, which is what `get_block` returns
        // past the tip
        let result = rpc_response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

/// Client of one node's JSON-RPC gateway at `http://host:port/json_rpc`.
pub struct RpcNodeClient {
    transport: Transport,
    config: RpcClientConfig,
}

impl RpcNodeClient {
    pub fn new(endpoint: NodeEndpoint) -> Result<Self, ClientError> {
        Self::with_config(endpoint, RpcClientConfig::default())
    }

    pub fn with_config(endpoint: NodeEndpoint, config: RpcClientConfig) -> Result<Self, ClientError> {
        let url = Url::parse(&format!("http://{}/", endpoint))?.join(JSON_RPC_PATH)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()
            .map_err(|e| ClientError::Connection {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            transport: Transport {
                client,
                url,
                endpoint,
                request_timeout: config.request_timeout,
            },
            config,
        })
    }

    pub fn url(&self) -> &Url {
        &self.transport.url
    }
}

struct StatusPoller {
    transport: Transport,
    hash: Hash,
    interval: Duration,
    started: Instant,
    timeout: Duration,
    grace: Duration,
    last: Option<StatusReport>,
    finished: bool,
}

impl StatusPoller {
    async fn next_change(&mut self) -> Option<Result<StatusReport, ClientError>> {
        if self.finished {
            return None;
        }

        loop {
            let report: Result<StatusReport, ClientError> = self
                .transport
                .call(METHOD_GET_TRANSACTION_STATUS, TxHashParams { hash: self.hash })
                .await;

            let report = match report {
                Ok(report) => report,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let settled_unknown = report.status == TxStatus::NotReceived
                && self.started.elapsed() >= self.grace;
            let changed = self.last.as_ref() != Some(&report);
            if changed && (report.status != TxStatus::NotReceived || settled_unknown) {
                self.finished = report.status.is_terminal();
                self.last = Some(report.clone());
                return Some(Ok(report));
            }

            if self.started.elapsed() >= self.timeout {
                self.finished = true;
                return Some(Err(ClientError::StatusTimeout {
                    hash: self.hash,
                    waited: self.timeout,
                }));
            }

            sleep(self.interval).await;
        }
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.transport.endpoint
    }

    async fn send_tx(&self, tx: &Transaction) -> Result<Hash, ClientError> {
        let hash: Hash = self
            .transport
            .call(
                METHOD_SEND_TRANSACTION,
                SendTransactionParams {
                    transaction: tx.clone(),
                },
            )
            .await?;

        if hash != tx.hash() {
            return Err(ClientError::InvalidResponse(format!(
                "node acknowledged {} for transaction {}",
                hash,
                tx.hash()
            )));
        }
        debug!("{} accepted transaction {}", self.endpoint(), hash);
        Ok(hash)
    }

    async fn tx_status_stream(&self, hash: &Hash) -> Result<StatusStream, ClientError> {
        let poller = StatusPoller {
            transport: self.transport.clone(),
            hash: *hash,
            interval: self.config.status_poll_interval,
            started: Instant::now(),
            timeout: self.config.status_timeout,
            grace: self.config.not_received_grace,
            last: None,
            finished: false,
        };

        Ok(stream::unfold(poller, |mut poller| async move {
            poller.next_change().await.map(|item| (item, poller))
        })
        .boxed())
    }

    async fn send_query(&self, query: &SignedQuery) -> Result<QueryResponse, ClientError> {
        self.transport
            .call(
                METHOD_SEND_QUERY,
                SendQueryParams {
                    query: query.clone(),
                },
            )
            .await
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, ClientError> {
        self.transport
            .call(METHOD_GET_BLOCK, HeightParams { height })
            .await
    }
}

impl std::fmt::Debug for RpcNodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcNodeClient")
            .field("url", &self.transport.url)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url() {
        let client = RpcNodeClient::new(NodeEndpoint::new("10.0.0.7", 50051)).unwrap();
        assert_eq!(client.url().as_str(), "http://10.0.0.7:50051/json_rpc");
    }

    #[tokio::test]
    async fn test_unreachable_node_reports_connection_error() {
        // Port 9 (discard) is closed on test machines
        let config = RpcClientConfig {
            connection_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let client = RpcNodeClient::with_config(NodeEndpoint::new("127.0.0.1", 9), config).unwrap();
        let result = client.get_block(1).await;
        assert!(matches!(
            result,
            Err(ClientError::Connection { .. }) | Err(ClientError::Timeout { .. })
        ));
    }
}
