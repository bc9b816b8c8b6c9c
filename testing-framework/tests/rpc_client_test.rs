//! JSON-RPC client against an actix-web gateway in front of an in-process
//! node.

use std::sync::Arc;

use multinode_common::{
    config::ADMIN_ACCOUNT_ID,
    query::SignedQuery,
    rpc::{
        HeightParams, RpcRequest, RpcResponse, SendQueryParams, SendTransactionParams,
        TxHashParams, METHOD_GET_BLOCK, METHOD_GET_TRANSACTION_STATUS, METHOD_SEND_QUERY,
        METHOD_SEND_TRANSACTION,
    },
};
use multinode_testing_framework::{
    client::{collect_statuses, ClientError, RpcClientConfig},
    network::LocalNode,
    prelude::*,
};
use actix_web::{dev::ServerHandle, web, App, HttpResponse, HttpServer};
use serde_json::Value;

fn params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, (i32, String)> {
    serde_json::from_value(value).map_err(|e| (-32602, e.to_string()))
}

async fn handle(node: &LocalNode, method: &str, value: Value) -> Result<Value, (i32, String)> {
    let result = match method {
        METHOD_SEND_TRANSACTION => {
            let p: SendTransactionParams = params(value)?;
            let hash = node
                .send_tx(&p.transaction)
                .await
                .map_err(|e| (-32000, e.to_string()))?;
            serde_json::to_value(hash)
        }
        METHOD_GET_TRANSACTION_STATUS => {
            let p: TxHashParams = params(value)?;
            serde_json::to_value(node.latest_status(&p.hash))
        }
        METHOD_SEND_QUERY => {
            let p: SendQueryParams = params(value)?;
            let response = node
                .send_query(&p.query)
                .await
                .map_err(|e| (-32000, e.to_string()))?;
            serde_json::to_value(response)
        }
        METHOD_GET_BLOCK => {
            let p: HeightParams = params(value)?;
            let block = node
                .get_block(p.height)
                .await
                .map_err(|e| (-32000, e.to_string()))?;
            serde_json::to_value(block)
        }
        _ => return Err((-32601, "Method not found".to_string())),
    };
    result.map_err(|e| (-32603, e.to_string()))
}

async fn dispatch(node: &LocalNode, request: RpcRequest) -> RpcResponse {
    match handle(node, &request.method, request.params).await {
        Ok(value) => RpcResponse::success(request.id, value),
        Err((code, message)) => RpcResponse::failure(request.id, code, message),
    }
}

async fn json_rpc(node: web::Data<LocalNode>, body: web::Bytes) -> HttpResponse {
    let response = match serde_json::from_slice::<RpcRequest>(&body) {
        Ok(request) => dispatch(&node, request).await,
        Err(e) => RpcResponse::failure(0, -32700, e.to_string()),
    };
    HttpResponse::Ok().json(response)
}

struct Gateway {
    // Keeps the ledger alive
    _network: LocalNetwork,
    handle: ServerHandle,
    admin: KeyPair,
    client: RpcNodeClient,
}

impl Drop for Gateway {
    fn drop(&mut self) {
        // Stopping is asynchronous, the server winds down on its own
        drop(self.handle.stop(false));
    }
}

async fn gateway() -> Gateway {
    let admin = KeyPair::generate();
    let network = LocalNetwork::builder()
        .with_nodes(1)
        .with_admin_key(admin.public_key())
        .build()
        .await
        .unwrap();
    let node = network.node(0).unwrap().clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(Arc::clone(&node)))
            .route("/json_rpc", web::post().to(json_rpc))
    })
    .disable_signals()
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let port = server.addrs()[0].port();
    let http_server = server.run();
    let handle = http_server.handle();
    tokio::spawn(http_server);

    let config = RpcClientConfig {
        status_poll_interval: Duration::from_millis(20),
        not_received_grace: Duration::from_millis(100),
        ..Default::default()
    };
    let client = RpcNodeClient::with_config(NodeEndpoint::new("127.0.0.1", port), config).unwrap();
    Gateway {
        _network: network,
        handle,
        admin,
        client,
    }
}

fn create_domain(admin: &KeyPair, domain: &str) -> Transaction {
    TransactionBuilder::new(ADMIN_ACCOUNT_ID.parse().unwrap())
        .command(Command::CreateDomain {
            domain_id: domain.parse().unwrap(),
            default_role: "user".parse().unwrap(),
        })
        .build()
        .sign(admin)
}

#[tokio::test]
async fn test_transaction_lifecycle_over_rpc() {
    let gateway = gateway().await;
    let tx = create_domain(&gateway.admin, "probe");

    let hash = gateway.client.send_tx(&tx).await.unwrap();
    assert_eq!(hash, tx.hash());

    let history = collect_statuses(&gateway.client, &hash).await.unwrap();
    assert_eq!(history.last().unwrap().status, TxStatus::Committed);
    // Each reported status differs from the one before
    for pair in history.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }

    let block = gateway.client.get_block(2).await.unwrap().unwrap();
    assert_eq!(block.transactions, vec![tx]);
    assert!(gateway.client.get_block(3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejection_over_rpc() {
    let gateway = gateway().await;
    let tx = create_domain(&gateway.admin, "probe");
    send_transaction(&gateway.client, &tx).await.unwrap();

    // Same domain again, different creation time
    let again = create_domain(&gateway.admin, "probe");
    let status = send_transaction(&gateway.client, &again).await.unwrap();
    assert_eq!(status.status, TxStatus::Rejected);
}

#[tokio::test]
async fn test_query_over_rpc() {
    let gateway = gateway().await;
    let admin_id: AccountId = ADMIN_ACCOUNT_ID.parse().unwrap();
    let query = SignedQuery::new(
        admin_id.clone(),
        1,
        Query::GetAccountAssets {
            account_id: admin_id,
        },
        &gateway.admin,
    );
    let response = gateway.client.send_query(&query).await.unwrap();
    assert_eq!(response.to_string(), "[]");
}

#[tokio::test]
async fn test_unknown_transaction_is_not_received() {
    let gateway = gateway().await;
    let history = collect_statuses(&gateway.client, &Hash::zero()).await.unwrap();
    assert_eq!(history, vec![StatusReport::new(TxStatus::NotReceived)]);
}

#[tokio::test]
async fn test_unknown_method_is_an_rpc_error() {
    let gateway = gateway().await;
    let http = reqwest::Client::new();
    let response: RpcResponse = http
        .post(gateway.client.url().clone())
        .json(&RpcRequest::new(9, "get_peers", Value::Null))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response.id, 9);
    assert_eq!(response.error.unwrap().code, -32601);

    // Only the JSON-RPC path is served
    let status = http
        .post(gateway.client.url().join("/wrong_path").unwrap())
        .json(&RpcRequest::new(10, METHOD_GET_BLOCK, Value::Null))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 404);

    // Typed surface of the same failure
    let error = ClientError::Rpc {
        code: -32601,
        message: "Method not found".to_string(),
    };
    assert_eq!(error.to_string(), "RPC error -32601: Method not found");
}
