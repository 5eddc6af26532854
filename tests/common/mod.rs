// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use jsonrpsee::core::RpcResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use smart_account_relay::bundler::BundlerApiServer;
use smart_account_relay::provider::{EventStream, ListenerRegistry, ProviderEvent};
use smart_account_relay::user_op::SignedUserOperation;
use smart_account_relay::{ConnectionEvent, Eip1193, ProviderError};

pub const SMART_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const TARGET: &str = "0x2222222222222222222222222222222222222222";
pub const EOA: &str = "0x3333333333333333333333333333333333333333";

pub fn address(value: &str) -> Address {
    value.parse().unwrap()
}

/// Scripted EIP-1193 provider. Each method answers from a queue; the last
/// entry is repeated once the queue drains.
#[derive(Default)]
pub struct FakeProvider {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
    listeners: ListenerRegistry,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: &str, result: Value) -> &Self {
        self.script(method, Ok(result))
    }

    pub fn fail(&self, method: &str, code: i64, message: &str) -> &Self {
        self.script(method, Err(ProviderError::new(code, message)))
    }

    /// Drops whatever was scripted for `method` before queueing `result`.
    pub fn replace(&self, method: &str, result: Result<Value, ProviderError>) -> &Self {
        self.responses.lock().unwrap().remove(method);
        self.script(method, result)
    }

    fn script(&self, method: &str, result: Result<Value, ProviderError>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn emit(&self, event: ProviderEvent, payload: Value) {
        self.listeners.emit(event, payload);
    }

    pub fn listener_count(&self, event: ProviderEvent) -> usize {
        self.listeners.count(event)
    }
}

#[async_trait]
impl Eip1193 for FakeProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(ProviderError::new(
                -32601,
                format!("method {} not scripted", method),
            )),
        }
    }

    fn subscribe(&self, event: ProviderEvent) -> EventStream {
        self.listeners.add(event)
    }

    fn remove_all_listeners(&self, event: ProviderEvent) {
        self.listeners.clear(event);
    }
}

pub fn uint_word(value: u64) -> Value {
    json!(format!("0x{:064x}", value))
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("notifier closed")
}

pub type Received = Arc<Mutex<Vec<(SignedUserOperation, Address)>>>;

pub struct MockBundler {
    received: Received,
    reply: Result<H256, String>,
}

#[async_trait]
impl BundlerApiServer for MockBundler {
    async fn send_user_operation(
        &self,
        user_operation: SignedUserOperation,
        entry_point: Address,
    ) -> RpcResult<H256> {
        self.received
            .lock()
            .unwrap()
            .push((user_operation, entry_point));

        match &self.reply {
            Ok(hash) => Ok(*hash),
            Err(message) => Err(ErrorObjectOwned::owned(-32602, message.clone(), None::<()>)),
        }
    }
}

/// Starts a bundler on an ephemeral port. Keep the handle alive for the test.
pub async fn spawn_bundler(reply: Result<H256, String>) -> (String, ServerHandle, Received) {
    let server = Server::builder().build("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let received = Received::default();
    let handle = server.start(
        MockBundler {
            received: received.clone(),
            reply,
        }
        .into_rpc(),
    );

    (format!("http://{}", addr), handle, received)
}
