// src/connection.rs
use std::sync::{Arc, Weak};

use ethers::types::Address;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{AddChainParams, MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::provider::{ChainId, EventStream, Wallet};

pub const NOT_INSTALLED_MESSAGE: &str = "MetaMask not detected. Please install MetaMask.";
pub const CONNECTION_CANCELLED_MESSAGE: &str = "Connection cancelled by user";

/// Testnet iff the lower-cased hex id is Sepolia's. Everything else counts as mainnet.
pub fn is_testnet_chain(chain_id: &ChainId) -> bool {
    chain_id.to_hex_lower() == SEPOLIA_CHAIN_ID
}

/// Notifications delivered to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// `partial` is set when the user declined the requested chain switch and
    /// the connection landed on whatever chain the wallet was already on.
    Connected {
        account: Address,
        is_testnet: bool,
        partial: bool,
    },
    AccountChanged(Address),
    ChainChanged {
        is_testnet: bool,
    },
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Idle,
    Connected {
        account: Address,
        chain_id: ChainId,
        is_testnet: bool,
    },
    Disconnected,
}

/// Snapshot of what the connector knows about the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletConnection {
    pub accounts: Vec<Address>,
    pub chain_id: Option<ChainId>,
    pub is_testnet: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Uninitialized,
    Idle,
    Connected,
    Disconnected,
}

#[derive(Debug, Default)]
struct Session {
    phase: Phase,
    connection: WalletConnection,
}

/// The live chain/accounts listener pair. Dropping it stops the event pump.
struct Subscription {
    pump: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

struct Inner {
    wallet: Wallet,
    notifier: mpsc::UnboundedSender<ConnectionEvent>,
    session: Mutex<Session>,
    subscription: Mutex<Option<Subscription>>,
}

/// Connection state machine over a [`Wallet`].
///
/// Failures during setup are reported as [`ConnectionEvent::Error`] on the
/// notifier rather than returned, since the UI drives these flows in the
/// background.
#[derive(Clone)]
pub struct WalletConnector {
    inner: Arc<Inner>,
}

impl WalletConnector {
    pub fn new(wallet: Wallet, notifier: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            inner: Arc::new(Inner {
                wallet,
                notifier,
                session: Mutex::new(Session::default()),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.inner.wallet
    }

    pub async fn connection(&self) -> WalletConnection {
        self.inner.session.lock().await.connection.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        let session = self.inner.session.lock().await;
        match session.phase {
            Phase::Uninitialized => ConnectionState::Uninitialized,
            Phase::Idle => ConnectionState::Idle,
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connected => {
                let connection = &session.connection;
                match (connection.accounts.first(), &connection.chain_id) {
                    (Some(account), Some(chain_id)) => ConnectionState::Connected {
                        account: *account,
                        chain_id: chain_id.clone(),
                        is_testnet: connection.is_testnet,
                    },
                    _ => ConnectionState::Idle,
                }
            }
        }
    }

    pub async fn is_subscribed(&self) -> bool {
        self.inner.subscription.lock().await.is_some()
    }

    pub async fn initialize(&self) {
        self.inner.initialize().await
    }

    pub async fn connect(&self, want_testnet: bool) {
        self.inner.connect(want_testnet).await
    }

    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }
}

impl Inner {
    fn notify(&self, event: ConnectionEvent) {
        if self.notifier.send(event).is_err() {
            debug!("connection notifier closed");
        }
    }

    async fn initialize(self: &Arc<Self>) {
        if !self.wallet.is_installed() {
            error!("{}", NOT_INSTALLED_MESSAGE);
            self.notify(ConnectionEvent::Error(NOT_INSTALLED_MESSAGE.to_string()));
            return;
        }

        if let Err(err) = self.subscribe().await {
            self.notify(ConnectionEvent::Error(format!(
                "Error checking connection: {}",
                err
            )));
            return;
        }

        {
            let mut session = self.session.lock().await;
            if session.phase != Phase::Connected {
                session.phase = Phase::Idle;
            }
        }

        match self.read_existing_connection().await {
            Ok(Some((accounts, chain_id))) => {
                let event = self.mark_connected(accounts, chain_id, false).await;
                self.notify(event);
            }
            Ok(None) => debug!("no previously authorized accounts"),
            Err(err) => {
                warn!("Error checking connection: {}", err);
                self.notify(ConnectionEvent::Error(format!(
                    "Error checking connection: {}",
                    err
                )));
            }
        }
    }

    async fn read_existing_connection(
        &self,
    ) -> Result<Option<(Vec<Address>, ChainId)>, ProviderError> {
        let accounts = self.wallet.get_accounts().await?;
        if accounts.is_empty() {
            return Ok(None);
        }
        let chain_id = self.wallet.get_chain_id().await?;
        Ok(Some((accounts, chain_id)))
    }

    /// Registers one chain/accounts listener pair, releasing any previous pair first.
    async fn subscribe(self: &Arc<Self>) -> Result<(), ProviderError> {
        let mut slot = self.subscription.lock().await;
        if slot.take().is_some() {
            debug!("releasing previous provider subscription");
            self.wallet.remove_all_listeners();
        }

        let chain_events = self.wallet.on_chain_changed()?;
        let account_events = match self.wallet.on_accounts_changed() {
            Ok(stream) => stream,
            Err(err) => {
                self.wallet.remove_all_listeners();
                return Err(err);
            }
        };

        let pump = tokio::spawn(pump_events(
            Arc::downgrade(self),
            chain_events,
            account_events,
        ));
        *slot = Some(Subscription { pump });
        Ok(())
    }

    async fn connect(&self, want_testnet: bool) {
        if let Err(err) = self.try_connect(want_testnet).await {
            let message = if err.is_user_rejection() {
                CONNECTION_CANCELLED_MESSAGE.to_string()
            } else {
                format!("Connection failed: {}", err)
            };
            warn!("{}", message);
            self.notify(ConnectionEvent::Error(message));
        }
    }

    async fn try_connect(&self, want_testnet: bool) -> Result<(), ProviderError> {
        self.wallet.request_accounts().await?;

        let current = self.wallet.get_chain_id().await?;
        let desired = if want_testnet {
            SEPOLIA_CHAIN_ID
        } else {
            MAINNET_CHAIN_ID
        };

        if current.to_hex_lower() != desired {
            info!("Switching wallet from chain {} to {}", current, desired);
            if let Err(err) = self.wallet.switch_chain(desired).await {
                match err.kind {
                    ProviderErrorKind::ChainUnregistered if want_testnet => {
                        info!("Chain {} unknown to wallet, registering Sepolia", desired);
                        self.wallet.add_chain(&AddChainParams::sepolia()).await?;
                    }
                    ProviderErrorKind::UserRejected => {
                        info!("Chain switch declined, staying on the current chain");
                        let chain_id = self.wallet.get_chain_id().await?;
                        let accounts = self.wallet.get_accounts().await?;
                        return self.report_connected(accounts, chain_id, true).await;
                    }
                    _ => warn!("Chain switch to {} failed: {}", desired, err),
                }
            }
        }

        let chain_id = self.wallet.get_chain_id().await?;
        let accounts = self.wallet.get_accounts().await?;
        self.report_connected(accounts, chain_id, false).await
    }

    async fn report_connected(
        &self,
        accounts: Vec<Address>,
        chain_id: ChainId,
        partial: bool,
    ) -> Result<(), ProviderError> {
        if accounts.is_empty() {
            return Err(ProviderError::invalid_response(
                "eth_accounts",
                "no authorized accounts",
            ));
        }
        let event = self.mark_connected(accounts, chain_id, partial).await;
        self.notify(event);
        Ok(())
    }

    async fn mark_connected(
        &self,
        accounts: Vec<Address>,
        chain_id: ChainId,
        partial: bool,
    ) -> ConnectionEvent {
        let is_testnet = is_testnet_chain(&chain_id);
        let account = accounts[0];
        info!(
            "Connected {:?} on {} (testnet: {})",
            account, chain_id, is_testnet
        );

        let mut session = self.session.lock().await;
        session.phase = Phase::Connected;
        session.connection = WalletConnection {
            accounts,
            chain_id: Some(chain_id),
            is_testnet,
            connected: true,
        };

        ConnectionEvent::Connected {
            account,
            is_testnet,
            partial,
        }
    }

    async fn disconnect(&self) {
        if let Err(err) = self.wallet.revoke_permissions().await {
            debug!("permission revocation failed: {}", err);
        }

        // The pump may be the caller; keep it alive until state is settled.
        let subscription = self.subscription.lock().await.take();
        self.wallet.remove_all_listeners();

        {
            let mut session = self.session.lock().await;
            session.phase = Phase::Disconnected;
            session.connection = WalletConnection::default();
        }

        info!("Wallet disconnected");
        self.notify(ConnectionEvent::Disconnected);
        drop(subscription);
    }

    async fn on_chain_changed(&self, payload: Value) {
        let chain_id: ChainId = match serde_json::from_value(payload) {
            Ok(chain_id) => chain_id,
            Err(err) => {
                warn!("ignoring malformed chainChanged payload: {}", err);
                return;
            }
        };
        let is_testnet = is_testnet_chain(&chain_id);
        debug!("chain changed to {} (testnet: {})", chain_id, is_testnet);

        {
            let mut session = self.session.lock().await;
            session.connection.chain_id = Some(chain_id);
            session.connection.is_testnet = is_testnet;
        }
        self.notify(ConnectionEvent::ChainChanged { is_testnet });
    }

    /// Returns false once the accounts list empties and the connection is torn down.
    async fn on_accounts_changed(&self, payload: Value) -> bool {
        let accounts: Vec<Address> = match serde_json::from_value(payload) {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!("ignoring malformed accountsChanged payload: {}", err);
                return true;
            }
        };

        match accounts.first().copied() {
            Some(account) => {
                debug!("primary account changed to {:?}", account);
                self.session.lock().await.connection.accounts = accounts;
                self.notify(ConnectionEvent::AccountChanged(account));
                true
            }
            None => {
                info!("All accounts revoked by wallet");
                self.disconnect().await;
                false
            }
        }
    }
}

async fn pump_events(
    inner: Weak<Inner>,
    mut chain_events: EventStream,
    mut account_events: EventStream,
) {
    loop {
        tokio::select! {
            Some(payload) = chain_events.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.on_chain_changed(payload).await;
            }
            Some(payload) = account_events.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                if !inner.on_accounts_changed(payload).await {
                    break;
                }
            }
            else => break,
        }
    }
    debug!("provider event pump stopped");
}
