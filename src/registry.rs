//! Trader name to sub-account resolution.

use ethers::types::Address;
use futures::future::try_join_all;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::TraderCredentials;
use crate::error::{HypercopyError, Result};
use crate::signing::{NonceClock, Wallet};
use crate::venue::{HyperliquidGateway, InfoClient, OrderGateway, VenueHttp};

/// One followed trader's isolated trading identity
#[derive(Clone)]
pub struct TraderAccount {
    pub trader_name: String,
    pub owner_address: Address,
    /// Address of the signing key; the key itself lives inside the gateway
    pub signer_address: Address,
    pub subaccount_address: Address,
    pub gateway: Arc<dyn OrderGateway>,
}

impl TraderAccount {
    pub fn new(
        trader_name: impl Into<String>,
        owner_address: Address,
        signer_address: Address,
        subaccount_address: Address,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        Self {
            trader_name: trader_name.into(),
            owner_address,
            signer_address,
            subaccount_address,
            gateway,
        }
    }
}

impl std::fmt::Debug for TraderAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraderAccount")
            .field("trader_name", &self.trader_name)
            .field("owner_address", &self.owner_address)
            .field("signer_address", &self.signer_address)
            .field("subaccount_address", &self.subaccount_address)
            .finish_non_exhaustive()
    }
}

/// Process-wide map of followed traders, built once at startup
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: HashMap<String, TraderAccount>,
}

impl AccountRegistry {
    /// Build from ready accounts. Each gateway must route to its account's
    /// sub-account, and trader names must be unique ignoring case.
    pub fn new(accounts: impl IntoIterator<Item = TraderAccount>) -> Result<Self> {
        let mut map = HashMap::new();
        for account in accounts {
            let routed = account.gateway.routing_address();
            if routed != account.subaccount_address {
                return Err(HypercopyError::Internal(format!(
                    "gateway for {} routes to {:?}, expected sub-account {:?}",
                    account.trader_name, routed, account.subaccount_address
                )));
            }
            match map.entry(account.trader_name.trim().to_ascii_lowercase()) {
                Entry::Occupied(_) => {
                    return Err(HypercopyError::Config(::config::ConfigError::Message(format!(
                        "trader {} is configured more than once",
                        account.trader_name
                    ))));
                }
                Entry::Vacant(slot) => {
                    slot.insert(account);
                }
            }
        }
        Ok(Self { accounts: map })
    }

    /// Connect every credential triple concurrently.
    ///
    /// Loading the venue asset directory for each handle doubles as its
    /// liveness check; the first failure aborts startup.
    #[instrument(skip_all, fields(traders = credentials.len()))]
    pub async fn connect(
        credentials: Vec<TraderCredentials>,
        http: VenueHttp,
        nonces: Arc<NonceClock>,
    ) -> Result<Self> {
        let info = InfoClient::new(http.clone());

        let accounts = try_join_all(credentials.into_iter().map(|creds| {
            let info = info.clone();
            let http = http.clone();
            let nonces = nonces.clone();
            async move {
                let signer = Wallet::from_private_key(&creds.private_key)?;
                let assets = info.meta().await.map_err(|e| {
                    HypercopyError::Connection(format!(
                        "liveness check failed for {}: {}",
                        creds.trader, e
                    ))
                })?;
                info!(
                    "Connected {} (slot {}, sub-account {:?}, {} assets)",
                    creds.trader,
                    creds.slot,
                    creds.subaccount_address,
                    assets.len()
                );

                let signer_address = signer.address();
                let gateway = HyperliquidGateway::new(
                    http,
                    signer,
                    creds.subaccount_address,
                    nonces,
                    assets,
                );
                Ok::<_, HypercopyError>(TraderAccount::new(
                    creds.trader.clone(),
                    creds.owner_address,
                    signer_address,
                    creds.subaccount_address,
                    Arc::new(gateway),
                ))
            }
        }))
        .await?;

        Self::new(accounts)
    }

    /// Pure lookup; names match case-insensitively.
    pub fn resolve(&self, trader_name: &str) -> Result<&TraderAccount> {
        self.accounts
            .get(&trader_name.trim().to_ascii_lowercase())
            .ok_or_else(|| HypercopyError::UnknownTrader(trader_name.to_string()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &TraderAccount> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
