//! Signed mutation path. Every action carries the sub-account as its
//! routing attribute; account state is never queried from here.

use async_trait::async_trait;
use ethers::types::Address;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::domain::{OrderRequest, PlacementAck};
use crate::error::Result;
use crate::signing::{sign_l1_action, NonceClock, SignatureWire, Wallet};
use crate::venue::http::VenueHttp;
use crate::venue::meta::AssetDirectory;
use crate::venue::traits::OrderGateway;
use crate::venue::wire::{
    order_wire, parse_cancel_response, parse_order_response, CancelAction, OrderAction,
};

/// Body of `POST /exchange`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePayload<A: Serialize> {
    pub action: A,
    pub nonce: u64,
    pub signature: SignatureWire,
    pub vault_address: String,
}

/// Sign `action` and wrap it for submission on behalf of `vault`.
pub fn signed_payload<A: Serialize>(
    wallet: &Wallet,
    action: A,
    nonce: u64,
    vault: Address,
) -> Result<ExchangePayload<A>> {
    let signature = sign_l1_action(wallet, &action, nonce, Some(vault))?;
    Ok(ExchangePayload {
        action,
        nonce,
        signature,
        vault_address: format!("{:?}", vault),
    })
}

/// Connectivity handle for one trader's sub-account
pub struct HyperliquidGateway {
    http: VenueHttp,
    signer: Wallet,
    vault: Address,
    nonces: Arc<NonceClock>,
    assets: AssetDirectory,
}

impl HyperliquidGateway {
    pub fn new(
        http: VenueHttp,
        signer: Wallet,
        vault: Address,
        nonces: Arc<NonceClock>,
        assets: AssetDirectory,
    ) -> Self {
        Self {
            http,
            signer,
            vault,
            nonces,
            assets,
        }
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn post_action<A: Serialize>(&self, action: A) -> Result<Value> {
        let payload = signed_payload(&self.signer, action, self.nonces.next(), self.vault)?;
        self.http.post_json("/exchange", &payload).await
    }
}

impl std::fmt::Debug for HyperliquidGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidGateway")
            .field("signer", &self.signer.address())
            .field("vault", &self.vault)
            .field("assets", &self.assets.len())
            .finish()
    }
}

#[async_trait]
impl OrderGateway for HyperliquidGateway {
    fn routing_address(&self) -> Address {
        self.vault
    }

    fn is_listed(&self, symbol: &str) -> bool {
        self.assets.get(symbol).is_some()
    }

    #[instrument(skip(self, request), fields(symbol = %request.symbol, side = %request.side, cloid = %request.client_order_id))]
    async fn submit(&self, request: &OrderRequest) -> Result<PlacementAck> {
        let asset = self.assets.require(&request.symbol)?;
        let wire = order_wire(request, asset)?;
        debug!("Submitting order {:?}", wire);

        let body = self.post_action(OrderAction::single(wire)).await?;
        let ack = parse_order_response(&body)?;
        info!("Order accepted: {}", ack);
        Ok(ack)
    }

    #[instrument(skip(self))]
    async fn cancel(&self, symbol: &str, order_id: u64) -> Result<()> {
        let asset = self.assets.require(symbol)?;
        let body = self
            .post_action(CancelAction::single(asset.index, order_id))
            .await?;
        parse_cancel_response(&body)?;
        info!("Canceled order {} on {}", order_id, symbol);
        Ok(())
    }
}
