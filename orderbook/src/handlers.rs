//! The five axum handlers backing §4.1's HTTP contract, plus `/health`.

use axum::extract::{Path, State};
use axum::Json;
use core::contracts;
use core::store::Side;
use core::types::{CreateOrder, Order, PerformOn, Response, Secret, Status};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::order_builder;
use crate::state::AppState;

/// An Order plus its derived, never-stored status (§4.1 "full Order with
/// derived status").
#[derive(Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status: Status,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let status = core::status::project(&order);
        OrderView { order, status }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(create_order): Json<CreateOrder>,
) -> Result<Json<Response<String>>, ApiError> {
    let order = order_builder::build_order(&state, create_order).await?;
    info!(create_id = %order.create_id, "created order");
    Ok(Json(Response::ok(order.create_id)))
}

pub async fn get_order_by_id(
    State(state): State<AppState>,
    Path(create_id): Path<String>,
) -> Result<Json<Response<OrderView>>, ApiError> {
    let order = state
        .store
        .get_by_create_id(&create_id)
        .await?
        .ok_or_else(|| core::CoreError::InvalidRequest(format!("no order with create_id {create_id}")))?;
    Ok(Json(Response::ok(OrderView::from(order))))
}

pub async fn get_orders_by_user(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Response<Vec<OrderView>>>, ApiError> {
    let orders = state.store.get_by_user(&address).await?;
    let views = orders.into_iter().map(OrderView::from).collect();
    Ok(Json(Response::ok(views)))
}

#[derive(Deserialize)]
pub struct InitiateRequest {
    pub order_id: String,
    pub signature: String,
    pub perform_on: PerformOn,
}

pub async fn initiate(
    State(state): State<AppState>,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<Response<String>>, ApiError> {
    let order = state
        .store
        .get_by_create_id(&req.order_id)
        .await?
        .ok_or_else(|| core::CoreError::InvalidRequest(format!("no order with create_id {}", req.order_id)))?;

    let side = side_of(req.perform_on);
    let swap = match side {
        Side::Source => &order.source_swap,
        Side::Destination => &order.destination_swap,
    };

    if let Some(tx_hash) = &swap.initiate_tx_hash {
        return Ok(Json(Response::ok(tx_hash.clone())));
    }

    let evm_chain = state.evm_chain(swap.chain.as_str())?;
    let signer = evm_chain
        .signer
        .as_ref()
        .ok_or_else(|| core::CoreError::Unsupported(format!("no relay signer configured for {}", swap.chain)))?;

    let htlc_address = contracts::parse_address(&swap.htlc_address)?;
    let instance = contracts::AtomicSwap::new(htlc_address, signer.clone());

    let token = contracts::parse_address(&swap.token_address)?;
    let initiator = contracts::parse_address(&swap.initiator)?;
    let redeemer = contracts::parse_address(&swap.redeemer)?;
    let timelock = alloy::primitives::U256::from(swap.timelock);
    let amount = contracts::amount_to_u256(&swap.amount)?;
    let secret_hash = contracts::parse_secret_hash(&swap.secret_hash.to_hex())?;
    let signature = hex::decode(req.signature.strip_prefix("0x").unwrap_or(&req.signature))
        .map_err(|e| core::CoreError::InvalidRequest(format!("invalid signature hex: {e}")))?;

    let pending = instance
        .initiateWithSignature(token, initiator, redeemer, timelock, amount, secret_hash, signature.into())
        .send()
        .await
        .map_err(|e| core::CoreError::ContractRevert(e.to_string()))?;
    let tx_hash = pending.tx_hash().to_string();

    if state.store.set_initiate_tx(&order.create_id, side, &tx_hash).await? {
        info!(create_id = %order.create_id, ?side, %tx_hash, "relayed initiate");
    }

    Ok(Json(Response::ok(tx_hash)))
}

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub order_id: String,
    pub secret: String,
    pub perform_on: PerformOn,
}

pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<Response<String>>, ApiError> {
    let order = state
        .store
        .get_by_create_id(&req.order_id)
        .await?
        .ok_or_else(|| core::CoreError::InvalidRequest(format!("no order with create_id {}", req.order_id)))?;

    let side = side_of(req.perform_on);
    let swap = match side {
        Side::Source => &order.source_swap,
        Side::Destination => &order.destination_swap,
    };

    if let Some(tx_hash) = &swap.redeem_tx_hash {
        return Ok(Json(Response::ok(tx_hash.clone())));
    }

    let secret = Secret::from_hex(&req.secret)?;
    if !swap.secret_hash.matches(&secret) {
        return Err(core::CoreError::SecretMismatch.into());
    }

    let evm_chain = state.evm_chain(swap.chain.as_str())?;
    let signer = evm_chain
        .signer
        .as_ref()
        .ok_or_else(|| core::CoreError::Unsupported(format!("no relay signer configured for {}", swap.chain)))?;

    let htlc_address = contracts::parse_address(&swap.htlc_address)?;
    let instance = contracts::AtomicSwap::new(htlc_address, signer.clone());
    let order_id = contracts::parse_secret_hash(&swap.swap_id)?;
    let secret_bytes = contracts::parse_secret_hash(&secret.to_hex())?;

    let pending = instance
        .redeem(order_id, secret_bytes)
        .send()
        .await
        .map_err(|e| core::CoreError::ContractRevert(e.to_string()))?;
    let tx_hash = pending.tx_hash().to_string();

    if state
        .store
        .set_redeem(&order.create_id, side, &tx_hash, None, Some(&secret.to_hex()))
        .await?
    {
        info!(create_id = %order.create_id, ?side, %tx_hash, "relayed redeem");
    }

    Ok(Json(Response::ok(tx_hash)))
}

fn side_of(perform_on: PerformOn) -> Side {
    match perform_on {
        PerformOn::Source => Side::Source,
        PerformOn::Destination => Side::Destination,
    }
}
