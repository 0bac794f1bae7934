//! Credit ledger handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use core_kernel::{ClientId, Store};
use domain_billing::BillingTx;
use domain_credit::{CreditTransaction, ReplayReport};

use crate::dto::credits::{BalanceResponse, GrantCreditsRequest};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Current balance of a client
pub async fn get_balance<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<BalanceResponse>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let balance = state.ledger.get_balance(client_id).await?;
    Ok(Json(BalanceResponse { client_id, balance }))
}

/// Grants credits to a client
pub async fn grant_credits<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    ValidatedJson(request): ValidatedJson<GrantCreditsRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let balance = state
        .ledger
        .add_credits(client_id, request.amount, request.grant, &request.description)
        .await?;
    info!(client_id = %client_id, amount = request.amount, balance, "credits granted");
    Ok((StatusCode::CREATED, Json(BalanceResponse { client_id, balance })))
}

/// Full credit log, oldest first
pub async fn list_transactions<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Vec<CreditTransaction>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.ledger.transactions(client_id).await?))
}

/// Replays the log and compares it with the stored balance
pub async fn verify_replay<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<ReplayReport>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.ledger.verify_replay(client_id).await?))
}
