//! Client, billing entity and payer handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use core_kernel::{BillingEntityId, ClientId, Store};
use domain_billing::BillingTx;
use domain_client::{BillingContact, BillingEntity, Client, ClientRelationship, SessionCategory};

use crate::dto::clients::{
    AssignBillingRequest, RegisterClientRequest, RegisterEntityRequest, RelateRequest, UpdateBillingProfileRequest,
};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Registers a client
pub async fn register_client<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<RegisterClientRequest>,
) -> Result<(StatusCode, Json<Client>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let client = request.into_client(state.billing.config().currency)?;
    let client = state.clients.register_client(client).await?;
    info!(client_id = %client.id, billing_type = client.billing_type.as_str(), "client registered");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Client>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.clients.get_client(client_id).await?))
}

/// Changes billing type, billing email or standing discount
pub async fn update_billing_profile<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    ValidatedJson(request): ValidatedJson<UpdateBillingProfileRequest>,
) -> Result<Json<Client>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let update = request.into_update(state.billing.config().currency)?;
    Ok(Json(state.clients.update_billing_profile(client_id, update).await?))
}

pub async fn register_entity<S>(
    State(state): State<AppState<S>>,
    ValidatedJson(request): ValidatedJson<RegisterEntityRequest>,
) -> Result<(StatusCode, Json<BillingEntity>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let entity = state.clients.register_billing_entity(request.into()).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

pub async fn get_entity<S>(
    State(state): State<AppState<S>>,
    Path(entity_id): Path<BillingEntityId>,
) -> Result<Json<BillingEntity>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.clients.get_billing_entity(entity_id).await?))
}

/// Relationships in which the client takes part, from either side
pub async fn list_relationships<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
) -> Result<Json<Vec<ClientRelationship>>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.clients.relationships(client_id).await?))
}

pub async fn relate<S>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<ClientId>,
    ValidatedJson(request): ValidatedJson<RelateRequest>,
) -> Result<(StatusCode, Json<ClientRelationship>), ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let relationship = state
        .clients
        .relate(client_id, request.counterparty, request.kind, request.label)
        .await?;
    Ok((StatusCode::CREATED, Json(relationship)))
}

/// Chooses who pays for one category of the client's sessions
///
/// Returns the contact the client now resolves to.
pub async fn assign_billing<S>(
    State(state): State<AppState<S>>,
    Path((client_id, category)): Path<(ClientId, SessionCategory)>,
    ValidatedJson(request): ValidatedJson<AssignBillingRequest>,
) -> Result<Json<BillingContact>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    let contact = state
        .clients
        .assign_billing(client_id, category, request.relationship_id)
        .await?;
    Ok(Json(contact))
}

pub async fn resolve_contact<S>(
    State(state): State<AppState<S>>,
    Path((client_id, category)): Path<(ClientId, SessionCategory)>,
) -> Result<Json<BillingContact>, ApiError>
where
    S: Store,
    S::Tx: BillingTx,
{
    Ok(Json(state.clients.resolve(client_id, category).await?))
}
