//! The `/entity/*` REST surface: stateless HTTP endpoints that each build a
//! payload and hand it to the [`Dispatcher`], translating its result into a
//! JSON response.
//!
//! Every route is guarded by [`require_api_key`], which authenticates the
//! caller's API key and checks/increments its daily quota before the handler
//! ever runs.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::extract::{ApiJson, ApiQuery};
use crate::dispatcher::Dispatcher;
use crate::errors::ApiError;
use crate::services::credential_store::CredentialStoreService;
use crate::validation;
use worldlink_types::Operation;

/// Shared handles the entity endpoints need.
#[derive(Clone)]
pub struct EntitiesState {
    pub dispatcher: Dispatcher,
    pub credential_store: CredentialStoreService,
}

/// Creates a `Router` with the full `/entity/*` surface, wrapped in the
/// API-key/quota middleware.
pub(crate) fn routes(state: EntitiesState) -> Router {
    Router::new()
        .route("/entity/get", get(get_entity))
        .route("/entity/create", post(create_entity))
        .route("/entity/update", put(update_entity))
        .route("/entity/delete", delete(delete_entity))
        .route("/entity/give", post(give_item))
        .route("/entity/remove", post(remove_item))
        .route("/entity/increase", post(increase_attribute))
        .route("/entity/decrease", post(decrease_attribute))
        .route("/entity/kill", post(kill_entity))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Authenticates the `x-api-key` header against the credential store and
/// checks/increments its daily quota before letting the request through.
async fn require_api_key(
    State(state): State<EntitiesState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) else {
        return ApiError::Unauthorized.into_response();
    };

    if let Err(err) = state.credential_store.authenticate_rest(api_key).await {
        tracing::debug!("rejected api key: {err}");
        return ApiError::Unauthorized.into_response();
    }

    if let Err(err) = state.credential_store.check_and_increment_quota(api_key).await {
        tracing::debug!("quota check failed: {err}");
        return ApiError::QuotaExceeded.into_response();
    }

    next.run(request).await
}

/// Serializes `value` to a JSON object, excluding `clientId`: the envelope
/// carries that separately (see [`worldlink_types::Envelope::request`]), so
/// leaving it in the payload would emit it on the wire twice.
fn payload_of<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    let mut map = match serde_json::to_value(value).expect("entity params always serialize") {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.remove("clientId");
    map
}

async fn respond(
    dispatcher: &Dispatcher,
    operation: Operation,
    client_id: &str,
    payload: Map<String, Value>,
) -> Result<Json<Value>, ApiError> {
    let result = dispatcher.dispatch(operation, client_id, payload).await?;
    Ok(Json(Value::Object(result)))
}

#[derive(Debug, Serialize, Deserialize)]
struct GetParams {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<String>,
}

async fn get_entity(
    State(state): State<EntitiesState>,
    ApiQuery(params): ApiQuery<GetParams>,
) -> Result<Json<Value>, ApiError> {
    let client_id = params.client_id.clone();
    respond(&state.dispatcher, Operation::Get, &client_id, payload_of(&params)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateBody {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "entityType")]
    entity_type: String,
    data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder: Option<String>,
}

async fn create_entity(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<CreateBody>,
) -> Result<Json<Value>, ApiError> {
    if body.entity_type == "Macro" {
        if let Some(Value::String(command)) = body.data.get("command") {
            if let Err((error, suggestion)) = validation::validate_macro_command(command) {
                return Err(ApiError::ValidationRejected {
                    error,
                    suggestion: Some(suggestion),
                });
            }
        }
    }

    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Create, &client_id, payload_of(&body)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateBody {
    #[serde(rename = "clientId")]
    client_id: String,
    data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<String>,
}

async fn update_entity(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Update, &client_id, payload_of(&body)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct DeleteParams {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
}

async fn delete_entity(
    State(state): State<EntitiesState>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> Result<Json<Value>, ApiError> {
    let client_id = params.client_id.clone();
    respond(&state.dispatcher, Operation::Delete, &client_id, payload_of(&params)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct GiveBody {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "fromUuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    from_uuid: Option<String>,
    #[serde(rename = "toUuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    to_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
    #[serde(rename = "itemUuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    item_uuid: Option<String>,
    #[serde(rename = "itemName")]
    #[serde(skip_serializing_if = "Option::is_none")]
    item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
}

async fn give_item(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<GiveBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Give, &client_id, payload_of(&body)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct RemoveBody {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "actorUuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    actor_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
    #[serde(rename = "itemUuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    item_uuid: Option<String>,
    #[serde(rename = "itemName")]
    #[serde(skip_serializing_if = "Option::is_none")]
    item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
}

async fn remove_item(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<RemoveBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Remove, &client_id, payload_of(&body)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct AdjustBody {
    #[serde(rename = "clientId")]
    client_id: String,
    attribute: String,
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
}

async fn increase_attribute(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<AdjustBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Increase, &client_id, payload_of(&body)).await
}

async fn decrease_attribute(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<AdjustBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Decrease, &client_id, payload_of(&body)).await
}

#[derive(Debug, Serialize, Deserialize)]
struct KillBody {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<bool>,
}

async fn kill_entity(
    State(state): State<EntitiesState>,
    ApiJson(body): ApiJson<KillBody>,
) -> Result<Json<Value>, ApiError> {
    let client_id = body.client_id.clone();
    respond(&state.dispatcher, Operation::Kill, &client_id, payload_of(&body)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_of_strips_client_id_and_absent_fields() {
        let params = GetParams {
            client_id: "world-1".to_owned(),
            uuid: None,
            selected: Some(true),
            actor: None,
        };
        let payload = payload_of(&params);
        assert!(!payload.contains_key("clientId"));
        assert_eq!(payload.get("selected").unwrap(), true);
        assert!(!payload.contains_key("uuid"));
    }
}
