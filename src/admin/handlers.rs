use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::blockchain::types::RpcError;
use crate::health::status::StatusReport;

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointChange {
    pub url: String,
    pub changed: bool,
    pub current_endpoint: Option<String>,
}

type HandlerError = (StatusCode, String);

fn reject(err: RpcError) -> HandlerError {
    let status = match err {
        RpcError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

pub async fn get_status(State(state): State<AdminState>) -> Json<StatusReport> {
    Json(state.manager.endpoint_status())
}

pub async fn add_endpoint(
    State(state): State<AdminState>,
    Json(body): Json<EndpointRequest>,
) -> Result<Json<EndpointChange>, HandlerError> {
    let changed = state.manager.add_endpoint(&body.url).map_err(reject)?;
    Ok(Json(EndpointChange {
        url: body.url,
        changed,
        current_endpoint: state.manager.current_endpoint(),
    }))
}

pub async fn remove_endpoint(
    State(state): State<AdminState>,
    Json(body): Json<EndpointRequest>,
) -> Result<Json<EndpointChange>, HandlerError> {
    if !state.manager.remove_endpoint(&body.url) {
        return Err(reject(RpcError::UnknownEndpoint(body.url)));
    }
    Ok(Json(EndpointChange {
        url: body.url,
        changed: true,
        current_endpoint: state.manager.current_endpoint(),
    }))
}

pub async fn prioritize_endpoint(
    State(state): State<AdminState>,
    Json(body): Json<EndpointRequest>,
) -> Result<Json<EndpointChange>, HandlerError> {
    state.manager.prioritize_endpoint(&body.url).map_err(reject)?;
    Ok(Json(EndpointChange {
        url: body.url,
        changed: true,
        current_endpoint: state.manager.current_endpoint(),
    }))
}
