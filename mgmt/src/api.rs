// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The REST surface.
//!
//! ```text
//! GET    /router/{sw}            addresses + routes of the untagged VLAN
//! GET    /router/{sw}/{vid}      same for one VLAN ("all" = every VLAN)
//! POST   /router/{sw}[/{vid}]    add address / route / dhcp servers / vlan
//! DELETE /router/{sw}[/{vid}]    remove by address_id / route_id
//! ```
//!
//! `{sw}` is a 16-hex-digit datapath id or `"all"`; `{vid}` is 1-4 digits in
//! [2, 4094] or `"all"`. 200 on success, 400 on validation, 404 on unknown
//! switch.

use axum::Router as AxumRouter;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use openflow::datapath::{DatapathId, dpid_from_str, dpid_to_str};
use routing::command::{CommandResult, RouterCommand, VlanSpec};
use routing::{RouterEntry, RouterError, RouterRegistry};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

const REST_ALL: &str = "all";

/// Which switches a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchSpec {
    One(DatapathId),
    All,
}

/// Build the REST router over a registry.
#[must_use]
pub fn rest_api(registry: Arc<RouterRegistry>) -> AxumRouter {
    AxumRouter::new()
        .route(
            "/router/{switch_id}",
            get(get_no_vid).post(post_no_vid).delete(delete_no_vid),
        )
        .route(
            "/router/{switch_id}/{vlan_id}",
            get(get_vid).post(post_vid).delete(delete_vid),
        )
        .with_state(registry)
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match self {
            ApiError::NotFound(details) => (StatusCode::NOT_FOUND, details),
            ApiError::BadRequest(details) => (StatusCode::BAD_REQUEST, details),
        };
        (status, Json(json!({"result": "failure", "details": details}))).into_response()
    }
}

impl From<RouterError> for ApiError {
    fn from(e: RouterError) -> ApiError {
        ApiError::BadRequest(e.to_string())
    }
}

fn parse_switch(switch_id: &str) -> Result<SwitchSpec, ApiError> {
    if switch_id == REST_ALL {
        return Ok(SwitchSpec::All);
    }
    dpid_from_str(switch_id)
        .map(SwitchSpec::One)
        .ok_or_else(|| ApiError::NotFound(format!("No such resource [switch_id={switch_id}]")))
}

fn parse_vid(vlan_id: &str) -> Result<VlanSpec, ApiError> {
    if vlan_id == REST_ALL {
        return Ok(VlanSpec::All);
    }
    if vlan_id.len() <= 4 && !vlan_id.is_empty() && vlan_id.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(vid) = vlan_id.parse::<u16>() {
            return Ok(VlanSpec::One(vid));
        }
    }
    Err(ApiError::NotFound(format!(
        "No such resource [vlan_id={vlan_id}]"
    )))
}

fn resolve(
    registry: &RouterRegistry,
    spec: SwitchSpec,
) -> Result<Vec<Arc<RouterEntry>>, ApiError> {
    match spec {
        SwitchSpec::One(dpid) => registry
            .lookup(dpid)
            .map(|entry| vec![entry])
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "switch_id={} is not connected.",
                    dpid_to_str(dpid)
                ))
            }),
        SwitchSpec::All => Ok(registry.all()),
    }
}

/// One envelope per switch; `all` answers with the bare array.
fn respond(spec: SwitchSpec, mut bodies: Vec<Value>) -> Json<Value> {
    match spec {
        SwitchSpec::One(_) if bodies.len() == 1 => Json(bodies.remove(0)),
        _ => Json(Value::Array(bodies)),
    }
}

fn parse_body(body: Value) -> Result<RouterCommand, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        debug!("Reject malformed request body: {e}");
        ApiError::BadRequest("Invalid parameter.".to_string())
    })
}

async fn handle_get(
    registry: &RouterRegistry,
    switch_id: &str,
    vlan_id: Option<&str>,
) -> Result<Json<Value>, ApiError> {
    let sw_spec = parse_switch(switch_id)?;
    let vlan_spec = vlan_id.map_or(Ok(VlanSpec::One(0)), parse_vid)?;

    let mut bodies = Vec::new();
    for entry in resolve(registry, sw_spec)? {
        let router = entry.router.lock().await;
        let data = router.get_data(vlan_spec)?;
        bodies.push(json!({
            "switch_id": dpid_to_str(entry.dpid()),
            "internal_network": data,
        }));
    }
    Ok(respond(sw_spec, bodies))
}

async fn handle_post(
    registry: &RouterRegistry,
    switch_id: &str,
    vlan_id: Option<&str>,
    body: Value,
) -> Result<Json<Value>, ApiError> {
    let sw_spec = parse_switch(switch_id)?;
    let vlan_spec = vlan_id.map_or(Ok(VlanSpec::One(0)), parse_vid)?;
    let cmd = parse_body(body)?;

    let mut bodies = Vec::new();
    for entry in resolve(registry, sw_spec)? {
        let mut router = entry.router.lock().await;
        let results = match router.set_data(vlan_spec, &cmd).await {
            Ok(results) => results,
            Err(e) if sw_spec == SwitchSpec::All => {
                vec![CommandResult::ng(e.to_string(), None)]
            }
            Err(e) => return Err(e.into()),
        };
        bodies.push(command_envelope(entry.dpid(), &results));
    }
    Ok(respond(sw_spec, bodies))
}

async fn handle_delete(
    registry: &RouterRegistry,
    switch_id: &str,
    vlan_id: Option<&str>,
    body: Value,
) -> Result<Json<Value>, ApiError> {
    let sw_spec = parse_switch(switch_id)?;
    let vlan_spec = vlan_id.map_or(Ok(VlanSpec::One(0)), parse_vid)?;
    let cmd = parse_body(body)?;

    let mut bodies = Vec::new();
    for entry in resolve(registry, sw_spec)? {
        let mut router = entry.router.lock().await;
        let results = match router.delete_data(vlan_spec, &cmd).await {
            Ok(results) => results,
            Err(e) if sw_spec == SwitchSpec::All => {
                vec![CommandResult::ng(e.to_string(), None)]
            }
            Err(e) => return Err(e.into()),
        };
        bodies.push(command_envelope(entry.dpid(), &results));
    }
    Ok(respond(sw_spec, bodies))
}

fn command_envelope(dpid: DatapathId, results: &[CommandResult]) -> Value {
    json!({
        "switch_id": dpid_to_str(dpid),
        "command_result": results,
    })
}

async fn get_no_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path(switch_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    handle_get(&registry, &switch_id, None).await
}

async fn get_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path((switch_id, vlan_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    handle_get(&registry, &switch_id, Some(&vlan_id)).await
}

async fn post_no_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path(switch_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    handle_post(&registry, &switch_id, None, body).await
}

async fn post_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path((switch_id, vlan_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    handle_post(&registry, &switch_id, Some(&vlan_id), body).await
}

async fn delete_no_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path(switch_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    handle_delete(&registry, &switch_id, None, body).await
}

async fn delete_vid(
    State(registry): State<Arc<RouterRegistry>>,
    Path((switch_id, vlan_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    handle_delete(&registry, &switch_id, Some(&vlan_id), body).await
}
