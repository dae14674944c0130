// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The switchboard callback: one GET on switch join, fire-and-forget.
//!
//! The response body is discarded; a failed call is logged and ignored.

use openflow::datapath::DatapathId;
use tracing::{debug, warn};

/// Where (and as whom) to announce switch joins.
#[derive(Debug, Clone)]
pub struct SwitchboardConfig {
    pub state_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Announce a joined datapath. Spawns the request and returns immediately.
pub fn notify_join(config: &SwitchboardConfig, dpid: DatapathId) {
    let config = config.clone();
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut request = client.get(&config.state_url);
        if let Some(username) = &config.username {
            request = request.basic_auth(username, config.password.as_deref());
        }
        match request.send().await {
            Ok(response) => debug!(
                "Switchboard acknowledged join of [{dpid:016x}] [status={}]",
                response.status()
            ),
            Err(e) => warn!("Switchboard callback failed for [{dpid:016x}]: {e}"),
        }
    });
}
