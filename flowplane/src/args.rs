// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub(crate) use clap::Parser;
use mgmt::SwitchboardConfig;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "flowplane")]
#[command(version = "0.1")]
#[command(about = "An OpenFlow controller turning switches into per-VLAN IPv4 routers", long_about = None)]
pub(crate) struct CmdArgs {
    /// REST listen address
    #[arg(
        long,
        value_name = "ADDRESS",
        env = "FLOWPLANE_REST_ADDRESS",
        default_value_t = SocketAddr::from(([127, 0, 0, 1], 8080)),
        help = "Bind address and port of the REST API"
    )]
    rest_address: SocketAddr,

    /// Switchboard endpoint polled once per switch join
    #[arg(
        long,
        value_name = "URL",
        env = "SWITCHBOARD_STATE_URL",
        help = "State URL of the external switchboard service (callback skipped when absent)"
    )]
    switchboard_state_url: Option<String>,

    #[arg(long, value_name = "USER", env = "SWITCHBOARD_USERNAME")]
    switchboard_username: Option<String>,

    #[arg(long, value_name = "PASSWORD", env = "SWITCHBOARD_PASSWORD")]
    switchboard_password: Option<String>,

    /// Log filter directives, e.g. "info" or "debug,hyper=off"
    #[arg(long, value_name = "FILTER", env = "FLOWPLANE_LOG", default_value = "info")]
    log_filter: String,
}

impl CmdArgs {
    pub(crate) fn rest_address(&self) -> SocketAddr {
        self.rest_address
    }

    pub(crate) fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub(crate) fn switchboard(&self) -> Option<SwitchboardConfig> {
        self.switchboard_state_url
            .as_ref()
            .map(|state_url| SwitchboardConfig {
                state_url: state_url.clone(),
                username: self.switchboard_username.clone(),
                password: self.switchboard_password.clone(),
            })
    }
}
