// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Management surface: the REST API and the switchboard callback client.

pub mod api;
pub mod switchboard;

// re-exports
pub use api::rest_api;
pub use switchboard::SwitchboardConfig;
