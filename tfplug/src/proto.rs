//! Generated protobuf types for Terraform Plugin Protocol v6.9.
//!
//! Request/response pairs live in snake_case modules named after their RPC
//! (`plan_resource_change::Request`), nested messages in sub-modules
//! (`diagnostic::Severity`). Several names collide with framework types, so
//! refer to these through the `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};
