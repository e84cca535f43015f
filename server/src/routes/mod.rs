//! HTTP route handlers.
//!
//! Each sub-module corresponds to an API endpoint group. Every handler that
//! takes a workspace name validates it before anything is spawned.

pub mod health;
pub mod workspaces;
