//! # burrow-runtime
//!
//! Container lifecycle for the burrow engine.
//!
//! - **Launch**: [`process`] clones the init process into new namespaces;
//!   [`bootstrap`] is what that process runs before the user command.
//! - **State**: [`state`] persists one record per container, [`logs`]
//!   locates the output of detached containers.
//! - **Orchestration**: [`engine`] composes the above with cgroups, the
//!   layered filesystem and the network collaborator; [`exec`] enters a
//!   running container.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod engine;
pub mod exec;
pub mod logs;
pub mod process;
pub mod state;
