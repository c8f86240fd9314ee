//! # burrow-core
//!
//! Low-level Linux isolation primitives for the burrow engine.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: the clone flags for new containers and `setns(2)` for joining them.
//! - **Cgroups v1**: CPU share, cpuset, and memory subsystems behind one capability trait.
//! - **Filesystem**: `OverlayFS` layering, bind volumes, and the `pivot_root` protocol.
//!
//! Everything here runs synchronously on the calling thread. Nothing is
//! rolled back on failure; callers decide whether a failure is fatal.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
