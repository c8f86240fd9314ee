//! Filesystem management for container isolation.
//!
//! Provides `OverlayFS` layering of image and writable layers, the
//! `pivot_root` protocol that switches a container onto its layered root,
//! and the mount utilities both are built from.

pub mod mount;
pub mod overlayfs;
pub mod pivot;
pub mod workspace;
