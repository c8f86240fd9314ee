//! # burrow-image
//!
//! Image archive handling for the burrow engine.
//!
//! An image is a single tar archive (`<image_root>/<image>.tar`, plain or
//! gzip-compressed) that is unpacked once into a shared read-only layer.
//! Committing a container writes its merged root back out in the same
//! format, so a committed image can be run like any other.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod commit;
pub mod layer;
