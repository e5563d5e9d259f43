//! Static analysis of the package contents.
//!
//! Covers the manifest (identity, version and permissions), the signing certificates and the
//! feature vector the classifier works with. Nothing in the package is ever executed.

pub mod certificate;
pub mod features;
pub mod manifest;
