//! Core traits for the UDDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RegistrarClient`]: Talk to one registrar's API for one cycle
//! - [`RegistrarFactory`]: Build a fresh client per cycle
//! - [`SecretProtector`]: Machine-local encryption of the API token

pub mod protector;
pub mod registrar;

pub use protector::SecretProtector;
pub use registrar::{ReconcileSummary, RegistrarClient, RegistrarFactory};
