//! Keyward - license activation, device binding, and session core
//!
//! This library implements the backend state machine for a desktop
//! application's licensing: one-time activation of a license code against a
//! hardware fingerprint, password login from a bounded set of devices, and
//! bearer-token sessions scoped to an (account, device) pair. A transport
//! layer (HTTP or otherwise) calls the operations on [`service::LicenseService`]
//! and maps [`error::AppError`] kinds to wire responses.

pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod id;
pub mod models;
pub mod registry;
pub mod service;
pub mod session;
