//! Peak Performance backend library
//!
//! Document store, transactional stats updates, services and the local
//! view model used by clients and tests.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod notifications;
pub mod repositories;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
