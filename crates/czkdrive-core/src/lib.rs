//! CZK Drive Core - Object model and driver port
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteObject`, `RemoteId`
//! - **Port definitions** - `IStorageDriver`, the operation contract the host expects
//! - **Configuration** - `DriverConfig` with loading, validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
