//! Domain entities
//!
//! This module contains the core domain types for the CZK drive adapter:
//! - Newtypes for validated identifiers and names
//! - The canonical [`RemoteObject`] record
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod object;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{validate_name, RemoteId};
pub use object::RemoteObject;
