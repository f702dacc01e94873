//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the host runtime depends on; the adapter crate
//! provides the implementation.
//!
//! ## Ports Overview
//!
//! - [`IStorageDriver`] - Filesystem-like operations on a remote drive

pub mod storage_driver;

pub use storage_driver::{
    ArchiveMeta, FileStream, IStorageDriver, Link, ProgressCallback, StorageDetails, Tokens,
};
