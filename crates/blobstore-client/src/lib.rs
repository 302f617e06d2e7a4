//! Blob storage service client abstraction
//!
//! A narrow async seam over the blob service: get / put / delete / touch,
//! conditional writes guarded by opaque version tokens, and idempotent
//! container creation. [`MemoryBlobStore`] implements the same contract
//! in memory, including real version conflicts, for tests and development.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{BlobStoreError, Result};
pub use memory::MemoryBlobStore;
pub use store::{BlobStore, BlobVersion};
