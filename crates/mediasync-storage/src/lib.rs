//! Remote object storage for mirrored media files.
//!
//! The [`RemoteStore`] trait is the seam the reconciler and ingest pipeline
//! depend on; [`StorageClient`] is the HTTP implementation against a
//! storage-zone API (PUT/DELETE by path, `AccessKey` auth, pull-zone URLs).

pub mod client;
pub mod traits;

pub use client::StorageClient;
pub use traits::{RemoteStore, StorageError, StorageResult, Uploaded};
