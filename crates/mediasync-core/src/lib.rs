//! Core types for the mediasync pipeline: asset records, variant manifests,
//! configuration and errors. No I/O lives here.

pub mod config;
pub mod error;
pub mod models;

pub use config::{CdnSettings, Config};
pub use error::AppError;
pub use models::{
    AssetPatch, AssetRecord, MediaSource, SkipReason, SkippedVariant, Variant, VariantSet,
};
