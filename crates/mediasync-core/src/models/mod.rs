pub mod asset;
pub mod variant;

pub use asset::{AssetPatch, AssetRecord, MediaSource};
pub use variant::{SkipReason, SkippedVariant, Variant, VariantSet};
