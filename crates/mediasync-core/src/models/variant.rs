//! Variant manifests: derived renditions of an original media file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One derived rendition of an original file (a resolution/bitrate for video,
/// a named size for images). Variants are derived data and are never mutated
/// in place; a new upload regenerates the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub filename: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    pub filesize: u64,
    pub mime_type: String,
}

/// Why a ladder rung produced no output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The rung's target width exceeds the source width (never upscale).
    SourceTooSmall,
    /// The external transcoder failed for this rung.
    TranscodeFailed,
    /// Image decode/encode failed for this rung.
    EncodeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedVariant {
    pub name: String,
    pub reason: SkipReason,
}

/// Result of running a variant ladder over one source file.
///
/// Partial success is the normal case: a small source may retain only the
/// lowest rung, and a failed transcode drops a single rung without aborting
/// the rest. `skipped` records why each absent rung is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSet {
    pub variants: BTreeMap<String, Variant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedVariant>,
}

impl VariantSet {
    pub fn insert(&mut self, variant: Variant) {
        self.variants.insert(variant.name.clone(), variant);
    }

    pub fn skip(&mut self, name: impl Into<String>, reason: SkipReason) {
        self.skipped.push(SkippedVariant {
            name: name.into(),
            reason,
        });
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    /// Skip reason for a rung that produced no output, if recorded.
    pub fn skip_reason(&self, name: &str) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(name: &str, width: u32) -> Variant {
        Variant {
            name: name.to_string(),
            filename: format!("clip-{}.mp4", name),
            url: format!("/media/clip-{}.mp4", name),
            width,
            height: width * 9 / 16,
            bitrate_kbps: Some(800),
            filesize: 1024,
            mime_type: "video/mp4".to_string(),
        }
    }

    #[test]
    fn insert_keys_by_name() {
        let mut set = VariantSet::default();
        set.insert(variant("low", 480));
        set.insert(variant("medium", 854));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("low").unwrap().width, 480);
    }

    #[test]
    fn reinsert_replaces_rather_than_duplicates() {
        let mut set = VariantSet::default();
        set.insert(variant("low", 480));
        set.insert(variant("low", 500));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("low").unwrap().width, 500);
    }

    #[test]
    fn skip_reasons_are_queryable() {
        let mut set = VariantSet::default();
        set.skip("full", SkipReason::SourceTooSmall);
        assert_eq!(set.skip_reason("full"), Some(SkipReason::SourceTooSmall));
        assert_eq!(set.skip_reason("low"), None);
    }

    #[test]
    fn serde_round_trip_preserves_skips() {
        let mut set = VariantSet::default();
        set.insert(variant("low", 480));
        set.skip("full", SkipReason::TranscodeFailed);
        let json = serde_json::to_string(&set).unwrap();
        let back: VariantSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
