//! Target-size normalization and the single-shot quality estimate.
//!
//! The estimate relates the desired-to-original size ratio directly to
//! encoder quality. The encoded output is never measured against the
//! target, so results for any format can land above or below it.

use crate::models::{Quality, SizeUnit};

pub fn normalize_to_kb(value: f64, unit: SizeUnit) -> f64 {
    match unit {
        SizeUnit::Kb => value,
        SizeUnit::Mb => value * 1024.0,
    }
}

/// `min(1, target_kb / original_kb)` where `original_kb = original_bytes / 1024`.
pub fn estimate_quality(target_kb: f64, original_bytes: usize) -> Quality {
    let original_kb = original_bytes as f64 / 1024.0;
    if original_kb <= 0.0 {
        return Quality::MAX;
    }
    Quality::new((target_kb / original_kb).min(1.0))
}
