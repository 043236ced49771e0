//! Weighted structural similarity between two signatures.

use std::collections::BTreeSet;

use super::ProgramSignature;

const INTENT_WEIGHT: f64 = 0.30;
const DOCUMENT_WEIGHT: f64 = 0.20;
const DOMAIN_WEIGHT: f64 = 0.20;
const COMPLEXITY_WEIGHT: f64 = 0.10;
const LENGTH_WEIGHT: f64 = 0.10;
const PROFILE_WEIGHT: f64 = 0.05;
const TPV_WEIGHT: f64 = 0.05;

/// Similarity in `[0, 1]`. Symmetric; identical hashes score exactly 1.
pub fn signature_similarity(a: &ProgramSignature, b: &ProgramSignature) -> f64 {
    if a.signature_hash == b.signature_hash && !a.signature_hash.is_empty() {
        return 1.0;
    }

    let intent = if a.primary_intent == b.primary_intent {
        1.0
    } else if a.secondary_intents.contains(&b.primary_intent)
        || b.secondary_intents.contains(&a.primary_intent)
    {
        0.5
    } else {
        0.0
    };

    let score = INTENT_WEIGHT * intent
        + DOCUMENT_WEIGHT * jaccard(&a.document_types, &b.document_types)
        + DOMAIN_WEIGHT * jaccard(&a.content_domains, &b.content_domains)
        + COMPLEXITY_WEIGHT * ordinal_closeness(a.complexity.ordinal(), b.complexity.ordinal())
        + LENGTH_WEIGHT
            * ordinal_closeness(a.length_category.ordinal(), b.length_category.ordinal())
        + PROFILE_WEIGHT * f64::from(u8::from(a.user_profile == b.user_profile))
        + TPV_WEIGHT * f64::from(u8::from(a.tpv_enabled == b.tpv_enabled));

    score.clamp(0.0, 1.0)
}

/// Jaccard index; two empty sets are identical.
fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn ordinal_closeness(a: u8, b: u8) -> f64 {
    match a.abs_diff(b) {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}
