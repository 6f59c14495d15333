//! Evidence weighting, derivation and fingerprinting

use crate::types::{EvidenceTuple, Mechanism, MergedRecord};
use hanja_common::config::{MechanismWeights, RulesetConfig};
use hanja_common::oheng::stroke_element;
use sha2::{Digest, Sha256};

/// Source name stamped on evidence derived by the pipeline itself
pub const DERIVED_SOURCE: &str = "derived";

/// Weight of one mechanism under the active ruleset
pub fn mechanism_weight(mechanism: Mechanism, weights: &MechanismWeights) -> f64 {
    match mechanism {
        Mechanism::Base => weights.base,
        Mechanism::Expanded => weights.expanded,
        Mechanism::StrokeRule => weights.stroke_rule,
        Mechanism::SoundRule => weights.sound_rule,
    }
}

/// Re-apply the active ruleset's weights to every tuple
pub fn reweigh(candidates: &mut [EvidenceTuple], weights: &MechanismWeights) {
    for tuple in candidates.iter_mut() {
        tuple.weight = mechanism_weight(tuple.mechanism, weights);
    }
}

/// Rule-derived evidence for a merged record
///
/// A stroke-rule tuple comes from the stroke count's last digit and a
/// sound-rule tuple from the primary reading's sound element. Each is added
/// only when enabled in the ruleset and no source already supplied that
/// mechanism.
pub fn derive_evidence(record: &MergedRecord, ruleset: &RulesetConfig) -> Vec<EvidenceTuple> {
    let has = |mechanism: Mechanism| record.candidates.iter().any(|t| t.mechanism == mechanism);
    let mut derived = Vec::new();

    if ruleset.derive_stroke_element && !has(Mechanism::StrokeRule) {
        if let Some(strokes) = record.strokes {
            derived.push(EvidenceTuple {
                source: DERIVED_SOURCE.to_string(),
                mechanism: Mechanism::StrokeRule,
                weight: ruleset.weights.stroke_rule,
                suggested_element: Some(stroke_element(strokes)),
            });
        }
    }

    if ruleset.derive_sound_element && !has(Mechanism::SoundRule) {
        let sound = record
            .readings
            .iter()
            .find(|r| r.is_primary)
            .and_then(|r| r.sound_element);
        if let Some(element) = sound {
            derived.push(EvidenceTuple {
                source: DERIVED_SOURCE.to_string(),
                mechanism: Mechanism::SoundRule,
                weight: ruleset.weights.sound_rule,
                suggested_element: Some(element),
            });
        }
    }

    derived
}

/// Stable hash of the evidence set, ignoring weights and order
///
/// Used to decide whether a manual decision still applies to the evidence it
/// was made on.
pub fn evidence_fingerprint(candidates: &[EvidenceTuple]) -> String {
    let mut keys: Vec<String> = candidates
        .iter()
        .map(|t| {
            format!(
                "{}\u{1f}{}\u{1f}{}",
                t.source,
                t.mechanism.as_str(),
                t.suggested_element.map(|e| e.as_str()).unwrap_or("-")
            )
        })
        .collect();
    keys.sort();
    keys.dedup();

    let mut hasher = Sha256::new();
    for key in &keys {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
