// Element Resolver - weighted vote over evidence tuples
//
// Sum weights per suggested element, rank, and accept a unique top element at
// or above the ruleset threshold. Anything else goes to review with the base
// (else expanded) candidate as a provisional element.

use crate::types::{DecidedBy, EvidenceTuple, Mechanism, Resolution, ReviewStatus};
use hanja_common::config::RulesetConfig;
use hanja_common::Element;
use std::collections::BTreeMap;
use tracing::debug;

/// Weights closer than this are treated as equal
const WEIGHT_EPSILON: f64 = 1e-9;

/// Resolve the final element for one character
///
/// Pure and deterministic: the result depends only on the tuples' elements,
/// mechanisms and weights (not on their order) and on the ruleset.
pub fn resolve_evidence(candidates: &[EvidenceTuple], ruleset: &RulesetConfig) -> Resolution {
    let ranked = rank_elements(candidates);

    let top = ranked.first().copied();
    let top_weight = top.map(|(_, w)| w).unwrap_or(0.0);
    let tied = match (ranked.first(), ranked.get(1)) {
        (Some((_, first)), Some((_, second))) => (first - second).abs() < WEIGHT_EPSILON,
        _ => false,
    };

    let evidence_score = score(top_weight);

    match top {
        Some((element, weight)) if !tied && weight + WEIGHT_EPSILON >= ruleset.auto_threshold => {
            debug!(%element, weight, "Unique top element above threshold");
            Resolution {
                element: Some(element),
                review_status: ReviewStatus::Ok,
                evidence_score,
                decided_by: DecidedBy::Auto,
                ruleset: ruleset.version.clone(),
            }
        }
        _ => {
            let fallback = fallback_element(candidates);
            debug!(
                tied,
                top_weight,
                fallback = ?fallback,
                "Evidence ambiguous or weak, flagging for review"
            );
            Resolution {
                element: fallback,
                review_status: ReviewStatus::NeedsReview,
                evidence_score,
                decided_by: DecidedBy::Base,
                ruleset: ruleset.version.clone(),
            }
        }
    }
}

/// Accumulated weight per suggested element, highest first
///
/// Equal weights keep element order so ranking never depends on input order.
pub fn rank_elements(candidates: &[EvidenceTuple]) -> Vec<(Element, f64)> {
    let mut totals: BTreeMap<Element, f64> = BTreeMap::new();
    for tuple in candidates {
        if let Some(element) = tuple.suggested_element {
            *totals.entry(element).or_insert(0.0) += tuple.weight;
        }
    }

    let mut ranked: Vec<(Element, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

fn fallback_element(candidates: &[EvidenceTuple]) -> Option<Element> {
    [Mechanism::Base, Mechanism::Expanded].iter().find_map(|mechanism| {
        candidates
            .iter()
            .filter(|t| t.mechanism == *mechanism)
            .find_map(|t| t.suggested_element)
    })
}

fn score(top_weight: f64) -> u8 {
    (top_weight * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(source: &str, mechanism: Mechanism, weight: f64, element: Option<Element>) -> EvidenceTuple {
        EvidenceTuple {
            source: source.to_string(),
            mechanism,
            weight,
            suggested_element: element,
        }
    }

    #[test]
    fn test_tie_goes_to_review_with_base_fallback() {
        let candidates = vec![
            tuple("a", Mechanism::Base, 0.4, Some(Element::Wood)),
            tuple("b", Mechanism::Expanded, 0.4, Some(Element::Metal)),
        ];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(resolution.review_status, ReviewStatus::NeedsReview);
        assert_eq!(resolution.element, Some(Element::Wood));
        assert_eq!(resolution.evidence_score, 40);
        assert_eq!(resolution.decided_by, DecidedBy::Base);
        assert_eq!(resolution.ruleset, "oheng-v1");
    }

    #[test]
    fn test_clear_majority_resolves_automatically() {
        let candidates = vec![
            tuple("a", Mechanism::Base, 0.4, Some(Element::Fire)),
            tuple("rules", Mechanism::StrokeRule, 0.3, Some(Element::Fire)),
            tuple("rules", Mechanism::SoundRule, 0.3, Some(Element::Metal)),
        ];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(resolution.review_status, ReviewStatus::Ok);
        assert_eq!(resolution.element, Some(Element::Fire));
        assert_eq!(resolution.evidence_score, 70);
        assert_eq!(resolution.decided_by, DecidedBy::Auto);
    }

    #[test]
    fn test_below_threshold_goes_to_review() {
        let candidates = vec![tuple("a", Mechanism::Base, 0.4, Some(Element::Water))];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(resolution.review_status, ReviewStatus::NeedsReview);
        assert_eq!(resolution.element, Some(Element::Water));
        assert_eq!(resolution.evidence_score, 40);
    }

    #[test]
    fn test_expanded_fallback_when_no_base() {
        let candidates = vec![
            tuple("x", Mechanism::Expanded, 0.4, Some(Element::Earth)),
            tuple("y", Mechanism::SoundRule, 0.4, Some(Element::Fire)),
        ];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(resolution.element, Some(Element::Earth));
        assert_eq!(resolution.decided_by, DecidedBy::Base);
    }

    #[test]
    fn test_no_evidence() {
        let candidates = vec![tuple("a", Mechanism::Base, 0.4, None)];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(resolution.element, None);
        assert_eq!(resolution.review_status, ReviewStatus::NeedsReview);
        assert_eq!(resolution.evidence_score, 0);

        let empty = resolve_evidence(&[], &RulesetConfig::default());
        assert_eq!(empty.element, None);
        assert_eq!(empty.evidence_score, 0);
    }

    #[test]
    fn test_deterministic_under_reordering() {
        let mut candidates = vec![
            tuple("a", Mechanism::Base, 0.4, Some(Element::Wood)),
            tuple("b", Mechanism::Expanded, 0.4, Some(Element::Wood)),
            tuple("c", Mechanism::StrokeRule, 0.3, Some(Element::Water)),
            tuple("d", Mechanism::SoundRule, 0.3, Some(Element::Earth)),
        ];
        let first = resolve_evidence(&candidates, &RulesetConfig::default());
        candidates.reverse();
        let second = resolve_evidence(&candidates, &RulesetConfig::default());

        assert_eq!(first, second);
        assert_eq!(first.element, Some(Element::Wood));
        assert_eq!(first.evidence_score, 80);
    }

    #[test]
    fn test_score_is_clamped() {
        let candidates = vec![
            tuple("a", Mechanism::Base, 1.0, Some(Element::Metal)),
            tuple("b", Mechanism::Expanded, 1.0, Some(Element::Metal)),
            tuple("c", Mechanism::StrokeRule, 1.0, Some(Element::Metal)),
        ];

        let resolution = resolve_evidence(&candidates, &RulesetConfig::default());
        assert_eq!(resolution.evidence_score, 100);
    }

    #[test]
    fn test_threshold_comes_from_ruleset() {
        let candidates = vec![tuple("a", Mechanism::Base, 0.4, Some(Element::Fire))];
        let ruleset = RulesetConfig {
            auto_threshold: 0.4,
            ..RulesetConfig::default()
        };

        let resolution = resolve_evidence(&candidates, &ruleset);
        assert_eq!(resolution.review_status, ReviewStatus::Ok);
        assert_eq!(resolution.decided_by, DecidedBy::Auto);
    }
}
