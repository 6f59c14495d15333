//! Individual validation rules

use super::RuleOutcome;
use crate::types::{DecidedBy, ResolvedRecord, ReviewStatus};
use hanja_common::oheng::{single_cjk_char, stroke_yin_yang, MAX_STROKES, MIN_STROKES};

pub fn character_present(record: &ResolvedRecord) -> RuleOutcome {
    if record.merged.character.trim().is_empty() {
        return Err("character is empty".to_string());
    }
    Ok(())
}

pub fn character_cjk_block(record: &ResolvedRecord) -> RuleOutcome {
    match single_cjk_char(&record.merged.character) {
        Some(_) => Ok(()),
        None => Err(format!(
            "'{}' is not a single CJK ideograph",
            record.merged.character
        )),
    }
}

pub fn meaning_or_reading_present(record: &ResolvedRecord) -> RuleOutcome {
    let has_meaning = record
        .merged
        .meaning
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty());
    if has_meaning || !record.merged.readings.is_empty() {
        Ok(())
    } else {
        Err("neither meaning nor reading present".to_string())
    }
}

pub fn stroke_range(record: &ResolvedRecord) -> RuleOutcome {
    match record.merged.strokes {
        Some(strokes) if !(MIN_STROKES..=MAX_STROKES).contains(&i64::from(strokes)) => Err(format!(
            "stroke count {} outside [{}, {}]",
            strokes, MIN_STROKES, MAX_STROKES
        )),
        _ => Ok(()),
    }
}

pub fn confidence_range(record: &ResolvedRecord) -> RuleOutcome {
    match record.merged.confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(format!("confidence {} outside [0, 1]", c)),
        _ => Ok(()),
    }
}

pub fn evidence_score_range(record: &ResolvedRecord) -> RuleOutcome {
    let score = record.resolution.evidence_score;
    if score > 100 {
        return Err(format!("evidence score {} outside [0, 100]", score));
    }
    Ok(())
}

pub fn element_supported_by_evidence(record: &ResolvedRecord) -> RuleOutcome {
    if record.resolution.decided_by == DecidedBy::Manual {
        return Ok(());
    }
    match record.resolution.element {
        Some(element)
            if !record
                .merged
                .candidates
                .iter()
                .any(|t| t.suggested_element == Some(element)) =>
        {
            Err(format!("element {} not suggested by any evidence", element))
        }
        _ => Ok(()),
    }
}

pub fn review_status_consistency(record: &ResolvedRecord) -> RuleOutcome {
    if record.resolution.review_status == ReviewStatus::Ok && record.resolution.element.is_none() {
        return Err("review status ok without an element".to_string());
    }
    Ok(())
}

pub fn yin_yang_stroke_parity(record: &ResolvedRecord) -> RuleOutcome {
    match (record.merged.yin_yang, record.merged.strokes) {
        (Some(yin_yang), Some(strokes)) if strokes > 0 && stroke_yin_yang(strokes) != yin_yang => {
            Err(format!(
                "{} strokes imply {}, record says {}",
                strokes,
                stroke_yin_yang(strokes),
                yin_yang
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::validate_record;
    use super::*;
    use crate::types::{EvidenceTuple, Mechanism, MergedRecord, Reading, Resolution};
    use hanja_common::{Element, YinYang};

    fn resolved() -> ResolvedRecord {
        ResolvedRecord {
            merged: MergedRecord {
                character: "賢".to_string(),
                meaning: Some("어질 현".to_string()),
                strokes: Some(15),
                yin_yang: Some(YinYang::Yang),
                confidence: Some(0.9),
                readings: vec![Reading {
                    text: "현".to_string(),
                    is_primary: true,
                    sound_element: Some(Element::Earth),
                }],
                candidates: vec![EvidenceTuple {
                    source: "a".to_string(),
                    mechanism: Mechanism::Base,
                    weight: 0.4,
                    suggested_element: Some(Element::Wood),
                }],
                sources: vec!["a".to_string()],
            },
            resolution: Resolution {
                element: Some(Element::Wood),
                review_status: ReviewStatus::NeedsReview,
                evidence_score: 40,
                decided_by: DecidedBy::Base,
                ruleset: "oheng-v1".to_string(),
            },
        }
    }

    fn failed(record: ResolvedRecord) -> Vec<String> {
        validate_record(record)
            .failed_rules
            .into_iter()
            .map(|f| f.rule)
            .collect()
    }

    #[test]
    fn test_clean_record_passes() {
        let validated = validate_record(resolved());
        assert!(validated.is_valid);
        assert!(validated.failed_rules.is_empty());
    }

    #[test]
    fn test_zero_strokes_annotated_not_dropped() {
        let mut record = resolved();
        record.merged.strokes = Some(0);

        let validated = validate_record(record);
        assert!(!validated.is_valid);
        assert_eq!(validated.character(), "賢");
        assert_eq!(validated.failed_rules.len(), 1);
        assert_eq!(validated.failed_rules[0].rule, "stroke_range");
    }

    #[test]
    fn test_parity_mismatch() {
        let mut record = resolved();
        record.merged.yin_yang = Some(YinYang::Yin);
        assert_eq!(failed(record), vec!["yin_yang_stroke_parity"]);
    }

    #[test]
    fn test_unsupported_element_unless_manual() {
        let mut record = resolved();
        record.resolution.element = Some(Element::Fire);
        assert_eq!(failed(record.clone()), vec!["element_supported_by_evidence"]);

        record.resolution.decided_by = DecidedBy::Manual;
        assert!(failed(record).is_empty());
    }

    #[test]
    fn test_ok_requires_element() {
        let mut record = resolved();
        record.resolution.element = None;
        record.resolution.review_status = ReviewStatus::Ok;
        assert_eq!(failed(record), vec!["review_status_consistency"]);
    }

    #[test]
    fn test_multiple_failures_reported_in_order() {
        let mut record = resolved();
        record.merged.character = "현".to_string();
        record.merged.meaning = None;
        record.merged.readings.clear();
        record.merged.confidence = Some(1.5);
        assert_eq!(
            failed(record),
            vec!["character_cjk_block", "meaning_or_reading_present", "confidence_range"]
        );
    }
}
