// Record validators - ordered, named rules
//
// Every rule sees the full resolved record and returns pass or a failure
// reason. All rules run; failures annotate the record and never drop it.

pub mod rules;

use crate::types::{ResolvedRecord, RuleFailure, ValidatedRecord};

/// Outcome of a single rule
pub type RuleOutcome = Result<(), String>;

/// One named validation rule
#[derive(Clone, Copy)]
pub struct ValidationRule {
    pub name: &'static str,
    pub check: fn(&ResolvedRecord) -> RuleOutcome,
}

/// Rules in evaluation order
pub const RULES: [ValidationRule; 9] = [
    ValidationRule { name: "character_present", check: rules::character_present },
    ValidationRule { name: "character_cjk_block", check: rules::character_cjk_block },
    ValidationRule { name: "meaning_or_reading_present", check: rules::meaning_or_reading_present },
    ValidationRule { name: "stroke_range", check: rules::stroke_range },
    ValidationRule { name: "confidence_range", check: rules::confidence_range },
    ValidationRule { name: "evidence_score_range", check: rules::evidence_score_range },
    ValidationRule { name: "element_supported_by_evidence", check: rules::element_supported_by_evidence },
    ValidationRule { name: "review_status_consistency", check: rules::review_status_consistency },
    ValidationRule { name: "yin_yang_stroke_parity", check: rules::yin_yang_stroke_parity },
];

/// Run every rule against `record`
pub fn validate_record(record: ResolvedRecord) -> ValidatedRecord {
    let failed_rules: Vec<RuleFailure> = RULES
        .iter()
        .filter_map(|rule| {
            (rule.check)(&record).err().map(|reason| RuleFailure {
                rule: rule.name.to_string(),
                reason,
            })
        })
        .collect();

    ValidatedRecord {
        is_valid: failed_rules.is_empty(),
        failed_rules,
        record,
    }
}
