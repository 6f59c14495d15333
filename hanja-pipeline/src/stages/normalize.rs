//! Normalize: canonicalize every raw record
//!
//! Lookups are total over a known vocabulary and return an explicit
//! "unrecognized" error for anything else. A failing record is dropped with a
//! structured `{field, originalValue, error}` entry; it is never coerced.

use crate::error::PipelineError;
use crate::types::{Mechanism, NormalizedRecord, RawReading, RawRecord, RecordIssue, Stage, StageKind, StageRun};
use crate::utils::map_ordered;
use async_trait::async_trait;
use hanja_common::oheng::{single_cjk_char, MAX_STROKES, MIN_STROKES};
use hanja_common::{Element, YinYang};
use serde_json::Value;
use tracing::{debug, info};

pub struct NormalizeStage {
    workers: usize,
}

impl NormalizeStage {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl Stage for NormalizeStage {
    type Input = Vec<RawRecord>;
    type Output = Vec<NormalizedRecord>;

    fn kind(&self) -> StageKind {
        StageKind::Normalize
    }

    async fn run(&self, input: Vec<RawRecord>) -> Result<StageRun<Vec<NormalizedRecord>>, PipelineError> {
        let total = input.len();
        let outcomes = map_ordered(input, self.workers, normalize_record).await?;

        let mut records = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(issue) => {
                    debug!(
                        character = issue.character.as_deref().unwrap_or(""),
                        field = issue.field.as_deref().unwrap_or(""),
                        "Record rejected: {}",
                        issue.message
                    );
                    errors.push(issue);
                }
            }
        }

        if total > 0 && records.is_empty() {
            return Err(PipelineError::NoOutput {
                stage: StageKind::Normalize,
                reason: format!("all {} records failed normalization", total),
                issues: errors,
            });
        }

        info!(total, normalized = records.len(), rejected = errors.len(), "Normalization complete");

        let normalized = records.len();
        let mut run = StageRun::new(records, total, normalized);
        run.errors = errors;
        Ok(run)
    }
}

/// Canonicalize one raw record
pub fn normalize_record(raw: RawRecord) -> Result<NormalizedRecord, RecordIssue> {
    let issue = |field: &str, original: &str, message: String| {
        RecordIssue::new(message)
            .character(raw.character.clone())
            .source(raw.source.clone())
            .field(field)
            .original_value(original)
    };

    let character = single_cjk_char(raw.character.trim())
        .map(String::from)
        .ok_or_else(|| {
            issue(
                "character",
                &raw.character,
                "must be exactly one CJK ideograph".to_string(),
            )
        })?;

    let meaning = raw
        .meaning
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);

    let readings = raw
        .readings
        .iter()
        .filter_map(|r| {
            let text = r.text.trim();
            (!text.is_empty()).then(|| RawReading {
                text: text.to_string(),
                is_primary: r.is_primary,
            })
        })
        .collect();

    let strokes = match &raw.strokes {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_strokes(value).map_err(|e| issue("strokes", &value.to_string(), e))?),
    };

    let element = match non_blank(raw.element_candidate.as_deref()) {
        None => None,
        Some(text) => Some(parse_element(text).map_err(|e| issue("elementCandidate", text, e))?),
    };

    let mechanism = match non_blank(raw.element_mechanism.as_deref()) {
        None => {
            return Err(issue(
                "elementMechanism",
                "",
                "missing mechanism tag".to_string(),
            ))
        }
        Some(text) => parse_mechanism(text).map_err(|e| issue("elementMechanism", text, e))?,
    };

    let yin_yang = match non_blank(raw.yin_yang.as_deref()) {
        None => None,
        Some(text) => Some(parse_yin_yang(text).map_err(|e| issue("yinYang", text, e))?),
    };

    let confidence = match &raw.confidence {
        None | Some(Value::Null) => None,
        Some(value) => {
            Some(parse_confidence(value).map_err(|e| issue("confidence", &value.to_string(), e))?)
        }
    };

    Ok(NormalizedRecord {
        character,
        source: raw.source.clone(),
        meaning,
        readings,
        strokes,
        element,
        mechanism,
        yin_yang,
        confidence,
        collected_at: raw.collected_at,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Vocabulary
// ============================================================================

/// Element from Han, Korean syllable, Korean word or English name
pub fn parse_element(text: &str) -> Result<Element, String> {
    let key = text.trim().to_lowercase();
    let element = match key.as_str() {
        "木" | "목" | "나무" | "wood" => Element::Wood,
        "火" | "화" | "불" | "fire" => Element::Fire,
        "土" | "토" | "흙" | "earth" => Element::Earth,
        "金" | "금" | "쇠" | "metal" => Element::Metal,
        "水" | "수" | "물" | "water" => Element::Water,
        _ => return Err(format!("unrecognized element '{}'", text)),
    };
    Ok(element)
}

/// Yin-yang from Han, Korean or English
pub fn parse_yin_yang(text: &str) -> Result<YinYang, String> {
    match text.trim().to_lowercase().as_str() {
        "陰" | "음" | "yin" => Ok(YinYang::Yin),
        "陽" | "양" | "yang" => Ok(YinYang::Yang),
        _ => Err(format!("unrecognized yin-yang value '{}'", text)),
    }
}

/// Mechanism tag, with short aliases for the rule mechanisms
pub fn parse_mechanism(text: &str) -> Result<Mechanism, String> {
    match text.trim().to_lowercase().as_str() {
        "base" => Ok(Mechanism::Base),
        "expanded" => Ok(Mechanism::Expanded),
        "stroke_rule" | "stroke" => Ok(Mechanism::StrokeRule),
        "sound_rule" | "sound" => Ok(Mechanism::SoundRule),
        _ => Err(format!("unrecognized mechanism '{}'", text)),
    }
}

/// Stroke count from an integer or integer string, within [1, 50]
pub fn parse_strokes(value: &Value) -> Result<u32, String> {
    let parsed: Option<i64> = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let strokes = parsed.ok_or_else(|| format!("stroke count {} is not an integer", value))?;
    if !(MIN_STROKES..=MAX_STROKES).contains(&strokes) {
        return Err(format!(
            "stroke count {} outside [{}, {}]",
            strokes, MIN_STROKES, MAX_STROKES
        ));
    }
    Ok(strokes as u32)
}

/// Confidence from a number or numeric string, within [0, 1]
pub fn parse_confidence(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let confidence = parsed
        .filter(|c| c.is_finite())
        .ok_or_else(|| format!("confidence {} is not a number", value))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {} outside [0, 1]", confidence));
    }
    Ok(confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn raw(character: &str) -> RawRecord {
        RawRecord {
            character: character.to_string(),
            source: "test".to_string(),
            meaning: Some("  어질 현 ".to_string()),
            readings: vec![
                RawReading { text: " 현 ".to_string(), is_primary: Some(true) },
                RawReading { text: "   ".to_string(), is_primary: None },
            ],
            strokes: Some(json!(15)),
            element_candidate: Some("木".to_string()),
            element_mechanism: Some("base".to_string()),
            yin_yang: Some("陽".to_string()),
            confidence: Some(json!(0.9)),
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_element_vocabulary() {
        for text in ["木", "목", "나무", "wood", " WOOD ", "Wood"] {
            assert_eq!(parse_element(text), Ok(Element::Wood), "{}", text);
        }
        assert_eq!(parse_element("金"), Ok(Element::Metal));
        assert_eq!(parse_element("물"), Ok(Element::Water));
        assert_eq!(parse_element("흙"), Ok(Element::Earth));
        assert_eq!(parse_element("불"), Ok(Element::Fire));
    }

    #[test]
    fn test_unknown_element_rejected() {
        let err = parse_element("xyz").unwrap_err();
        assert!(err.contains("unrecognized"));
    }

    #[test]
    fn test_yin_yang_and_mechanism_vocabulary() {
        assert_eq!(parse_yin_yang("음"), Ok(YinYang::Yin));
        assert_eq!(parse_yin_yang("YANG"), Ok(YinYang::Yang));
        assert!(parse_yin_yang("neutral").is_err());
        assert_eq!(parse_mechanism("stroke"), Ok(Mechanism::StrokeRule));
        assert_eq!(parse_mechanism("sound_rule"), Ok(Mechanism::SoundRule));
        assert!(parse_mechanism("guess").is_err());
    }

    #[test]
    fn test_strokes_and_confidence_ranges() {
        assert_eq!(parse_strokes(&json!(15)), Ok(15));
        assert_eq!(parse_strokes(&json!("12")), Ok(12));
        assert!(parse_strokes(&json!(0)).is_err());
        assert!(parse_strokes(&json!(51)).is_err());
        assert!(parse_strokes(&json!(7.5)).is_err());
        assert_eq!(parse_confidence(&json!("0.25")), Ok(0.25));
        assert!(parse_confidence(&json!(1.2)).is_err());
        assert!(parse_confidence(&json!(-0.1)).is_err());
    }

    #[test]
    fn test_record_canonicalized() {
        let record = normalize_record(raw(" 賢 ")).unwrap();
        assert_eq!(record.character, "賢");
        assert_eq!(record.meaning.as_deref(), Some("어질 현"));
        assert_eq!(record.readings.len(), 1);
        assert_eq!(record.readings[0].text, "현");
        assert_eq!(record.strokes, Some(15));
        assert_eq!(record.element, Some(Element::Wood));
        assert_eq!(record.mechanism, Mechanism::Base);
        assert_eq!(record.yin_yang, Some(YinYang::Yang));
    }

    #[test]
    fn test_record_with_unknown_element_is_dropped_with_detail() {
        let mut input = raw("賢");
        input.element_candidate = Some("xyz".to_string());

        let issue = normalize_record(input).unwrap_err();
        assert_eq!(issue.field.as_deref(), Some("elementCandidate"));
        assert_eq!(issue.original_value.as_deref(), Some("xyz"));
        assert_eq!(issue.character.as_deref(), Some("賢"));
    }

    #[test]
    fn test_non_cjk_character_rejected() {
        assert!(normalize_record(raw("현")).is_err());
        assert!(normalize_record(raw("賢明")).is_err());
    }

    #[tokio::test]
    async fn test_stage_counts_rejections() {
        let mut bad = raw("賢");
        bad.strokes = Some(json!(0));
        let stage = NormalizeStage::new(2);

        let run = stage.run(vec![raw("賢"), bad]).await.unwrap();
        assert_eq!(run.output.len(), 1);
        assert_eq!(run.processed_count, 2);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(run.errors[0].field.as_deref(), Some("strokes"));
    }

    #[tokio::test]
    async fn test_stage_fails_when_every_record_fails() {
        let mut bad = raw("賢");
        bad.element_candidate = Some("xyz".to_string());
        let stage = NormalizeStage::new(2);

        assert!(stage.run(vec![bad]).await.is_err());
        assert!(stage.run(vec![]).await.unwrap().output.is_empty());
    }
}
