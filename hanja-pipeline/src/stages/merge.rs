//! Dedup/Merge: one record per distinct character
//!
//! Records are grouped by character and ordered by precedence:
//! 1. explicit confidence, highest first (absent ranks lowest)
//! 2. configured source priority, lower first (unknown sources last)
//! 3. source name
//! 4. collection time
//!
//! Scalar fields take the first non-null value in that order. Readings are
//! unioned in the same order and every distinct
//! `(source, mechanism, suggestedElement)` becomes one evidence tuple.

use crate::error::PipelineError;
use crate::fusion::mechanism_weight;
use crate::types::{EvidenceTuple, MergedRecord, NormalizedRecord, Reading, Stage, StageKind, StageRun};
use crate::utils::map_ordered;
use async_trait::async_trait;
use hanja_common::config::{MechanismWeights, SourceConfig};
use hanja_common::oheng::sound_element;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

pub struct MergeStage {
    workers: usize,
    policy: Arc<MergePolicy>,
}

/// Source ranking and weights used while merging
#[derive(Debug, Clone)]
pub struct MergePolicy {
    priorities: HashMap<String, u32>,
    weights: MechanismWeights,
}

impl MergePolicy {
    pub fn new(sources: &[SourceConfig], weights: MechanismWeights) -> Self {
        Self {
            priorities: sources.iter().map(|s| (s.name.clone(), s.priority)).collect(),
            weights,
        }
    }

    fn priority(&self, source: &str) -> u32 {
        self.priorities.get(source).copied().unwrap_or(u32::MAX)
    }

    /// Precedence order between two observations of the same character
    fn compare(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> Ordering {
        let by_confidence = match (a.confidence, b.confidence) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_confidence
            .then_with(|| self.priority(&a.source).cmp(&self.priority(&b.source)))
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.collected_at.cmp(&b.collected_at))
    }
}

impl MergeStage {
    pub fn new(workers: usize, policy: MergePolicy) -> Self {
        Self {
            workers,
            policy: Arc::new(policy),
        }
    }
}

#[async_trait]
impl Stage for MergeStage {
    type Input = Vec<NormalizedRecord>;
    type Output = Vec<MergedRecord>;

    fn kind(&self) -> StageKind {
        StageKind::Merge
    }

    async fn run(&self, input: Vec<NormalizedRecord>) -> Result<StageRun<Vec<MergedRecord>>, PipelineError> {
        let total = input.len();

        let mut groups: BTreeMap<String, Vec<NormalizedRecord>> = BTreeMap::new();
        for record in input {
            groups.entry(record.character.clone()).or_default().push(record);
        }
        let groups: Vec<Vec<NormalizedRecord>> = groups.into_values().collect();

        let policy = Arc::clone(&self.policy);
        let merged = map_ordered(groups, self.workers, move |group| merge_group(group, &policy)).await?;
        let merged: Vec<MergedRecord> = merged.into_iter().flatten().collect();

        info!(records = total, characters = merged.len(), "Merge complete");

        let count = merged.len();
        Ok(StageRun::new(merged, total, count))
    }
}

/// Merge every observation of one character
///
/// Returns `None` only for an empty group.
pub fn merge_group(mut group: Vec<NormalizedRecord>, policy: &MergePolicy) -> Option<MergedRecord> {
    group.sort_by(|a, b| policy.compare(a, b));
    let character = group.first()?.character.clone();

    let meaning = group.iter().find_map(|r| r.meaning.clone());
    let strokes = group.iter().find_map(|r| r.strokes);
    let yin_yang = group.iter().find_map(|r| r.yin_yang);
    let confidence = group.iter().find_map(|r| r.confidence);

    let readings = merge_readings(&group);

    let mut candidates: Vec<EvidenceTuple> = Vec::new();
    for record in &group {
        let duplicate = candidates.iter().any(|t| {
            t.source == record.source
                && t.mechanism == record.mechanism
                && t.suggested_element == record.element
        });
        if !duplicate {
            candidates.push(EvidenceTuple {
                source: record.source.clone(),
                mechanism: record.mechanism,
                weight: mechanism_weight(record.mechanism, &policy.weights),
                suggested_element: record.element,
            });
        }
    }

    let mut sources: Vec<String> = Vec::new();
    for record in &group {
        if !sources.contains(&record.source) {
            sources.push(record.source.clone());
        }
    }

    Some(MergedRecord {
        character,
        meaning,
        strokes,
        yin_yang,
        confidence,
        readings,
        candidates,
        sources,
    })
}

fn merge_readings(group: &[NormalizedRecord]) -> Vec<Reading> {
    let mut texts: Vec<String> = Vec::new();
    let mut flags: Vec<Option<bool>> = Vec::new();

    for reading in group.iter().flat_map(|r| r.readings.iter()) {
        match texts.iter().position(|t| *t == reading.text) {
            Some(idx) => {
                if flags[idx].is_none() {
                    flags[idx] = reading.is_primary;
                }
            }
            None => {
                texts.push(reading.text.clone());
                flags.push(reading.is_primary);
            }
        }
    }

    let any_primary = flags.iter().any(|f| *f == Some(true));

    texts
        .into_iter()
        .zip(flags)
        .enumerate()
        .map(|(idx, (text, flag))| Reading {
            sound_element: sound_element(&text),
            is_primary: if any_primary { flag == Some(true) } else { idx == 0 },
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mechanism, RawReading};
    use chrono::{Duration, Utc};
    use hanja_common::config::PipelineConfig;
    use hanja_common::Element;

    fn record(source: &str, mechanism: Mechanism, element: Option<Element>) -> NormalizedRecord {
        NormalizedRecord {
            character: "賢".to_string(),
            source: source.to_string(),
            meaning: None,
            readings: vec![],
            strokes: None,
            element,
            mechanism,
            yin_yang: None,
            confidence: None,
            collected_at: Utc::now(),
        }
    }

    fn reading(text: &str, is_primary: Option<bool>) -> RawReading {
        RawReading {
            text: text.to_string(),
            is_primary,
        }
    }

    fn policy() -> MergePolicy {
        let config = PipelineConfig::default();
        MergePolicy::new(&config.sources, config.ruleset.weights)
    }

    #[test]
    fn test_confidence_wins_then_priority() {
        let mut low = record("expanded_table", Mechanism::Expanded, Some(Element::Metal));
        low.meaning = Some("from expanded".to_string());
        low.confidence = Some(0.5);
        let mut high = record("unknown", Mechanism::Base, Some(Element::Wood));
        high.meaning = Some("from unknown".to_string());
        high.confidence = Some(0.9);

        let merged = merge_group(vec![low, high], &policy()).unwrap();
        assert_eq!(merged.meaning.as_deref(), Some("from unknown"));
        assert_eq!(merged.sources, vec!["unknown", "expanded_table"]);

        let mut a = record("expanded_table", Mechanism::Expanded, None);
        a.meaning = Some("expanded".to_string());
        let mut b = record("base_table", Mechanism::Base, None);
        b.meaning = Some("base".to_string());
        let merged = merge_group(vec![a, b], &policy()).unwrap();
        assert_eq!(merged.meaning.as_deref(), Some("base"));
    }

    #[test]
    fn test_null_never_overwrites_value() {
        let mut first = record("base_table", Mechanism::Base, None);
        first.confidence = Some(0.9);
        let mut second = record("expanded_table", Mechanism::Expanded, None);
        second.strokes = Some(15);

        let merged = merge_group(vec![first, second], &policy()).unwrap();
        assert_eq!(merged.strokes, Some(15));
        assert_eq!(merged.confidence, Some(0.9));
    }

    #[test]
    fn test_collection_time_breaks_final_tie() {
        let mut later = record("x", Mechanism::Base, None);
        later.meaning = Some("later".to_string());
        later.collected_at = Utc::now() + Duration::seconds(5);
        let mut earlier = record("x", Mechanism::Base, None);
        earlier.meaning = Some("earlier".to_string());

        let merged = merge_group(vec![later, earlier], &policy()).unwrap();
        assert_eq!(merged.meaning.as_deref(), Some("earlier"));
    }

    #[test]
    fn test_reading_union_and_primary() {
        let mut a = record("base_table", Mechanism::Base, None);
        a.readings = vec![reading("현", None), reading("賢", Some(false))];
        let mut b = record("expanded_table", Mechanism::Expanded, None);
        b.readings = vec![reading("현", Some(true)), reading("hyeon", None)];

        let merged = merge_group(vec![a, b], &policy()).unwrap();
        let texts: Vec<&str> = merged.readings.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["현", "賢", "hyeon"]);
        assert!(merged.readings[0].is_primary);
        assert!(!merged.readings[1].is_primary);
        assert_eq!(merged.readings[0].sound_element, Some(Element::Earth));
        assert_eq!(merged.readings[2].sound_element, None);
    }

    #[test]
    fn test_first_reading_primary_when_unflagged() {
        let mut a = record("base_table", Mechanism::Base, None);
        a.readings = vec![reading("금", None), reading("김", None)];

        let merged = merge_group(vec![a], &policy()).unwrap();
        assert!(merged.readings[0].is_primary);
        assert!(!merged.readings[1].is_primary);
    }

    #[test]
    fn test_candidates_dedup_on_exact_tuple() {
        let merged = merge_group(
            vec![
                record("a", Mechanism::Base, Some(Element::Wood)),
                record("a", Mechanism::Base, Some(Element::Wood)),
                record("a", Mechanism::Base, Some(Element::Fire)),
                record("b", Mechanism::Base, Some(Element::Wood)),
            ],
            &policy(),
        )
        .unwrap();

        assert_eq!(merged.candidates.len(), 3);
        assert!(merged.candidates.iter().all(|t| t.weight == 0.4));
    }

    #[tokio::test]
    async fn test_stage_one_record_per_character() {
        let mut other = record("a", Mechanism::Base, Some(Element::Wood));
        other.character = "林".to_string();
        let input = vec![
            record("a", Mechanism::Base, Some(Element::Wood)),
            other,
            record("b", Mechanism::Expanded, Some(Element::Metal)),
        ];

        let run = MergeStage::new(2, policy()).run(input).await.unwrap();
        let characters: Vec<&str> = run.output.iter().map(|r| r.character.as_str()).collect();
        assert_eq!(characters, vec!["林", "賢"]);
        assert_eq!(run.processed_count, 3);
        assert_eq!(run.success_count, 2);
    }
}
