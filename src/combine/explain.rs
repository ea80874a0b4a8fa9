//! Per-doc combination rationale strings

use std::collections::HashMap;

use crate::error::{MergeError, Result};

use super::merge::{invert_scores, merge_sorted, score_then_doc_id, CombineScoresInput};
use super::technique::CombinationTechnique;
use super::types::{CompoundTopDocs, SearchShard};

/// One surviving doc's combined score plus a human-readable description of
/// how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationDetail {
    pub doc_id: i32,
    pub combined_score: f32,
    pub description: String,
}

fn base_description(technique: &CombinationTechnique, min_score: Option<f32>) -> String {
    let mut description = format!("{} [weights={}]", technique.name(), technique.weights_display());
    if let Some(min) = min_score {
        description.push_str(&format!(" [filtered by min_score: {min:.4}]"));
    }
    description
}

/// Performs the same scoring pass as [`super::merge::combine_scores`] but,
/// rather than mutating the shards, returns a description per surviving
/// doc for display.
pub fn explain(input: &CombineScoresInput<'_>) -> Result<HashMap<SearchShard, Vec<ExplanationDetail>>> {
    let mut out = HashMap::new();

    for shard in input.per_shard.iter() {
        if shard.sub_query_top_docs.is_empty() {
            return Err(MergeError::Invariant("shard has no sub-queries".to_string()));
        }

        let scores_by_doc = invert_scores(shard);
        let combined: HashMap<i32, f32> = scores_by_doc
            .iter()
            .map(|(&doc_id, scores)| (doc_id, input.technique.combine(scores)))
            .collect();
        let description = base_description(&input.technique, input.min_score);

        // Same ordering as combine_scores's steps 1-4: unsorted falls back
        // to score-then-doc_id, sorted routes through the shared merge so
        // explanations never diverge from the actual combined output.
        let ordered_ids: Vec<i32> = match &input.sort {
            None => {
                let mut ids: Vec<(i32, f32)> =
                    combined.iter().map(|(&id, &score)| (id, score)).collect();
                ids.sort_by(|&a, &b| score_then_doc_id(a, b));
                ids.into_iter().map(|(id, _)| id).collect()
            }
            Some(sort_spec) => merge_sorted(shard, sort_spec, &combined),
        };

        let mut details: Vec<ExplanationDetail> = ordered_ids
            .into_iter()
            .map(|doc_id| ExplanationDetail {
                doc_id,
                combined_score: combined.get(&doc_id).copied().unwrap_or(0.0),
                description: description.clone(),
            })
            .collect();

        if let Some(min) = input.min_score {
            let sort_by_score = input.sort.as_ref().map(|s| s.is_by_score()).unwrap_or(true);
            if input.sort.is_none() || sort_by_score {
                details.retain(|d| d.combined_score >= min);
            }
        }

        out.insert(shard.shard.clone(), details);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::types::{
        FieldDoc, Relation, RankedDoc, ScoreDoc, SearchShard as Shard, Sort, SortField, TopDocs,
        TotalHits, Value,
    };

    fn shard_with(sub_queries: Vec<Vec<(i32, f32)>>) -> CompoundTopDocs {
        let top_docs = sub_queries
            .into_iter()
            .map(|docs| {
                let score_docs =
                    docs.into_iter().map(|(id, s)| RankedDoc::Score(ScoreDoc::new(id, s, 0))).collect();
                TopDocs::new(score_docs, TotalHits::new(0, Relation::Equal))
            })
            .collect();
        CompoundTopDocs::new(top_docs, Shard::new(0, "idx".to_string()))
    }

    #[test]
    fn explain_returns_one_entry_per_surviving_doc() {
        let mut per_shard = vec![shard_with(vec![vec![(1, 0.5), (2, 0.9)]])];
        let input = CombineScoresInput {
            per_shard: &mut per_shard,
            technique: CombinationTechnique::ArithmeticMean { weights: Vec::new() },
            sort: None,
            min_score: None,
            is_single_shard: true,
        };
        let result = explain(&input).unwrap();
        let details = &result[&Shard::new(0, "idx".to_string())];
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].doc_id, 2);
    }

    #[test]
    fn explain_appends_min_score_suffix_once_per_doc() {
        let mut per_shard = vec![shard_with(vec![vec![(1, 0.5), (2, 0.9)]])];
        let input = CombineScoresInput {
            per_shard: &mut per_shard,
            technique: CombinationTechnique::ArithmeticMean { weights: Vec::new() },
            sort: None,
            min_score: Some(0.6),
            is_single_shard: true,
        };
        let result = explain(&input).unwrap();
        let details = &result[&Shard::new(0, "idx".to_string())];
        assert_eq!(details.len(), 1);
        assert!(details[0].description.contains("filtered by min_score: 0.6000"));
    }

    #[test]
    fn explain_orders_by_field_sort_not_just_combined_score() {
        // Doc 1 scores higher but sorts second: ascending numeric field
        // puts 20.0 before 50.0, matching combine_scores's own ordering.
        let field_doc = |doc_id: i32, score: f32, field: f64| {
            RankedDoc::Field(FieldDoc { doc: ScoreDoc::new(doc_id, score, 0), sort_fields: vec![Value::F64(field)] })
        };
        let top_docs = TopDocs::new(
            vec![field_doc(1, 0.9, 50.0), field_doc(2, 0.1, 20.0)],
            TotalHits::new(0, Relation::Equal),
        );
        let mut per_shard = vec![CompoundTopDocs::new(vec![top_docs], Shard::new(0, "idx".to_string()))];
        let input = CombineScoresInput {
            per_shard: &mut per_shard,
            technique: CombinationTechnique::ArithmeticMean { weights: Vec::new() },
            sort: Some(Sort::new(vec![SortField::numeric("price", true)])),
            min_score: None,
            is_single_shard: true,
        };
        let result = explain(&input).unwrap();
        let details = &result[&Shard::new(0, "idx".to_string())];
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].doc_id, 2);
        assert_eq!(details[1].doc_id, 1);
    }
}
