//! Per-shard merge of sub-query ranked lists into one combined list

use std::collections::HashMap;

use tracing::debug;

use crate::error::{MergeError, Result};

use super::technique::CombinationTechnique;
use super::types::{CompoundTopDocs, RankedDoc, Relation, Sort, TotalHits, Value};

/// Invert a shard's per-sub-query lists into `doc_id -> [score; N]`.
pub(crate) fn invert_scores(shard: &CompoundTopDocs) -> HashMap<i32, Vec<f32>> {
    let n = shard.sub_query_top_docs.len();
    let mut scores: HashMap<i32, Vec<f32>> = HashMap::new();
    for (j, sub_query) in shard.sub_query_top_docs.iter().enumerate() {
        for doc in &sub_query.score_docs {
            let entry = scores.entry(doc.doc_id()).or_insert_with(|| vec![0.0; n]);
            entry[j] = doc.score();
        }
    }
    scores
}

/// Compare two docs by combined score descending, then doc_id ascending —
/// the total order used on the unsorted path and as the sorted path's
/// final tie-breaker.
pub(crate) fn score_then_doc_id(a: (i32, f32), b: (i32, f32)) -> std::cmp::Ordering {
    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
}

/// Each output doc's collapse key, read from the first sub-query only (per
/// the contract: only that list is ever a `CollapseTopFieldDocs`). `None`
/// when collapse isn't active or the doc didn't appear in that sub-query.
/// `real_sort_len` is the number of "real" sort fields (`sort.fields.len()`)
/// so a sub-query that already carries its own trailing collapse slot
/// doesn't get double-counted.
fn collapse_key(shard: &CompoundTopDocs, doc_id: i32, real_sort_len: usize) -> Option<Value> {
    let first = shard.sub_query_top_docs.first()?;
    if !first.collapsed {
        return None;
    }
    first
        .score_docs
        .iter()
        .find(|d| d.doc_id() == doc_id)
        .and_then(|d| d.sort_fields().get(real_sort_len).cloned())
}

fn combined_relation(shard: &CompoundTopDocs) -> Relation {
    if shard
        .sub_query_top_docs
        .iter()
        .any(|t| t.total_hits.relation == Relation::GreaterOrEqual)
    {
        Relation::GreaterOrEqual
    } else {
        Relation::Equal
    }
}

/// Input bundle for [`combine_scores`] / [`explain`].
pub struct CombineScoresInput<'a> {
    pub per_shard: &'a mut [CompoundTopDocs],
    pub technique: CombinationTechnique,
    pub sort: Option<Sort>,
    pub min_score: Option<f32>,
    pub is_single_shard: bool,
}

/// Merge every shard's sub-query lists into its combined `score_docs`,
/// in place.
pub fn combine_scores(input: CombineScoresInput<'_>) -> Result<()> {
    let CombineScoresInput { per_shard, technique, sort, min_score, is_single_shard } = input;

    debug!(
        "combining {} shard(s) with {}, sort={}, min_score={:?}",
        per_shard.len(),
        technique.name(),
        sort.is_some(),
        min_score
    );

    for shard in per_shard.iter_mut() {
        let n = shard.sub_query_top_docs.len();
        if n == 0 {
            return Err(MergeError::Invariant("shard has no sub-queries".to_string()));
        }

        let scores_by_doc = invert_scores(shard);
        let combined: HashMap<i32, f32> =
            scores_by_doc.iter().map(|(&id, scores)| (id, technique.combine(scores))).collect();

        let sort_active = sort.is_some();
        let sort_by_score = sort.as_ref().map(Sort::is_by_score).unwrap_or(false);
        let min_score_eligible = sort.is_none() || sort_by_score;

        // Already deduplicated: the unsorted path draws from a doc_id-keyed
        // map, and merge_sorted dedups explicitly.
        let ordered_ids: Vec<i32> = match &sort {
            None => {
                let mut ids: Vec<(i32, f32)> =
                    combined.iter().map(|(&id, &score)| (id, score)).collect();
                ids.sort_by(|&a, &b| score_then_doc_id(a, b));
                ids.into_iter().map(|(id, _)| id).collect()
            }
            Some(sort_spec) => merge_sorted(shard, sort_spec, &combined),
        };

        let mut docs: Vec<RankedDoc> = ordered_ids
            .into_iter()
            .map(|id| build_output_doc(shard, id, &combined, sort.as_ref(), is_single_shard))
            .collect();

        let original_total = shard.sub_query_top_docs.iter().map(|t| t.total_hits.count).max().unwrap_or(0);

        if let (Some(min), true) = (min_score, min_score_eligible) {
            let before = docs.len();
            docs.retain(|d| d.score() >= min || d.score().is_nan());
            let after = docs.len();
            shard.total_hits = if after < before {
                TotalHits::new(after, Relation::Equal)
            } else {
                TotalHits::new(original_total, combined_relation(shard))
            };
        } else {
            shard.total_hits = TotalHits::new(original_total, combined_relation(shard));
        }

        shard.score_docs = docs;
    }

    Ok(())
}

/// Sorted-path merge: gather every sub-query's `FieldDoc`s with their
/// (possibly score-overridden) sort keys, run a stable merge by `sort`,
/// tie-break by score then doc_id, then dedup by doc_id in first-seen
/// order. A sub-query's trailing collapse slot (if any) rides along
/// unexamined here — `sort.compare` only ever looks at `sort.fields.len()`
/// slots — and is re-derived canonically by [`collapse_key`] when the
/// output doc is built.
pub(crate) fn merge_sorted(shard: &CompoundTopDocs, sort: &Sort, combined: &HashMap<i32, f32>) -> Vec<i32> {
    let sort_by_score = sort.is_by_score();

    let mut entries: Vec<(i32, f32, Vec<Value>)> = Vec::new();
    for sub_query in &shard.sub_query_top_docs {
        if sub_query.score_docs.is_empty() {
            continue;
        }
        for doc in &sub_query.score_docs {
            let doc_id = doc.doc_id();
            let score = combined.get(&doc_id).copied().unwrap_or(0.0);
            let mut keys = doc.sort_fields().to_vec();
            if sort_by_score {
                if keys.is_empty() {
                    keys.push(Value::F64(f64::from(score)));
                } else {
                    keys[0] = Value::F64(f64::from(score));
                }
            }
            entries.push((doc_id, score, keys));
        }
    }

    entries.sort_by(|a, b| {
        sort.compare(&a.2, &b.2).then_with(|| score_then_doc_id((a.0, a.1), (b.0, b.1)))
    });

    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|(id, _, _)| seen.insert(*id))
        .map(|(id, _, _)| id)
        .collect()
}

/// Builds one output doc: looks up its real sort-field values (truncated to
/// `sort`'s own field count, dropping any sub-query-local collapse slot),
/// applies the sort-by-score override, then appends the canonical collapse
/// key from [`collapse_key`] as one extra trailing slot when the first
/// sub-query is a collapsed list. Collapse has no meaning without an
/// active sort, so a `None` sort always yields a plain `ScoreDoc`.
fn build_output_doc(
    shard: &CompoundTopDocs,
    doc_id: i32,
    combined: &HashMap<i32, f32>,
    sort: Option<&Sort>,
    is_single_shard: bool,
) -> RankedDoc {
    let score = combined.get(&doc_id).copied().unwrap_or(0.0);
    let sort_active = sort.is_some();
    let sort_by_score = sort.map(Sort::is_by_score).unwrap_or(false);
    let emitted_score = if is_single_shard && sort_active && !sort_by_score { f32::NAN } else { score };

    let Some(sort_spec) = sort else {
        return RankedDoc::Score(super::types::ScoreDoc::new(doc_id, emitted_score, 0));
    };

    let real_len = sort_spec.fields.len();
    let mut fields: Vec<Value> = shard
        .sub_query_top_docs
        .iter()
        .find_map(|sub| sub.score_docs.iter().find(|d| d.doc_id() == doc_id))
        .map(|d| {
            let mut keys = d.sort_fields().to_vec();
            keys.truncate(real_len);
            keys
        })
        .unwrap_or_default();

    if sort_by_score {
        if fields.is_empty() {
            fields.push(Value::F64(f64::from(score)));
        } else {
            fields[0] = Value::F64(f64::from(score));
        }
    }

    if let Some(collapse) = collapse_key(shard, doc_id, real_len) {
        fields.push(collapse);
    }

    RankedDoc::Field(super::types::FieldDoc {
        doc: super::types::ScoreDoc::new(doc_id, emitted_score, 0),
        sort_fields: fields,
    })
}
