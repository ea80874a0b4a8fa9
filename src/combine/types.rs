//! Data model for the per-shard score combiner

use serde::{Deserialize, Serialize};

/// Whether a `total_hits.count` is exact or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Equal,
    GreaterOrEqual,
}

/// Total matching document count for a query, with its precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    pub count: usize,
    pub relation: Relation,
}

impl TotalHits {
    pub fn new(count: usize, relation: Relation) -> Self {
        Self { count, relation }
    }
}

/// A typed sort-field value carried alongside a `FieldDoc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    I64(i64),
    F64(f64),
    Str(String),
}

impl Value {
    fn partial_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::I64(a), Value::I64(b)) => a.partial_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
            (Value::I64(a), Value::F64(b)) => (*a as f64).partial_cmp(b),
            (Value::F64(a), Value::I64(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// A plain (doc_id, score, shard_index) result as produced by one sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDoc {
    pub doc_id: i32,
    pub score: f32,
    pub shard_index: i32,
}

impl ScoreDoc {
    pub fn new(doc_id: i32, score: f32, shard_index: i32) -> Self {
        Self { doc_id, score, shard_index }
    }
}

/// A `ScoreDoc` widened with the per-field sort keys used to produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    pub doc: ScoreDoc,
    pub sort_fields: Vec<Value>,
}

/// Either a plain score doc or a field-sorted one, as carried through the
/// combiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RankedDoc {
    Score(ScoreDoc),
    Field(FieldDoc),
}

impl RankedDoc {
    pub fn doc_id(&self) -> i32 {
        match self {
            RankedDoc::Score(d) => d.doc_id,
            RankedDoc::Field(d) => d.doc.doc_id,
        }
    }

    pub fn score(&self) -> f32 {
        match self {
            RankedDoc::Score(d) => d.score,
            RankedDoc::Field(d) => d.doc.score,
        }
    }

    pub fn shard_index(&self) -> i32 {
        match self {
            RankedDoc::Score(d) => d.shard_index,
            RankedDoc::Field(d) => d.doc.shard_index,
        }
    }

    pub fn sort_fields(&self) -> &[Value] {
        match self {
            RankedDoc::Score(_) => &[],
            RankedDoc::Field(d) => &d.sort_fields,
        }
    }

    /// Returns a copy with `score` replaced.
    pub fn with_score(&self, score: f32) -> RankedDoc {
        match self {
            RankedDoc::Score(d) => RankedDoc::Score(ScoreDoc { score, ..*d }),
            RankedDoc::Field(d) => RankedDoc::Field(FieldDoc {
                doc: ScoreDoc { score, ..d.doc },
                sort_fields: d.sort_fields.clone(),
            }),
        }
    }
}

/// Type tag for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortFieldType {
    Score,
    Numeric,
    String,
}

/// One field (or the combined score) to sort by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortField {
    /// `None` when `field_type == Score`.
    pub field: Option<String>,
    pub field_type: SortFieldType,
    pub ascending: bool,
}

impl SortField {
    pub fn by_score(ascending: bool) -> Self {
        Self { field: None, field_type: SortFieldType::Score, ascending }
    }

    pub fn numeric(field: impl Into<String>, ascending: bool) -> Self {
        Self { field: Some(field.into()), field_type: SortFieldType::Numeric, ascending }
    }

    pub fn string(field: impl Into<String>, ascending: bool) -> Self {
        Self { field: Some(field.into()), field_type: SortFieldType::String, ascending }
    }
}

/// A sequence of sort fields applied in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    /// Whether the primary sort key is the combined score.
    pub fn is_by_score(&self) -> bool {
        self.fields.first().map(|f| f.field_type == SortFieldType::Score).unwrap_or(false)
    }

    /// Compare two docs' sort-key slices, honoring each field's direction.
    /// Unresolvable comparisons (mismatched types, missing slots) are
    /// treated as equal so the caller's tie-breaker can take over.
    pub fn compare(&self, a: &[Value], b: &[Value]) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for (i, field) in self.fields.iter().enumerate() {
            let (Some(av), Some(bv)) = (a.get(i), b.get(i)) else {
                continue;
            };
            let Some(ord) = av.partial_cmp(bv) else {
                continue;
            };
            let ord = if field.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// One sub-query's (or the combiner's own) ranked result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopDocs {
    pub score_docs: Vec<RankedDoc>,
    pub total_hits: TotalHits,
    /// True if this list is a `CollapseTopFieldDocs`: the last sort field
    /// of each `FieldDoc` carries the collapse key.
    pub collapsed: bool,
}

impl TopDocs {
    pub fn new(score_docs: Vec<RankedDoc>, total_hits: TotalHits) -> Self {
        Self { score_docs, total_hits, collapsed: false }
    }

    /// Marks this list as a `CollapseTopFieldDocs`: the combiner reads this
    /// flag on the first sub-query to decide whether to carry a collapse
    /// key through to its merged output.
    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = collapsed;
        self
    }
}

/// Identifies the shard a `CompoundTopDocs` belongs to, for the explain map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchShard {
    pub shard_id: i32,
    pub index_name: String,
}

impl SearchShard {
    pub fn new(shard_id: i32, index_name: impl Into<String>) -> Self {
        Self { shard_id, index_name: index_name.into() }
    }
}

/// Per-shard, per-query bundle mutated by the combiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundTopDocs {
    pub sub_query_top_docs: Vec<TopDocs>,
    pub score_docs: Vec<RankedDoc>,
    pub total_hits: TotalHits,
    pub shard: SearchShard,
}

impl CompoundTopDocs {
    pub fn new(sub_query_top_docs: Vec<TopDocs>, shard: SearchShard) -> Self {
        Self {
            sub_query_top_docs,
            score_docs: Vec::new(),
            total_hits: TotalHits::new(0, Relation::Equal),
            shard,
        }
    }
}
