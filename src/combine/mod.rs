//! Hybrid-search result merger: per-shard score combination, sorting,
//! collapse handling, and explanations.

pub mod explain;
pub mod merge;
pub mod technique;
pub mod types;

pub use explain::{explain, ExplanationDetail};
pub use merge::{combine_scores, CombineScoresInput};
pub use technique::{parse_technique, CombinationTechnique};
pub use types::{
    CompoundTopDocs, FieldDoc, RankedDoc, Relation, ScoreDoc, SearchShard, Sort, SortField,
    SortFieldType, TopDocs, TotalHits, Value,
};
