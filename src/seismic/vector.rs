//! Sparse vector and doc-weight value types for the SEISMIC core
//!
//! Parallel `tokens`/`weights` arrays with dot product by merge-join, the
//! value domain here being byte-quantised weights over a SEISMIC term
//! posting rather than dense f32 embeddings.

use serde::{Deserialize, Serialize};

/// A sparse vector of quantised weights: tokens ascending, unique, weight
/// an unsigned byte (see [`crate::seismic::quantize`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SparseVector {
    tokens: Vec<u32>,
    weights: Vec<u8>,
}

/// Errors constructing or validating a [`SparseVector`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SparseVectorError {
    #[error("length mismatch: tokens={tokens_len}, weights={weights_len}")]
    LengthMismatch { tokens_len: usize, weights_len: usize },
    #[error("tokens must be strictly ascending and unique")]
    UnsortedTokens,
}

impl SparseVector {
    /// Build from parallel `tokens`/`weights` arrays, validating ordering.
    pub fn new(tokens: Vec<u32>, weights: Vec<u8>) -> Result<Self, SparseVectorError> {
        if tokens.len() != weights.len() {
            return Err(SparseVectorError::LengthMismatch {
                tokens_len: tokens.len(),
                weights_len: weights.len(),
            });
        }
        if tokens.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SparseVectorError::UnsortedTokens);
        }
        Ok(Self { tokens, weights })
    }

    /// Empty sparse vector.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Iterate `(token, weight)` pairs in ascending token order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.tokens.iter().copied().zip(self.weights.iter().copied())
    }

    pub fn nnz(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Highest token present, if any.
    pub fn max_token(&self) -> Option<u32> {
        self.tokens.last().copied()
    }

    /// Materialise a dense byte array of length `max_token + 1` (or the
    /// requested `len`, whichever is larger, so callers can size to a
    /// shared dictionary).
    pub fn to_dense(&self, len: usize) -> Vec<u8> {
        let size = len.max(self.max_token().map(|t| t as usize + 1).unwrap_or(0));
        let mut dense = vec![0u8; size];
        for (token, weight) in self.iter() {
            dense[token as usize] = weight;
        }
        dense
    }

    /// Sparse-dense dot product: `Σ w_sparse * dense[token]`, accumulated
    /// as `u32`. Pass the result through [`crate::seismic::quantize::sim_score`]
    /// to recover a float score.
    pub fn dot_dense(&self, dense: &[u8]) -> u32 {
        let mut acc: u32 = 0;
        for (token, weight) in self.iter() {
            let d = dense.get(token as usize).copied().unwrap_or(0);
            acc += u32::from(weight) * u32::from(d);
        }
        acc
    }

    /// Memory footprint in bytes: `u32` token array + `u8` weight array.
    pub fn ram_bytes(&self) -> usize {
        self.tokens.len() * std::mem::size_of::<u32>() + self.weights.len()
    }
}

/// A `(doc_id, weight)` pair from a term's base posting list.
///
/// Doc IDs are shard-local, `>= 0`; the `u8` weight is already quantised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocWeight {
    pub doc_id: i32,
    pub weight: u8,
}

impl DocWeight {
    pub fn new(doc_id: i32, weight: u8) -> Self {
        Self { doc_id, weight }
    }
}
