//! Embedding encoding and cosine distance ranking shared by the store backends.

use std::cmp::Ordering;

use crate::error::MemoryError;
use crate::types::SearchHit;

#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// # Errors
///
/// Returns `MemoryError::InvalidEmbedding` if the blob length is not a multiple of
/// four bytes or holds non-finite values.
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>, MemoryError> {
    if !blob.len().is_multiple_of(4) {
        return Err(MemoryError::InvalidEmbedding(format!(
            "byte length {} is not a multiple of 4",
            blob.len()
        )));
    }
    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(MemoryError::InvalidEmbedding(
                "embedding contains non-finite values".into(),
            ));
        }
        out.push(value);
    }
    Ok(out)
}

/// `1 - cosine similarity`, in `[0, 2]`. Zero-norm or mismatched vectors get 1.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let distance = (1.0 - dot / denom) as f32;
    distance.clamp(0.0, 2.0)
}

/// Sort by ascending distance, ties by ascending chunk id, and keep `limit`.
pub fn rank(hits: &mut Vec<SearchHit>, limit: usize) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    hits.truncate(limit);
}
