//! Model-free feature-hashing embedder.
//!
//! Hashes lowercase word unigrams and bigrams into [`EMBEDDING_DIM`] signed
//! buckets, then L2-normalizes. Texts sharing vocabulary land close together;
//! paraphrases with disjoint words do not. Deterministic across runs and builds.

use anyhow::Result;

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};

pub const MODEL_ID: &str = "hashing-v1";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bigrams weigh less than the words they're made of.
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Default, Clone)]
pub struct HashingEmbeddingProvider;

impl HashingEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        let mut v = vec![0.0f32; EMBEDDING_DIM];

        for token in &tokens {
            add_feature(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            add_feature(&mut v, bigram.as_bytes(), BIGRAM_WEIGHT);
        }

        Ok(l2_normalize(&v))
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn add_feature(v: &mut [f32], bytes: &[u8], weight: f32) {
    let h = fnv1a(bytes);
    let bucket = (h % EMBEDDING_DIM as u64) as usize;
    // High bit picks the sign so collisions partly cancel.
    let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
    v[bucket] += sign * weight;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}
