//! Text embeddings and vector distance.
//!
//! The default embedder is a deterministic hash-based bag-of-words model:
//! cheap, dependency-free and stable across runs and platforms, which is what
//! the tests and the ranking invariants need. A real sentence-embedding model
//! slots in behind the [`Embedder`] trait without touching the store.

use sha2::{Digest, Sha256};

/// Dimensionality of every vector in the store.
pub const EMBEDDING_DIM: usize = 384;

/// Anything that can turn text into a fixed-dimension vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Deterministic bag-of-words embedder. Each lowercase alphanumeric token is
/// hashed into one of [`EMBEDDING_DIM`] buckets; the resulting count vector
/// is L2-normalized so dot products are cosine similarities.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn bucket(token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % EMBEDDING_DIM as u64) as usize
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[Self::bucket(token)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine distance between two unit vectors, in `[0, 2]`. Lower is more
/// similar. A zero vector (empty text) is maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    if dot == 0.0 {
        let a_zero = a.iter().all(|v| *v == 0.0);
        let b_zero = b.iter().all(|v| *v == 0.0);
        if a_zero || b_zero {
            return 1.0;
        }
    }
    1.0 - dot
}

/// Serialize a vector for BLOB storage, little-endian f32.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Parse a BLOB back into a vector. Trailing partial floats are rejected by
/// construction since the chunk size is exact.
pub fn vector_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(chunk);
            f32::from_le_bytes(buf)
        })
        .collect()
}
