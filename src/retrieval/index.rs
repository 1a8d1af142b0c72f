//! Row embedding index
//!
//! Dense vectors over row-text encodings plus a positionally aligned
//! metadata list: vector *i* always corresponds to metadata entry *i*.
//! The index is rebuilt wholesale on every dataset load — there is no
//! incremental update — and persists as two co-located artifacts, a vector
//! file and a JSON metadata array, regenerated together so they can never
//! drift apart.

use crate::error::{InsightError, Result};
use crate::retrieval::embedder::{Embedder, Embedding};
use crate::stats::any_value_to_display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const VECTORS_FILE: &str = "vectors.json";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowText {
    pub row: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorFile {
    dimension: usize,
    vectors: Vec<Embedding>,
}

pub struct RowIndex {
    vectors: Vec<Embedding>,
    metadata: Vec<RowText>,
    dimension: usize,
}

/// Encode one row as "col: value | col: value", skipping nulls.
pub fn encode_row(df: &DataFrame, row: usize) -> Result<String> {
    let mut parts = Vec::new();
    for name in df.get_column_names() {
        let value = df.column(name)?.get(row)?;
        if matches!(value, AnyValue::Null) {
            continue;
        }
        parts.push(format!("{}: {}", name, any_value_to_display(&value)));
    }
    Ok(parts.join(" | "))
}

impl RowIndex {
    pub fn empty(dimension: usize) -> Self {
        Self {
            vectors: Vec::new(),
            metadata: Vec::new(),
            dimension,
        }
    }

    /// Build the index over every row of the dataset. Vectors and metadata
    /// come out of the same pass, which is what keeps them aligned.
    pub async fn build(df: &DataFrame, embedder: &dyn Embedder) -> Result<Self> {
        let mut texts = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            texts.push(encode_row(df, row)?);
        }

        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(InsightError::Index(format!(
                "Embedder returned {} vectors for {} rows",
                vectors.len(),
                texts.len()
            )));
        }

        let metadata = texts
            .into_iter()
            .enumerate()
            .map(|(row, text)| RowText { row, text })
            .collect();

        info!(rows = vectors.len(), "Row index built");
        Ok(Self {
            vectors,
            metadata,
            dimension: embedder.dimension(),
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn metadata(&self) -> &[RowText] {
        &self.metadata
    }

    /// Exhaustive k-nearest-neighbor search by squared Euclidean distance.
    /// Returns (position, distance) pairs, nearest first.
    pub fn search(&self, query: &Embedding, top_k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Map search positions back to row texts, discarding any position the
    /// metadata list cannot cover.
    pub fn texts_for(&self, positions: &[(usize, f32)]) -> Vec<String> {
        positions
            .iter()
            .filter_map(|(pos, _)| self.metadata.get(*pos).map(|m| m.text.clone()))
            .collect()
    }

    /// Persist both artifacts together.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let vector_file = VectorFile {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
        };
        std::fs::write(
            dir.join(VECTORS_FILE),
            serde_json::to_string(&vector_file)?,
        )?;
        std::fs::write(
            dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&self.metadata)?,
        )?;
        info!(dir = %dir.display(), rows = self.len(), "Row index saved");
        Ok(())
    }

    /// Load both artifacts; a length mismatch between them is corruption,
    /// not something to limp along with.
    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_text = std::fs::read_to_string(dir.join(VECTORS_FILE))
            .map_err(|e| InsightError::Index(format!("Cannot read vector file: {}", e)))?;
        let metadata_text = std::fs::read_to_string(dir.join(METADATA_FILE))
            .map_err(|e| InsightError::Index(format!("Cannot read metadata file: {}", e)))?;

        let vector_file: VectorFile = serde_json::from_str(&vectors_text)
            .map_err(|e| InsightError::Index(format!("Corrupt vector file: {}", e)))?;
        let metadata: Vec<RowText> = serde_json::from_str(&metadata_text)
            .map_err(|e| InsightError::Index(format!("Corrupt metadata file: {}", e)))?;

        if vector_file.vectors.len() != metadata.len() {
            return Err(InsightError::Index(format!(
                "Index misaligned: {} vectors vs {} metadata entries",
                vector_file.vectors.len(),
                metadata.len()
            )));
        }

        Ok(Self {
            vectors: vector_file.vectors,
            metadata,
            dimension: vector_file.dimension,
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
