//! TF-IDF vector-space ranking with cosine similarity and log-length normalization.
//!
//! Vectors have one dimension per query token occurrence, so a repeated query
//! term contributes several (equal) dimensions. Weights are
//! `(1 + log10(tf)) * log10(N / df)`, with `tf` taken from the query for the
//! query vector and from the posting list for document vectors. The cosine is
//! divided by `log16(max(16, doc_len))` to penalize long documents.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::DEFAULT_TOP_K;
use crate::doclen::DocumentLengths;
use crate::error::{IndexError, Result};
use crate::posting::{DocId, Posting};
use crate::query::union_by;
use crate::store::PostingStore;
use crate::tokenizer::Analyzer;

/// Documents shorter than this are not length-penalized.
const MIN_NORMALIZED_LENGTH: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

pub struct Ranker<'a> {
    postings: &'a PostingStore,
    lengths: &'a DocumentLengths,
    num_documents: u32,
    top_k: usize,
}

impl<'a> Ranker<'a> {
    pub fn new(postings: &'a PostingStore, lengths: &'a DocumentLengths, num_documents: u32) -> Self {
        Self { postings, lengths, num_documents, top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn rank(&self, query: &str, analyzer: &dyn Analyzer) -> Result<Vec<ScoredDoc>> {
        self.rank_terms(&analyzer.normalize(query))
    }

    /// Rank already-normalized query terms.
    pub fn rank_terms(&self, terms: &[String]) -> Result<Vec<ScoredDoc>> {
        let mut idf: HashMap<&str, f64> = HashMap::new();
        let mut candidates: Vec<Posting> = Vec::new();
        for term in terms {
            if idf.contains_key(term.as_str()) {
                continue;
            }
            let df = self.postings.document_frequency(term);
            idf.insert(term.as_str(), inverse_document_frequency(self.num_documents, df));
            candidates = union_by(&candidates, self.postings.postings(term), |p| p.doc_id);
        }

        let query_vec = query_vector(terms, &idf);
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let doc_vec = self.document_vector(terms, &idf, candidate.doc_id);
            let cosine = cosine_similarity(&query_vec, &doc_vec)?;
            let score = cosine / length_penalty(self.doc_length(candidate.doc_id));
            scored.push(ScoredDoc { doc_id: candidate.doc_id, score });
        }

        tracing::debug!(terms = terms.len(), candidates = scored.len(), "ranked");
        // sort_by is stable: equal scores keep ascending doc id order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.top_k);
        Ok(scored)
    }

    fn document_vector(&self, terms: &[String], idf: &HashMap<&str, f64>, doc_id: DocId) -> Vec<f64> {
        terms
            .iter()
            .map(|t| {
                let tf = term_frequency(self.postings.postings(t), doc_id);
                if tf == 0 {
                    0.0
                } else {
                    tf_weight(tf) * idf.get(t.as_str()).copied().unwrap_or(0.0)
                }
            })
            .collect()
    }

    fn doc_length(&self, doc_id: DocId) -> u32 {
        match self.lengths.get(doc_id) {
            Some(len) => len,
            None => {
                tracing::warn!(doc_id, "document length unknown; ranking without length penalty");
                MIN_NORMALIZED_LENGTH as u32
            }
        }
    }
}

/// `log10(N / df)`, or 0 for a term with no postings.
pub fn inverse_document_frequency(num_documents: u32, df: usize) -> f64 {
    if df == 0 {
        return 0.0;
    }
    (num_documents as f64 / df as f64).log10()
}

fn tf_weight(tf: u32) -> f64 {
    1.0 + (tf as f64).log10()
}

/// One weight per query token, using the token's count within the query.
pub fn query_vector(terms: &[String], idf: &HashMap<&str, f64>) -> Vec<f64> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for t in terms {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    terms
        .iter()
        .map(|t| tf_weight(counts[t.as_str()]) * idf.get(t.as_str()).copied().unwrap_or(0.0))
        .collect()
}

/// Binary search for `doc_id` in a sorted posting list; 0 when absent.
pub fn term_frequency(postings: &[Posting], doc_id: DocId) -> u32 {
    postings
        .binary_search_by_key(&doc_id, |p| p.doc_id)
        .map(|i| postings[i].tf)
        .unwrap_or(0)
}

/// Cosine of two equally sized vectors. An all-zero vector on either side scores 0.
pub fn cosine_similarity(query: &[f64], document: &[f64]) -> Result<f64> {
    if query.len() != document.len() {
        return Err(IndexError::VectorLengthMismatch { query: query.len(), document: document.len() });
    }
    let (mut dot, mut q_norm, mut d_norm) = (0.0f64, 0.0f64, 0.0f64);
    for (q, d) in query.iter().zip(document) {
        dot += q * d;
        q_norm += q * q;
        d_norm += d * d;
    }
    if q_norm == 0.0 || d_norm == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (q_norm.sqrt() * d_norm.sqrt()))
}

/// `log16(max(16, doc_len))`, always >= 1.
pub fn length_penalty(doc_len: u32) -> f64 {
    (doc_len as f64).max(MIN_NORMALIZED_LENGTH).log(16.0)
}
