//! Boolean retrieval over sorted doc-id lists.
//!
//! Queries have the shape `term (OP term)*` with `OP` one of `AND`, `OR`,
//! `NOT`, and are evaluated strictly left to right: `a OR b NOT c AND d`
//! means `((a OR b) NOT c) AND d`.

use std::fmt;
use std::str::FromStr;

use crate::codec::PostingLookup;
use crate::error::{IndexError, Result};
use crate::posting::DocId;
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl FromStr for Operator {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            "NOT" => Ok(Operator::Not),
            other => Err(IndexError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        })
    }
}

impl Operator {
    pub fn apply(self, l1: &[DocId], l2: &[DocId]) -> Vec<DocId> {
        match self {
            Operator::And => intersect(l1, l2),
            Operator::Or => union_by(l1, l2, |&id| id),
            Operator::Not => difference(l1, l2),
        }
    }
}

/// A validated query with normalized terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    pub first: String,
    pub rest: Vec<(Operator, String)>,
}

impl BooleanQuery {
    /// Validate the query shape and operators, then normalize every term.
    /// Nothing is looked up here, so a bad query never touches the index.
    pub fn parse(query: &str, analyzer: &dyn Analyzer) -> Result<Self> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        match tokens.len() {
            0 => return Err(IndexError::InvalidQuery("empty query".into())),
            2 => return Err(IndexError::InvalidQuery(format!("[{query}] has an operator without a left operand"))),
            n if n % 2 == 0 => return Err(IndexError::InvalidQuery(format!("[{query}] ends with a dangling operator"))),
            _ => {}
        }

        let mut rest = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens[1..].chunks_exact(2) {
            let op: Operator = pair[0].parse()?;
            rest.push((op, analyzer.normalize_term(pair[1])));
        }
        Ok(Self { first: analyzer.normalize_term(tokens[0]), rest })
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.first.as_str()).chain(self.rest.iter().map(|(_, t)| t.as_str()))
    }

    pub fn evaluate(&self, index: &dyn PostingLookup) -> Vec<DocId> {
        let mut result = Operator::Or.apply(&[], &index.lookup(&self.first));
        for (op, term) in &self.rest {
            result = op.apply(&result, &index.lookup(term));
        }
        result
    }
}

/// Parse and evaluate `query` against `index`.
pub fn search(query: &str, index: &dyn PostingLookup, analyzer: &dyn Analyzer) -> Result<Vec<DocId>> {
    Ok(BooleanQuery::parse(query, analyzer)?.evaluate(index))
}

pub fn intersect(l1: &[DocId], l2: &[DocId]) -> Vec<DocId> {
    let (mut i, mut j) = (0, 0);
    let mut result = Vec::with_capacity(l1.len().min(l2.len()));
    while i < l1.len() && j < l2.len() {
        match l1[i].cmp(&l2[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push(l1[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Sorted union of two lists keyed by `key`. On equal keys the entry from `l1`
/// is kept. When one side runs out the other's remainder is appended, skipping
/// its head if it repeats the last emitted key.
pub fn union_by<T, F>(l1: &[T], l2: &[T], key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> DocId,
{
    if l1.is_empty() {
        return l2.to_vec();
    }
    if l2.is_empty() {
        return l1.to_vec();
    }
    let (mut i, mut j) = (0, 0);
    let mut result: Vec<T> = Vec::with_capacity(l1.len() + l2.len());
    while i < l1.len() && j < l2.len() {
        let (a, b) = (key(&l1[i]), key(&l2[j]));
        if a < b {
            result.push(l1[i].clone());
            i += 1;
        } else if b < a {
            result.push(l2[j].clone());
            j += 1;
        } else {
            result.push(l1[i].clone());
            i += 1;
            j += 1;
        }
    }
    let tail = if i < l1.len() { &l1[i..] } else { &l2[j..] };
    let skip = match (result.last(), tail.first()) {
        (Some(last), Some(head)) if key(last) == key(head) => 1,
        _ => 0,
    };
    result.extend_from_slice(&tail[skip..]);
    result
}

/// Ids of `l1` absent from `l2`.
pub fn difference(l1: &[DocId], l2: &[DocId]) -> Vec<DocId> {
    if l2.is_empty() {
        return l1.to_vec();
    }
    let mut result = Vec::with_capacity(l1.len());
    let mut j = 0;
    for &id in l1 {
        while j < l2.len() && l2[j] < id {
            j += 1;
        }
        if j == l2.len() || l2[j] != id {
            result.push(id);
        }
    }
    result
}
