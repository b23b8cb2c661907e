//! Aggregation pipelines.
//!
//! A small stage vocabulary covering what the dashboard and tag rollups
//! need. The cache layer never inspects a pipeline; it only keys the
//! result by the query shape that produced it.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::query::{compare_documents, lookup, Filter, Sort};

/// Per-group accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Number of documents whose field is `true`.
    CountTrue(String),
    /// Number of documents whose field is present and not null.
    CountPresent(String),
}

impl Accumulator {
    fn counts(&self, doc: &Value) -> bool {
        match self {
            Accumulator::Count => true,
            Accumulator::CountTrue(field) => lookup(doc, field) == Some(&Value::Bool(true)),
            Accumulator::CountPresent(field) => lookup(doc, field).is_some_and(|v| !v.is_null()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stage {
    Match(Filter),
    /// One output document per element of a top-level array field.
    /// Documents where the field is missing or empty are dropped.
    Unwind(String),
    /// Groups by a field (or everything, with `None`) into
    /// `{"_id": key, <name>: <count>...}` documents, in first-seen order.
    Group {
        by: Option<String>,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Adds a field holding the sum of numeric fields.
    AddSum { field: String, of: Vec<String> },
    Sort(Vec<Sort>),
    Limit(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pipeline(Vec<Stage>);

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.0
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.0.push(stage);
        self
    }

    pub fn matching(self, filter: Filter) -> Self {
        match filter {
            Filter::All => self,
            filter => self.then(Stage::Match(filter)),
        }
    }

    pub fn unwind(self, field: &str) -> Self {
        self.then(Stage::Unwind(field.to_string()))
    }

    pub fn group(self, by: Option<&str>, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.then(Stage::Group {
            by: by.map(str::to_string),
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.to_string(), acc))
                .collect(),
        })
    }

    pub fn count_by(self, field: &str) -> Self {
        self.group(Some(field), vec![("count", Accumulator::Count)])
    }

    pub fn add_sum(self, field: &str, of: &[&str]) -> Self {
        self.then(Stage::AddSum {
            field: field.to_string(),
            of: of.iter().map(|f| f.to_string()).collect(),
        })
    }

    pub fn sort(self, sort: Vec<Sort>) -> Self {
        self.then(Stage::Sort(sort))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.then(Stage::Limit(limit))
    }
}

/// Runs a pipeline over an in-memory collection of documents.
pub fn run_pipeline(docs: Vec<Value>, pipeline: &Pipeline) -> Vec<Value> {
    pipeline
        .stages()
        .iter()
        .fold(docs, |docs, stage| run_stage(docs, stage))
}

fn run_stage(docs: Vec<Value>, stage: &Stage) -> Vec<Value> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
        Stage::Unwind(field) => docs
            .into_iter()
            .flat_map(|doc| unwind(doc, field))
            .collect(),
        Stage::Group { by, accumulators } => group(docs, by.as_deref(), accumulators),
        Stage::AddSum { field, of } => docs
            .into_iter()
            .map(|mut doc| {
                let total: f64 = of
                    .iter()
                    .filter_map(|f| lookup(&doc, f).and_then(Value::as_f64))
                    .sum();
                if let Value::Object(object) = &mut doc {
                    object.insert(field.clone(), number(total));
                }
                doc
            })
            .collect(),
        Stage::Sort(sort) => {
            let mut docs = docs;
            docs.sort_by(|a, b| compare_documents(a, b, sort));
            docs
        }
        Stage::Limit(limit) => docs
            .into_iter()
            .take(usize::try_from(*limit).unwrap_or(usize::MAX))
            .collect(),
    }
}

fn unwind(doc: Value, field: &str) -> Vec<Value> {
    let Some(Value::Array(items)) = doc.get(field).cloned() else {
        return Vec::new();
    };
    items
        .into_iter()
        .map(|item| {
            let mut copy = doc.clone();
            if let Value::Object(object) = &mut copy {
                object.insert(field.to_string(), item);
            }
            copy
        })
        .collect()
}

fn group(docs: Vec<Value>, by: Option<&str>, accumulators: &[(String, Accumulator)]) -> Vec<Value> {
    let mut order: Vec<Value> = Vec::new();
    let mut counts: HashMap<String, Vec<u64>> = HashMap::new();

    for doc in &docs {
        let key = by
            .and_then(|field| lookup(doc, field))
            .cloned()
            .unwrap_or(Value::Null);
        let slot = key.to_string();
        let totals = counts.entry(slot).or_insert_with(|| {
            order.push(key.clone());
            vec![0; accumulators.len()]
        });
        for (total, (_, acc)) in totals.iter_mut().zip(accumulators) {
            if acc.counts(doc) {
                *total += 1;
            }
        }
    }

    order
        .into_iter()
        .map(|key| {
            let totals = counts.get(&key.to_string()).cloned().unwrap_or_default();
            let mut object = Map::new();
            object.insert("_id".to_string(), key);
            for ((name, _), total) in accumulators.iter().zip(totals) {
                object.insert(name.clone(), Value::from(total));
            }
            Value::Object(object)
        })
        .collect()
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&value) {
        Value::from(value as u64)
    } else {
        Value::from(value)
    }
}
