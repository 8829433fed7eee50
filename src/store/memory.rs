use super::{pattern_matches, DocumentStore, Hit};
use crate::error::{LogifyError, Result};
use crate::query::{Clause, QueryDocument};
use crate::types::{LogDocument, SortOrder};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Partition = IndexMap<String, LogDocument>;

/// In-process document store.
///
/// Evaluates compiled queries directly against JSON documents with the same
/// observable semantics the search layer relies on from OpenSearch: exact
/// `.keyword` terms, AND-operator full-text matching within a single field,
/// inclusive date ranges and missing-last sorting. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    indices: RwLock<BTreeMap<String, Partition>>,
}

enum Predicate<'a> {
    Text(Vec<String>),
    AnyOf(&'a str, &'a [String]),
    Range(&'a str, DateTime<Utc>, DateTime<Utc>),
    Term(&'a str, &'a Value),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Partition>>> {
        self.indices
            .read()
            .map_err(|_| LogifyError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Partition>>> {
        self.indices
            .write()
            .map_err(|_| LogifyError::Store("memory store lock poisoned".into()))
    }

    /// Names of every index that holds at least one document.
    pub fn index_names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn document_count(&self, index: &str) -> Result<usize> {
        Ok(self.read()?.get(index).map(|p| p.len()).unwrap_or(0))
    }
}

fn strip_keyword(field: &str) -> &str {
    field.strip_suffix(".keyword").unwrap_or(field)
}

/// Resolve a dotted path. A key containing dots is tried whole first.
fn lookup<'a>(doc: &'a LogDocument, path: &str) -> Option<&'a Value> {
    if let Some(v) = doc.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    match doc.get(head)? {
        Value::Object(inner) => lookup(inner, rest),
        _ => None,
    }
}

fn values_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Array(items), _) => items.iter().any(|v| values_equal(v, wanted)),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => stored == wanted,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn collect_text<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// Parse a `strict_date_optional_time` value. With `round_up`, a bare date
/// means the last millisecond of that day.
fn parse_instant(raw: &str, round_up: bool) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(t.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if round_up {
        date.and_hms_milli_opt(23, 59, 59, 999)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(time.and_utc())
}

fn prepare(clauses: &[Clause]) -> Result<Vec<Predicate<'_>>> {
    clauses
        .iter()
        .map(|clause| {
            Ok(match clause {
                Clause::MultiMatch { query } => Predicate::Text(tokens(query)),
                Clause::AnyOf { field, values } => Predicate::AnyOf(strip_keyword(field), values),
                Clause::Range { field, gte, lte } => {
                    let parse = |raw: &str, round_up| {
                        parse_instant(raw, round_up).ok_or_else(|| {
                            LogifyError::InvalidRequest(format!(
                                "failed to parse date field [{}] with format [strict_date_optional_time]",
                                raw
                            ))
                        })
                    };
                    Predicate::Range(strip_keyword(field), parse(gte, false)?, parse(lte, true)?)
                }
                Clause::Term { field, value } => Predicate::Term(strip_keyword(field), value),
            })
        })
        .collect()
}

impl Predicate<'_> {
    fn matches(&self, doc: &LogDocument) -> bool {
        match self {
            // A query with no terms matches nothing.
            Predicate::Text(wanted) if wanted.is_empty() => false,
            Predicate::Text(wanted) => {
                let mut fields = Vec::new();
                doc.values().for_each(|v| collect_text(v, &mut fields));
                fields.iter().any(|text| {
                    let have: HashSet<String> = tokens(text).into_iter().collect();
                    wanted.iter().all(|w| have.contains(w))
                })
            }
            Predicate::AnyOf(field, values) => lookup(doc, field).is_some_and(|stored| {
                values
                    .iter()
                    .any(|v| values_equal(stored, &Value::String(v.clone())))
            }),
            Predicate::Range(field, gte, lte) => lookup(doc, field)
                .and_then(Value::as_str)
                .and_then(|raw| parse_instant(raw, false))
                .is_some_and(|t| t >= *gte && t <= *lte),
            Predicate::Term(field, value) => {
                lookup(doc, field).is_some_and(|stored| values_equal(stored, value))
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (parse_instant(x, false), parse_instant(y, false)) {
                (Some(p), Some(q)) => p.cmp(&q),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_hits(hits: &mut [Hit], field: &str, order: SortOrder) {
    let field = strip_keyword(field);
    hits.sort_by(|a, b| {
        match (lookup(&a.source, field), lookup(&b.source, field)) {
            (Some(x), Some(y)) => match order {
                SortOrder::Asc => compare_values(x, y),
                SortOrder::Desc => compare_values(y, x),
            },
            // Documents without the field sort last in either direction.
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn bucket_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn index_document(&self, index: &str, body: &[u8]) -> Result<String> {
        let doc = match serde_json::from_slice::<Value>(body)? {
            Value::Object(map) => map,
            other => {
                return Err(LogifyError::InvalidRequest(format!(
                    "document must be a JSON object, got {}",
                    other
                )))
            }
        };
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.write()?
            .entry(index.to_string())
            .or_default()
            .insert(id.clone(), doc);
        Ok(id)
    }

    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<()> {
        let Value::Object(map) = doc else {
            return Err(LogifyError::InvalidRequest(
                "document must be a JSON object".into(),
            ));
        };
        self.write()?
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), map.clone());
        Ok(())
    }

    async fn search(&self, pattern: &str, query: &QueryDocument) -> Result<Vec<Hit>> {
        let predicates = prepare(&query.must)?;
        let predicates = &predicates;
        let mut hits: Vec<Hit> = {
            let indices = self.read()?;
            indices
                .iter()
                .filter(|(name, _)| pattern_matches(pattern, name))
                .flat_map(move |(name, docs)| {
                    docs.iter()
                        .filter(move |(_, doc)| predicates.iter().all(|p| p.matches(doc)))
                        .map(move |(id, doc)| Hit {
                            index: name.clone(),
                            id: id.clone(),
                            source: doc.clone(),
                        })
                })
                .collect()
        };

        sort_hits(&mut hits, &query.sort.field, query.sort.order);
        Ok(hits
            .into_iter()
            .skip(query.from as usize)
            .take(query.size as usize)
            .collect())
    }

    async fn find_by_id(&self, pattern: &str, id: &str) -> Result<Option<Hit>> {
        let indices = self.read()?;
        Ok(indices
            .iter()
            .filter(|(name, _)| pattern_matches(pattern, name))
            .find_map(|(name, docs)| {
                docs.get(id).map(|doc| Hit {
                    index: name.clone(),
                    id: id.to_string(),
                    source: doc.clone(),
                })
            }))
    }

    async fn update_document(&self, index: &str, id: &str, partial: &Value) -> Result<()> {
        let Value::Object(fields) = partial else {
            return Err(LogifyError::InvalidRequest(
                "partial document must be a JSON object".into(),
            ));
        };
        let mut indices = self.write()?;
        let doc = indices
            .get_mut(index)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| LogifyError::DocumentNotFound(format!("{}/{}", index, id)))?;
        for (k, v) in fields {
            doc.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn terms(
        &self,
        index: &str,
        field: &str,
        filter: &[Clause],
        size: usize,
    ) -> Result<Vec<String>> {
        let predicates = prepare(filter)?;
        let field = strip_keyword(field);
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        {
            let indices = self.read()?;
            for (_, docs) in indices.iter().filter(|(name, _)| pattern_matches(index, name)) {
                for doc in docs.values() {
                    if !predicates.iter().all(|p| p.matches(doc)) {
                        continue;
                    }
                    if let Some(key) = lookup(doc, field).and_then(bucket_key) {
                        *counts.entry(key).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut buckets: Vec<(String, usize)> = counts.into_iter().collect();
        buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(buckets.into_iter().take(size).map(|(k, _)| k).collect())
    }
}
