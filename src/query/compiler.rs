use crate::types::{SearchRequest, SortOrder};
use serde_json::{json, Map, Value};

pub const DEFAULT_SORT_FIELD: &str = "timestamp";
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Text fields indexed with a `.keyword` sub-field for exact match and sort.
const KEYWORD_FIELDS: &[&str] = &["level", "service", "message", "tenant_id", "project_id"];

/// One conjunct of the compiled boolean query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Full-text match: every term of `query` must occur within a single field.
    MultiMatch { query: String },
    /// Disjunction of exact matches; at least one value must equal the field.
    AnyOf { field: String, values: Vec<String> },
    /// Inclusive range on a date field.
    Range { field: String, gte: String, lte: String },
    /// Exact equality.
    Term { field: String, value: Value },
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::MultiMatch { query } => json!({
                "multi_match": {
                    "query": query,
                    "type": "best_fields",
                    "operator": "and"
                }
            }),
            Clause::AnyOf { field, values } => {
                let should: Vec<Value> = values
                    .iter()
                    .map(|v| json!({ "term": { field.as_str(): v } }))
                    .collect();
                json!({
                    "bool": {
                        "should": should,
                        "minimum_should_match": 1
                    }
                })
            }
            Clause::Range { field, gte, lte } => json!({
                "range": {
                    field.as_str(): {
                        "gte": gte,
                        "lte": lte,
                        "format": "strict_date_optional_time"
                    }
                }
            }),
            Clause::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// Store-agnostic form of a search: conjunctive clauses, one sort key and a
/// page window.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    pub must: Vec<Clause>,
    pub sort: SortSpec,
    pub from: u64,
    pub size: u64,
}

impl QueryDocument {
    /// Render as an OpenSearch / Elasticsearch search body.
    pub fn to_json(&self) -> Value {
        let must: Vec<Value> = self.must.iter().map(Clause::to_json).collect();
        let mut sort_key = Map::new();
        sort_key.insert(
            self.sort.field.clone(),
            json!({ "order": self.sort.order.as_str() }),
        );
        json!({
            "query": { "bool": { "must": must } },
            "sort": [Value::Object(sort_key)],
            "from": self.from,
            "size": self.size
        })
    }
}

/// Field name used for exact matching and sorting on `field`.
pub fn keyword_field(field: &str) -> String {
    if KEYWORD_FIELDS.contains(&field) {
        format!("{}.keyword", field)
    } else {
        field.to_string()
    }
}

/// Compile a search request. Pure and deterministic; never fails.
///
/// Clause order: message fragments, services, levels, timestamp range,
/// metadata (sorted by key), then the project and tenant scope terms.
pub fn compile(req: &SearchRequest) -> QueryDocument {
    let mut must = Vec::new();

    for fragment in &req.message_contains {
        must.push(Clause::MultiMatch {
            query: fragment.clone(),
        });
    }

    if !req.services.is_empty() {
        must.push(Clause::AnyOf {
            field: keyword_field("service"),
            values: req.services.clone(),
        });
    }

    if !req.levels.is_empty() {
        must.push(Clause::AnyOf {
            field: keyword_field("level"),
            values: req.levels.clone(),
        });
    }

    if req.timestamp_range.is_complete() {
        must.push(Clause::Range {
            field: "timestamp".to_string(),
            gte: req.timestamp_range.from.clone(),
            lte: req.timestamp_range.to.clone(),
        });
    }

    let mut keys: Vec<&String> = req.metadata.keys().collect();
    keys.sort();
    for key in keys {
        let value = &req.metadata[key];
        let field = match value {
            Value::String(_) => format!("metadata.{}.keyword", key),
            _ => format!("metadata.{}", key),
        };
        must.push(Clause::Term {
            field,
            value: value.clone(),
        });
    }

    must.push(Clause::term(
        keyword_field("project_id"),
        req.project_id.as_str(),
    ));
    must.push(Clause::term(
        keyword_field("tenant_id"),
        req.tenant_id.as_str(),
    ));

    let sort_field = match req.sort.trim() {
        "" => DEFAULT_SORT_FIELD,
        field => field,
    };

    let page = req.page.max(1) as u64;
    let size = if req.limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        (req.limit as u64).min(MAX_PAGE_SIZE)
    };

    QueryDocument {
        must,
        sort: SortSpec {
            field: keyword_field(sort_field),
            order: SortOrder::from_param(&req.order),
        },
        from: (page - 1).saturating_mul(size),
        size,
    }
}
