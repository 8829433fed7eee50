//! Structured search compilation.
//!
//! [`compile`] turns a [`SearchRequest`](crate::types::SearchRequest) into a
//! [`QueryDocument`], a typed boolean query that the OpenSearch store renders
//! as JSON DSL and the in-memory store evaluates directly.

pub mod compiler;

pub use compiler::{compile, keyword_field, Clause, QueryDocument, SortSpec, MAX_PAGE_SIZE};
