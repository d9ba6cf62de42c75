//! Index search

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{item_id, lookup_attribute};
use crate::infrastructure::traits::RestClient;

pub const DEFAULT_ROWS: u64 = 20;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub index: Option<String>,
    pub query: Option<String>,
    pub sort: Option<String>,
    pub start: u64,
    pub rows: Option<u64>,
    pub attribute: Option<String>,
    pub run_list: bool,
}

/// Result of a search: either bare ids or the paged envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutput {
    Ids(Vec<String>),
    Rows(Value),
}

pub struct SearchService {
    rest: Arc<dyn RestClient>,
}

impl SearchService {
    pub fn new(rest: Arc<dyn RestClient>) -> Self {
        Self { rest }
    }

    pub fn search(&self, query: &SearchQuery, id_only: bool) -> ApplicationResult<SearchOutput> {
        let (Some(index), Some(q)) = (
            query.index.as_deref().filter(|s| !s.is_empty()),
            query.query.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(ApplicationError::usage("You must specify an index and a query"));
        };

        let path = search_path(index, q, query.sort.as_deref(), query.start, query.rows);
        debug!("search: GET {}", path);
        let response = self.rest.get(&path)?;
        let rows: Vec<Value> = response
            .get("rows")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if id_only {
            return Ok(SearchOutput::Ids(rows.iter().filter_map(item_id).collect()));
        }
        let projected: Vec<Value> = rows.iter().map(|row| project_row(row, query)).collect();
        Ok(SearchOutput::Rows(json!({
            "total": projected.len(),
            "start": query.start,
            "rows": projected,
        })))
    }
}

fn search_path(index: &str, q: &str, sort: Option<&str>, start: u64, rows: Option<u64>) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    params.append_pair("q", q);
    if let Some(sort) = sort {
        params.append_pair("sort", sort);
    }
    params.append_pair("start", &start.to_string());
    params.append_pair("rows", &rows.unwrap_or(DEFAULT_ROWS).to_string());
    format!("search/{}?{}", index, params.finish())
}

fn project_row(row: &Value, query: &SearchQuery) -> Value {
    let id = item_id(row).map(Value::String).unwrap_or(Value::Null);
    if let Some(attribute) = &query.attribute {
        let mut out = Map::new();
        out.insert("id".to_string(), id);
        out.insert(
            attribute.clone(),
            lookup_attribute(row, attribute).cloned().unwrap_or(Value::Null),
        );
        return Value::Object(out);
    }
    if query.run_list {
        return json!({
            "id": id,
            "run_list": row.get("run_list").cloned().unwrap_or_else(|| json!([])),
        });
    }
    let mut full = row.clone();
    if let Some(object) = full.as_object_mut() {
        object.entry("id").or_insert(id);
    }
    full
}
