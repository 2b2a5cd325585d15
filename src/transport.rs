use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// One REST call, already reduced to what the rentacar API needs: a path
/// relative to the API root, query parameters, and an optional JSON body.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Whatever came back. `Err` from a transport means the request never
/// produced an HTTP response; any status that arrived lands here.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    /// Parsed X-Total-Count pagination header, when the backend sent one.
    pub total_count: Option<u64>,
    pub body: Option<Value>,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn execute(&self, request: &WireRequest) -> Result<WireResponse>;
}

/// Blocking HTTP transport over a base URL, e.g. `http://localhost:8080/`.
/// PATCH bodies go out as merge-patch+json, which is what the backend's
/// partial-update endpoints consume.
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        // A trailing slash makes Url::join treat the last segment as a
        // directory instead of replacing it.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };
        Ok(Self {
            http: reqwest::blocking::Client::new(),
            base_url,
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &WireRequest) -> Result<WireResponse> {
        let url = self.base_url.join(&request.path)?;
        log::debug!("HTTP {:?}: url='{}'", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Put => self.http.put(url),
            Method::Patch => self.http.patch(url),
            Method::Delete => self.http.delete(url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            let content_type = match request.method {
                Method::Patch => "application/merge-patch+json",
                _ => "application/json",
            };
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(serde_json::to_vec(body)?);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let total_count = response
            .headers()
            .get("X-Total-Count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };

        log::debug!(
            "HTTP {:?} RESULT: status={}, {} bytes",
            request.method,
            status,
            text.len()
        );
        Ok(WireResponse {
            status,
            total_count,
            body,
        })
    }
}

/// In-memory stand-in for the rentacar backend. Implements the same REST
/// contract the server does (id assignment, merge-patch, paging with
/// X-Total-Count, substring search) and records every request so tests can
/// assert on exactly what was called.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<BackendState>>,
}

#[derive(Default)]
struct BackendState {
    collections: HashMap<String, BTreeMap<i64, Value>>,
    next_ids: HashMap<String, i64>,
    requests: Vec<(Method, String)>,
}

enum Route {
    Collection(String),
    Item(String, i64),
    Search(String),
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request executed so far, in order, as (method, path).
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state
            .read()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    /// Load records directly, bypassing the REST surface. Each record must
    /// already carry an id.
    pub fn seed(&self, resource: &str, records: Vec<Value>) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        for record in records {
            let id = record
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("seed record missing an id: {}", record))?;
            let next_id = state.next_ids.entry(resource.to_string()).or_insert(1);
            *next_id = (*next_id).max(id + 1);
            state
                .collections
                .entry(resource.to_string())
                .or_default()
                .insert(id, record);
        }
        Ok(())
    }

    fn parse_path(path: &str) -> Result<Route> {
        let rest = path
            .strip_prefix("api/")
            .ok_or_else(|| anyhow::anyhow!("unexpected path: {}", path))?;
        if let Some(resource) = rest.strip_prefix("_search/") {
            return Ok(Route::Search(resource.to_string()));
        }
        match rest.split_once('/') {
            Some((resource, id)) => Ok(Route::Item(resource.to_string(), id.parse()?)),
            None => Ok(Route::Collection(rest.to_string())),
        }
    }
}

impl Transport for InMemoryBackend {
    fn execute(&self, request: &WireRequest) -> Result<WireResponse> {
        log::debug!("BACKEND {:?}: path='{}'", request.method, request.path);
        let mut state = self
            .state
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        state
            .requests
            .push((request.method, request.path.clone()));

        let route = Self::parse_path(&request.path)?;
        let response = match (request.method, route) {
            (Method::Get, Route::Collection(resource)) => {
                let mut items = records_of(&state, &resource);
                apply_filters(&mut items, &request.params);
                page_response(items, &request.params)
            }
            (Method::Get, Route::Search(resource)) => {
                let query = param(&request.params, "query").unwrap_or_default();
                let mut items = records_of(&state, &resource);
                items.retain(|record| matches_query(record, &query));
                page_response(items, &request.params)
            }
            (Method::Get, Route::Item(resource, id)) => {
                match state.collections.get(&resource).and_then(|c| c.get(&id)) {
                    Some(record) => ok(200, Some(record.clone())),
                    None => ok(404, None),
                }
            }
            (Method::Post, Route::Collection(resource)) => {
                match request.body.clone() {
                    Some(Value::Object(mut record)) if !record.contains_key("id") => {
                        let next_id = state.next_ids.entry(resource.clone()).or_insert(1);
                        let id = *next_id;
                        *next_id += 1;
                        record.insert("id".to_string(), Value::from(id));
                        let record = Value::Object(record);
                        state
                            .collections
                            .entry(resource)
                            .or_default()
                            .insert(id, record.clone());
                        ok(201, Some(record))
                    }
                    // A new record cannot already have an id.
                    _ => ok(400, None),
                }
            }
            (Method::Put, Route::Item(resource, id)) => {
                match request.body.clone() {
                    Some(Value::Object(mut record))
                        if state
                            .collections
                            .get(&resource)
                            .is_some_and(|c| c.contains_key(&id)) =>
                    {
                        record.insert("id".to_string(), Value::from(id));
                        let record = Value::Object(record);
                        state
                            .collections
                            .entry(resource)
                            .or_default()
                            .insert(id, record.clone());
                        ok(200, Some(record))
                    }
                    _ => ok(400, None),
                }
            }
            (Method::Patch, Route::Item(resource, id)) => {
                let patch = request.body.clone();
                let existing = state
                    .collections
                    .get_mut(&resource)
                    .and_then(|c| c.get_mut(&id));
                match (existing, patch) {
                    (Some(Value::Object(record)), Some(Value::Object(fields))) => {
                        // The backend's merge-patch ignores explicit nulls
                        // rather than clearing fields with them.
                        for (key, value) in fields {
                            if key != "id" && !value.is_null() {
                                record.insert(key, value);
                            }
                        }
                        let merged = Value::Object(record.clone());
                        ok(200, Some(merged))
                    }
                    _ => ok(400, None),
                }
            }
            (Method::Delete, Route::Item(resource, id)) => {
                let removed = state
                    .collections
                    .get_mut(&resource)
                    .and_then(|c| c.remove(&id));
                match removed {
                    Some(_) => ok(204, None),
                    // Matches the server, where deleting an unknown id blows
                    // up in the repository layer.
                    None => ok(500, None),
                }
            }
            _ => ok(405, None),
        };

        log::debug!(
            "BACKEND {:?} RESULT: status={}",
            request.method,
            response.status
        );
        Ok(response)
    }
}

fn ok(status: u16, body: Option<Value>) -> WireResponse {
    WireResponse {
        status,
        total_count: None,
        body,
    }
}

fn param(params: &[(String, String)], name: &str) -> Option<String> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn records_of(state: &BackendState, resource: &str) -> Vec<Value> {
    state
        .collections
        .get(resource)
        .map(|collection| collection.values().cloned().collect())
        .unwrap_or_default()
}

fn apply_filters(items: &mut Vec<Value>, params: &[(String, String)]) {
    for (key, expected) in params {
        if matches!(key.as_str(), "page" | "size" | "sort" | "query") {
            continue;
        }
        items.retain(|record| {
            record
                .get(key)
                .map(field_as_string)
                .is_some_and(|actual| actual == *expected)
        });
    }
}

fn field_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_query(record: &Value, query: &str) -> bool {
    let query = query.to_lowercase();
    record
        .as_object()
        .map(|fields| {
            fields.values().any(|value| match value {
                Value::String(s) => s.to_lowercase().contains(&query),
                _ => false,
            })
        })
        .unwrap_or(false)
}

fn page_response(mut items: Vec<Value>, params: &[(String, String)]) -> WireResponse {
    if let Some(sort) = param(params, "sort") {
        apply_sort(&mut items, &sort);
    }
    let total = items.len() as u64;
    let page = param(params, "page")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let size = param(params, "size")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);
    let page_items: Vec<Value> = items
        .into_iter()
        .skip(page * size)
        .take(size)
        .collect();
    WireResponse {
        status: 200,
        total_count: Some(total),
        body: Some(Value::Array(page_items)),
    }
}

fn apply_sort(items: &mut [Value], criterion: &str) {
    let (field, direction) = criterion.split_once(',').unwrap_or((criterion, "asc"));
    items.sort_by(|a, b| {
        let a = a.get(field);
        let b = b.get(field);
        match (a, b) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(std::cmp::Ordering::Equal),
            (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            _ => std::cmp::Ordering::Equal,
        }
    });
    if direction == "desc" {
        items.reverse();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn get(path: &str, params: Vec<(String, String)>) -> WireRequest {
        WireRequest {
            method: Method::Get,
            path: path.to_string(),
            params,
            body: None,
        }
    }

    #[test]
    fn post_assigns_ids_from_one() -> Result<()> {
        let backend = InMemoryBackend::new();
        let request = WireRequest {
            method: Method::Post,
            path: "api/colors".to_string(),
            params: vec![],
            body: Some(json!({ "colorName": "red" })),
        };
        let first = backend.execute(&request)?;
        let second = backend.execute(&request)?;
        assert_eq!(first.status, 201);
        assert_eq!(first.body.unwrap()["id"], json!(1));
        assert_eq!(second.body.unwrap()["id"], json!(2));
        Ok(())
    }

    #[test]
    fn post_with_id_is_rejected() -> Result<()> {
        let backend = InMemoryBackend::new();
        let response = backend.execute(&WireRequest {
            method: Method::Post,
            path: "api/colors".to_string(),
            params: vec![],
            body: Some(json!({ "id": 9, "colorName": "red" })),
        })?;
        assert_eq!(response.status, 400);
        Ok(())
    }

    #[test]
    fn get_missing_record_is_404() -> Result<()> {
        let backend = InMemoryBackend::new();
        let response = backend.execute(&get("api/colors/42", vec![]))?;
        assert_eq!(response.status, 404);
        assert!(response.body.is_none());
        Ok(())
    }

    #[test]
    fn patch_merges_and_ignores_nulls() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.seed("cars", vec![json!({ "id": 1, "modelYear": "2019", "description": "sedan" })])?;
        let response = backend.execute(&WireRequest {
            method: Method::Patch,
            path: "api/cars/1".to_string(),
            params: vec![],
            body: Some(json!({ "modelYear": "2020", "description": null })),
        })?;
        let body = response.body.unwrap();
        assert_eq!(body["modelYear"], json!("2020"));
        assert_eq!(body["description"], json!("sedan"));
        Ok(())
    }

    #[test]
    fn delete_twice_fails_the_second_time() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.seed("brands", vec![json!({ "id": 3 })])?;
        let request = WireRequest {
            method: Method::Delete,
            path: "api/brands/3".to_string(),
            params: vec![],
            body: None,
        };
        assert_eq!(backend.execute(&request)?.status, 204);
        assert_eq!(backend.execute(&request)?.status, 500);
        Ok(())
    }

    #[test]
    fn paging_slices_and_reports_total() -> Result<()> {
        let backend = InMemoryBackend::new();
        let records = (1..=5).map(|id| json!({ "id": id })).collect();
        backend.seed("payments", records)?;
        let response = backend.execute(&get(
            "api/payments",
            vec![
                ("page".to_string(), "1".to_string()),
                ("size".to_string(), "2".to_string()),
            ],
        ))?;
        assert_eq!(response.total_count, Some(5));
        let body = response.body.unwrap();
        assert_eq!(body, json!([{ "id": 3 }, { "id": 4 }]));
        Ok(())
    }

    #[test]
    fn sort_descending_by_id() -> Result<()> {
        let backend = InMemoryBackend::new();
        let records = (1..=3).map(|id| json!({ "id": id })).collect();
        backend.seed("payments", records)?;
        let response = backend.execute(&get(
            "api/payments",
            vec![("sort".to_string(), "id,desc".to_string())],
        ))?;
        let body = response.body.unwrap();
        assert_eq!(body, json!([{ "id": 3 }, { "id": 2 }, { "id": 1 }]));
        Ok(())
    }

    #[test]
    fn search_matches_string_fields_case_insensitively() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.seed(
            "colors",
            vec![
                json!({ "id": 1, "colorName": "Midnight Blue" }),
                json!({ "id": 2, "colorName": "Crimson" }),
            ],
        )?;
        let response = backend.execute(&get(
            "api/_search/colors",
            vec![("query".to_string(), "blue".to_string())],
        ))?;
        let body = response.body.unwrap();
        assert_eq!(body, json!([{ "id": 1, "colorName": "Midnight Blue" }]));
        Ok(())
    }

    #[test]
    fn requests_are_recorded_in_order() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.execute(&get("api/cars", vec![]))?;
        backend.execute(&get("api/cars/1", vec![]))?;
        assert_eq!(
            backend.requests(),
            vec![
                (Method::Get, "api/cars".to_string()),
                (Method::Get, "api/cars/1".to_string()),
            ]
        );
        Ok(())
    }
}
