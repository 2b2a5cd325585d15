use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use serde_json::Value;

use crate::client::dates;
use crate::client::query::{Page, QueryParams, SearchParams};
use crate::entity::Entity;
use crate::transport::{Method, Transport, WireRequest, WireResponse};

/// Single point of contact with one entity type's REST collection. Handles
/// the date-field marshaling on both directions of every call; everything
/// else is passed through to the backend untouched, and backend errors are
/// surfaced to the caller as-is, never retried.
pub struct EntityClient<E: Entity> {
    transport: Arc<dyn Transport>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Clone for EntityClient<E> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityClient<E> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            _entity: PhantomData,
        }
    }

    fn resource_path() -> String {
        format!("api/{}", E::RESOURCE)
    }

    fn record_path(id: i64) -> String {
        format!("api/{}/{}", E::RESOURCE, id)
    }

    fn search_path() -> String {
        format!("api/_search/{}", E::RESOURCE)
    }

    /// POST the entity to the collection endpoint. The backend assigns the
    /// id and may normalize dates; its response is the canonical record.
    pub fn create(&self, entity: &E) -> Result<E> {
        log::debug!("CREATE {}", E::RESOURCE);
        let response = self.transport.execute(&WireRequest {
            method: Method::Post,
            path: Self::resource_path(),
            params: vec![],
            body: Some(self.to_wire(entity)?),
        })?;
        self.expect_entity(response)
    }

    /// PUT a full replacement. The entity must already be persisted; calling
    /// this without an id is a contract violation and fails locally.
    pub fn update(&self, entity: &E) -> Result<E> {
        let id = self.require_id(entity)?;
        log::debug!("UPDATE {}: id={}", E::RESOURCE, id);
        let response = self.transport.execute(&WireRequest {
            method: Method::Put,
            path: Self::record_path(id),
            params: vec![],
            body: Some(self.to_wire(entity)?),
        })?;
        self.expect_entity(response)
    }

    /// PATCH with whatever subset of fields is set; the backend merges into
    /// the stored record and returns the result.
    pub fn partial_update(&self, entity: &E) -> Result<E> {
        let id = self.require_id(entity)?;
        log::debug!("PARTIAL UPDATE {}: id={}", E::RESOURCE, id);
        let response = self.transport.execute(&WireRequest {
            method: Method::Patch,
            path: Self::record_path(id),
            params: vec![],
            body: Some(self.to_wire(entity)?),
        })?;
        self.expect_entity(response)
    }

    /// Fetch one record. A 404 or an empty success body both mean the id
    /// dangles and come back as None; anything else non-2xx is an error.
    pub fn find(&self, id: i64) -> Result<Option<E>> {
        log::debug!("FIND {}: id={}", E::RESOURCE, id);
        let response = self.transport.execute(&WireRequest {
            method: Method::Get,
            path: Self::record_path(id),
            params: vec![],
            body: None,
        })?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            bail!(
                "{} find({}) failed with status {}",
                E::RESOURCE,
                id,
                response.status
            );
        }
        match response.body {
            None => Ok(None),
            Some(mut body) => {
                dates::convert_dates_from_wire(&mut body, E::DATE_FIELDS);
                Ok(Some(serde_json::from_value(body)?))
            }
        }
    }

    /// List the collection with paging/sort/filter criteria.
    pub fn query(&self, params: &QueryParams) -> Result<Page<E>> {
        log::debug!("QUERY {}", E::RESOURCE);
        self.fetch_page(Self::resource_path(), params.to_pairs())
    }

    /// Same contract as query, routed to the search endpoint.
    pub fn search(&self, params: &SearchParams) -> Result<Page<E>> {
        log::debug!("SEARCH {}: query='{}'", E::RESOURCE, params.query);
        self.fetch_page(Self::search_path(), params.to_pairs())
    }

    /// DELETE one record. Success carries no body. Deleting an already
    /// deleted id is a backend error and comes back as one.
    pub fn delete(&self, id: i64) -> Result<()> {
        log::debug!("DELETE {}: id={}", E::RESOURCE, id);
        let response = self.transport.execute(&WireRequest {
            method: Method::Delete,
            path: Self::record_path(id),
            params: vec![],
            body: None,
        })?;
        if !response.is_success() {
            bail!(
                "{} delete({}) failed with status {}",
                E::RESOURCE,
                id,
                response.status
            );
        }
        Ok(())
    }

    /// Dedup-merge candidates into a collection. Already-known ids win and
    /// the collection keeps its order; accepted candidates are prepended in
    /// their input order, each id at most once. Candidates that are None or
    /// have no id yet are skipped. When nothing is accepted the collection
    /// comes back untouched, same allocation and all.
    pub fn add_to_collection_if_missing(
        collection: Vec<E>,
        candidates: Vec<Option<E>>,
    ) -> Vec<E> {
        let candidates: Vec<E> = candidates.into_iter().flatten().collect();
        if candidates.is_empty() {
            return collection;
        }
        let mut known_ids: Vec<i64> = collection.iter().filter_map(Entity::id).collect();
        let mut accepted: Vec<E> = Vec::new();
        for candidate in candidates {
            match candidate.id() {
                None => {}
                Some(id) if known_ids.contains(&id) => {}
                Some(id) => {
                    known_ids.push(id);
                    accepted.push(candidate);
                }
            }
        }
        if accepted.is_empty() {
            return collection;
        }
        accepted.extend(collection);
        accepted
    }

    fn require_id(&self, entity: &E) -> Result<i64> {
        entity
            .id()
            .ok_or_else(|| anyhow!("cannot update a {} record without an id", E::RESOURCE))
    }

    fn to_wire(&self, entity: &E) -> Result<Value> {
        let mut value = serde_json::to_value(entity)?;
        dates::convert_dates_to_wire(&mut value, E::DATE_FIELDS);
        Ok(value)
    }

    fn expect_entity(&self, response: WireResponse) -> Result<E> {
        if !response.is_success() {
            bail!(
                "{} request failed with status {}{}",
                E::RESOURCE,
                response.status,
                response
                    .body
                    .map(|body| format!(": {}", body))
                    .unwrap_or_default()
            );
        }
        let mut body = response
            .body
            .ok_or_else(|| anyhow!("{} response had an empty body", E::RESOURCE))?;
        dates::convert_dates_from_wire(&mut body, E::DATE_FIELDS);
        Ok(serde_json::from_value(body)?)
    }

    fn fetch_page(&self, path: String, params: Vec<(String, String)>) -> Result<Page<E>> {
        let response = self.transport.execute(&WireRequest {
            method: Method::Get,
            path,
            params,
            body: None,
        })?;
        if !response.is_success() {
            bail!(
                "{} list request failed with status {}",
                E::RESOURCE,
                response.status
            );
        }
        let mut body = response
            .body
            .ok_or_else(|| anyhow!("{} list response had an empty body", E::RESOURCE))?;
        dates::convert_date_array_from_wire(&mut body, E::DATE_FIELDS);
        Ok(Page {
            items: serde_json::from_value(body)?,
            total_count: response.total_count,
        })
    }
}
