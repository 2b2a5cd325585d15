use anyhow::{Context, Result};

use crate::client::EntityClient;
use crate::entity::Entity;

/// Where a dangling id sends the navigation.
pub const NOT_FOUND_ROUTE: &str = "/404";

/// Outcome of resolving a navigation attempt. Either the target view gets
/// its entity, or the host is told to navigate somewhere else instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<E> {
    Entity(E),
    Redirect(&'static str),
}

impl<E> Resolution<E> {
    pub fn entity(self) -> Option<E> {
        match self {
            Resolution::Entity(entity) => Some(entity),
            Resolution::Redirect(_) => None,
        }
    }
}

/// Gates navigation to a detail/edit view on entity retrieval. Stateless
/// across attempts: each resolve call stands alone.
pub struct EntityResolver<E: Entity> {
    client: EntityClient<E>,
}

impl<E: Entity> EntityResolver<E> {
    pub fn new(client: EntityClient<E>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &EntityClient<E> {
        &self.client
    }

    /// No id means a create flow: a blank record, no backend call. An id
    /// that fetches a record produces it; an id that fetches nothing
    /// redirects to the not-found route. Transport errors propagate
    /// untouched for the host's generic error handling.
    pub fn resolve(&self, route_id: Option<i64>) -> Result<Resolution<E>> {
        let Some(id) = route_id else {
            return Ok(Resolution::Entity(E::default()));
        };
        match self.client.find(id)? {
            Some(entity) => Ok(Resolution::Entity(entity)),
            None => {
                log::debug!("RESOLVE {}: id={} not found, redirecting", E::RESOURCE, id);
                Ok(Resolution::Redirect(NOT_FOUND_ROUTE))
            }
        }
    }

    /// Same, from a raw route parameter. An absent parameter is the create
    /// flow; a present one must parse as an id.
    pub fn resolve_param(&self, param: Option<&str>) -> Result<Resolution<E>> {
        let id = param
            .map(|raw| {
                raw.parse::<i64>()
                    .with_context(|| format!("invalid {} id parameter: '{}'", E::RESOURCE, raw))
            })
            .transpose()?;
        self.resolve(id)
    }
}
