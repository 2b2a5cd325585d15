use anyhow::Result;
use serde_json::Value;

use crate::client::core::EntityClient;
use crate::entity::Entity;

/// What the host should do with its navigation after an edit-view action.
/// The session never touches history itself; it hands back an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Return to the previous view.
    Back,
}

/// Edit-view state for one entity: the record as it was resolved, the
/// user's working copy, and the saving flag.
///
/// The snapshot is taken once at construction; submit-time behavior is
/// derived from comparing the draft against it, not from tracking
/// individual edits.
pub struct EditSession<E: Entity> {
    original: E,
    draft: E,
    saving: bool,
}

impl<E: Entity> EditSession<E> {
    pub fn new(resolved: E) -> Self {
        Self {
            original: resolved.clone(),
            draft: resolved,
            saving: false,
        }
    }

    pub fn original(&self) -> &E {
        &self.original
    }

    pub fn draft(&self) -> &E {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut E {
        &mut self.draft
    }

    /// True from the moment a save begins until its single terminal
    /// outcome, success or error, has been observed.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Submit the draft. A draft with an id is updated, one without is
    /// created; nothing else influences the choice. On success the server's
    /// canonical record replaces both the draft and the snapshot and the
    /// caller is told to navigate back. On error the session is left
    /// on-screen, flag cleared, ready for a retry.
    pub fn save(&mut self, client: &EntityClient<E>) -> Result<Navigation> {
        self.saving = true;
        let outcome = if self.draft.id().is_some() {
            client.update(&self.draft)
        } else {
            client.create(&self.draft)
        };
        self.saving = false;

        let saved = outcome?;
        self.accept(saved);
        Ok(Navigation::Back)
    }

    /// Submit only what changed, as a merge patch. Requires a persisted
    /// draft; same flag and navigation discipline as save.
    pub fn save_partial(&mut self, client: &EntityClient<E>) -> Result<Navigation> {
        self.saving = true;
        let outcome = self
            .diff()
            .and_then(|patch| client.partial_update(&patch));
        self.saving = false;

        let saved = outcome?;
        self.accept(saved);
        Ok(Navigation::Back)
    }

    /// Abandon the edit. No backend call, no state change.
    pub fn cancel(&self) -> Navigation {
        Navigation::Back
    }

    /// Sparse record holding the id plus every field whose value differs
    /// from the snapshot. Fields cleared in the draft are simply absent;
    /// the backend's merge patch cannot unset a field anyway.
    pub fn diff(&self) -> Result<E> {
        let original = serde_json::to_value(&self.original)?;
        let draft = serde_json::to_value(&self.draft)?;
        let mut patch = serde_json::Map::new();
        if let (Value::Object(original), Value::Object(draft)) = (original, draft) {
            for (name, value) in draft {
                if name == "id" || original.get(&name) != Some(&value) {
                    patch.insert(name, value);
                }
            }
        }
        Ok(serde_json::from_value(Value::Object(patch))?)
    }

    fn accept(&mut self, saved: E) {
        self.original = saved.clone();
        self.draft = saved;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::models::Car;
    use crate::transport::{InMemoryBackend, Method, Transport, WireRequest, WireResponse};

    fn client(backend: &InMemoryBackend) -> EntityClient<Car> {
        EntityClient::new(Arc::new(backend.clone()))
    }

    #[test]
    fn saving_a_blank_draft_creates() -> Result<()> {
        let backend = InMemoryBackend::new();
        let mut session = EditSession::new(Car::default());
        session.draft_mut().model_year = Some("2019".to_string());

        let navigation = session.save(&client(&backend))?;

        assert_eq!(navigation, Navigation::Back);
        assert!(!session.is_saving());
        assert_eq!(session.draft().id, Some(1));
        let methods: Vec<Method> = backend.requests().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![Method::Post]);
        Ok(())
    }

    #[test]
    fn saving_a_persisted_draft_updates() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.seed("cars", vec![json!({ "id": 5, "modelYear": "2018" })])?;
        let cars = client(&backend);
        let mut session = EditSession::new(cars.find(5)?.unwrap());
        session.draft_mut().model_year = Some("2019".to_string());

        session.save(&cars)?;

        assert_eq!(session.draft().model_year, Some("2019".to_string()));
        let methods: Vec<Method> = backend.requests().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![Method::Get, Method::Put]);
        Ok(())
    }

    #[test]
    fn failed_save_clears_the_flag_and_yields_no_navigation() {
        struct FailingTransport;
        impl Transport for FailingTransport {
            fn execute(&self, _request: &WireRequest) -> Result<WireResponse> {
                anyhow::bail!("connection refused")
            }
        }

        let cars: EntityClient<Car> = EntityClient::new(Arc::new(FailingTransport));
        let mut session = EditSession::new(Car::default());
        session.draft_mut().description = Some("unsaveable".to_string());

        let result = session.save(&cars);

        assert!(result.is_err());
        assert!(!session.is_saving());
        // The draft survives for a retry.
        assert_eq!(session.draft().description, Some("unsaveable".to_string()));
    }

    #[test]
    fn diff_contains_id_and_changed_fields_only() -> Result<()> {
        let mut session = EditSession::new(Car {
            id: Some(3),
            model_year: Some("2018".to_string()),
            description: Some("sedan".to_string()),
            ..Default::default()
        });
        session.draft_mut().model_year = Some("2019".to_string());

        let patch = session.diff()?;
        assert_eq!(
            serde_json::to_value(&patch)?,
            json!({ "id": 3, "modelYear": "2019" })
        );
        Ok(())
    }

    #[test]
    fn save_partial_sends_a_merge_patch() -> Result<()> {
        let backend = InMemoryBackend::new();
        backend.seed(
            "cars",
            vec![json!({ "id": 2, "modelYear": "2020", "description": "wagon" })],
        )?;
        let cars = client(&backend);
        let mut session = EditSession::new(cars.find(2)?.unwrap());
        session.draft_mut().daily_price = Some(49.5);

        let navigation = session.save_partial(&cars)?;

        assert_eq!(navigation, Navigation::Back);
        // Untouched fields survive the patch.
        assert_eq!(session.draft().description, Some("wagon".to_string()));
        assert_eq!(session.draft().daily_price, Some(49.5));
        let methods: Vec<Method> = backend.requests().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![Method::Get, Method::Patch]);
        Ok(())
    }

    #[test]
    fn cancel_navigates_back_without_touching_the_backend() {
        let backend = InMemoryBackend::new();
        let session = EditSession::new(Car::default());
        assert_eq!(session.cancel(), Navigation::Back);
        assert!(backend.requests().is_empty());
    }
}
