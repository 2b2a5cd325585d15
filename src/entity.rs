use serde::{Serialize, de::DeserializeOwned};

/// Trait for types that live behind a REST collection endpoint.
///
/// `Default` must produce the blank, never-persisted record: every field
/// unset and no id. The backend assigns ids, so a client never invents one.
pub trait Entity: Serialize + DeserializeOwned + Clone + Default {
    /// Collection path segment, e.g. "rentals" for `api/rentals`.
    const RESOURCE: &'static str;

    /// Wire names of the date-typed fields, e.g. `["rentDate", "returnDate"]`.
    /// These get canonicalized on the way out and parsed on the way in.
    const DATE_FIELDS: &'static [&'static str] = &[];

    /// The server-assigned identity, if this record has been persisted.
    fn id(&self) -> Option<i64>;
}
