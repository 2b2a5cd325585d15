// Re-export the public client surface
pub use self::core::EntityClient;
pub use self::edit::{EditSession, Navigation};
pub use self::query::{Page, QueryParams, SearchParams};

pub mod core;
pub mod dates;
pub mod edit;
pub mod query;
