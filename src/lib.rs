pub mod client;
pub mod entity;
pub mod models;
pub mod resolver;
pub mod transport;

pub use client::{EditSession, EntityClient, Navigation, Page, QueryParams, SearchParams};
pub use entity::Entity;
pub use resolver::{EntityResolver, NOT_FOUND_ROUTE, Resolution};
pub use transport::{HttpTransport, InMemoryBackend, Transport};
