//! Eventos de la ejecución y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore, JsonlEventStore};
pub use types::{RunEvent, RunEventKind};
