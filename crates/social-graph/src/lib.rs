//! Graph store trait and in-memory implementation.

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryGraphStore;
pub use social_types::{GraphDirection, GraphNode, GraphStore, GraphStoreError, NodeNeighborhood};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGraphStore;
