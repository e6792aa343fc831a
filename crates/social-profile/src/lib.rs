//! Profile repository over a graph store, and follow recommendations derived from it.

mod recommend;
mod repository;

pub use recommend::recommend;
pub use repository::{GraphProfileRepository, DEFAULT_SEARCH_LIMIT, DEFAULT_STORE_TIMEOUT};
pub use social_types::{
    CreatedProfile, Profile, ProfileAggregate, ProfileError, ProfileRepository,
};
