//! Package registry access: HTTP client, query cache and version selection

pub mod cache;
pub mod client;
pub mod error;
pub mod gate;
pub mod retry;
pub mod selection;
pub mod traits;
pub mod types;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use traits::{Registry, VersionQuery};
pub use types::{
    ProjectInfo, SearchHit, SearchIndex, SearchQuery, SearchResults, SideSupport, VersionFile,
    VersionRecord, VersionType,
};

#[cfg(test)]
pub use traits::MockRegistry;
