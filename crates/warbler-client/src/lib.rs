//! Client side of Warbler: an HTTP client for the JSON API plus the read
//! cache and optimistic-update machinery views use to stay responsive.

pub mod cache;
pub mod composer;
pub mod edits;
pub mod error;
pub mod guard;
pub mod http;
pub mod mutation;
pub mod paths;
pub mod store;

pub use cache::{MutationId, QueryCache};
pub use composer::Composer;
pub use error::ClientError;
pub use http::ApiClient;
pub use mutation::{Mutation, MutationState};
pub use store::Store;
