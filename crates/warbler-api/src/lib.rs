pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod state;
pub mod tweets;
pub mod users;

pub use routes::router;
pub use state::AppState;
