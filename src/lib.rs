// Library exports for langblog
// This allows integration tests and the binary to share the same modules

pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;
