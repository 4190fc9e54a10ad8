pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;
pub mod types;
