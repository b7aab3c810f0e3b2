pub mod common;
pub mod config;
pub mod conversion;
pub mod routes;
pub mod submissions;
