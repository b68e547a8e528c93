pub mod client_storage;
pub mod config;
pub mod diary_backend;
pub mod error;
pub mod http_client;
pub mod token_store;
