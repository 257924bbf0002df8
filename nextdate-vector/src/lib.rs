pub mod catalog;
pub mod config;
pub mod cosine;
pub mod describe;
pub mod diversity;
pub mod error;
pub mod insights;
pub mod persistence;
pub mod preference;
pub mod protocol;
pub mod ranking;
pub mod recommendation;
pub mod registry;
pub mod server;
pub mod social;
pub mod source;
pub mod store;
pub mod transport;
pub mod types;
