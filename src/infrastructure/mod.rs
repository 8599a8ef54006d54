pub mod chat_client;
pub mod config;
pub mod error;
pub mod snapshot_store;
pub mod storage;
