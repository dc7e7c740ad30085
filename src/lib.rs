pub mod config;
pub mod error;
pub mod ident;
pub mod identity;
pub mod security;
pub mod server;
pub mod storage;
