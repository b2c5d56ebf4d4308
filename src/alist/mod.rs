//! Alist API client

pub mod api;
pub mod client;
pub mod errors;
pub mod types;

pub use api::{AlistApi, HttpAlistApi};
pub use client::AlistClient;
pub use errors::AlistError;
pub use types::*;
