//! A deduplicating, expiring, collision-safe short-link service over an
//! embedded sqlite store, with an HTTP shorten/resolve boundary.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod schema;
pub mod service;
