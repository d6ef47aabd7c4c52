// Library exports for GeoDoc
// This allows integration tests to drive the router and the storage layers

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod geocode;
pub mod map;
pub mod routes;
pub mod state;
pub mod storage;
