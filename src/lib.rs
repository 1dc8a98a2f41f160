//! Temperature and humidity readings service.
//!
//! [`store::ReadingsStore`] is the typed persistence layer over the readings
//! table. [`api`] exposes it over HTTP and [`ingest`] feeds it from MQTT.

pub mod api;
pub mod config;
pub mod db;
pub mod ingest;
pub mod store;
