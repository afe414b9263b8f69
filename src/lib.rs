//! Relays one hourly air-quality reading from the station feed into the
//! meteo storage API, deduplicated against the most recently stored records.

pub mod adapters;
pub mod app;
pub mod domain;
