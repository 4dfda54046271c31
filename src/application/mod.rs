// Application layer - Protocol parsing, ingest and the service lifecycle
pub mod error;
pub mod fan_interceptor;
pub mod line_classifier;
pub mod pidtune_service;
pub mod printer_host;
pub mod protocol;
pub mod temperature_ingest;
pub mod time_series_store;
