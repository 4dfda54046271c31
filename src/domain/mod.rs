// Domain layer - Heaters, PID records and time series
pub mod heater;
pub mod pid;
pub mod plot;
pub mod telemetry;
