// Application errors surfaced by service operations
use crate::domain::heater::HeaterId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidTuneError {
    #[error("plugin has not completed startup")]
    NotStarted,
    #[error("printer profile is not available")]
    TopologyUnavailable,
    #[error("heater {0} not found in printer profile")]
    UnknownHeater(String),
    #[error("heater {0} is not configured")]
    UnknownHeaterContext(HeaterId),
    #[error("printer is busy or not operational")]
    PrinterBusy,
    #[error("host error: {0}")]
    Host(#[from] anyhow::Error),
}
