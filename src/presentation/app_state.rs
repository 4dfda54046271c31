// Application state for HTTP handlers
use crate::application::pidtune_service::PidTuneService;

#[derive(Clone)]
pub struct AppState {
    pub service: PidTuneService,
}
