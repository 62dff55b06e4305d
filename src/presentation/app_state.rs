// Application state for HTTP handlers
use crate::application::scheduler::PollScheduler;
use crate::application::session::TelemetrySession;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TelemetrySession>,
    pub scheduler: PollScheduler,
}
