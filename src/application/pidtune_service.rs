// PID tune service - Lifecycle, host callbacks and front-end queries
use crate::application::error::PidTuneError;
use crate::application::fan_interceptor::{FanCommandInterceptor, FanState};
use crate::application::line_classifier::{classify, LineMatch};
use crate::application::printer_host::PrinterHost;
use crate::application::protocol::{AutotuneState, LineEffect, ProtocolStateMachine};
use crate::application::temperature_ingest::{CurrentData, PrinterFlags, TemperatureIngest};
use crate::application::time_series_store::{Extremes, TimeSeriesStore};
use crate::domain::heater::{HeaterId, Topology};
use crate::domain::pid::{PidModel, PidRecord, PidSnapshot};
use crate::domain::plot::PlotSeries;
use crate::infrastructure::config::PluginSettings;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const EVENT_CAPACITY: usize = 64;

/// Push message for the front end.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PluginMessage {
    PidData(PidSnapshot),
    Locked(serde_json::Value),
}

/// Everything derived from a known heater topology.
#[derive(Debug)]
struct Session {
    topology: Topology,
    pid: PidModel,
    protocol: ProtocolStateMachine,
    store: TimeSeriesStore,
    fans: FanState,
    flags: PrinterFlags,
}

impl Session {
    fn new(topology: Topology, settings: &PluginSettings) -> Self {
        let fans = FanState::new(settings.fan_count);
        Self {
            pid: PidModel::new(&topology),
            protocol: ProtocolStateMachine::new(),
            store: TimeSeriesStore::new(&topology, &fans, settings.temperature_cutoff),
            fans,
            flags: PrinterFlags::default(),
            topology,
        }
    }

    fn apply(&mut self, matched: &LineMatch) -> LineEffect {
        if FanCommandInterceptor::observe(matched, &mut self.fans) {
            self.store.sync_fans(&self.fans);
            return LineEffect::Unchanged;
        }
        self.protocol.apply(matched, &mut self.pid)
    }
}

/// Core operations exist only once the topology is known; before that every
/// hook is a no-op.
#[derive(Debug)]
enum Lifecycle {
    Unconfigured,
    Configured(Box<Session>),
}

#[derive(Clone)]
pub struct PidTuneService {
    host: Arc<dyn PrinterHost>,
    settings: PluginSettings,
    lifecycle: Arc<Mutex<Lifecycle>>,
    started: Arc<AtomicBool>,
    events: broadcast::Sender<PluginMessage>,
    js_errors: Arc<Mutex<HashSet<String>>>,
}

impl PidTuneService {
    pub fn new(host: Arc<dyn PrinterHost>, settings: PluginSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            host,
            settings,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Unconfigured)),
            started: Arc::new(AtomicBool::new(false)),
            events,
            js_errors: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginMessage> {
        self.events.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Resolve the topology and start accepting host callbacks.
    pub async fn startup(&self) {
        tracing::info!("Starting PIDTune");
        match self.resolve_topology().await {
            Ok(names) => tracing::info!("Heaters: {:?}", names),
            Err(e) => tracing::warn!("Starting without printer profile: {}", e),
        }
        self.started.store(true, Ordering::SeqCst);
        tracing::info!("PIDTune started");
    }

    async fn fetch_topology(&self) -> Result<Topology, PidTuneError> {
        let profile = self
            .host
            .current_profile()
            .await?
            .ok_or(PidTuneError::TopologyUnavailable)?;
        Ok(Topology::from_profile(&profile))
    }

    /// Fetch the profile and rebuild all derived state. History starts over.
    pub async fn resolve_topology(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, PidTuneError> {
        let topology = self.fetch_topology().await?;
        let names = topology.names();
        *self.lifecycle.lock().await =
            Lifecycle::Configured(Box::new(Session::new(topology, &self.settings)));
        Ok(names)
    }

    /// Install a session for `topology` unless another caller got there first.
    async fn install_if_unconfigured(&self, topology: Topology) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Configured(_)) {
            tracing::debug!("Topology already resolved, keeping the live session");
            return false;
        }
        *lifecycle = Lifecycle::Configured(Box::new(Session::new(topology, &self.settings)));
        true
    }

    /// Configure on demand; false while the profile stays unavailable.
    async fn ensure_configured(&self) -> bool {
        if matches!(*self.lifecycle.lock().await, Lifecycle::Configured(_)) {
            return true;
        }
        match self.fetch_topology().await {
            Ok(topology) => {
                self.install_if_unconfigured(topology).await;
                true
            }
            Err(e) => {
                tracing::debug!("Topology unavailable: {}", e);
                false
            }
        }
    }

    async fn ready(&self) -> bool {
        self.is_started() && self.ensure_configured().await
    }

    /// A line received from the controller.
    pub async fn on_line_received(&self, line: &str) {
        if !self.ready().await {
            return;
        }
        if let Some(matched) = classify(line) {
            self.apply(&matched).await;
        }
    }

    /// A command the host has sent to the controller.
    pub async fn on_command_sent(&self, command: &str) {
        if !self.ready().await {
            return;
        }

        let command = command.replace(['\n', '\r'], "");
        let command = command.trim();
        if command.starts_with(';') || command.len() <= 2 {
            return;
        }

        if command.to_lowercase().contains("printer locked") {
            self.publish(PluginMessage::Locked(serde_json::json!({})));
        }

        if let Some(matched) = classify(command) {
            self.apply(&matched).await;
        }
    }

    /// A command about to be queued. `None` passes it through unchanged.
    pub async fn on_command_queueing(&self, command: &str) -> Option<Vec<String>> {
        match &mut *self.lifecycle.lock().await {
            Lifecycle::Configured(session) => {
                let rewritten = FanCommandInterceptor::rewrite(command, &mut session.fans);
                if rewritten.is_some() {
                    session.store.sync_fans(&session.fans);
                }
                rewritten
            }
            Lifecycle::Unconfigured => {
                FanCommandInterceptor::rewrite(command, &mut FanState::default())
            }
        }
    }

    /// One telemetry tick, stamped with the local wall clock.
    pub async fn on_current_data(&self, data: &CurrentData) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.on_current_data_at(data, now_ms).await;
    }

    pub async fn on_current_data_at(&self, data: &CurrentData, now_ms: i64) {
        if !self.ready().await {
            return;
        }
        let Some(snapshot) = data.data.as_ref() else {
            return;
        };

        if let Lifecycle::Configured(session) = &mut *self.lifecycle.lock().await {
            if let Some(flags) = snapshot.state.as_ref().and_then(|s| s.flags) {
                session.flags = flags;
            }
            let Session { store, fans, .. } = session.as_mut();
            let recorded = TemperatureIngest::ingest(snapshot, now_ms, store, fans);
            tracing::trace!("Recorded {} heater readings", recorded);
        }
    }

    async fn apply(&self, matched: &LineMatch) {
        let snapshot = match &mut *self.lifecycle.lock().await {
            Lifecycle::Configured(session) => match session.apply(matched) {
                LineEffect::PidDataChanged => Some(session.pid.snapshot()),
                LineEffect::Unchanged => None,
            },
            Lifecycle::Unconfigured => None,
        };

        if let Some(snapshot) = snapshot {
            tracing::debug!("PID data changed");
            self.publish(PluginMessage::PidData(snapshot));
        }
    }

    fn publish(&self, message: PluginMessage) {
        if let Err(e) = self.events.send(message) {
            tracing::warn!("Failed to deliver plugin message: {}", e);
        }
    }

    /// Plot series for the graph; empty until every heater has data.
    pub async fn update_plot(&self) -> Vec<PlotSeries> {
        match &mut *self.lifecycle.lock().await {
            Lifecycle::Configured(session) => {
                let Session { store, topology, fans, .. } = session.as_mut();
                store.plot(topology, fans)
            }
            Lifecycle::Unconfigured => Vec::new(),
        }
    }

    pub async fn pid_snapshot(&self) -> Option<PidSnapshot> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Configured(session) => Some(session.pid.snapshot()),
            Lifecycle::Unconfigured => None,
        }
    }

    pub async fn pid_record(&self, heater: HeaterId) -> Result<PidRecord, PidTuneError> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Configured(session) => session
                .pid
                .get(heater)
                .cloned()
                .ok_or(PidTuneError::UnknownHeaterContext(heater)),
            Lifecycle::Unconfigured => Err(PidTuneError::TopologyUnavailable),
        }
    }

    pub async fn autotune_state(&self) -> Option<AutotuneState> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Configured(session) => Some(session.protocol.state()),
            Lifecycle::Unconfigured => None,
        }
    }

    pub async fn extremes(&self) -> Option<Extremes> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Configured(session) => Some(session.store.extremes(&session.fans)),
            Lifecycle::Unconfigured => None,
        }
    }

    /// Forward a raw command string to the controller.
    pub async fn forward_command(&self, command: &str) -> Result<(), PidTuneError> {
        self.host.send_commands(&[command.to_string()]).await?;
        Ok(())
    }

    /// Start an autotune run on a heater named as the front end names it ("Tool0", "Bed").
    pub async fn autotune(
        &self,
        heater: &str,
        target: i64,
        cycles: u32,
    ) -> Result<String, PidTuneError> {
        if !self.is_started() {
            return Err(PidTuneError::NotStarted);
        }
        if !self.ensure_configured().await {
            return Err(PidTuneError::TopologyUnavailable);
        }

        let command = match &*self.lifecycle.lock().await {
            Lifecycle::Configured(session) => {
                let Some(found) = session.topology.by_name(heater) else {
                    tracing::debug!("Heater {} not found in printer profile", heater);
                    return Err(PidTuneError::UnknownHeater(heater.to_string()));
                };
                if !session.flags.can_autotune() {
                    return Err(PidTuneError::PrinterBusy);
                }
                format!("M303 E{} S{} C{}", found.id, target, cycles)
            }
            Lifecycle::Unconfigured => return Err(PidTuneError::TopologyUnavailable),
        };

        self.forward_command(&command).await?;
        Ok(command)
    }

    /// Log a front-end error once per distinct payload.
    pub async fn report_js_error(&self, payload: &serde_json::Value) {
        let text = match payload {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };

        if self.js_errors.lock().await.insert(text.clone()) {
            tracing::error!(target: "pidtune::js", "Frontend javascript error detected: {}", text);
        }
    }
}
