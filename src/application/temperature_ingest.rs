// Temperature ingest - Telemetry snapshots into the time series store
use crate::application::fan_interceptor::FanState;
use crate::application::time_series_store::TimeSeriesStore;
use crate::domain::heater::{HeaterId, BED};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

lazy_static! {
    static ref TOOL_KEY: Regex = Regex::new(r"^tool(?P<index>\d+)").unwrap();
    static ref BED_KEY: Regex = Regex::new(r"^bed").unwrap();
}

/// Telemetry delivery as forwarded by the host once per tick.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentData {
    #[serde(default)]
    pub data: Option<SnapshotData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotData {
    /// Host wall clock at delivery, in seconds.
    #[serde(rename = "serverTime", default)]
    pub server_time: Option<f64>,
    /// Reading cycles: `{"time": <s>, "tool0": {"actual", "target"}, "bed": {...}}`.
    #[serde(default)]
    pub temps: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub state: Option<PrinterState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrinterState {
    #[serde(default)]
    pub flags: Option<PrinterFlags>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PrinterFlags {
    #[serde(default)]
    pub operational: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub printing: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(rename = "closedOrError", default)]
    pub closed_or_error: bool,
}

impl PrinterFlags {
    /// Autotune may only be requested on an idle, connected printer.
    pub fn can_autotune(&self) -> bool {
        self.operational && !self.printing && !self.paused
    }
}

/// Map a channel key to a heater: `tool<N>` or `bed`. Anything else is skipped.
pub fn heater_for_key(key: &str) -> Option<HeaterId> {
    if let Some(captures) = TOOL_KEY.captures(key) {
        return captures["index"].parse().ok();
    }
    BED_KEY.is_match(key).then_some(BED)
}

/// Largest timestamp magnitude accepted, about 31,000 years either side of the epoch.
const MAX_TIMESTAMP_MS: f64 = 1e15;

/// Wall-clock timestamp for an entry, correcting for host/firmware skew.
///
/// `None` when the inputs are not finite or land outside the accepted range.
pub fn client_timestamp(now_ms: i64, server_time_s: f64, entry_time_s: f64) -> Option<i64> {
    let time_ms = now_ms as f64 - (server_time_s * 1000.0 - entry_time_s * 1000.0);
    (time_ms.is_finite() && time_ms.abs() <= MAX_TIMESTAMP_MS).then_some(time_ms as i64)
}

pub struct TemperatureIngest;

impl TemperatureIngest {
    /// Fold every reading cycle of a snapshot into the store. Returns the number
    /// of heater readings recorded.
    pub fn ingest(
        snapshot: &SnapshotData,
        now_ms: i64,
        store: &mut TimeSeriesStore,
        fans: &FanState,
    ) -> usize {
        let (Some(server_time), Some(temps)) = (snapshot.server_time, snapshot.temps.as_ref())
        else {
            return 0;
        };

        let mut recorded = 0;
        for entry in temps {
            let Some(entry_time) = entry.get("time").and_then(Value::as_f64) else {
                continue;
            };
            let Some(time_ms) = client_timestamp(now_ms, server_time, entry_time) else {
                tracing::debug!(
                    "Reading cycle with time {} (server time {}) out of range, skipped",
                    entry_time,
                    server_time
                );
                continue;
            };

            let mut entry_recorded = 0;
            for (key, reading) in entry.iter().filter(|(k, _)| k.as_str() != "time") {
                let Some(heater) = heater_for_key(key) else {
                    continue;
                };
                let Some(actual) = reading.get("actual").and_then(Value::as_f64) else {
                    tracing::debug!("Reading {} without actual temperature skipped", key);
                    continue;
                };
                let target = reading.get("target").and_then(Value::as_f64);

                if store.record_heater(heater, now_ms, time_ms, actual, target) {
                    entry_recorded += 1;
                } else {
                    tracing::debug!("Reading for unconfigured heater {} skipped", heater);
                }
            }

            if entry_recorded > 0 {
                store.sample_fans(now_ms, time_ms, fans);
            }
            recorded += entry_recorded;
        }

        recorded
    }
}
