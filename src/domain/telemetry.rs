// Telemetry data domain models
use serde::Serialize;
use std::collections::VecDeque;

/// A single sample. Serialized as `[time_ms, value]` for the plotting front end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "(i64, f64)")]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

impl From<TimeSeriesPoint> for (i64, f64) {
    fn from(point: TimeSeriesPoint) -> Self {
        (point.time_ms, point.value)
    }
}

/// Insertion-ordered samples bounded by age.
///
/// Eviction is lazy: it only runs when the caller asks for it before an
/// append, and only if the oldest retained sample has aged past the cutoff.
/// When it runs, the whole aged-out prefix goes at once.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    points: VecDeque<TimeSeriesPoint>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Drop the aged-out prefix if the oldest sample is at least `cutoff_ms` old.
    /// Returns the number of samples dropped.
    pub fn evict_older_than(&mut self, now_ms: i64, cutoff_ms: i64) -> usize {
        let aged = |p: &TimeSeriesPoint| now_ms.saturating_sub(p.time_ms) >= cutoff_ms;

        match self.points.front() {
            Some(oldest) if aged(oldest) => {
                let count = self.points.iter().take_while(|p| aged(p)).count();
                self.points.drain(..count);
                count
            }
            _ => 0,
        }
    }

    /// Append unless the exact pair is already stored. Returns whether it was appended.
    pub fn push_unique(&mut self, point: TimeSeriesPoint) -> bool {
        if self.points.contains(&point) {
            return false;
        }
        self.points.push_back(point);
        true
    }

    pub fn push(&mut self, point: TimeSeriesPoint) {
        self.points.push_back(point);
    }

    /// Sort in place by timestamp (then value) to absorb out-of-order arrival.
    pub fn sort(&mut self) {
        self.points
            .make_contiguous()
            .sort_by(|a, b| a.time_ms.cmp(&b.time_ms).then(a.value.total_cmp(&b.value)));
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.points.iter().copied().collect()
    }
}

/// Running extremes for one heater, updated from the newest reading only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MinMaxTracker {
    pub min_actual: f64,
    pub max_actual: f64,
    pub max_target: f64,
}

impl MinMaxTracker {
    pub fn record(&mut self, actual: f64, target: f64) {
        self.min_actual = update_min_temp(actual, self.min_actual);
        self.max_actual = update_max_temp(actual, self.max_actual);
        self.max_target = update_max_temp(target, self.max_target);
    }
}

/// Non-increasing floor over positive readings. An unset floor (<= 0) takes
/// the first positive reading; non-positive readings never move it.
pub fn update_min_temp(newv: f64, oldv: f64) -> f64 {
    if newv <= 0.0 {
        oldv
    } else if oldv <= 0.0 {
        newv
    } else {
        newv.min(oldv)
    }
}

pub fn update_max_temp(newv: f64, oldv: f64) -> f64 {
    newv.max(oldv).max(0.0)
}

/// Firmware PWM duty (0-255) to a display percentage, floored.
pub fn pwm_to_percent(pwm: u32) -> u32 {
    pwm * 100 / 255
}

pub fn format_temp_value(temp: f64) -> String {
    format!("{:.1}°C", temp)
}
