// Time series store - Per-heater and per-fan history with age-based eviction
use crate::application::fan_interceptor::FanState;
use crate::domain::heater::{HeaterId, Topology};
use crate::domain::plot::{Palette, PlotSeries};
use crate::domain::telemetry::{format_temp_value, MinMaxTracker, TimeSeries, TimeSeriesPoint};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct HeaterChannels {
    pub actual: TimeSeries,
    pub target: TimeSeries,
    pub extremes: MinMaxTracker,
}

/// Overall ceiling and per-heater extremes, used to size the plot axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremes {
    pub heaters: BTreeMap<HeaterId, MinMaxTracker>,
    pub ceiling: f64,
}

#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    cutoff_ms: i64,
    heaters: BTreeMap<HeaterId, HeaterChannels>,
    fans: BTreeMap<usize, TimeSeries>,
}

impl TimeSeriesStore {
    /// Channels for every configured heater and known fan are created here, never later on demand.
    pub fn new(topology: &Topology, fans: &FanState, cutoff_minutes: u32) -> Self {
        let mut store = Self {
            cutoff_ms: i64::from(cutoff_minutes) * 60_000,
            heaters: topology.ids().map(|id| (id, HeaterChannels::default())).collect(),
            fans: BTreeMap::new(),
        };
        store.sync_fans(fans);
        store
    }

    /// Give every fan index in `fans` a channel.
    pub fn sync_fans(&mut self, fans: &FanState) {
        for (index, _) in fans.iter() {
            self.fans.entry(index).or_default();
        }
    }

    pub fn heater(&self, id: HeaterId) -> Option<&HeaterChannels> {
        self.heaters.get(&id)
    }

    pub fn fan(&self, index: usize) -> Option<&TimeSeries> {
        self.fans.get(&index)
    }

    /// Record one heater reading. Returns false when the heater is not configured.
    pub fn record_heater(
        &mut self,
        id: HeaterId,
        now_ms: i64,
        time_ms: i64,
        actual: f64,
        target: Option<f64>,
    ) -> bool {
        let cutoff_ms = self.cutoff_ms;
        let Some(channels) = self.heaters.get_mut(&id) else {
            return false;
        };

        channels.actual.evict_older_than(now_ms, cutoff_ms);
        channels.target.evict_older_than(now_ms, cutoff_ms);

        channels.actual.push_unique(TimeSeriesPoint::new(time_ms, actual));
        if let Some(target) = target {
            channels.target.push_unique(TimeSeriesPoint::new(time_ms, target));
        }

        channels.extremes.record(actual, target.unwrap_or(0.0));
        true
    }

    /// Sample every known fan at `time_ms`, whether or not its duty changed.
    pub fn sample_fans(&mut self, now_ms: i64, time_ms: i64, fans: &FanState) {
        let cutoff_ms = self.cutoff_ms;
        for (index, percent) in fans.iter() {
            let series = self.fans.entry(index).or_default();
            series.evict_older_than(now_ms, cutoff_ms);
            series.push(TimeSeriesPoint::new(time_ms, f64::from(percent)));
        }
    }

    /// Display series for every heater and fan.
    ///
    /// Empty as soon as any configured heater has no actual reading yet, fans
    /// included: the graph is all or nothing.
    pub fn plot(&mut self, topology: &Topology, fans: &FanState) -> Vec<PlotSeries> {
        let mut series = Vec::new();

        for heater in topology.heaters() {
            let Some(channels) = self.heaters.get_mut(&heater.id) else {
                return Vec::new();
            };
            channels.actual.sort();
            let Some(actual) = channels.actual.latest().map(|p| format_temp_value(p.value)) else {
                return Vec::new();
            };

            channels.target.sort();
            let target = channels
                .target
                .latest()
                .map(|p| format_temp_value(p.value))
                .unwrap_or_else(|| "-".to_string());

            series.push(PlotSeries::new(
                format!("{} Actual: {}", heater.name, actual),
                Palette::Actual.color(heater.id),
                channels.actual.points(),
            ));
            series.push(PlotSeries::new(
                format!("{} Target: {}", heater.name, target),
                Palette::Target.color(heater.id),
                channels.target.points(),
            ));
        }

        for (index, _) in fans.iter() {
            let Some(fan) = self.fans.get_mut(&index) else {
                continue;
            };
            fan.sort();
            if let Some(latest) = fan.latest() {
                series.push(PlotSeries::new(
                    format!("Fan{} : {}%", index, latest.value),
                    Palette::Fan.color(index as i32),
                    fan.points(),
                ));
            }
        }

        series
    }

    /// Highest of every heater's max actual, max target and the current fan duties.
    pub fn extremes(&self, fans: &FanState) -> Extremes {
        let heaters: BTreeMap<HeaterId, MinMaxTracker> = self
            .heaters
            .iter()
            .map(|(id, channels)| (*id, channels.extremes))
            .collect();

        let ceiling = heaters
            .values()
            .flat_map(|t| [t.max_actual, t.max_target])
            .chain(fans.iter().map(|(_, percent)| f64::from(percent)))
            .fold(0.0, f64::max);

        Extremes { heaters, ceiling }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::heater::{ExtruderProfile, PrinterProfile};

    fn topology(heated_bed: bool, count: u32) -> Topology {
        Topology::from_profile(&PrinterProfile {
            heated_bed,
            extruder: ExtruderProfile { count },
        })
    }

    #[test]
    fn test_channels_created_for_configured_heaters_only() {
        let store = TimeSeriesStore::new(&topology(true, 1), &FanState::new(2), 30);
        assert!(store.heater(0).is_some());
        assert!(store.heater(-1).is_some());
        assert!(store.heater(1).is_none());
        assert!(store.fan(1).is_some());
    }

    #[test]
    fn test_record_heater_rejects_unknown_heater() {
        let mut store = TimeSeriesStore::new(&topology(false, 1), &FanState::new(1), 30);
        assert!(!store.record_heater(-1, 0, 0, 60.0, Some(60.0)));
        assert!(store.record_heater(0, 0, 0, 20.0, Some(200.0)));
        assert_eq!(store.heater(0).unwrap().actual.len(), 1);
    }

    #[test]
    fn test_record_heater_suppresses_duplicates_and_evicts() {
        let mut store = TimeSeriesStore::new(&topology(false, 1), &FanState::new(1), 1);
        store.record_heater(0, 0, 0, 20.0, Some(200.0));
        store.record_heater(0, 0, 0, 20.0, Some(200.0));
        assert_eq!(store.heater(0).unwrap().actual.len(), 1);

        store.record_heater(0, 30_000, 30_000, 21.0, Some(200.0));
        store.record_heater(0, 60_000, 60_000, 22.0, Some(200.0));
        let channels = store.heater(0).unwrap();
        assert_eq!(channels.actual.points()[0].time_ms, 30_000);
        assert_eq!(channels.target.len(), 2);
    }

    #[test]
    fn test_fans_sampled_without_dedup() {
        let mut store = TimeSeriesStore::new(&topology(false, 1), &FanState::new(1), 30);
        let fans = FanState::new(1);
        store.sample_fans(0, 0, &fans);
        store.sample_fans(0, 0, &fans);
        assert_eq!(store.fan(0).unwrap().len(), 2);
    }

    #[test]
    fn test_plot_short_circuits_on_empty_heater() {
        let topology = topology(true, 1);
        let mut fans = FanState::new(1);
        fans.set_pwm(0, 255);
        let mut store = TimeSeriesStore::new(&topology, &fans, 30);

        store.record_heater(0, 0, 0, 200.0, Some(210.0));
        store.sample_fans(0, 0, &fans);

        // Bed has nothing yet: no series at all, not even the tool or the fan.
        assert!(store.plot(&topology, &fans).is_empty());

        store.record_heater(-1, 0, 0, 60.0, None);
        let series = store.plot(&topology, &fans);
        let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Tool0 Actual: 200.0°C",
                "Tool0 Target: 210.0°C",
                "Bed Actual: 60.0°C",
                "Bed Target: -",
                "Fan0 : 100%",
            ]
        );
        assert_eq!(series[2].color, "blue");
        assert_eq!(series[4].color, "green");
    }

    #[test]
    fn test_plot_reports_latest_after_sorting() {
        let topology = topology(false, 1);
        let fans = FanState::new(0);
        let mut store = TimeSeriesStore::new(&topology, &fans, 30);
        store.record_heater(0, 5000, 3000, 30.0, Some(0.0));
        store.record_heater(0, 5000, 1000, 10.0, Some(0.0));

        let series = store.plot(&topology, &fans);
        assert_eq!(series[0].label, "Tool0 Actual: 30.0°C");
        assert_eq!(series[0].data[0].time_ms, 1000);
    }

    #[test]
    fn test_extremes_ceiling() {
        let topology = topology(true, 1);
        let mut fans = FanState::new(1);
        let mut store = TimeSeriesStore::new(&topology, &fans, 30);
        store.record_heater(0, 0, 0, 180.0, Some(200.0));
        store.record_heater(-1, 0, 0, 55.0, Some(60.0));

        let extremes = store.extremes(&fans);
        assert_eq!(extremes.ceiling, 200.0);
        assert_eq!(extremes.heaters[&-1].min_actual, 55.0);

        fans.set_pwm(0, 255);
        store.record_heater(0, 0, 1, 20.0, Some(0.0));
        assert_eq!(store.extremes(&fans).ceiling, 200.0);
        assert_eq!(store.extremes(&fans).heaters[&0].min_actual, 20.0);
    }
}
