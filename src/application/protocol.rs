// Protocol state machine - Autotune session tracking and PID model updates
use crate::application::line_classifier::{load_target, LineMatch};
use crate::domain::heater::{HeaterId, BED};
use crate::domain::pid::{PidGains, PidModel, PidRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutotuneState {
    #[default]
    Idle,
    Started,
    Completed,
    Failed,
}

/// What applying a line did to the PID model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEffect {
    Unchanged,
    PidDataChanged,
}

/// Autotune session status plus the heater cursor that later lines address.
///
/// The machine has no I/O: callers read the returned [`LineEffect`] and decide
/// whether to publish a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProtocolStateMachine {
    state: AutotuneState,
    current_heater: HeaterId,
}

impl ProtocolStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AutotuneState {
        self.state
    }

    pub fn current_heater(&self) -> HeaterId {
        self.current_heater
    }

    pub fn apply(&mut self, matched: &LineMatch, model: &mut PidModel) -> LineEffect {
        match matched {
            LineMatch::TuneRequest { heater, cycles, target } => {
                self.state = AutotuneState::Started;
                self.current_heater = *heater;
                tracing::info!(
                    "Autotune started on heater {} (target {:?}, cycles {:?})",
                    heater,
                    target,
                    cycles
                );
                LineEffect::Unchanged
            }
            LineMatch::LoadToolPid { .. } | LineMatch::LoadBedPid => {
                if let Some(heater) = load_target(matched) {
                    self.current_heater = heater;
                }
                LineEffect::Unchanged
            }
            LineMatch::RelayStep { bias, d, min, max } => self.while_started(model, |record| {
                tracing::trace!("Relay step bias {} d {}", bias, d);
                record.bias = Some(*bias);
                record.min = Some(*min);
                record.max = Some(*max);
            }),
            LineMatch::TuneParams { ku, tu } => self.while_started(model, |record| {
                record.ku = Some(*ku);
                record.tu = Some(*tu);
            }),
            LineMatch::TuneFinished => self.finish(AutotuneState::Completed),
            LineMatch::TuneFailed => self.finish(AutotuneState::Failed),
            LineMatch::BedPid(gains) => set_gains(model, BED, *gains),
            LineMatch::ToolPid(gains) | LineMatch::HeaterPidReport(gains) => {
                set_gains(model, self.current_heater, *gains)
            }
            LineMatch::FanSpeedReport { .. } | LineMatch::FanDuty { .. } | LineMatch::FanOff => {
                LineEffect::Unchanged
            }
        }
    }

    fn while_started(
        &self,
        model: &mut PidModel,
        update: impl FnOnce(&mut PidRecord),
    ) -> LineEffect {
        if self.state != AutotuneState::Started {
            return LineEffect::Unchanged;
        }
        match model.get_mut(self.current_heater) {
            Some(record) => {
                update(record);
                LineEffect::PidDataChanged
            }
            None => {
                tracing::debug!("Autotune data for unknown heater {} ignored", self.current_heater);
                LineEffect::Unchanged
            }
        }
    }

    fn finish(&mut self, outcome: AutotuneState) -> LineEffect {
        if self.state != AutotuneState::Started {
            return LineEffect::Unchanged;
        }
        tracing::info!("Autotune on heater {} {:?}", self.current_heater, outcome);
        self.state = outcome;
        LineEffect::PidDataChanged
    }
}

fn set_gains(model: &mut PidModel, heater: HeaterId, gains: PidGains) -> LineEffect {
    match model.get_mut(heater) {
        Some(record) => {
            record.set_gains(gains);
            LineEffect::PidDataChanged
        }
        None => {
            tracing::debug!("PID gains for unknown heater {} ignored", heater);
            LineEffect::Unchanged
        }
    }
}
