// Fan command interceptor - Fan-off rewriting and fan duty tracking
use crate::application::line_classifier::{classify, LineMatch};
use crate::domain::telemetry::pwm_to_percent;
use std::collections::BTreeMap;

/// Last commanded duty per fan index, in percent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanState {
    values: BTreeMap<usize, u32>,
}

impl FanState {
    /// Fans `0..count` known up front, all off.
    pub fn new(count: usize) -> Self {
        Self {
            values: (0..count).map(|index| (index, 0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.values.get(&index).copied()
    }

    pub fn set_pwm(&mut self, index: usize, pwm: u32) {
        self.values.insert(index, pwm_to_percent(pwm));
    }

    pub fn zero_all(&mut self) {
        self.values.values_mut().for_each(|v| *v = 0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.values.iter().map(|(index, percent)| (*index, *percent))
    }
}

pub struct FanCommandInterceptor;

impl FanCommandInterceptor {
    /// Rewrite a queued command. `None` means pass the command through unchanged.
    pub fn rewrite(command: &str, fans: &mut FanState) -> Option<Vec<String>> {
        match classify(command)? {
            LineMatch::FanOff => Some(Self::fan_off_commands(fans)),
            _ => None,
        }
    }

    /// Firmware that only knows a single fan gets the legacy form; otherwise
    /// each fan is zeroed explicitly.
    pub fn fan_off_commands(fans: &mut FanState) -> Vec<String> {
        let commands = if fans.len() <= 1 {
            vec!["M106 S0".to_string()]
        } else {
            fans.iter()
                .map(|(index, _)| format!("M106 P{} S0", index))
                .collect()
        };
        fans.zero_all();
        commands
    }

    /// Record fan duty carried by a classified line. Returns whether fan state changed.
    pub fn observe(matched: &LineMatch, fans: &mut FanState) -> bool {
        match matched {
            LineMatch::FanDuty { index, pwm } | LineMatch::FanSpeedReport { index, pwm } => {
                fans.set_pwm(*index, *pwm);
                true
            }
            LineMatch::FanOff => {
                fans.zero_all();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_off_with_single_fan_uses_legacy_command() {
        let mut fans = FanState::new(1);
        fans.set_pwm(0, 255);
        let commands = FanCommandInterceptor::rewrite("M107", &mut fans);
        assert_eq!(commands, Some(vec!["M106 S0".to_string()]));
        assert_eq!(fans.get(0), Some(0));
    }

    #[test]
    fn test_fan_off_with_three_fans_zeroes_each() {
        let mut fans = FanState::new(3);
        fans.set_pwm(1, 128);
        fans.set_pwm(2, 255);

        let commands = FanCommandInterceptor::rewrite("M107", &mut fans).unwrap();
        assert_eq!(commands, vec!["M106 P0 S0", "M106 P1 S0", "M106 P2 S0"]);
        assert!(fans.iter().all(|(_, percent)| percent == 0));
    }

    #[test]
    fn test_other_commands_pass_through() {
        let mut fans = FanState::new(2);
        assert_eq!(FanCommandInterceptor::rewrite("M106 P1 S128", &mut fans), None);
        assert_eq!(FanCommandInterceptor::rewrite("G28", &mut fans), None);
        assert_eq!(fans.get(1), Some(0));
    }

    #[test]
    fn test_observe_fan_duty_converts_to_percent() {
        let mut fans = FanState::new(1);
        let duty = LineMatch::FanDuty { index: 1, pwm: 128 };
        let changed = FanCommandInterceptor::observe(&duty, &mut fans);
        assert!(changed);
        assert_eq!(fans.get(1), Some(50));
        assert_eq!(fans.len(), 2);

        FanCommandInterceptor::observe(&LineMatch::FanOff, &mut fans);
        assert_eq!(fans.get(1), Some(0));
        assert!(!FanCommandInterceptor::observe(&LineMatch::TuneFinished, &mut fans));
    }
}
