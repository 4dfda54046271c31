// Line classifier - Ordered pattern rules over firmware text lines
use crate::domain::heater::{HeaterId, BED};
use crate::domain::pid::PidGains;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Full PWM duty, used when `M106` carries no `S` parameter.
pub const FULL_DUTY: u32 = 255;

/// A recognised line and its typed captures. One variant per rule.
#[derive(Debug, Clone, PartialEq)]
pub enum LineMatch {
    /// Relay-step diagnostic printed during autotune.
    RelayStep { bias: f64, d: f64, min: f64, max: f64 },
    /// Ultimate gain and oscillation period.
    TuneParams { ku: f64, tu: f64 },
    TuneFinished,
    TuneFailed,
    FanSpeedReport { index: usize, pwm: u32 },
    BedPid(PidGains),
    ToolPid(PidGains),
    HeaterPidReport(PidGains),
    TuneRequest {
        heater: HeaterId,
        cycles: Option<i64>,
        target: Option<i64>,
    },
    LoadToolPid { heater: HeaterId },
    LoadBedPid,
    FanDuty { index: usize, pwm: u32 },
    FanOff,
}

struct Rule {
    name: &'static str,
    regex: Regex,
    build: fn(&Captures) -> Option<LineMatch>,
}

const NUM: &str = r"[-+]?\d+(?:\.\d*)?";

fn rule(name: &'static str, pattern: &str, build: fn(&Captures) -> Option<LineMatch>) -> Rule {
    let pattern = pattern.replace("{NUM}", NUM);
    Rule {
        name,
        regex: Regex::new(&pattern).unwrap(),
        build,
    }
}

lazy_static! {
    // Protocol-specific lines come before the generic heater report, which
    // would otherwise swallow them.
    static ref RULES: Vec<Rule> = vec![
        rule(
            "relay_step",
            r"^bias:\s*(?P<bias>{NUM})\s+d:\s*(?P<d>{NUM})\s+min:\s*(?P<min>{NUM})\s+max:\s*(?P<max>{NUM})",
            |c| Some(LineMatch::RelayStep {
                bias: float(c, "bias")?,
                d: float(c, "d")?,
                min: float(c, "min")?,
                max: float(c, "max")?,
            }),
        ),
        rule(
            "tune_params",
            r"Ku:\s*(?P<ku>{NUM})\s+Tu:\s*(?P<tu>{NUM})",
            |c| Some(LineMatch::TuneParams { ku: float(c, "ku")?, tu: float(c, "tu")? }),
        ),
        rule("tune_finished", r"^PID Autotune finished", |_| Some(LineMatch::TuneFinished)),
        rule("tune_failed", r"^PID Autotune failed", |_| Some(LineMatch::TuneFailed)),
        rule(
            "fan_speed_report",
            r"^Fan\(s\)\s+Speed:\s+Fan(?P<index>\d+)=\s*(?P<value>\d+)",
            |c| Some(LineMatch::FanSpeedReport {
                index: int(c, "index")?,
                pwm: clamp_pwm(int(c, "value")?),
            }),
        ),
        rule(
            "bed_pid",
            r"^M304\s+P(?P<p>{NUM})\s+I(?P<i>{NUM})\s+D(?P<d>{NUM})",
            |c| Some(LineMatch::BedPid(gains(c)?)),
        ),
        rule(
            "tool_pid",
            r"^M301\s+P(?P<p>{NUM})\s+I(?P<i>{NUM})\s+D(?P<d>{NUM})",
            |c| Some(LineMatch::ToolPid(gains(c)?)),
        ),
        rule(
            "heater_pid_report",
            r"(?i)^(?:e:\s*\d+\s+)?p:\s*(?P<p>{NUM})\s+i:\s*(?P<i>{NUM})\s+d:\s*(?P<d>{NUM})",
            |c| Some(LineMatch::HeaterPidReport(gains(c)?)),
        ),
        rule(
            "tune_request",
            r"^M303\b(?:\s+E(?P<heater>-?\d+)|\s+C(?P<cycles>-?\d+)|\s+S(?P<target>-?\d+)|\s+\S+)*",
            |c| Some(LineMatch::TuneRequest {
                heater: optional_int(c, "heater")?.unwrap_or(0),
                cycles: optional_int(c, "cycles")?,
                target: optional_int(c, "target")?,
            }),
        ),
        rule(
            "load_tool_pid",
            r"^M301\s+E(?P<heater>-?\d+)",
            |c| Some(LineMatch::LoadToolPid { heater: int(c, "heater")? }),
        ),
        rule("load_bed_pid", r"^M304\b", |_| Some(LineMatch::LoadBedPid)),
        rule(
            "fan_duty",
            r"^M106\b(?:\s+P(?P<index>\S*)|\s+S(?P<value>\S*)|\s+\S+)*",
            |c| Some(LineMatch::FanDuty {
                index: lenient_int(c, "index"),
                pwm: match c.name("value") {
                    Some(_) => clamp_pwm(lenient_int(c, "value")),
                    None => FULL_DUTY,
                },
            }),
        ),
        rule("fan_off", r"^M107\b", |_| Some(LineMatch::FanOff)),
    ];
}

/// Strip host and firmware framing (`Recv:`, `Send:`, `echo:`) and surrounding blanks.
pub fn strip_framing(line: &str) -> &str {
    let mut rest = line.trim();
    for prefix in ["Recv:", "Send:", "echo:"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start();
        }
    }
    rest.trim_end()
}

/// Classify one line: the first rule whose pattern matches and whose captures parse wins.
pub fn classify(line: &str) -> Option<LineMatch> {
    let text = strip_framing(line);
    if text.is_empty() {
        return None;
    }

    RULES.iter().find_map(|rule| {
        let captures = rule.regex.captures(text)?;
        let matched = (rule.build)(&captures);
        if matched.is_none() {
            tracing::debug!("Rule {} matched {:?} but a field did not parse", rule.name, text);
        }
        matched
    })
}

fn float(c: &Captures, name: &str) -> Option<f64> {
    c.name(name)?.as_str().parse().ok()
}

fn int<T: std::str::FromStr>(c: &Captures, name: &str) -> Option<T> {
    c.name(name)?.as_str().parse().ok()
}

/// Absent is fine (`Some(None)`), present but unparseable fails the rule (`None`).
fn optional_int<T: std::str::FromStr>(c: &Captures, name: &str) -> Option<Option<T>> {
    match c.name(name) {
        Some(m) => m.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

/// Fan fields never fail the rule: absent or garbage reads as zero.
fn lenient_int<T: std::str::FromStr + Default>(c: &Captures, name: &str) -> T {
    int(c, name).unwrap_or_default()
}

fn gains(c: &Captures) -> Option<PidGains> {
    Some(PidGains {
        kp: float(c, "p")?,
        ki: float(c, "i")?,
        kd: float(c, "d")?,
    })
}

fn clamp_pwm(value: u32) -> u32 {
    value.min(FULL_DUTY)
}

/// Heater index addressed by a load-PID line, if any.
pub fn load_target(matched: &LineMatch) -> Option<HeaterId> {
    match matched {
        LineMatch::LoadToolPid { heater } => Some(*heater),
        LineMatch::LoadBedPid => Some(BED),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(kp: f64, ki: f64, kd: f64) -> PidGains {
        PidGains { kp, ki, kd }
    }

    #[test]
    fn test_strip_framing() {
        assert_eq!(strip_framing("Recv: echo:  M301 P1 I2 D3 "), "M301 P1 I2 D3");
        assert_eq!(strip_framing("  bias: 92 "), "bias: 92");
        assert_eq!(strip_framing("ok"), "ok");
    }

    #[test]
    fn test_classify_relay_step() {
        assert_eq!(
            classify("Recv:  bias: 92 d: 92 min: 196.56 max: 203.75"),
            Some(LineMatch::RelayStep { bias: 92.0, d: 92.0, min: 196.56, max: 203.75 })
        );
    }

    #[test]
    fn test_classify_tune_params() {
        assert_eq!(
            classify("Recv:  Ku: 34.79 Tu: 31.86"),
            Some(LineMatch::TuneParams { ku: 34.79, tu: 31.86 })
        );
    }

    #[test]
    fn test_classify_tune_markers() {
        assert_eq!(
            classify("Recv: PID Autotune finished! Put the last Kp, Ki and Kd constants from below into Configuration.h"),
            Some(LineMatch::TuneFinished)
        );
        assert_eq!(
            classify("PID Autotune failed! Temperature too high"),
            Some(LineMatch::TuneFailed)
        );
    }

    #[test]
    fn test_classify_pid_echoes() {
        assert_eq!(
            classify("Recv: echo:  M304 P97.10 I1.41 D1675.16"),
            Some(LineMatch::BedPid(pid(97.10, 1.41, 1675.16)))
        );
        assert_eq!(
            classify("echo: M301 P22.20 I1.08 D114.00"),
            Some(LineMatch::ToolPid(pid(22.2, 1.08, 114.0)))
        );
        assert_eq!(
            classify("echo:  P:20.00 I:1.50 D:120.00 "),
            Some(LineMatch::HeaterPidReport(pid(20.0, 1.5, 120.0)))
        );
        assert_eq!(
            classify(" e:0 p:21.73 i:1.54 d:76.55 c:1.00"),
            Some(LineMatch::HeaterPidReport(pid(21.73, 1.54, 76.55)))
        );
    }

    #[test]
    fn test_classify_tune_request_params_in_any_order() {
        assert_eq!(
            classify("M303 E1 S200 C8"),
            Some(LineMatch::TuneRequest { heater: 1, cycles: Some(8), target: Some(200) })
        );
        assert_eq!(
            classify("M303 E-1 C5 S60 U1"),
            Some(LineMatch::TuneRequest { heater: -1, cycles: Some(5), target: Some(60) })
        );
        assert_eq!(
            classify("M303 S210"),
            Some(LineMatch::TuneRequest { heater: 0, cycles: None, target: Some(210) })
        );
    }

    #[test]
    fn test_classify_load_pid() {
        assert_eq!(classify("M301 E1 "), Some(LineMatch::LoadToolPid { heater: 1 }));
        assert_eq!(classify("M304"), Some(LineMatch::LoadBedPid));
        assert_eq!(load_target(&LineMatch::LoadBedPid), Some(BED));
        assert_eq!(load_target(&LineMatch::FanOff), None);
    }

    #[test]
    fn test_classify_fan_duty_defaults() {
        assert_eq!(classify("M106 S128"), Some(LineMatch::FanDuty { index: 0, pwm: 128 }));
        assert_eq!(classify("M106 P2 S255"), Some(LineMatch::FanDuty { index: 2, pwm: 255 }));
        assert_eq!(classify("M106 S255 P1"), Some(LineMatch::FanDuty { index: 1, pwm: 255 }));
        assert_eq!(classify("M106 Px S"), Some(LineMatch::FanDuty { index: 0, pwm: 0 }));
        assert_eq!(classify("M106 S900"), Some(LineMatch::FanDuty { index: 0, pwm: 255 }));
        assert_eq!(classify("M106"), Some(LineMatch::FanDuty { index: 0, pwm: FULL_DUTY }));
        assert_eq!(classify("M107"), Some(LineMatch::FanOff));
    }

    #[test]
    fn test_classify_fan_speed_report() {
        assert_eq!(
            classify("Recv: Fan(s) Speed: Fan1= 127"),
            Some(LineMatch::FanSpeedReport { index: 1, pwm: 127 })
        );
    }

    #[test]
    fn test_malformed_numeric_fails_closed() {
        // Heater index does not fit: the request rule fails and nothing else applies.
        assert_eq!(classify("M303 E99999999999 S200"), None);
        assert_eq!(classify("M301 E99999999999"), None);
    }

    #[test]
    fn test_unrelated_lines_do_not_match() {
        assert_eq!(classify("Recv: ok T:210.0 /210.0 B:60.0 /60.0"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("M1060"), None);
        assert_eq!(classify("G28"), None);
    }
}
