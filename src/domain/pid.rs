// PID data domain model
use super::heater::{HeaterId, HeaterKind, Topology};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// PID gains and autotune diagnostics for one heater.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PidRecord {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub bias: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub ku: Option<f64>,
    pub tu: Option<f64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<HeaterId>,
    #[serde(skip)]
    pub kind: HeaterKind,
}

impl PidRecord {
    pub fn bed() -> Self {
        Self::empty("HB".to_string(), None, HeaterKind::Bed)
    }

    pub fn hotend(index: HeaterId) -> Self {
        Self::empty(format!("E{}", index), Some(index), HeaterKind::Hotend)
    }

    fn empty(name: String, index: Option<HeaterId>, kind: HeaterKind) -> Self {
        Self {
            kp: None,
            ki: None,
            kd: None,
            bias: None,
            min: None,
            max: None,
            ku: None,
            tu: None,
            name,
            index,
            kind,
        }
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.kp = Some(gains.kp);
        self.ki = Some(gains.ki);
        self.kd = Some(gains.kd);
    }
}

/// Serializable view of every record, keyed by heater id.
pub type PidSnapshot = BTreeMap<HeaterId, PidRecord>;

/// One record per configured heater, created up front and never removed.
#[derive(Debug, Clone)]
pub struct PidModel {
    records: BTreeMap<HeaterId, PidRecord>,
}

impl PidModel {
    pub fn new(topology: &Topology) -> Self {
        let records = topology
            .heaters()
            .iter()
            .map(|h| {
                let record = match h.kind {
                    HeaterKind::Bed => PidRecord::bed(),
                    HeaterKind::Hotend => PidRecord::hotend(h.id),
                };
                (h.id, record)
            })
            .collect();

        Self { records }
    }

    pub fn get(&self, id: HeaterId) -> Option<&PidRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: HeaterId) -> Option<&mut PidRecord> {
        self.records.get_mut(&id)
    }

    pub fn snapshot(&self) -> PidSnapshot {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::heater::{ExtruderProfile, PrinterProfile};

    fn model() -> PidModel {
        PidModel::new(&Topology::from_profile(&PrinterProfile {
            heated_bed: true,
            extruder: ExtruderProfile { count: 2 },
        }))
    }

    #[test]
    fn test_model_has_one_record_per_heater() {
        let model = model();
        assert_eq!(model.get(-1).map(|r| r.name.as_str()), Some("HB"));
        assert_eq!(model.get(0).map(|r| r.name.as_str()), Some("E0"));
        assert_eq!(model.get(1).map(|r| r.name.as_str()), Some("E1"));
        assert!(model.get(2).is_none());
    }

    #[test]
    fn test_snapshot_hides_kind_and_keys_by_id() {
        let mut model = model();
        model.get_mut(0).unwrap().set_gains(PidGains {
            kp: 22.2,
            ki: 1.08,
            kd: 114.0,
        });

        let json = serde_json::to_value(model.snapshot()).unwrap();
        assert_eq!(json["0"]["kp"], 22.2);
        assert_eq!(json["0"]["index"], 0);
        assert!(json["0"]["bias"].is_null());
        assert!(json["0"].get("kind").is_none());
        assert!(json["-1"].get("index").is_none());
        assert_eq!(json["-1"]["name"], "HB");
    }
}
