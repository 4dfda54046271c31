// Heater topology domain model
use serde::Deserialize;

/// Heater identifier: `-1` is the heated bed, `0..N-1` are hotends in declared order.
pub type HeaterId = i32;

pub const BED: HeaterId = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterKind {
    Bed,
    Hotend,
}

/// Subset of the host's printer profile that defines the heater set.
#[derive(Debug, Clone, Deserialize)]
pub struct PrinterProfile {
    #[serde(rename = "heatedBed", default)]
    pub heated_bed: bool,
    #[serde(default)]
    pub extruder: ExtruderProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtruderProfile {
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heater {
    pub id: HeaterId,
    pub name: String,
    pub kind: HeaterKind,
}

/// Heater set resolved from a printer profile. Hotends come first, the bed last.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    heaters: Vec<Heater>,
}

impl Topology {
    pub fn from_profile(profile: &PrinterProfile) -> Self {
        let count = HeaterId::try_from(profile.extruder.count).unwrap_or_else(|_| {
            tracing::warn!(
                "Extruder count {} out of range, profile has no usable hotends",
                profile.extruder.count
            );
            0
        });
        let mut heaters: Vec<Heater> = (0..count)
            .map(|id| Heater {
                id,
                name: format!("Tool{}", id),
                kind: HeaterKind::Hotend,
            })
            .collect();

        if profile.heated_bed {
            heaters.push(Heater {
                id: BED,
                name: "Bed".to_string(),
                kind: HeaterKind::Bed,
            });
        }

        Self { heaters }
    }

    pub fn heaters(&self) -> &[Heater] {
        &self.heaters
    }

    pub fn ids(&self) -> impl Iterator<Item = HeaterId> + '_ {
        self.heaters.iter().map(|h| h.id)
    }

    pub fn contains(&self, id: HeaterId) -> bool {
        self.heaters.iter().any(|h| h.id == id)
    }

    /// Look up a heater by its display name ("Tool0", "Bed").
    pub fn by_name(&self, name: &str) -> Option<&Heater> {
        self.heaters.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Heater display names keyed by id, as reported to the front end.
    pub fn names(&self) -> serde_json::Map<String, serde_json::Value> {
        self.heaters
            .iter()
            .map(|h| (h.id.to_string(), serde_json::Value::String(h.name.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(heated_bed: bool, count: u32) -> PrinterProfile {
        PrinterProfile {
            heated_bed,
            extruder: ExtruderProfile { count },
        }
    }

    #[test]
    fn test_topology_orders_hotends_before_bed() {
        let topology = Topology::from_profile(&profile(true, 2));
        let ids: Vec<HeaterId> = topology.ids().collect();
        assert_eq!(ids, vec![0, 1, BED]);
        assert_eq!(topology.heaters()[2].name, "Bed");
        assert_eq!(topology.heaters()[1].kind, HeaterKind::Hotend);
    }

    #[test]
    fn test_topology_without_bed() {
        let topology = Topology::from_profile(&profile(false, 1));
        assert!(topology.contains(0));
        assert!(!topology.contains(BED));
        assert!(topology.by_name("bed").is_none());
        assert_eq!(topology.by_name("tool0").map(|h| h.id), Some(0));
    }

    #[test]
    fn test_oversized_extruder_count_yields_no_hotends() {
        let topology = Topology::from_profile(&profile(true, u32::MAX));
        let ids: Vec<HeaterId> = topology.ids().collect();
        assert_eq!(ids, vec![BED]);
    }

    #[test]
    fn test_profile_deserializes_from_host_shape() {
        let json = r#"{"heatedBed": true, "extruder": {"count": 3}, "name": "Prusa"}"#;
        let profile: PrinterProfile = serde_json::from_str(json).unwrap();
        assert!(profile.heated_bed);
        assert_eq!(profile.extruder.count, 3);
    }
}
