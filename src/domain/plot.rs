// Plot projection domain model
use super::telemetry::TimeSeriesPoint;
use serde::Serialize;

const ACTUAL_COLORS: [&str; 8] = [
    "red", "orange", "lightgreen", "brown", "pink", "purple", "yellow", "blue",
];
const TARGET_COLORS: [&str; 8] = [
    "#ff8080", "#ffd080", "#c0edc0", "#a36767", "#ffe0e6", "#804080", "#ffff80", "#8080ff",
];
const FAN_COLORS: [&str; 8] = [
    "green", "violet", "lightblue", "yellow", "purple", "blue", "darkblue", "darkgreen",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Actual,
    Target,
    Fan,
}

impl Palette {
    /// Colour for a channel index; negative indices count from the end, so the bed (-1)
    /// takes the last entry.
    pub fn color(self, index: i32) -> &'static str {
        let colors = match self {
            Palette::Actual => &ACTUAL_COLORS,
            Palette::Target => &TARGET_COLORS,
            Palette::Fan => &FAN_COLORS,
        };
        colors[index.rem_euclid(colors.len() as i32) as usize]
    }
}

/// One display series as consumed by the graph widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub label: String,
    pub color: &'static str,
    pub data: Vec<TimeSeriesPoint>,
}

impl PlotSeries {
    pub fn new(label: String, color: &'static str, data: Vec<TimeSeriesPoint>) -> Self {
        Self { label, color, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps_and_bed_takes_last() {
        assert_eq!(Palette::Actual.color(0), "red");
        assert_eq!(Palette::Actual.color(-1), "blue");
        assert_eq!(Palette::Target.color(-1), "#8080ff");
        assert_eq!(Palette::Fan.color(9), "violet");
    }
}
