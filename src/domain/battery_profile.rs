// Battery profile domain model - chemistry-dependent display bounds
use serde::Serialize;

/// Named voltage thresholds, most severe (highest voltage) first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoltageLevel {
    Usb,
    High,
    Normal,
    Low,
    Dead,
}

#[derive(Debug, PartialEq)]
pub struct BatteryProfile {
    pub chemistry: &'static str,
    pub min_voltage: f64,
    pub max_voltage: f64,
    pub color: &'static str,
    pub levels: &'static [(VoltageLevel, f64)],
}

pub const FALLBACK_CHEMISTRY: &str = "default";

static PROFILES: [BatteryProfile; 6] = [
    BatteryProfile {
        chemistry: "lipo",
        min_voltage: 3.2,
        max_voltage: 4.6,
        color: "#3b82f6",
        levels: &[
            (VoltageLevel::Usb, 4.6),
            (VoltageLevel::High, 4.0),
            (VoltageLevel::Normal, 3.5),
            (VoltageLevel::Low, 3.2),
            (VoltageLevel::Dead, 0.0),
        ],
    },
    BatteryProfile {
        chemistry: "l91",
        min_voltage: 4.5,
        max_voltage: 5.0,
        color: "#8b5cf6",
        levels: &[
            (VoltageLevel::High, 5.0),
            (VoltageLevel::Normal, 4.5),
            (VoltageLevel::Low, 0.0),
        ],
    },
    BatteryProfile {
        chemistry: "alkaline",
        min_voltage: 3.6,
        max_voltage: 4.6,
        color: "#10b981",
        levels: &[
            (VoltageLevel::Usb, 4.6),
            (VoltageLevel::High, 4.2),
            (VoltageLevel::Normal, 3.6),
            (VoltageLevel::Low, 0.0),
        ],
    },
    BatteryProfile {
        chemistry: "tad",
        min_voltage: 3.2,
        max_voltage: 4.6,
        color: "#f59e0b",
        levels: &[
            (VoltageLevel::Usb, 4.6),
            (VoltageLevel::Normal, 3.2),
            (VoltageLevel::Low, 0.0),
        ],
    },
    BatteryProfile {
        chemistry: "lic",
        min_voltage: 3.1,
        max_voltage: 4.6,
        color: "#ef4444",
        levels: &[
            (VoltageLevel::Usb, 4.6),
            (VoltageLevel::High, 3.8),
            (VoltageLevel::Normal, 3.1),
            (VoltageLevel::Low, 0.0),
        ],
    },
    BatteryProfile {
        chemistry: FALLBACK_CHEMISTRY,
        min_voltage: 2.5,
        max_voltage: 2.5,
        color: "#6b7280",
        levels: &[(VoltageLevel::Normal, 2.5), (VoltageLevel::Dead, 0.0)],
    },
];

/// Resolve a chemistry key, falling back to the default profile for unknown keys
pub fn lookup(chemistry: &str) -> &'static BatteryProfile {
    PROFILES
        .iter()
        .find(|p| p.chemistry == chemistry)
        .unwrap_or_else(fallback)
}

fn fallback() -> &'static BatteryProfile {
    // The fallback entry is always last in the table
    &PROFILES[PROFILES.len() - 1]
}

impl BatteryProfile {
    /// Upper bound for the voltage chart's value axis
    pub fn voltage_axis_max(&self, margin: u32) -> f64 {
        self.max_voltage.ceil() + f64::from(margin)
    }

    /// Highest named level whose threshold the voltage reaches
    pub fn level_for(&self, voltage: f64) -> Option<VoltageLevel> {
        self.levels
            .iter()
            .find(|(_, threshold)| voltage >= *threshold)
            .map(|(level, _)| *level)
    }
}
