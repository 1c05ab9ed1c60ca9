// Charge/discharge classification over the charge series
use super::telemetry::Sample;

pub const CHARGING_COLOR: &str = "#10b981";
pub const DISCHARGING_COLOR: &str = "#ef4444";

/// One flag per adjacent pair of charge samples, `true` when charging.
///
/// Charge is tracked as capacity consumed, so a falling value means the
/// battery is being replenished. Equal values count as discharging.
pub fn classify(charge: &[Sample]) -> Vec<bool> {
    charge
        .windows(2)
        .map(|pair| pair[1].value < pair[0].value)
        .collect()
}

/// Highlight color for the line segment ending at a classified sample
pub fn segment_color(is_charging: bool) -> &'static str {
    if is_charging {
        CHARGING_COLOR
    } else {
        DISCHARGING_COLOR
    }
}
