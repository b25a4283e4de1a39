use serde::{Deserialize, Serialize};

/// Operating bands for the clamped process values.
pub const CUTTING_SPEED_BAND: (f64, f64) = (15.0, 25.0);
pub const POWER_BAND: (f64, f64) = (60.0, 90.0);
pub const TEMPERATURE_BAND: (f64, f64) = (40.0, 60.0);
pub const VIBRATION_BAND: (f64, f64) = (2.0, 10.0);
pub const PRESSURE_BAND: (f64, f64) = (150.0, 200.0);

/// Nominal set-points of a mid-size industrial bandsaw line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetValues {
    /// m/min
    pub cutting_speed: f64,
    /// RPM
    pub motor_speed: f64,
    /// kW
    pub power_consumption: f64,
    /// °C
    pub temperature: f64,
    /// mm/s RMS
    pub vibration: f64,
    /// bar
    pub pressure: f64,
}

impl Default for TargetValues {
    fn default() -> Self {
        Self {
            cutting_speed: 20.0,
            motor_speed: 1800.0,
            power_consumption: 75.0,
            temperature: 45.0,
            vibration: 4.0,
            pressure: 175.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SawmillState {
    pub is_active: bool,
    pub is_working: bool,
    pub is_stopped: bool,
    pub cutting_speed: f64,
    pub motor_speed: f64,
    pub power_consumption: f64,
    pub pieces_count: i64,
    pub has_alarm: bool,
    pub has_error: bool,
    pub temperature: f64,
    pub vibration: f64,
    pub pressure: f64,
    pub speed: f64,
}

impl SawmillState {
    /// A stopped machine sitting at its set-points.
    pub fn at_rest(targets: &TargetValues) -> Self {
        Self {
            is_active: false,
            is_working: false,
            is_stopped: true,
            cutting_speed: targets.cutting_speed,
            motor_speed: targets.motor_speed,
            power_consumption: targets.power_consumption,
            pieces_count: 0,
            has_alarm: false,
            has_error: false,
            temperature: targets.temperature,
            vibration: targets.vibration,
            pressure: targets.pressure,
            speed: targets.motor_speed,
        }
    }
}

impl Default for SawmillState {
    fn default() -> Self {
        Self::at_rest(&TargetValues::default())
    }
}
