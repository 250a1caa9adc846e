//! Status document served at `/api/v1/status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::{DeviceState, DiagnosticsReport, PowerState, SecurityState, ThermalState};

/// Point-in-time view of the whole device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub device_id: String,
    pub time: DateTime<Utc>,
    pub health: Health,
}

/// Per-subsystem health.
///
/// `state` and `diagnostics` are omitted when the subsystem is disabled
/// or has stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub power: PowerHealth,
    pub thermal: ThermalHealth,
    pub security: SecurityHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerHealth {
    pub battery_level: f64,
    pub charging: bool,
    pub voltage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalHealth {
    pub cpu_temp: f64,
    pub gpu_temp: f64,
    pub ambient_temp: f64,
    pub fan_speed: i32,
    pub throttled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecurityHealth {
    pub case_open: bool,
    pub motion_detected: bool,
    pub voltage_normal: bool,
}

impl From<PowerState> for PowerHealth {
    fn from(s: PowerState) -> Self {
        Self {
            battery_level: s.battery_level,
            charging: s.charging,
            voltage: s.voltage,
        }
    }
}

impl From<ThermalState> for ThermalHealth {
    fn from(s: ThermalState) -> Self {
        Self {
            cpu_temp: s.cpu_temp,
            gpu_temp: s.gpu_temp,
            ambient_temp: s.ambient_temp,
            fan_speed: s.fan_speed,
            throttled: s.throttled,
        }
    }
}

impl From<SecurityState> for SecurityHealth {
    fn from(s: SecurityState) -> Self {
        Self {
            case_open: s.case_open,
            motion_detected: s.motion_detected,
            voltage_normal: s.voltage_normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> SystemStatus {
        SystemStatus {
            device_id: "dev-1".into(),
            time: Utc::now(),
            health: Health {
                power: PowerState::default().into(),
                thermal: ThermalState::default().into(),
                security: SecurityState::default().into(),
                state: None,
                diagnostics: None,
            },
        }
    }

    #[test]
    fn wire_shape() {
        let json: Value = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["device_id"], "dev-1");
        assert!(json["time"].as_str().unwrap().contains('T'));

        let health = json["health"].as_object().unwrap();
        assert_eq!(health.len(), 3);
        assert_eq!(health["power"].as_object().unwrap().len(), 3);
        assert_eq!(health["thermal"]["fan_speed"], 0);
        assert_eq!(health["security"]["voltage_normal"], true);
    }

    #[test]
    fn optional_sections_appear_when_present() {
        let mut status = sample();
        status.health.diagnostics = Some(DiagnosticsReport::default());
        let json: Value = serde_json::to_value(&status).unwrap();
        assert!(json["health"].get("diagnostics").is_some());
        assert!(json["health"].get("state").is_none());

        let back: SystemStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}
