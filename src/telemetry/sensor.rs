use chrono::NaiveDateTime;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// One sensor record as published on `/topic/sensor-data`.
///
/// Every field is optional: a message only carries what changed, and
/// [`SensorReading::merge`] folds it into the last known values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "Option::is_none")]
    pub snow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "Option::is_none")]
    pub rain_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_state: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiation: Option<f64>,
    #[serde(rename = "pvAngle", default, skip_serializing_if = "Option::is_none")]
    pub pv_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl SensorReading {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Overwrites the fields `update` carries and keeps the rest.
    pub fn merge(&mut self, update: &SensorReading) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        take(&mut self.snow, &update.snow);
        take(&mut self.wind_speed, &update.wind_speed);
        take(&mut self.rain_detected, &update.rain_detected);
        take(&mut self.switch_state, &update.switch_state);
        take(&mut self.radiation, &update.radiation);
        take(&mut self.pv_angle, &update.pv_angle);
        take(&mut self.humidity, &update.humidity);
        take(&mut self.temperature, &update.temperature);
        take(&mut self.timestamp, &update.timestamp);
    }

    pub fn is_empty(&self) -> bool {
        *self == SensorReading::default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(f64),
}

/// Sensors report flags either as booleans or as 0/1.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(value)) => Ok(Some(value)),
        Some(Flag::Number(n)) if n == 0.0 => Ok(Some(false)),
        Some(Flag::Number(n)) if n == 1.0 => Ok(Some(true)),
        Some(Flag::Number(n)) => Err(de::Error::custom(format!(
            "expected a boolean or 0/1 flag, got {n}"
        ))),
    }
}
