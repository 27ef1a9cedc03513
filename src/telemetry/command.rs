use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::ChannelError;

/// Operating mode of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackerMode {
    Manual,
    Autotrack,
    Safety,
}

impl TrackerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerMode::Manual => "MANUAL",
            TrackerMode::Autotrack => "AUTOTRACK",
            TrackerMode::Safety => "SAFETY",
        }
    }
}

impl fmt::Display for TrackerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerMode {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(TrackerMode::Manual),
            "AUTOTRACK" => Ok(TrackerMode::Autotrack),
            "SAFETY" => Ok(TrackerMode::Safety),
            other => Err(ChannelError::InvalidCommand(format!(
                "unknown tracker mode `{other}`"
            ))),
        }
    }
}

pub const MIN_ANGLE: f64 = 0.0;
pub const MAX_ANGLE: f64 = 180.0;

/// Body of `/app/control` and `/app/emergency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommand {
    pub mode: TrackerMode,
    /// Only meaningful in manual mode.
    pub target_angle: Option<f64>,
    pub emergency_stop: bool,
}

impl ControlCommand {
    pub fn mode(mode: TrackerMode) -> Self {
        Self {
            mode,
            target_angle: None,
            emergency_stop: false,
        }
    }

    /// Manual mode at `angle` degrees, which must lie in `[0, 180]`.
    pub fn manual(angle: f64) -> Result<Self, ChannelError> {
        if !angle.is_finite() || !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
            return Err(ChannelError::InvalidCommand(format!(
                "target angle {angle} outside {MIN_ANGLE}..={MAX_ANGLE}"
            )));
        }
        Ok(Self {
            mode: TrackerMode::Manual,
            target_angle: Some(angle),
            emergency_stop: false,
        })
    }

    pub fn emergency() -> Self {
        Self {
            mode: TrackerMode::Safety,
            target_angle: None,
            emergency_stop: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrostProtection {
    Used,
    NotUsed,
}

impl FromStr for FrostProtection {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "USED" | "ON" => Ok(FrostProtection::Used),
            "NOT_USED" | "OFF" => Ok(FrostProtection::NotUsed),
            other => Err(ChannelError::InvalidCommand(format!(
                "unknown frost protection setting `{other}`"
            ))),
        }
    }
}

/// Operator constraints pushed to `/app/plant-requirements`. Only the fields
/// that are set go on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_rays: Option<String>,
    /// Percent, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shading: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_frost_protection: Option<FrostProtection>,
}

impl PlantRequirements {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.sun_rays.is_none() && self.shading.is_none() && self.night_frost_protection.is_none()
        {
            return Err(ChannelError::InvalidCommand(
                "plant requirements carry no field".to_string(),
            ));
        }
        if let Some(shading) = self.shading.filter(|shading| *shading > 100) {
            return Err(ChannelError::InvalidCommand(format!(
                "shading {shading}% above 100%"
            )));
        }
        if self.sun_rays.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ChannelError::InvalidCommand("sun rays is blank".to_string()));
        }
        Ok(())
    }

    pub fn merge(&mut self, update: &PlantRequirements) {
        if update.sun_rays.is_some() {
            self.sun_rays.clone_from(&update.sun_rays);
        }
        if update.shading.is_some() {
            self.shading = update.shading;
        }
        if update.night_frost_protection.is_some() {
            self.night_frost_protection = update.night_frost_protection;
        }
    }
}

/// `{"type":"INITIAL_DATA_REQUEST"}`; asks the backend for a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialDataRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for InitialDataRequest {
    fn default() -> Self {
        Self {
            kind: "INITIAL_DATA_REQUEST".to_string(),
        }
    }
}
