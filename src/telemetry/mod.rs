//! The dashboard's view of the plant: sensor readings coming in, tracker
//! commands going out.

pub mod command;
pub mod dashboard;
pub mod sensor;


pub use command::{
    ControlCommand, FrostProtection, InitialDataRequest, PlantRequirements, TrackerMode,
};
pub use dashboard::{Alert, AlertKind, ChartPoint, Dashboard, DashboardState};
pub use sensor::SensorReading;

/// Broker destinations the dashboard talks to.
pub mod destinations {
    pub const SENSOR_DATA: &str = "/topic/sensor-data";
    pub const CONTROL: &str = "/app/control";
    pub const EMERGENCY: &str = "/app/emergency";
    pub const PLANT_REQUIREMENTS: &str = "/app/plant-requirements";
    pub const INITIAL_DATA: &str = "/app/request-initial-data";
}
