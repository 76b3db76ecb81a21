use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{
    Serialize,
    Deserialize
};
use tracing::info;

use crate::instrument::bond::bondconvention::{
    BondConventionManager,
    bond_convention_manager
};
use crate::manager::managererror::ManagerError;
use crate::manager::manager::IManager;
use crate::math::optimizer::minimizer::OptimizationMethod;
use crate::time::calendar::holidaycalendarmanager::HolidayCalendarManager;

/// Numerical defaults used when a build request leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub calibration_tolerance: f64,
    pub zero_tolerance: f64,
    pub opt_method: OptimizationMethod,
    pub max_iters: u64,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        ModelDefaults {
            calibration_tolerance: 1e-8,
            zero_tolerance: 1e-12,
            opt_method: OptimizationMethod::Bfgs,
            max_iters: 500,
        }
    }
}

#[derive(Deserialize)]
struct ConfigurationJsonProp {
    #[serde(default)]
    holiday_calendar: Vec<serde_json::Value>,
    #[serde(default)]
    bond_convention: Vec<serde_json::Value>,
    #[serde(default)]
    defaults: Option<ModelDefaults>,
}

/// 行事曆、債券慣例與數值預設值的集合；JSON 內容疊加在內建項目之上。
pub struct Configuration {
    holiday_calendar_manager: HolidayCalendarManager,
    bond_convention_manager: BondConventionManager,
    defaults: ModelDefaults,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            holiday_calendar_manager: HolidayCalendarManager::default(),
            bond_convention_manager: bond_convention_manager(),
            defaults: ModelDefaults::default(),
        }
    }
}

impl Configuration {
    pub fn calendars(&self) -> &HolidayCalendarManager {
        &self.holiday_calendar_manager
    }

    pub fn bond_conventions(&self) -> &BondConventionManager {
        &self.bond_convention_manager
    }

    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    pub fn from_json_value(json_value: serde_json::Value) -> Result<Configuration, ManagerError> {
        let json_prop: ConfigurationJsonProp =
            serde_json::from_value(json_value).map_err(ManagerError::JsonParseError)?;
        let mut config = Configuration::default();
        config.holiday_calendar_manager.insert_obj_from_json_vec(&json_prop.holiday_calendar)?;
        config.bond_convention_manager.insert_obj_from_json_vec(&json_prop.bond_convention)?;
        if let Some(defaults) = json_prop.defaults {
            config.defaults = defaults;
        }
        info!(
            calendars = config.holiday_calendar_manager.names().len(),
            bond_conventions = config.bond_convention_manager.names().len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn from_reader<P: AsRef<Path>>(file_path: P) -> Result<Configuration, ManagerError> {
        let file = File::open(file_path).map_err(ManagerError::IOError)?;
        let reader = BufReader::new(file);
        let json_value: serde_json::Value = serde_json::from_reader(reader).map_err(ManagerError::JsonParseError)?;
        Configuration::from_json_value(json_value)
    }
}
