use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    LifelineError,
    geo::{self, DEFAULT_AVERAGE_SPEED_MPH, GeoPoint},
    sos::ContactId,
    tracking::{DEFAULT_USER_POSITION, DEFAULT_VEHICLE_POSITION, LocationSimulator},
};

const CONFIG_DIR_NAME: &str = "lifeline";
const CONFIG_FILE_NAME: &str = "config.json";
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Display data for someone who can be notified during an SOS.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmergencyContact {
    pub id: ContactId,
    pub name: String,
    pub icon: String,
}

impl EmergencyContact {
    pub fn new(id: ContactId, name: &str, icon: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            icon: icon.to_string(),
        }
    }
}

pub fn default_contacts() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::new(ContactId::dispatch(), "Emergency Dispatch", "🚨"),
        EmergencyContact::new(ContactId::new("2"), "Family - Mom", "👩"),
        EmergencyContact::new(ContactId::new("3"), "Friend - John", "👨"),
        EmergencyContact::new(ContactId::new("4"), "Workplace - HR", "🏢"),
    ]
}

/// The ambulance crew shown on the tracking screen.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseTeam {
    pub unit: String,
    pub crew: String,
}

impl Default for ResponseTeam {
    fn default() -> Self {
        Self {
            unit: "Rescue Unit 7".to_string(),
            crew: "Paramedics Johnson & Martinez".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub tick_interval_ms: u64,
    pub average_speed_mph: f64,
    /// Ring the terminal bell on every countdown tick
    pub ring_bell: bool,
    /// Used until the location sensor reports a position
    pub default_user_position: GeoPoint,
    pub default_vehicle_position: GeoPoint,
    pub contacts: Vec<EmergencyContact>,
    pub response_team: ResponseTeam,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            average_speed_mph: DEFAULT_AVERAGE_SPEED_MPH,
            ring_bell: true,
            default_user_position: DEFAULT_USER_POSITION,
            default_vehicle_position: DEFAULT_VEHICLE_POSITION,
            contacts: default_contacts(),
            response_team: ResponseTeam::default(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, LifelineError> {
        Ok(dirs::config_dir()
            .ok_or(LifelineError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the user's config directory, if one has been saved.
    pub fn from_local_file() -> Result<Option<Self>, LifelineError> {
        let config_path = Self::default_path()?;
        if config_path.exists() {
            Self::from_file(&config_path).map(Some)
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
            Ok(None)
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, LifelineError> {
        let file = File::open(path).map_err(|e| LifelineError::ConfigIOError { source: e })?;
        let config: AppConfig = serde_json::from_reader(file)
            .map_err(|e| LifelineError::ConfigSerializeError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), LifelineError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LifelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LifelineError::ConfigIOError { source: e })?;
        }

        let file = File::create(path).map_err(|e| LifelineError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| LifelineError::ConfigSerializeError { source: e })
    }

    pub fn validate(&self) -> Result<(), LifelineError> {
        if self.tick_interval_ms == 0 {
            return Err(LifelineError::InvalidUserInput {
                field: "tick_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        geo::validate_speed(self.average_speed_mph)?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn simulator(&self) -> Result<LocationSimulator, LifelineError> {
        LocationSimulator::new(self.default_user_position, self.default_vehicle_position)
            .with_average_speed(self.average_speed_mph)
    }

    pub fn contact(&self, id: &ContactId) -> Option<&EmergencyContact> {
        self.contacts.iter().find(|c| &c.id == id)
    }

    /// Display name for a contact id, falling back to the raw id for unknown contacts.
    pub fn contact_name<'a>(&'a self, id: &'a ContactId) -> &'a str {
        self.contact(id).map_or(id.as_str(), |c| c.name.as_str())
    }
}
