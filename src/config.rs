//! Simulation configuration (spec §6): an immutable, programmatically built
//! parameter bundle constructed once and owned by the orchestrator. No
//! process-wide or file-parsed configuration state is permitted in the core.

use crate::coolant::{CoolantConfig, LoopSpec};
use crate::electrical::{BatteryConfig, BusSpec, ConsumerSpec, ElectricalConfig, ReactorConfig};
use crate::engine::EngineConfig;
use crate::errors::ConfigError;
use crate::flight_control::autopilot::AutopilotConfig;
use crate::flight_control::pid::PidGains;
use crate::flight_control::sas::SasConfig;
use crate::flight_control::FlightControlConfig;
use crate::fuel::{FuelConfig, TankRole, TankSpec};
use crate::gas::{BottleSpec, GasConfig};
use crate::physics::PhysicsConfig;
use crate::rcs::{GroupSpec, RcsConfig, ThrusterSpec};
use crate::thermal::{ConductanceTable, ThermalComponentSpec, ThermalConfig};
use serde::{Deserialize, Serialize};

/// Newtonian gravitational constant, m³/(kg·s²) (spec §6).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67430e-11;
/// Standard gravity, m/s² (spec §6).
pub const STANDARD_GRAVITY_M_S2: f64 = 9.80665;
/// Stefan-Boltzmann constant, W/(m²·K⁴) (spec §6).
pub const STEFAN_BOLTZMANN_CONSTANT: f64 = 5.670374419e-8;
/// Deep-space radiative sink temperature, K (spec §6).
pub const SPACE_TEMPERATURE_K: f64 = 2.7;
/// Default planet mass, kg (spec §6, Moon).
pub const DEFAULT_PLANET_MASS_KG: f64 = 7.342e22;
/// Default planet radius, m (spec §6, Moon).
pub const DEFAULT_PLANET_RADIUS_M: f64 = 1_737_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetConfig {
    pub mass_kg: f64,
    pub radius_m: f64,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        PlanetConfig {
            mass_kg: DEFAULT_PLANET_MASS_KG,
            radius_m: DEFAULT_PLANET_RADIUS_M,
        }
    }
}

impl PlanetConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.mass_kg <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "planet.mass_kg",
                value: self.mass_kg,
            });
        }
        if self.radius_m <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "planet.radius_m",
                value: self.radius_m,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Forward-integration step size for the trajectory predictor (spec §4.11).
    pub prediction_step_s: f64,
    /// Maximum forward-integration horizon, s (spec §4.11).
    pub prediction_horizon_s: f64,
    /// Safety margin applied to the analytic suicide-burn altitude (spec §4.10).
    pub suicide_burn_margin: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            prediction_step_s: 0.1,
            prediction_horizon_s: 1000.0,
            suicide_burn_margin: 1.15,
        }
    }
}

impl NavigationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.prediction_step_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "navigation.prediction_step_s",
                value: self.prediction_step_s,
            });
        }
        if self.prediction_horizon_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "navigation.prediction_horizon_s",
                value: self.prediction_horizon_s,
            });
        }
        Ok(())
    }
}

/// Aggregate, immutable configuration for an entire simulation instance
/// (spec §3 "SimulationConfig"). Constructed once, validated eagerly, and
/// never mutated for the lifetime of an [`crate::orchestrator::Orchestrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub max_events: usize,
    pub planet: PlanetConfig,
    pub fuel: FuelConfig,
    pub gas: GasConfig,
    pub electrical: ElectricalConfig,
    pub thermal: ThermalConfig,
    pub coolant: CoolantConfig,
    pub engine: EngineConfig,
    pub rcs: RcsConfig,
    pub physics: PhysicsConfig,
    pub navigation: NavigationConfig,
    pub flight_control: crate::flight_control::FlightControlConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "config.dt_s",
                value: self.dt_s,
            });
        }
        if self.max_events == 0 {
            return Err(ConfigError::ZeroCapacityEventLog);
        }
        self.planet.validate()?;
        self.fuel.validate()?;
        self.gas.validate()?;
        self.electrical.validate()?;
        self.thermal.validate()?;
        self.coolant.validate()?;
        self.physics.validate()?;
        self.navigation.validate()?;
        Ok(())
    }
}
