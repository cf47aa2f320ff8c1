//! Fuel subsystem (spec §4.2): multi-tank propellant with ideal-gas ullage
//! pressure, thermal relaxation, and center-of-mass reporting.

use crate::errors::{ConfigError, FuelError};
use crate::events::EventKind;
use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Universal gas constant, J/(mol·K).
const GAS_CONSTANT: f64 = 8.314462618;

/// Volume below which ullage is considered collapsed (spec §4.2).
const MIN_ULLAGE_VOLUME_M3: f64 = 1e-6;

/// Which draw requests a tank accepts (spec §3, "consumption routing rules").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankRole {
    Main,
    Rcs,
}

/// Immutable per-tank configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSpec {
    pub id: String,
    pub role: TankRole,
    pub capacity_kg: f64,
    pub volume_m3: f64,
    pub position_m: (f64, f64, f64),
    pub propellant_density_kg_m3: f64,
    pub pressurant_molar_mass_kg_mol: f64,
    pub structural_limit_pa: f64,
    pub rupture_threshold_pa: f64,
    pub thermal_tau_s: f64,
}

impl TankSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_kg <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.capacity_kg",
                value: self.capacity_kg,
            });
        }
        if self.volume_m3 <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.volume_m3",
                value: self.volume_m3,
            });
        }
        if self.propellant_density_kg_m3 <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.propellant_density_kg_m3",
                value: self.propellant_density_kg_m3,
            });
        }
        if self.structural_limit_pa <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.structural_limit_pa",
                value: self.structural_limit_pa,
            });
        }
        if self.rupture_threshold_pa <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.rupture_threshold_pa",
                value: self.rupture_threshold_pa,
            });
        }
        if self.thermal_tau_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "tank.thermal_tau_s",
                value: self.thermal_tau_s,
            });
        }
        Ok(())
    }
}

/// Aggregate fuel-subsystem configuration: the ordered set of tanks plus the
/// ambient temperature the tanks relax toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelConfig {
    pub tanks: Vec<TankSpec>,
    pub compartment_temperature_k: f64,
}

impl FuelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for tank in &self.tanks {
            tank.validate()?;
        }
        if let Some(id) = self.tanks.iter().map(|t| &t.id).duplicates().next() {
            return Err(ConfigError::DuplicateTankId(id.clone()));
        }
        if self.compartment_temperature_k <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "fuel.compartment_temperature_k",
                value: self.compartment_temperature_k,
            });
        }
        Ok(())
    }
}

/// Mutable per-tick tank state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tank {
    pub spec: TankSpec,
    pub fuel_mass_kg: f64,
    pub ullage_pressure_pa: f64,
    pub temperature_k: f64,
    pub pressurant_mass_kg: f64,
    pub ruptured: bool,
}

impl Tank {
    fn from_spec(spec: TankSpec, fuel_mass_kg: f64, temperature_k: f64, pressurant_mass_kg: f64) -> Self {
        Tank {
            spec,
            fuel_mass_kg,
            ullage_pressure_pa: 0.0,
            temperature_k,
            pressurant_mass_kg,
            ruptured: false,
        }
    }

    fn fuel_volume_m3(&self) -> f64 {
        self.fuel_mass_kg / self.spec.propellant_density_kg_m3
    }

    fn ullage_volume_m3(&self) -> f64 {
        (self.spec.volume_m3 - self.fuel_volume_m3()).max(0.0)
    }

    /// Ideal-gas ullage pressure. Returns `Err(TankRuptured)` once pressure
    /// reaches the rupture threshold (spec §4.2).
    fn pressure(&self) -> Result<f64, FuelError> {
        let v_ullage = self.ullage_volume_m3();
        let moles = self.pressurant_mass_kg / self.spec.pressurant_molar_mass_kg_mol;

        let pressure_pa = if v_ullage < MIN_ULLAGE_VOLUME_M3 {
            self.spec.structural_limit_pa
        } else {
            moles * GAS_CONSTANT * self.temperature_k / v_ullage
        };

        if pressure_pa >= self.spec.rupture_threshold_pa {
            Err(FuelError::TankRuptured {
                tank_id: self.spec.id.clone(),
                pressure_pa,
                limit_pa: self.spec.rupture_threshold_pa,
            })
        } else {
            Ok(pressure_pa)
        }
    }
}

/// Outputs of one fuel-subsystem tick (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct FuelOutputs {
    pub center_of_mass_m: Vector3<f64>,
    pub total_propellant_mass_kg: f64,
    pub events: Vec<EventKind>,
}

/// Initial per-tank state used to build a [`FuelSystem`].
#[derive(Debug, Clone)]
pub struct TankInitialState {
    pub fuel_mass_kg: f64,
    pub pressurant_mass_kg: f64,
    pub temperature_k: f64,
}

/// Ordered collection of propellant tanks with draw routing (spec §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelSystem {
    config: FuelConfig,
    tanks: Vec<Tank>,
    newly_empty: Vec<String>,
}

impl FuelSystem {
    pub fn new(
        config: FuelConfig,
        initial_states: impl Fn(&str) -> TankInitialState,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let tanks = config
            .tanks
            .iter()
            .map(|spec| {
                let init = initial_states(&spec.id);
                Tank::from_spec(
                    spec.clone(),
                    init.fuel_mass_kg.clamp(0.0, spec.capacity_kg),
                    init.temperature_k,
                    init.pressurant_mass_kg,
                )
            })
            .collect();

        Ok(FuelSystem {
            config,
            tanks,
            newly_empty: Vec::new(),
        })
    }

    fn tank_mut(&mut self, id: &str) -> Result<&mut Tank, FuelError> {
        self.tanks
            .iter_mut()
            .find(|t| t.spec.id == id)
            .ok_or_else(|| FuelError::TankNotFound(id.to_string()))
    }

    pub fn tank(&self, id: &str) -> Result<&Tank, FuelError> {
        self.tanks
            .iter()
            .find(|t| t.spec.id == id)
            .ok_or_else(|| FuelError::TankNotFound(id.to_string()))
    }

    pub fn tanks_with_role(&self, role: TankRole) -> impl Iterator<Item = &Tank> {
        self.tanks.iter().filter(move |t| t.spec.role == role)
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.iter()
    }

    /// Draws up to `kg_requested` from the named tank, returning the amount
    /// actually delivered (spec §4.2: `delivered = min(requested, fuel_mass)`).
    pub fn draw(&mut self, tank_id: &str, kg_requested: f64) -> Result<f64, FuelError> {
        let tank = self.tank_mut(tank_id)?;
        if tank.ruptured {
            return Ok(0.0);
        }

        let delivered = kg_requested.max(0.0).min(tank.fuel_mass_kg);
        tank.fuel_mass_kg -= delivered;

        if tank.fuel_mass_kg <= 0.0 && delivered > 0.0 {
            self.newly_empty.push(tank.spec.id.clone());
        }

        Ok(delivered)
    }

    /// Draws from the first non-empty, non-ruptured tank with the given
    /// role, in insertion order (spec §3: "insertion order stable").
    pub fn draw_by_role(&mut self, role: TankRole, kg_requested: f64) -> f64 {
        let mut remaining = kg_requested;
        let mut delivered_total = 0.0;

        let ids: Vec<String> = self
            .tanks
            .iter()
            .filter(|t| t.spec.role == role)
            .map(|t| t.spec.id.clone())
            .collect();

        for id in ids {
            if remaining <= 0.0 {
                break;
            }
            if let Ok(delivered) = self.draw(&id, remaining) {
                delivered_total += delivered;
                remaining -= delivered;
            }
        }

        delivered_total
    }

    /// Center of mass of all tanks' propellant, weighted by current fuel
    /// mass (spec §4.2). Tanks with zero fuel contribute nothing.
    fn center_of_mass(&self) -> Vector3<f64> {
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for tank in &self.tanks {
            let (x, y, z) = tank.spec.position_m;
            weighted += Vector3::new(x, y, z) * tank.fuel_mass_kg;
            total += tank.fuel_mass_kg;
        }
        if total > 0.0 {
            weighted / total
        } else {
            Vector3::zeros()
        }
    }

    pub fn total_propellant_mass_kg(&self) -> f64 {
        self.tanks.iter().map(|t| t.fuel_mass_kg).sum()
    }

    /// Per-tick update: thermal relaxation, pressure/rupture check,
    /// center-of-mass, and tank-empty events (spec §4.2, orchestrator §4.12
    /// step 6).
    pub fn update(&mut self, dt: f64) -> FuelOutputs {
        let mut events: Vec<EventKind> = self
            .newly_empty
            .drain(..)
            .map(|tank_id| EventKind::TankEmpty { tank_id })
            .collect();

        for tank in &mut self.tanks {
            if tank.ruptured {
                continue;
            }

            let t_env = self.config.compartment_temperature_k;
            let tau = tank.spec.thermal_tau_s;
            tank.temperature_k += (t_env - tank.temperature_k) * (1.0 - (-dt / tau).exp());

            match tank.pressure() {
                Ok(p) => {
                    tank.ullage_pressure_pa = p;
                    if tank.ullage_volume_m3() < MIN_ULLAGE_VOLUME_M3 {
                        events.push(EventKind::OverpressureWarning {
                            tank_id: tank.spec.id.clone(),
                        });
                    }
                }
                Err(FuelError::TankRuptured {
                    tank_id,
                    pressure_pa,
                    ..
                }) => {
                    tank.ruptured = true;
                    tank.ullage_pressure_pa = pressure_pa;
                    events.push(EventKind::TankRuptured { tank_id });
                }
                Err(_) => {}
            }
        }

        FuelOutputs {
            center_of_mass_m: self.center_of_mass(),
            total_propellant_mass_kg: self.total_propellant_mass_kg(),
            events,
        }
    }
}
