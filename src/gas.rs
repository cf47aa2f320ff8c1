//! Compressed-gas subsystem (spec §4.3): pressurant bottles with ideal-gas
//! withdrawal, adiabatic cooling, and a regulator that degrades once source
//! pressure falls too close to setpoint.

use crate::errors::{ConfigError, GasError};
use serde::{Deserialize, Serialize};

/// Universal gas constant, J/(mol·K).
const GAS_CONSTANT: f64 = 8.314462618;

/// Source-to-setpoint pressure ratio below which the regulator begins to
/// degrade (spec §4.3).
const REGULATOR_DEGRADE_RATIO: f64 = 1.1;

/// Immutable per-bottle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleSpec {
    pub id: String,
    pub volume_m3: f64,
    pub molar_mass_kg_mol: f64,
    /// Ratio of specific heats of the stored gas, used for adiabatic cooling.
    pub heat_capacity_ratio: f64,
    pub regulator_setpoint_pa: f64,
}

impl BottleSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.volume_m3 <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "bottle.volume_m3",
                value: self.volume_m3,
            });
        }
        if self.molar_mass_kg_mol <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "bottle.molar_mass_kg_mol",
                value: self.molar_mass_kg_mol,
            });
        }
        if self.heat_capacity_ratio <= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "bottle.heat_capacity_ratio",
                value: self.heat_capacity_ratio,
                min: 1.0,
                max: 2.0,
            });
        }
        if self.regulator_setpoint_pa <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "bottle.regulator_setpoint_pa",
                value: self.regulator_setpoint_pa,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasConfig {
    pub bottles: Vec<BottleSpec>,
}

impl GasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bottle in &self.bottles {
            bottle.validate()?;
        }
        Ok(())
    }
}

/// Mutable per-tick bottle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottle {
    pub spec: BottleSpec,
    pub moles: f64,
    pub temperature_k: f64,
    pub pressure_pa: f64,
    /// Downstream pressure the regulator is currently delivering.
    pub regulated_pressure_pa: f64,
}

impl Bottle {
    fn from_spec(spec: BottleSpec, moles: f64, temperature_k: f64) -> Self {
        let mut bottle = Bottle {
            spec,
            moles,
            temperature_k,
            pressure_pa: 0.0,
            regulated_pressure_pa: 0.0,
        };
        bottle.recompute();
        bottle
    }

    fn recompute(&mut self) {
        self.pressure_pa =
            self.moles * GAS_CONSTANT * self.temperature_k / self.spec.volume_m3;
        self.regulated_pressure_pa = self.regulated_output_pa();
    }

    /// Regulator contract (spec §4.3): holds setpoint until source pressure
    /// drops below `1.1 * setpoint`, then degrades linearly to zero as
    /// source pressure falls to zero.
    fn regulated_output_pa(&self) -> f64 {
        let threshold = REGULATOR_DEGRADE_RATIO * self.spec.regulator_setpoint_pa;
        if self.pressure_pa >= threshold {
            self.spec.regulator_setpoint_pa
        } else {
            self.spec.regulator_setpoint_pa * (self.pressure_pa / threshold).max(0.0)
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitialBottleState {
    pub moles: f64,
    pub temperature_k: f64,
}

/// Outputs of one compressed-gas tick; currently limited to the heat the
/// bottles reject into the thermal network via adiabatic cooling (negative
/// when a withdrawal cooled the bottle below ambient).
#[derive(Debug, Clone, Default)]
pub struct GasOutputs {
    pub heat_delta_j: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasSystem {
    config: GasConfig,
    bottles: Vec<Bottle>,
}

impl GasSystem {
    pub fn new(
        config: GasConfig,
        initial_states: impl Fn(&str) -> InitialBottleState,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let bottles = config
            .bottles
            .iter()
            .map(|spec| {
                let init = initial_states(&spec.id);
                Bottle::from_spec(spec.clone(), init.moles.max(0.0), init.temperature_k)
            })
            .collect();

        Ok(GasSystem { config, bottles })
    }

    pub fn bottle(&self, id: &str) -> Result<&Bottle, GasError> {
        self.bottles
            .iter()
            .find(|b| b.spec.id == id)
            .ok_or_else(|| GasError::BottleNotFound(id.to_string()))
    }

    pub fn bottles(&self) -> impl Iterator<Item = &Bottle> {
        self.bottles.iter()
    }

    fn bottle_mut(&mut self, id: &str) -> Result<&mut Bottle, GasError> {
        self.bottles
            .iter_mut()
            .find(|b| b.spec.id == id)
            .ok_or_else(|| GasError::BottleNotFound(id.to_string()))
    }

    /// Withdraws up to `moles_requested` from the named bottle, applying
    /// adiabatic cooling `ΔT = -(γ-1)·T·(Δn/n)` to the remainder (spec §4.3).
    /// Returns moles actually delivered.
    pub fn withdraw(&mut self, bottle_id: &str, moles_requested: f64) -> Result<f64, GasError> {
        let bottle = self.bottle_mut(bottle_id)?;
        let n_before = bottle.moles;
        if n_before <= 0.0 || moles_requested <= 0.0 {
            return Ok(0.0);
        }

        let delivered = moles_requested.min(n_before);
        let fraction_withdrawn = delivered / n_before;

        bottle.temperature_k -=
            (bottle.spec.heat_capacity_ratio - 1.0) * bottle.temperature_k * fraction_withdrawn;
        bottle.moles = n_before - delivered;
        bottle.recompute();

        Ok(delivered)
    }

    /// Per-tick relaxation: no ambient exchange modeled beyond withdrawal
    /// cooling, so this only keeps derived pressure/regulator fields fresh.
    pub fn update(&mut self, _dt: f64) -> GasOutputs {
        for bottle in &mut self.bottles {
            bottle.recompute();
        }
        GasOutputs::default()
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        GasConfig { bottles: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_bottle() -> BottleSpec {
        BottleSpec {
            id: "he-1".to_string(),
            volume_m3: 0.05,
            molar_mass_kg_mol: 0.004,
            heat_capacity_ratio: 1.66,
            regulator_setpoint_pa: 2.0e6,
        }
    }

    fn system() -> GasSystem {
        let config = GasConfig {
            bottles: vec![stock_bottle()],
        };
        GasSystem::new(config, |_| InitialBottleState {
            moles: 400.0,
            temperature_k: 290.0,
        })
        .unwrap()
    }

    #[test]
    fn withdraw_cools_bottle() {
        let mut sys = system();
        let t0 = sys.bottle("he-1").unwrap().temperature_k;
        sys.withdraw("he-1", 100.0).unwrap();
        let t1 = sys.bottle("he-1").unwrap().temperature_k;
        assert!(t1 < t0, "withdrawal should cool the bottle adiabatically");
    }

    #[test]
    fn withdraw_clamps_to_available_moles() {
        let mut sys = system();
        let delivered = sys.withdraw("he-1", 1_000_000.0).unwrap();
        assert!((delivered - 400.0).abs() < 1e-9);
        assert_eq!(sys.bottle("he-1").unwrap().moles, 0.0);
    }

    #[test]
    fn unknown_bottle_errors() {
        let mut sys = system();
        assert_eq!(
            sys.withdraw("missing", 1.0),
            Err(GasError::BottleNotFound("missing".to_string()))
        );
    }

    #[test]
    fn regulator_holds_setpoint_while_pressure_high() {
        let sys = system();
        let bottle = sys.bottle("he-1").unwrap();
        assert!(bottle.pressure_pa > REGULATOR_DEGRADE_RATIO * bottle.spec.regulator_setpoint_pa);
        assert_eq!(bottle.regulated_pressure_pa, bottle.spec.regulator_setpoint_pa);
    }

    #[test]
    fn regulator_degrades_as_source_depletes() {
        let mut sys = system();
        sys.withdraw("he-1", 395.0).unwrap();
        let bottle = sys.bottle("he-1").unwrap();
        assert!(bottle.regulated_pressure_pa < bottle.spec.regulator_setpoint_pa);
        assert!(bottle.regulated_pressure_pa >= 0.0);
    }
}
