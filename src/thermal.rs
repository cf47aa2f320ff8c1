//! Thermal subsystem (spec §4.5): per-component heat balance coupled through
//! a static conductance table, with hysteresis on the overtemp event.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Overtemp clears once temperature falls this fraction below the warning
/// threshold (spec §4.5 hysteresis).
const OVERTEMP_HYSTERESIS_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalComponentSpec {
    pub id: String,
    pub mass_kg: f64,
    pub specific_heat_j_kg_k: f64,
    pub warning_threshold_k: f64,
    /// Electronics/idle heat generation reported every tick regardless of
    /// subsystem activity (spec §4.5 "electronics baseline").
    pub baseline_heat_w: f64,
}

impl ThermalComponentSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.mass_kg <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "thermal.mass_kg",
                value: self.mass_kg,
            });
        }
        if self.specific_heat_j_kg_k <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "thermal.specific_heat_j_kg_k",
                value: self.specific_heat_j_kg_k,
            });
        }
        if self.baseline_heat_w < 0.0 {
            return Err(ConfigError::MustBeNonNegative {
                field: "thermal.baseline_heat_w",
                value: self.baseline_heat_w,
            });
        }
        Ok(())
    }
}

/// Symmetric, zero-diagonal conductance table (spec §4.5), keyed by
/// unordered component-id pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConductanceTable {
    entries: Vec<(String, String, f64)>,
}

impl ConductanceTable {
    pub fn new(entries: Vec<(String, String, f64)>) -> Self {
        ConductanceTable { entries }
    }

    fn conductance(&self, a: &str, b: &str) -> f64 {
        self.entries
            .iter()
            .find(|(x, y, _)| (x == a && y == b) || (x == b && y == a))
            .map(|(_, _, g)| *g)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    pub components: Vec<ThermalComponentSpec>,
    pub conductance: ConductanceTable,
}

impl ThermalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for component in &self.components {
            component.validate()?;
        }
        for (a, b, g) in &self.conductance.entries {
            if a == b {
                return Err(ConfigError::AsymmetricConductance {
                    a: a.clone(),
                    b: b.clone(),
                });
            }
            if *g < 0.0 {
                return Err(ConfigError::MustBeNonNegative {
                    field: "thermal.conductance",
                    value: *g,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalComponent {
    pub spec: ThermalComponentSpec,
    pub temperature_k: f64,
    pub overtemp: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ThermalOutputs {
    pub events: Vec<crate::events::EventKind>,
}

/// Per-tick heat input reported by the owning subsystem (engine, reactor,
/// pumps, electronics baseline — spec §4.5), keyed by component id.
pub type HeatInputs = HashMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSystem {
    components: Vec<ThermalComponent>,
    conductance: ConductanceTable,
}

impl ThermalSystem {
    pub fn new(
        config: ThermalConfig,
        initial_temperatures: impl Fn(&str) -> f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let components = config
            .components
            .iter()
            .map(|spec| ThermalComponent {
                temperature_k: initial_temperatures(&spec.id),
                overtemp: false,
                spec: spec.clone(),
            })
            .collect();

        Ok(ThermalSystem {
            components,
            conductance: config.conductance,
        })
    }

    pub fn component(&self, id: &str) -> Option<&ThermalComponent> {
        self.components.iter().find(|c| c.spec.id == id)
    }

    pub fn components(&self) -> impl Iterator<Item = &ThermalComponent> {
        self.components.iter()
    }

    /// One thermal tick: `ΔT = (Q_in - Q_out) * dt / (mass * c_p)` with
    /// `Q_out` from the conductance table plus whatever `coolant_absorption`
    /// reports for that component this tick (spec §4.5).
    pub fn update(
        &mut self,
        heat_inputs: &HeatInputs,
        coolant_absorption: &HeatInputs,
        dt: f64,
    ) -> ThermalOutputs {
        // Coupling uses last tick's temperatures for every pair, not a
        // partially-updated mix.
        let snapshot_temps: Vec<f64> = self.components.iter().map(|c| c.temperature_k).collect();
        let mut events = Vec::new();

        for (i, component) in self.components.iter_mut().enumerate() {
            let q_in = heat_inputs.get(&component.spec.id).copied().unwrap_or(0.0)
                + component.spec.baseline_heat_w;

            let q_coupling: f64 = self
                .components
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, other)| {
                    let g = self.conductance.conductance(&component.spec.id, &other.spec.id);
                    g * (snapshot_temps[i] - snapshot_temps[j])
                })
                .sum();

            let q_coolant = coolant_absorption
                .get(&component.spec.id)
                .copied()
                .unwrap_or(0.0);

            let q_out = q_coupling + q_coolant;
            let delta_t = (q_in - q_out) * dt / (component.spec.mass_kg * component.spec.specific_heat_j_kg_k);
            component.temperature_k += delta_t;

            let clear_threshold =
                component.spec.warning_threshold_k * (1.0 - OVERTEMP_HYSTERESIS_FRACTION);
            if !component.overtemp && component.temperature_k >= component.spec.warning_threshold_k {
                component.overtemp = true;
                events.push(crate::events::EventKind::Overtemp {
                    component_id: component.spec.id.clone(),
                });
            } else if component.overtemp && component.temperature_k < clear_threshold {
                component.overtemp = false;
            }
        }

        ThermalOutputs { events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_component_system() -> ThermalSystem {
        let config = ThermalConfig {
            components: vec![
                ThermalComponentSpec {
                    id: "engine".to_string(),
                    mass_kg: 50.0,
                    specific_heat_j_kg_k: 500.0,
                    warning_threshold_k: 800.0,
                    baseline_heat_w: 0.0,
                },
                ThermalComponentSpec {
                    id: "avionics".to_string(),
                    mass_kg: 10.0,
                    specific_heat_j_kg_k: 900.0,
                    warning_threshold_k: 350.0,
                    baseline_heat_w: 0.0,
                },
            ],
            conductance: ConductanceTable::new(vec![("engine".to_string(), "avionics".to_string(), 2.0)]),
        };
        ThermalSystem::new(config, |_| 290.0).unwrap()
    }

    #[test]
    fn heat_flows_from_hot_to_cold_neighbor() {
        let mut sys = two_component_system();
        let mut heat_inputs = HeatInputs::new();
        heat_inputs.insert("engine".to_string(), 10_000.0);

        for _ in 0..50 {
            sys.update(&heat_inputs, &HeatInputs::new(), 0.1);
        }

        let engine = sys.component("engine").unwrap().temperature_k;
        let avionics = sys.component("avionics").unwrap().temperature_k;
        assert!(engine > avionics);
        assert!(avionics > 290.0, "coupling should warm the cooler neighbor");
    }

    #[test]
    fn overtemp_event_fires_once_with_hysteresis() {
        let mut sys = two_component_system();
        let mut heat_inputs = HeatInputs::new();
        heat_inputs.insert("avionics".to_string(), 50_000.0);

        let mut total_events = 0;
        for _ in 0..200 {
            let outputs = sys.update(&heat_inputs, &HeatInputs::new(), 0.1);
            total_events += outputs
                .events
                .iter()
                .filter(|e| matches!(e, crate::events::EventKind::Overtemp { .. }))
                .count();
        }
        assert_eq!(total_events, 1);
        assert!(sys.component("avionics").unwrap().overtemp);
    }

    #[test]
    fn conductance_lookup_is_symmetric() {
        let table = ConductanceTable::new(vec![("a".to_string(), "b".to_string(), 3.0)]);
        assert_eq!(table.conductance("a", "b"), 3.0);
        assert_eq!(table.conductance("b", "a"), 3.0);
        assert_eq!(table.conductance("a", "c"), 0.0);
    }
}
