//! Coolant subsystem (spec §4.6): loops absorb heat from assigned thermal
//! components, reject it via Stefan-Boltzmann radiators, and can be
//! cross-connected to equalize temperature.

use crate::errors::{ConfigError, CoolantError};
use crate::events::EventKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stefan-Boltzmann constant, W/(m²·K⁴).
const STEFAN_BOLTZMANN: f64 = 5.670374419e-8;
/// Deep-space radiative sink temperature, K.
const T_SPACE_K: f64 = 2.7;
/// Loop freezes below this temperature (spec §3, §4.6).
const FREEZE_TEMP_K: f64 = 253.0;
/// Loop boils above this temperature (spec §3, §4.6).
const BOIL_TEMP_K: f64 = 393.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSpec {
    pub id: String,
    pub coolant_mass_kg: f64,
    pub specific_heat_j_kg_k: f64,
    pub radiator_area_m2: f64,
    pub radiator_emissivity: f64,
    pub pump_power_w: f64,
    pub pump_spin_down_s: f64,
    /// Heat-transfer coefficient, W/K per unit ΔT between coolant and each
    /// assigned component, scaled by current flow fraction.
    pub heat_transfer_coefficient_w_k: f64,
    pub assigned_components: Vec<String>,
}

impl LoopSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.coolant_mass_kg <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "coolant.coolant_mass_kg",
                value: self.coolant_mass_kg,
            });
        }
        if self.radiator_area_m2 < 0.0 {
            return Err(ConfigError::MustBeNonNegative {
                field: "coolant.radiator_area_m2",
                value: self.radiator_area_m2,
            });
        }
        if !(0.0..=1.0).contains(&self.radiator_emissivity) {
            return Err(ConfigError::OutOfRange {
                field: "coolant.radiator_emissivity",
                value: self.radiator_emissivity,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.pump_spin_down_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "coolant.pump_spin_down_s",
                value: self.pump_spin_down_s,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolantConfig {
    pub loop_1: LoopSpec,
    pub loop_2: LoopSpec,
}

impl CoolantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loop_1.validate()?;
        self.loop_2.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantLoop {
    pub spec: LoopSpec,
    pub temperature_k: f64,
    pub pump_active: bool,
    pub flow_rate_l_min: f64,
    pub disabled: bool,
    full_flow_l_min: f64,
}

impl CoolantLoop {
    fn from_spec(spec: LoopSpec, temperature_k: f64) -> Self {
        let full_flow = spec.heat_transfer_coefficient_w_k;
        CoolantLoop {
            spec,
            temperature_k,
            pump_active: true,
            flow_rate_l_min: full_flow,
            disabled: false,
            full_flow_l_min: full_flow,
        }
    }

    fn flow_fraction(&self) -> f64 {
        if self.full_flow_l_min <= 0.0 {
            0.0
        } else {
            (self.flow_rate_l_min / self.full_flow_l_min).clamp(0.0, 1.0)
        }
    }

    fn tick_pump(&mut self, dt: f64) {
        if self.pump_active {
            self.flow_rate_l_min = self.full_flow_l_min;
        } else {
            let decay = self.full_flow_l_min * dt / self.spec.pump_spin_down_s;
            self.flow_rate_l_min = (self.flow_rate_l_min - decay).max(0.0);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoolantOutputs {
    /// Heat absorbed from each assigned thermal component this tick (W),
    /// consumed by the thermal subsystem as `Q_out` coupling input.
    pub absorbed_w: HashMap<String, f64>,
    pub pump_electrical_load_w: HashMap<String, f64>,
    pub events: Vec<EventKind>,
}

/// Coolant subsystem: two loops, optionally cross-connected (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantSystem {
    pub loop_1: CoolantLoop,
    pub loop_2: CoolantLoop,
    pub cross_connect_open: bool,
}

impl CoolantSystem {
    pub fn new(
        config: CoolantConfig,
        temperature_1_k: f64,
        temperature_2_k: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(CoolantSystem {
            loop_1: CoolantLoop::from_spec(config.loop_1, temperature_1_k),
            loop_2: CoolantLoop::from_spec(config.loop_2, temperature_2_k),
            cross_connect_open: false,
        })
    }

    pub fn set_pump(&mut self, loop_id: &str, on: bool) -> Result<(), CoolantError> {
        if loop_id == self.loop_1.spec.id {
            self.loop_1.pump_active = on;
        } else if loop_id == self.loop_2.spec.id {
            self.loop_2.pump_active = on;
        } else {
            return Err(CoolantError::LoopNotFound(loop_id.to_string()));
        }
        Ok(())
    }

    fn tick_loop(
        l: &mut CoolantLoop,
        component_temps: &HashMap<String, f64>,
        dt: f64,
        events: &mut Vec<EventKind>,
    ) -> (f64, f64) {
        l.tick_pump(dt);

        if l.disabled {
            return (0.0, 0.0);
        }

        let fraction = l.flow_fraction();
        let absorbed_w: f64 = l
            .spec
            .assigned_components
            .iter()
            .filter_map(|id| component_temps.get(id))
            .map(|&component_t| {
                (l.spec.heat_transfer_coefficient_w_k * fraction * (component_t - l.temperature_k)).max(0.0)
            })
            .sum();

        let radiated_w = l.spec.radiator_emissivity
            * STEFAN_BOLTZMANN
            * l.spec.radiator_area_m2
            * (l.temperature_k.powi(4) - T_SPACE_K.powi(4));

        let delta_t =
            (absorbed_w - radiated_w) * dt / (l.spec.coolant_mass_kg * l.spec.specific_heat_j_kg_k);
        l.temperature_k += delta_t;

        if !l.disabled && l.temperature_k <= FREEZE_TEMP_K {
            l.disabled = true;
            events.push(EventKind::CoolantFreeze {
                loop_id: l.spec.id.clone(),
            });
        } else if !l.disabled && l.temperature_k >= BOIL_TEMP_K {
            l.disabled = true;
            events.push(EventKind::CoolantBoil {
                loop_id: l.spec.id.clone(),
            });
        }

        let pump_w = if l.pump_active { l.spec.pump_power_w } else { 0.0 };
        (absorbed_w, pump_w)
    }

    pub fn update(&mut self, component_temps: &HashMap<String, f64>, dt: f64) -> CoolantOutputs {
        let mut events = Vec::new();

        let (absorbed_1, pump_1) = Self::tick_loop(&mut self.loop_1, component_temps, dt, &mut events);
        let (absorbed_2, pump_2) = Self::tick_loop(&mut self.loop_2, component_temps, dt, &mut events);

        if self.cross_connect_open && !self.loop_1.disabled && !self.loop_2.disabled {
            let mixed = (self.loop_1.temperature_k * self.loop_1.spec.coolant_mass_kg
                + self.loop_2.temperature_k * self.loop_2.spec.coolant_mass_kg)
                / (self.loop_1.spec.coolant_mass_kg + self.loop_2.spec.coolant_mass_kg);
            self.loop_1.temperature_k = mixed;
            self.loop_2.temperature_k = mixed;
        }

        let mut absorbed_w = HashMap::new();
        for id in &self.loop_1.spec.assigned_components {
            *absorbed_w.entry(id.clone()).or_insert(0.0) +=
                absorbed_1 / (self.loop_1.spec.assigned_components.len().max(1) as f64);
        }
        for id in &self.loop_2.spec.assigned_components {
            *absorbed_w.entry(id.clone()).or_insert(0.0) +=
                absorbed_2 / (self.loop_2.spec.assigned_components.len().max(1) as f64);
        }

        let mut pump_electrical_load_w = HashMap::new();
        pump_electrical_load_w.insert(self.loop_1.spec.id.clone(), pump_1);
        pump_electrical_load_w.insert(self.loop_2.spec.id.clone(), pump_2);

        CoolantOutputs {
            absorbed_w,
            pump_electrical_load_w,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_config() -> CoolantConfig {
        CoolantConfig {
            loop_1: LoopSpec {
                id: "loop-1".to_string(),
                coolant_mass_kg: 20.0,
                specific_heat_j_kg_k: 3500.0,
                radiator_area_m2: 2.0,
                radiator_emissivity: 0.85,
                pump_power_w: 40.0,
                pump_spin_down_s: 10.0,
                heat_transfer_coefficient_w_k: 15.0,
                assigned_components: vec!["engine".to_string()],
            },
            loop_2: LoopSpec {
                id: "loop-2".to_string(),
                coolant_mass_kg: 20.0,
                specific_heat_j_kg_k: 3500.0,
                radiator_area_m2: 2.0,
                radiator_emissivity: 0.85,
                pump_power_w: 40.0,
                pump_spin_down_s: 10.0,
                heat_transfer_coefficient_w_k: 15.0,
                assigned_components: vec![],
            },
        }
    }

    #[test]
    fn radiator_rejects_heat_toward_space_temperature() {
        let mut sys = CoolantSystem::new(stock_config(), 320.0, 290.0).unwrap();
        let components = HashMap::new();
        for _ in 0..500 {
            sys.update(&components, 0.1);
        }
        assert!(sys.loop_1.temperature_k < 320.0);
    }

    #[test]
    fn freeze_event_disables_loop() {
        let mut sys = CoolantSystem::new(stock_config(), 254.0, 290.0).unwrap();
        let components = HashMap::new();
        let mut saw_freeze = false;
        for _ in 0..200 {
            let outputs = sys.update(&components, 0.1);
            if outputs
                .events
                .iter()
                .any(|e| matches!(e, EventKind::CoolantFreeze { .. }))
            {
                saw_freeze = true;
            }
        }
        assert!(saw_freeze);
        assert!(sys.loop_1.disabled);
    }

    #[test]
    fn pump_off_decays_flow_over_spin_down_time() {
        let mut sys = CoolantSystem::new(stock_config(), 290.0, 290.0).unwrap();
        sys.set_pump("loop-1", false).unwrap();
        let components = HashMap::new();
        sys.update(&components, 1.0);
        assert!(sys.loop_1.flow_rate_l_min < sys.loop_1.full_flow_l_min);
    }

    #[test]
    fn cross_connect_equalizes_temperatures() {
        let mut sys = CoolantSystem::new(stock_config(), 310.0, 290.0).unwrap();
        sys.cross_connect_open = true;
        let components = HashMap::new();
        sys.update(&components, 0.1);
        assert!((sys.loop_1.temperature_k - sys.loop_2.temperature_k).abs() < 1e-6);
    }

    #[test]
    fn unknown_loop_id_errors() {
        let mut sys = CoolantSystem::new(stock_config(), 290.0, 290.0).unwrap();
        assert!(sys.set_pump("missing", true).is_err());
    }
}
