//! RCS — reaction control system (spec §4.8): a 12-thruster cluster
//! commanded through named groups, producing body-frame force/torque and
//! drawing propellant from the RCS fuel tank.

use crate::errors::{ConfigError, RcsError};
use crate::events::EventKind;
use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrusterSpec {
    pub id: String,
    pub position_m: (f64, f64, f64),
    pub thrust_direction: (f64, f64, f64),
    pub max_thrust_n: f64,
    /// Effective exhaust velocity, used to derive mass flow from thrust.
    pub exhaust_velocity_m_s: f64,
}

impl ThrusterSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_thrust_n <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "rcs.max_thrust_n",
                value: self.max_thrust_n,
            });
        }
        if self.exhaust_velocity_m_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "rcs.exhaust_velocity_m_s",
                value: self.exhaust_velocity_m_s,
            });
        }
        Ok(())
    }

    fn position(&self) -> Vector3<f64> {
        Vector3::new(self.position_m.0, self.position_m.1, self.position_m.2)
    }

    fn direction(&self) -> Vector3<f64> {
        crate::math::safe_normalize(Vector3::new(
            self.thrust_direction.0,
            self.thrust_direction.1,
            self.thrust_direction.2,
        ))
    }
}

/// Named thruster group (spec §4.8): the canonical eight groups plus their
/// member thrusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub thruster_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcsConfig {
    pub thrusters: Vec<ThrusterSpec>,
    pub groups: Vec<GroupSpec>,
    pub fuel_tank_id: String,
}

impl RcsConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for thruster in &self.thrusters {
            thruster.validate()?;
        }
        if let Some(id) = self.thrusters.iter().map(|t| &t.id).duplicates().next() {
            return Err(ConfigError::DuplicateConsumerId(id.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RcsOutputs {
    pub force_body_n: Vector3<f64>,
    pub torque_body_nm: Vector3<f64>,
    pub propellant_requested_kg: f64,
    pub events: Vec<EventKind>,
}

/// RCS cluster: active groups produce full-thrust activation on their member
/// thrusters for the tick (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcsCluster {
    thrusters: Vec<ThrusterSpec>,
    groups: HashMap<String, Vec<String>>,
    fuel_tank_id: String,
    active_groups: HashSet<String>,
    empty_notified: HashSet<String>,
}

impl RcsCluster {
    pub fn new(config: RcsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let groups = config
            .groups
            .into_iter()
            .map(|g| (g.name, g.thruster_ids))
            .collect();
        Ok(RcsCluster {
            thrusters: config.thrusters,
            groups,
            fuel_tank_id: config.fuel_tank_id,
            active_groups: HashSet::new(),
            empty_notified: HashSet::new(),
        })
    }

    pub fn fuel_tank_id(&self) -> &str {
        &self.fuel_tank_id
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn active_groups(&self) -> impl Iterator<Item = &str> {
        self.active_groups.iter().map(String::as_str)
    }

    /// `activate_rcs_group` command.
    pub fn activate_group(&mut self, name: &str) -> Result<(), RcsError> {
        if !self.groups.contains_key(name) {
            return Err(RcsError::UnknownGroup(name.to_string()));
        }
        self.active_groups.insert(name.to_string());
        Ok(())
    }

    /// `deactivate_rcs_group` command.
    pub fn deactivate_group(&mut self, name: &str) -> Result<(), RcsError> {
        if !self.groups.contains_key(name) {
            return Err(RcsError::UnknownGroup(name.to_string()));
        }
        self.active_groups.remove(name);
        self.empty_notified.remove(name);
        Ok(())
    }

    fn active_thruster_ids(&self) -> HashSet<&str> {
        self.active_groups
            .iter()
            .filter_map(|name| self.groups.get(name))
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    /// Produces this tick's force/torque and propellant request; `center_of_mass`
    /// is the dry CoM adjusted by the fuel subsystem's reported offset (spec
    /// §4.8), and `tank_has_fuel` reflects whether the RCS tank still holds
    /// propellant as of the start of this tick.
    pub fn tick(&mut self, center_of_mass_m: Vector3<f64>, tank_has_fuel: bool, dt: f64) -> RcsOutputs {
        let mut events = Vec::new();
        let mut force = Vector3::zeros();
        let mut torque = Vector3::zeros();
        let mut mass_flow_kg_s = 0.0;

        if !tank_has_fuel {
            for name in self.active_groups.clone() {
                if self.empty_notified.insert(name.clone()) {
                    events.push(EventKind::RcsTankEmpty { group: name });
                }
            }
            return RcsOutputs {
                force_body_n: Vector3::zeros(),
                torque_body_nm: Vector3::zeros(),
                propellant_requested_kg: 0.0,
                events,
            };
        }

        let active_ids = self.active_thruster_ids();
        for thruster in &self.thrusters {
            if !active_ids.contains(thruster.id.as_str()) {
                continue;
            }
            let f = thruster.direction() * thruster.max_thrust_n;
            force += f;
            let r = thruster.position() - center_of_mass_m;
            torque += r.cross(&f);
            mass_flow_kg_s += thruster.max_thrust_n / thruster.exhaust_velocity_m_s;
        }

        RcsOutputs {
            force_body_n: force,
            torque_body_nm: torque,
            propellant_requested_kg: mass_flow_kg_s * dt,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_cluster() -> RcsCluster {
        let thrusters = vec![
            ThrusterSpec {
                id: "t-yaw-left".to_string(),
                position_m: (1.0, 0.0, 0.0),
                thrust_direction: (0.0, 1.0, 0.0),
                max_thrust_n: 100.0,
                exhaust_velocity_m_s: 2200.0,
            },
            ThrusterSpec {
                id: "t-yaw-right".to_string(),
                position_m: (-1.0, 0.0, 0.0),
                thrust_direction: (0.0, -1.0, 0.0),
                max_thrust_n: 100.0,
                exhaust_velocity_m_s: 2200.0,
            },
            ThrusterSpec {
                id: "t-trans-fwd".to_string(),
                position_m: (0.0, 0.0, 0.5),
                thrust_direction: (1.0, 0.0, 0.0),
                max_thrust_n: 100.0,
                exhaust_velocity_m_s: 2200.0,
            },
            ThrusterSpec {
                id: "t-trans-aft".to_string(),
                position_m: (0.0, 0.0, -0.5),
                thrust_direction: (1.0, 0.0, 0.0),
                max_thrust_n: 100.0,
                exhaust_velocity_m_s: 2200.0,
            },
        ];
        let groups = vec![
            GroupSpec {
                name: "yaw_left".to_string(),
                thruster_ids: vec!["t-yaw-left".to_string()],
            },
            GroupSpec {
                name: "translate_+x".to_string(),
                thruster_ids: vec!["t-trans-fwd".to_string(), "t-trans-aft".to_string()],
            },
        ];
        RcsCluster::new(RcsConfig {
            thrusters,
            groups,
            fuel_tank_id: "rcs-1".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn activating_unknown_group_errors() {
        let mut cluster = stock_cluster();
        assert_eq!(
            cluster.activate_group("nope"),
            Err(RcsError::UnknownGroup("nope".to_string()))
        );
    }

    #[test]
    fn active_group_produces_force_and_torque() {
        let mut cluster = stock_cluster();
        cluster.activate_group("yaw_left").unwrap();
        let outputs = cluster.tick(Vector3::zeros(), true, 0.1);
        assert!(outputs.force_body_n.norm() > 0.0);
        assert!(outputs.torque_body_nm.norm() > 0.0);
        assert!(outputs.propellant_requested_kg > 0.0);
    }

    #[test]
    fn empty_tank_emits_event_once_per_group() {
        let mut cluster = stock_cluster();
        cluster.activate_group("yaw_left").unwrap();
        let outputs1 = cluster.tick(Vector3::zeros(), false, 0.1);
        let outputs2 = cluster.tick(Vector3::zeros(), false, 0.1);
        assert_eq!(outputs1.events.len(), 1);
        assert_eq!(outputs2.events.len(), 0);
    }

    #[test]
    fn fuel_coupling_shifts_torque_y_component_for_pure_x_translation() {
        let mut cluster = stock_cluster();
        cluster.activate_group("translate_+x").unwrap();
        let outputs_centered = cluster.tick(Vector3::zeros(), true, 0.1);
        let outputs_shifted = cluster.tick(Vector3::new(0.0, 0.0, 0.3), true, 0.1);
        assert!(outputs_centered.torque_body_nm.y.abs() < 1e-9);
        assert!(outputs_shifted.torque_body_nm.y.abs() > 1e-9);
    }
}
