//! Main engine (spec §4.7): ignition state machine, gimbaled thrust vector,
//! Isp-driven mass flow, and health decay.

use crate::errors::{ConfigError, EngineError};
use crate::events::EventKind;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Time spent igniting before transitioning to running (spec §4.7).
const IGNITION_DURATION_S: f64 = 2.0;
/// Cooldown hold time after shutdown before the engine can ignite again.
const SHUTDOWN_COOLDOWN_S: f64 = 5.0;
/// Chamber temperature above which a running engine force-shuts-down.
const OVERTEMP_SHUTDOWN_K: f64 = 3600.0;
/// Minimum commanded throttle once the engine is running (spec §3 range).
const MIN_THROTTLE: f64 = 0.4;
/// Health fraction below which ignition is refused.
const MIN_HEALTH_TO_IGNITE: f64 = 0.2;
/// Throttle above which health decays while running.
const HEALTH_DECAY_THROTTLE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Off,
    Igniting,
    Running,
    ShutdownCooldown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub isp_s: f64,
    pub max_thrust_n: f64,
    pub max_gimbal_rad: f64,
    pub inefficient_heat_fraction: f64,
    pub exhaust_velocity_m_s: f64,
    pub health_decay_per_s: f64,
    pub mount_offset_m: (f64, f64, f64),
    pub fuel_tank_id: String,
}

impl EngineConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.isp_s <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "engine.isp_s",
                value: self.isp_s,
            });
        }
        if self.max_thrust_n <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "engine.max_thrust_n",
                value: self.max_thrust_n,
            });
        }
        if self.max_gimbal_rad <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "engine.max_gimbal_rad",
                value: self.max_gimbal_rad,
            });
        }
        if !(0.0..=1.0).contains(&self.inefficient_heat_fraction) {
            return Err(ConfigError::OutOfRange {
                field: "engine.inefficient_heat_fraction",
                value: self.inefficient_heat_fraction,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Commands consumed from flight control each tick (spec §4.12 step 2, §6).
#[derive(Debug, Clone, Default)]
pub struct EngineCommands {
    pub ignite: bool,
    pub shutdown: bool,
    pub throttle: f64,
    pub gimbal_pitch_rad: f64,
    pub gimbal_yaw_rad: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOutputs {
    pub force_body_n: Vector3<f64>,
    pub torque_body_nm: Vector3<f64>,
    pub propellant_requested_kg: f64,
    pub heat_output_w: f64,
    pub events: Vec<EventKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainEngine {
    config: EngineConfig,
    pub status: EngineStatus,
    pub throttle: f64,
    pub gimbal_pitch_rad: f64,
    pub gimbal_yaw_rad: f64,
    pub ignition_timer_s: f64,
    pub restart_cooldown_s: f64,
    pub health: f64,
    pub chamber_temperature_k: f64,
}

impl MainEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(MainEngine {
            config,
            status: EngineStatus::Off,
            throttle: 0.0,
            gimbal_pitch_rad: 0.0,
            gimbal_yaw_rad: 0.0,
            ignition_timer_s: 0.0,
            restart_cooldown_s: 0.0,
            health: 1.0,
            chamber_temperature_k: 290.0,
        })
    }

    pub fn max_gimbal_rad(&self) -> f64 {
        self.config.max_gimbal_rad
    }

    pub fn fuel_tank_id(&self) -> &str {
        &self.config.fuel_tank_id
    }

    pub fn max_thrust_n(&self) -> f64 {
        self.config.max_thrust_n
    }

    /// Effective exhaust velocity implied by `Isp` (spec §4.7 mass-flow
    /// formula), used for Tsiolkovsky/Δv and TWR reporting — distinct from
    /// `exhaust_velocity_m_s`, which only scales `heat_output_w`.
    pub fn isp_exhaust_velocity_m_s(&self) -> f64 {
        self.config.isp_s * crate::config::STANDARD_GRAVITY_M_S2
    }

    /// `ignite_main_engine` command (spec §4.7, §6). Rejects with
    /// `IllegalState` when the engine cannot accept ignition right now;
    /// propellant availability is checked during the tick, not here.
    pub fn ignite(&mut self) -> Result<(), EngineError> {
        if self.status != EngineStatus::Off {
            return Err(EngineError::IllegalState("engine is not off"));
        }
        if self.health <= MIN_HEALTH_TO_IGNITE {
            return Err(EngineError::IllegalState("engine health too low to ignite"));
        }
        if self.restart_cooldown_s > 0.0 {
            return Err(EngineError::IllegalState("engine still in restart cooldown"));
        }
        self.status = EngineStatus::Igniting;
        self.ignition_timer_s = 0.0;
        Ok(())
    }

    /// `shutdown_main_engine` command.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.status != EngineStatus::Running {
            return Err(EngineError::IllegalState("engine is not running"));
        }
        self.status = EngineStatus::ShutdownCooldown;
        self.ignition_timer_s = 0.0;
        Ok(())
    }

    /// `set_gimbal` command: clamps silently to `±max_gimbal_rad` (spec §6).
    pub fn set_gimbal(&mut self, pitch_rad: f64, yaw_rad: f64) {
        let limit = self.config.max_gimbal_rad;
        self.gimbal_pitch_rad = pitch_rad.clamp(-limit, limit);
        self.gimbal_yaw_rad = yaw_rad.clamp(-limit, limit);
    }

    /// `set_main_engine_throttle` command: clamps to the running min-throttle
    /// band at runtime (spec §6, boundary behaviors).
    pub fn set_throttle(&mut self, requested: f64) {
        let clamped = requested.clamp(0.0, 1.0);
        self.throttle = if self.status == EngineStatus::Running && clamped > 0.0 {
            clamped.max(MIN_THROTTLE)
        } else {
            clamped
        };
    }

    fn thrust_vector_body(&self, force_n: f64) -> Vector3<f64> {
        let unit_thrust = Vector3::new(0.0, 0.0, 1.0);
        let gimbal = UnitQuaternion::from_euler_angles(self.gimbal_pitch_rad, self.gimbal_yaw_rad, 0.0);
        gimbal.transform_vector(&unit_thrust) * force_n
    }

    /// Advances the engine one tick given the commands from flight control
    /// and how much propellant fuel actually delivered last draw (spec §4.7,
    /// §4.12 steps 4/6: engine requests mass flow here, fuel satisfies the
    /// draw in its own step, and the orchestrator reports back the delivered
    /// mass so this tick's thrust can be scaled down proportionally).
    pub fn tick(
        &mut self,
        commands: &EngineCommands,
        propellant_available: bool,
        dt: f64,
    ) -> EngineOutputs {
        let mut events = Vec::new();
        self.set_gimbal(commands.gimbal_pitch_rad, commands.gimbal_yaw_rad);

        if self.restart_cooldown_s > 0.0 {
            self.restart_cooldown_s = (self.restart_cooldown_s - dt).max(0.0);
        }

        if commands.ignite && self.status == EngineStatus::Off {
            let _ = self.ignite();
        }
        if commands.shutdown && self.status == EngineStatus::Running {
            let _ = self.shutdown();
        }

        match self.status {
            EngineStatus::Off => {
                self.throttle = 0.0;
            }
            EngineStatus::Igniting => {
                if !propellant_available {
                    self.status = EngineStatus::Off;
                    self.ignition_timer_s = 0.0;
                    events.push(EventKind::IgnitionAbort);
                } else {
                    self.ignition_timer_s += dt;
                    if self.ignition_timer_s >= IGNITION_DURATION_S {
                        self.status = EngineStatus::Running;
                        events.push(EventKind::Ignition);
                    }
                }
            }
            EngineStatus::Running => {
                self.set_throttle(commands.throttle);
                if !propellant_available {
                    self.status = EngineStatus::ShutdownCooldown;
                    self.ignition_timer_s = 0.0;
                    events.push(EventKind::Shutdown);
                } else if self.chamber_temperature_k > OVERTEMP_SHUTDOWN_K {
                    self.status = EngineStatus::ShutdownCooldown;
                    self.ignition_timer_s = 0.0;
                    events.push(EventKind::Shutdown);
                } else if self.throttle > HEALTH_DECAY_THROTTLE_THRESHOLD {
                    self.health = (self.health - self.config.health_decay_per_s * dt).max(0.0);
                }
            }
            EngineStatus::ShutdownCooldown => {
                self.throttle = 0.0;
                self.ignition_timer_s += dt;
                if self.ignition_timer_s >= SHUTDOWN_COOLDOWN_S {
                    self.status = EngineStatus::Off;
                    self.restart_cooldown_s = 0.0;
                }
            }
        }

        let force_n = if self.status == EngineStatus::Running {
            self.config.max_thrust_n * self.throttle * self.health
        } else {
            0.0
        };

        let force_body = self.thrust_vector_body(force_n);
        let mount_offset = Vector3::new(
            self.config.mount_offset_m.0,
            self.config.mount_offset_m.1,
            self.config.mount_offset_m.2,
        );
        let torque_body = mount_offset.cross(&force_body);

        let mass_flow_kg_s = if force_n > 0.0 {
            force_n / (self.config.isp_s * crate::config::STANDARD_GRAVITY_M_S2)
        } else {
            0.0
        };

        let heat_output_w = self.config.inefficient_heat_fraction * force_n * self.config.exhaust_velocity_m_s;

        EngineOutputs {
            force_body_n: force_body,
            torque_body_nm: torque_body,
            propellant_requested_kg: mass_flow_kg_s * dt,
            heat_output_w,
            events,
        }
    }

    /// Scales this tick's reported thrust/torque down proportionally when
    /// fuel delivered less than requested (spec §4.7).
    pub fn scale_for_delivered_propellant(
        outputs: &mut EngineOutputs,
        requested_kg: f64,
        delivered_kg: f64,
    ) {
        if requested_kg <= 0.0 {
            return;
        }
        let ratio = (delivered_kg / requested_kg).clamp(0.0, 1.0);
        outputs.force_body_n *= ratio;
        outputs.torque_body_nm *= ratio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_engine() -> MainEngine {
        MainEngine::new(EngineConfig {
            isp_s: 311.0,
            max_thrust_n: 45_000.0,
            max_gimbal_rad: 0.1,
            inefficient_heat_fraction: 0.05,
            exhaust_velocity_m_s: 3050.0,
            health_decay_per_s: 0.0001,
            mount_offset_m: (0.0, 0.0, -1.0),
            fuel_tank_id: "main-1".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn ignite_with_zero_propellant_aborts() {
        let mut engine = stock_engine();
        engine.ignite().unwrap();
        let outputs = engine.tick(&EngineCommands::default(), false, 0.1);
        assert_eq!(engine.status, EngineStatus::Off);
        assert!(outputs.events.contains(&EventKind::IgnitionAbort));
    }

    #[test]
    fn ignition_transitions_to_running_after_two_seconds() {
        let mut engine = stock_engine();
        engine.ignite().unwrap();
        for _ in 0..19 {
            engine.tick(&EngineCommands::default(), true, 0.1);
        }
        assert_eq!(engine.status, EngineStatus::Igniting);
        let outputs = engine.tick(&EngineCommands::default(), true, 0.1);
        assert_eq!(engine.status, EngineStatus::Running);
        assert!(outputs.events.contains(&EventKind::Ignition));
    }

    #[test]
    fn throttle_clamps_to_min_band_while_running() {
        let mut engine = stock_engine();
        engine.status = EngineStatus::Running;
        engine.set_throttle(0.2);
        assert_eq!(engine.throttle, MIN_THROTTLE);
    }

    #[test]
    fn gimbal_clamps_to_max() {
        let mut engine = stock_engine();
        engine.set_gimbal(1.0, -1.0);
        assert_eq!(engine.gimbal_pitch_rad, 0.1);
        assert_eq!(engine.gimbal_yaw_rad, -0.1);
    }

    #[test]
    fn overtemp_forces_shutdown_cooldown() {
        let mut engine = stock_engine();
        engine.status = EngineStatus::Running;
        engine.chamber_temperature_k = 3700.0;
        let outputs = engine.tick(
            &EngineCommands {
                throttle: 1.0,
                ..Default::default()
            },
            true,
            0.1,
        );
        assert_eq!(engine.status, EngineStatus::ShutdownCooldown);
        assert!(outputs.events.contains(&EventKind::Shutdown));
    }

    #[test]
    fn delivered_shortfall_scales_thrust_down() {
        let mut outputs = EngineOutputs {
            force_body_n: Vector3::new(0.0, 0.0, 1000.0),
            torque_body_nm: Vector3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        MainEngine::scale_for_delivered_propellant(&mut outputs, 10.0, 5.0);
        assert!((outputs.force_body_n.z - 500.0).abs() < 1e-9);
    }
}
