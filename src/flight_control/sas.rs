//! SAS — stability augmentation system (spec §4.10). Derives a target
//! attitude from the selected mode, turns the attitude error into per-axis
//! RCS group activations through a cascade of attitude and rate-damping PIDs.

use super::pid::{Pid, PidGains};
use crate::math;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Attitude error below which an axis is considered settled (spec §4.10).
const ATTITUDE_DEADBAND_RAD: f64 = 0.5_f64.to_radians();
/// Rate error below which an axis is considered settled (spec §4.10).
const RATE_DEADBAND_RAD_S: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SasMode {
    Off,
    Stability,
    AttitudeHold,
    Prograde,
    Retrograde,
    RadialIn,
    RadialOut,
    Normal,
    AntiNormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SasConfig {
    pub attitude: PidGains,
    pub rate_damping: PidGains,
}

/// Inertial-frame vectors SAS needs to derive orbit-relative target
/// attitudes (spec §4.10: prograde/retrograde/radial/normal).
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitFrame {
    pub velocity_direction: Vector3<f64>,
    pub radial_direction: Vector3<f64>,
    pub normal_direction: Vector3<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SasOutputs {
    /// Signed per-axis command in `[-1, 1]`, one per body axis (x, y, z);
    /// the orchestrator maps these onto RCS rotation groups.
    pub axis_command: Vector3<f64>,
    pub engaged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sas {
    config: SasConfig,
    pub mode: SasMode,
    pub hold_attitude: Option<UnitQuaternion<f64>>,
    attitude_pids: [Pid; 3],
    rate_pids: [Pid; 3],
}

impl Sas {
    pub fn new(config: SasConfig) -> Self {
        Sas {
            attitude_pids: [
                Pid::new(config.attitude),
                Pid::new(config.attitude),
                Pid::new(config.attitude),
            ],
            rate_pids: [
                Pid::new(config.rate_damping),
                Pid::new(config.rate_damping),
                Pid::new(config.rate_damping),
            ],
            config,
            mode: SasMode::Off,
            hold_attitude: None,
        }
    }

    /// `set_sas_mode` command. Integral accumulators reset atomically on any
    /// mode switch (spec §4.10).
    pub fn set_mode(&mut self, mode: SasMode, current_attitude: UnitQuaternion<f64>) {
        self.mode = mode;
        for pid in self.attitude_pids.iter_mut().chain(self.rate_pids.iter_mut()) {
            pid.reset();
        }
        self.hold_attitude = if mode == SasMode::AttitudeHold {
            Some(current_attitude)
        } else {
            None
        };
    }

    fn target_attitude(
        &self,
        current_attitude: UnitQuaternion<f64>,
        orbit: &OrbitFrame,
    ) -> Option<UnitQuaternion<f64>> {
        let forward = Vector3::new(0.0, 0.0, 1.0);
        let target_body_z = match self.mode {
            SasMode::Off => return None,
            SasMode::Stability => return None,
            SasMode::AttitudeHold => return self.hold_attitude,
            SasMode::Prograde => orbit.velocity_direction,
            SasMode::Retrograde => -orbit.velocity_direction,
            SasMode::RadialIn => -orbit.radial_direction,
            SasMode::RadialOut => orbit.radial_direction,
            SasMode::Normal => orbit.normal_direction,
            SasMode::AntiNormal => -orbit.normal_direction,
        };
        let target_body_z = math::safe_normalize(target_body_z);
        if target_body_z.norm() < 0.5 {
            return None;
        }
        UnitQuaternion::rotation_between(&forward, &target_body_z)
            .map(|rot| rot * current_attitude)
    }

    /// Advances the SAS cascade one tick (spec §4.10): attitude PIDs produce
    /// a target rate, rate-damping PIDs produce the final axis command.
    pub fn tick(
        &mut self,
        current_attitude: UnitQuaternion<f64>,
        current_angular_velocity: Vector3<f64>,
        orbit: &OrbitFrame,
        dt: f64,
    ) -> SasOutputs {
        if self.mode == SasMode::Off {
            return SasOutputs::default();
        }

        let target = match self.target_attitude(current_attitude, orbit) {
            Some(q) => q,
            None => {
                if self.mode != SasMode::Stability {
                    return SasOutputs::default();
                }
                current_attitude
            }
        };

        let q_error = target * current_attitude.inverse();
        let attitude_error = math::small_angle_error(q_error);

        let mut target_rate = Vector3::zeros();
        for axis in 0..3 {
            let error = attitude_error[axis];
            let deadbanded = if error.abs() < ATTITUDE_DEADBAND_RAD { 0.0 } else { error };
            target_rate[axis] = self.attitude_pids[axis].update(0.0, deadbanded, dt);
        }

        let mut axis_command = Vector3::zeros();
        for axis in 0..3 {
            let rate_error = target_rate[axis] - current_angular_velocity[axis];
            let deadbanded = if rate_error.abs() < RATE_DEADBAND_RAD_S {
                0.0
            } else {
                rate_error
            };
            axis_command[axis] = self.rate_pids[axis].update(0.0, deadbanded, dt);
        }

        SasOutputs {
            axis_command,
            engaged: true,
        }
    }
}
