//! Rigid-body physics (spec §4.9): semi-implicit Euler integration of
//! position, velocity, attitude, and angular velocity under gravity and the
//! combined force/torque the orchestrator gathers from propulsion.

use crate::errors::ConfigError;
use crate::events::EventKind;
use crate::math;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub dry_mass_kg: f64,
    /// Diagonal moments of inertia (Ixx, Iyy, Izz), kg·m². Off-diagonal
    /// coupling is out of scope for the core (spec §9 open question).
    pub inertia_diagonal_kgm2: (f64, f64, f64),
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dry_mass_kg <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "physics.dry_mass_kg",
                value: self.dry_mass_kg,
            });
        }
        let (ixx, iyy, izz) = self.inertia_diagonal_kgm2;
        for (name, v) in [("ixx", ixx), ("iyy", iyy), ("izz", izz)] {
            if v <= 0.0 {
                return Err(ConfigError::MustBePositive {
                    field: match name {
                        "ixx" => "physics.inertia.ixx",
                        "iyy" => "physics.inertia.iyy",
                        _ => "physics.inertia.izz",
                    },
                    value: v,
                });
            }
        }
        Ok(())
    }

    fn inertia_matrix(&self) -> Matrix3<f64> {
        let (ixx, iyy, izz) = self.inertia_diagonal_kgm2;
        Matrix3::new(ixx, 0.0, 0.0, 0.0, iyy, 0.0, 0.0, 0.0, izz)
    }
}

/// Everything the orchestrator gathers from propulsion before a physics tick
/// (spec §4.12 step 10).
#[derive(Debug, Clone, Default)]
pub struct PhysicsInputs {
    pub force_body_n: Vector3<f64>,
    pub torque_body_nm: Vector3<f64>,
    pub propellant_delta_kg: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PhysicsOutputs {
    pub altitude_m: f64,
    pub speed_m_s: f64,
    pub vertical_speed_m_s: f64,
    pub euler_angles_rad: (f64, f64, f64),
    pub events: Vec<EventKind>,
}

/// 6-DOF rigid-body state (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBodyState {
    pub position_m: Vector3<f64>,
    pub velocity_m_s: Vector3<f64>,
    pub attitude: UnitQuaternion<f64>,
    pub angular_velocity_rad_s: Vector3<f64>,
    pub propellant_mass_kg: f64,
}

impl RigidBodyState {
    /// False if integration produced a NaN/Inf component (spec §7 "numerical
    /// pathologies"); the orchestrator uses this to decide whether to pin
    /// the last-known-good state instead of publishing this tick's result.
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite())
            && self.velocity_m_s.iter().all(|v| v.is_finite())
            && self.attitude.into_inner().iter().all(|v| v.is_finite())
            && self.angular_velocity_rad_s.iter().all(|v| v.is_finite())
            && self.propellant_mass_kg.is_finite()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    config: PhysicsConfig,
    pub state: RigidBodyState,
    planet_mass_kg: f64,
    planet_radius_m: f64,
    low_altitude_notified: bool,
    ground_impact_notified: bool,
}

/// Altitude below which a `low_altitude` warning event fires (spec §3 Event
/// kinds); fixed rather than configurable since the spec does not expose a
/// tunable for it.
const LOW_ALTITUDE_WARNING_M: f64 = 150.0;

impl RigidBody {
    pub fn new(
        config: PhysicsConfig,
        initial_position_m: Vector3<f64>,
        initial_velocity_m_s: Vector3<f64>,
        initial_attitude: UnitQuaternion<f64>,
        initial_propellant_mass_kg: f64,
        planet_mass_kg: f64,
        planet_radius_m: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(RigidBody {
            config,
            state: RigidBodyState {
                position_m: initial_position_m,
                velocity_m_s: initial_velocity_m_s,
                attitude: initial_attitude,
                angular_velocity_rad_s: Vector3::zeros(),
                propellant_mass_kg: initial_propellant_mass_kg,
            },
            planet_mass_kg,
            planet_radius_m,
            low_altitude_notified: false,
            ground_impact_notified: false,
        })
    }

    pub fn total_mass_kg(&self) -> f64 {
        self.config.dry_mass_kg + self.state.propellant_mass_kg
    }

    pub fn dry_mass_kg(&self) -> f64 {
        self.config.dry_mass_kg
    }

    pub fn local_gravity_m_s2(&self) -> f64 {
        let r = self.state.position_m.norm().max(1.0);
        crate::config::GRAVITATIONAL_CONSTANT * self.planet_mass_kg / (r * r)
    }

    pub fn local_gravity_vector_m_s2(&self) -> Vector3<f64> {
        let r_hat = math::safe_normalize(self.state.position_m);
        -r_hat * self.local_gravity_m_s2()
    }

    /// Derives this tick's outputs from the current state without advancing
    /// it; used when a tick's integration result was discarded for being
    /// non-finite and the pinned prior state must still produce a snapshot.
    pub fn current_outputs(&self) -> PhysicsOutputs {
        let r_norm = self.state.position_m.norm();
        let altitude = (r_norm - self.planet_radius_m).max(0.0);
        let r_hat = math::safe_normalize(self.state.position_m);
        PhysicsOutputs {
            altitude_m: altitude,
            speed_m_s: self.state.velocity_m_s.norm(),
            vertical_speed_m_s: self.state.velocity_m_s.dot(&r_hat),
            euler_angles_rad: math::euler_zyx(self.state.attitude),
            events: Vec::new(),
        }
    }

    /// Advances the rigid body one tick (spec §4.9, semi-implicit Euler).
    pub fn tick(&mut self, inputs: &PhysicsInputs, dt: f64) -> PhysicsOutputs {
        let mut events = Vec::new();

        self.state.propellant_mass_kg =
            (self.state.propellant_mass_kg - inputs.propellant_delta_kg).max(0.0);
        let total_mass = self.total_mass_kg();

        let a_gravity = self.local_gravity_vector_m_s2();
        let force_inertial = self.state.attitude.transform_vector(&inputs.force_body_n);

        self.state.velocity_m_s += (force_inertial / total_mass + a_gravity) * dt;
        self.state.position_m += self.state.velocity_m_s * dt;

        let inertia = self.config.inertia_matrix();
        let omega = self.state.angular_velocity_rad_s;
        let gyroscopic = omega.cross(&(inertia * omega));
        let angular_accel = inertia
            .try_inverse()
            .map(|inv| inv * (inputs.torque_body_nm - gyroscopic))
            .unwrap_or_else(Vector3::zeros);
        self.state.angular_velocity_rad_s += angular_accel * dt;

        self.state.attitude =
            math::integrate_attitude(self.state.attitude, self.state.angular_velocity_rad_s, dt);

        let r_norm = self.state.position_m.norm();
        let altitude = r_norm - self.planet_radius_m;
        let r_hat = math::safe_normalize(self.state.position_m);
        let speed = self.state.velocity_m_s.norm();
        let vertical_speed = self.state.velocity_m_s.dot(&r_hat);

        if altitude <= 0.0 {
            if !self.ground_impact_notified {
                events.push(EventKind::GroundImpact {
                    speed_m_s: speed,
                    vertical_speed_m_s: vertical_speed,
                });
                self.ground_impact_notified = true;
            }
        } else {
            self.ground_impact_notified = false;
        }

        if altitude <= LOW_ALTITUDE_WARNING_M && altitude > 0.0 {
            if !self.low_altitude_notified {
                events.push(EventKind::LowAltitude { altitude_m: altitude });
                self.low_altitude_notified = true;
            }
        } else {
            self.low_altitude_notified = false;
        }

        let altitude_clamped = altitude.max(0.0);
        let euler_angles_rad = math::euler_zyx(self.state.attitude);

        PhysicsOutputs {
            altitude_m: altitude_clamped,
            speed_m_s: speed,
            vertical_speed_m_s: vertical_speed,
            euler_angles_rad,
            events,
        }
    }
}
