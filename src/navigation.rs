//! Navigation (spec §4.11): a pure forward-integration trajectory predictor
//! under gravity only, plus the standalone analytic helpers (suicide-burn
//! altitude, delta-v remaining, thrust-to-weight) the orchestrator exposes
//! through the snapshot without owning any mutable navigation state.

use crate::config::{NavigationConfig, PlanetConfig, GRAVITATIONAL_CONSTANT, STANDARD_GRAVITY_M_S2};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TrajectoryPrediction {
    pub will_impact: bool,
    pub impact_time_s: Option<f64>,
    pub impact_position_m: Option<(f64, f64, f64)>,
    pub impact_speed_m_s: Option<f64>,
    pub impact_vertical_speed_m_s: Option<f64>,
    pub impact_latitude_rad: Option<f64>,
    pub impact_longitude_rad: Option<f64>,
}

/// Forward-integrates position/velocity under gravity only — no thrust, no
/// drag, no side effects on any subsystem (spec §4.11) — until the body
/// crosses the planet's surface or `prediction_horizon_s` elapses.
pub fn predict_trajectory(
    position_m: Vector3<f64>,
    velocity_m_s: Vector3<f64>,
    planet: &PlanetConfig,
    config: &NavigationConfig,
) -> TrajectoryPrediction {
    let dt = config.prediction_step_s;
    let mut position = position_m;
    let mut velocity = velocity_m_s;
    let mut elapsed_s = 0.0;

    while elapsed_s < config.prediction_horizon_s {
        let r = position.norm().max(1.0);
        let altitude = r - planet.radius_m;
        if altitude <= 0.0 {
            let r_hat = crate::math::safe_normalize(position);
            let speed = velocity.norm();
            let vertical_speed = velocity.dot(&r_hat);
            return TrajectoryPrediction {
                will_impact: true,
                impact_time_s: Some(elapsed_s),
                impact_position_m: Some((position.x, position.y, position.z)),
                impact_speed_m_s: Some(speed),
                impact_vertical_speed_m_s: Some(vertical_speed),
                impact_latitude_rad: Some((position.z / r).clamp(-1.0, 1.0).asin()),
                impact_longitude_rad: Some(position.y.atan2(position.x)),
            };
        }

        let r_hat = crate::math::safe_normalize(position);
        let g_local = GRAVITATIONAL_CONSTANT * planet.mass_kg / (r * r);
        let accel = -r_hat * g_local;

        velocity += accel * dt;
        position += velocity * dt;
        elapsed_s += dt;
    }

    TrajectoryPrediction::default()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuicideBurnPrediction {
    pub burn_altitude_m: f64,
    pub should_burn: bool,
}

/// `burn_altitude = v_vertical^2 / (2 * (F_max/m - g_local)) * margin`
/// (spec §4.10/§4.11); mirrors the autopilot's internal computation so
/// navigation telemetry and the autopilot's own decision never disagree.
pub fn suicide_burn(
    altitude_m: f64,
    vertical_speed_m_s: f64,
    max_thrust_n: f64,
    total_mass_kg: f64,
    local_gravity_m_s2: f64,
    margin: f64,
) -> SuicideBurnPrediction {
    let max_accel = max_thrust_n / total_mass_kg.max(1e-9) - local_gravity_m_s2;
    let burn_altitude_m = if max_accel <= 0.0 {
        f64::INFINITY
    } else {
        (vertical_speed_m_s * vertical_speed_m_s) / (2.0 * max_accel) * margin
    };
    SuicideBurnPrediction {
        burn_altitude_m,
        should_burn: altitude_m <= burn_altitude_m,
    }
}

/// Tsiolkovsky rocket equation: `Δv = v_e * ln(m_wet / m_dry)` (spec §4.11).
pub fn delta_v_remaining_m_s(
    current_total_mass_kg: f64,
    dry_mass_kg: f64,
    exhaust_velocity_m_s: f64,
) -> f64 {
    if current_total_mass_kg <= dry_mass_kg || dry_mass_kg <= 0.0 {
        return 0.0;
    }
    exhaust_velocity_m_s * (current_total_mass_kg / dry_mass_kg).ln()
}

/// `TWR = max_thrust / (total_mass * g_local)` (spec §4.11); `g_local`
/// defaults to standard gravity when the caller has no local value handy.
pub fn thrust_to_weight_ratio(max_thrust_n: f64, total_mass_kg: f64, local_gravity_m_s2: f64) -> f64 {
    let g = if local_gravity_m_s2 > 0.0 {
        local_gravity_m_s2
    } else {
        STANDARD_GRAVITY_M_S2
    };
    if total_mass_kg <= 0.0 {
        return 0.0;
    }
    max_thrust_n / (total_mass_kg * g)
}
