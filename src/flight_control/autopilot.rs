//! Autopilot (spec §4.10): altitude/vertical-speed hold, hover, and the
//! suicide-burn descent profile, each driving main-engine throttle.

use super::pid::{Pid, PidGains};
use serde::{Deserialize, Serialize};

/// Vertical speed below which suicide burn hands off to hover (spec §4.10).
const SUICIDE_BURN_HANDOFF_M_S: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutopilotMode {
    Off,
    AltitudeHold,
    VerticalSpeedHold,
    Hover,
    SuicideBurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutopilotConfig {
    pub altitude: PidGains,
    pub vertical_speed: PidGains,
    /// Safety margin applied to the analytic suicide-burn altitude.
    pub suicide_burn_margin: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutopilotInputs {
    pub altitude_m: f64,
    pub vertical_speed_m_s: f64,
    pub max_thrust_n: f64,
    pub total_mass_kg: f64,
    pub local_gravity_m_s2: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutopilotOutputs {
    pub throttle: Option<f64>,
    pub should_burn: bool,
    pub burn_altitude_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autopilot {
    config: AutopilotConfig,
    pub mode: AutopilotMode,
    pub target_altitude_m: f64,
    pub target_vertical_speed_m_s: f64,
    altitude_pid: Pid,
    vertical_speed_pid: Pid,
    suicide_burn_engaged: bool,
}

impl Autopilot {
    pub fn new(config: AutopilotConfig) -> Self {
        Autopilot {
            altitude_pid: Pid::new(config.altitude),
            vertical_speed_pid: Pid::new(config.vertical_speed),
            config,
            mode: AutopilotMode::Off,
            target_altitude_m: 0.0,
            target_vertical_speed_m_s: 0.0,
            suicide_burn_engaged: false,
        }
    }

    /// `set_autopilot_mode` command. Integral terms reset on the tick of the
    /// switch (spec §4.10, boundary behaviors).
    pub fn set_mode(&mut self, mode: AutopilotMode) {
        self.mode = mode;
        self.altitude_pid.reset();
        self.vertical_speed_pid.reset();
        self.suicide_burn_engaged = false;
    }

    pub fn set_target_altitude(&mut self, altitude_m: f64) {
        self.target_altitude_m = altitude_m;
    }

    pub fn set_target_vertical_speed(&mut self, vertical_speed_m_s: f64) {
        self.target_vertical_speed_m_s = vertical_speed_m_s;
    }

    /// `burn_altitude = v_vertical^2 / (2 * (F_max/m - g_local)) * margin`
    /// (spec §4.10).
    fn suicide_burn_altitude(&self, inputs: &AutopilotInputs) -> f64 {
        let max_accel = inputs.max_thrust_n / inputs.total_mass_kg.max(1e-9) - inputs.local_gravity_m_s2;
        if max_accel <= 0.0 {
            return f64::INFINITY;
        }
        (inputs.vertical_speed_m_s * inputs.vertical_speed_m_s) / (2.0 * max_accel)
            * self.config.suicide_burn_margin
    }

    pub fn tick(&mut self, inputs: &AutopilotInputs, dt: f64) -> AutopilotOutputs {
        match self.mode {
            AutopilotMode::Off => AutopilotOutputs::default(),
            AutopilotMode::AltitudeHold => {
                let throttle = self
                    .altitude_pid
                    .update(inputs.altitude_m, self.target_altitude_m, dt);
                AutopilotOutputs {
                    throttle: Some(throttle.clamp(0.0, 1.0)),
                    ..Default::default()
                }
            }
            AutopilotMode::VerticalSpeedHold => {
                let throttle = self.vertical_speed_pid.update(
                    inputs.vertical_speed_m_s,
                    self.target_vertical_speed_m_s,
                    dt,
                );
                AutopilotOutputs {
                    throttle: Some(throttle.clamp(0.0, 1.0)),
                    ..Default::default()
                }
            }
            AutopilotMode::Hover => {
                let throttle = self.vertical_speed_pid.update(inputs.vertical_speed_m_s, 0.0, dt);
                AutopilotOutputs {
                    throttle: Some(throttle.clamp(0.0, 1.0)),
                    ..Default::default()
                }
            }
            AutopilotMode::SuicideBurn => {
                let burn_altitude_m = self.suicide_burn_altitude(inputs);
                let should_burn = inputs.altitude_m <= burn_altitude_m;

                if should_burn {
                    self.suicide_burn_engaged = true;
                }

                if self.suicide_burn_engaged && inputs.vertical_speed_m_s.abs() < SUICIDE_BURN_HANDOFF_M_S {
                    let throttle = self.vertical_speed_pid.update(inputs.vertical_speed_m_s, 0.0, dt);
                    return AutopilotOutputs {
                        throttle: Some(throttle.clamp(0.0, 1.0)),
                        should_burn,
                        burn_altitude_m,
                    };
                }

                AutopilotOutputs {
                    throttle: if self.suicide_burn_engaged { Some(1.0) } else { None },
                    should_burn,
                    burn_altitude_m,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_autopilot() -> Autopilot {
        Autopilot::new(AutopilotConfig {
            altitude: PidGains {
                kp: 0.05,
                ki: 0.001,
                kd: 0.2,
                integral_limit: 10.0,
                output_max: 1.0,
            },
            vertical_speed: PidGains {
                kp: 0.8,
                ki: 0.1,
                kd: 0.15,
                integral_limit: 5.0,
                output_max: 1.0,
            },
            suicide_burn_margin: 1.15,
        })
    }

    #[test]
    fn off_mode_writes_no_throttle() {
        let mut ap = stock_autopilot();
        let outputs = ap.tick(&AutopilotInputs::default(), 0.1);
        assert_eq!(outputs.throttle, None);
    }

    #[test]
    fn hover_drives_toward_zero_vertical_speed() {
        let mut ap = stock_autopilot();
        ap.set_mode(AutopilotMode::Hover);
        let outputs = ap.tick(
            &AutopilotInputs {
                vertical_speed_m_s: -5.0,
                ..Default::default()
            },
            0.1,
        );
        assert!(outputs.throttle.unwrap() > 0.0);
    }

    #[test]
    fn suicide_burn_ignites_at_computed_altitude() {
        let mut ap = stock_autopilot();
        ap.set_mode(AutopilotMode::SuicideBurn);
        let inputs = AutopilotInputs {
            altitude_m: 100.0,
            vertical_speed_m_s: -60.0,
            max_thrust_n: 45_000.0,
            total_mass_kg: 5_000.0,
            local_gravity_m_s2: 1.62,
        };
        let burn_altitude = ap.suicide_burn_altitude(&inputs);
        let outputs = ap.tick(&inputs, 0.1);
        assert!(outputs.should_burn);
        assert!((outputs.burn_altitude_m - burn_altitude).abs() < 1e-9);
        assert_eq!(outputs.throttle, Some(1.0));
    }

    #[test]
    fn suicide_burn_hands_off_to_hover_near_zero_vertical_speed() {
        let mut ap = stock_autopilot();
        ap.set_mode(AutopilotMode::SuicideBurn);
        let mut inputs = AutopilotInputs {
            altitude_m: 10.0,
            vertical_speed_m_s: -0.3,
            max_thrust_n: 45_000.0,
            total_mass_kg: 5_000.0,
            local_gravity_m_s2: 1.62,
        };
        ap.tick(&inputs, 0.1);
        inputs.vertical_speed_m_s = -0.2;
        let outputs = ap.tick(&inputs, 0.1);
        assert_ne!(outputs.throttle, Some(1.0));
    }

    #[test]
    fn mode_switch_resets_integral() {
        let mut ap = stock_autopilot();
        ap.set_mode(AutopilotMode::Hover);
        ap.tick(
            &AutopilotInputs {
                vertical_speed_m_s: -5.0,
                ..Default::default()
            },
            0.1,
        );
        ap.set_mode(AutopilotMode::Hover);
        assert_eq!(ap.vertical_speed_pid.integral, 0.0);
    }
}
