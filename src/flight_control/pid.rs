//! PID controller (spec §4.10) with anti-windup via conditional integration:
//! the integral accumulator only updates on a tick where the raw output did
//! not saturate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral_limit: f64,
    pub output_max: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pid {
    gains: PidGains,
    pub integral: f64,
    pub previous_error: f64,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Pid {
            gains,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Resets the integral accumulator and derivative history (spec §4.10:
    /// "integral accumulators reset on mode change").
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    /// `update(current, target, dt) -> output_clamped` (spec §4.10).
    pub fn update(&mut self, current: f64, target: f64, dt: f64) -> f64 {
        let error = target - current;

        let proportional = self.gains.kp * error;
        let derivative = if dt > 0.0 {
            self.gains.kd * (error - self.previous_error) / dt
        } else {
            0.0
        };

        let candidate_integral = (self.integral + error * dt)
            .clamp(-self.gains.integral_limit, self.gains.integral_limit);
        let raw = proportional + self.gains.ki * candidate_integral + derivative;

        if raw.abs() <= self.gains.output_max {
            self.integral = candidate_integral;
        }

        self.previous_error = error;

        let output = proportional + self.gains.ki * self.integral + derivative;
        output.clamp(-self.gains.output_max, self.gains.output_max)
    }
}
