//! Flight control layer (spec §4.10): PID primitives, SAS attitude hold, and
//! autopilot throttle modes, composed by the orchestrator each tick.

pub mod autopilot;
pub mod pid;
pub mod sas;

use autopilot::{Autopilot, AutopilotConfig, AutopilotInputs, AutopilotMode, AutopilotOutputs};
use sas::{OrbitFrame, Sas, SasConfig, SasMode, SasOutputs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightControlConfig {
    pub sas: SasConfig,
    pub autopilot: AutopilotConfig,
}

/// Commands flight control consumes at the start of a tick (spec §4.12 step 2).
#[derive(Debug, Clone, Default)]
pub struct FlightControlCommands {
    pub manual_throttle: Option<f64>,
    pub manual_gimbal_rad: Option<(f64, f64)>,
    pub ignite_engine: bool,
    pub shutdown_engine: bool,
    pub activate_rcs_groups: Vec<String>,
    pub deactivate_rcs_groups: Vec<String>,
    pub set_sas_mode: Option<SasMode>,
    pub set_autopilot_mode: Option<AutopilotMode>,
    pub set_target_altitude_m: Option<f64>,
    pub set_target_vertical_speed_m_s: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FlightControlOutputs {
    pub throttle: Option<f64>,
    pub gimbal_rad: Option<(f64, f64)>,
    pub ignite_engine: bool,
    pub shutdown_engine: bool,
    pub rcs_axis_command: nalgebra::Vector3<f64>,
    pub activate_rcs_groups: Vec<String>,
    pub deactivate_rcs_groups: Vec<String>,
    pub events: Vec<crate::events::EventKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightControl {
    pub sas: Sas,
    pub autopilot: Autopilot,
}

impl FlightControl {
    pub fn new(config: FlightControlConfig) -> Self {
        FlightControl {
            sas: Sas::new(config.sas),
            autopilot: Autopilot::new(config.autopilot),
        }
    }

    pub fn tick(
        &mut self,
        commands: &FlightControlCommands,
        attitude: nalgebra::UnitQuaternion<f64>,
        angular_velocity: nalgebra::Vector3<f64>,
        orbit: &OrbitFrame,
        autopilot_inputs: &AutopilotInputs,
        dt: f64,
    ) -> FlightControlOutputs {
        let mut events = Vec::new();

        if let Some(mode) = commands.set_sas_mode {
            self.sas.set_mode(mode, attitude);
            events.push(crate::events::EventKind::SasEngage {
                mode: format!("{mode:?}").to_lowercase(),
            });
        }
        if let Some(mode) = commands.set_autopilot_mode {
            self.autopilot.set_mode(mode);
            events.push(crate::events::EventKind::AutopilotEngage {
                mode: format!("{mode:?}").to_lowercase(),
            });
        }
        if let Some(altitude_m) = commands.set_target_altitude_m {
            self.autopilot.set_target_altitude(altitude_m);
        }
        if let Some(vertical_speed_m_s) = commands.set_target_vertical_speed_m_s {
            self.autopilot.set_target_vertical_speed(vertical_speed_m_s);
        }

        let SasOutputs { axis_command, .. } = self.sas.tick(attitude, angular_velocity, orbit, dt);

        let AutopilotOutputs {
            throttle: autopilot_throttle,
            ..
        } = self.autopilot.tick(autopilot_inputs, dt);

        let throttle = autopilot_throttle.or(commands.manual_throttle);

        FlightControlOutputs {
            throttle,
            gimbal_rad: commands.manual_gimbal_rad,
            ignite_engine: commands.ignite_engine,
            shutdown_engine: commands.shutdown_engine,
            rcs_axis_command: axis_command,
            activate_rcs_groups: commands.activate_rcs_groups.clone(),
            deactivate_rcs_groups: commands.deactivate_rcs_groups.clone(),
            events,
        }
    }
}
