//! Command surface (spec §6): the single point of external control. Each
//! variant maps to one of the three dispatch styles the orchestrator applies
//! (spec §4.12 step 2, §6 "Commands"):
//!
//! - persistent level set-points (throttle, gimbal) are stored directly on
//!   the orchestrator and re-supplied to flight control every tick;
//! - one-shot edge commands (ignition, mode switches, RCS group toggles) are
//!   buffered in [`PendingCommands`] and drained at the start of the next
//!   tick;
//! - direct-mutator commands (reactor start/scram, coolant pump, circuit
//!   breaker) apply immediately against the already-Result-returning
//!   subsystem APIs, since buffering them would just delay a check that can
//!   be done synchronously.

use crate::flight_control::autopilot::AutopilotMode;
use crate::flight_control::sas::SasMode;

/// External command surface (spec §6). `Orchestrator::enqueue` validates and
/// applies or buffers each variant; `Ok(())` on acceptance, `Err(CommandError)`
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetMainEngineThrottle(f64),
    SetGimbal { pitch_rad: f64, yaw_rad: f64 },
    IgniteMainEngine,
    ShutdownMainEngine,
    ActivateRcsGroup(String),
    DeactivateRcsGroup(String),
    SetSasMode(SasMode),
    SetAutopilotMode(AutopilotMode),
    SetTargetAltitude(f64),
    SetTargetVerticalSpeed(f64),
    StartReactor,
    ScramReactor,
    SetCoolantPump { loop_id: String, on: bool },
    SetCircuitBreaker { consumer_id: String, enabled: bool },
}

/// One-shot edge commands accepted since the last tick, drained at the start
/// of the next one (spec §4.12 step 2). Persistent level set-points
/// (throttle, gimbal) live directly on the orchestrator instead, since they
/// must be re-supplied every tick rather than consumed once.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingCommands {
    pub ignite_engine: bool,
    pub shutdown_engine: bool,
    pub activate_rcs_groups: Vec<String>,
    pub deactivate_rcs_groups: Vec<String>,
    pub set_sas_mode: Option<SasMode>,
    pub set_autopilot_mode: Option<AutopilotMode>,
    pub set_target_altitude_m: Option<f64>,
    pub set_target_vertical_speed_m_s: Option<f64>,
}

impl PendingCommands {
    /// Swaps out the accumulated buffer for a fresh, empty one, handing the
    /// drained contents to the caller for this tick's flight-control pass.
    pub fn take(&mut self) -> PendingCommands {
        std::mem::take(self)
    }
}
