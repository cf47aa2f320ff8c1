//! The orchestrator (spec §4.12): sole owner of all subsystem state, sole
//! entry point for command injection and tick advancement. No subsystem
//! holds a reference to another — every cross-subsystem value flows through
//! here as an explicit struct, and every `tick()` publishes a fresh,
//! fully-owned [`Snapshot`] rather than handing out internal references.

use crate::command::{Command, PendingCommands};
use crate::config::SimulationConfig;
use crate::coolant::CoolantSystem;
use crate::electrical::ElectricalSystem;
use crate::engine::{EngineCommands, EngineStatus, MainEngine};
use crate::errors::{CommandError, ConfigError, ElectricalError, PersistenceError};
use crate::events::{EventKind, EventLog};
use crate::flight_control::autopilot::AutopilotInputs;
use crate::flight_control::sas::OrbitFrame;
use crate::flight_control::{FlightControl, FlightControlCommands};
use crate::fuel::{FuelSystem, TankInitialState};
use crate::gas::{GasSystem, InitialBottleState};
use crate::math;
use crate::navigation;
use crate::persistence::PersistedState;
use crate::physics::{PhysicsInputs, RigidBody};
use crate::rcs::RcsCluster;
use crate::snapshot::{self, NavigationSnapshot, Snapshot};
use crate::thermal::{HeatInputs, ThermalSystem};
use log::warn;
use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Below this magnitude a SAS axis command is treated as settled rather than
/// toggling an RCS rotation group on floating-point noise.
const RCS_AXIS_COMMAND_EPSILON: f64 = 1e-6;

/// Short diagnostic for the subset of [`EventKind`]s that indicate a
/// physical limit or unrecoverable degradation (spec §7 "PhysicalLimit" /
/// "ResourceExhausted"); these are worth a host-visible log line in addition
/// to their entry in the event log, everything else is not.
fn critical_event_message(kind: &EventKind) -> Option<String> {
    match kind {
        EventKind::Scram => Some("reactor scram".to_string()),
        EventKind::TankRuptured { tank_id } => Some(format!("tank '{tank_id}' ruptured")),
        EventKind::BrownoutUnrecoverable { bus_id } => {
            Some(format!("unrecoverable brownout on bus '{bus_id}'"))
        }
        EventKind::GroundImpact { speed_m_s, .. } => {
            Some(format!("ground impact at {speed_m_s:.1} m/s"))
        }
        EventKind::CoolantFreeze { loop_id } => Some(format!("coolant loop '{loop_id}' froze")),
        EventKind::CoolantBoil { loop_id } => Some(format!("coolant loop '{loop_id}' boiled")),
        _ => None,
    }
}

/// Seed state for every subsystem at construction (spec §6 "Persisted state
/// layout" describes the same shape this restores from). Any id absent from
/// a map falls back to a config-derived or otherwise sensible default rather
/// than failing construction — callers building a fresh vehicle need not
/// enumerate every tank, bottle, or thermal component by hand.
#[derive(Debug, Clone)]
pub struct InitialState {
    pub position_m: (f64, f64, f64),
    pub velocity_m_s: (f64, f64, f64),
    /// Raw (w, x, y, z); renormalized (or reset to identity) on load.
    pub attitude: (f64, f64, f64, f64),
    pub tank_fuel_kg: HashMap<String, f64>,
    pub tank_pressurant_kg: HashMap<String, f64>,
    pub tank_temperature_k: HashMap<String, f64>,
    pub bottle_moles: HashMap<String, f64>,
    pub bottle_temperature_k: HashMap<String, f64>,
    pub reactor_temperature_k: f64,
    pub battery_charge_kwh: f64,
    pub thermal_temperature_k: HashMap<String, f64>,
    pub coolant_loop_1_temperature_k: f64,
    pub coolant_loop_2_temperature_k: f64,
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState {
            position_m: (0.0, 0.0, 0.0),
            velocity_m_s: (0.0, 0.0, 0.0),
            attitude: (1.0, 0.0, 0.0, 0.0),
            tank_fuel_kg: HashMap::new(),
            tank_pressurant_kg: HashMap::new(),
            tank_temperature_k: HashMap::new(),
            bottle_moles: HashMap::new(),
            bottle_temperature_k: HashMap::new(),
            reactor_temperature_k: 290.0,
            battery_charge_kwh: 0.0,
            thermal_temperature_k: HashMap::new(),
            coolant_loop_1_temperature_k: 290.0,
            coolant_loop_2_temperature_k: 290.0,
        }
    }
}

/// Deterministic fixed-timestep simulation core (spec §4.12, §5). Owns every
/// subsystem; the host drives it exclusively through [`Orchestrator::enqueue`]
/// and [`Orchestrator::tick`].
#[derive(Debug)]
pub struct Orchestrator {
    config: SimulationConfig,
    elapsed_s: f64,
    pub(crate) physics: RigidBody,
    pub(crate) fuel: FuelSystem,
    pub(crate) gas: GasSystem,
    pub(crate) electrical: ElectricalSystem,
    pub(crate) thermal: ThermalSystem,
    pub(crate) coolant: CoolantSystem,
    pub(crate) engine: MainEngine,
    pub(crate) rcs: RcsCluster,
    pub(crate) flight_control: FlightControl,
    pub(crate) events: EventLog,

    commanded_throttle: f64,
    commanded_gimbal_rad: (f64, f64),

    /// Fuel subsystem's reported center of mass, used by RCS one step before
    /// fuel runs (spec §4.12 steps 5/6) and by physics in the same tick once
    /// fuel has produced this tick's value.
    last_fuel_com_m: Vector3<f64>,
    /// Reactor heat last successfully reported by electrical, held over for
    /// the tick electrical returns `BrownoutUnrecoverable` and cannot report
    /// a fresh value (spec §4.4, §4.12 step 3).
    last_reactor_heat_w: f64,
    /// Coolant absorption from the previous tick, fed to thermal since
    /// coolant runs one step after thermal (spec §4.12 steps 8/9).
    last_coolant_absorbed_w: HeatInputs,
    /// Coolant pump electrical draw from the previous tick, folded into
    /// electrical's house load since coolant runs after electrical (spec
    /// §4.12 steps 3/9).
    last_coolant_pump_load_kw: f64,
    /// Thermal's "engine" component temperature from the previous tick, fed
    /// back as the engine's chamber temperature for this tick's overtemp
    /// check (spec §4.7) since thermal runs after the engine (§4.12 steps
    /// 4/8). Falls back to the engine's own last-reported value when no
    /// "engine" thermal component is configured.
    last_engine_chamber_temperature_k: f64,

    pending: PendingCommands,
}

impl Orchestrator {
    pub fn new(config: SimulationConfig, initial: InitialState) -> Result<Self, ConfigError> {
        config.validate()?;

        let fuel = FuelSystem::new(config.fuel.clone(), |id| TankInitialState {
            fuel_mass_kg: initial.tank_fuel_kg.get(id).copied().unwrap_or(0.0),
            pressurant_mass_kg: initial.tank_pressurant_kg.get(id).copied().unwrap_or(0.0),
            temperature_k: initial
                .tank_temperature_k
                .get(id)
                .copied()
                .unwrap_or(config.fuel.compartment_temperature_k),
        })?;

        let gas = GasSystem::new(config.gas.clone(), |id| InitialBottleState {
            moles: initial.bottle_moles.get(id).copied().unwrap_or(0.0),
            temperature_k: initial.bottle_temperature_k.get(id).copied().unwrap_or(290.0),
        })?;

        let electrical = ElectricalSystem::new(
            config.electrical.clone(),
            initial.reactor_temperature_k,
            initial.battery_charge_kwh,
        )?;

        let thermal = ThermalSystem::new(config.thermal.clone(), |id| {
            initial.thermal_temperature_k.get(id).copied().unwrap_or(290.0)
        })?;

        let coolant = CoolantSystem::new(
            config.coolant.clone(),
            initial.coolant_loop_1_temperature_k,
            initial.coolant_loop_2_temperature_k,
        )?;

        let engine = MainEngine::new(config.engine.clone())?;
        let rcs = RcsCluster::new(config.rcs.clone())?;
        let flight_control = FlightControl::new(config.flight_control);

        // The rigid body's initial propellant mass is authoritative from the
        // fuel subsystem's own tanks, not a separately specified figure —
        // the two can never disagree this way.
        let initial_propellant_mass_kg = fuel.total_propellant_mass_kg();

        let attitude = math::unit_quat_from_raw(Vector4::new(
            initial.attitude.0,
            initial.attitude.1,
            initial.attitude.2,
            initial.attitude.3,
        ));

        let physics = RigidBody::new(
            config.physics.clone(),
            Vector3::new(initial.position_m.0, initial.position_m.1, initial.position_m.2),
            Vector3::new(initial.velocity_m_s.0, initial.velocity_m_s.1, initial.velocity_m_s.2),
            attitude,
            initial_propellant_mass_kg,
            config.planet.mass_kg,
            config.planet.radius_m,
        )?;

        let events = EventLog::new(config.max_events);

        let last_engine_chamber_temperature_k = thermal
            .component("engine")
            .map(|c| c.temperature_k)
            .unwrap_or(engine.chamber_temperature_k);

        log::info!(
            "orchestrator constructed: dt={:.3}s, max_events={}",
            config.dt_s,
            config.max_events
        );

        Ok(Orchestrator {
            config,
            elapsed_s: 0.0,
            physics,
            fuel,
            gas,
            electrical,
            thermal,
            coolant,
            engine,
            rcs,
            flight_control,
            events,
            commanded_throttle: 0.0,
            commanded_gimbal_rad: (0.0, 0.0),
            last_fuel_com_m: Vector3::zeros(),
            last_reactor_heat_w: 0.0,
            last_coolant_absorbed_w: HeatInputs::new(),
            last_coolant_pump_load_kw: 0.0,
            last_engine_chamber_temperature_k,
            pending: PendingCommands::default(),
        })
    }

    /// Validates and applies or buffers one command (spec §4.12 step 2, §6).
    /// Persistent set-points are stored directly and re-supplied to flight
    /// control every tick; edge-triggered requests are buffered until the
    /// next tick starts; direct mutators apply immediately.
    pub fn enqueue(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::SetMainEngineThrottle(throttle) => {
                self.commanded_throttle = throttle.clamp(0.0, 1.0);
                Ok(())
            }
            Command::SetGimbal { pitch_rad, yaw_rad } => {
                let limit = self.engine.max_gimbal_rad();
                self.commanded_gimbal_rad = (pitch_rad.clamp(-limit, limit), yaw_rad.clamp(-limit, limit));
                Ok(())
            }
            Command::IgniteMainEngine => {
                if self.engine.status != EngineStatus::Off {
                    return Err(CommandError::IllegalStateTransition("engine is not off"));
                }
                self.pending.ignite_engine = true;
                Ok(())
            }
            Command::ShutdownMainEngine => {
                if self.engine.status != EngineStatus::Running {
                    return Err(CommandError::IllegalStateTransition("engine is not running"));
                }
                self.pending.shutdown_engine = true;
                Ok(())
            }
            Command::ActivateRcsGroup(name) => {
                if !self.rcs.has_group(&name) {
                    return Err(CommandError::UnknownIdentifier(name));
                }
                self.pending.activate_rcs_groups.push(name);
                Ok(())
            }
            Command::DeactivateRcsGroup(name) => {
                if !self.rcs.has_group(&name) {
                    return Err(CommandError::UnknownIdentifier(name));
                }
                self.pending.deactivate_rcs_groups.push(name);
                Ok(())
            }
            Command::SetSasMode(mode) => {
                self.pending.set_sas_mode = Some(mode);
                Ok(())
            }
            Command::SetAutopilotMode(mode) => {
                self.pending.set_autopilot_mode = Some(mode);
                Ok(())
            }
            Command::SetTargetAltitude(altitude_m) => {
                self.pending.set_target_altitude_m = Some(altitude_m);
                Ok(())
            }
            Command::SetTargetVerticalSpeed(vertical_speed_m_s) => {
                self.pending.set_target_vertical_speed_m_s = Some(vertical_speed_m_s);
                Ok(())
            }
            Command::StartReactor => self
                .electrical
                .reactor
                .start()
                .map_err(|_| CommandError::IllegalStateTransition("reactor has not cooled enough to reset")),
            Command::ScramReactor => {
                let mut events = Vec::new();
                self.electrical.reactor.scram(&mut events);
                let time_s = self.elapsed_s;
                self.push_events(events, time_s);
                Ok(())
            }
            Command::SetCoolantPump { loop_id, on } => self
                .coolant
                .set_pump(&loop_id, on)
                .map_err(|_| CommandError::UnknownIdentifier(loop_id)),
            Command::SetCircuitBreaker { consumer_id, enabled } => self
                .electrical
                .set_breaker(&consumer_id, enabled)
                .map_err(|_| CommandError::UnknownIdentifier(consumer_id)),
        }
    }

    fn push_events(&mut self, events: Vec<EventKind>, time_s: f64) {
        for kind in events {
            if let Some(message) = critical_event_message(&kind) {
                warn!("t={time_s:.1}s {message}");
            }
            self.events.push(time_s, kind);
        }
    }

    fn altitude_m(&self) -> f64 {
        self.physics.state.position_m.norm() - self.config.planet.radius_m
    }

    fn vertical_speed_m_s(&self) -> f64 {
        let r_hat = math::safe_normalize(self.physics.state.position_m);
        self.physics.state.velocity_m_s.dot(&r_hat)
    }

    /// Prograde/radial/normal directions derived from the current orbital
    /// state, for SAS's orbit-relative hold modes (spec §4.10).
    fn orbit_frame(&self) -> OrbitFrame {
        let position = self.physics.state.position_m;
        let velocity = self.physics.state.velocity_m_s;
        OrbitFrame {
            velocity_direction: math::safe_normalize(velocity),
            radial_direction: math::safe_normalize(position),
            normal_direction: math::safe_normalize(position.cross(&velocity)),
        }
    }

    /// Translates a signed axis command into activation/deactivation of the
    /// canonical rotation-group pair for that axis (spec §4.8/§4.10); groups
    /// the vehicle does not configure are silently tolerated.
    fn apply_rcs_axis_command(&mut self, value: f64, positive_group: &str, negative_group: &str) {
        if value > RCS_AXIS_COMMAND_EPSILON {
            let _ = self.rcs.activate_group(positive_group);
            let _ = self.rcs.deactivate_group(negative_group);
        } else if value < -RCS_AXIS_COMMAND_EPSILON {
            let _ = self.rcs.activate_group(negative_group);
            let _ = self.rcs.deactivate_group(positive_group);
        } else {
            let _ = self.rcs.deactivate_group(positive_group);
            let _ = self.rcs.deactivate_group(negative_group);
        }
    }

    /// Advances the simulation exactly one `dt_s` tick in the strict order
    /// spec §4.12 mandates, and publishes a fresh snapshot.
    pub fn tick(&mut self) -> Snapshot {
        let dt = self.config.dt_s;
        let tick_time_s = self.elapsed_s + dt;

        // Step 1: atomic swap of the pending command buffer.
        let pending = self.pending.take();

        // Step 2: flight control.
        let fc_commands = FlightControlCommands {
            manual_throttle: Some(self.commanded_throttle),
            manual_gimbal_rad: Some(self.commanded_gimbal_rad),
            ignite_engine: pending.ignite_engine,
            shutdown_engine: pending.shutdown_engine,
            activate_rcs_groups: pending.activate_rcs_groups,
            deactivate_rcs_groups: pending.deactivate_rcs_groups,
            set_sas_mode: pending.set_sas_mode,
            set_autopilot_mode: pending.set_autopilot_mode,
            set_target_altitude_m: pending.set_target_altitude_m,
            set_target_vertical_speed_m_s: pending.set_target_vertical_speed_m_s,
        };
        let orbit = self.orbit_frame();
        let autopilot_inputs = AutopilotInputs {
            altitude_m: self.altitude_m(),
            vertical_speed_m_s: self.vertical_speed_m_s(),
            max_thrust_n: self.engine.max_thrust_n(),
            total_mass_kg: self.physics.total_mass_kg(),
            local_gravity_m_s2: self.physics.local_gravity_m_s2(),
        };
        let fc_outputs = self.flight_control.tick(
            &fc_commands,
            self.physics.state.attitude,
            self.physics.state.angular_velocity_rad_s,
            &orbit,
            &autopilot_inputs,
            dt,
        );
        self.push_events(fc_outputs.events, tick_time_s);

        // Step 3: electrical.
        let house_load_kw = self.last_coolant_pump_load_kw;
        let (reactor_heat_w, electrical_events) = match self.electrical.update(dt, house_load_kw) {
            Ok(outputs) => {
                self.last_reactor_heat_w = outputs.reactor_heat_w;
                (outputs.reactor_heat_w, outputs.events)
            }
            Err(ElectricalError::BrownoutUnrecoverable(bus_id)) => {
                (self.last_reactor_heat_w, vec![EventKind::BrownoutUnrecoverable { bus_id }])
            }
            Err(_) => (self.last_reactor_heat_w, Vec::new()),
        };
        self.push_events(electrical_events, tick_time_s);

        // Step 4: main engine. Chamber temperature comes from thermal's
        // "engine" component as of the end of last tick (thermal itself
        // runs at step 8, so this tick's value isn't available yet).
        self.engine.chamber_temperature_k = self.last_engine_chamber_temperature_k;
        let engine_commands = EngineCommands {
            ignite: fc_outputs.ignite_engine,
            shutdown: fc_outputs.shutdown_engine,
            throttle: fc_outputs.throttle.unwrap_or(0.0),
            gimbal_pitch_rad: fc_outputs.gimbal_rad.map(|(p, _)| p).unwrap_or(0.0),
            gimbal_yaw_rad: fc_outputs.gimbal_rad.map(|(_, y)| y).unwrap_or(0.0),
        };
        let engine_tank_id = self.engine.fuel_tank_id().to_string();
        let engine_propellant_available = self
            .fuel
            .tank(&engine_tank_id)
            .map(|t| t.fuel_mass_kg > 0.0 && !t.ruptured)
            .unwrap_or(false);
        let mut engine_outputs = self.engine.tick(&engine_commands, engine_propellant_available, dt);
        self.push_events(std::mem::take(&mut engine_outputs.events), tick_time_s);

        // Step 5: RCS.
        for name in &fc_outputs.activate_rcs_groups {
            let _ = self.rcs.activate_group(name);
        }
        for name in &fc_outputs.deactivate_rcs_groups {
            let _ = self.rcs.deactivate_group(name);
        }
        let axis = fc_outputs.rcs_axis_command;
        self.apply_rcs_axis_command(axis.x, "pitch_up", "pitch_down");
        self.apply_rcs_axis_command(axis.y, "yaw_left", "yaw_right");
        self.apply_rcs_axis_command(axis.z, "roll_cw", "roll_ccw");

        let rcs_tank_id = self.rcs.fuel_tank_id().to_string();
        let rcs_propellant_available = self
            .fuel
            .tank(&rcs_tank_id)
            .map(|t| t.fuel_mass_kg > 0.0 && !t.ruptured)
            .unwrap_or(false);
        let mut rcs_outputs = self.rcs.tick(self.last_fuel_com_m, rcs_propellant_available, dt);
        self.push_events(std::mem::take(&mut rcs_outputs.events), tick_time_s);

        // Step 6: fuel satisfies both draws, updates masses/CoM.
        let engine_delivered_kg = self
            .fuel
            .draw(&engine_tank_id, engine_outputs.propellant_requested_kg)
            .unwrap_or(0.0);
        MainEngine::scale_for_delivered_propellant(
            &mut engine_outputs,
            engine_outputs.propellant_requested_kg,
            engine_delivered_kg,
        );

        let rcs_delivered_kg = self
            .fuel
            .draw(&rcs_tank_id, rcs_outputs.propellant_requested_kg)
            .unwrap_or(0.0);
        let rcs_ratio = if rcs_outputs.propellant_requested_kg > 0.0 {
            (rcs_delivered_kg / rcs_outputs.propellant_requested_kg).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let rcs_force_body_n = rcs_outputs.force_body_n * rcs_ratio;
        let rcs_torque_body_nm = rcs_outputs.torque_body_nm * rcs_ratio;

        let fuel_outputs = self.fuel.update(dt);
        self.last_fuel_com_m = fuel_outputs.center_of_mass_m;
        self.push_events(fuel_outputs.events, tick_time_s);

        // Step 7: compressed gas. `heat_delta_j` is always zero in the
        // current regulator model (no ambient exchange beyond withdrawal
        // cooling), so there is nothing to fold into thermal yet.
        let _gas_outputs = self.gas.update(dt);

        // Step 8: thermal. Reactor heat uses this tick's just-computed
        // value; coolant absorption uses last tick's, since coolant has not
        // run yet this tick.
        let mut heat_inputs = HeatInputs::new();
        heat_inputs.insert("engine".to_string(), engine_outputs.heat_output_w);
        heat_inputs.insert("reactor".to_string(), reactor_heat_w);
        let thermal_outputs = self.thermal.update(&heat_inputs, &self.last_coolant_absorbed_w, dt);
        self.last_engine_chamber_temperature_k = self
            .thermal
            .component("engine")
            .map(|c| c.temperature_k)
            .unwrap_or(self.last_engine_chamber_temperature_k);
        self.push_events(thermal_outputs.events, tick_time_s);

        // Step 9: coolant.
        let mut component_temps = HashMap::new();
        for component in self.thermal.components() {
            component_temps.insert(component.spec.id.clone(), component.temperature_k);
        }
        let coolant_outputs = self.coolant.update(&component_temps, dt);
        self.last_coolant_absorbed_w = coolant_outputs.absorbed_w;
        self.last_coolant_pump_load_kw =
            coolant_outputs.pump_electrical_load_w.values().sum::<f64>() / 1000.0;
        self.push_events(coolant_outputs.events, tick_time_s);

        // Step 10: physics integration. `pre_tick_state` is the last-known-good
        // state (spec §7 "numerical pathologies are implementation defects");
        // if integration produces a NaN/Inf component we pin the vehicle back
        // to it rather than publish a corrupted snapshot.
        let pre_tick_state = self.physics.state.clone();
        let physics_inputs = PhysicsInputs {
            force_body_n: engine_outputs.force_body_n + rcs_force_body_n,
            torque_body_nm: engine_outputs.torque_body_nm + rcs_torque_body_nm,
            propellant_delta_kg: engine_delivered_kg + rcs_delivered_kg,
        };
        let physics_outputs = self.physics.tick(&physics_inputs, dt);
        let physics_outputs = if self.physics.state.is_finite() {
            physics_outputs
        } else {
            debug_assert!(false, "physics state went non-finite at t={tick_time_s:.3}s");
            log::warn!(
                "t={tick_time_s:.1}s physics integration produced a non-finite state, pinning last-known-good state"
            );
            self.physics.state = pre_tick_state;
            self.physics.current_outputs()
        };
        self.push_events(physics_outputs.events, tick_time_s);

        // Step 11: event log already appended incrementally above; advance
        // simulation time and publish the snapshot.
        self.elapsed_s = tick_time_s;

        let trajectory = navigation::predict_trajectory(
            self.physics.state.position_m,
            self.physics.state.velocity_m_s,
            &self.config.planet,
            &self.config.navigation,
        );
        let total_mass_kg = self.physics.total_mass_kg();
        let local_gravity_m_s2 = self.physics.local_gravity_m_s2();
        let delta_v_remaining_m_s = navigation::delta_v_remaining_m_s(
            total_mass_kg,
            self.physics.dry_mass_kg(),
            self.engine.isp_exhaust_velocity_m_s(),
        );
        let twr = navigation::thrust_to_weight_ratio(self.engine.max_thrust_n(), total_mass_kg, local_gravity_m_s2);
        let suicide_burn_margin = self.config.flight_control.autopilot.suicide_burn_margin;
        let suicide = navigation::suicide_burn(
            physics_outputs.altitude_m,
            physics_outputs.vertical_speed_m_s,
            self.engine.max_thrust_n(),
            total_mass_kg,
            local_gravity_m_s2,
            suicide_burn_margin,
        );
        let time_until_burn_s = if physics_outputs.vertical_speed_m_s < 0.0 {
            Some((physics_outputs.altitude_m - suicide.burn_altitude_m) / physics_outputs.vertical_speed_m_s.abs())
        } else {
            None
        };
        let navigation_snapshot = NavigationSnapshot {
            trajectory,
            delta_v_remaining_m_s,
            twr,
            burn_altitude_m: suicide.burn_altitude_m,
            time_until_burn_s,
            should_burn: suicide.should_burn,
        };

        snapshot::build(
            self,
            physics_outputs.euler_angles_rad,
            physics_outputs.altitude_m,
            physics_outputs.speed_m_s,
            physics_outputs.vertical_speed_m_s,
            navigation_snapshot,
        )
    }

    fn to_state(&self) -> OrchestratorState {
        OrchestratorState {
            config: self.config.clone(),
            elapsed_s: self.elapsed_s,
            physics: self.physics.clone(),
            fuel: self.fuel.clone(),
            gas: self.gas.clone(),
            electrical: self.electrical.clone(),
            thermal: self.thermal.clone(),
            coolant: self.coolant.clone(),
            engine: self.engine.clone(),
            rcs: self.rcs.clone(),
            flight_control: self.flight_control.clone(),
            events: self.events.clone(),
            commanded_throttle: self.commanded_throttle,
            commanded_gimbal_rad: self.commanded_gimbal_rad,
            last_fuel_com_m: self.last_fuel_com_m,
            last_reactor_heat_w: self.last_reactor_heat_w,
            last_coolant_absorbed_w: self.last_coolant_absorbed_w.clone(),
            last_coolant_pump_load_kw: self.last_coolant_pump_load_kw,
            last_engine_chamber_temperature_k: self.last_engine_chamber_temperature_k,
        }
    }

    fn from_state(state: OrchestratorState) -> Self {
        Orchestrator {
            config: state.config,
            elapsed_s: state.elapsed_s,
            physics: state.physics,
            fuel: state.fuel,
            gas: state.gas,
            electrical: state.electrical,
            thermal: state.thermal,
            coolant: state.coolant,
            engine: state.engine,
            rcs: state.rcs,
            flight_control: state.flight_control,
            events: state.events,
            commanded_throttle: state.commanded_throttle,
            commanded_gimbal_rad: state.commanded_gimbal_rad,
            last_fuel_com_m: state.last_fuel_com_m,
            last_reactor_heat_w: state.last_reactor_heat_w,
            last_coolant_absorbed_w: state.last_coolant_absorbed_w,
            last_coolant_pump_load_kw: state.last_coolant_pump_load_kw,
            last_engine_chamber_temperature_k: state.last_engine_chamber_temperature_k,
            pending: PendingCommands::default(),
        }
    }

    /// Serializes the full orchestrator state into a versioned envelope
    /// (spec §6 "Persisted state layout"). The pending-command buffer is not
    /// persisted — it is drained at the start of every tick and carries no
    /// meaning between process lifetimes.
    pub fn save(&self) -> Result<String, PersistenceError> {
        PersistedState::wrap(self.to_state()).to_json()
    }

    /// Restores an orchestrator from a previously saved envelope, rejecting
    /// any schema version mismatch (spec §6).
    pub fn load(json: &str) -> Result<Self, PersistenceError> {
        let state = PersistedState::<OrchestratorState>::from_json(json)?;
        Ok(Self::from_state(state))
    }
}

/// On-disk shape of an [`Orchestrator`] (spec §6). Mirrors every field that
/// carries state across a save/restore cycle; the pending-command buffer is
/// deliberately excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub config: SimulationConfig,
    pub elapsed_s: f64,
    pub physics: RigidBody,
    pub fuel: FuelSystem,
    pub gas: GasSystem,
    pub electrical: ElectricalSystem,
    pub thermal: ThermalSystem,
    pub coolant: CoolantSystem,
    pub engine: MainEngine,
    pub rcs: RcsCluster,
    pub flight_control: FlightControl,
    pub events: EventLog,
    pub commanded_throttle: f64,
    pub commanded_gimbal_rad: (f64, f64),
    pub last_fuel_com_m: Vector3<f64>,
    pub last_reactor_heat_w: f64,
    pub last_coolant_absorbed_w: HeatInputs,
    pub last_coolant_pump_load_kw: f64,
    pub last_engine_chamber_temperature_k: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coolant::{CoolantConfig, LoopSpec};
    use crate::electrical::{BatteryConfig, BusSpec, ConsumerSpec, ElectricalConfig, ReactorConfig};
    use crate::engine::EngineConfig;
    use crate::flight_control::autopilot::{AutopilotConfig, AutopilotMode};
    use crate::flight_control::pid::PidGains;
    use crate::flight_control::sas::{SasConfig, SasMode};
    use crate::flight_control::FlightControlConfig;
    use crate::fuel::{FuelConfig, TankRole, TankSpec};
    use crate::gas::GasConfig;
    use crate::physics::PhysicsConfig;
    use crate::rcs::{GroupSpec, RcsConfig, ThrusterSpec};
    use crate::thermal::{ConductanceTable, ThermalComponentSpec, ThermalConfig};

    /// A fully-specified, single-engine vehicle used by every orchestrator
    /// test: two symmetric main tanks, one RCS tank, one reactor/battery/bus
    /// set, a two-component thermal network, and stock PID tuning matching
    /// the defaults table.
    fn stock_config() -> SimulationConfig {
        let pid = |kp: f64, ki: f64, kd: f64, integral_limit: f64, output_max: f64| PidGains {
            kp,
            ki,
            kd,
            integral_limit,
            output_max,
        };

        SimulationConfig {
            dt_s: 0.1,
            max_events: 256,
            planet: crate::config::PlanetConfig::default(),
            fuel: FuelConfig {
                tanks: vec![
                    TankSpec {
                        id: "main-port".to_string(),
                        role: TankRole::Main,
                        capacity_kg: 1_500.0,
                        volume_m3: 1.8,
                        position_m: (0.0, -1.0, 0.0),
                        propellant_density_kg_m3: 1000.0,
                        pressurant_molar_mass_kg_mol: 0.004,
                        structural_limit_pa: 5.0e6,
                        rupture_threshold_pa: 4.0e6,
                        thermal_tau_s: 120.0,
                    },
                    TankSpec {
                        id: "main-starboard".to_string(),
                        role: TankRole::Main,
                        capacity_kg: 1_500.0,
                        volume_m3: 1.8,
                        position_m: (0.0, 1.0, 0.0),
                        propellant_density_kg_m3: 1000.0,
                        pressurant_molar_mass_kg_mol: 0.004,
                        structural_limit_pa: 5.0e6,
                        rupture_threshold_pa: 4.0e6,
                        thermal_tau_s: 120.0,
                    },
                    TankSpec {
                        id: "rcs-1".to_string(),
                        role: TankRole::Rcs,
                        capacity_kg: 100.0,
                        volume_m3: 0.15,
                        position_m: (0.0, 0.0, 0.0),
                        propellant_density_kg_m3: 1000.0,
                        pressurant_molar_mass_kg_mol: 0.004,
                        structural_limit_pa: 5.0e6,
                        rupture_threshold_pa: 4.0e6,
                        thermal_tau_s: 120.0,
                    },
                ],
                compartment_temperature_k: 290.0,
            },
            gas: GasConfig::default(),
            electrical: ElectricalConfig {
                reactor: ReactorConfig {
                    max_output_kw: 10.0,
                    heat_per_kw_generated_w: 20.0,
                },
                battery: BatteryConfig { capacity_kwh: 5.0 },
                bus_a: BusSpec {
                    id: "A".to_string(),
                    capacity_kw: 6.0,
                    consumers: vec![ConsumerSpec {
                        id: "avionics".to_string(),
                        priority: 8,
                        base_w: 200.0,
                        max_w: 200.0,
                        essential: true,
                    }],
                },
                bus_b: BusSpec {
                    id: "B".to_string(),
                    capacity_kw: 6.0,
                    consumers: vec![],
                },
                emergency_bus: BusSpec {
                    id: "emergency".to_string(),
                    capacity_kw: 1.0,
                    consumers: vec![],
                },
            },
            thermal: ThermalConfig {
                components: vec![
                    ThermalComponentSpec {
                        id: "engine".to_string(),
                        mass_kg: 50.0,
                        specific_heat_j_kg_k: 500.0,
                        warning_threshold_k: 800.0,
                        baseline_heat_w: 0.0,
                    },
                    ThermalComponentSpec {
                        id: "reactor".to_string(),
                        mass_kg: 80.0,
                        specific_heat_j_kg_k: 450.0,
                        warning_threshold_k: 1200.0,
                        baseline_heat_w: 0.0,
                    },
                ],
                conductance: ConductanceTable::new(vec![]),
            },
            coolant: CoolantConfig {
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
                    assigned_components: vec!["reactor".to_string()],
                },
            },
            engine: EngineConfig {
                isp_s: 311.0,
                max_thrust_n: 45_000.0,
                max_gimbal_rad: 0.1,
                inefficient_heat_fraction: 0.05,
                exhaust_velocity_m_s: 3050.0,
                health_decay_per_s: 0.0001,
                mount_offset_m: (0.0, 0.0, -1.0),
                fuel_tank_id: "main-port".to_string(),
            },
            rcs: RcsConfig {
                thrusters: vec![ThrusterSpec {
                    id: "t-trans-fwd".to_string(),
                    position_m: (0.0, 0.0, 0.5),
                    thrust_direction: (1.0, 0.0, 0.0),
                    max_thrust_n: 100.0,
                    exhaust_velocity_m_s: 2200.0,
                }],
                groups: vec![GroupSpec {
                    name: "translate_+x".to_string(),
                    thruster_ids: vec!["t-trans-fwd".to_string()],
                }],
                fuel_tank_id: "rcs-1".to_string(),
            },
            physics: PhysicsConfig {
                dry_mass_kg: 5_050.0,
                inertia_diagonal_kgm2: (4000.0, 4000.0, 2000.0),
            },
            navigation: crate::config::NavigationConfig::default(),
            flight_control: FlightControlConfig {
                sas: SasConfig {
                    attitude: pid(1.5, 0.05, 0.5, 2.0, 1.0),
                    rate_damping: pid(2.0, 0.0, 0.3, 0.0, 1.0),
                },
                autopilot: AutopilotConfig {
                    altitude: pid(0.05, 0.001, 0.2, 10.0, 1.0),
                    vertical_speed: pid(0.8, 0.1, 0.15, 5.0, 1.0),
                    suicide_burn_margin: 1.15,
                },
            },
        }
    }

    fn stock_orchestrator_at_altitude(altitude_m: f64, vertical_speed_m_s: f64) -> Orchestrator {
        let config = stock_config();
        let mut initial = InitialState {
            position_m: (0.0, 0.0, config.planet.radius_m + altitude_m),
            velocity_m_s: (0.0, 0.0, vertical_speed_m_s),
            ..InitialState::default()
        };
        initial.tank_fuel_kg.insert("main-port".to_string(), 700.0);
        initial.tank_fuel_kg.insert("main-starboard".to_string(), 700.0);
        initial.tank_fuel_kg.insert("rcs-1".to_string(), 50.0);
        Orchestrator::new(config, initial).unwrap()
    }

    #[test]
    fn scenario_b_reactor_startup_reaches_online_once() {
        let mut orch = stock_orchestrator_at_altitude(10_000.0, 0.0);
        orch.enqueue(Command::StartReactor).unwrap();

        let mut online_events = 0;
        let mut last = orch.tick();
        for _ in 1..310 {
            last = orch.tick();
            online_events += last
                .events
                .iter()
                .filter(|e| matches!(e.kind, EventKind::ReactorOnline))
                .count();
        }

        assert_eq!(online_events, 1);
        assert_eq!(last.electrical.reactor_status, "online");
        assert!(last.electrical.reactor_output_kw > 0.0);
    }

    #[test]
    fn scenario_c_hover_stabilizes_vertical_speed() {
        let mut orch = stock_orchestrator_at_altitude(1_000.0, -5.0);
        orch.enqueue(Command::IgniteMainEngine).unwrap();
        for _ in 0..20 {
            orch.tick();
        }
        orch.enqueue(Command::SetAutopilotMode(AutopilotMode::Hover)).unwrap();

        let mut snapshot = orch.tick();
        for _ in 0..199 {
            snapshot = orch.tick();
        }

        assert!(
            snapshot.physics.vertical_speed_m_s.abs() < 0.5,
            "vertical speed should settle near zero, got {}",
            snapshot.physics.vertical_speed_m_s
        );
    }

    #[test]
    fn scenario_d_suicide_burn_limits_impact_speed() {
        let mut orch = stock_orchestrator_at_altitude(5_000.0, -60.0);
        orch.enqueue(Command::SetAutopilotMode(AutopilotMode::SuicideBurn)).unwrap();

        let mut impact_speed = None;
        for _ in 0..2_000 {
            let snapshot = orch.tick();
            if snapshot
                .events
                .iter()
                .any(|e| matches!(e.kind, EventKind::GroundImpact { .. }))
            {
                impact_speed = Some(snapshot.physics.speed_m_s);
                break;
            }
        }

        let impact_speed = impact_speed.expect("vehicle should reach the surface within the test horizon");
        assert!(impact_speed < 10.0, "impact speed too high: {impact_speed}");
    }

    #[test]
    fn scenario_e_brownout_sheds_lowest_priority_consumer() {
        let mut config = stock_config();
        config.electrical.bus_a.capacity_kw = 6.0;
        config.electrical.bus_a.consumers = vec![
            ConsumerSpec { id: "c-3".to_string(), priority: 3, base_w: 0.0, max_w: 2000.0, essential: false },
            ConsumerSpec { id: "c-5".to_string(), priority: 5, base_w: 0.0, max_w: 2000.0, essential: false },
            ConsumerSpec { id: "c-7".to_string(), priority: 7, base_w: 0.0, max_w: 1000.0, essential: false },
            ConsumerSpec { id: "c-9".to_string(), priority: 9, base_w: 0.0, max_w: 1000.0, essential: false },
        ];
        config.electrical.reactor.max_output_kw = 4.0;

        let mut initial = InitialState {
            position_m: (0.0, 0.0, config.planet.radius_m + 10_000.0),
            ..InitialState::default()
        };
        initial.tank_fuel_kg.insert("main-port".to_string(), 700.0);
        initial.tank_fuel_kg.insert("main-starboard".to_string(), 700.0);
        let mut orch = Orchestrator::new(config, initial).unwrap();
        orch.enqueue(Command::StartReactor).unwrap();

        let mut shed_consumer = None;
        for _ in 0..320 {
            let snapshot = orch.tick();
            for event in &snapshot.events {
                if let EventKind::Brownout { shed, .. } = &event.kind {
                    assert_eq!(shed.len(), 1);
                    shed_consumer = Some(shed[0].clone());
                }
            }
        }

        assert_eq!(shed_consumer.as_deref(), Some("c-3"));
    }

    #[test]
    fn command_sequence_is_deterministic() {
        let mut a = stock_orchestrator_at_altitude(2_000.0, -10.0);
        let mut b = stock_orchestrator_at_altitude(2_000.0, -10.0);

        let run = |orch: &mut Orchestrator| -> Snapshot {
            orch.enqueue(Command::IgniteMainEngine).unwrap();
            let mut last = orch.tick();
            for tick in 1..500 {
                if tick == 30 {
                    orch.enqueue(Command::SetMainEngineThrottle(0.6)).unwrap();
                }
                if tick == 100 {
                    orch.enqueue(Command::SetSasMode(SasMode::Stability)).unwrap();
                }
                last = orch.tick();
            }
            last
        };

        let snapshot_a = run(&mut a);
        let snapshot_b = run(&mut b);
        assert_eq!(snapshot_a, snapshot_b);
    }

    #[test]
    fn save_restore_round_trips_and_continues_identically() {
        let mut orch = stock_orchestrator_at_altitude(3_000.0, -8.0);
        orch.enqueue(Command::IgniteMainEngine).unwrap();
        for _ in 0..50 {
            orch.tick();
        }

        let saved = orch.save().unwrap();
        let mut restored = Orchestrator::load(&saved).unwrap();

        let next_original = orch.tick();
        let next_restored = restored.tick();
        assert_eq!(next_original, next_restored);
    }

    #[test]
    fn unknown_rcs_group_is_rejected() {
        let mut orch = stock_orchestrator_at_altitude(1_000.0, 0.0);
        assert_eq!(
            orch.enqueue(Command::ActivateRcsGroup("nonexistent".to_string())),
            Err(CommandError::UnknownIdentifier("nonexistent".to_string()))
        );
    }

    #[test]
    #[should_panic(expected = "non-finite")]
    fn non_finite_physics_state_triggers_debug_guard() {
        let mut orch = stock_orchestrator_at_altitude(1_000.0, 0.0);
        orch.physics.state.velocity_m_s.z = f64::NAN;
        orch.tick();
    }

    #[test]
    fn igniting_engine_twice_is_rejected() {
        let mut orch = stock_orchestrator_at_altitude(1_000.0, 0.0);
        orch.enqueue(Command::IgniteMainEngine).unwrap();
        assert_eq!(
            orch.enqueue(Command::IgniteMainEngine),
            Err(CommandError::IllegalStateTransition("engine is not off"))
        );
    }
}
