//! Egress snapshot (spec §6): a plain, fully-owned DTO tree built fresh each
//! tick from internal subsystem state. Internal `nalgebra` types never cross
//! this boundary directly — vectors become `(x, y, z)` tuples, quaternions
//! become `(w, x, y, z)` tuples, and status enums become lowercase strings —
//! so the wire shape is stable independent of the math library in use.

use crate::navigation::TrajectoryPrediction;
use crate::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};

/// Navigation telemetry (spec §4.11): the pure trajectory prediction plus the
/// standalone analytic quantities (Δv remaining, TWR, suicide-burn) the
/// orchestrator computes fresh each tick without owning any of their state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NavigationSnapshot {
    pub trajectory: TrajectoryPrediction,
    pub delta_v_remaining_m_s: f64,
    pub twr: f64,
    pub burn_altitude_m: f64,
    /// `(altitude - burn_altitude) / |vertical_speed|`, only defined while
    /// descending (spec §4.11).
    pub time_until_burn_s: Option<f64>,
    pub should_burn: bool,
}

fn vec3_tuple(v: nalgebra::Vector3<f64>) -> (f64, f64, f64) {
    (v.x, v.y, v.z)
}

fn quat_tuple(q: nalgebra::UnitQuaternion<f64>) -> (f64, f64, f64, f64) {
    (q.w, q.i, q.j, q.k)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSnapshot {
    pub position_m: (f64, f64, f64),
    pub velocity_m_s: (f64, f64, f64),
    pub attitude: (f64, f64, f64, f64),
    pub angular_velocity_rad_s: (f64, f64, f64),
    pub euler_angles_rad: (f64, f64, f64),
    pub altitude_m: f64,
    pub speed_m_s: f64,
    pub vertical_speed_m_s: f64,
    pub total_mass_kg: f64,
    pub dry_mass_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub id: String,
    pub role: String,
    pub fuel_mass_kg: f64,
    pub ullage_pressure_pa: f64,
    pub temperature_k: f64,
    pub ruptured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSnapshot {
    pub tanks: Vec<TankSnapshot>,
    pub center_of_mass_m: (f64, f64, f64),
    pub total_propellant_mass_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleSnapshot {
    pub id: String,
    pub moles: f64,
    pub temperature_k: f64,
    pub pressure_pa: f64,
    pub regulated_pressure_pa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasSnapshot {
    pub bottles: Vec<BottleSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSnapshot {
    pub id: String,
    pub current_w: f64,
    pub powered: bool,
    pub breaker_tripped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSnapshot {
    pub id: String,
    pub capacity_kw: f64,
    pub load_kw: f64,
    pub enabled: bool,
    pub consumers: Vec<ConsumerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalSnapshot {
    pub reactor_status: String,
    pub reactor_output_kw: f64,
    pub reactor_temperature_k: f64,
    pub battery_charge_kwh: f64,
    pub battery_state_of_charge: f64,
    pub bus_a: BusSnapshot,
    pub bus_b: BusSnapshot,
    pub emergency_bus: BusSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalComponentSnapshot {
    pub id: String,
    pub temperature_k: f64,
    pub overtemp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalSnapshot {
    pub components: Vec<ThermalComponentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolantLoopSnapshot {
    pub id: String,
    pub temperature_k: f64,
    pub pump_active: bool,
    pub flow_rate_l_min: f64,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolantSnapshot {
    pub loop_1: CoolantLoopSnapshot,
    pub loop_2: CoolantLoopSnapshot,
    pub cross_connect_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainEngineSnapshot {
    pub status: String,
    pub throttle: f64,
    pub gimbal_pitch_rad: f64,
    pub gimbal_yaw_rad: f64,
    pub health: f64,
    pub chamber_temperature_k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcsSnapshot {
    pub active_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightControlSnapshot {
    pub sas_mode: String,
    pub autopilot_mode: String,
    pub target_altitude_m: f64,
    pub target_vertical_speed_m_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub time_s: f64,
    pub kind: crate::events::EventKind,
}

/// Top-level egress schema (spec §6): one key per subsystem plus the event
/// log, rebuilt fresh every tick so no internal reference ever escapes the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time_s: f64,
    pub physics: PhysicsSnapshot,
    pub fuel: FuelSnapshot,
    pub gas: GasSnapshot,
    pub electrical: ElectricalSnapshot,
    pub thermal: ThermalSnapshot,
    pub coolant: CoolantSnapshot,
    pub main_engine: MainEngineSnapshot,
    pub rcs: RcsSnapshot,
    pub flight_control: FlightControlSnapshot,
    pub navigation: NavigationSnapshot,
    pub events: Vec<EventSnapshot>,
}

fn tank_role_str(role: crate::fuel::TankRole) -> &'static str {
    match role {
        crate::fuel::TankRole::Main => "main",
        crate::fuel::TankRole::Rcs => "rcs",
    }
}

fn reactor_status_str(status: crate::electrical::ReactorStatus) -> &'static str {
    match status {
        crate::electrical::ReactorStatus::Offline => "offline",
        crate::electrical::ReactorStatus::Starting => "starting",
        crate::electrical::ReactorStatus::Online => "online",
        crate::electrical::ReactorStatus::Scrammed => "scrammed",
    }
}

fn engine_status_str(status: crate::engine::EngineStatus) -> &'static str {
    match status {
        crate::engine::EngineStatus::Off => "off",
        crate::engine::EngineStatus::Igniting => "igniting",
        crate::engine::EngineStatus::Running => "running",
        crate::engine::EngineStatus::ShutdownCooldown => "shutdown_cooldown",
    }
}

fn sas_mode_str(mode: crate::flight_control::sas::SasMode) -> &'static str {
    use crate::flight_control::sas::SasMode;
    match mode {
        SasMode::Off => "off",
        SasMode::Stability => "stability",
        SasMode::AttitudeHold => "attitude_hold",
        SasMode::Prograde => "prograde",
        SasMode::Retrograde => "retrograde",
        SasMode::RadialIn => "radial_in",
        SasMode::RadialOut => "radial_out",
        SasMode::Normal => "normal",
        SasMode::AntiNormal => "anti_normal",
    }
}

fn autopilot_mode_str(mode: crate::flight_control::autopilot::AutopilotMode) -> &'static str {
    use crate::flight_control::autopilot::AutopilotMode;
    match mode {
        AutopilotMode::Off => "off",
        AutopilotMode::AltitudeHold => "altitude_hold",
        AutopilotMode::VerticalSpeedHold => "vertical_speed_hold",
        AutopilotMode::Hover => "hover",
        AutopilotMode::SuicideBurn => "suicide_burn",
    }
}

fn bus_snapshot(bus: &crate::electrical::Bus) -> BusSnapshot {
    BusSnapshot {
        id: bus.id.clone(),
        capacity_kw: bus.capacity_kw(),
        load_kw: bus.load_kw,
        enabled: bus.enabled,
        consumers: bus
            .consumers
            .iter()
            .map(|c| ConsumerSnapshot {
                id: c.spec.id.clone(),
                current_w: c.current_w,
                powered: c.powered,
                breaker_tripped: c.breaker_tripped,
            })
            .collect(),
    }
}

fn coolant_loop_snapshot(l: &crate::coolant::CoolantLoop) -> CoolantLoopSnapshot {
    CoolantLoopSnapshot {
        id: l.spec.id.clone(),
        temperature_k: l.temperature_k,
        pump_active: l.pump_active,
        flow_rate_l_min: l.flow_rate_l_min,
        disabled: l.disabled,
    }
}

/// Builds this tick's egress snapshot from the orchestrator's current state
/// (spec §4.12 step 11). Takes the trajectory prediction and last-tick
/// physics outputs as parameters since those are derived quantities the
/// orchestrator already computed this tick rather than state it owns.
pub(crate) fn build(
    orchestrator: &Orchestrator,
    euler_angles_rad: (f64, f64, f64),
    altitude_m: f64,
    speed_m_s: f64,
    vertical_speed_m_s: f64,
    navigation: NavigationSnapshot,
) -> Snapshot {
    let body = &orchestrator.physics;
    let fuel = &orchestrator.fuel;
    let gas = &orchestrator.gas;
    let electrical = &orchestrator.electrical;
    let thermal = &orchestrator.thermal;
    let coolant = &orchestrator.coolant;
    let engine = &orchestrator.engine;
    let rcs = &orchestrator.rcs;
    let flight_control = &orchestrator.flight_control;

    Snapshot {
        time_s: orchestrator.elapsed_s,
        physics: PhysicsSnapshot {
            position_m: vec3_tuple(body.state.position_m),
            velocity_m_s: vec3_tuple(body.state.velocity_m_s),
            attitude: quat_tuple(body.state.attitude),
            angular_velocity_rad_s: vec3_tuple(body.state.angular_velocity_rad_s),
            euler_angles_rad,
            altitude_m,
            speed_m_s,
            vertical_speed_m_s,
            total_mass_kg: body.total_mass_kg(),
            dry_mass_kg: body.dry_mass_kg(),
        },
        fuel: FuelSnapshot {
            tanks: fuel
                .tanks()
                .map(|t| TankSnapshot {
                    id: t.spec.id.clone(),
                    role: tank_role_str(t.spec.role).to_string(),
                    fuel_mass_kg: t.fuel_mass_kg,
                    ullage_pressure_pa: t.ullage_pressure_pa,
                    temperature_k: t.temperature_k,
                    ruptured: t.ruptured,
                })
                .collect(),
            center_of_mass_m: vec3_tuple(orchestrator.last_fuel_com_m),
            total_propellant_mass_kg: fuel.total_propellant_mass_kg(),
        },
        gas: GasSnapshot {
            bottles: gas
                .bottles()
                .map(|b| BottleSnapshot {
                    id: b.spec.id.clone(),
                    moles: b.moles,
                    temperature_k: b.temperature_k,
                    pressure_pa: b.pressure_pa,
                    regulated_pressure_pa: b.regulated_pressure_pa,
                })
                .collect(),
        },
        electrical: ElectricalSnapshot {
            reactor_status: reactor_status_str(electrical.reactor.status).to_string(),
            reactor_output_kw: electrical.reactor.output_kw,
            reactor_temperature_k: electrical.reactor.temperature_k,
            battery_charge_kwh: electrical.battery.charge_kwh,
            battery_state_of_charge: electrical.battery.state_of_charge(),
            bus_a: bus_snapshot(&electrical.bus_a),
            bus_b: bus_snapshot(&electrical.bus_b),
            emergency_bus: bus_snapshot(&electrical.emergency_bus),
        },
        thermal: ThermalSnapshot {
            components: thermal
                .components()
                .map(|c| ThermalComponentSnapshot {
                    id: c.spec.id.clone(),
                    temperature_k: c.temperature_k,
                    overtemp: c.overtemp,
                })
                .collect(),
        },
        coolant: CoolantSnapshot {
            loop_1: coolant_loop_snapshot(&coolant.loop_1),
            loop_2: coolant_loop_snapshot(&coolant.loop_2),
            cross_connect_open: coolant.cross_connect_open,
        },
        main_engine: MainEngineSnapshot {
            status: engine_status_str(engine.status).to_string(),
            throttle: engine.throttle,
            gimbal_pitch_rad: engine.gimbal_pitch_rad,
            gimbal_yaw_rad: engine.gimbal_yaw_rad,
            health: engine.health,
            chamber_temperature_k: engine.chamber_temperature_k,
        },
        rcs: RcsSnapshot {
            active_groups: rcs.active_groups().map(str::to_string).collect(),
        },
        flight_control: FlightControlSnapshot {
            sas_mode: sas_mode_str(flight_control.sas.mode).to_string(),
            autopilot_mode: autopilot_mode_str(flight_control.autopilot.mode).to_string(),
            target_altitude_m: flight_control.autopilot.target_altitude_m,
            target_vertical_speed_m_s: flight_control.autopilot.target_vertical_speed_m_s,
        },
        navigation,
        events: orchestrator
            .events
            .iter()
            .map(|e| EventSnapshot {
                time_s: e.time_s,
                kind: e.kind.clone(),
            })
            .collect(),
    }
}
