//! Electrical subsystem (spec §4.4): reactor generation, battery buffering,
//! bus distribution with priority load-shed, and per-consumer breakers.

use crate::errors::{ConfigError, ElectricalError};
use crate::events::EventKind;
use serde::{Deserialize, Serialize};

/// Reactor ramp-up time to full output once starting (spec §4.4).
const REACTOR_STARTUP_S: f64 = 30.0;
/// Reactor overtemp threshold that triggers an automatic scram (spec §3).
const REACTOR_SCRAM_TEMP_K: f64 = 900.0;
/// Temperature below which a scrammed reactor is eligible to cool to offline.
const REACTOR_COOLDOWN_TEMP_K: f64 = 400.0;
/// Time the reactor must hold below [`REACTOR_COOLDOWN_TEMP_K`] before an
/// external reset is allowed to bring it back online (spec §4.4).
const REACTOR_COOLDOWN_HOLD_S: f64 = 60.0;
/// Fraction of bus capacity above which brownout shedding engages (spec §4.4).
const BROWNOUT_THRESHOLD_FRACTION: f64 = 0.95;
/// Battery charge rate cap from generation surplus (spec §4.4).
const BATTERY_CHARGE_RATE_KW: f64 = 1.0;
/// Battery state-of-charge fraction below which the emergency bus may
/// activate (spec §4.4).
const EMERGENCY_SOC_THRESHOLD: f64 = 0.10;
/// Duration an overcurrent must persist before a breaker trips (spec §4.4).
const BREAKER_TRIP_HOLD_S: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactorStatus {
    Offline,
    Starting,
    Online,
    Scrammed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactorConfig {
    pub max_output_kw: f64,
    pub heat_per_kw_generated_w: f64,
}

impl ReactorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output_kw <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "reactor.max_output_kw",
                value: self.max_output_kw,
            });
        }
        Ok(())
    }
}

/// Reactor lifecycle (spec §3): offline → starting (30 s) → online; scram
/// from online when temperature exceeds [`REACTOR_SCRAM_TEMP_K`]; no path out
/// of scrammed except an external reset (`start_reactor` while scrammed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reactor {
    config: ReactorConfig,
    pub status: ReactorStatus,
    pub output_kw: f64,
    pub temperature_k: f64,
    pub health: f64,
    starting_elapsed_s: f64,
    cooldown_elapsed_s: f64,
}

impl Reactor {
    pub fn new(config: ReactorConfig, temperature_k: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Reactor {
            config,
            status: ReactorStatus::Offline,
            output_kw: 0.0,
            temperature_k,
            health: 1.0,
            starting_elapsed_s: 0.0,
            cooldown_elapsed_s: 0.0,
        })
    }

    /// `start_reactor` command (spec §6). Offline → starting; scrammed →
    /// offline (the external reset the spec's design notes call for).
    pub fn start(&mut self) -> Result<(), ElectricalError> {
        match self.status {
            ReactorStatus::Offline => {
                self.status = ReactorStatus::Starting;
                self.starting_elapsed_s = 0.0;
                Ok(())
            }
            ReactorStatus::Scrammed => {
                if self.temperature_k < REACTOR_COOLDOWN_TEMP_K
                    && self.cooldown_elapsed_s >= REACTOR_COOLDOWN_HOLD_S
                {
                    self.status = ReactorStatus::Offline;
                    Ok(())
                } else {
                    Err(ElectricalError::ReactorNotCooled)
                }
            }
            ReactorStatus::Starting | ReactorStatus::Online => Ok(()),
        }
    }

    /// `scram_reactor` command: immediate, from any status.
    pub fn scram(&mut self, events: &mut Vec<EventKind>) {
        if self.status != ReactorStatus::Scrammed {
            self.status = ReactorStatus::Scrammed;
            self.output_kw = 0.0;
            self.cooldown_elapsed_s = 0.0;
            events.push(EventKind::Scram);
        }
    }

    pub fn update(&mut self, dt: f64, events: &mut Vec<EventKind>) -> f64 {
        match self.status {
            ReactorStatus::Offline => {
                self.output_kw = 0.0;
            }
            ReactorStatus::Starting => {
                self.starting_elapsed_s += dt;
                let fraction = (self.starting_elapsed_s / REACTOR_STARTUP_S).clamp(0.0, 1.0);
                self.output_kw = self.config.max_output_kw * fraction;
                self.temperature_k += 5.0 * fraction * dt;
                if self.starting_elapsed_s >= REACTOR_STARTUP_S {
                    self.status = ReactorStatus::Online;
                    self.output_kw = self.config.max_output_kw;
                    events.push(EventKind::ReactorOnline);
                }
            }
            ReactorStatus::Online => {
                self.output_kw = self.config.max_output_kw * self.health;
                if self.temperature_k > REACTOR_SCRAM_TEMP_K {
                    self.scram(events);
                }
            }
            ReactorStatus::Scrammed => {
                self.output_kw = 0.0;
                if self.temperature_k < REACTOR_COOLDOWN_TEMP_K {
                    self.cooldown_elapsed_s += dt;
                } else {
                    self.cooldown_elapsed_s = 0.0;
                }
            }
        }
        self.output_kw * self.config.heat_per_kw_generated_w
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub capacity_kwh: f64,
}

impl BatteryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_kwh <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "battery.capacity_kwh",
                value: self.capacity_kwh,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battery {
    config: BatteryConfig,
    pub charge_kwh: f64,
    pub health: f64,
}

impl Battery {
    pub fn new(config: BatteryConfig, charge_kwh: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Battery {
            charge_kwh: charge_kwh.clamp(0.0, config.capacity_kwh),
            health: 1.0,
            config,
        })
    }

    pub fn capacity_kwh(&self) -> f64 {
        self.config.capacity_kwh * self.health
    }

    pub fn state_of_charge(&self) -> f64 {
        if self.capacity_kwh() <= 0.0 {
            0.0
        } else {
            self.charge_kwh / self.capacity_kwh()
        }
    }

    /// Draws `kwh_requested` of energy, clamped to available charge. Returns
    /// energy actually delivered.
    fn draw_kwh(&mut self, kwh_requested: f64) -> f64 {
        let delivered = kwh_requested.min(self.charge_kwh).max(0.0);
        self.charge_kwh -= delivered;
        delivered
    }

    /// Charges from surplus generation, capped at [`BATTERY_CHARGE_RATE_KW`].
    fn charge(&mut self, surplus_kw: f64, dt: f64) {
        let rate_kw = surplus_kw.min(BATTERY_CHARGE_RATE_KW).max(0.0);
        self.charge_kwh = (self.charge_kwh + rate_kw * dt / 3600.0).min(self.capacity_kwh());
    }
}

/// A single electrical load (spec §3 "Consumers list").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    pub id: String,
    pub priority: u32,
    pub base_w: f64,
    pub max_w: f64,
    pub essential: bool,
}

impl ConsumerSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_w < self.base_w {
            return Err(ConfigError::OutOfRange {
                field: "consumer.max_w",
                value: self.max_w,
                min: self.base_w,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    pub spec: ConsumerSpec,
    pub current_w: f64,
    pub powered: bool,
    pub breaker_enabled: bool,
    overcurrent_elapsed_s: f64,
    pub breaker_tripped: bool,
}

impl Consumer {
    fn from_spec(spec: ConsumerSpec) -> Self {
        Consumer {
            current_w: spec.base_w,
            powered: true,
            breaker_enabled: true,
            overcurrent_elapsed_s: 0.0,
            breaker_tripped: false,
            spec,
        }
    }

    /// Requested demand before shedding or breaker action (spec §4.4).
    fn requested_w(&self) -> f64 {
        if self.breaker_tripped || !self.breaker_enabled {
            0.0
        } else if self.powered {
            self.spec.max_w
        } else {
            0.0
        }
    }

    fn tick_breaker(&mut self, dt: f64, events: &mut Vec<EventKind>) {
        if self.breaker_tripped || !self.breaker_enabled {
            self.current_w = 0.0;
            return;
        }
        if self.current_w > self.spec.max_w {
            self.overcurrent_elapsed_s += dt;
            if self.overcurrent_elapsed_s > BREAKER_TRIP_HOLD_S {
                self.breaker_tripped = true;
                self.current_w = 0.0;
                events.push(EventKind::BreakerTripped {
                    consumer_id: self.spec.id.clone(),
                });
            }
        } else {
            self.overcurrent_elapsed_s = 0.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSpec {
    pub id: String,
    pub capacity_kw: f64,
    pub consumers: Vec<ConsumerSpec>,
}

impl BusSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_kw <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "bus.capacity_kw",
                value: self.capacity_kw,
            });
        }
        for consumer in &self.consumers {
            consumer.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    capacity_kw: f64,
    pub load_kw: f64,
    pub enabled: bool,
    pub consumers: Vec<Consumer>,
}

impl Bus {
    pub fn capacity_kw(&self) -> f64 {
        self.capacity_kw
    }

    fn from_spec(spec: BusSpec) -> Self {
        Bus {
            id: spec.id,
            capacity_kw: spec.capacity_kw,
            load_kw: 0.0,
            enabled: true,
            consumers: spec.consumers.into_iter().map(Consumer::from_spec).collect(),
        }
    }

    fn recompute_load(&mut self) {
        self.load_kw = self.consumers.iter().map(|c| c.current_w).sum::<f64>() / 1000.0;
    }

    /// Brownout resolution (spec §4.4): while load exceeds
    /// [`BROWNOUT_THRESHOLD_FRACTION`] of capacity, disable the
    /// lowest-priority non-essential consumer and recompute.
    fn resolve_brownout(&mut self, events: &mut Vec<EventKind>) {
        let mut shed = Vec::new();
        let threshold_kw = self.capacity_kw * BROWNOUT_THRESHOLD_FRACTION;

        loop {
            self.recompute_load();
            if self.load_kw <= threshold_kw {
                break;
            }
            let victim = self
                .consumers
                .iter_mut()
                .filter(|c| !c.spec.essential && c.powered)
                .min_by_key(|c| c.spec.priority);
            match victim {
                Some(c) => {
                    c.powered = false;
                    c.current_w = 0.0;
                    shed.push(c.spec.id.clone());
                }
                None => break,
            }
        }

        if !shed.is_empty() {
            events.push(EventKind::Brownout {
                bus_id: self.id.clone(),
                shed,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalConfig {
    pub reactor: ReactorConfig,
    pub battery: BatteryConfig,
    pub bus_a: BusSpec,
    pub bus_b: BusSpec,
    pub emergency_bus: BusSpec,
}

impl ElectricalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reactor.validate()?;
        self.battery.validate()?;
        self.bus_a.validate()?;
        self.bus_b.validate()?;
        self.emergency_bus.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElectricalOutputs {
    pub reactor_heat_w: f64,
    pub events: Vec<EventKind>,
}

/// Electrical subsystem: reactor, battery, two main buses plus an emergency
/// bus (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricalSystem {
    pub reactor: Reactor,
    pub battery: Battery,
    pub bus_a: Bus,
    pub bus_b: Bus,
    pub emergency_bus: Bus,
}

impl ElectricalSystem {
    pub fn new(
        config: ElectricalConfig,
        reactor_temperature_k: f64,
        battery_charge_kwh: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ElectricalSystem {
            reactor: Reactor::new(config.reactor, reactor_temperature_k)?,
            battery: Battery::new(config.battery, battery_charge_kwh)?,
            bus_a: Bus::from_spec(config.bus_a),
            bus_b: Bus::from_spec(config.bus_b),
            emergency_bus: Bus::from_spec(config.emergency_bus),
        })
    }

    fn bus_mut(&mut self, id: &str) -> Result<&mut Bus, ElectricalError> {
        [&mut self.bus_a, &mut self.bus_b, &mut self.emergency_bus]
            .into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| ElectricalError::BusNotFound(id.to_string()))
    }

    pub fn set_breaker(&mut self, consumer_id: &str, enabled: bool) -> Result<(), ElectricalError> {
        for bus in [&mut self.bus_a, &mut self.bus_b, &mut self.emergency_bus] {
            if let Some(consumer) = bus.consumers.iter_mut().find(|c| c.spec.id == consumer_id) {
                consumer.breaker_enabled = enabled;
                if enabled {
                    consumer.breaker_tripped = false;
                }
                return Ok(());
            }
        }
        Err(ElectricalError::ConsumerNotFound(consumer_id.to_string()))
    }

    /// `house_load_kw` folds in loads the orchestrator tracks outside the
    /// configured consumer lists (coolant pumps, thermal electronics
    /// baseline) into the generation/battery energy balance only — it never
    /// participates in per-bus brownout shedding.
    pub fn update(&mut self, dt: f64, house_load_kw: f64) -> Result<ElectricalOutputs, ElectricalError> {
        let mut events = Vec::new();
        let reactor_heat_w = self.reactor.update(dt, &mut events);

        let mut generation_kw = self.reactor.output_kw;

        for bus in [&mut self.bus_a, &mut self.bus_b] {
            for consumer in &mut bus.consumers {
                consumer.current_w = consumer.requested_w();
                consumer.tick_breaker(dt, &mut events);
            }
            bus.resolve_brownout(&mut events);
        }

        let main_demand_kw = self.bus_a.load_kw + self.bus_b.load_kw + house_load_kw.max(0.0);
        if generation_kw >= main_demand_kw {
            self.battery.charge(generation_kw - main_demand_kw, dt);
            generation_kw = 0.0;
        } else {
            let deficit_kw = main_demand_kw - generation_kw;
            let delivered_kwh = self.battery.draw_kwh(deficit_kw * dt / 3600.0);
            generation_kw += delivered_kwh * 3600.0 / dt.max(1e-9);
        }

        self.bus_a.enabled = generation_kw > 0.0 || main_demand_kw <= self.reactor.output_kw;
        self.bus_b.enabled = self.bus_a.enabled;

        let soc = self.battery.state_of_charge();
        let mains_down = self.reactor.status != ReactorStatus::Online;
        self.emergency_bus.enabled = soc <= EMERGENCY_SOC_THRESHOLD && mains_down;

        if self.emergency_bus.enabled {
            for consumer in &mut self.emergency_bus.consumers {
                consumer.current_w = if consumer.spec.essential {
                    consumer.requested_w()
                } else {
                    0.0
                };
                consumer.tick_breaker(dt, &mut events);
            }
            self.emergency_bus.resolve_brownout(&mut events);

            let essential_demand_kw = self.emergency_bus.load_kw;
            let available_kwh = self.battery.charge_kwh;
            if essential_demand_kw * dt / 3600.0 > available_kwh {
                return Err(ElectricalError::BrownoutUnrecoverable(
                    self.emergency_bus.id.clone(),
                ));
            }
            self.battery.draw_kwh(essential_demand_kw * dt / 3600.0);
        } else {
            for consumer in &mut self.emergency_bus.consumers {
                consumer.current_w = 0.0;
            }
            self.emergency_bus.recompute_load();
        }

        Ok(ElectricalOutputs {
            reactor_heat_w,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_config() -> ElectricalConfig {
        ElectricalConfig {
            reactor: ReactorConfig {
                max_output_kw: 10.0,
                heat_per_kw_generated_w: 20.0,
            },
            battery: BatteryConfig { capacity_kwh: 5.0 },
            bus_a: BusSpec {
                id: "A".to_string(),
                capacity_kw: 6.0,
                consumers: vec![
                    ConsumerSpec {
                        id: "c-low".to_string(),
                        priority: 3,
                        base_w: 0.0,
                        max_w: 2000.0,
                        essential: false,
                    },
                    ConsumerSpec {
                        id: "c-mid".to_string(),
                        priority: 5,
                        base_w: 0.0,
                        max_w: 2000.0,
                        essential: false,
                    },
                    ConsumerSpec {
                        id: "c-high".to_string(),
                        priority: 7,
                        base_w: 0.0,
                        max_w: 1000.0,
                        essential: false,
                    },
                    ConsumerSpec {
                        id: "c-ess".to_string(),
                        priority: 9,
                        base_w: 0.0,
                        max_w: 1000.0,
                        essential: true,
                    },
                ],
            },
            bus_b: BusSpec {
                id: "B".to_string(),
                capacity_kw: 6.0,
                consumers: vec![],
            },
            emergency_bus: BusSpec {
                id: "Emergency".to_string(),
                capacity_kw: 1.0,
                consumers: vec![ConsumerSpec {
                    id: "e-core".to_string(),
                    priority: 1,
                    base_w: 50.0,
                    max_w: 100.0,
                    essential: true,
                }],
            },
        }
    }

    #[test]
    fn reactor_starts_then_comes_online() {
        let mut reactor = Reactor::new(
            ReactorConfig {
                max_output_kw: 10.0,
                heat_per_kw_generated_w: 20.0,
            },
            290.0,
        )
        .unwrap();
        reactor.start().unwrap();
        let mut events = Vec::new();
        for _ in 0..150 {
            reactor.update(0.1, &mut events);
        }
        assert_eq!(reactor.status, ReactorStatus::Online);
        assert!(events.contains(&EventKind::ReactorOnline));
        assert_eq!(
            events.iter().filter(|e| **e == EventKind::ReactorOnline).count(),
            1
        );
    }

    #[test]
    fn reactor_scrams_on_overtemp() {
        let mut reactor = Reactor::new(
            ReactorConfig {
                max_output_kw: 10.0,
                heat_per_kw_generated_w: 20.0,
            },
            950.0,
        )
        .unwrap();
        reactor.status = ReactorStatus::Online;
        let mut events = Vec::new();
        reactor.update(0.1, &mut events);
        assert_eq!(reactor.status, ReactorStatus::Scrammed);
        assert!(events.contains(&EventKind::Scram));
    }

    #[test]
    fn brownout_sheds_lowest_priority_first() {
        let config = stock_config();
        let mut sys = ElectricalSystem::new(config, 290.0, 5.0).unwrap();
        sys.reactor.status = ReactorStatus::Online;
        sys.reactor.output_kw = 4.0;

        for consumer in &mut sys.bus_a.consumers {
            if consumer.spec.id == "c-low" {
                consumer.spec.max_w = 2000.0;
            }
            if consumer.spec.id == "c-mid" {
                consumer.spec.max_w = 2000.0;
            }
            if consumer.spec.id == "c-high" {
                consumer.spec.max_w = 1000.0;
            }
            if consumer.spec.id == "c-ess" {
                consumer.spec.max_w = 1000.0;
            }
        }

        let outputs = sys.update(0.1, 0.0).unwrap();
        let shed_event = outputs
            .events
            .iter()
            .find(|e| matches!(e, EventKind::Brownout { .. }));
        assert!(shed_event.is_some());
        if let Some(EventKind::Brownout { shed, .. }) = shed_event {
            assert_eq!(shed.len(), 1);
            assert_eq!(shed[0], "c-low");
        }
        assert!(sys.bus_a.load_kw <= sys.bus_a.capacity_kw * BROWNOUT_THRESHOLD_FRACTION + 1e-6);
    }

    #[test]
    fn unknown_consumer_breaker_errors() {
        let mut sys = ElectricalSystem::new(stock_config(), 290.0, 5.0).unwrap();
        assert_eq!(
            sys.set_breaker("missing", false),
            Err(ElectricalError::ConsumerNotFound("missing".to_string()))
        );
    }
}
