//! Error taxonomy (spec §7), as `thiserror` enums in the style of the
//! teacher's `parameters::Error` / `telemetry::TelemetryError`.
//!
//! `ConfigError` is fatal-at-construction. `CommandError` surfaces to the
//! caller of the command API unchanged (spec §6). The per-subsystem errors
//! (`FuelError`, `GasError`, `EngineError`, `ElectricalError`) are internal —
//! they are consumed by the orchestrator, which turns the "internal" spec §7
//! classes (`ResourceExhausted`, `PhysicalLimit`) into events rather than
//! propagating them further.

use thiserror::Error;

/// Raised at construction time when a configuration bundle is out of range.
/// Corresponds to spec §7's `ConfigurationInvalid`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    MustBePositive { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    MustBeNonNegative { field: &'static str, value: f64 },

    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("tank id '{0}' is duplicated")]
    DuplicateTankId(String),

    #[error("consumer id '{0}' is duplicated")]
    DuplicateConsumerId(String),

    #[error("conductance matrix is not symmetric between '{a}' and '{b}'")]
    AsymmetricConductance { a: String, b: String },

    #[error("max_events must be at least 1")]
    ZeroCapacityEventLog,
}

/// Errors returned synchronously from the command API (spec §6/§7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("value {value} for '{field}' is outside the accepted range [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("illegal state transition: {0}")]
    IllegalStateTransition(&'static str),
}

/// Internal fuel-subsystem errors (spec §4.2).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FuelError {
    #[error("tank '{0}' not found")]
    TankNotFound(String),

    #[error("tank '{tank_id}' ruptured at {pressure_pa:.1} Pa (limit {limit_pa:.1} Pa)")]
    TankRuptured {
        tank_id: String,
        pressure_pa: f64,
        limit_pa: f64,
    },
}

/// Internal compressed-gas subsystem errors (spec §4.3).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GasError {
    #[error("bottle '{0}' not found")]
    BottleNotFound(String),
}

/// Internal electrical subsystem errors (spec §4.4).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElectricalError {
    #[error("bus '{0}' not found")]
    BusNotFound(String),

    #[error("consumer '{0}' not found")]
    ConsumerNotFound(String),

    #[error("essential demand exceeds generation and battery reserve on bus '{0}'")]
    BrownoutUnrecoverable(String),

    #[error("reactor has not held below cooldown temperature long enough to reset")]
    ReactorNotCooled,
}

/// Internal main-engine errors (spec §4.7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine is not in a state that accepts this command: {0}")]
    IllegalState(&'static str),
}

/// Internal coolant-subsystem errors (spec §4.6).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoolantError {
    #[error("coolant loop '{0}' not found")]
    LoopNotFound(String),
}

/// Internal RCS errors (spec §4.8).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RcsError {
    #[error("unknown thruster group '{0}'")]
    UnknownGroup(String),
}

/// Persistence errors (spec §6 "Persisted state layout").
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("schema version mismatch: persisted {persisted}, expected {expected}")]
    SchemaVersionMismatch { persisted: u32, expected: u32 },

    #[error("failed to (de)serialize persisted state")]
    Codec(#[from] serde_json::Error),
}
