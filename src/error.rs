//! Error types for the cktlab circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! all error conditions that can occur while loading a netlist, finalizing
//! a circuit and running an analysis.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all cktlab operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Errors ============
    /// A numeric property could not be interpreted
    #[error("Invalid number '{value}' for property '{property}' of '{device}'")]
    InvalidNumber {
        device: String,
        property: String,
        value: String,
    },

    /// A required property is absent
    #[error("Device '{device}' is missing property '{property}'")]
    MissingProperty { device: String, property: String },

    /// Waveform specification could not be interpreted
    #[error("Invalid source specification '{spec}': {message}")]
    InvalidSource { spec: String, message: String },

    /// Malformed netlist entry
    #[error("Invalid netlist: {message}")]
    InvalidNetlist { message: String },

    /// No device is connected to ground
    #[error("Please make at least one connection to ground (inverted T symbol)")]
    MissingGround,

    // ============ Circuit Errors ============
    /// Voltage sources (or a source and a wire) form a loop
    #[error(
        "Circuit has a voltage source loop or a source or current probe shorted by a wire, \
         please remove the source or the wire causing the short"
    )]
    VoltageSourceLoop,

    /// AC analysis excitation names no device
    #[error("AC analysis refers to unknown source '{name}'")]
    UnknownSource { name: String },

    // ============ Simulation Errors ============
    /// Newton-Raphson failed to find the operating point
    #[error("{hint} (no convergence after {iterations} iterations{})", unknown_suffix(.unknown))]
    DcNonConvergence {
        hint: &'static str,
        iterations: usize,
        unknown: Option<String>,
    },

    /// Transient step shrinking hit the minimum step floor
    #[error("Transient analysis stalled at t = {time:.3e}s: time step {step:.3e}s below minimum")]
    TimestepTooSmall { time: f64, step: f64 },

    /// Invalid analysis parameter
    #[error("Invalid analysis parameter: {message}")]
    InvalidAnalysis { message: String },

    // ============ I/O Errors ============
    /// Error reading a netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error decoding or encoding JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn unknown_suffix(unknown: &Option<String>) -> String {
    match unknown {
        Some(name) => format!(", worst unknown '{}'", name),
        None => String::new(),
    }
}

impl SimError {
    /// Create an invalid number error
    pub fn invalid_number(
        device: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidNumber {
            device: device.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Create a missing property error
    pub fn missing_property(device: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingProperty {
            device: device.into(),
            property: property.into(),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create an invalid netlist error
    pub fn invalid_netlist(message: impl Into<String>) -> Self {
        Self::InvalidNetlist {
            message: message.into(),
        }
    }

    /// Create an invalid analysis parameter error
    pub fn invalid_analysis(message: impl Into<String>) -> Self {
        Self::InvalidAnalysis {
            message: message.into(),
        }
    }

    /// True for errors caused by the netlist or circuit structure rather
    /// than by numerical trouble.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::DcNonConvergence { .. } | Self::TimestepTooSmall { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_convergence_message_names_unknown() {
        let err = SimError::DcNonConvergence {
            hint: "Newton Method Failed",
            iterations: 1000,
            unknown: Some("out".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("1000"));
        assert!(msg.contains("'out'"));
        assert!(!err.is_structural());
    }

    #[test]
    fn test_structural_errors() {
        assert!(SimError::MissingGround.is_structural());
        assert!(SimError::VoltageSourceLoop.is_structural());
        assert!(SimError::invalid_number("R1", "r", "abc").to_string().contains("abc"));
    }
}
