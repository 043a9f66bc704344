//! Analysis results.
//!
//! All three serialize to a flat name-keyed JSON object: node names map
//! to voltages, `I(<source>)` to voltage source branch currents, and the
//! reserved keys `_time_` and `_frequencies_` hold the sweep variable.

use std::collections::BTreeMap;

use serde::Serialize;

/// Operating point: one value per node and per voltage source current.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DcResult {
    pub values: BTreeMap<String, f64>,
}

impl DcResult {
    /// Value of a node voltage or `I(<source>)` current.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Transient waveforms sampled at the accepted time points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransientResult {
    #[serde(rename = "_time_")]
    pub time: Vec<f64>,
    #[serde(flatten)]
    pub traces: BTreeMap<String, Vec<f64>>,
}

impl TransientResult {
    /// Waveform of a node voltage or `I(<source>)` current.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.traces.get(name).map(Vec::as_slice)
    }

    /// Value of `name` at the last time point.
    pub fn final_value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.last().copied())
    }
}

/// Small-signal response over a frequency sweep.
///
/// Each node has a magnitude trace under its own name and an unwrapped
/// phase trace, in degrees, under `<name>_phase`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcResult {
    #[serde(rename = "_frequencies_")]
    pub frequencies: Vec<f64>,
    #[serde(flatten)]
    pub traces: BTreeMap<String, Vec<f64>>,
}

impl AcResult {
    /// Magnitude response of a node.
    pub fn magnitude(&self, node: &str) -> Option<&[f64]> {
        self.traces.get(node).map(Vec::as_slice)
    }

    /// Phase response of a node in degrees.
    pub fn phase(&self, node: &str) -> Option<&[f64]> {
        self.traces.get(&phase_key(node)).map(Vec::as_slice)
    }
}

pub(crate) fn phase_key(node: &str) -> String {
    format!("{}_phase", node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_serializes_flat() {
        let mut values = BTreeMap::new();
        values.insert("out".to_string(), 2.5);
        values.insert("I(V1)".to_string(), -1e-3);
        let json = serde_json::to_value(DcResult { values }).unwrap();
        assert_eq!(json["out"], 2.5);
        assert_eq!(json["I(V1)"], -1e-3);
    }

    #[test]
    fn test_transient_time_key() {
        let mut result = TransientResult {
            time: vec![0.0, 1.0],
            ..Default::default()
        };
        result.traces.insert("a".to_string(), vec![0.0, 3.0]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["_time_"][1], 1.0);
        assert_eq!(json["a"][1], 3.0);
        assert_eq!(result.final_value("a"), Some(3.0));
    }

    #[test]
    fn test_ac_phase_lookup() {
        let mut result = AcResult::default();
        result.traces.insert("out".to_string(), vec![1.0]);
        result.traces.insert(phase_key("out"), vec![-45.0]);
        assert_eq!(result.phase("out"), Some(&[-45.0][..]));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("_frequencies_").is_some());
        assert_eq!(json["out_phase"][0], -45.0);
    }
}
