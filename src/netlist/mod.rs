//! Netlist input.
//!
//! A netlist is the JSON form written by the schematic editor: an array of
//! parts, each `[type, coords, properties, connections]`.
//!
//! ```json
//! [
//!   ["g", [100, 200, 0], {}, ["gnd"]],
//!   ["v", [50, 100, 0], {"name": "Vin", "value": "sin(0,1,1k)"}, ["in", "gnd"]],
//!   ["r", [80, 100, 0], {"name": "R1", "r": "1k"}, ["in", "out"]],
//!   ["c", [120, 100, 0], {"name": "C1", "c": "100n"}, ["out", "gnd"]]
//! ]
//! ```
//!
//! Coordinates are display metadata and are dropped on load. Property
//! values stay text; numbers are interpreted with [`parse_number`] when
//! the circuit is built, so `"4.7k"` and `4700` are both accepted.

mod number;

pub use number::parse_number;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, SimError};

/// Part type, from the first element of a netlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// `g`: names a ground node
    Ground,
    /// `w`: wire, node identity only
    Wire,
    /// `r`, property `r`
    Resistor,
    /// `c`, property `c`
    Capacitor,
    /// `l`, property `l`
    Inductor,
    /// `v`, property `value`
    VoltageSource,
    /// `i`, property `value`
    CurrentSource,
    /// `d`, properties `area` and `type`
    Diode,
    /// `o`: terminals +, -, out, reference; property `A`
    OpAmp,
    /// `n`: terminals d, g, s; property `W/L`
    NFet,
    /// `p`: terminals d, g, s; property `W/L`
    PFet,
    /// `a`: current probe, a 0 V source
    Ammeter,
    /// `view`, `s` (scope probe) and `L` (label)
    Ignored,
}

impl PartKind {
    /// Look up a part type tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "g" => Self::Ground,
            "w" => Self::Wire,
            "r" => Self::Resistor,
            "c" => Self::Capacitor,
            "l" => Self::Inductor,
            "v" => Self::VoltageSource,
            "i" => Self::CurrentSource,
            "d" => Self::Diode,
            "o" => Self::OpAmp,
            "n" => Self::NFet,
            "p" => Self::PFet,
            "a" => Self::Ammeter,
            "view" | "s" | "L" => Self::Ignored,
            _ => return None,
        })
    }

    /// True for parts that become a circuit device.
    pub fn is_device(&self) -> bool {
        !matches!(self, Self::Ground | Self::Wire | Self::Ignored)
    }

    /// Number of connections the part needs.
    pub fn terminal_count(&self) -> usize {
        match self {
            Self::Ignored => 0,
            Self::Ground => 1,
            Self::NFet | Self::PFet => 3,
            Self::OpAmp => 4,
            _ => 2,
        }
    }
}

/// One part of a netlist.
#[derive(Debug, Clone, PartialEq)]
pub struct NetlistEntry {
    pub kind: PartKind,
    pub properties: BTreeMap<String, String>,
    pub connections: Vec<String>,
}

impl NetlistEntry {
    /// Create an entry with no properties.
    pub fn new<S: Into<String>>(kind: PartKind, connections: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            connections: connections.into_iter().map(Into::into).collect(),
        }
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Get a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The `name` property, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.property("name").filter(|n| !n.is_empty())
    }

    fn from_value(index: usize, value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| SimError::invalid_netlist(format!("entry {} is not an array", index)))?;
        let tag = items.first().and_then(Value::as_str).ok_or_else(|| {
            SimError::invalid_netlist(format!("entry {} has no part type", index))
        })?;
        let kind = PartKind::from_tag(tag).ok_or_else(|| {
            SimError::invalid_netlist(format!("entry {} has unknown part type '{}'", index, tag))
        })?;

        if kind == PartKind::Ignored {
            return Ok(Self::new(kind, Vec::<String>::new()));
        }
        if items.len() < 4 {
            return Err(SimError::invalid_netlist(format!(
                "entry {} ('{}') needs type, coordinates, properties and connections",
                index, tag
            )));
        }

        let properties = match &items[2] {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| scalar_text(index, v).map(|text| (k.clone(), text)))
                .collect::<Result<BTreeMap<_, _>>>()?,
            Value::Null => BTreeMap::new(),
            _ => {
                return Err(SimError::invalid_netlist(format!(
                    "entry {} properties are not an object",
                    index
                )))
            }
        };
        let connections = items[3]
            .as_array()
            .ok_or_else(|| {
                SimError::invalid_netlist(format!("entry {} connections are not an array", index))
            })?
            .iter()
            .map(|v| scalar_text(index, v))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            kind,
            properties,
            connections,
        })
    }
}

fn scalar_text(index: usize, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(SimError::invalid_netlist(format!(
            "entry {} has a non-scalar value {}",
            index, other
        ))),
    }
}

/// An ordered list of netlist entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Netlist {
    entries: Vec<NetlistEntry>,
}

impl Netlist {
    /// Create an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the schematic editor's JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let parts = value
            .as_array()
            .ok_or_else(|| SimError::invalid_netlist("netlist is not an array"))?;
        let entries = parts
            .iter()
            .enumerate()
            .map(|(i, v)| NetlistEntry::from_value(i, v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Read and parse a JSON netlist file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SimError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Append an entry.
    pub fn push(&mut self, entry: NetlistEntry) {
        self.entries.push(entry);
    }

    /// Append an entry, builder style.
    pub fn with(mut self, entry: NetlistEntry) -> Self {
        self.push(entry);
        self
    }

    /// All entries in order.
    pub fn entries(&self) -> &[NetlistEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let json = r#"[
            ["g", [0, 0, 0], {}, ["gnd"]],
            ["r", [1, 2, 0], {"name": "R1", "r": 4700}, ["a", "gnd"]],
            ["o", [0, 0, 0], {"name": "U1", "A": "1e5"}, ["p", "n", "o", "gnd"]],
            ["view", 0, 0, 2, null, null, null]
        ]"#;
        let netlist = Netlist::from_json(json).unwrap();
        let entries = netlist.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind, PartKind::Ground);
        assert_eq!(entries[1].property("r"), Some("4700"));
        assert_eq!(entries[1].name(), Some("R1"));
        assert_eq!(entries[2].connections.len(), 4);
        assert_eq!(entries[3].kind, PartKind::Ignored);
    }

    #[test]
    fn test_builder_matches_json() {
        let built = Netlist::new()
            .with(NetlistEntry::new(PartKind::Ground, ["0"]))
            .with(NetlistEntry::new(PartKind::Resistor, ["a", "0"]).with_property("r", "1k"));
        let parsed =
            Netlist::from_json(r#"[["g", [], {}, ["0"]], ["r", [], {"r": "1k"}, ["a", "0"]]]"#)
                .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            Netlist::from_json("{}"),
            Err(SimError::InvalidNetlist { .. })
        ));
        assert!(matches!(
            Netlist::from_json(r#"[["zz", [], {}, []]]"#),
            Err(SimError::InvalidNetlist { .. })
        ));
        assert!(matches!(
            Netlist::from_json(r#"[["r", [], {"r": "1k"}]]"#),
            Err(SimError::InvalidNetlist { .. })
        ));
        assert!(matches!(Netlist::from_json("[1,"), Err(SimError::Json(_))));
    }

    #[test]
    fn test_unnamed_entry() {
        let entry = NetlistEntry::new(PartKind::Capacitor, ["a", "b"]).with_property("name", "");
        assert_eq!(entry.name(), None);
    }
}
