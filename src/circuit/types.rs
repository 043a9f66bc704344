//! Core types for circuit representation.

use std::fmt;

/// Reference to an unknown of the linear system, or to ground.
///
/// Ground never gets a row or column in any matrix, so it is represented
/// by the absence of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Option<usize>);

impl NodeId {
    /// The ground node.
    pub const GROUND: NodeId = NodeId(None);

    /// Reference the unknown at `index`.
    pub fn unknown(index: usize) -> Self {
        NodeId(Some(index))
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0.is_none()
    }

    /// Row/column of this node in the system, `None` for ground.
    pub fn index(&self) -> Option<usize> {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => write!(f, "GND"),
            Some(i) => write!(f, "N{}", i),
        }
    }
}

/// What kind of quantity an unknown holds.
///
/// Fixed when the unknown is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Node potential (rows of this type are KCL equations)
    Voltage,
    /// Branch current of an inductor, voltage source or op-amp output
    Current,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_has_no_index() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.index(), None);
        assert_eq!(NodeId::unknown(3).index(), Some(3));
        assert_eq!(NodeId::unknown(3).to_string(), "N3");
        assert_eq!(NodeId::GROUND.to_string(), "GND");
    }
}
