//! Circuit structure.

use std::collections::{BTreeMap, HashMap};

use super::types::{NodeId, NodeType};
use super::validate::check_voltage_source_loops;
use crate::components::{
    Capacitor, Component, CurrentSource, Diode, DiodeKind, Fet, FetType, Inductor, OpAmp,
    Resistor, Source, Stamp, VoltageSource,
};
use crate::error::{Result, SimError};
use crate::netlist::{parse_number, Netlist, NetlistEntry, PartKind};
use crate::solver::{MnaSystem, SimulationConfig, SolverState};

/// Matrices and solver state of a finalized circuit.
#[derive(Debug, Clone)]
pub(crate) struct Workspace {
    pub mna: MnaSystem,
    pub state: SolverState,
}

/// A circuit ready for analysis.
///
/// Unknowns are allocated with [`Circuit::node`]: one per named node and
/// one per branch current of an inductor, voltage source or op-amp. The
/// matrices are built lazily by [`Circuit::finalize`], which every
/// analysis calls first. Adding a device afterwards discards them.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub(crate) config: SimulationConfig,

    /// Mapping from node names to unknowns (ground names map to ground)
    pub(crate) node_map: BTreeMap<String, NodeId>,

    /// Kind of each unknown
    pub(crate) node_types: Vec<NodeType>,

    /// Optional starting value of each unknown
    pub(crate) initial_conditions: Vec<Option<f64>>,

    /// All devices, in insertion order
    pub(crate) devices: Vec<Component>,

    /// Device index by name
    pub(crate) device_map: HashMap<String, usize>,

    /// Indices into `devices` of the voltage sources
    pub(crate) voltage_sources: Vec<usize>,

    /// Indices into `devices` of the current sources
    pub(crate) current_sources: Vec<usize>,

    pub(crate) system: Option<Workspace>,

    /// An operating point is held in the solution vector
    pub(crate) dc_solved: bool,
}

impl Circuit {
    /// Create an empty circuit with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty circuit using `config` for all its analyses.
    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Build a circuit from a netlist.
    pub fn from_netlist(netlist: &Netlist) -> Result<Self> {
        let mut circuit = Self::new();
        circuit.load_netlist(netlist)?;
        Ok(circuit)
    }

    /// Configuration used by this circuit's analyses.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The ground node.
    pub fn gnd_node() -> NodeId {
        NodeId::GROUND
    }

    /// Allocate a new unknown.
    ///
    /// A named voltage unknown can later be found by name and appears in
    /// analysis results. `ic` seeds the solution before the first analysis.
    pub fn node(&mut self, name: Option<&str>, node_type: NodeType, ic: Option<f64>) -> NodeId {
        let id = NodeId::unknown(self.node_types.len());
        if let Some(name) = name {
            self.node_map.insert(name.to_string(), id);
        }
        self.node_types.push(node_type);
        self.initial_conditions.push(ic);
        self.invalidate();
        id
    }

    /// Look up a node by name, allocating a voltage unknown if it is new.
    pub fn node_named(&mut self, name: &str) -> NodeId {
        match self.node_map.get(name) {
            Some(&id) => id,
            None => self.node(Some(name), NodeType::Voltage, None),
        }
    }

    /// Make `name` refer to ground.
    pub fn connect_ground(&mut self, name: &str) {
        self.node_map.insert(name.to_string(), NodeId::GROUND);
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Number of unknowns allocated so far.
    pub fn num_unknowns(&self) -> usize {
        self.node_types.len()
    }

    /// All devices in insertion order.
    pub fn devices(&self) -> &[Component] {
        &self.devices
    }

    /// Find a device by name.
    pub fn device(&self, name: &str) -> Option<&Component> {
        self.device_map.get(name).map(|&i| &self.devices[i])
    }

    /// Current solution vector, once finalized.
    pub fn solution(&self) -> Option<&[f64]> {
        self.system.as_ref().map(|ws| ws.state.solution.as_slice())
    }

    fn invalidate(&mut self) {
        self.system = None;
        self.dc_solved = false;
    }

    fn add_device(&mut self, device: Component) -> usize {
        let index = self.devices.len();
        let name = device.name().to_string();
        if !name.is_empty() && self.device_map.insert(name.clone(), index).is_some() {
            tracing::warn!(name = %name, "two circuit elements share the same name");
        }
        self.devices.push(device);
        self.invalidate();
        index
    }

    /// Add a resistor. A zero resistance becomes a 0 V source.
    pub fn resistor(&mut self, n1: NodeId, n2: NodeId, r: f64, name: &str) -> usize {
        if r == 0.0 {
            return self.voltage_source(n1, n2, Source::constant(0.0), name);
        }
        self.add_device(Component::Resistor(Resistor::new(name, [n1, n2], r)))
    }

    /// Add a capacitor.
    pub fn capacitor(&mut self, n1: NodeId, n2: NodeId, c: f64, name: &str) -> usize {
        self.add_device(Component::Capacitor(Capacitor::new(name, [n1, n2], c)))
    }

    /// Add an inductor with its branch current unknown.
    pub fn inductor(&mut self, n1: NodeId, n2: NodeId, l: f64, name: &str) -> usize {
        let branch = self.node(None, NodeType::Current, None);
        self.add_device(Component::Inductor(Inductor::new(name, [n1, n2], l, branch)))
    }

    /// Add an independent voltage source with its branch current unknown.
    pub fn voltage_source(&mut self, npos: NodeId, nneg: NodeId, source: Source, name: &str) -> usize {
        let branch = self.node(None, NodeType::Current, None);
        let index = self.add_device(Component::VoltageSource(VoltageSource::new(
            name,
            [npos, nneg],
            source,
            branch,
        )));
        self.voltage_sources.push(index);
        index
    }

    /// Add an independent current source.
    pub fn current_source(&mut self, npos: NodeId, nneg: NodeId, source: Source, name: &str) -> usize {
        let index = self.add_device(Component::CurrentSource(CurrentSource::new(
            name,
            [npos, nneg],
            source,
        )));
        self.current_sources.push(index);
        index
    }

    /// Add a diode. Zero-area diodes are discarded.
    pub fn diode(
        &mut self,
        anode: NodeId,
        cathode: NodeId,
        area: f64,
        kind: DiodeKind,
        name: &str,
    ) -> Option<usize> {
        if area == 0.0 {
            tracing::debug!(name, "discarding zero-area diode");
            return None;
        }
        Some(self.add_device(Component::Diode(Diode::new(name, [anode, cathode], area, kind))))
    }

    /// Add an op-amp with its output branch unknown.
    pub fn opamp(
        &mut self,
        np: NodeId,
        nn: NodeId,
        no: NodeId,
        ng: NodeId,
        gain: f64,
        name: &str,
    ) -> usize {
        let branch = self.node(None, NodeType::Current, None);
        self.add_device(Component::OpAmp(OpAmp::new(name, [np, nn, no, ng], gain, branch)))
    }

    /// Add an N-channel FET.
    pub fn nfet(&mut self, d: NodeId, g: NodeId, s: NodeId, ratio: f64, name: &str) -> usize {
        self.add_device(Component::Fet(Fet::new(name, [d, g, s], FetType::N, ratio)))
    }

    /// Add a P-channel FET.
    pub fn pfet(&mut self, d: NodeId, g: NodeId, s: NodeId, ratio: f64, name: &str) -> usize {
        self.add_device(Component::Fet(Fet::new(name, [d, g, s], FetType::P, ratio)))
    }

    /// Add every device of `netlist`.
    ///
    /// Ground parts are resolved first so their node names read as ground
    /// wherever they appear. Wires, probes, labels and view settings only
    /// contribute node names. At least one device must touch ground.
    pub fn load_netlist(&mut self, netlist: &Netlist) -> Result<()> {
        for entry in netlist.entries() {
            if entry.kind == PartKind::Ground {
                if let Some(node) = entry.connections.first() {
                    self.connect_ground(node);
                }
            }
        }

        let mut found_ground = false;
        for (index, entry) in netlist.entries().iter().enumerate() {
            if !entry.kind.is_device() {
                continue;
            }

            let name = match entry.name() {
                Some(name) => name.to_string(),
                None => format!("_{}", index),
            };
            let nodes: Vec<NodeId> = entry
                .connections
                .iter()
                .map(|c| self.node_named(c))
                .collect();
            found_ground |= nodes.iter().any(NodeId::is_ground);

            let terminals = entry.kind.terminal_count();
            if nodes.len() < terminals {
                return Err(SimError::invalid_netlist(format!(
                    "'{}' needs {} connections, found {}",
                    name,
                    terminals,
                    nodes.len()
                )));
            }

            match entry.kind {
                PartKind::Resistor => {
                    let r = number_property(entry, &name, "r")?;
                    self.resistor(nodes[0], nodes[1], r, &name);
                }
                PartKind::Capacitor => {
                    let c = number_property(entry, &name, "c")?;
                    self.capacitor(nodes[0], nodes[1], c, &name);
                }
                PartKind::Inductor => {
                    let l = number_property(entry, &name, "l")?;
                    self.inductor(nodes[0], nodes[1], l, &name);
                }
                PartKind::VoltageSource => {
                    let source = source_property(entry, &name)?;
                    self.voltage_source(nodes[0], nodes[1], source, &name);
                }
                PartKind::CurrentSource => {
                    let source = source_property(entry, &name)?;
                    self.current_source(nodes[0], nodes[1], source, &name);
                }
                PartKind::Diode => {
                    let area = number_property(entry, &name, "area")?;
                    let kind = entry
                        .property("type")
                        .map_or(DiodeKind::Normal, DiodeKind::from_name);
                    self.diode(nodes[0], nodes[1], area, kind, &name);
                }
                PartKind::OpAmp => {
                    let gain = number_property(entry, &name, "A")?;
                    self.opamp(nodes[0], nodes[1], nodes[2], nodes[3], gain, &name);
                }
                PartKind::NFet => {
                    let ratio = number_property(entry, &name, "W/L")?;
                    self.nfet(nodes[0], nodes[1], nodes[2], ratio, &name);
                }
                PartKind::PFet => {
                    let ratio = number_property(entry, &name, "W/L")?;
                    self.pfet(nodes[0], nodes[1], nodes[2], ratio, &name);
                }
                PartKind::Ammeter => {
                    self.voltage_source(nodes[0], nodes[1], Source::constant(0.0), &name);
                }
                PartKind::Ground | PartKind::Wire | PartKind::Ignored => {}
            }
        }

        if !found_ground {
            return Err(SimError::MissingGround);
        }
        tracing::debug!(
            devices = self.devices.len(),
            unknowns = self.node_types.len(),
            "netlist loaded"
        );
        Ok(())
    }

    /// Build the matrices and check the topology. Does nothing if the
    /// circuit is already finalized.
    pub fn finalize(&mut self) -> Result<()> {
        self.split().map(|_| ())
    }

    /// Check whether the matrices are built.
    pub fn is_finalized(&self) -> bool {
        self.system.is_some()
    }

    /// Discard the matrices and solution so the next analysis starts over.
    pub fn reset(&mut self) {
        self.invalidate();
    }

    /// Finalize if needed and hand out the pieces an analysis works on.
    pub(crate) fn split(&mut self) -> Result<(&SimulationConfig, &[Component], &mut Workspace)> {
        let workspace = match self.system.take() {
            Some(ws) => ws,
            None => self.build_workspace()?,
        };
        Ok((&self.config, self.devices.as_slice(), self.system.insert(workspace)))
    }

    fn build_workspace(&self) -> Result<Workspace> {
        let size = self.node_types.len();
        let mut mna = MnaSystem::new(size);
        for device in &self.devices {
            device.load_linear(&mut mna);
        }

        let branches: Vec<usize> = self
            .voltage_sources
            .iter()
            .filter_map(|&i| match &self.devices[i] {
                Component::VoltageSource(v) => v.branch.index(),
                _ => None,
            })
            .collect();
        check_voltage_source_loops(&mna.gl, &branches, self.config.eps)?;

        let state = SolverState::new(&self.node_types, &self.initial_conditions, &self.config);
        tracing::debug!(unknowns = size, devices = self.devices.len(), "circuit finalized");
        Ok(Workspace { mna, state })
    }

    /// Name of unknown `index`: the node name, or `I(<device>)` for a
    /// branch current.
    pub fn unknown_name(&self, index: usize) -> String {
        let id = NodeId::unknown(index);
        if let Some((name, _)) = self.node_map.iter().find(|(_, n)| **n == id) {
            return name.clone();
        }
        self.devices
            .iter()
            .find(|d| branch_of(d) == Some(id))
            .map_or_else(|| format!("#{}", index), |d| format!("I({})", d.name()))
    }

    /// Names and branch unknowns of the voltage sources, in insertion order.
    pub(crate) fn source_branches(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.voltage_sources
            .iter()
            .filter_map(|&i| match &self.devices[i] {
                Component::VoltageSource(v) => Some((v.name.as_str(), v.branch)),
                _ => None,
            })
    }
}

fn branch_of(device: &Component) -> Option<NodeId> {
    match device {
        Component::Inductor(l) => Some(l.branch),
        Component::VoltageSource(v) => Some(v.branch),
        Component::OpAmp(o) => Some(o.branch),
        _ => None,
    }
}

fn number_property(entry: &NetlistEntry, device: &str, property: &str) -> Result<f64> {
    let text = entry
        .property(property)
        .ok_or_else(|| SimError::missing_property(device, property))?;
    parse_number(text).ok_or_else(|| SimError::invalid_number(device, property, text))
}

fn source_property(entry: &NetlistEntry, device: &str) -> Result<Source> {
    let text = entry
        .property("value")
        .ok_or_else(|| SimError::missing_property(device, "value"))?;
    Source::parse(text)
}
