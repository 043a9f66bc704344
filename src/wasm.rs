//! WASM bindings for Cktlab Core.
//!
//! Netlists go in and results come out as JSON strings, matching what the
//! schematic editor already produces and plots.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuitSim } from 'cktlab_core';
//!
//! await init();
//!
//! const sim = new WasmCircuitSim(JSON.stringify(netlist));
//! const op = JSON.parse(sim.dc());
//! const wave = JSON.parse(sim.tran(200, 0, 5e-3, '["out"]', false));
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::circuit::Circuit;
use crate::error::SimError;
use crate::netlist::Netlist;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(err: SimError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| to_js(e.into()))
}

/// A circuit built from a netlist, ready for analysis.
///
/// The operating point is kept between calls, so a transient run after
/// `dc()` starts from it.
#[wasm_bindgen]
pub struct WasmCircuitSim {
    circuit: Circuit,
}

#[wasm_bindgen]
impl WasmCircuitSim {
    /// Build a circuit from the schematic editor's JSON netlist.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist_json: &str) -> Result<WasmCircuitSim, JsValue> {
        let netlist = Netlist::from_json(netlist_json).map_err(to_js)?;
        let circuit = Circuit::from_netlist(&netlist).map_err(to_js)?;
        Ok(WasmCircuitSim { circuit })
    }

    /// Operating point as `{name: value}` JSON.
    #[wasm_bindgen]
    pub fn dc(&mut self) -> Result<String, JsValue> {
        let result = self.circuit.dc().map_err(to_js)?;
        to_json(&result)
    }

    /// Transient response as JSON with a `_time_` key.
    ///
    /// `probes_json` is a JSON array of node names, or empty for none.
    #[wasm_bindgen]
    pub fn tran(
        &mut self,
        npts: usize,
        tstart: f64,
        tstop: f64,
        probes_json: &str,
        no_dc: bool,
    ) -> Result<String, JsValue> {
        let probes: Vec<String> = if probes_json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(probes_json).map_err(|e| to_js(e.into()))?
        };
        let result = self
            .circuit
            .tran(npts, tstart, tstop, probes.as_slice(), no_dc)
            .map_err(to_js)?;
        to_json(&result)
    }

    /// Frequency response as JSON with `_frequencies_` and `<node>_phase` keys.
    #[wasm_bindgen]
    pub fn ac(
        &mut self,
        npts: usize,
        fstart: f64,
        fstop: f64,
        source_name: &str,
    ) -> Result<String, JsValue> {
        let result = self
            .circuit
            .ac(npts, fstart, fstop, source_name)
            .map_err(to_js)?;
        to_json(&result)
    }

    /// Discard the operating point and matrices.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.circuit.reset();
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
