// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-device dataflow coordinator.
//!
//! The orchestrator tracks partial-input arrival per hosted execution
//! unit, submits units whose inputs are complete to the computation
//! engine, walks forward tables on completion (slicing per required
//! range), and aggregates leaf outputs into the final result.
//!
//! # State machine per (unit, inference)
//! ```text
//! waiting (num_received < num_expected)
//!    │ last partial arrives        (under the unit's input-state mutex)
//!    ▼
//! ready ──▶ running (submitted)  ──▶ done (output dispatched)
//!                                        │ leaf only
//!                                        ▼
//!                                    terminal (output collected)
//! ```
//! Root units start in `ready`. Each unit makes the `ready → running`
//! transition at most once per inference.
//!
//! # Locking
//! The unit-id → input-state map is built at construction and never
//! mutated afterwards, so readers take no map-wide lock; each state cell
//! has its own mutex. The orchestrator mutex only guards
//! `start_inference` bookkeeping, never an operator call or a send.

use crate::engine::ComputationEngine;
use crate::network::NetworkEventHandler;
use crate::{RuntimeConfig, RuntimeError};
use model_dag::{
    DeviceInfo, DeviceMap, ExecutionUnit, ExecutionUnitId, ForwardEntry, ModelDag, Validated,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tensor_core::Tensor;

/// Invoked once per inference with the aggregated final tensor.
pub type InferenceCallback = Box<dyn Fn(Tensor) + Send + Sync>;

/// Partial-input bookkeeping for one hosted execution unit.
#[derive(Debug, Default)]
struct InputState {
    received: HashMap<ExecutionUnitId, Tensor>,
    num_expected: usize,
    num_received: usize,
}

/// Per-device dataflow coordinator. Owns the computation engine and the
/// network event handler; both reach back through `Weak` references.
pub struct Orchestrator {
    dag: Arc<ModelDag<Validated>>,
    device_info: DeviceInfo,
    engine: ComputationEngine,
    network: NetworkEventHandler,
    /// One independently locked cell per hosted unit. The map itself is
    /// immutable after construction.
    input_states: HashMap<ExecutionUnitId, Mutex<InputState>>,
    /// Guards start-of-inference bookkeeping only.
    start_mtx: Mutex<()>,
    callback: Mutex<Option<InferenceCallback>>,
    /// Leaf outputs keyed by unit id; BTreeMap iteration gives the
    /// lexicographic aggregation order.
    collected_final_outputs: Mutex<BTreeMap<ExecutionUnitId, Tensor>>,
    pending_leaves: AtomicI64,
    /// Number of hosted leaf units. `pending_leaves` is re-armed to this
    /// after each completion: only the device that receives the host input
    /// calls `start_inference`, so a leaf-hosting peer must arm itself.
    num_local_leaves: i64,
}

impl Orchestrator {
    /// Builds the orchestrator for the local device and starts listening
    /// for inter-device traffic on the device's configured port.
    pub fn new(
        dag: Arc<ModelDag<Validated>>,
        device_info: DeviceInfo,
        device_map: DeviceMap,
        config: &RuntimeConfig,
    ) -> Result<Arc<Self>, RuntimeError> {
        if !device_map.contains_key(&device_info.id) {
            return Err(RuntimeError::UnknownLocalDevice {
                device: device_info.id.clone(),
            });
        }

        let input_states: HashMap<_, _> = dag
            .local_eus(&device_info.id)
            .map(|eu| {
                (
                    eu.id.clone(),
                    Mutex::new(InputState {
                        received: HashMap::new(),
                        num_expected: eu.input_requirements.len(),
                        num_received: 0,
                    }),
                )
            })
            .collect();

        let num_local_leaves = dag
            .local_eus(&device_info.id)
            .filter(|eu| eu.is_leaf)
            .count() as i64;
        let num_workers = config.resolve_workers();
        let device_map = Arc::new(device_map);

        let orch = Arc::new_cyclic(|weak: &Weak<Orchestrator>| Orchestrator {
            engine: ComputationEngine::new(Arc::clone(&dag), weak.clone(), num_workers),
            network: NetworkEventHandler::new(
                weak.clone(),
                device_info.clone(),
                device_map,
                config,
            ),
            dag,
            device_info,
            input_states,
            start_mtx: Mutex::new(()),
            callback: Mutex::new(None),
            collected_final_outputs: Mutex::new(BTreeMap::new()),
            pending_leaves: AtomicI64::new(num_local_leaves),
            num_local_leaves,
        });

        orch.network.start_listening(orch.device_info.port)?;
        tracing::info!(
            "orchestrator ready on '{}': {} hosted units",
            orch.device_info.id,
            orch.input_states.len(),
        );
        Ok(orch)
    }

    /// Registers the callback invoked with the final aggregated tensor.
    pub fn register_inference_complete_callback(&self, callback: InferenceCallback) {
        *self.callback.lock().expect("callback mutex poisoned") = Some(callback);
    }

    /// Returns the model DAG this orchestrator executes.
    pub fn dag(&self) -> &Arc<ModelDag<Validated>> {
        &self.dag
    }

    /// Returns the local device identity.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Returns a snapshot of the engine's execution counters.
    pub fn engine_stats(&self) -> crate::EngineStatsSnapshot {
        self.engine.stats()
    }

    /// Starts an inference with the given raw model input.
    ///
    /// Resets every hosted unit's input state, arms the pending-leaf
    /// countdown, and submits each local root unit. A device without
    /// local leaves participates as a relay: the warning is advisory.
    pub fn start_inference(&self, input: Tensor) -> Result<(), RuntimeError> {
        let _guard = self.start_mtx.lock().expect("orchestrator mutex poisoned");

        self.collected_final_outputs
            .lock()
            .expect("output mutex poisoned")
            .clear();

        let mut local_roots: Vec<&ExecutionUnit> = Vec::new();

        for (eu_id, state) in &self.input_states {
            let Some(eu) = self.dag.eu(eu_id) else {
                tracing::error!("hosted unit '{eu_id}' missing from DAG");
                continue;
            };

            let mut st = state.lock().expect("input state mutex poisoned");
            st.received.clear();
            st.num_received = 0;
            drop(st);

            if eu.is_root {
                if !eu.input_requirements.is_empty() {
                    return Err(RuntimeError::RootHasInputs {
                        unit: eu.id.clone(),
                    });
                }
                local_roots.push(eu);
            }
        }

        self.pending_leaves
            .store(self.num_local_leaves, Ordering::Release);
        if self.num_local_leaves == 0 {
            tracing::warn!(
                "device '{}' hosts no leaf units; it produces no terminal output for this run",
                self.device_info.id,
            );
        }

        match local_roots.split_last() {
            Some((last, rest)) => {
                for eu in rest {
                    self.engine.submit_task(eu.id.clone(), input.clone());
                }
                self.engine.submit_task(last.id.clone(), input);
            }
            None => {
                tracing::debug!(
                    "device '{}' hosts no root unit; awaiting remote partials",
                    self.device_info.id,
                );
            }
        }

        Ok(())
    }

    /// Called by an engine worker when a unit has produced its output.
    ///
    /// Dispatch happens before leaf bookkeeping so downstream units start
    /// as early as possible.
    pub(crate) fn on_computation_complete(&self, eu: &ExecutionUnit, output: Tensor) {
        if !eu.forward_table.is_empty() {
            self.dispatch_output(eu, &output);
        } else if !eu.is_leaf {
            tracing::error!(
                "unit '{}' has an empty forward table but is not a leaf",
                eu.id
            );
        }

        if eu.is_leaf {
            self.finish_leaf(eu, output);
        }
    }

    /// Accepts a partial input for a hosted unit, from the network handler
    /// or from a local forward. Submits the unit once every expected
    /// partial has been observed.
    pub fn on_receive_intermediate_result(
        &self,
        src_eu_id: &str,
        dest_eu_id: &str,
        tensor: Tensor,
    ) {
        let Some(state) = self.input_states.get(dest_eu_id) else {
            tracing::error!(
                "received partial for '{dest_eu_id}', which is not hosted on '{}'",
                self.device_info.id,
            );
            return;
        };
        let Some(dest_eu) = self.dag.eu(dest_eu_id) else {
            tracing::error!("unit '{dest_eu_id}' missing from DAG");
            return;
        };

        let complete_parts = {
            let mut st = state.lock().expect("input state mutex poisoned");
            if st.received.insert(src_eu_id.to_string(), tensor).is_some() {
                tracing::warn!(
                    "duplicate partial from '{src_eu_id}' for '{dest_eu_id}'; replaced"
                );
            } else {
                st.num_received += 1;
            }
            tracing::debug!(
                "unit '{dest_eu_id}': {}/{} partials",
                st.num_received,
                st.num_expected,
            );
            if st.num_received == st.num_expected {
                // Reset for the next inference before releasing the cell.
                st.num_received = 0;
                Some(std::mem::take(&mut st.received))
            } else {
                None
            }
        };

        if let Some(parts) = complete_parts {
            match self.assemble_input(dest_eu, parts) {
                Ok(assembled) => self.engine.submit_task(dest_eu.id.clone(), assembled),
                Err(e) => {
                    // The unit is skipped; the inference stalls.
                    tracing::error!("{e}");
                }
            }
        }
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Walks the unit's forward table, handing each destination the slice
    /// of the output it requires.
    fn dispatch_output(&self, src_eu: &ExecutionUnit, output: &Tensor) {
        for entry in &src_eu.forward_table {
            let Some(dest_eu) = self.dag.eu(&entry.dest_eu_id) else {
                tracing::error!(
                    "unit '{}' forwards to unknown unit '{}'",
                    src_eu.id,
                    entry.dest_eu_id,
                );
                continue;
            };

            let slice = match self.slice_for_entry(src_eu, entry, output) {
                Ok(slice) => slice,
                Err(e) => {
                    tracing::error!("{e}");
                    continue;
                }
            };

            if dest_eu.device_id == self.device_info.id {
                // Local destination: the slice joins the same partial-input
                // accumulation path as remote arrivals.
                self.on_receive_intermediate_result(&src_eu.id, &dest_eu.id, slice);
            } else if let Err(e) = self.network.send_intermediate_result(
                &dest_eu.device_id,
                &src_eu.id,
                &dest_eu.id,
                slice,
            ) {
                tracing::error!(
                    "send {} -> {} ('{}') failed: {e}",
                    src_eu.id,
                    dest_eu.id,
                    dest_eu.device_id,
                );
            }
        }
    }

    /// Produces the output slice a forward entry requires. The required
    /// range is expressed in the layer's output coordinates; the producing
    /// unit's rows start at its own output-range start.
    fn slice_for_entry(
        &self,
        src_eu: &ExecutionUnit,
        entry: &ForwardEntry,
        output: &Tensor,
    ) -> Result<Tensor, RuntimeError> {
        if entry.required_range == src_eu.output_range {
            return Ok(output.clone());
        }
        let start = (entry.required_range.start - src_eu.output_range.start) as usize;
        let end = (entry.required_range.end - src_eu.output_range.start) as usize;
        output
            .slice_rows(start, end)
            .map_err(|source| RuntimeError::Execution {
                unit: src_eu.id.clone(),
                source,
            })
    }

    // ── Input assembly ─────────────────────────────────────────────

    /// Builds the unit's operator input from its received partials.
    ///
    /// Offsets subtract the minimum declared requirement start while data
    /// lands at its clamped position, so rows no producer covers stay
    /// zero (halo zero-padding). Pre-padding for conv/pool stages is NOT
    /// applied here; the operator shim does that.
    fn assemble_input(
        &self,
        eu: &ExecutionUnit,
        mut parts: HashMap<ExecutionUnitId, Tensor>,
    ) -> Result<Tensor, RuntimeError> {
        let fail = |detail: String| RuntimeError::InputAssembly {
            unit: eu.id.clone(),
            detail,
        };

        // Single-source fast path: hand the buffer through untouched.
        if let [req] = eu.input_requirements.as_slice() {
            let part = parts
                .remove(&req.src_eu_id)
                .ok_or_else(|| fail(format!("missing partial from '{}'", req.src_eu_id)))?;
            if part.num_elements() != eu.expected_input_shape.num_elements() {
                return Err(fail(format!(
                    "partial holds {} elements, expected {}",
                    part.num_elements(),
                    eu.expected_input_shape.num_elements(),
                )));
            }
            return part
                .reshaped(eu.expected_input_shape.clone())
                .map_err(|e| fail(e.to_string()));
        }

        let mut buffer = Tensor::zeros(eu.expected_input_shape.clone());
        let buffer_rows = buffer.rows();
        let row_len = buffer.row_len();

        let base = eu
            .input_requirements
            .iter()
            .map(|r| r.src_range.start)
            .min()
            .ok_or_else(|| fail("unit has no input requirements".into()))?;

        let mut placements = Vec::with_capacity(eu.input_requirements.len());
        for req in &eu.input_requirements {
            let part = parts
                .remove(&req.src_eu_id)
                .ok_or_else(|| fail(format!("missing partial from '{}'", req.src_eu_id)))?;
            if part.row_len() != row_len {
                return Err(fail(format!(
                    "partial from '{}' has row length {}, buffer expects {}",
                    req.src_eu_id,
                    part.row_len(),
                    row_len,
                )));
            }
            let effective_start = match self.dag.eu(&req.src_eu_id) {
                Some(src_eu) => req.src_range.start.max(src_eu.output_range.start),
                None => req.src_range.start,
            };
            let offset = (effective_start - base) as usize;
            placements.push((offset, req.src_eu_id.clone(), part));
        }

        placements.sort_by_key(|(offset, _, _)| *offset);
        let mut covered = 0usize;
        for (offset, src_id, part) in &placements {
            let end = offset + part.rows();
            if *offset < covered {
                return Err(fail(format!(
                    "partial from '{src_id}' overlaps previously placed rows"
                )));
            }
            if end > buffer_rows {
                return Err(fail(format!(
                    "partial from '{src_id}' covers rows [{offset}, {end}) of a {buffer_rows}-row input"
                )));
            }
            buffer.as_mut_slice()[offset * row_len..end * row_len]
                .copy_from_slice(part.as_slice());
            covered = end;
        }

        Ok(buffer)
    }

    // ── Leaf aggregation ───────────────────────────────────────────

    /// Stores a leaf output and, when it is the last pending leaf, fires
    /// the completion callback with the aggregated tensor.
    ///
    /// The countdown is re-armed under the collected-outputs mutex before
    /// the callback runs, so a fast peer driving the next inference cannot
    /// decrement a stale zero.
    fn finish_leaf(&self, eu: &ExecutionUnit, output: Tensor) {
        let completed = {
            let mut collected = self
                .collected_final_outputs
                .lock()
                .expect("output mutex poisoned");
            collected.insert(eu.id.clone(), output);
            let remaining = self.pending_leaves.fetch_sub(1, Ordering::AcqRel) - 1;
            tracing::info!("leaf '{}' complete; {remaining} leaves pending", eu.id);
            if remaining == 0 {
                self.pending_leaves
                    .store(self.num_local_leaves, Ordering::Release);
                Some(std::mem::take(&mut *collected))
            } else {
                None
            }
        };
        let Some(outputs) = completed else {
            return;
        };

        let parts: Vec<&Tensor> = outputs.values().collect();
        match Tensor::concat_rows(&parts) {
            Ok(tensor) => {
                let callback = self.callback.lock().expect("callback mutex poisoned");
                match callback.as_ref() {
                    Some(callback) => {
                        tracing::info!("all leaves complete; invoking completion callback");
                        callback(tensor);
                    }
                    None => {
                        tracing::error!("inference complete but no callback is registered")
                    }
                }
            }
            Err(e) => tracing::error!("leaf output aggregation failed: {e}"),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("device", &self.device_info.id)
            .field("hosted_units", &self.input_states.len())
            .field(
                "pending_leaves",
                &self.pending_leaves.load(Ordering::Relaxed),
            )
            .finish()
    }
}
