// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runtime facade: the host-application boundary.
//!
//! `EdgeFlow` wraps one orchestrator behind a small initialize / inference
//! / callback surface. A process-wide handle is available through
//! [`EdgeFlow::global`] for host bindings; everything else (tests,
//! multi-device processes) should construct instances explicitly or use
//! the [`Orchestrator`] directly.
//!
//! At most one inference is active per device: the `inference_active` flag
//! is taken before the orchestrator is invoked and cleared when the
//! completion callback delivers the final output.

use crate::{Orchestrator, RuntimeConfig, RuntimeError};
use model_dag::{DeviceInfo, DeviceMap, ModelDag, Validated};
use std::sync::{Arc, Mutex, OnceLock};
use tensor_core::{Shape, Tensor};

/// Host sink receiving the final output: raw values plus their
/// comma-separated rendering.
pub type CompletionSink = Arc<dyn Fn(&[f32], &str) + Send + Sync>;

/// Process-level runtime facade.
pub struct EdgeFlow {
    orch: Mutex<Option<Arc<Orchestrator>>>,
    sink: Mutex<Option<CompletionSink>>,
    inference_active: Mutex<bool>,
}

impl EdgeFlow {
    /// Creates an independent facade instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            orch: Mutex::new(None),
            sink: Mutex::new(None),
            inference_active: Mutex::new(false),
        })
    }

    /// Returns the process-wide instance backing host bindings.
    pub fn global() -> &'static Arc<EdgeFlow> {
        static INSTANCE: OnceLock<Arc<EdgeFlow>> = OnceLock::new();
        INSTANCE.get_or_init(EdgeFlow::new)
    }

    /// Initializes (or re-initializes) the runtime.
    ///
    /// Idempotent: a previous orchestrator is torn down first, joining its
    /// worker and listener threads, so re-initialization never leaks a
    /// previous model's units.
    pub fn initialize(
        self: &Arc<Self>,
        dag: ModelDag<Validated>,
        device_info: DeviceInfo,
        devices: Vec<DeviceInfo>,
        config: &RuntimeConfig,
    ) -> Result<(), RuntimeError> {
        let device_map: DeviceMap = devices
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let mut slot = self.orch.lock().expect("facade mutex poisoned");
        if slot.take().is_some() {
            tracing::info!("re-initializing: previous orchestrator torn down");
        }

        let orch = Orchestrator::new(Arc::new(dag), device_info, device_map, config)?;
        let facade = Arc::downgrade(self);
        orch.register_inference_complete_callback(Box::new(move |tensor| {
            if let Some(facade) = facade.upgrade() {
                facade.on_inference_complete(tensor);
            }
        }));

        *slot = Some(orch);
        *self.inference_active.lock().expect("facade mutex poisoned") = false;
        Ok(())
    }

    /// Registers the host sink invoked with the final output.
    pub fn register_completion_callback(
        &self,
        sink: impl Fn(&[f32], &str) + Send + Sync + 'static,
    ) {
        *self.sink.lock().expect("facade mutex poisoned") = Some(Arc::new(sink));
    }

    /// Starts an inference with an already-built input tensor.
    ///
    /// Refuses when uninitialized, when the input does not match the
    /// model's input shape, or while another inference is active.
    pub fn inference(&self, input: Tensor) -> Result<(), RuntimeError> {
        let orch = self.orchestrator()?;

        let expected = orch.dag().input_shape.num_elements();
        if input.num_elements() != expected {
            return Err(RuntimeError::InvalidInput(format!(
                "input has {} elements, model expects {expected}",
                input.num_elements(),
            )));
        }

        {
            let mut active = self.inference_active.lock().expect("facade mutex poisoned");
            if *active {
                return Err(RuntimeError::InferenceActive);
            }
            *active = true;
        }

        if let Err(e) = orch.start_inference(input) {
            *self.inference_active.lock().expect("facade mutex poisoned") = false;
            return Err(e);
        }
        Ok(())
    }

    /// Starts an inference from comma-separated float text, the encoding
    /// host bindings deliver (e.g. `"1.0,0.0"`).
    ///
    /// Parsing happens before the active flag is taken, so malformed input
    /// leaves no state behind.
    pub fn inference_csv(&self, text: &str) -> Result<(), RuntimeError> {
        let orch = self.orchestrator()?;
        let expected = orch.dag().input_shape.num_elements();
        let input = parse_csv_input(text, expected)?;
        self.inference(input)
    }

    /// Returns `true` while an inference is in flight.
    pub fn inference_active(&self) -> bool {
        *self.inference_active.lock().expect("facade mutex poisoned")
    }

    /// Internal completion path: renders the output, invokes the host
    /// sink, and re-arms for the next inference.
    fn on_inference_complete(&self, output: Tensor) {
        let values = output.as_slice();
        let text = render_csv(values);

        let sink = self.sink.lock().expect("facade mutex poisoned").clone();
        match sink {
            Some(sink) => sink(values, &text),
            None => tracing::warn!("inference complete but no completion sink registered"),
        }

        *self.inference_active.lock().expect("facade mutex poisoned") = false;
        tracing::info!("inference complete: [{text}]");
    }

    fn orchestrator(&self) -> Result<Arc<Orchestrator>, RuntimeError> {
        self.orch
            .lock()
            .expect("facade mutex poisoned")
            .clone()
            .ok_or(RuntimeError::NotInitialized)
    }
}

/// Parses comma-separated float text into a 1-D tensor of the given length.
pub fn parse_csv_input(text: &str, expected_len: usize) -> Result<Tensor, RuntimeError> {
    let mut values = Vec::with_capacity(expected_len);
    for token in text.split(',') {
        let token = token.trim();
        let value: f32 = token.parse().map_err(|_| {
            RuntimeError::InvalidInput(format!("'{token}' is not a float"))
        })?;
        values.push(value);
    }
    if values.len() != expected_len {
        return Err(RuntimeError::InvalidInput(format!(
            "got {} values, model expects {expected_len}",
            values.len(),
        )));
    }
    Tensor::from_vec(Shape::vector(expected_len), values)
        .map_err(|e| RuntimeError::InvalidInput(e.to_string()))
}

fn render_csv(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
