// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The network event handler: inter-device transport for partial
//! activations.
//!
//! One background listener thread accepts TCP connections; each accepted
//! connection is serviced on a short-lived worker that reads framed
//! messages and forwards the rebuilt tensors to the orchestrator. Sends
//! are synchronous blocking writes with a connect timeout; a failed send
//! is reported but never terminates the engine.

use crate::orchestrator::Orchestrator;
use crate::wire::WireMessage;
use crate::{RuntimeConfig, RuntimeError};
use model_dag::{DeviceInfo, DeviceMap};
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tensor_core::Tensor;

/// How often the accept loop re-checks the stop flag.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Sender and receiver of serialized tensor fragments between devices.
pub struct NetworkEventHandler {
    device_info: DeviceInfo,
    device_map: Arc<DeviceMap>,
    orch: Weak<Orchestrator>,
    stop: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    max_message_bytes: usize,
    connect_timeout: Duration,
}

impl NetworkEventHandler {
    pub(crate) fn new(
        orch: Weak<Orchestrator>,
        device_info: DeviceInfo,
        device_map: Arc<DeviceMap>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            device_info,
            device_map,
            orch,
            stop: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
            max_message_bytes: config.max_message_bytes,
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Binds the listener and starts the background accept loop.
    pub fn start_listening(&self, port: u16) -> Result<(), RuntimeError> {
        let mut listener_slot = self.listener.lock().expect("listener mutex poisoned");
        if listener_slot.is_some() {
            tracing::warn!("listener already running on device '{}'", self.device_info.id);
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", port))?;
        // Non-blocking accepts so the stop flag is honored promptly.
        listener.set_nonblocking(true)?;
        tracing::info!(
            "device '{}' listening on port {}",
            self.device_info.id,
            port
        );

        let stop = Arc::clone(&self.stop);
        let orch = self.orch.clone();
        let max_message_bytes = self.max_message_bytes;
        let read_timeout = self.connect_timeout;
        let handle = std::thread::Builder::new()
            .name("network-listener".into())
            .spawn(move || {
                accept_loop(listener, stop, orch, max_message_bytes, read_timeout)
            })?;
        *listener_slot = Some(handle);
        Ok(())
    }

    /// Signals the accept loop to exit and joins the listener thread.
    pub fn stop_listening(&self) {
        self.stop.store(true, Ordering::Release);
        let handle = self
            .listener
            .lock()
            .expect("listener mutex poisoned")
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("network listener panicked during shutdown");
            }
        }
    }

    /// Transmits a tensor fragment to the unit `dest_eu_id` hosted on
    /// `dest_device_id`. The send is a synchronous blocking write.
    pub fn send_intermediate_result(
        &self,
        dest_device_id: &str,
        src_eu_id: &str,
        dest_eu_id: &str,
        tensor: Tensor,
    ) -> Result<(), RuntimeError> {
        let device = self.device_map.get(dest_device_id).ok_or_else(|| {
            RuntimeError::UnknownDevice {
                device: dest_device_id.to_string(),
            }
        })?;
        let addr = device.socket_addr().map_err(|e| {
            RuntimeError::Config(format!(
                "device '{}' has unusable address '{}': {e}",
                device.id, device.ip_address
            ))
        })?;

        let message = WireMessage::from_tensor(src_eu_id, dest_eu_id, &tensor);
        let mut stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        message.write_to(&mut stream)?;
        tracing::debug!(
            "sent {} -> {} on '{}' ({} payload bytes)",
            src_eu_id,
            dest_eu_id,
            dest_device_id,
            message.payload.len(),
        );
        Ok(())
    }
}

impl Drop for NetworkEventHandler {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn accept_loop(
    listener: TcpListener,
    stop: Arc<AtomicBool>,
    orch: Weak<Orchestrator>,
    max_message_bytes: usize,
    read_timeout: Duration,
) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::debug!("accepted connection from {peer}");
                let orch = orch.clone();
                let spawned = std::thread::Builder::new()
                    .name("network-recv".into())
                    .spawn(move || {
                        handle_connection(stream, orch, max_message_bytes, read_timeout)
                    });
                if let Err(e) = spawned {
                    tracing::error!("failed to spawn connection worker: {e}");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
    tracing::debug!("network listener exiting");
}

/// Reads framed messages until the peer closes the connection.
fn handle_connection(
    stream: TcpStream,
    orch: Weak<Orchestrator>,
    max_message_bytes: usize,
    read_timeout: Duration,
) {
    if let Err(e) = stream.set_nonblocking(false) {
        tracing::warn!("cannot configure accepted socket: {e}");
        return;
    }
    if let Err(e) = stream.set_read_timeout(Some(read_timeout)) {
        tracing::warn!("cannot set read timeout: {e}");
        return;
    }

    let mut stream = stream;
    loop {
        match WireMessage::read_from(&mut stream, max_message_bytes) {
            Ok(message) => match message.into_tensor() {
                Ok((src_eu_id, dest_eu_id, tensor)) => {
                    let Some(orch) = orch.upgrade() else {
                        tracing::debug!("orchestrator gone, dropping inbound partial");
                        return;
                    };
                    orch.on_receive_intermediate_result(&src_eu_id, &dest_eu_id, tensor);
                }
                Err(e) => {
                    tracing::error!("inbound message rejected: {e}");
                    return;
                }
            },
            Err(RuntimeError::Network(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                // Peer finished sending.
                return;
            }
            Err(e) => {
                tracing::error!("inbound frame failed: {e}");
                return;
            }
        }
    }
}
