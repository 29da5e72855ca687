// src/inference.rs
//! Inference worker - dedicated thread that owns the model.
//!
//! Loads the model once, then serves requests in FIFO order:
//! receives (seq, features), runs the engine, sends back the outputs.
//!
//! Threading model:
//! - Owns: the InferenceEngine (built on the worker by the loader closure)
//! - Requests are unbounded: several may be in flight at once
//! - The UI thread never blocks; it drains events once per frame

use crate::error::Error;
use crate::model::{InferenceEngine, OutputMap};
use crate::types::FeatureVector;
use log::*;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
#[cfg(test)]
use std::time::Duration;

/// Work item sent to the worker.
pub struct InferenceRequest {
    pub seq: u64,
    pub features: FeatureVector,
}

/// Everything the worker reports back.
#[derive(Debug)]
pub enum InferenceEvent {
    /// Model loaded; requests can be served.
    Ready,
    /// Model failed to load; the worker has stopped.
    LoadFailed(Error),
    Completed { seq: u64, outputs: OutputMap },
    Failed { seq: u64, error: Error },
}

/// UI-side handle: submit requests, drain events.
pub struct InferenceClient {
    work_tx: Sender<InferenceRequest>,
    event_rx: Receiver<InferenceEvent>,
    last_seq: u64,
}

impl InferenceClient {
    /// Wrap an existing channel pair (the worker side is someone else's job).
    pub fn from_channels(work_tx: Sender<InferenceRequest>, event_rx: Receiver<InferenceEvent>) -> Self {
        Self { work_tx, event_rx, last_seq: 0 }
    }

    /// Queue `features`; returns the sequence number given to the request.
    pub fn submit(&mut self, features: FeatureVector) -> Result<u64, Error> {
        let seq = self.last_seq + 1;
        self.work_tx
            .send(InferenceRequest { seq, features })
            .map_err(|_| Error::Inference("inference worker is gone".into()))?;
        self.last_seq = seq;
        trace!("InferenceClient: submitted request {seq}");
        Ok(seq)
    }

    /// Sequence number of the most recent submitted request (0 = none yet).
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Everything the worker has sent since the last call, without blocking.
    pub fn poll_events(&self) -> Vec<InferenceEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(ev) => events.push(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Block up to `timeout` for the next event.
    #[cfg(test)]
    pub fn wait_event(&self, timeout: Duration) -> Option<InferenceEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

/// Worker state (runs on the dedicated thread)
struct InferenceWorker<E: InferenceEngine> {
    engine: E,
}

impl<E: InferenceEngine> InferenceWorker<E> {
    fn run(mut self, work_rx: Receiver<InferenceRequest>, event_tx: Sender<InferenceEvent>) {
        info!("InferenceWorker: Serving requests");
        while let Ok(request) = work_rx.recv() {
            let InferenceRequest { seq, features } = request;
            debug!("InferenceWorker: Running request {seq}");
            let event = match self.engine.run(std::slice::from_ref(&features)) {
                Ok(outputs) => InferenceEvent::Completed { seq, outputs },
                Err(error) => InferenceEvent::Failed { seq, error },
            };
            if event_tx.send(event).is_err() {
                warn!("InferenceWorker: Event channel closed, exiting");
                return;
            }
        }
        info!("InferenceWorker: Work channel closed, exiting");
    }
}

/// Spawn the inference thread. `loader` runs on that thread; its outcome is
/// reported as the first event (Ready or LoadFailed).
pub fn spawn_inference_thread<E, F>(loader: F) -> Result<InferenceClient, Error>
where
    E: InferenceEngine,
    F: FnOnce() -> Result<E, Error> + Send + 'static,
{
    let (work_tx, work_rx) = channel::<InferenceRequest>();
    let (event_tx, event_rx) = channel::<InferenceEvent>();

    thread::Builder::new()
        .name("inference".to_string())
        .spawn(move || {
            info!("InferenceWorker: Loading model");
            match loader() {
                Ok(engine) => {
                    if event_tx.send(InferenceEvent::Ready).is_err() {
                        return;
                    }
                    InferenceWorker { engine }.run(work_rx, event_tx);
                }
                Err(e) => {
                    error!("InferenceWorker: Model load failed: {e}");
                    drop(work_rx);
                    let _ = event_tx.send(InferenceEvent::LoadFailed(e));
                }
            }
        })?;

    Ok(InferenceClient::from_channels(work_tx, event_rx))
}
