//! Network latency probe
//!
//! Each probe round trip is a DELTA_REQUEST answered by a DELTA_RESPONSE.
//! After every response the probe measures the round trip and moves on to
//! the next process in id order.

use crate::domain::{Certificate, Delta, Epoch, Message, ProcessId, Timeout};
use crate::metrics;
use crate::ports::{EpochProtocol, Process};
use std::time::Instant;
use tracing::{info, trace};

pub struct DeltaProbe {
    epoch: Epoch,
    started: bool,
    stopped: bool,
    sent_at: Option<Instant>,
}

impl DeltaProbe {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            started: false,
            stopped: false,
            sent_at: None,
        }
    }

    fn send_request(&mut self, process: &mut dyn Process, to: ProcessId) {
        let request = Message::DeltaRequest(Delta {
            payload: process.get_value().unwrap_or_default(),
            sender: process.id(),
        });
        self.sent_at = Some(Instant::now());
        process.send(request, &[to]);
    }
}

impl EpochProtocol for DeltaProbe {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn started(&self) -> bool {
        self.started
    }

    fn finished(&self) -> bool {
        self.stopped
    }

    fn start(
        &mut self,
        process: &mut dyn Process,
        _valid: Option<Certificate>,
        _locked: Option<Certificate>,
    ) {
        self.started = true;
        let me = process.id();
        self.send_request(process, me);
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn process_message(&mut self, process: &mut dyn Process, message: Message) {
        match message {
            Message::DeltaRequest(request) => {
                let response = Message::DeltaResponse(Delta {
                    payload: request.payload,
                    sender: process.id(),
                });
                process.send(response, &[request.sender]);
            }
            Message::DeltaResponse(response) => {
                if let Some(sent_at) = self.sent_at {
                    let latency = sent_at.elapsed();
                    info!(
                        process = process.id(),
                        peer = response.sender,
                        latency_ms = latency.as_millis() as u64,
                        "delta round trip"
                    );
                    metrics::record_delta_latency(latency);
                }
                let next =
                    ((response.sender as usize + 1) % process.num_processes()) as ProcessId;
                self.send_request(process, next);
            }
            other => trace!(kind = other.message_type().name(), "not a delta message"),
        }
    }

    fn process_timeout(&mut self, _process: &mut dyn Process, _timeout: Timeout) {}
}
