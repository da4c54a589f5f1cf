//! Inference session controller
//!
//! The top-level loop: receive or load an image, configure the device
//! (once), run, poll, read the result, respond. Serving forever and
//! running a fixed number of images are the same code path selected by
//! configuration, matching the firmware's network and emulator flows.
//!
//! Everything the firmware kept in globals — sequence number, batch
//! counter, latched host — lives in an explicit [`SessionState`] owned by
//! the controller.

use crate::device::CopDevice;
use crate::error::Result;
use crate::ingest::{receive_image, IngestConfig, Transport};
use crate::loader::{bind_image, load_topology, upload_image};
use crate::port::CopPort;
use nopu_models::Topology;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the controller is in its loop. `ConfiguredReady` is entered once:
/// topology upload precedes the loop and is bypassed on later iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Between images.
    #[default]
    Idle,
    /// Filling the image buffer.
    ReceivingImage,
    /// Topology uploaded, first image pending.
    ConfiguredReady,
    /// Inference in flight.
    Running,
    /// Result read, response pending.
    Responding,
}

/// Cross-call session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    /// Image-transfer sequence number, wrapping at its storage width.
    pub sequence: u8,
    /// Batches accepted in the current round.
    pub batch: u8,
    /// Sender latched from the current round's packets.
    pub host: Option<SocketAddr>,
    /// Topology uploaded.
    pub configured: bool,
    /// Loop position, for observability.
    pub phase: Phase,
}

impl SessionState {
    /// Fresh state at session start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Supplier of images and sink for results — the two ends the session
/// loop plugs into. Network and local deployments differ only here.
pub trait ImageSource {
    /// Fill `image` with the next input. Returns `false` when the source
    /// is exhausted (a local batch ran out; network sources never are).
    ///
    /// # Errors
    ///
    /// Propagates transport and policy errors.
    fn next_image(&mut self, image: &mut [i32], state: &mut SessionState) -> Result<bool>;

    /// Emit one inference result.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    fn deliver(&mut self, state: &SessionState, result: i32) -> Result<()>;
}

/// Serves a fixed set of in-memory images and records the results.
#[derive(Debug, Default)]
pub struct LocalSource {
    images: Vec<Vec<i32>>,
    cursor: usize,
    /// Results in image order.
    pub results: Vec<i32>,
}

impl LocalSource {
    /// Source over `images`.
    #[must_use]
    pub fn new(images: Vec<Vec<i32>>) -> Self {
        Self {
            images,
            cursor: 0,
            results: Vec::new(),
        }
    }
}

impl ImageSource for LocalSource {
    fn next_image(&mut self, image: &mut [i32], state: &mut SessionState) -> Result<bool> {
        let Some(next) = self.images.get(self.cursor) else {
            return Ok(false);
        };
        self.cursor += 1;
        let take = next.len().min(image.len());
        image[..take].copy_from_slice(&next[..take]);
        image[take..].fill(0);
        state.sequence = state.sequence.wrapping_add(1);
        Ok(true)
    }

    fn deliver(&mut self, state: &SessionState, result: i32) -> Result<()> {
        info!(seq = state.sequence, result, "inference result");
        self.results.push(result);
        Ok(())
    }
}

/// Receives images over a datagram transport and answers the latched host
/// with `[sequence, result]`.
#[derive(Debug)]
pub struct NetworkSource<T> {
    transport: T,
    config: IngestConfig,
}

impl<T: Transport> NetworkSource<T> {
    /// Source over `transport` with the given ingestion parameters.
    pub fn new(transport: T, config: IngestConfig) -> Self {
        Self { transport, config }
    }

    /// Unwrap back into the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: Transport> ImageSource for NetworkSource<T> {
    fn next_image(&mut self, image: &mut [i32], state: &mut SessionState) -> Result<bool> {
        receive_image(&mut self.transport, &self.config, state, image)?;
        Ok(true)
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn deliver(&mut self, state: &SessionState, result: i32) -> Result<()> {
        let Some(host) = state.host else {
            warn!("no host latched, dropping result");
            return Ok(());
        };
        // The sequence was already advanced by the completed transfer;
        // the response carries the new value, as the firmware sends it.
        self.transport.send(host, &[state.sequence, result as u8])?;
        info!(seq = state.sequence, result, to = %host, "result sent");
        Ok(())
    }
}

/// Session parameters.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Device memory base of the image buffer.
    pub image_base: u32,
    /// Samples per image.
    pub image_len: usize,
    /// Images to serve before returning; `None` serves forever.
    pub limit: Option<u64>,
}

/// Report from a completed (bounded) session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Images served.
    pub images: u64,
    /// Wall-clock time across the whole loop.
    pub total_duration: Duration,
}

impl SessionReport {
    /// Mean wall-clock latency per image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn mean_latency(&self) -> Duration {
        if self.images == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.images as u32
    }
}

/// The inference session controller.
#[derive(Debug)]
pub struct SessionController<P> {
    device: CopDevice<P>,
    topology: Topology,
    config: SessionConfig,
    state: SessionState,
}

impl<P: CopPort> SessionController<P> {
    /// Controller over `device` serving `topology`.
    pub fn new(device: CopDevice<P>, topology: Topology, config: SessionConfig) -> Self {
        Self {
            device,
            topology,
            config,
            state: SessionState::new(),
        }
    }

    /// Current session state.
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Borrow the device.
    pub fn device_mut(&mut self) -> &mut CopDevice<P> {
        &mut self.device
    }

    /// Unwrap back into the device.
    pub fn into_device(self) -> CopDevice<P> {
        self.device
    }

    /// Run the session loop against `source`.
    ///
    /// Configures the device on first entry (reset, topology upload),
    /// then per image: fill the buffer, stage it at `image_base`, bind
    /// the pointer, run, read the result, deliver. Returns when the
    /// configured limit is reached or the source is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates device and transport errors.
    pub fn run(&mut self, source: &mut impl ImageSource) -> Result<SessionReport> {
        if !self.state.configured {
            self.device.reset()?;
            let metrics = load_topology(&mut self.device, &self.topology)?;
            self.state.configured = true;
            self.state.phase = Phase::ConfiguredReady;
            info!(writes = metrics.config_writes, "network configured");
        }

        let started = Instant::now();
        let mut image = vec![0i32; self.config.image_len];
        let mut served: u64 = 0;

        loop {
            if self.config.limit.is_some_and(|limit| served >= limit) {
                break;
            }

            self.state.phase = Phase::ReceivingImage;
            if !source.next_image(&mut image, &mut self.state)? {
                break;
            }

            upload_image(&mut self.device, self.config.image_base, &image)?;
            bind_image(&mut self.device, self.config.image_base)?;

            self.state.phase = Phase::Running;
            self.device.run()?;

            self.state.phase = Phase::Responding;
            let result = self.device.read_result();
            source.deliver(&self.state, result)?;

            self.state.phase = Phase::Idle;
            served += 1;
            debug!(served, "image complete");
        }

        Ok(SessionReport {
            images: served,
            total_duration: started.elapsed(),
        })
    }
}
