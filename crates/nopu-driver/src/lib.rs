//! Driver for the nopu neural-network coprocessor.
//!
//! The device hangs off the CPU as a memory-mapped accelerator addressed
//! through single-word commands. This crate carries everything above the
//! instruction-issue boundary: blocking control primitives, the topology
//! loader that serializes a network into the configuration address space,
//! batched image ingestion over a datagram transport, and the inference
//! session loop that ties them together.
//!
//! # Layering
//!
//! ```text
//! SessionController            receive → configure once → run → respond
//!   ├─ ingest::receive_image   batch protocol over a Transport
//!   ├─ loader                  topology / parameters / image staging
//!   └─ CopDevice               reset, run, wait_idle, mem + config I/O
//!        └─ CopPort            the machine instruction (or CopEmulator)
//! ```
//!
//! # Quick start
//!
//! ```
//! use nopu_driver::prelude::*;
//! use nopu_models::zoo::{self, Cifar10Layout, CIFAR10_IMAGE_LEN};
//!
//! # fn main() -> nopu_driver::Result<()> {
//! let layout = Cifar10Layout::default();
//! let topology = zoo::cifar10(&layout).expect("preset");
//!
//! let device = CopDevice::new(CopEmulator::new().with_image_window(CIFAR10_IMAGE_LEN));
//! let mut session = SessionController::new(
//!     device,
//!     topology,
//!     SessionConfig { image_base: layout.image, image_len: CIFAR10_IMAGE_LEN, limit: None },
//! );
//!
//! let mut source = LocalSource::new(vec![vec![0; CIFAR10_IMAGE_LEN]]);
//! let report = session.run(&mut source)?;
//! assert_eq!(report.images, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod device;
pub mod emu;
mod error;
pub mod ingest;
pub mod loader;
mod port;
mod session;

pub use device::CopDevice;
pub use emu::{CopEmulator, ScriptedTransport};
pub use error::{CopError, Result};
pub use ingest::{
    Datagram, IngestConfig, SenderPolicy, Transport, UdpTransport, DEFAULT_PACKET_SIZE,
    DEFAULT_UDP_PORT,
};
pub use loader::{bind_image, dump_region, load_topology, upload_image, upload_parameters, LoadMetrics};
pub use port::{CopPort, CycleCounter, PollPolicy, WallCounter};
pub use session::{
    ImageSource, LocalSource, NetworkSource, Phase, SessionConfig, SessionController,
    SessionReport, SessionState,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        CopDevice, CopEmulator, CopError, CopPort, IngestConfig, LocalSource, NetworkSource,
        PollPolicy, Result, SessionConfig, SessionController, SessionState, Transport,
        UdpTransport,
    };
}
