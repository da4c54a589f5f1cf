//! `nopu` — command-line interface for the nopu coprocessor driver.
//!
//! ```text
//! USAGE:
//!   nopu serve [--port 5005] [--images N] [--strict-sender]   Serve inference over UDP
//!   nopu run [--images N]                                     Run local images
//!   nopu memtest [--addr A] [--value V]                       Memory write/read round trip
//!   nopu peek <addr> [--count N]                              Dump a device memory region
//!   nopu topology                                             Print the CIFAR-10 config plan
//! ```
//!
//! All commands drive the protocol emulator; a bare-metal port would swap
//! in the real instruction-issue primitive behind the same device handle.

use anyhow::Result;
use clap::{Parser, Subcommand};
use nopu_cop::ConfigField;
use nopu_driver::{
    dump_region, CopDevice, CopEmulator, CycleCounter, IngestConfig, LocalSource, NetworkSource,
    SenderPolicy, SessionConfig, SessionController, UdpTransport, WallCounter,
    DEFAULT_PACKET_SIZE, DEFAULT_UDP_PORT,
};
use nopu_models::zoo::{self, Cifar10Layout, CIFAR10_IMAGE_LEN};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nopu", about = "nopu neural-network coprocessor CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Serve inference over UDP: receive batched images, answer with results.
    Serve {
        /// UDP port to listen on.
        #[arg(long, default_value_t = DEFAULT_UDP_PORT)]
        port: u16,
        /// Samples per batch datagram.
        #[arg(long, default_value_t = DEFAULT_PACKET_SIZE)]
        packet_size: usize,
        /// Images to serve before exiting; serves forever when omitted.
        #[arg(long)]
        images: Option<u64>,
        /// Reject mid-transfer packets from a sender other than the first.
        #[arg(long)]
        strict_sender: bool,
    },
    /// Run inference over locally generated images.
    Run {
        /// Number of images.
        #[arg(long, default_value_t = 1)]
        images: u64,
    },
    /// Write a word to device memory and read it back.
    Memtest {
        /// Device memory address.
        #[arg(long, default_value_t = 800)]
        addr: u32,
        /// Value to write.
        #[arg(long, default_value_t = 0x1122_3344)]
        value: i32,
    },
    /// Dump a device memory region.
    Peek {
        /// Base address.
        addr: u32,
        /// Words to read.
        #[arg(long, default_value_t = 16)]
        count: usize,
    },
    /// Print the CIFAR-10 configuration write plan.
    Topology,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Serve {
            port,
            packet_size,
            images,
            strict_sender,
        } => cmd_serve(port, packet_size, images, strict_sender)?,
        Cmd::Run { images } => cmd_run(images)?,
        Cmd::Memtest { addr, value } => cmd_memtest(addr, value)?,
        Cmd::Peek { addr, count } => cmd_peek(addr, count)?,
        Cmd::Topology => cmd_topology()?,
    }

    Ok(())
}

fn cifar_session(limit: Option<u64>) -> Result<SessionController<CopEmulator>> {
    let layout = Cifar10Layout::default();
    let topology = zoo::cifar10(&layout)?;
    let device = CopDevice::new(CopEmulator::new().with_image_window(CIFAR10_IMAGE_LEN));
    Ok(SessionController::new(
        device,
        topology,
        SessionConfig {
            image_base: layout.image,
            image_len: CIFAR10_IMAGE_LEN,
            limit,
        },
    ))
}

fn cmd_serve(port: u16, packet_size: usize, images: Option<u64>, strict_sender: bool) -> Result<()> {
    let transport = UdpTransport::bind(("0.0.0.0", port))?;
    println!("listening on UDP port {port}");

    let config = IngestConfig {
        port,
        packet_size,
        sender_policy: if strict_sender {
            SenderPolicy::StrictFirst
        } else {
            SenderPolicy::LatchEachPacket
        },
    };

    let mut session = cifar_session(images)?;
    let mut source = NetworkSource::new(transport, config);
    println!("configuring network... ready to rumble");

    let report = session.run(&mut source)?;
    println!(
        "served {} image(s) in {:?} ({:?}/image)",
        report.images,
        report.total_duration,
        report.mean_latency()
    );
    Ok(())
}

fn cmd_run(images: u64) -> Result<()> {
    let mut session = cifar_session(Some(images))?;

    // Deterministic ramp images, one offset per image.
    #[allow(clippy::cast_possible_truncation)]
    let batch: Vec<Vec<i32>> = (0..images)
        .map(|id| {
            (0..CIFAR10_IMAGE_LEN)
                .map(|i| ((id as usize + i) % 256) as i32)
                .collect()
        })
        .collect();
    let mut source = LocalSource::new(batch);

    let report = session.run(&mut source)?;
    for (id, result) in source.results.iter().enumerate() {
        println!("image {id}: result {result}");
    }
    println!(
        "gross execution time per inference (including img load): {:?}",
        report.mean_latency()
    );
    Ok(())
}

fn cmd_memtest(addr: u32, value: i32) -> Result<()> {
    let mut device = CopDevice::new(CopEmulator::new());
    device.reset()?;

    let mut counter = WallCounter::new();
    counter.reset();
    device.mem_write(addr, value)?;
    let read_back = device.read_mem(addr)?;
    let elapsed = counter.read();

    println!("wrote {value:#x} to {addr}, read back {read_back:#x} ({elapsed} cycles)");
    anyhow::ensure!(read_back == value, "round trip mismatch");
    Ok(())
}

fn cmd_peek(addr: u32, count: usize) -> Result<()> {
    let mut device = CopDevice::new(CopEmulator::new());
    let words = dump_region(&mut device, addr, count)?;
    for (offset, word) in words.iter().enumerate() {
        println!("{}:\t{word:#x}", addr as usize + offset);
    }
    Ok(())
}

fn cmd_topology() -> Result<()> {
    let layout = Cifar10Layout::default();
    let topology = zoo::cifar10(&layout)?;

    println!("layers: {}", topology.len());
    println!("config writes per load: {}", topology.config_write_count());
    println!();
    println!("{:>5} {:>6} {:>12}  field", "layer", "id", "value");

    let count = topology.len();
    for (index, layer) in topology.iter().enumerate() {
        for field in ConfigField::ALL {
            let value = layer.field_value(field, index, count);
            println!("{index:>5} {:>6} {value:>#12x}  {field:?}", field.id());
        }
    }
    Ok(())
}
