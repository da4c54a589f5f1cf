//! Topology and data upload
//!
//! Serializes a [`Topology`] into the device's configuration address space
//! and stages parameter tables and images in its flat data memory. The
//! layer count is published first — the device sizes its internal
//! iteration from it — then every layer slot gets all nine fields in field
//! order, zeros included, because the device reads all nine per slot.
//!
//! Reloading the same topology overwrites every field and lands the device
//! in the same state; there is no partial-update path.

use crate::device::CopDevice;
use crate::error::Result;
use crate::port::CopPort;
use nopu_cop::ConfigField;
use nopu_models::{ParameterSet, Topology};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Metrics from one topology upload.
#[derive(Debug, Clone)]
pub struct LoadMetrics {
    /// Configuration writes issued (count publication included).
    pub config_writes: usize,
    /// Wall-clock duration of the upload.
    pub duration: Duration,
}

/// Upload a network topology.
///
/// # Errors
///
/// Returns [`crate::CopError::DeviceHang`] under a bounded poll policy.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn load_topology<P: CopPort>(
    dev: &mut CopDevice<P>,
    topology: &Topology,
) -> Result<LoadMetrics> {
    let start = Instant::now();
    let count = topology.len();

    // Count first; the device uses it to size its layer iteration.
    dev.config_write(0, ConfigField::LayerCount, count as i32)?;
    let mut config_writes = 1;

    for (index, layer) in topology.iter().enumerate() {
        let slot = index as u8;
        for field in ConfigField::ALL {
            dev.config_write(slot, field, layer.field_value(field, index, count))?;
            config_writes += 1;
        }
        debug!(layer = index, "layer slot configured");
    }

    let metrics = LoadMetrics {
        config_writes,
        duration: start.elapsed(),
    };
    info!(
        layers = count,
        writes = metrics.config_writes,
        elapsed = ?metrics.duration,
        "topology loaded"
    );
    Ok(metrics)
}

/// Stage every parameter table in device memory. Returns words written.
///
/// # Errors
///
/// Returns [`crate::CopError::DeviceHang`] under a bounded poll policy.
#[allow(clippy::cast_possible_truncation)]
pub fn upload_parameters<P: CopPort>(
    dev: &mut CopDevice<P>,
    parameters: &ParameterSet,
) -> Result<usize> {
    let mut words = 0;
    for table in parameters.iter() {
        for (offset, &value) in table.words.iter().enumerate() {
            dev.mem_write(table.base + offset as u32, value)?;
        }
        words += table.words.len();
        debug!(name = %table.name, base = table.base, words = table.words.len(), "table staged");
    }
    Ok(words)
}

/// Place one image in device memory at `base`, sample by sample.
///
/// # Errors
///
/// Returns [`crate::CopError::DeviceHang`] under a bounded poll policy.
#[allow(clippy::cast_possible_truncation)]
pub fn upload_image<P: CopPort>(dev: &mut CopDevice<P>, base: u32, samples: &[i32]) -> Result<()> {
    for (offset, &sample) in samples.iter().enumerate() {
        dev.mem_write(base + offset as u32, sample)?;
    }
    debug!(base, samples = samples.len(), "image staged");
    Ok(())
}

/// Bind the image base pointer — a single configuration write, the cheap
/// form when the image region is already populated or host-visible.
///
/// # Errors
///
/// Returns [`crate::CopError::DeviceHang`] under a bounded poll policy.
#[allow(clippy::cast_possible_wrap)]
pub fn bind_image<P: CopPort>(dev: &mut CopDevice<P>, base: u32) -> Result<()> {
    dev.config_write(0, ConfigField::Image, base as i32)
}

/// Read back `count` words starting at `base` — the inspection loop the
/// firmware used over weights and intermediate activations.
///
/// # Errors
///
/// Returns [`crate::CopError::DeviceHang`] under a bounded poll policy.
#[allow(clippy::cast_possible_truncation)]
pub fn dump_region<P: CopPort>(
    dev: &mut CopDevice<P>,
    base: u32,
    count: usize,
) -> Result<Vec<i32>> {
    let mut words = Vec::with_capacity(count);
    for offset in 0..count {
        words.push(dev.read_mem(base + offset as u32)?);
    }
    Ok(words)
}
