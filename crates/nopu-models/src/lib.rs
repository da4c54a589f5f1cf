//! Network topology representation for the nopu coprocessor.
//!
//! A topology is an ordered list of [`LayerDescriptor`]s, each mapping
//! one-to-one onto the device's nine per-layer configuration fields.
//! Parameter tables ([`ParameterSet`]) carry the weight/bias/scale blobs
//! with their device base addresses; the [`zoo`] module holds the preset
//! networks observed on hardware.
//!
//! Serializing a topology into the device's configuration address space is
//! the driver's job — this crate owns only the data model and its
//! validation.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod error;
mod layer;
mod tables;
mod topology;
pub mod zoo;

pub use error::{ModelError, Result};
pub use layer::{LayerDescriptor, LayerKind, PostOp};
pub use tables::{ParameterSet, ParameterTable};
pub use topology::Topology;
