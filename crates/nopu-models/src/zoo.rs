//! Preset networks
//!
//! The two topologies the device has run in anger: the six-layer CIFAR-10
//! CNN and the two-layer MNIST FC classifier. Both carry the exact shape
//! words and memory plans observed on hardware; only the table addresses
//! are adjustable, since deployments differ in where the host stages
//! parameters.

use crate::layer::{LayerDescriptor, LayerKind, PostOp};
use crate::topology::Topology;
use crate::Result;
use nopu_cop::ShapeWord;

/// Samples in one CIFAR-10 image (32×32×3).
pub const CIFAR10_IMAGE_LEN: usize = 3072;

/// Samples in one MNIST image (28×28).
pub const MNIST_IMAGE_LEN: usize = 784;

/// Device memory plan for the CIFAR-10 network.
///
/// Defaults stage the parameter tables high in device memory, clear of the
/// image and activation regions, mirroring the firmware's placement of its
/// generated tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cifar10Layout {
    /// Weights, layer 0 (conv, 3×3×3×16).
    pub conv0_weights: u32,
    /// Weights, layer 2 (conv, 3×3×16×16).
    pub conv1_weights: u32,
    /// Weights, layer 4 (fc, 576×64).
    pub fc0_weights: u32,
    /// Weights, layer 5 (fc, 64×12).
    pub fc1_weights: u32,
    /// Bias, layer 0.
    pub conv0_bias: u32,
    /// Bias, layer 2.
    pub conv1_bias: u32,
    /// Bias, layer 4.
    pub fc0_bias: u32,
    /// Bias, layer 5.
    pub fc1_bias: u32,
    /// Requantization scales, layer 0.
    pub scale0: u32,
    /// Requantization scales, layer 2.
    pub scale1: u32,
    /// Requantization scales, layer 4.
    pub scale2: u32,
    /// Image buffer base.
    pub image: u32,
}

impl Default for Cifar10Layout {
    fn default() -> Self {
        Self {
            conv0_weights: 1_000_000,
            conv1_weights: 1_010_000,
            fc0_weights: 1_020_000,
            fc1_weights: 1_060_000,
            conv0_bias: 1_070_000,
            conv1_bias: 1_071_000,
            fc0_bias: 1_072_000,
            fc1_bias: 1_073_000,
            scale0: 1_080_000,
            scale1: 1_081_000,
            scale2: 1_082_000,
            image: 32,
        }
    }
}

/// The six-layer CIFAR-10 CNN: CONV, POOL, CONV, POOL, FC, FC.
///
/// Shape words and output counts are the observed hardware constants;
/// requantize on the first FC layer, bias write-through on the second.
///
/// # Errors
///
/// Propagates topology validation, which cannot fail for this preset
/// unless the layout is degenerate.
pub fn cifar10(layout: &Cifar10Layout) -> Result<Topology> {
    Topology::new(vec![
        LayerDescriptor {
            kind: LayerKind::Conv,
            post_op: PostOp::None,
            weights: layout.conv0_weights,
            bias: layout.conv0_bias,
            input_shape: ShapeWord::raw(0x2003_0310),
            output_shape: ShapeWord::flat(14400),
            scale: layout.scale0,
        },
        LayerDescriptor {
            kind: LayerKind::Pool,
            post_op: PostOp::None,
            weights: 0,
            bias: 0,
            input_shape: ShapeWord::raw(0x1e22_0f10),
            output_shape: ShapeWord::flat(3600),
            scale: 0,
        },
        LayerDescriptor {
            kind: LayerKind::Conv,
            post_op: PostOp::None,
            weights: layout.conv1_weights,
            bias: layout.conv1_bias,
            input_shape: ShapeWord::raw(0x0f03_1010),
            output_shape: ShapeWord::flat(2704),
            scale: layout.scale1,
        },
        LayerDescriptor {
            kind: LayerKind::Pool,
            post_op: PostOp::None,
            weights: 0,
            bias: 0,
            input_shape: ShapeWord::raw(0x0d22_0610),
            output_shape: ShapeWord::flat(576),
            scale: 0,
        },
        LayerDescriptor {
            kind: LayerKind::Fc,
            post_op: PostOp::Requantize,
            weights: layout.fc0_weights,
            bias: layout.fc0_bias,
            input_shape: ShapeWord::flat(576),
            output_shape: ShapeWord::flat(64),
            scale: layout.scale2,
        },
        LayerDescriptor {
            kind: LayerKind::Fc,
            post_op: PostOp::WriteBias,
            weights: layout.fc1_weights,
            bias: layout.fc1_bias,
            input_shape: ShapeWord::flat(64),
            output_shape: ShapeWord::flat(12),
            scale: 0,
        },
    ])
}

/// Device memory plan for the MNIST FC network.
///
/// Defaults are the firmware's fixed staging addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnistFcLayout {
    /// Weights, layer 0 (fc, 784×100).
    pub fc0_weights: u32,
    /// Weights, layer 1 (fc, 100×10).
    pub fc1_weights: u32,
    /// Bias, layer 0.
    pub fc0_bias: u32,
    /// Bias, layer 1.
    pub fc1_bias: u32,
    /// Image buffer base.
    pub image: u32,
}

impl Default for MnistFcLayout {
    fn default() -> Self {
        Self {
            fc0_weights: 1_000_000,
            fc1_weights: 1_320_000,
            fc0_bias: 1_325_000,
            fc1_bias: 1_326_000,
            image: 30,
        }
    }
}

/// The two-layer MNIST FC classifier: 784 → 100 → 10.
///
/// # Errors
///
/// Propagates topology validation.
pub fn mnist_fc(layout: &MnistFcLayout) -> Result<Topology> {
    Topology::new(vec![
        LayerDescriptor {
            kind: LayerKind::Fc,
            post_op: PostOp::Requantize,
            weights: layout.fc0_weights,
            bias: layout.fc0_bias,
            input_shape: ShapeWord::flat(784),
            output_shape: ShapeWord::flat(100),
            scale: 0,
        },
        LayerDescriptor {
            kind: LayerKind::Fc,
            post_op: PostOp::WriteBias,
            weights: layout.fc1_weights,
            bias: layout.fc1_bias,
            input_shape: ShapeWord::flat(100),
            output_shape: ShapeWord::flat(10),
            scale: 0,
        },
    ])
}
