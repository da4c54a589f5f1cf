//! Per-layer configuration address space.
//!
//! Configuration writes ride the same `MEM_WRITE` opcode as raw memory
//! writes; only the address distinguishes them. A configuration address is
//! composed as `(layer_index << 8) | field_id`, and the device resolves the
//! range itself — the driver performs no validation beyond what the types
//! enforce here.

/// Number of configuration fields the device reads per layer slot.
pub const FIELDS_PER_LAYER: usize = 9;

/// Highest addressable layer index; the composed address reserves eight
/// bits for the field id.
pub const MAX_LAYERS: usize = 255;

/// One of the nine per-layer configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfigField {
    /// Layer kind code (see [`layer_code`]).
    Kind = 0,
    /// Post-op / activation code (see [`post_op`]), FC layers only.
    PostOp = 1,
    /// Device address of the weight table, 0 if the layer has none.
    Weights = 2,
    /// Device address of the bias table, 0 if the layer has none.
    Bias = 3,
    /// Packed input-shape word, passed through verbatim.
    InputShape = 4,
    /// Packed output-shape word, passed through verbatim.
    OutputShape = 5,
    /// Device address of the requantization-scale table, 0 if unused.
    Scale = 6,
    /// Device address of the input image. Layer 0 only; bound per image.
    Image = 7,
    /// Total layer count. Layer 0 only; published before the field sweep.
    LayerCount = 8,
}

impl ConfigField {
    /// All nine fields in device write order.
    pub const ALL: [Self; FIELDS_PER_LAYER] = [
        Self::Kind,
        Self::PostOp,
        Self::Weights,
        Self::Bias,
        Self::InputShape,
        Self::OutputShape,
        Self::Scale,
        Self::Image,
        Self::LayerCount,
    ];

    /// Field id as encoded in the configuration address.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// Compose the configuration address for `(layer, field)`.
#[must_use]
pub const fn config_addr(layer: u8, field: ConfigField) -> u32 {
    (layer as u32) << 8 | field as u32
}

/// Layer kind codes as the device decodes them.
pub mod layer_code {
    /// Fully connected layer.
    pub const FC: i32 = 2;
    /// Convolution layer.
    pub const CONV: i32 = 3;
    /// Pooling layer.
    pub const POOL: i32 = 4;
}

/// Post-op codes, meaningful on FC layers only.
pub mod post_op {
    /// No post-op.
    pub const NONE: i32 = 0;
    /// Write the bias table through to the output.
    pub const WRITE_BIAS: i32 = 11;
    /// Requantize against the per-layer scale table.
    pub const REQUANTIZE: i32 = 12;
}
