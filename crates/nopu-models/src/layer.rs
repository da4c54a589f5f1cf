//! Layer descriptors
//!
//! One descriptor per topology row, mapping one-to-one onto the device's
//! nine per-layer configuration fields. Descriptors are constructed once
//! per network definition and never mutated afterwards.

use nopu_cop::cfg::{layer_code, post_op, ConfigField};
use nopu_cop::ShapeWord;

/// Layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Convolution
    Conv,
    /// Pooling
    Pool,
    /// Fully connected
    Fc,
}

impl LayerKind {
    /// Device code written to the kind field.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Fc => layer_code::FC,
            Self::Conv => layer_code::CONV,
            Self::Pool => layer_code::POOL,
        }
    }
}

/// Post-op applied after the layer's arithmetic. Only meaningful on FC
/// layers; everything else carries [`PostOp::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PostOp {
    /// No post-op
    #[default]
    None,
    /// Write the bias table through to the output
    WriteBias,
    /// Requantize against the per-layer scale table
    Requantize,
}

impl PostOp {
    /// Device code written to the post-op field.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::None => post_op::NONE,
            Self::WriteBias => post_op::WRITE_BIAS,
            Self::Requantize => post_op::REQUANTIZE,
        }
    }
}

/// One row of the serialized network topology.
///
/// Pointer fields are device memory addresses, 0 when the layer has no such
/// table (pooling layers carry neither weights nor bias).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDescriptor {
    /// Layer kind
    pub kind: LayerKind,
    /// Post-op code, FC layers only
    pub post_op: PostOp,
    /// Weight table base address, 0 if none
    pub weights: u32,
    /// Bias table base address, 0 if none
    pub bias: u32,
    /// Packed input-shape word, passed through verbatim
    pub input_shape: ShapeWord,
    /// Packed output-shape word, passed through verbatim
    pub output_shape: ShapeWord,
    /// Requantization-scale table base address, 0 if unused
    pub scale: u32,
}

impl LayerDescriptor {
    /// Resolve the value of one configuration field for this layer.
    ///
    /// Fields without meaning for the layer resolve to 0 rather than being
    /// omitted — the device always reads all nine fields per layer slot.
    /// The image pointer is always 0 at load time (it is bound per image),
    /// and the layer count is only published through layer 0's slot.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn field_value(&self, field: ConfigField, layer_index: usize, layer_count: usize) -> i32 {
        match field {
            ConfigField::Kind => self.kind.code(),
            ConfigField::PostOp => self.post_op.code(),
            ConfigField::Weights => self.weights as i32,
            ConfigField::Bias => self.bias as i32,
            ConfigField::InputShape => self.input_shape.as_i32(),
            ConfigField::OutputShape => self.output_shape.as_i32(),
            ConfigField::Scale => self.scale as i32,
            ConfigField::Image => 0,
            ConfigField::LayerCount => {
                if layer_index == 0 {
                    layer_count as i32
                } else {
                    0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_layer() -> LayerDescriptor {
        LayerDescriptor {
            kind: LayerKind::Pool,
            post_op: PostOp::None,
            weights: 0,
            bias: 0,
            input_shape: ShapeWord::raw(0x1e22_0f10),
            output_shape: ShapeWord::flat(3600),
            scale: 0,
        }
    }

    #[test]
    fn kind_codes_match_device() {
        assert_eq!(LayerKind::Fc.code(), 2);
        assert_eq!(LayerKind::Conv.code(), 3);
        assert_eq!(LayerKind::Pool.code(), 4);
    }

    #[test]
    fn meaningless_fields_resolve_to_zero() {
        let layer = pool_layer();
        assert_eq!(layer.field_value(ConfigField::Weights, 1, 6), 0);
        assert_eq!(layer.field_value(ConfigField::Image, 1, 6), 0);
        assert_eq!(layer.field_value(ConfigField::LayerCount, 1, 6), 0);
    }

    #[test]
    fn layer_count_published_through_layer_zero_only() {
        let layer = pool_layer();
        assert_eq!(layer.field_value(ConfigField::LayerCount, 0, 6), 6);
        assert_eq!(layer.field_value(ConfigField::LayerCount, 3, 6), 0);
    }

    #[test]
    fn shape_words_pass_through_verbatim() {
        let layer = pool_layer();
        assert_eq!(
            layer.field_value(ConfigField::InputShape, 1, 6),
            0x1e22_0f10
        );
        assert_eq!(layer.field_value(ConfigField::OutputShape, 1, 6), 3600);
    }
}
