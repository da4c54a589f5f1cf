//! Topology container
//!
//! An ordered, immutable list of layer descriptors. Constructed once per
//! network definition; reconfiguring the device with a different layer
//! count always goes through a full reload, there is no partial update.

use crate::error::{ModelError, Result};
use crate::layer::{LayerDescriptor, LayerKind, PostOp};
use nopu_cop::cfg::{FIELDS_PER_LAYER, MAX_LAYERS};

/// Ordered network topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    layers: Vec<LayerDescriptor>,
}

impl Topology {
    /// Build a topology from an ordered layer list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, exceeds the device's layer
    /// limit, a pooling layer carries parameter tables, or a non-FC layer
    /// carries a post-op.
    pub fn new(layers: Vec<LayerDescriptor>) -> Result<Self> {
        if layers.is_empty() {
            return Err(ModelError::EmptyTopology);
        }
        if layers.len() > MAX_LAYERS {
            return Err(ModelError::TooManyLayers {
                count: layers.len(),
                max: MAX_LAYERS,
            });
        }

        for (index, layer) in layers.iter().enumerate() {
            if layer.kind == LayerKind::Pool && (layer.weights != 0 || layer.bias != 0) {
                return Err(ModelError::invalid_layer(
                    index,
                    "pooling layer carries weight or bias tables",
                ));
            }
            if layer.kind != LayerKind::Fc && layer.post_op != PostOp::None {
                return Err(ModelError::invalid_layer(
                    index,
                    "post-op on a non-FC layer",
                ));
            }
        }

        tracing::debug!(layers = layers.len(), "topology validated");
        Ok(Self { layers })
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True for the (unconstructible) empty topology — kept for API parity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LayerDescriptor> {
        self.layers.get(index)
    }

    /// Iterate layers in device order.
    pub fn iter(&self) -> std::slice::Iter<'_, LayerDescriptor> {
        self.layers.iter()
    }

    /// Total configuration writes one upload of this topology issues:
    /// the count publication plus all nine fields per layer.
    #[must_use]
    pub fn config_write_count(&self) -> usize {
        1 + FIELDS_PER_LAYER * self.layers.len()
    }
}

impl<'a> IntoIterator for &'a Topology {
    type Item = &'a LayerDescriptor;
    type IntoIter = std::slice::Iter<'a, LayerDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}
