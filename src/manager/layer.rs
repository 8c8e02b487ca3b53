//! Layer map and category index (`spec.md` §3, §4.10 steps 10-11).

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::{Category, Layer};

/// Global cap on simultaneously active layers (`spec.md` §3).
pub const MAX_LAYERS: usize = 3;

/// Layers keyed by id, plus the at-most-one-per-category index.
///
/// Backed by an insertion-ordered map rather than `HashMap` because `snapshot_for_compositing`
/// must break same-`zIndex` ties by insertion order (`spec.md` §8 invariant 6); a `HashMap`'s
/// iteration order is randomized per-process and would make that tie-break non-deterministic.
#[derive(Default)]
pub struct LayerMap {
    layers: IndexMap<String, Layer>,
    category_index: HashMap<Category, String>,
}

impl LayerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, layer_id: &str) -> Option<&Layer> {
        self.layers.get(layer_id)
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn get_mut(&mut self, layer_id: &str) -> Option<&mut Layer> {
        self.layers.get_mut(layer_id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// The layer id currently occupying `category`, if any (other than `excluding`).
    pub fn category_occupant(&self, category: Category, excluding: &str) -> Option<&str> {
        self.category_index
            .get(&category)
            .filter(|id| id.as_str() != excluding)
            .map(|id| id.as_str())
    }

    /// Step 10 of `sendLayer` (`spec.md` §4.10): category single-occupancy and the global-3 cap.
    /// A send that updates an already-present layer (by id) never counts against either limit.
    pub fn check_limits(&self, layer_id: &str, category: Category) -> Result<(), String> {
        if self.layers.contains_key(layer_id) {
            return Ok(());
        }
        if let Some(occupant) = self.category_occupant(category, layer_id) {
            return Err(format!(
                "category '{category:?}' already occupied by layer '{occupant}'"
            ));
        }
        if self.layers.len() >= MAX_LAYERS {
            return Err(format!("global layer cap of {MAX_LAYERS} reached"));
        }
        Ok(())
    }

    /// Step 11: commit the new/updated layer, preserving any prior `lastFrame`.
    pub fn commit(&mut self, mut layer: Layer) {
        if layer.last_frame.is_none()
            && let Some(existing) = self.layers.get(&layer.layer_id)
        {
            layer.last_frame = existing.last_frame.clone();
        }
        self.category_index
            .insert(layer.category, layer.layer_id.clone());
        self.layers.insert(layer.layer_id.clone(), layer);
    }

    pub fn remove(&mut self, layer_id: &str) -> Option<Layer> {
        let layer = self.layers.shift_remove(layer_id)?;
        if self.category_index.get(&layer.category).map(String::as_str) == Some(layer_id) {
            self.category_index.remove(&layer.category);
        }
        Some(layer)
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.category_index.clear();
    }

    /// Overwrite `layer_id`'s `lastFrame`, discarding frames for unknown layers (`spec.md` §4.10
    /// frame intake rule).
    pub fn set_last_frame(&mut self, layer_id: &str, frame: crate::model::RgbaFrame) -> bool {
        match self.layers.get_mut(layer_id) {
            Some(layer) => {
                layer.last_frame = Some(frame);
                true
            }
            None => false,
        }
    }

    /// Layers with a `lastFrame`, ascending by `zIndex` then insertion order (`spec.md` §4.10
    /// cadence step), for handing to the compositor.
    pub fn snapshot_for_compositing(&self) -> Vec<&Layer> {
        let mut snapshot: Vec<&Layer> = self
            .layers
            .values()
            .filter(|l| l.last_frame.is_some())
            .collect();
        snapshot.sort_by_key(|l| l.z_index);
        snapshot
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/layer.rs"]
mod tests;
