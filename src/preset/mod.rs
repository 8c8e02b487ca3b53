//! Single active-preset-slot state machine (`spec.md` §4.8).
//!
//! Timer expiry is not driven from inside this module: the facade owns the one worker thread
//! this core mutates state from (`spec.md` §5), so arming a preset here only returns the
//! `(generation, expiresAt)` pair the facade needs to schedule a plain `std::thread::sleep`
//! timer that posts a message back onto the facade's own command channel. Comparing the
//! generation on arrival is what lets a stale timer fired after the preset already changed be
//! silently ignored, without any cross-thread cancellation primitive.

use std::collections::HashSet;

/// The single active preset slot's state (`spec.md` §4.8).
#[derive(Clone, Debug, PartialEq)]
pub enum PresetState {
    None,
    Unarmed {
        preset_id: String,
        layer_ids: HashSet<String>,
    },
    Pending {
        preset_id: String,
        duration_ms: u32,
        layer_ids: HashSet<String>,
    },
    Armed {
        preset_id: String,
        duration_ms: u32,
        layer_ids: HashSet<String>,
        started_at: u64,
        expires_at: u64,
        generation: u64,
    },
}

impl PresetState {
    fn preset_id(&self) -> Option<&str> {
        match self {
            PresetState::None => None,
            PresetState::Unarmed { preset_id, .. }
            | PresetState::Pending { preset_id, .. }
            | PresetState::Armed { preset_id, .. } => Some(preset_id),
        }
    }

    fn duration_ms(&self) -> Option<u32> {
        match self {
            PresetState::None | PresetState::Unarmed { .. } => None,
            PresetState::Pending { duration_ms, .. } | PresetState::Armed { duration_ms, .. } => {
                Some(*duration_ms)
            }
        }
    }

    fn layer_ids(&self) -> Option<&HashSet<String>> {
        match self {
            PresetState::None => None,
            PresetState::Unarmed { layer_ids, .. }
            | PresetState::Pending { layer_ids, .. }
            | PresetState::Armed { layer_ids, .. } => Some(layer_ids),
        }
    }
}

/// Outcome of [`PresetService::on_layer_send`]: whether a prior preset's layers must be removed
/// by the caller before the new layer is committed.
#[derive(Debug, PartialEq)]
pub enum PresetArrival {
    Accepted,
    Replaced { removed_layer_ids: HashSet<String> },
}

/// Read-only snapshot of the active preset slot, for status reporting and `removePreset`.
#[derive(Clone, Debug, PartialEq)]
pub struct PresetSnapshot {
    pub preset_id: String,
    pub duration_ms: Option<u32>,
    pub layer_ids: HashSet<String>,
    pub started_at: Option<u64>,
    pub expires_at: Option<u64>,
    /// `Some` only while `Armed`; identifies which scheduled expiry timer this slot belongs to.
    pub generation: Option<u64>,
}

/// A timer the facade must schedule after a preset just armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArmedTimer {
    pub generation: u64,
    pub expires_at: u64,
}

/// Single active-preset-slot state machine.
#[derive(Default)]
pub struct PresetService {
    state: PresetState,
    next_generation: u64,
}

impl Default for PresetState {
    fn default() -> Self {
        PresetState::None
    }
}

impl PresetService {
    pub fn new() -> Self {
        Self {
            state: PresetState::None,
            next_generation: 0,
        }
    }

    pub fn state(&self) -> &PresetState {
        &self.state
    }

    /// A read-only snapshot of the active preset slot, or `None` if the slot is empty.
    pub fn snapshot(&self) -> Option<PresetSnapshot> {
        match &self.state {
            PresetState::None => None,
            PresetState::Unarmed { preset_id, layer_ids } => Some(PresetSnapshot {
                preset_id: preset_id.clone(),
                duration_ms: None,
                layer_ids: layer_ids.clone(),
                started_at: None,
                expires_at: None,
                generation: None,
            }),
            PresetState::Pending {
                preset_id,
                duration_ms,
                layer_ids,
            } => Some(PresetSnapshot {
                preset_id: preset_id.clone(),
                duration_ms: Some(*duration_ms),
                layer_ids: layer_ids.clone(),
                started_at: None,
                expires_at: None,
                generation: None,
            }),
            PresetState::Armed {
                preset_id,
                duration_ms,
                layer_ids,
                started_at,
                expires_at,
                generation,
            } => Some(PresetSnapshot {
                preset_id: preset_id.clone(),
                duration_ms: Some(*duration_ms),
                layer_ids: layer_ids.clone(),
                started_at: Some(*started_at),
                expires_at: Some(*expires_at),
                generation: Some(*generation),
            }),
        }
    }

    /// Step 9 of the `sendLayer` pipeline (`spec.md` §4.10): reconcile the incoming layer's
    /// preset membership against the current slot, per the send-arrival policies in §4.8.
    pub fn on_layer_send(
        &mut self,
        layer_id: &str,
        preset_id: Option<&str>,
        duration_ms: Option<u32>,
    ) -> PresetArrival {
        match preset_id {
            None => {
                if matches!(self.state, PresetState::None) {
                    PresetArrival::Accepted
                } else {
                    let removed = self.state.layer_ids().cloned().unwrap_or_default();
                    self.state = PresetState::None;
                    PresetArrival::Replaced {
                        removed_layer_ids: removed,
                    }
                }
            }
            Some(pid) => {
                if self.state.preset_id() == Some(pid) {
                    self.merge_or_repending(layer_id, duration_ms);
                    PresetArrival::Accepted
                } else if matches!(self.state, PresetState::None) {
                    self.start_new(pid, layer_id, duration_ms);
                    PresetArrival::Accepted
                } else {
                    let removed = self.state.layer_ids().cloned().unwrap_or_default();
                    self.start_new(pid, layer_id, duration_ms);
                    PresetArrival::Replaced {
                        removed_layer_ids: removed,
                    }
                }
            }
        }
    }

    fn start_new(&mut self, preset_id: &str, layer_id: &str, duration_ms: Option<u32>) {
        let layer_ids = HashSet::from([layer_id.to_string()]);
        self.state = match duration_ms {
            Some(d) if d > 0 => PresetState::Pending {
                preset_id: preset_id.to_string(),
                duration_ms: d,
                layer_ids,
            },
            _ => PresetState::Unarmed {
                preset_id: preset_id.to_string(),
                layer_ids,
            },
        };
    }

    fn merge_or_repending(&mut self, layer_id: &str, duration_ms: Option<u32>) {
        let current_duration = self.state.duration_ms();
        match duration_ms {
            Some(d) if d > 0 && Some(d) != current_duration => {
                let preset_id = self.state.preset_id().unwrap().to_string();
                let mut layer_ids = self.state.layer_ids().cloned().unwrap_or_default();
                layer_ids.insert(layer_id.to_string());
                self.state = PresetState::Pending {
                    preset_id,
                    duration_ms: d,
                    layer_ids,
                };
            }
            _ => {
                if let Some(layer_ids) = self.state_layer_ids_mut() {
                    layer_ids.insert(layer_id.to_string());
                }
            }
        }
    }

    fn state_layer_ids_mut(&mut self) -> Option<&mut HashSet<String>> {
        match &mut self.state {
            PresetState::None => None,
            PresetState::Unarmed { layer_ids, .. }
            | PresetState::Pending { layer_ids, .. }
            | PresetState::Armed { layer_ids, .. } => Some(layer_ids),
        }
    }

    /// Step in the cadence tick (`spec.md` §4.10): arm any Pending preset whose layers
    /// contributed a frame to this tick. Returns the timer the facade must schedule if a preset
    /// was just armed.
    pub fn note_tick_layers(
        &mut self,
        ticked_layer_ids: &HashSet<String>,
        now_ms: u64,
    ) -> Option<ArmedTimer> {
        let PresetState::Pending {
            preset_id,
            duration_ms,
            layer_ids,
        } = &self.state
        else {
            return None;
        };
        if !layer_ids.iter().any(|id| ticked_layer_ids.contains(id)) {
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let expires_at = now_ms + u64::from(*duration_ms);
        self.state = PresetState::Armed {
            preset_id: preset_id.clone(),
            duration_ms: *duration_ms,
            layer_ids: layer_ids.clone(),
            started_at: now_ms,
            expires_at,
            generation,
        };
        Some(ArmedTimer {
            generation,
            expires_at,
        })
    }

    /// Explicit preset removal (`removePreset` facade operation).
    pub fn remove_preset(&mut self) {
        self.state = PresetState::None;
    }

    /// A layer was removed from the layer map; clears the preset if it was the last member.
    /// Returns `true` if the preset slot was cleared as a result.
    pub fn on_layer_removed(&mut self, layer_id: &str) -> bool {
        let Some(layer_ids) = self.state_layer_ids_mut() else {
            return false;
        };
        layer_ids.remove(layer_id);
        if layer_ids.is_empty() {
            self.state = PresetState::None;
            true
        } else {
            false
        }
    }

    /// A scheduled expiry timer fired; clears the preset only if `generation` still matches the
    /// currently armed slot (a stale timer from a preset that already changed is ignored).
    pub fn on_timer_expired(&mut self, generation: u64) -> bool {
        if let PresetState::Armed {
            generation: current, ..
        } = &self.state
        {
            if *current == generation {
                self.state = PresetState::None;
                return true;
            }
        }
        false
    }

    /// `clearAll`: removes the preset slot unconditionally (`spec.md` §4.8).
    pub fn clear_all(&mut self) {
        self.state = PresetState::None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/preset/mod.rs"]
mod tests;
