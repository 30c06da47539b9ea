//! Fixed-capacity table of uploaded rumble effects.
//!
//! Slots are pre-allocated and addressed by the effect id the kernel hands back to
//! the application, so an id is simply an index into the arena.

use tracing::debug;

use crate::rumble::error::EffectError;

/// Number of effects the virtual device advertises (`ff_effects_max`).
pub const MAX_EFFECTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Rumble,
    /// Any other force-feedback type, identified by its kernel type code
    Other(u16),
}

/// An uploaded force-feedback effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub id: i16,
    pub kind: EffectKind,
    pub strong_magnitude: u16,
    pub weak_magnitude: u16,
    /// Requested play length; 0 selects the policy default
    pub duration_ms: u16,
}

impl Effect {
    pub fn rumble(id: i16, strong_magnitude: u16, weak_magnitude: u16, duration_ms: u16) -> Self {
        Self {
            id,
            kind: EffectKind::Rumble,
            strong_magnitude,
            weak_magnitude,
            duration_ms,
        }
    }

    /// Combined motor magnitude, saturating rather than wrapping.
    pub fn combined_magnitude(&self) -> u32 {
        u32::from(self.strong_magnitude).saturating_add(u32::from(self.weak_magnitude))
    }
}

/// Fixed arena of [`MAX_EFFECTS`] rumble effects
///
/// The slot index is the effect id handed back to the application, so ids stay
/// stable for the lifetime of an effect and a freed id is reused by the next
/// upload that asks for one.
///
/// # Examples
///
/// ```rust
/// use rumble_proxy::rumble::effect_table::{Effect, EffectTable};
///
/// let mut table = EffectTable::new();
///
/// // -1 asks for the lowest free slot
/// let id = table.upload(Effect::rumble(-1, 20000, 0, 0)).unwrap();
/// assert_eq!(id, 0);
///
/// // uploading with a known id replaces the effect in place
/// table.upload(Effect::rumble(id, 5000, 5000, 300)).unwrap();
/// assert_eq!(table.in_use(), 1);
///
/// table.erase(i32::from(id)).unwrap();
/// assert_eq!(table.in_use(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct EffectTable {
    slots: [Option<Effect>; MAX_EFFECTS],
}

impl Default for EffectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectTable {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_EFFECTS],
        }
    }

    /// Number of slots currently holding an effect.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Stores an effect and returns the id it lives under.
    ///
    /// Non-rumble effects are accepted without being stored, and keep the id the
    /// caller supplied. A negative id asks for the lowest free slot.
    pub fn upload(&mut self, mut effect: Effect) -> Result<i16, EffectError> {
        if effect.kind != EffectKind::Rumble {
            debug!("Accepting non-rumble effect {:?} without storing it", effect.kind);
            return Ok(effect.id);
        }

        let slot = if effect.id < 0 {
            self.slots
                .iter()
                .position(Option::is_none)
                .ok_or(EffectError::NoSpace {
                    capacity: MAX_EFFECTS,
                })?
        } else {
            let id = i32::from(effect.id);
            Self::slot_index(id).ok_or(EffectError::InvalidId(id))?
        };

        // slot < MAX_EFFECTS, which always fits in an i16
        effect.id = slot as i16;
        let replaced = self.slots[slot].replace(effect).is_some();
        debug!(
            "Stored rumble effect in slot {} (strong={}, weak={}, duration={}ms, replaced={})",
            slot, effect.strong_magnitude, effect.weak_magnitude, effect.duration_ms, replaced
        );

        Ok(effect.id)
    }

    /// Frees a slot. Freeing an empty slot is not an error.
    pub fn erase(&mut self, id: i32) -> Result<(), EffectError> {
        let slot = Self::slot_index(id).ok_or(EffectError::InvalidId(id))?;
        if self.slots[slot].take().is_some() {
            debug!("Erased effect in slot {}", slot);
        }
        Ok(())
    }

    pub fn get(&self, id: i32) -> Option<&Effect> {
        Self::slot_index(id).and_then(|slot| self.slots[slot].as_ref())
    }

    pub fn slot_index(id: i32) -> Option<usize> {
        usize::try_from(id).ok().filter(|&slot| slot < MAX_EFFECTS)
    }
}
