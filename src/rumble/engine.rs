use std::time::Instant;
use tracing::{debug, info};

use crate::rumble::actuator::{Actuator, DebouncedActuator};
use crate::rumble::effect_table::{Effect, EffectTable};
use crate::rumble::error::EffectError;
use crate::rumble::playback::{PlayOutcome, Playback};
use crate::rumble::policy::RumblePolicy;

/// Owns every piece of force-feedback state for one proxy.
///
/// The forwarding loop is the only caller, so no locking is involved: the effect
/// table, the playback state and the actuator cache all live here and are mutated
/// through `&mut self`.
#[derive(Debug)]
pub struct RumbleEngine<A: Actuator> {
    table: EffectTable,
    playback: Playback,
    actuator: DebouncedActuator<A>,
}

impl<A: Actuator> RumbleEngine<A> {
    pub fn new(policy: RumblePolicy, backend: A) -> Self {
        debug!("Creating rumble engine with policy: {:?}", policy);
        Self {
            table: EffectTable::new(),
            playback: Playback::new(policy),
            actuator: DebouncedActuator::new(backend),
        }
    }

    pub fn table(&self) -> &EffectTable {
        &self.table
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn actuator(&self) -> &DebouncedActuator<A> {
        &self.actuator
    }

    /// Stores an effect; re-uploading the playing effect leaves playback running.
    pub fn upload(&mut self, effect: Effect) -> Result<i16, EffectError> {
        self.table.upload(effect)
    }

    /// Frees an effect, stopping playback if it was the one driving the actuator.
    pub fn erase(&mut self, effect_id: i32) -> Result<(), EffectError> {
        self.table.erase(effect_id)?;

        let freed = EffectTable::slot_index(effect_id);
        if freed.is_some() && self.playback.playing_effect() == freed {
            debug!("Erased effect {} was playing, stopping", effect_id);
            self.playback.stop(&mut self.actuator);
        }
        Ok(())
    }

    pub fn play(&mut self, effect_id: i32, value: i32, now: Instant) -> PlayOutcome {
        self.playback
            .play(&self.table, effect_id, value, now, &mut self.actuator)
    }

    pub fn tick(&mut self, now: Instant) {
        self.playback.tick(now, &mut self.actuator);
    }

    /// Forces the actuator off; used when the proxy exits.
    pub fn shutdown(&mut self) {
        if self.playback.is_active() {
            info!("Stopping active rumble for shutdown");
        }
        self.playback.stop(&mut self.actuator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rumble::effect_table::MAX_EFFECTS;
    use crate::rumble::testing::RecordingActuator;
    use std::time::Duration;

    fn engine() -> RumbleEngine<RecordingActuator> {
        RumbleEngine::new(RumblePolicy::default(), RecordingActuator::default())
    }

    #[test]
    fn full_rumble_scenario() {
        let mut engine = engine();
        let start = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 30000, 10000, 0)).unwrap();
        assert_eq!(id, 0);

        engine.play(i32::from(id), 1, start);
        assert!(engine.actuator().is_on());

        let mut elapsed = Duration::ZERO;
        while elapsed < Duration::from_millis(200) {
            engine.tick(start + elapsed);
            assert!(engine.actuator().is_on());
            elapsed += Duration::from_millis(10);
        }

        engine.tick(start + Duration::from_millis(200));
        assert!(!engine.actuator().is_on());
        assert!(!engine.playback().is_active());
    }

    #[test]
    fn quiet_effect_never_reaches_actuator() {
        let mut engine = engine();
        let now = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 500, 500, 0)).unwrap();
        engine.play(i32::from(id), 1, now);
        engine.tick(now + Duration::from_millis(10));

        assert!(!engine.playback().is_active());
        assert_eq!(engine.actuator().backend().count(true), 0);
    }

    #[test]
    fn erase_then_play_never_activates() {
        let mut engine = engine();
        let now = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        engine.erase(i32::from(id)).unwrap();
        assert_eq!(engine.play(i32::from(id), 1, now), PlayOutcome::Ignored);

        assert!(!engine.playback().is_active());
        assert_eq!(engine.actuator().backend().count(true), 0);
    }

    #[test]
    fn erasing_the_playing_effect_stops_it() {
        let mut engine = engine();
        let now = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        engine.play(i32::from(id), 1, now);
        assert!(engine.actuator().is_on());

        engine.erase(i32::from(id)).unwrap();
        assert!(!engine.playback().is_active());
        assert!(!engine.actuator().is_on());
    }

    #[test]
    fn erasing_another_effect_keeps_playback() {
        let mut engine = engine();
        let now = Instant::now();

        let playing = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        let other = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        engine.play(i32::from(playing), 1, now);

        engine.erase(i32::from(other)).unwrap();
        assert!(engine.playback().is_active());
        assert!(engine.actuator().is_on());
    }

    #[test]
    fn reupload_of_playing_effect_keeps_playback() {
        let mut engine = engine();
        let now = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        engine.play(i32::from(id), 1, now);
        engine
            .upload(Effect::rumble(id, 1000, 1000, 0))
            .unwrap();

        assert!(engine.playback().is_active());
        assert_eq!(engine.actuator().backend().writes(), &[true]);
    }

    #[test]
    fn erase_out_of_range_is_reported_without_side_effects() {
        let mut engine = engine();
        assert_eq!(
            engine.erase(MAX_EFFECTS as i32),
            Err(EffectError::InvalidId(MAX_EFFECTS as i32))
        );
        assert_eq!(engine.actuator().writes_issued(), 0);
    }

    #[test]
    fn shutdown_forces_idle() {
        let mut engine = engine();
        let now = Instant::now();

        let id = engine.upload(Effect::rumble(-1, 30000, 30000, 0)).unwrap();
        engine.play(i32::from(id), 1, now);
        engine.shutdown();

        assert!(!engine.playback().is_active());
        assert_eq!(engine.actuator().backend().writes(), &[true, false]);
    }
}
