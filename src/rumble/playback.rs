//! Playback state machine for rumble effects
//!
//! ```text
//!            play(id, v != 0), audible
//!   Idle ─────────────────────────────► Active ──┐
//!    ▲                                    │  ▲   │ play (re-arm)
//!    │  play(_, 0) / below deadzone /     │  └───┘
//!    │  tick past stop_at / stop          │
//!    └────────────────────────────────────┘
//! ```
//!
//! The timeout is enforced by comparing the monotonic clock on every tick, so the
//! actuator can stay on at most one tick period longer than requested.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::rumble::actuator::{Actuator, DebouncedActuator};
use crate::rumble::duty_cycle::DutyCycleModulator;
use crate::rumble::effect_table::EffectTable;
use crate::rumble::policy::RumblePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveRumble {
    effect_id: usize,
    stop_at: Instant,
    magnitude: u32,
}

/// What a play command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Value 0: explicit stop
    Stopped,
    /// Unknown or free effect id
    Ignored,
    /// Magnitude below the deadzone, handled as a stop
    BelowDeadzone,
    Started { duration: Duration },
    Rearmed { duration: Duration },
}

/// The Idle/Active state machine driving one actuator
///
/// Only one effect plays at a time; playing another one while Active replaces
/// it and re-arms the timeout. Timeouts are checked on [`Playback::tick`], so the
/// caller must tick regularly even when nothing else happens.
///
/// # Examples
///
/// ```rust
/// use std::path::Path;
/// use std::time::{Duration, Instant};
/// use rumble_proxy::device::gpio::SysfsGpio;
/// use rumble_proxy::rumble::actuator::DebouncedActuator;
/// use rumble_proxy::rumble::effect_table::{Effect, EffectTable};
/// use rumble_proxy::rumble::playback::Playback;
/// use rumble_proxy::rumble::policy::RumblePolicy;
///
/// let mut table = EffectTable::new();
/// let id = table.upload(Effect::rumble(-1, 30000, 30000, 100)).unwrap();
/// let mut playback = Playback::new(RumblePolicy::default());
/// let gpio = SysfsGpio::open(Path::new("/sys/class/gpio/gpio227/value"));
/// let mut motor = DebouncedActuator::new(gpio);
///
/// let start = Instant::now();
/// playback.play(&table, i32::from(id), 1, start, &mut motor);
/// playback.tick(start + Duration::from_millis(100), &mut motor);
/// assert!(!playback.is_active());
/// ```
#[derive(Debug, Clone)]
pub struct Playback {
    policy: RumblePolicy,
    active: Option<ActiveRumble>,
    modulator: DutyCycleModulator,
}

impl Playback {
    pub fn new(policy: RumblePolicy) -> Self {
        Self {
            policy,
            active: None,
            modulator: DutyCycleModulator::new(policy.full_threshold, policy.duty_window),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn playing_effect(&self) -> Option<usize> {
        self.active.map(|active| active.effect_id)
    }

    pub fn stop_at(&self) -> Option<Instant> {
        self.active.map(|active| active.stop_at)
    }

    pub fn current_magnitude(&self) -> u32 {
        self.active.map_or(0, |active| active.magnitude)
    }

    /// Position inside the duty window; restarts at 0 whenever playback leaves Idle.
    pub fn pwm_tick_counter(&self) -> u32 {
        self.modulator.counter()
    }

    pub fn play<A: Actuator>(
        &mut self,
        table: &EffectTable,
        effect_id: i32,
        value: i32,
        now: Instant,
        actuator: &mut DebouncedActuator<A>,
    ) -> PlayOutcome {
        if value == 0 {
            debug!("Stop requested for effect {}", effect_id);
            self.stop(actuator);
            return PlayOutcome::Stopped;
        }

        let (slot, effect) = match EffectTable::slot_index(effect_id).zip(table.get(effect_id)) {
            Some(found) => found,
            None => {
                debug!("Ignoring play for unknown effect {}", effect_id);
                return PlayOutcome::Ignored;
            }
        };

        let magnitude = self.policy.scale_magnitude(effect.combined_magnitude());
        if !self.policy.is_audible(magnitude) {
            debug!(
                "Effect {} magnitude {} is below deadzone {}",
                effect_id, magnitude, self.policy.deadzone
            );
            self.stop(actuator);
            return PlayOutcome::BelowDeadzone;
        }

        let duration = self.policy.effective_duration(effect.duration_ms);
        let rearm = self.active.is_some();
        if !rearm {
            self.modulator.reset();
        }
        self.active = Some(ActiveRumble {
            effect_id: slot,
            stop_at: now + duration,
            magnitude,
        });
        actuator.set_state(self.modulator.is_on(magnitude));

        debug!(
            "Playing effect {} at magnitude {} for {:?} (rearm={})",
            slot, magnitude, duration, rearm
        );
        if rearm {
            PlayOutcome::Rearmed { duration }
        } else {
            PlayOutcome::Started { duration }
        }
    }

    /// Advances timeouts and the duty cycle; call once per loop iteration.
    pub fn tick<A: Actuator>(&mut self, now: Instant, actuator: &mut DebouncedActuator<A>) {
        match self.active {
            None => actuator.set_state(false),
            Some(active) if now >= active.stop_at => {
                debug!("Effect {} timed out", active.effect_id);
                self.active = None;
                actuator.set_state(false);
            }
            Some(active) => {
                let on = self.modulator.step(active.magnitude);
                actuator.set_state(on);
            }
        }
    }

    /// Forces Idle and switches the actuator off.
    pub fn stop<A: Actuator>(&mut self, actuator: &mut DebouncedActuator<A>) {
        self.active = None;
        actuator.set_state(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rumble::effect_table::Effect;
    use crate::rumble::testing::RecordingActuator;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn setup(effect: Effect) -> (EffectTable, Playback, DebouncedActuator<RecordingActuator>) {
        let mut table = EffectTable::new();
        table.upload(effect).unwrap();
        (
            table,
            Playback::new(RumblePolicy::default()),
            DebouncedActuator::new(RecordingActuator::default()),
        )
    }

    #[test]
    fn zero_value_always_stops() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 30000, 0));
        let now = Instant::now();

        assert!(matches!(
            playback.play(&table, 0, 1, now, &mut actuator),
            PlayOutcome::Started { .. }
        ));
        assert!(actuator.is_on());

        assert_eq!(playback.play(&table, 0, 0, now, &mut actuator), PlayOutcome::Stopped);
        assert!(!playback.is_active());
        assert!(!actuator.is_on());

        // stop while already idle, even for an unknown id
        assert_eq!(playback.play(&table, 9, 0, now, &mut actuator), PlayOutcome::Stopped);
        assert!(!playback.is_active());
        assert_eq!(actuator.last_requested(), Some(false));
    }

    #[test]
    fn unknown_or_out_of_range_ids_are_ignored() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 30000, 0));
        let now = Instant::now();

        assert_eq!(playback.play(&table, 4, 1, now, &mut actuator), PlayOutcome::Ignored);
        assert_eq!(playback.play(&table, -2, 1, now, &mut actuator), PlayOutcome::Ignored);
        assert_eq!(playback.play(&table, 40, 1, now, &mut actuator), PlayOutcome::Ignored);
        assert!(!playback.is_active());
        assert_eq!(actuator.writes_issued(), 0);
    }

    #[test]
    fn below_deadzone_stays_idle() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(-1, 500, 500, 0));
        let now = Instant::now();

        assert_eq!(
            playback.play(&table, 0, 1, now, &mut actuator),
            PlayOutcome::BelowDeadzone
        );
        assert!(!playback.is_active());
        assert!(!actuator.is_on());
        assert_eq!(actuator.backend().count(true), 0);
    }

    #[test]
    fn zero_duration_uses_default_timeout() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 10000, 0));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        assert_eq!(playback.stop_at(), Some(start + ms(200)));
    }

    #[test]
    fn long_duration_is_clamped() {
        let mut table = EffectTable::new();
        table.upload(Effect::rumble(0, 30000, 30000, 10000)).unwrap();
        let policy = RumblePolicy {
            max_duration_ms: 500,
            ..Default::default()
        };
        let mut playback = Playback::new(policy);
        let mut actuator = DebouncedActuator::new(RecordingActuator::default());
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        playback.tick(start + ms(499), &mut actuator);
        assert!(playback.is_active());
        playback.tick(start + ms(500), &mut actuator);
        assert!(!playback.is_active());
        assert!(!actuator.is_on());
    }

    #[test]
    fn timeout_switches_off_exactly_once() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 30000, 100));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        for elapsed in (10..100).step_by(10) {
            playback.tick(start + ms(elapsed), &mut actuator);
            assert!(playback.is_active());
        }

        playback.tick(start + ms(100), &mut actuator);
        assert!(!playback.is_active());
        playback.tick(start + ms(110), &mut actuator);
        playback.tick(start + ms(120), &mut actuator);

        assert_eq!(actuator.backend().writes(), &[true, false]);
    }

    #[test]
    fn full_magnitude_holds_on_every_tick() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 10000, 0));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        assert_eq!(playback.current_magnitude(), 40000);
        for elapsed in (10..200).step_by(10) {
            playback.tick(start + ms(elapsed), &mut actuator);
            assert!(actuator.is_on(), "actuator dropped at {}ms", elapsed);
        }
        assert_eq!(actuator.backend().count(false), 0);
    }

    #[test]
    fn weak_magnitude_pulses_two_on_two_off() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 10000, 5000, 1000));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        let mut states = Vec::new();
        for tick in 1..=12u64 {
            playback.tick(start + ms(tick * 10), &mut actuator);
            states.push(actuator.is_on());
        }

        assert_eq!(&states[..4], &[true, true, false, false]);
        for window in states.windows(4) {
            assert_eq!(window.iter().filter(|&&on| on).count(), 2);
        }
    }

    #[test]
    fn replay_while_active_rearms_without_toggling_off() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 30000, 30000, 100));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        playback.tick(start + ms(50), &mut actuator);
        assert_eq!(
            playback.play(&table, 0, 1, start + ms(80), &mut actuator),
            PlayOutcome::Rearmed {
                duration: ms(100)
            }
        );
        playback.tick(start + ms(150), &mut actuator);

        assert!(playback.is_active());
        assert_eq!(playback.stop_at(), Some(start + ms(180)));
        assert_eq!(actuator.backend().writes(), &[true]);
    }

    #[test]
    fn idle_tick_keeps_actuator_off() {
        let mut playback = Playback::new(RumblePolicy::default());
        let mut actuator = DebouncedActuator::new(RecordingActuator::default());
        let now = Instant::now();

        playback.tick(now, &mut actuator);
        playback.tick(now + ms(10), &mut actuator);
        assert_eq!(actuator.backend().writes(), &[false]);
    }

    #[test]
    fn new_effect_restarts_the_pulse_window() {
        let (table, mut playback, mut actuator) = setup(Effect::rumble(0, 10000, 5000, 1000));
        let start = Instant::now();

        playback.play(&table, 0, 1, start, &mut actuator);
        for tick in 1..=3u64 {
            playback.tick(start + ms(tick * 10), &mut actuator);
        }
        assert_eq!(playback.pwm_tick_counter(), 3);

        // a re-arm keeps the phase
        playback.play(&table, 0, 1, start + ms(35), &mut actuator);
        assert_eq!(playback.pwm_tick_counter(), 3);

        playback.stop(&mut actuator);
        playback.play(&table, 0, 1, start + ms(40), &mut actuator);
        assert_eq!(playback.pwm_tick_counter(), 0);
        assert!(actuator.is_on());
    }
}
