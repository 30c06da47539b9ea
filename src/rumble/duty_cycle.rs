//! Two-band duty-cycle modulator.
//!
//! Magnitudes at or above the threshold hold the actuator on. Anything weaker pulses:
//! on for the first half of the window, off for the second half.

#[derive(Debug, Clone)]
pub struct DutyCycleModulator {
    threshold: u32,
    window: u32,
    counter: u32,
}

impl DutyCycleModulator {
    pub fn new(threshold: u32, window: u32) -> Self {
        Self {
            threshold,
            // window is validated by RumblePolicy; never divide by zero regardless
            window: window.max(2),
            counter: 0,
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Actuator state for the current position in the window.
    pub fn is_on(&self, magnitude: u32) -> bool {
        magnitude >= self.threshold || self.counter % self.window < self.window / 2
    }

    /// Decides the state for this tick, then advances the window.
    pub fn step(&mut self, magnitude: u32) -> bool {
        let on = self.is_on(magnitude);
        self.counter = (self.counter + 1) % self.window;
        on
    }
}
