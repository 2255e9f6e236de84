//! Hit/session debouncing shared by the landmark-triggered zones.

use serde::{Deserialize, Serialize};

/// Thresholds of a [`Debounce`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceParams {
    /// Hits needed inside one session.
    pub min_hits: u32,
    /// Session length in frames.
    pub window: u32,
}

impl DebounceParams {
    pub const fn new(min_hits: u32, window: u32) -> Self {
        Self { min_hits, window }
    }
}

impl Default for DebounceParams {
    fn default() -> Self {
        Self::new(4, 8)
    }
}

/// Counts positive frames inside a session window.
///
/// The session starts with the first hit and advances every frame after
/// that. The debounce fires when `min_hits` hits land before the session
/// reaches `window` frames; otherwise the session expires and both counters
/// start over. Firing also clears the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Debounce {
    hits: u32,
    session: u32,
}

impl Debounce {
    /// Feed one frame; returns `true` on the frame the debounce fires.
    pub fn update(&mut self, hit: bool, params: DebounceParams) -> bool {
        if hit {
            self.hits = self.hits.saturating_add(1);
        }
        if self.hits > 0 {
            self.session = self.session.saturating_add(1);
        }

        if self.hits >= params.min_hits && self.session < params.window {
            self.reset();
            return true;
        }
        if self.session >= params.window {
            self.reset();
        }
        false
    }

    #[inline]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    #[inline]
    pub fn session(&self) -> u32 {
        self.session
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Increment a frame counter, saturating at `u32::MAX`.
#[inline]
pub(crate) fn tick(counter: &mut u32) -> u32 {
    *counter = counter.saturating_add(1);
    *counter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_enough_hits_inside_the_window() {
        let p = DebounceParams::new(3, 8);
        let mut d = Debounce::default();
        assert!(!d.update(true, p));
        assert!(!d.update(false, p));
        assert!(!d.update(true, p));
        assert!(d.update(true, p));
        assert_eq!(d, Debounce::default());
    }

    #[test]
    fn isolated_hit_expires() {
        let p = DebounceParams::new(2, 8);
        let mut d = Debounce::default();
        let fired = std::iter::repeat(false)
            .take(20)
            .chain([true])
            .chain(std::iter::repeat(false).take(20))
            .any(|hit| d.update(hit, p));
        assert!(!fired);
        assert_eq!(d.hits(), 0);
        assert_eq!(d.session(), 0);
    }

    #[test]
    fn hits_spread_over_two_sessions_do_not_fire() {
        let p = DebounceParams::new(2, 4);
        let mut d = Debounce::default();
        for hit in [true, false, false, false, true, false, false, false] {
            assert!(!d.update(hit, p));
        }
    }
}
