//! Phase-owned timers driven by frame deltas.

use std::time::Duration;

#[derive(Debug, Clone)]
struct Timer {
    period: Duration,
    elapsed: Duration,
    /// `None` loops forever.
    fires_left: Option<u32>,
}

impl Timer {
    fn until_next(&self) -> Duration {
        self.period.saturating_sub(self.elapsed)
    }
}

/// Every timer a phase owns. Cancelling the set silences all of them at once.
#[derive(Debug, Clone)]
pub struct TimerSet<K> {
    timers: Vec<(K, Timer)>,
}

impl<K> Default for TimerSet<K> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<K: Copy + PartialEq> TimerSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every `period` until cancelled. Replaces an existing timer with the same key.
    pub fn every(&mut self, key: K, period: Duration) {
        self.insert(key, period, None);
    }

    /// Fires `count` times, `period` apart.
    pub fn repeat(&mut self, key: K, period: Duration, count: u32) {
        if count > 0 {
            self.insert(key, period, Some(count));
        }
    }

    fn insert(&mut self, key: K, period: Duration, fires_left: Option<u32>) {
        assert!(!period.is_zero(), "timer period must be non-zero");
        self.cancel(key);
        self.timers.push((
            key,
            Timer {
                period,
                elapsed: Duration::ZERO,
                fires_left,
            },
        ));
    }

    pub fn cancel(&mut self, key: K) {
        self.timers.retain(|(k, _)| *k != key);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    #[cfg(test)]
    pub fn is_active(&self, key: K) -> bool {
        self.timers.iter().any(|(k, _)| *k == key)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advance all timers by `dt` and return the keys that fired in chronological
    /// order. Simultaneous fires keep insertion order.
    pub fn advance(&mut self, dt: Duration) -> Vec<K> {
        let mut fired = Vec::new();
        let mut left = dt;
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .map(|(i, (_, t))| (t.until_next(), i))
                .min();
            let Some((wait, idx)) = next.filter(|(wait, _)| *wait <= left) else {
                for (_, t) in &mut self.timers {
                    t.elapsed += left;
                }
                return fired;
            };
            for (_, t) in &mut self.timers {
                t.elapsed += wait;
            }
            left -= wait;

            let (key, timer) = &mut self.timers[idx];
            let key = *key;
            timer.elapsed = Duration::ZERO;
            let finished = match &mut timer.fires_left {
                Some(n) => {
                    *n -= 1;
                    *n == 0
                }
                None => false,
            };
            if finished {
                self.timers.remove(idx);
            }
            fired.push(key);
        }
    }
}

/// Minimum spacing between accepted inputs of one kind.
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    delay: Duration,
    remaining: Duration,
}

impl Cooldown {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            remaining: Duration::ZERO,
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        self.remaining = self.remaining.saturating_sub(dt);
    }

    /// True (and re-arms) if the input may go through now.
    pub fn try_fire(&mut self) -> bool {
        if !self.remaining.is_zero() {
            return false;
        }
        self.remaining = self.delay;
        true
    }

    pub fn reset(&mut self) {
        self.remaining = Duration::ZERO;
    }
}
