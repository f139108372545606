//! Trailing-edge debounce: a key fires once its burst has gone quiet.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Editors save in bursts (autosave, format-on-save, atomic rename). Each
/// `note` restarts the key's quiet timer; `ready` releases keys whose last
/// event is at least one window old.
#[derive(Debug)]
pub struct Debouncer<K> {
    window: Duration,
    last: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Copy> Debouncer<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn note(&mut self, key: K, now: Instant) {
        self.last.insert(key, now);
    }

    /// Keys whose quiet period has elapsed, removed from the pending set.
    pub fn ready(&mut self, now: Instant) -> Vec<K> {
        let window = self.window;
        let mut fired = Vec::new();
        self.last.retain(|key, last| {
            if now.duration_since(*last) >= window {
                fired.push(*key);
                false
            } else {
                true
            }
        });
        fired
    }

    pub fn is_idle(&self) -> bool {
        self.last.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    #[test]
    fn a_burst_fires_once_after_going_quiet() {
        let mut d = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        d.note(1u32, t0);
        d.note(1u32, t0 + Duration::from_millis(10));
        d.note(1u32, t0 + Duration::from_millis(20));

        assert!(d.ready(t0 + Duration::from_millis(30)).is_empty());
        assert_eq!(d.ready(t0 + Duration::from_millis(20) + WINDOW), vec![1]);
        assert!(d.ready(t0 + Duration::from_secs(10)).is_empty());
        assert!(d.is_idle());
    }

    #[test]
    fn continued_edits_restart_the_timer() {
        let mut d = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        d.note(1u32, t0);
        // Another edit lands just before the window closes.
        let t1 = t0 + WINDOW - Duration::from_millis(1);
        d.note(1u32, t1);

        assert!(d.ready(t0 + WINDOW).is_empty());
        assert_eq!(d.ready(t1 + WINDOW), vec![1]);
    }

    #[test]
    fn keys_fire_independently() {
        let mut d = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        d.note(1u32, t0);
        d.note(2u32, t0 + Duration::from_millis(100));

        let first = d.ready(t0 + WINDOW);
        assert_eq!(first, vec![1]);
        assert!(!d.is_idle());

        let second = d.ready(t0 + Duration::from_millis(100) + WINDOW);
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn zero_window_fires_at_the_next_check() {
        let mut d = Debouncer::new(Duration::ZERO);
        let t0 = Instant::now();
        d.note(7u32, t0);
        assert_eq!(d.ready(t0), vec![7]);
    }
}
