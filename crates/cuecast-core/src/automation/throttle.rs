// Leading-edge throttle keyed by event name: the first event of a name opens
// a window, and further events of that name are dropped until it closes.
// No trailing call.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use crate::config::ThrottleConfig;

#[derive(Debug)]
pub struct EventThrottle {
    config: ThrottleConfig,
    windows: DashMap<String, Instant>,
}

impl EventThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// `true` if an evaluation pass for `event` may run now.
    pub fn admit(&self, event: &str) -> bool {
        let now = Instant::now();
        match self.windows.entry(event.to_owned()) {
            Entry::Occupied(mut opened) => {
                if now.duration_since(*opened.get()) < self.config.window {
                    return false;
                }
                opened.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn one_pass_per_window_per_name() {
        let throttle = EventThrottle::new(ThrottleConfig::default());
        let admitted = (0..100).filter(|_| throttle.admit("SceneCreated")).count();
        assert_eq!(admitted, 1);

        assert!(throttle.admit("InputCreated"));

        tokio::time::advance(Duration::from_millis(499)).await;
        assert!(!throttle.admit("SceneCreated"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(throttle.admit("SceneCreated"));
    }
}
