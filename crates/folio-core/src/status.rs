//! Display-window statuses that expire on read

use std::time::Duration;
use tokio::time::Instant;

/// A status value that may fall back to its default after a display window
#[derive(Debug, Clone, Default)]
pub(crate) struct Transient<T> {
    value: T,
    shown_until: Option<Instant>,
}

impl<T: Clone + Default> Transient<T> {
    /// Hold `value` until replaced
    pub(crate) fn set(&mut self, value: T) {
        self.value = value;
        self.shown_until = None;
    }

    /// Show `value` for `window`, then fall back to the default
    pub(crate) fn flash(&mut self, value: T, window: Duration) {
        self.value = value;
        self.shown_until = Some(Instant::now() + window);
    }

    pub(crate) fn reset(&mut self) {
        self.set(T::default());
    }

    pub(crate) fn current(&self) -> T {
        match self.shown_until {
            Some(until) if Instant::now() >= until => T::default(),
            _ => self.value.clone(),
        }
    }
}
