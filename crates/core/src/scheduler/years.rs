//! Year windowing for search passes.

use std::time::Duration;

use tokio::time::Instant;

/// Walks the catalog one year per pass and tracks the loop timer.
#[derive(Debug)]
pub struct YearWindow {
    enabled: bool,
    years: Vec<i32>,
    index: usize,
    started: Instant,
    loop_timer: Duration,
}

impl YearWindow {
    pub fn new(enabled: bool, loop_timer: Duration) -> Self {
        Self {
            enabled,
            years: Vec::new(),
            index: 0,
            started: Instant::now(),
            loop_timer,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Years need (re)loading before the next pass.
    pub fn needs_load(&self) -> bool {
        self.enabled && self.years.is_empty()
    }

    pub fn load(&mut self, years: Vec<i32>) {
        self.years = years;
        self.index = 0;
    }

    /// Year the current pass is restricted to. `None` when windowing is off.
    pub fn current(&self) -> Option<i32> {
        if self.enabled {
            self.years.get(self.index).copied()
        } else {
            None
        }
    }

    /// Step to the next year; `false` once every year has been visited.
    pub fn advance(&mut self) -> bool {
        if self.index + 1 < self.years.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn timer_elapsed(&self) -> bool {
        self.started.elapsed() >= self.loop_timer
    }

    /// Whether the pass that just finished completes a full loop.
    pub fn finish_pass(&mut self) -> bool {
        if self.enabled {
            !self.advance() || self.timer_elapsed()
        } else {
            self.timer_elapsed()
        }
    }

    /// Start over: forget the years and restart the loop timer.
    pub fn restart(&mut self) {
        self.years.clear();
        self.index = 0;
        self.started = Instant::now();
    }
}
