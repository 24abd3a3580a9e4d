// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Progress reporting for long running passes

use tracing::info;

/// Receives progress updates while a snapshot is being analysed.
///
/// A pass calls [`start`](Progress::start) with a description and the
/// number of steps it expects, reports steps with
/// [`advance`](Progress::advance) or [`update`](Progress::update), and
/// finishes with [`done`](Progress::done).
#[cfg_attr(test, mockall::automock)]
pub trait Progress {
    /// Begin a new phase of `duration` steps.
    fn start(&mut self, description: &str, duration: u64);

    /// Move forward by `n` steps.
    fn advance(&mut self, n: u64);

    /// Set the absolute number of completed steps.
    fn update(&mut self, current: u64);

    /// The current phase is complete.
    fn done(&mut self);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn start(&mut self, _description: &str, _duration: u64) {}

    fn advance(&mut self, _n: u64) {}

    fn update(&mut self, _current: u64) {}

    fn done(&mut self) {}
}

/// Logs phase starts, completions and every tenth of a phase.
#[derive(Debug, Default)]
pub struct TracingProgress {
    description: String,
    duration: u64,
    current: u64,
    last_decile: u64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn decile(&self) -> u64 {
        if self.duration == 0 { 10 } else { (self.current.min(self.duration) * 10) / self.duration }
    }

    fn report(&mut self) {
        let decile = self.decile();
        if decile > self.last_decile && decile < 10 {
            info!(phase = %self.description, percent = decile * 10, "Progress");
        }
        self.last_decile = self.last_decile.max(decile);
    }
}

impl Progress for TracingProgress {
    fn start(&mut self, description: &str, duration: u64) {
        self.description = description.to_string();
        self.duration = duration;
        self.current = 0;
        self.last_decile = 0;
        info!(phase = %self.description, steps = duration, "Phase started");
    }

    fn advance(&mut self, n: u64) {
        self.current += n;
        self.report();
    }

    fn update(&mut self, current: u64) {
        self.current = current;
        self.report();
    }

    fn done(&mut self) {
        info!(phase = %self.description, steps = self.current, "Phase done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_progress_tracks_deciles() {
        let mut progress = TracingProgress::new();
        progress.start("walk", 100);
        progress.advance(25);
        assert_eq!(progress.last_decile, 2);
        progress.update(99);
        assert_eq!(progress.last_decile, 9);
        progress.advance(1);
        assert_eq!(progress.last_decile, 10);
        progress.done();

        progress.start("empty", 0);
        assert_eq!(progress.decile(), 10);
    }

    #[test]
    fn test_null_progress_is_silent() {
        let mut progress = NullProgress;
        progress.start("anything", 10);
        progress.advance(3);
        progress.update(10);
        progress.done();
    }
}
