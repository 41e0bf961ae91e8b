//! Recent-lines buffer

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Keeps the last `capacity` lines, dropping any older than `max_age`.
#[derive(Debug)]
pub struct Scrollback {
    lines: VecDeque<(Instant, String)>,
    capacity: usize,
    max_age: Option<Duration>,
}

impl Scrollback {
    /// `age_ms` of 0 keeps lines regardless of age. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize, age_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            max_age: (age_ms > 0).then(|| Duration::from_millis(age_ms)),
        }
    }

    pub fn push(&mut self, line: String, now: Instant) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back((now, line));
    }

    /// Lines still within the age limit at `now`, oldest first, joined by newlines.
    pub fn visible(&mut self, now: Instant) -> String {
        if let Some(max_age) = self.max_age {
            while self
                .lines
                .front()
                .is_some_and(|(added, _)| now.saturating_duration_since(*added) > max_age)
            {
                self.lines.pop_front();
            }
        }
        self.lines
            .iter()
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
