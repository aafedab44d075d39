//! Per-actor sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::ActorId;

pub struct RateLimiter {
    window: Duration,
    budget: usize,
    seen: Mutex<HashMap<ActorId, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, budget: usize) -> Self {
        Self {
            window,
            budget,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record one update for `actor` and report whether it is within budget.
    pub fn allow(&self, actor: ActorId) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        // Expire stale timestamps everywhere and drop actors whose window
        // emptied, so the map only holds recently active actors.
        seen.retain(|id, window| {
            while window
                .front()
                .is_some_and(|t| now.duration_since(*t) > self.window)
            {
                window.pop_front();
            }
            *id == actor || !window.is_empty()
        });
        let window = seen.entry(actor).or_default();
        if window.len() >= self.budget {
            return false;
        }
        window.push_back(now);
        true
    }
}
