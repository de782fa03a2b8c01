//! Fixed-step server loop.
//!
//! Wall-clock time accumulates and is spent in whole [`SERVER_STEP`]s, so
//! map upkeep runs at the same simulated rate however long each pass takes.

use std::time::{Duration, Instant};

use tracing::warn;

/// Simulated seconds per server step.
pub const SERVER_STEP: f64 = 0.1;

/// Longest frame accounted for; anything beyond is dropped instead of being
/// caught up with a burst of steps.
pub const MAX_FRAME_TIME: f64 = 2.0;

pub struct TickLoop {
    previous_time: Instant,
    accumulator: f64,
    uptime: f64,
    step_count: u64,
}

impl TickLoop {
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            accumulator: 0.0,
            uptime: 0.0,
            step_count: 0,
        }
    }

    /// Measures the time since the previous call and runs the steps it
    /// covers. Returns how many ran.
    pub fn tick<E>(&mut self, update_fn: impl FnMut(f64) -> Result<(), E>) -> Result<u32, E> {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.advance(frame_time, update_fn)
    }

    /// Runs the steps covered by `frame_time` seconds. An error from
    /// `update_fn` stops the remaining steps.
    pub fn advance<E>(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64) -> Result<(), E>,
    ) -> Result<u32, E> {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "server step took {:.0}ms, dropping time beyond {:.0}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }
        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= SERVER_STEP {
            update_fn(SERVER_STEP)?;
            self.accumulator -= SERVER_STEP;
            self.uptime += SERVER_STEP;
            self.step_count += 1;
            steps += 1;
        }
        Ok(steps)
    }

    /// Time left until the next step is due.
    pub fn time_to_next_step(&self) -> Duration {
        let elapsed = self.previous_time.elapsed().as_secs_f64();
        Duration::from_secs_f64((SERVER_STEP - self.accumulator - elapsed).max(0.0))
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Simulated seconds since start.
    pub fn uptime(&self) -> f64 {
        self.uptime
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn count_steps(loop_: &mut TickLoop, frame_time: f64) -> u32 {
        loop_
            .advance(frame_time, |_| Ok::<(), Infallible>(()))
            .unwrap()
    }

    #[test]
    fn test_single_step() {
        let mut loop_ = TickLoop::new();
        assert_eq!(count_steps(&mut loop_, SERVER_STEP), 1);
        assert!(loop_.accumulator.abs() < 1e-12);
    }

    #[test]
    fn test_partial_step_carries_over() {
        let mut loop_ = TickLoop::new();
        assert_eq!(count_steps(&mut loop_, 0.6 * SERVER_STEP), 0);
        assert_eq!(count_steps(&mut loop_, 0.6 * SERVER_STEP), 1);
        assert!((loop_.accumulator - 0.2 * SERVER_STEP).abs() < 1e-9);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut loop_ = TickLoop::new();
        let steps = count_steps(&mut loop_, 60.0);
        let max_steps = (MAX_FRAME_TIME / SERVER_STEP).ceil() as u32;
        assert!(steps > 0 && steps <= max_steps, "got {steps} steps");
    }

    #[test]
    fn test_negative_frame_time_ignored() {
        let mut loop_ = TickLoop::new();
        assert_eq!(count_steps(&mut loop_, -1.0), 0);
        assert!(loop_.accumulator.abs() < 1e-12);
    }

    #[test]
    fn test_uptime_matches_steps() {
        let mut loop_ = TickLoop::new();
        for _ in 0..10 {
            count_steps(&mut loop_, 0.25);
        }
        let expected = loop_.step_count() as f64 * SERVER_STEP;
        assert!((loop_.uptime() - expected).abs() < 1e-9);
        assert!((24..=25).contains(&loop_.step_count()));
    }

    #[test]
    fn test_error_stops_remaining_steps() {
        let mut loop_ = TickLoop::new();
        let mut calls = 0;
        let result = loop_.advance(5.0 * SERVER_STEP, |_| {
            calls += 1;
            if calls == 2 { Err("boom") } else { Ok(()) }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
        assert_eq!(loop_.step_count(), 1);
    }

    #[test]
    fn test_next_step_wait_is_bounded() {
        let loop_ = TickLoop::new();
        assert!(loop_.time_to_next_step() <= Duration::from_secs_f64(SERVER_STEP));
    }
}
