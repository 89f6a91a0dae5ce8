//! Sliding window over probe outcomes.
//!
//! # Verdict Rules
//! ```text
//! len < window_size                     → NoVerdict
//! Polarity::Bad  { min }: bad  >= min   → Unhealthy, else Healthy
//! Polarity::Good { min }: good >= min   → Healthy,   else Unhealthy
//! ```
//!
//! # Design Decisions
//! - One window type for both roles; the polarity decides which count is compared
//! - Strict FIFO: the oldest outcome is evicted once capacity is exceeded
//! - A partially filled window never yields a verdict

use std::collections::VecDeque;

/// Verdict for a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Latency under the threshold.
    Good,
    /// Latency at or above the threshold, or no answer at all.
    Bad,
}

impl Outcome {
    /// Classify a measured round trip against the latency threshold.
    pub fn classify(elapsed: std::time::Duration, threshold: std::time::Duration) -> Self {
        if elapsed >= threshold {
            Outcome::Bad
        } else {
            Outcome::Good
        }
    }

    pub fn is_bad(self) -> bool {
        self == Outcome::Bad
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Good => "good",
            Outcome::Bad => "bad",
        }
    }
}

/// Health verdict of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NoVerdict,
    Healthy,
    Unhealthy,
}

/// Which outcome a window counts, and how many it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Unhealthy once at least `min_count` outcomes are bad.
    Bad { min_count: usize },
    /// Healthy once at least `min_count` outcomes are good.
    Good { min_count: usize },
}

/// Fixed-capacity sliding window of outcomes.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    outcomes: VecDeque<Outcome>,
    window_size: usize,
    polarity: Polarity,
}

impl LatencyWindow {
    pub fn new(window_size: usize, polarity: Polarity) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(window_size + 1),
            window_size,
            polarity,
        }
    }

    /// Append an outcome, evicting the oldest once the window is over capacity.
    pub fn record(&mut self, outcome: Outcome) {
        self.outcomes.push_back(outcome);
        while self.outcomes.len() > self.window_size {
            self.outcomes.pop_front();
        }
    }

    /// Evaluate the window. Side-effect free.
    pub fn verdict(&self) -> Verdict {
        if self.window_size == 0 || self.outcomes.len() < self.window_size {
            return Verdict::NoVerdict;
        }

        let bad = self.bad_count();
        match self.polarity {
            Polarity::Bad { min_count } => {
                if bad >= min_count {
                    Verdict::Unhealthy
                } else {
                    Verdict::Healthy
                }
            }
            Polarity::Good { min_count } => {
                if self.window_size - bad >= min_count {
                    Verdict::Healthy
                } else {
                    Verdict::Unhealthy
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.outcomes.clear();
    }

    pub fn bad_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_bad()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use Outcome::{Bad, Good};

    fn primary_window() -> LatencyWindow {
        LatencyWindow::new(10, Polarity::Bad { min_count: 7 })
    }

    fn fill(window: &mut LatencyWindow, outcomes: &[Outcome]) {
        for outcome in outcomes {
            window.record(*outcome);
        }
    }

    #[test]
    fn test_partial_window_has_no_verdict() {
        let mut window = primary_window();
        for _ in 0..9 {
            window.record(Bad);
            assert_eq!(window.verdict(), Verdict::NoVerdict);
        }
        window.record(Bad);
        assert_eq!(window.verdict(), Verdict::Unhealthy);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut window = primary_window();
        for i in 0..35 {
            window.record(if i % 3 == 0 { Bad } else { Good });
            assert!(window.len() <= 10);
        }
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn test_seven_bad_is_unhealthy_in_any_order() {
        let orders: [[Outcome; 10]; 3] = [
            [Bad, Bad, Bad, Bad, Bad, Bad, Bad, Good, Good, Good],
            [Good, Good, Good, Bad, Bad, Bad, Bad, Bad, Bad, Bad],
            [Bad, Good, Bad, Bad, Good, Bad, Bad, Good, Bad, Bad],
        ];
        for order in orders {
            let mut window = primary_window();
            fill(&mut window, &order);
            assert_eq!(window.verdict(), Verdict::Unhealthy, "{order:?}");
        }
    }

    #[test]
    fn test_six_bad_is_not_unhealthy() {
        let mut window = primary_window();
        fill(&mut window, &[Bad, Good, Bad, Bad, Good, Bad, Good, Bad, Good, Bad]);
        assert_eq!(window.bad_count(), 6);
        assert_eq!(window.verdict(), Verdict::Healthy);
    }

    #[test]
    fn test_sliding_evicts_oldest_and_flips_verdict() {
        let mut window = primary_window();
        fill(&mut window, &[Bad, Good, Good, Good, Bad, Bad, Bad, Bad, Bad, Bad]);
        assert_eq!(window.verdict(), Verdict::Unhealthy);

        // Evicts the leading Bad.
        window.record(Good);
        assert_eq!(window.len(), 10);
        assert_eq!(window.bad_count(), 6);
        assert_eq!(window.verdict(), Verdict::Healthy);

        // Evicts a Good.
        window.record(Bad);
        assert_eq!(window.bad_count(), 7);
        assert_eq!(window.verdict(), Verdict::Unhealthy);
    }

    #[test]
    fn test_good_polarity() {
        let mut window = LatencyWindow::new(10, Polarity::Good { min_count: 7 });
        fill(&mut window, &[Bad, Good, Good, Good, Good, Good, Good, Bad, Bad, Bad]);
        assert_eq!(window.verdict(), Verdict::Unhealthy);

        window.record(Good);
        assert_eq!(window.verdict(), Verdict::Healthy);
    }

    #[test]
    fn test_reset_clears_verdict() {
        let mut window = primary_window();
        fill(&mut window, &[Bad; 10]);
        assert_eq!(window.verdict(), Verdict::Unhealthy);

        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.verdict(), Verdict::NoVerdict);
    }

    #[test]
    fn test_classify_threshold_is_inclusive() {
        let threshold = Duration::from_millis(200);
        assert_eq!(Outcome::classify(Duration::from_millis(199), threshold), Good);
        assert_eq!(Outcome::classify(Duration::from_millis(200), threshold), Bad);
        assert_eq!(Outcome::classify(Duration::from_millis(950), threshold), Bad);
    }
}
