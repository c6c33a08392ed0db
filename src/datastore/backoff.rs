use tokio::time::Duration;

/// ExponentialBackoff yields the delays to wait between consecutive attempts: `initial`,
/// `initial * multiplier`, `initial * multiplier^2`, ..., each capped at `max`.
#[derive(Clone, Debug)]
pub(crate) struct ExponentialBackoff {
    next: Duration,
    multiplier: f64,
    max: Duration,
}

impl ExponentialBackoff {
    pub(crate) fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        ExponentialBackoff {
            next: initial.min(max),
            multiplier,
            max,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        let scaled = self.next.as_secs_f64() * self.multiplier;
        self.next = if scaled >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(scaled)
        };

        Some(current)
    }
}
