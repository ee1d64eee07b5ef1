use {std::time::Duration, thiserror::Error, tokio::time::Instant};

/// Used when a timeout is too large to be represented as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(24 * 60 * 60);

/// An absolute point in time by which some piece of work has to be done.
///
/// One deadline is derived per auction from its timeout. Every operation the
/// auction starts (an adapter call, a hook group) gets a deadline derived from
/// its parent with [`Deadline::derive`], so no sub-deadline ever exceeds the
/// auction's.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// The deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Self(
            now.checked_add(timeout)
                .unwrap_or_else(|| now + FAR_FUTURE),
        )
    }

    /// The earlier of `self` and `now + cap`.
    pub fn derive(self, cap: Duration) -> Self {
        match Instant::now().checked_add(cap) {
            Some(capped) => Self(self.0.min(capped)),
            None => self,
        }
    }

    /// Like [`Deadline::derive`] for an optional cap.
    pub fn derive_opt(self, cap: Option<Duration>) -> Self {
        cap.map_or(self, |cap| self.derive(cap))
    }

    /// Time left until the deadline, zero if it already passed.
    pub fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Time left until the deadline or an error if it already passed.
    pub fn remaining_or_exceeded(self) -> Result<Duration, DeadlineExceeded> {
        match self.remaining() {
            Duration::ZERO => Err(DeadlineExceeded),
            remaining => Ok(remaining),
        }
    }

    pub fn is_expired(self) -> bool {
        self.remaining().is_zero()
    }

    pub fn instant(self) -> Instant {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Error)]
#[error("the deadline has been exceeded")]
pub struct DeadlineExceeded;
