//! Per-virtual-user state and think-time pacing.
//!
//! A [`Session`] lives for exactly one virtual user. It is never shared, so it
//! needs no locking; the only thing it remembers between tasks is what a create
//! call handed back.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

/// Think time configuration for realistic user behavior simulation.
///
/// Think time is the pause a virtual user takes after each task, simulating
/// the time a real user spends reading before the next click.
///
/// # Examples
/// ```
/// use service_loadtest::session::ThinkTime;
/// use std::time::Duration;
///
/// // Random delay between 1 and 3 seconds
/// let think_time = ThinkTime::Random {
///     min: Duration::from_secs(1),
///     max: Duration::from_secs(3),
/// };
/// let delay = think_time.calculate_delay(&mut rand::thread_rng());
/// assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThinkTime {
    /// Fixed delay (always the same duration)
    Fixed(Duration),

    /// Uniformly random delay within a range (min to max, inclusive)
    Random { min: Duration, max: Duration },
}

impl ThinkTime {
    /// Calculate the actual delay to apply.
    pub fn calculate_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match self {
            ThinkTime::Fixed(duration) => *duration,
            ThinkTime::Random { min, max } => {
                if min >= max {
                    return *min;
                }
                let random_ms = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                Duration::from_millis(random_ms)
            }
        }
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        ThinkTime::Random {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

/// State owned by one virtual user across its task iterations.
#[derive(Debug, Clone)]
pub struct Session {
    /// Index of the virtual user, used in logs
    user_index: usize,

    /// Values captured from responses (e.g. the id of a created user)
    variables: HashMap<String, String>,

    /// Tasks attempted so far
    iterations: u64,
}

impl Session {
    /// Create a new, empty session for the given virtual user.
    pub fn new(user_index: usize) -> Self {
        Self {
            user_index,
            variables: HashMap::new(),
            iterations: 0,
        }
    }

    pub fn user_index(&self) -> usize {
        self.user_index
    }

    /// Store a captured value, replacing any earlier one under the same name.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Get a previously captured value.
    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Forget a captured value.
    pub fn clear_variable(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations += 1;
    }
}
