use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info};

use crate::executor::TaskExecutor;
use crate::metrics::ACTIVE_VIRTUAL_USERS;
use crate::selector::TaskSelector;
use crate::services::Service;
use crate::session::{Session, ThinkTime};

/// Stand-in for "never", about 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + duration`, clamped to [`FAR_FUTURE`] instead of overflowing.
fn saturating_deadline(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Configuration for one virtual user.
#[derive(Debug, Clone)]
pub struct VirtualUserConfig {
    pub user_index: usize,
    pub service: Service,
    pub base_url: String,
    pub think_time: ThinkTime,
    pub test_duration: Duration,

    /// Fixed seed for task selection, request parameters and think times.
    /// `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

/// Runs one virtual user until `start_time + test_duration`.
///
/// Each iteration picks a task by weight, executes it and then pauses for the
/// think time. A request or pause still pending at the deadline is abandoned.
/// Failed tasks never stop the loop.
///
/// Returns the user's session so callers can inspect captured values.
pub async fn run_virtual_user(
    client: reqwest::Client,
    config: VirtualUserConfig,
    start_time: Instant,
) -> Session {
    let deadline = saturating_deadline(start_time, config.test_duration);
    let selector = TaskSelector::new(config.service.tasks());
    let executor = TaskExecutor::new(config.service, config.base_url.clone(), client);
    let mut session = Session::new(config.user_index);
    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    debug!(
        user = config.user_index,
        service = %config.service,
        base_url = %config.base_url,
        think_time = ?config.think_time,
        "Virtual user starting"
    );
    ACTIVE_VIRTUAL_USERS.inc();

    loop {
        if Instant::now() >= deadline {
            break;
        }

        let task = selector.select(&mut rng);

        tokio::select! {
            _ = executor.execute(task, &mut session, &mut rng) => {}
            _ = time::sleep_until(deadline) => {
                debug!(user = config.user_index, task = task.name, "Abandoning in-flight task at deadline");
                break;
            }
        }

        let pause = config.think_time.calculate_delay(&mut rng);
        time::sleep_until(deadline.min(saturating_deadline(Instant::now(), pause))).await;
    }

    ACTIVE_VIRTUAL_USERS.dec();
    info!(
        user = config.user_index,
        iterations = session.iterations(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Virtual user stopping after duration limit"
    );

    session
}
