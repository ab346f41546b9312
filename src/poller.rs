use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Extension counted when waiting for output images.
pub const IMAGE_EXTENSION: &str = ".png";

/// Time source for the polling loops.
///
/// [`TokioClock`] is used for real runs. [`ManualClock`] advances virtual
/// time on every sleep so polling can be exercised without waiting.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Wall-clock time backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and moves `now` forward.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<u32>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock starting at the current instant with no time slept.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(0),
        }
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|d| *d).unwrap_or_default()
    }

    /// Number of `sleep` calls so far.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.lock().map(|n| *n).unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
        if let Ok(mut sleeps) = self.sleeps.lock() {
            *sleeps += 1;
        }
    }
}

/// Check `ready` every `interval` until it holds or `timeout` elapses.
///
/// Returns `true` as soon as `ready` returns `true`, `false` on timeout.
/// A zero timeout never checks.
pub async fn poll_until<C, F>(
    clock: &C,
    interval: Duration,
    timeout: Duration,
    mut ready: F,
) -> bool
where
    C: Clock,
    F: FnMut() -> bool,
{
    let start = clock.now();
    while clock.now().duration_since(start) < timeout {
        if ready() {
            return true;
        }
        clock.sleep(interval).await;
    }
    false
}

/// Wait for ComfyUI to create the run's output directory.
pub async fn wait_for_directory<C: Clock>(
    clock: &C,
    dir: &Path,
    interval: Duration,
    timeout: Duration,
) -> bool {
    info!(dir = %dir.display(), "Waiting for output directory to be created");
    let found = poll_until(clock, interval, timeout, || dir.is_dir()).await;
    if found {
        info!(dir = %dir.display(), "Output directory found");
    } else {
        warn!(
            dir = %dir.display(),
            timeout_secs = timeout.as_secs(),
            "Timeout waiting for output directory to be created"
        );
    }
    found
}

/// Wait until `dir` holds at least `expected` PNG files.
///
/// Files are counted, not matched to checkpoints.
pub async fn wait_for_images<C: Clock>(
    clock: &C,
    dir: &Path,
    expected: usize,
    interval: Duration,
    timeout: Duration,
) -> bool {
    info!(dir = %dir.display(), expected, "Waiting for images to be generated");
    let ready = poll_until(clock, interval, timeout, || {
        let count = count_images(dir);
        debug!(count, expected, "Polled output directory");
        count >= expected
    })
    .await;
    if ready {
        info!(expected, "Found all images");
    } else {
        warn!(
            expected,
            found = count_images(dir),
            timeout_secs = timeout.as_secs(),
            "Timeout waiting for images to be generated"
        );
    }
    ready
}

/// Number of `.png` files directly in `dir`; 0 if it cannot be listed.
pub fn count_images(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(IMAGE_EXTENSION))
            .count(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FIVE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_poll_ready_immediately() {
        let clock = ManualClock::new();
        assert!(poll_until(&clock, FIVE, Duration::from_secs(60), || true).await);
        assert_eq!(clock.sleeps(), 0);
    }

    #[tokio::test]
    async fn test_poll_becomes_ready() {
        let clock = ManualClock::new();
        let mut checks = 0;
        let ready = poll_until(&clock, FIVE, Duration::from_secs(60), || {
            checks += 1;
            checks == 4
        })
        .await;
        assert!(ready);
        assert_eq!(clock.sleeps(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let clock = ManualClock::new();
        let mut checks = 0;
        let ready = poll_until(&clock, FIVE, Duration::from_secs(30), || {
            checks += 1;
            false
        })
        .await;
        assert!(!ready);
        assert_eq!(checks, 6);
        assert_eq!(clock.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_poll_zero_timeout() {
        let clock = ManualClock::new();
        assert!(!poll_until(&clock, FIVE, Duration::ZERO, || true).await);
    }

    #[tokio::test]
    async fn test_wait_for_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        assert!(wait_for_directory(&clock, dir.path(), FIVE, Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_wait_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let missing = dir.path().join("2024-06-01_12-00-00");
        assert!(!wait_for_directory(&clock, &missing, FIVE, Duration::from_secs(20)).await);
        assert_eq!(clock.sleeps(), 4);
    }

    #[test]
    fn test_count_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("checkpoint-1_0001.png"), b"").unwrap();
        fs::write(dir.path().join("checkpoint-2_0001.png"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert_eq!(count_images(dir.path()), 2);
        assert_eq!(count_images(&dir.path().join("missing")), 0);
    }

    #[tokio::test]
    async fn test_wait_for_images_threshold() {
        let dir = tempfile::tempdir().unwrap();
        for n in [1, 2, 3] {
            fs::write(dir.path().join(format!("checkpoint-{}_0001.png", n)), b"").unwrap();
        }
        let clock = ManualClock::new();
        assert!(wait_for_images(&clock, dir.path(), 3, FIVE, Duration::from_secs(10)).await);
        assert!(!wait_for_images(&clock, dir.path(), 4, FIVE, Duration::from_secs(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps() {
        let clock = TokioClock;
        let before = tokio::time::Instant::now();
        clock.sleep(FIVE).await;
        assert!(tokio::time::Instant::now() - before >= FIVE);
    }
}
