use std::time::{Duration, Instant};

/// Smallest execution time ever reported, in milliseconds.
const MIN_REPORTED_MS: f64 = 1e-3;

/// Busy-waits `delay`, runs `f`, and returns its output with the elapsed
/// milliseconds since the call started.
pub(crate) fn measure<T>(delay: Duration, f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
    let output = f();
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    (output, elapsed.max(MIN_REPORTED_MS))
}
