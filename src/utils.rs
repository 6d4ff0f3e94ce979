use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Base seed for the current run, set by main to the iteration number
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// When set, every auction round dumps its bids to LogEvent::Auction in CSV form
pub static VERBOSE_AUCTION: AtomicBool = AtomicBool::new(false);

/// When set, scenarios render balance history charts into charts/
pub static CHARTS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Number of simulation runs completed since the counter was last reset
pub static TOTAL_SIMULATION_RUNS: AtomicUsize = AtomicUsize::new(0);

/// Derive a seed for one random stream from the global RAND_SEED
/// Each consumer passes its own offset so streams stay independent of each other
pub fn get_seed(offset: u64) -> u64 {
    RAND_SEED.load(Ordering::Relaxed).wrapping_add(offset)
}

/// Round a value to the given number of decimal places (half away from zero)
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
