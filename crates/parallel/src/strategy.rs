//! Parallel processing strategies

use rayon::prelude::*;

/// Processing mode for algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing on rayon's global pool
    #[default]
    Parallel,
    /// Parallel with a dedicated pool of the given width
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Build a mode from an optional thread count (`None` = all cores, `Some(1)` = sequential).
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            None | Some(0) => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }

    /// Whether work may run on more than one thread
    pub fn is_parallel(&self) -> bool {
        !matches!(self, ProcessingMode::Sequential)
    }

    /// Run `f` in the pool selected by this mode.
    ///
    /// For `ParallelWith(n)` a pool of `n` threads is built for the duration
    /// of the call, so nested `rayon::join` and parallel iterators inside `f`
    /// stay on that pool. If the pool cannot be built the global pool is used.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match self {
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(*threads).build() {
                    Ok(pool) => pool.install(f),
                    Err(e) => {
                        tracing::warn!("cannot build {threads}-thread pool ({e}); using global pool");
                        f()
                    }
                }
            }
            _ => f(),
        }
    }

    /// Fork-join: run both closures, concurrently unless sequential.
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self {
            ProcessingMode::Sequential => (a(), b()),
            _ => rayon::join(a, b),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            _ => self.install(|| range.into_par_iter().map(f).collect()),
        }
    }
}
