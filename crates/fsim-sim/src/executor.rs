//! Injectable data-parallel executor.

use std::sync::Arc;

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::error::{SimError, SimResult};

/// Runs element-wise kernels either inline or on a rayon pool.
///
/// Every task writes its own output slot, so results do not depend on the
/// number of threads.
#[derive(Clone, Default)]
pub struct Executor {
    pool: Option<Arc<ThreadPool>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("threads", &self.threads())
            .finish()
    }
}

impl Executor {
    pub fn sequential() -> Self {
        Self { pool: None }
    }

    pub fn with_threads(threads: usize) -> SimResult<Self> {
        if threads == 0 {
            return Err(SimError::InvalidArg {
                what: "thread count must be positive",
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SimError::Backend {
                message: format!("failed to create thread pool: {e}"),
            })?;
        Ok(Self::from_pool(Arc::new(pool)))
    }

    pub fn from_pool(pool: Arc<ThreadPool>) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Set `out[i] = f(i)` for every slot.
    pub fn fill<F>(&self, out: &mut [f64], f: F)
    where
        F: Fn(usize) -> f64 + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| {
                out.par_iter_mut()
                    .enumerate()
                    .for_each(|(i, slot)| *slot = f(i));
            }),
            None => {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = f(i);
                }
            }
        }
    }
}
