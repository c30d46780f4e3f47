use crate::context::{Context, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Default cap of the idle list.
pub const DEFAULT_MAX_IDLE_CONTEXTS: usize = 1024;

/// A free list of [`Context`]s.
///
/// [`release`](ContextPool::release) takes the context by value, so a released context can
/// no longer be reached by the request that used it. Parameter slots are sized once to the
/// router's largest parameter count.
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    max_params: usize,
    max_idle: usize,
    shared: Arc<Shared>,
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("idle", &self.idle_len())
            .field("max_params", &self.max_params)
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl ContextPool {
    pub(crate) fn new(max_params: usize, max_idle: usize, shared: Arc<Shared>) -> Self {
        Self { idle: Mutex::new(Vec::new()), max_params, max_idle, shared }
    }

    pub fn acquire(&self) -> Context {
        let recycled = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        recycled.unwrap_or_else(|| Context::new(self.max_params, Arc::clone(&self.shared)))
    }

    /// Clears `ctx` and parks it, or drops it when the idle list is full.
    pub fn release(&self, mut ctx: Context) {
        ctx.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }

    /// Number of contexts waiting for reuse.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn max_params(&self) -> usize {
        self.max_params
    }
}
