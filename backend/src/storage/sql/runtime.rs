use std::future::Future;
use tokio::runtime::{Builder, Runtime};

/// Drives async driver calls to completion on the calling thread.
///
/// Each SQL handler owns one single-threaded runtime. Nothing is ever spawned
/// on it; it only exists so the synchronous handler contract can await the
/// per-call connection futures. Calling a handler from inside another tokio
/// runtime's async context panics, as `block_on` always does there.
#[derive(Debug)]
pub struct BlockingRuntime {
    runtime: Runtime,
}

impl BlockingRuntime {
    pub fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
