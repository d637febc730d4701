//! Bounded worker pool that offloaded text-generation (and other CPU/IO-heavy)
//! calls suspend on, per spec §5. The teacher offloads CPU-bound graph work
//! onto a `rayon` pool (`crates/compute`); this workspace's offloaded work is
//! I/O-bound (HTTP calls to a local model server, file reads), so the
//! idiomatic async analog is a `tokio::sync::Semaphore` gate rather than a
//! second thread pool — the calling task suspends on `acquire`, not on a
//! channel recv.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::TextGenError;
use crate::provider::{GenerationRequest, TextGenerator};

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: u32) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(size.max(1) as usize)) }
    }

    /// Run `generate` under the pool's concurrency cap. The permit is held
    /// for the duration of the call and released on completion or error.
    pub async fn generate(
        &self,
        generator: &dyn TextGenerator,
        request: GenerationRequest,
    ) -> Result<String, TextGenError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        generator.generate(request).await
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EchoGenerator;

    #[tokio::test]
    async fn bounds_concurrency_to_pool_size() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.available_permits(), 2);

        let generator = EchoGenerator;
        let request = GenerationRequest { prompt: "x".to_string(), max_tokens: 1, temperature: 0.0 };
        let result = pool.generate(&generator, request).await.unwrap();
        assert!(result.contains("echo"));
        assert_eq!(pool.available_permits(), 2);
    }
}
