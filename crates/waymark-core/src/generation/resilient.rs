//! Quota-aware credential rotation and bounded backoff around a
//! [`ContentGenerator`].

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, warn};

use super::{
    ApiKey, ApiKeyPool, ContentGenerator, GenerationError, GenerationListener, GenerationRequest,
};
use crate::{cancel::CancellationScope, config::GenerationPolicy};

/// Issues one logical generation request with retries.
///
/// - Quota exhaustion marks the active credential as tried and rotates to
///   the next untried one immediately. Once every credential has been
///   tried the call fails with [`GenerationError::QuotaExhausted`].
/// - Service unavailability retries the same credential after a fixed
///   delay, a bounded number of times per credential.
/// - Cancellation and every other error return immediately.
#[derive(Clone)]
pub struct ResilientGenerator {
    service: Arc<dyn ContentGenerator>,
    policy: GenerationPolicy,
}

impl ResilientGenerator {
    pub fn new(service: Arc<dyn ContentGenerator>, policy: GenerationPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Generates the full response text.
    pub async fn generate(
        &self,
        pool: &ApiKeyPool,
        model: &str,
        request: &GenerationRequest,
        cancel: &CancellationScope,
        listener: &dyn GenerationListener,
    ) -> Result<String, GenerationError> {
        self.generate_streaming(pool, model, request, cancel, listener, |_| {})
            .await
    }

    /// Like [`generate`](Self::generate), also passing each chunk to
    /// `on_chunk` as it arrives.
    ///
    /// Chunks of an attempt that later fails have already been delivered;
    /// the returned text only contains the successful attempt.
    pub async fn generate_streaming<F>(
        &self,
        pool: &ApiKeyPool,
        model: &str,
        request: &GenerationRequest,
        cancel: &CancellationScope,
        listener: &dyn GenerationListener,
        mut on_chunk: F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        if pool.is_empty() {
            return Err(GenerationError::NoCredentials);
        }

        let mut tried = vec![false; pool.len()];
        let mut unavailable_retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            let index = pool.active_index();
            let credential = pool.get(index).ok_or(GenerationError::NoCredentials)?;
            debug!(
                "Generation attempt with key {} ({}/{})",
                credential.redacted(),
                index + 1,
                pool.len()
            );

            let error = match self
                .attempt(credential, model, request, cancel, &mut on_chunk)
                .await
            {
                Ok(text) => return Ok(text),
                Err(error) => error,
            };

            match error {
                GenerationError::QuotaExceeded(message) => {
                    tried[index] = true;
                    unavailable_retries = 0;
                    let Some(next) = pool.next_untried(&tried) else {
                        warn!(
                            "Quota exceeded on all {} API key(s): {message}",
                            pool.len()
                        );
                        return Err(GenerationError::QuotaExhausted {
                            pool_size: pool.len(),
                        });
                    };
                    warn!(
                        "Quota exceeded on key {}; switching to key {}/{}",
                        credential.redacted(),
                        next + 1,
                        pool.len()
                    );
                    pool.set_active(next);
                    listener.credential_switched(index, next, pool.len());
                }
                GenerationError::ServiceUnavailable(message) => {
                    if unavailable_retries >= self.policy.max_unavailable_retries {
                        return Err(GenerationError::ServiceUnavailableExhausted {
                            attempts: unavailable_retries + 1,
                            message,
                        });
                    }
                    unavailable_retries += 1;
                    let delay = self.policy.unavailable_delay();
                    warn!(
                        "Service unavailable ({message}); retry {unavailable_retries}/{} in {:?}",
                        self.policy.max_unavailable_retries, delay
                    );
                    listener.unavailable_retry(unavailable_retries, delay);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return Err(other),
            }
        }
    }

    async fn attempt<F>(
        &self,
        credential: &ApiKey,
        model: &str,
        request: &GenerationRequest,
        cancel: &CancellationScope,
        on_chunk: &mut F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        let timeout = self.policy.request_timeout();
        let token = cancel.child_token();
        let work = self.accumulate(credential, model, request, cancel, token.clone(), on_chunk);

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                Err(GenerationError::Timeout {
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    async fn accumulate<F>(
        &self,
        credential: &ApiKey,
        model: &str,
        request: &GenerationRequest,
        cancel: &CancellationScope,
        token: tokio_util::sync::CancellationToken,
        on_chunk: &mut F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        let mut stream = self.service.stream(credential, model, request, token).await?;
        let mut text = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                next = stream.next() => match next {
                    Some(Ok(chunk)) => {
                        on_chunk(&chunk);
                        text.push_str(&chunk);
                    }
                    Some(Err(error)) => return Err(error),
                    None => return Ok(text),
                },
            }
        }
    }
}
