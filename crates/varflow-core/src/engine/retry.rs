//! Reintento con backoff exponencial para invocaciones externas transitorias.
use std::future::Future;
use std::time::Duration;

use log::warn;

/// Intentos totales (>= 1) y retardo base; el retardo se duplica en cada reintento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

const MAX_DELAY: Duration = Duration::from_secs(60);

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1),
               base_delay }
    }

    /// Un único intento, sin reintentos.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Retardo antes del reintento `retry` (1 = primer reintento).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Ejecuta `operation` hasta que tenga éxito, devuelva un error no
/// reintentable o se agoten los intentos. Devuelve el último error.
pub async fn retry_with_backoff<T, E, F, Fut, R>(policy: &RetryPolicy, is_retryable: R, mut operation: F) -> Result<T, E>
    where F: FnMut(u32) -> Fut,
          Fut: Future<Output = Result<T, E>>,
          R: Fn(&E) -> bool,
          E: std::fmt::Display
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                warn!("attempt {attempt}/{} failed: {err}; retrying in {delay:?}", policy.max_attempts);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double() {
        let p = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let out: Result<u32, String> = retry_with_backoff(&policy, |_| true, |attempt| {
                                           calls.fetch_add(1, Ordering::SeqCst);
                                           async move { if attempt < 3 { Err("busy".to_string()) } else { Ok(attempt) } }
                                       }).await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let out: Result<(), String> = retry_with_backoff(&policy, |e: &String| e != "fatal", |_| {
                                          calls.fetch_add(1, Ordering::SeqCst);
                                          async { Err("fatal".to_string()) }
                                      }).await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let out: Result<(), String> = retry_with_backoff(&policy, |_| true, |_| {
                                          calls.fetch_add(1, Ordering::SeqCst);
                                          async { Err("busy".to_string()) }
                                      }).await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
