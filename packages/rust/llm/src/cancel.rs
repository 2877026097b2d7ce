//! Cooperative cancellation for backoff sleeps.

use std::time::Duration;

use tokio::sync::watch;

use researchkit_shared::{ResearchKitError, Result};

/// Owner side: flips the signal once.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cloned into every [`Invoker`](crate::Invoker) that should stop.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle/signal pair.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `delay` unless cancelled first.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        let rx = self.rx.clone();
        tokio::select! {
            biased;
            _ = wait_cancelled(rx) => Err(ResearchKitError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    // A dropped handle can never cancel.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_cancelled() {
        let (_handle, signal) = cancellation();
        let start = tokio::time::Instant::now();
        signal.sleep(Duration::from_millis(500)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_returns_early_on_cancel() {
        let (handle, signal) = cancellation();
        let start = tokio::time::Instant::now();

        let sleeper = tokio::spawn({
            let signal = signal.clone();
            async move { signal.sleep(Duration::from_secs(60)).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        let result = sleeper.await.unwrap();
        assert!(matches!(result, Err(ResearchKitError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_never_cancels() {
        let (handle, signal) = cancellation();
        drop(handle);
        signal.sleep(Duration::from_millis(10)).await.unwrap();
        assert!(!signal.is_cancelled());
    }
}
