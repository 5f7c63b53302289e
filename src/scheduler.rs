//! Repeat a download cycle on a fixed delay until interrupted.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;

/// How a loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit<B = ()> {
    /// Ran once with no repeat interval
    Completed,
    /// Shutdown was signalled
    Interrupted,
    /// A cycle asked to stop
    Stopped(B),
}

/// Run `cycle`, then wait `interval` and run it again, forever.
///
/// Without an interval the cycle runs exactly once. A `true` on `shutdown`
/// cancels the running cycle or the wait, whichever is in progress.
/// `cycle` receives the 1-based run number; a `Break` ends the loop.
pub async fn run_loop<F, Fut, B>(
    interval: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
    mut cycle: F,
) -> LoopExit<B>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = ControlFlow<B>>,
{
    let mut run = 0;
    loop {
        if *shutdown.borrow() {
            return LoopExit::Interrupted;
        }

        run += 1;
        tokio::select! {
            flow = cycle(run) => {
                if let ControlFlow::Break(reason) = flow {
                    return LoopExit::Stopped(reason);
                }
            }
            _ = wait_for_shutdown(&mut shutdown) => return LoopExit::Interrupted,
        }

        let Some(delay) = interval else {
            return LoopExit::Completed;
        };

        tracing::debug!("Cycle {} finished, next in {:?}", run, delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_shutdown(&mut shutdown) => return LoopExit::Interrupted,
        }
    }
}

/// Resolves once the flag is `true`; pends forever if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_single_run_without_interval() {
        let (_tx, rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let exit = run_loop(None, rx, |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::<()>::Continue(())
            }
        })
        .await;

        assert_eq!(exit, LoopExit::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_until_shutdown() {
        let (tx, rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let handle = tokio::spawn(run_loop(Some(Duration::from_secs(60)), rx, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::<()>::Continue(())
            }
        }));

        // Three cycles: t=0, t=60, t=120
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), LoopExit::Interrupted);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_running_cycle() {
        let (tx, rx) = watch::channel(false);
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();

        let handle = tokio::spawn(run_loop(None, rx, move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::<()>::Continue(())
            }
        }));

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), LoopExit::Interrupted);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_stopped() {
        let (_tx, rx) = watch::channel(true);
        let exit = run_loop(Some(Duration::from_secs(1)), rx, |_| async {
            ControlFlow::<()>::Continue(())
        })
        .await;
        assert_eq!(exit, LoopExit::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_a_repeating_loop() {
        let (_tx, rx) = watch::channel(false);
        let exit = run_loop(Some(Duration::from_secs(60)), rx, |run| async move {
            if run == 2 {
                ControlFlow::Break("fatal")
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;
        assert_eq!(exit, LoopExit::Stopped("fatal"));
    }
}
