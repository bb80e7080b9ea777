/// Reversible actions recorded in the history.
use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

/// An action the history can take back and perform again.
///
/// The manager never looks inside an action: it only runs `undo` or `redo`
/// and watches whether the returned future resolves to `Ok` or `Err`.
/// Both operations may suspend (e.g. while a REST call completes).
#[async_trait]
pub trait Reversible: Send + Sync {
    /// Cancels the effect of the action.
    async fn undo(&self) -> Result<()>;

    /// Performs the action again after it has been undone.
    async fn redo(&self) -> Result<()>;
}

/// A `Reversible` built from a pair of closures.
///
/// Each closure is called with no arguments and returns a future. Callers with
/// synchronous work return a ready future.
pub struct FnAction<U, R> {
    undo: U,
    redo: R,
}

impl<U, R> FnAction<U, R> {
    pub fn new(undo: U, redo: R) -> Self {
        Self { undo, redo }
    }
}

impl<U, R> std::fmt::Debug for FnAction<U, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

#[async_trait]
impl<U, UF, R, RF> Reversible for FnAction<U, R>
where
    U: Fn() -> UF + Send + Sync + 'static,
    UF: Future<Output = Result<()>> + Send + 'static,
    R: Fn() -> RF + Send + Sync + 'static,
    RF: Future<Output = Result<()>> + Send + 'static,
{
    async fn undo(&self) -> Result<()> {
        (self.undo)().await
    }

    async fn redo(&self) -> Result<()> {
        (self.redo)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fn_action_runs_matching_closure() {
        let undos = Arc::new(AtomicUsize::new(0));
        let redos = Arc::new(AtomicUsize::new(0));
        let (u, r) = (Arc::clone(&undos), Arc::clone(&redos));
        let action = FnAction::new(
            move || {
                u.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok(()))
            },
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok(()))
            },
        );

        action.undo().await.expect("undo");
        action.undo().await.expect("undo");
        action.redo().await.expect("redo");

        assert_eq!(undos.load(Ordering::SeqCst), 2);
        assert_eq!(redos.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fn_action_propagates_error() {
        let action = FnAction::new(
            || async { Err(anyhow::anyhow!("step not found")) },
            || async { Ok(()) },
        );

        let err = action.undo().await.expect_err("undo should fail");
        assert_eq!(err.to_string(), "step not found");
        assert!(action.redo().await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_action_usable_as_trait_object() {
        let action: Arc<dyn Reversible> =
            Arc::new(FnAction::new(|| async { Ok(()) }, || async { Ok(()) }));
        assert!(action.undo().await.is_ok());
        assert!(action.redo().await.is_ok());
    }
}
