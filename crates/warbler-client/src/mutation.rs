use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ClientError;

/// Observable state of one write action.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<R> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<R>,
}

impl<R> Default for MutationState<R> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            data: None,
        }
    }
}

/// Tracks a single write at a time. Clones share state, so a view can hold
/// one handle while a task drives the request through another.
pub struct Mutation<R> {
    state: Arc<Mutex<MutationState<R>>>,
}

impl<R> Clone for Mutation<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> Default for Mutation<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Mutation<R> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MutationState::default())),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Back to idle, forgetting the last result.
    pub fn reset(&self) {
        *self.lock() = MutationState::default();
    }

    fn lock(&self) -> MutexGuard<'_, MutationState<R>> {
        // A panic while holding the lock cannot leave the state half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: Clone> Mutation<R> {
    pub fn state(&self) -> MutationState<R> {
        self.lock().clone()
    }

    /// Drive `request` to completion, recording its outcome. Refused with
    /// [`ClientError::InFlight`] while a previous request is still running.
    /// Dropping the returned future before it finishes puts the tracker
    /// back to idle without recording an outcome.
    pub async fn run<F>(&self, request: F) -> Result<R, ClientError>
    where
        F: Future<Output = Result<R, ClientError>>,
    {
        let _loading = {
            let mut state = self.lock();
            if state.loading {
                return Err(ClientError::InFlight);
            }
            state.loading = true;
            state.error = None;
            LoadingGuard { mutation: self }
        };

        let result = request.await;

        let mut state = self.lock();
        match &result {
            Ok(data) => state.data = Some(data.clone()),
            Err(e) => state.error = Some(e.to_string()),
        }
        result
    }
}

/// Clears `loading` when a run ends, whether it completed or was dropped.
struct LoadingGuard<'a, R> {
    mutation: &'a Mutation<R>,
}

impl<R> Drop for LoadingGuard<'_, R> {
    fn drop(&mut self) {
        self.mutation.lock().loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn records_success() {
        let m = Mutation::new();
        let out = m.run(async { Ok::<_, ClientError>(7) }).await.unwrap();

        assert_eq!(out, 7);
        assert_eq!(
            m.state(),
            MutationState { loading: false, error: None, data: Some(7) }
        );
    }

    #[tokio::test]
    async fn records_failure_and_resets() {
        let m: Mutation<i32> = Mutation::new();
        let err = m.run(async { Err(ClientError::Unauthorized) }).await.unwrap_err();

        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(m.state().error.as_deref(), Some("not logged in"));

        m.reset();
        assert_eq!(m.state(), MutationState::default());
    }

    #[tokio::test]
    async fn abandoned_run_does_not_stay_loading() {
        let m: Mutation<i32> = Mutation::new();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            m.run(std::future::pending()),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(!m.is_loading());
        assert_eq!(m.state().error, None);

        assert_eq!(m.run(async { Ok(1) }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_dispatch_while_loading_is_refused() {
        let m: Mutation<i32> = Mutation::new();
        let (tx, rx) = oneshot::channel::<i32>();

        let first = tokio::spawn({
            let m = m.clone();
            async move { m.run(async { Ok(rx.await.unwrap_or_default()) }).await }
        });

        while !m.is_loading() {
            tokio::task::yield_now().await;
        }

        let refused = m.run(async { Ok(1) }).await.unwrap_err();
        assert!(matches!(refused, ClientError::InFlight));

        tx.send(5).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 5);
        assert!(!m.is_loading());
        assert_eq!(m.state().data, Some(5));
    }
}
