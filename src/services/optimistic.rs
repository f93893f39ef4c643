//! Speculative mutation helper.
//!
//! Clients rendering queue state want mutations to appear instantly and
//! roll back cleanly if the store rejects them. `apply_optimistic` snapshots
//! the state, applies the local mutation, awaits the commit, and restores
//! the snapshot verbatim on failure.

use std::future::Future;

/// Apply `mutate` to `state`, then await `commit`. On commit failure the
/// pre-mutation snapshot is restored and the error returned.
pub async fn apply_optimistic<T, M, C, Fut, Ok, Err>(
    state: &mut T,
    mutate: M,
    commit: C,
) -> Result<Ok, Err>
where
    T: Clone,
    M: FnOnce(&mut T),
    C: FnOnce(&T) -> Fut,
    Fut: Future<Output = Result<Ok, Err>>,
{
    let snapshot = state.clone();
    mutate(state);
    match commit(state).await {
        Ok(ok) => Ok(ok),
        Err(err) => {
            *state = snapshot;
            Err(err)
        }
    }
}
