//! Execution strategy for heavy CPU-bound work (table parsing,
//! per-stop shape projection).
//!
//! `Blocking` hands the closure to `tokio::task::spawn_blocking` so the
//! async runtime stays responsive; `Inline` runs it on the caller.
//! The two are behaviorally interchangeable — nothing in the engine may
//! depend on where the work runs.

use tokio::task::JoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compute {
    #[default]
    Blocking,
    Inline,
}

impl Compute {
    pub async fn run<T, F>(self, f: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self {
            Compute::Inline => Ok(f()),
            Compute::Blocking => tokio::task::spawn_blocking(f).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_and_blocking_agree() {
        let a = Compute::Inline.run(|| 2 + 2).await.unwrap();
        let b = Compute::Blocking.run(|| 2 + 2).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn blocking_propagates_panic_as_join_error() {
        let result = Compute::Blocking
            .run(|| -> i32 { panic!("boom") })
            .await;
        assert!(result.is_err());
    }
}
