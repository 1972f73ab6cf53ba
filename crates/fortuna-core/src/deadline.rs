//! Request-scoped time budgets.
//!
//! A worker gives every event one [`Deadline`]; handlers derive shorter
//! sub-deadlines for individual store lookups and platform calls so that one
//! slow dependency cannot eat the whole budget.

use std::{future::Future, time::Duration};

use tokio::time::{timeout_at, Instant};

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn instant(self) -> Instant {
        self.at
    }

    pub fn is_expired(self) -> bool {
        Instant::now() >= self.at
    }

    /// A deadline no later than `self` and no further away than `max`.
    pub fn sub(self, max: Duration) -> Self {
        let candidate = Instant::now() + max;
        Self {
            at: candidate.min(self.at),
        }
    }

    /// Run a fallible operation under this deadline.
    ///
    /// `what` names the operation in the resulting [`Error::DeadlineExceeded`].
    pub async fn run<T, F>(self, what: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout_at(self.at, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::DeadlineExceeded(what)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sub_deadline_never_outlives_parent() {
        let parent = Deadline::after(Duration::from_millis(300));
        let child = parent.sub(Duration::from_secs(2));
        assert_eq!(child, parent);

        let tighter = parent.sub(Duration::from_millis(100));
        assert!(tighter.instant() < parent.instant());
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_slow_operations() {
        let d = Deadline::after(Duration::from_millis(50));
        let res: Result<()> = d
            .run("slow op", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert!(matches!(res, Err(Error::DeadlineExceeded("slow op"))));
        assert!(d.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn run_passes_through_inner_result() {
        let d = Deadline::after(Duration::from_secs(1));
        let v = d.run("fast op", async { Ok(42) }).await.unwrap();
        assert_eq!(v, 42);

        let err = d
            .run::<(), _>("failing op", async { Err(Error::Store("down".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
