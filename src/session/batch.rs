//! Ordered send/expect sequences sharing one deadline

use super::Session;
use crate::pattern::{Case, CaseKind, Pattern};
use crate::result::{ExpectError, MatchResult};
use log::debug;
use std::time::Duration;
use tokio::time::Instant;

/// One step of a [`Batch`].
#[derive(Debug, Clone)]
pub enum Step {
    /// Write literal bytes.
    Send(Vec<u8>),
    /// Wait for a single pattern.
    Expect(Pattern),
    /// Wait for the best match among several cases and react to it.
    Switch(Vec<Case>),
}

/// An ordered list of steps run against a session under one deadline.
///
/// The deadline covers the whole batch: every send and every wait gets only
/// what is left of it. A failed batch is not resumable; run it again from the
/// start.
///
/// # Examples
///
/// ```
/// use vmconsole::{Batch, Case, CaseKind, Pattern};
/// use std::time::Duration;
///
/// let batch = Batch::new(Duration::from_secs(30))
///     .send("stty cols 500 rows 500\n")
///     .expect(Pattern::new(r"(\$ |\# )").unwrap())
///     .switch(vec![
///         Case::new(Pattern::new("Password:").unwrap())
///             .send("secret\n")
///             .kind(CaseKind::Continue),
///         Case::new(Pattern::new(r"\$ ").unwrap()),
///     ]);
/// assert_eq!(batch.steps().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Batch {
    steps: Vec<Step>,
    timeout: Duration,
}

impl Batch {
    /// Create an empty batch with an overall deadline of `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            steps: Vec::new(),
            timeout,
        }
    }

    /// Append a send step.
    pub fn send(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Send(data.into()));
        self
    }

    /// Append a single-pattern wait.
    pub fn expect(mut self, pattern: Pattern) -> Self {
        self.steps.push(Step::Expect(pattern));
        self
    }

    /// Append a switch over `cases`, evaluated in declaration order.
    pub fn switch(mut self, cases: Vec<Case>) -> Self {
        self.steps.push(Step::Switch(cases));
        self
    }

    /// The same steps under a different deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The overall deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Session {
    /// Run `batch` from its first step.
    ///
    /// Returns one [`MatchResult`] per wait step. When a switch case matches,
    /// the rest of the buffered output is discarded, so a prompt printed twice
    /// in a row is answered once. The chosen case then decides what happens:
    ///
    /// - [`CaseKind::Continue`]: send the case's bytes, spend one unit of its
    ///   retry budget and keep waiting on the same step
    /// - [`CaseKind::Success`]: send the case's bytes and go to the next step
    /// - [`CaseKind::PermissionDenied`]: stop with [`ExpectError::PermissionDenied`]
    /// - [`CaseKind::Reject`]: stop with [`ExpectError::Rejected`]
    ///
    /// Retry budgets start fresh on every call. If the batch times out, output
    /// that was not consumed is discarded.
    ///
    /// # Errors
    ///
    /// Any error of the underlying sends and waits, plus
    /// [`ExpectError::RetriesExhausted`] when a `Continue` case is chosen more
    /// often than its budget allows.
    pub async fn run_batch(&mut self, batch: &Batch) -> Result<Vec<MatchResult>, ExpectError> {
        let deadline = Instant::now() + batch.timeout;
        let result = self.run_steps(batch, deadline).await;

        if let Err(ExpectError::Timeout { .. }) = result {
            self.discard_buffered();
        }
        result
    }

    async fn run_steps(
        &mut self,
        batch: &Batch,
        deadline: Instant,
    ) -> Result<Vec<MatchResult>, ExpectError> {
        let mut results = Vec::new();

        for (index, step) in batch.steps.iter().enumerate() {
            debug!("Batch step {}/{}", index + 1, batch.steps.len());
            match step {
                Step::Send(data) => self.send_until(data, deadline, batch.timeout).await?,
                Step::Expect(pattern) => {
                    let result = self
                        .expect_until(std::slice::from_ref(pattern), deadline, batch.timeout)
                        .await?;
                    results.push(result);
                }
                Step::Switch(cases) => {
                    let result = self.run_switch(cases, deadline, batch.timeout).await?;
                    results.push(result);
                }
            }
        }

        Ok(results)
    }

    async fn run_switch(
        &mut self,
        cases: &[Case],
        deadline: Instant,
        budget: Duration,
    ) -> Result<MatchResult, ExpectError> {
        let mut retries_left: Vec<usize> = cases.iter().map(Case::retry_budget).collect();

        loop {
            let result = self.expect_until(cases, deadline, budget).await?;
            self.discard_buffered();
            let case_index = result.pattern_index;
            let case = &cases[case_index];

            match case.case_kind() {
                CaseKind::PermissionDenied => {
                    return Err(ExpectError::PermissionDenied {
                        matched: result.matched,
                    });
                }
                CaseKind::Reject => {
                    return Err(ExpectError::Rejected {
                        case_index,
                        matched: result.matched,
                    });
                }
                CaseKind::Success => {
                    if !case.data().is_empty() {
                        self.send_until(case.data(), deadline, budget).await?;
                    }
                    return Ok(result);
                }
                CaseKind::Continue => {
                    if retries_left[case_index] == 0 {
                        return Err(ExpectError::RetriesExhausted { case_index });
                    }
                    retries_left[case_index] -= 1;

                    if !case.data().is_empty() {
                        self.send_until(case.data(), deadline, budget).await?;
                    }
                }
            }
        }
    }
}
