// This file is part of the terraform-provider-duplocloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Polling helpers used to wait for the DuploCloud backend to converge

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::duplosdk::{ClientError, ClientResult};

const MIN_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{target}' (last state: '{last_state}', timeout: {timeout:?}){}", reason_suffix(.reason))]
    Timeout {
        target: String,
        last_state: String,
        timeout: Duration,
        reason: Option<String>,
    },
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },
    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },
    #[error("{0}")]
    Failed(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

/// Outcome of a single poll
#[derive(Debug)]
pub enum Poll<T> {
    Done(T),
    Retry(String),
    Fail(WaitError),
}

/// Call `f` until it is done, fails, or `timeout` expires
///
/// Sleeps between calls start at 100ms and double up to 10s.
pub async fn retry_context<T, F, Fut>(timeout: Duration, mut f: F) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Poll<T>>,
{
    let deadline = Instant::now() + timeout;
    let mut backoff = MIN_BACKOFF;

    loop {
        let reason = match f().await {
            Poll::Done(value) => return Ok(value),
            Poll::Fail(err) => return Err(err),
            Poll::Retry(reason) => reason,
        };
        trace!(reason, "retrying");

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                target: "success".to_owned(),
                last_state: "retryableerror".to_owned(),
                timeout,
                reason: Some(reason),
            });
        }
        sleep(backoff.min(deadline - now)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Wait until `get` returns the object after its creation
///
/// A 404 or an absent object is retried, any other error aborts the wait.
pub async fn wait_for_resource_to_be_present_after_create<T, F, Fut>(
    kind: &str,
    id: &str,
    timeout: Duration,
    mut get: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    debug!(kind, id, ?timeout, "waiting for resource to be present");
    retry_context(timeout, || {
        let fut = get();
        async move {
            match fut.await {
                Ok(Some(value)) => Poll::Done(value),
                Ok(None) => Poll::Retry(format!(
                    "expected {kind} '{id}' to be retrieved, but got: nil"
                )),
                Err(err) if err.is_not_found() => Poll::Retry(format!(
                    "expected {kind} '{id}' to be retrieved, but got a 404"
                )),
                Err(err) => Poll::Fail(WaitError::Failed(format!(
                    "error getting {kind} '{id}': {err}"
                ))),
            }
        }
    })
    .await
    .map_err(|err| WaitError::Failed(format!("error creating {kind} '{id}': {err}")))
}

/// Wait until `get` no longer finds the object after its deletion
///
/// A 404 or a 400 means the object is gone, any other error aborts the wait.
pub async fn wait_for_resource_to_be_missing_after_delete<T, F, Fut>(
    kind: &str,
    id: &str,
    timeout: Duration,
    mut get: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    debug!(kind, id, ?timeout, "waiting for resource to be missing");
    retry_context(timeout, || {
        let fut = get();
        async move {
            match fut.await {
                Ok(None) => Poll::Done(()),
                Ok(Some(_)) => Poll::Retry(format!(
                    "expected {kind} '{id}' to be missing, but it still exists"
                )),
                Err(err) if err.is_not_found() || err.is_bad_request() => Poll::Done(()),
                Err(err) => Poll::Fail(WaitError::Failed(format!(
                    "error getting {kind} '{id}': {err}"
                ))),
            }
        }
    })
    .await
    .map_err(|err| WaitError::Failed(format!("error deleting {kind} '{id}': {err}")))
}

/// Wait for an object to move from a pending state to a target state
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Fixed interval between polls; exponential backoff when unset
    pub poll_interval: Option<Duration>,
    /// Number of consecutive polls without object before giving up
    pub not_found_checks: u32,
}

impl StateChangeConf {
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Poll `refresh` until the object reaches one of the target states
    ///
    /// `refresh` returns the object, if found, and its current state.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<T, WaitError>
    where
        T: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<(Option<T>, String)>>,
    {
        let deadline = Instant::now() + self.timeout;
        let target = self.target.join(", ");
        let mut backoff = MIN_BACKOFF;
        let mut not_found = 0;

        loop {
            let (object, state) = refresh().await?;
            trace!(?object, state, "refreshed");

            match object {
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(WaitError::NotFound {
                            checks: self.not_found_checks,
                        });
                    }
                }
                Some(object) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        debug!(state, "target state reached");
                        return Ok(object);
                    }
                    if !self.pending.contains(&state) {
                        return Err(WaitError::UnexpectedState { state, target });
                    }
                    debug!(state, target, "still pending");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout {
                    target,
                    last_state: state,
                    timeout: self.timeout,
                    reason: None,
                });
            }

            let wait = match self.poll_interval {
                Some(interval) => interval,
                None => {
                    let wait = backoff;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    wait
                }
            };
            sleep(wait.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn not_found() -> ClientError {
        ClientError::custom("not found", 404)
    }

    /// Time elapsed between consecutive calls
    fn gaps(calls: &Mutex<Vec<Instant>>) -> Vec<Duration> {
        calls
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    fn millis(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn retry_sleeps_double_up_to_cap() {
        let calls = Mutex::new(Vec::new());
        let value = retry_context(Duration::from_secs(600), || {
            let n = {
                let mut calls = calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len()
            };
            async move {
                if n < 10 {
                    Poll::Retry(format!("attempt {n}"))
                } else {
                    Poll::Done(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 10);
        assert_eq!(
            gaps(&calls),
            millis(&[100, 200, 400, 800, 1600, 3200, 6400, 10000, 10000])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_timeout_keeps_last_reason() {
        let calls = AtomicU32::new(0);
        let err = retry_context::<(), _, _>(Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Poll::Retry(format!("attempt {n}")) }
        })
        .await
        .unwrap_err();
        let last = calls.load(Ordering::SeqCst) - 1;
        let expected = format!("attempt {last}");
        assert!(matches!(
            err,
            WaitError::Timeout { reason: Some(ref reason), .. } if *reason == expected
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn present_after_a_few_misses() {
        let calls = AtomicU32::new(0);
        let value = wait_for_resource_to_be_present_after_create(
            "config map",
            "t/app",
            Duration::from_secs(60),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(not_found()),
                        1 => Ok(None),
                        _ => Ok(Some(n)),
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn present_aborts_on_server_error() {
        let calls = AtomicU32::new(0);
        let err = wait_for_resource_to_be_present_after_create::<(), _, _>(
            "config map",
            "t/app",
            Duration::from_secs(60),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::custom("boom", 500)) }
            },
        )
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            err.to_string(),
            "error creating config map 't/app': error getting config map 't/app': boom"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn present_times_out() {
        let err = wait_for_resource_to_be_present_after_create::<(), _, _>(
            "tag",
            "t/arn/key",
            Duration::from_secs(5),
            || async { Ok(None) },
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("error creating tag 't/arn/key': timeout while waiting"));
        assert!(message.ends_with("expected tag 't/arn/key' to be retrieved, but got: nil"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_after_delete() {
        let calls = AtomicU32::new(0);
        wait_for_resource_to_be_missing_after_delete(
            "rule",
            "t/srv/rule",
            Duration::from_secs(60),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 | 1 => Ok(Some(())),
                        _ => Err(ClientError::custom("bad request", 400)),
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        wait_for_resource_to_be_missing_after_delete::<(), _, _>(
            "rule",
            "t/srv/rule",
            Duration::from_secs(60),
            || async { Ok(None) },
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_reports_lingering_object() {
        let err = wait_for_resource_to_be_missing_after_delete(
            "rule",
            "t/srv/rule",
            Duration::from_secs(3),
            || async { Ok(Some(())) },
        )
        .await
        .unwrap_err();
        assert!(err
            .to_string()
            .ends_with("expected rule 't/srv/rule' to be missing, but it still exists"));
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_reaches_target() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let conf = StateChangeConf::new(["CREATING", "UPDATING"], ["VALID"], Duration::from_secs(600))
            .with_poll_interval(Duration::from_secs(30));
        let object = conf
            .wait_for_state(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let state = if n < 2 { "CREATING" } else { "VALID" };
                    Ok((Some(n), state.to_owned()))
                }
            })
            .await
            .unwrap();
        assert_eq!(object, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_backs_off_without_poll_interval() {
        let calls = Mutex::new(Vec::new());
        let conf = StateChangeConf::new(["CREATING"], ["VALID"], Duration::from_secs(600));
        let object = conf
            .wait_for_state(|| {
                let n = {
                    let mut calls = calls.lock().unwrap();
                    calls.push(Instant::now());
                    calls.len()
                };
                async move {
                    let state = if n < 6 { "CREATING" } else { "VALID" };
                    Ok((Some(n), state.to_owned()))
                }
            })
            .await
            .unwrap();
        assert_eq!(object, 6);
        assert_eq!(gaps(&calls), millis(&[100, 200, 400, 800, 1600]));
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_rejects_unexpected_state() {
        let conf = StateChangeConf::new(["CREATING"], ["VALID"], Duration::from_secs(600));
        let err = conf
            .wait_for_state(|| async { Ok((Some(()), "INVALID".to_owned())) })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "INVALID"));
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_gives_up_when_not_found() {
        let calls = AtomicU32::new(0);
        let mut conf = StateChangeConf::new(["CREATING"], ["VALID"], Duration::from_secs(3600));
        conf.not_found_checks = 3;
        let err = conf
            .wait_for_state::<(), _, _>(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok((None, String::new())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::NotFound { checks: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_times_out() {
        let conf = StateChangeConf::new(["InProgress"], ["Ready", "Failed"], Duration::from_secs(90))
            .with_poll_interval(Duration::from_secs(30));
        let err = conf
            .wait_for_state(|| async { Ok((Some(()), "InProgress".to_owned())) })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { ref last_state, .. } if last_state == "InProgress"));
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_propagates_refresh_errors() {
        let conf = StateChangeConf::new(["InProgress"], ["Ready"], Duration::from_secs(90));
        let err = conf
            .wait_for_state::<(), _, _>(|| async { Err(ClientError::custom("denied", 403)) })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Client(ref err) if err.status == 403));
    }
}
