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

use std::future::Future;
use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::error::{ClientError, ClientResult};

/// Backoff used when the API answers with a rate limiting error
///
/// All delays are expressed in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConf {
    pub max_retries: u32,
    pub min_starting_delay: u64,
    pub max_starting_delay: u64,
    pub min_delay: u64,
    pub max_delay: u64,
    pub min_jitter_delay: u64,
}

impl Default for RetryConf {
    fn default() -> Self {
        Self {
            max_retries: 9,
            min_starting_delay: 1,
            max_starting_delay: 7,
            min_delay: 3,
            max_delay: 15,
            min_jitter_delay: 6,
        }
    }
}

impl RetryConf {
    /// Delay to wait before the given attempt (starting at 1)
    pub fn backoff<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let (min, max) = if attempt <= 1 {
            (self.min_starting_delay, self.max_starting_delay)
        } else if attempt <= 3 {
            (self.min_delay, self.max_delay)
        } else {
            (
                self.min_jitter_delay,
                self.min_jitter_delay + u64::from(attempt) * self.min_starting_delay,
            )
        };
        Duration::from_secs(rng.gen_range(min..=max.max(min)))
    }
}

/// Whether the error asks the caller to slow down
pub fn is_rate_exceeded(err: &ClientError) -> bool {
    match err.response_message() {
        Some("Rate exceeded") => true,
        Some(message) => message.contains("HRESULT"),
        None => err.status == 400,
    }
}

/// Call `call` until it does not fail with a rate limiting error
///
/// Every attempt, including the first one, is preceded by a random delay.
pub async fn with_rate_retry<T, F, Fut>(conf: &RetryConf, api_name: &str, mut call: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut total_sleep = 0;
    for attempt in 1..=conf.max_retries {
        let delay = conf.backoff(attempt, &mut thread_rng());
        total_sleep += delay.as_secs();
        debug!(api = api_name, attempt, ?delay, "waiting before calling the API");
        sleep(delay).await;

        match call().await {
            Err(err) if is_rate_exceeded(&err) => {
                warn!(api = api_name, attempt, error = %err, "rate exceeded");
            }
            result => return result,
        }
    }

    Err(ClientError::custom(
        format!(
            "API_RETRIES: Max retry attempts exceeded. (total_sleep, retry_attempts, api) ({},{},{})",
            total_sleep, conf.max_retries, api_name
        ),
        -1,
    ))
}

/// Exponential backoff with random jitter
pub struct BackoffConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Maximum jitter added to each delay, in milliseconds
    pub max_jitter: u64,
    /// Total time allowed for all attempts
    pub timeout: Duration,
    pub is_retryable: fn(&ClientError) -> bool,
}

impl BackoffConfig {
    pub fn backoff<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exp = self
            .min_delay
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        let jitter = if self.max_jitter == 0 {
            0
        } else {
            rng.gen_range(0..self.max_jitter)
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Call `call` until it succeeds, fails with a non retryable error, or the timeout expires
///
/// On timeout, the last error is returned.
pub async fn retry_with_exponential_backoff<T, F, Fut>(config: &BackoffConfig, mut call: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempt = 0;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !(config.is_retryable)(&err) {
            debug!(attempt, error = %err, "call failed with unrecoverable error");
            return Err(err);
        }

        attempt += 1;
        let delay = config.backoff(attempt, &mut thread_rng());
        if Instant::now() >= deadline {
            warn!(attempt, error = %err, "call failed to succeed before retry timeout");
            return Err(err);
        }
        debug!(attempt, ?delay, error = %err, "call failed with retryable error");
        sleep(delay).await;
    }
}
