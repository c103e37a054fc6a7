//! # Poll module
//!
//! This module provides a bounded poll loop waiting for a remote instance to
//! reach a terminal state.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::svc::{
    cfg,
    scalechamp::{self, instance::State, Api},
};

// -----------------------------------------------------------------------------
// Policy structure

/// bounds of a poll loop, a poll loop waits `interval` before each attempt
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Policy {
    pub attempts: u32,
    pub interval: Duration,
}

impl From<&cfg::Poll> for Policy {
    fn from(poll: &cfg::Poll) -> Self {
        Self {
            attempts: poll.attempts,
            interval: poll.interval(),
        }
    }
}

impl Policy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// policy applied after the creation of an instance, 36 attempts every 10
    /// seconds
    pub const fn create() -> Self {
        Self::new(36, Duration::from_secs(10))
    }

    /// policy applied after the update of an instance, 50 attempts every 5
    /// seconds
    pub const fn update() -> Self {
        Self::new(50, Duration::from_secs(5))
    }
}

// -----------------------------------------------------------------------------
// Polling structure

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Polling {
    pub create: Policy,
    pub update: Policy,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            create: Policy::create(),
            update: Policy::update(),
        }
    }
}

impl From<&cfg::Polling> for Polling {
    fn from(polling: &cfg::Polling) -> Self {
        Self {
            create: Policy::from(&polling.create),
            update: Policy::from(&polling.update),
        }
    }
}

// -----------------------------------------------------------------------------
// Outcome enumeration

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Outcome {
    /// the instance is running after the given number of attempts
    Running(u32),
    /// every attempt has been consumed, holds the last observed state
    Exhausted(Option<State>),
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to provision instance '{0}', remote state is 'failed'")]
    Failed(String),
    #[error("failed to retrieve state of instance '{0}', {1}")]
    Get(String, scalechamp::Error),
}

// -----------------------------------------------------------------------------
// helpers

/// polls the instance until it is `running` or `failed`. Running out of
/// attempts is not an error, the caller decides what to do with the last
/// observed state.
#[cfg_attr(feature = "trace", tracing::instrument(skip(client)))]
pub async fn until_terminal<C>(client: &C, id: &str, policy: &Policy) -> Result<Outcome, Error>
where
    C: Api + ?Sized,
{
    let mut last = None;

    for attempt in 1..=policy.attempts {
        sleep(policy.interval).await;

        let instance = client
            .get_instance(id)
            .await
            .map_err(|err| Error::Get(id.to_string(), err))?;

        match instance.state {
            State::Running => {
                debug!(id = id, attempt = attempt, "Instance is running");
                return Ok(Outcome::Running(attempt));
            }
            State::Failed => return Err(Error::Failed(id.to_string())),
            state => {
                trace!(
                    id = id,
                    attempt = attempt,
                    state = state.to_string(),
                    "Instance has not reached a terminal state yet"
                );
                last = Some(state);
            }
        }
    }

    Ok(Outcome::Exhausted(last))
}
