//! # Plan module
//!
//! This module provides structures and helpers to resolve a plan by its human
//! readable name from the scalechamp catalog

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::svc::scalechamp::client::{Client, ClientError, RestClient};

// -----------------------------------------------------------------------------
// FindRequest structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct FindRequest {
    #[serde(rename = "cloud")]
    pub cloud: String,
    #[serde(rename = "region")]
    pub region: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "kind")]
    pub kind: String,
}

impl Display for FindRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plan '{}' of kind '{}' in '{}/{}'",
            self.name, self.kind, self.cloud, self.region
        )
    }
}

// -----------------------------------------------------------------------------
// Plan structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Plan {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "name", default)]
    pub name: String,
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to find {0}")]
    NotFound(FindRequest),
    #[error("failed to look up {0}, {1}")]
    Find(FindRequest, ClientError),
}

// -----------------------------------------------------------------------------
// helpers

/// look up the catalog for a plan matching the request, a plan that does not
/// exist is reported as [`Error::NotFound`]
#[cfg_attr(feature = "trace", tracing::instrument(skip(client)))]
pub async fn find(client: &Client, request: &FindRequest) -> Result<Plan, Error> {
    let path = format!("{}/v1/plans/find", client.endpoint());

    debug!(path = &path, "Execute a request to find {}", request);
    match client.post(&path, request).await {
        Ok(plan) => Ok(plan),
        Err(err) if err.status() == Some(404) => Err(Error::NotFound(request.to_owned())),
        Err(err) => Err(Error::Find(request.to_owned(), err)),
    }
}
