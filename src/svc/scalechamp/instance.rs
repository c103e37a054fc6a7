//! # Instance module
//!
//! This module provides structures and helpers to interact with the instance
//! api of scalechamp

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::svc::scalechamp::client::{Client, ClientError, RestClient};

// -----------------------------------------------------------------------------
// Constants

pub const STATE_RUNNING: &str = "running";
pub const STATE_FAILED: &str = "failed";

// -----------------------------------------------------------------------------
// State enumeration

/// lifecycle state of a remote instance, only `running` and `failed` are
/// terminal, any other state is kept verbatim
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(from = "String", into = "String")]
pub enum State {
    Running,
    Failed,
    Transitional(String),
}

impl From<String> for State {
    fn from(state: String) -> Self {
        match state.as_str() {
            STATE_RUNNING => Self::Running,
            STATE_FAILED => Self::Failed,
            _ => Self::Transitional(state),
        }
    }
}

impl From<State> for String {
    fn from(state: State) -> Self {
        state.to_string()
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "{}", STATE_RUNNING),
            Self::Failed => write!(f, "{}", STATE_FAILED),
            Self::Transitional(state) => write!(f, "{}", state),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Transitional(String::new())
    }
}

// -----------------------------------------------------------------------------
// ConnectionInfo structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct ConnectionInfo {
    #[serde(rename = "master_host", default)]
    pub master_host: String,
    #[serde(rename = "replica_host", default)]
    pub replica_host: String,
}

// -----------------------------------------------------------------------------
// Instance structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Instance {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "state", default)]
    pub state: State,
    #[serde(rename = "password", default)]
    pub password: String,
    #[serde(rename = "connection_info", default)]
    pub connection_info: ConnectionInfo,
}

// -----------------------------------------------------------------------------
// CreateRequest structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct CreateRequest {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "whitelist")]
    pub whitelist: Vec<String>,
    #[serde(rename = "password")]
    pub password: String,
    #[serde(rename = "plan_id")]
    pub plan_id: String,
    #[serde(
        rename = "eviction_policy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub eviction_policy: Option<String>,
    #[serde(rename = "license_key", default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

// -----------------------------------------------------------------------------
// UpdateRequest structure

/// partial update of an instance, fields left to `None` are not sent
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct UpdateRequest {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "whitelist", default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
    #[serde(rename = "password", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "enabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "plan_id", default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(
        rename = "eviction_policy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub eviction_policy: Option<String>,
    #[serde(rename = "license_key", default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

impl UpdateRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to create instance '{0}', {1}")]
    Create(String, ClientError),
    #[error("failed to get instance '{0}', {1}")]
    Get(String, ClientError),
    #[error("failed to update instance '{0}', {1}")]
    Update(String, ClientError),
    #[error("failed to delete instance '{0}', {1}")]
    Delete(String, ClientError),
}

// -----------------------------------------------------------------------------
// helpers

#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn create(client: &Client, request: &CreateRequest) -> Result<Instance, Error> {
    let path = format!("{}/v1/instances", client.endpoint());

    debug!(path = &path, name = &request.name, "Execute a request to create an instance");
    client
        .post(&path, request)
        .await
        .map_err(|err| Error::Create(request.name.to_owned(), err))
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(client)))]
pub async fn get(client: &Client, id: &str) -> Result<Instance, Error> {
    let path = format!("{}/v1/instances/{}", client.endpoint(), id);

    debug!(path = &path, "Execute a request to get an instance");
    client
        .get(&path)
        .await
        .map_err(|err| Error::Get(id.to_string(), err))
}

#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn update(client: &Client, request: &UpdateRequest) -> Result<Instance, Error> {
    let path = format!("{}/v1/instances/{}", client.endpoint(), request.id);

    debug!(path = &path, "Execute a request to update an instance");
    client
        .patch(&path, request)
        .await
        .map_err(|err| Error::Update(request.id.to_owned(), err))
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(client)))]
pub async fn delete(client: &Client, id: &str) -> Result<(), Error> {
    let path = format!("{}/v1/instances/{}", client.endpoint(), id);

    debug!(path = &path, "Execute a request to delete an instance");
    client
        .delete(&path)
        .await
        .map_err(|err| Error::Delete(id.to_string(), err))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[test]
    fn unknown_states_are_transitional() {
        let instance: Instance = serde_json::from_value(json!({
            "id": "i-1",
            "state": "provisioning",
        }))
        .unwrap();

        assert_eq!(instance.state, State::Transitional("provisioning".to_string()));
        assert_eq!(instance.connection_info, ConnectionInfo::default());
        assert_eq!(State::from("running".to_string()), State::Running);
        assert_eq!(State::from("failed".to_string()), State::Failed);
    }

    #[test]
    fn update_request_omits_untouched_fields() {
        let mut request = UpdateRequest::new("i-1");
        request.enabled = Some(false);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"enabled": false})
        );
        assert_eq!(
            serde_json::to_value(UpdateRequest::new("i-1")).unwrap(),
            json!({})
        );
    }

    #[tokio::test]
    async fn create_posts_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances"))
            .and(body_json(json!({
                "name": "cache",
                "whitelist": ["10.0.0.1/32"],
                "password": "",
                "plan_id": "plan-42",
                "eviction_policy": "allkeys-lru",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "i-1",
                "state": "provisioning",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "t0k3n").unwrap();
        let request = CreateRequest {
            name: "cache".to_string(),
            whitelist: vec!["10.0.0.1/32".to_string()],
            password: String::new(),
            plan_id: "plan-42".to_string(),
            eviction_policy: Some("allkeys-lru".to_string()),
            license_key: None,
        };

        let instance = create(&client, &request).await.unwrap();

        assert_eq!(instance.id, "i-1");
        assert_eq!(instance.state, State::Transitional("provisioning".to_string()));
    }

    #[tokio::test]
    async fn get_decodes_connection_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "i-1",
                "state": "running",
                "password": "pa55",
                "connection_info": {
                    "master_host": "master.i-1.scalechamp.net",
                    "replica_host": "replica.i-1.scalechamp.net",
                },
            })))
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "t0k3n").unwrap();
        let instance = get(&client, "i-1").await.unwrap();

        assert_eq!(instance.state, State::Running);
        assert_eq!(instance.password, "pa55");
        assert_eq!(
            instance.connection_info.master_host,
            "master.i-1.scalechamp.net"
        );
        assert_eq!(
            instance.connection_info.replica_host,
            "replica.i-1.scalechamp.net"
        );
    }

    #[tokio::test]
    async fn update_patches_only_given_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/instances/i-1"))
            .and(body_json(json!({"name": "renamed", "enabled": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "i-1",
                "state": "updating",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "t0k3n").unwrap();
        let mut request = UpdateRequest::new("i-1");
        request.name = Some("renamed".to_string());
        request.enabled = Some(true);

        let instance = update(&client, &request).await.unwrap();

        assert_eq!(instance.id, "i-1");
    }

    #[tokio::test]
    async fn delete_accepts_empty_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "t0k3n").unwrap();

        delete(&client, "i-1").await.unwrap();
    }
}
