//! # Client module
//!
//! This module provides an http client to interact with the scalechamp api

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::trace;

use crate::svc::cfg;

// -----------------------------------------------------------------------------
// RestClient trait

#[async_trait]
pub trait RestClient {
    type Error;

    async fn get<T>(&self, endpoint: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned + Send + Sync;

    async fn post<T, U>(&self, endpoint: &str, payload: &T) -> Result<U, Self::Error>
    where
        T: Serialize + Send + Sync,
        U: DeserializeOwned + Send + Sync;

    async fn patch<T, U>(&self, endpoint: &str, payload: &T) -> Result<U, Self::Error>
    where
        T: Serialize + Send + Sync,
        U: DeserializeOwned + Send + Sync;

    async fn delete(&self, endpoint: &str) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// ResponseError structure

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResponseError {
    #[serde(rename = "message")]
    pub message: String,
}

// -----------------------------------------------------------------------------
// ClientError enum

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("failed to create http client, {0}")]
    Build(reqwest::Error),
    #[error("failed to execute request, {0}")]
    Request(reqwest::Error),
    #[error("failed to execute request, got status code {0}, {1}")]
    StatusCode(u16, String),
    #[error("failed to aggregate body, {0}")]
    BodyAggregation(reqwest::Error),
    #[error("failed to deserialize body, {0}")]
    Deserialize(serde_json::Error),
}

impl ClientError {
    /// returns the http status code of the response, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StatusCode(code, _) => Some(*code),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Client structure

#[derive(Clone, Debug)]
pub struct Client {
    inner: reqwest::Client,
    endpoint: String,
    token: String,
}

impl TryFrom<&cfg::Api> for Client {
    type Error = ClientError;

    fn try_from(api: &cfg::Api) -> Result<Self, Self::Error> {
        Self::new(&api.endpoint, &api.token)
    }
}

impl Client {
    pub fn new(endpoint: &str, token: &str) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            inner,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// returns the base url of the api without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let builder = self.inner.request(method, endpoint);
        if self.token.is_empty() {
            return builder;
        }

        builder.bearer_auth(&self.token)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let req = builder.build().map_err(ClientError::Request)?;
        let (method, url) = (req.method().to_string(), req.url().to_string());

        trace!(method = &method, endpoint = &url, "Execute request");
        let res = self
            .inner
            .execute(req)
            .await
            .map_err(ClientError::Request)?;

        let status = res.status();
        let buf = res
            .bytes()
            .await
            .map_err(ClientError::BodyAggregation)?
            .to_vec();

        trace!(
            method = &method,
            endpoint = &url,
            status = status.as_u16(),
            "Got response"
        );
        if !status.is_success() {
            return Err(ClientError::StatusCode(status.as_u16(), message(status, &buf)));
        }

        Ok(buf)
    }
}

#[async_trait]
impl RestClient for Client {
    type Error = ClientError;

    async fn get<T>(&self, endpoint: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let buf = self.execute(self.request(Method::GET, endpoint)).await?;

        serde_json::from_slice(&buf).map_err(ClientError::Deserialize)
    }

    async fn post<T, U>(&self, endpoint: &str, payload: &T) -> Result<U, Self::Error>
    where
        T: Serialize + Send + Sync,
        U: DeserializeOwned + Send + Sync,
    {
        let buf = self
            .execute(self.request(Method::POST, endpoint).json(payload))
            .await?;

        serde_json::from_slice(&buf).map_err(ClientError::Deserialize)
    }

    async fn patch<T, U>(&self, endpoint: &str, payload: &T) -> Result<U, Self::Error>
    where
        T: Serialize + Send + Sync,
        U: DeserializeOwned + Send + Sync,
    {
        let buf = self
            .execute(self.request(Method::PATCH, endpoint).json(payload))
            .await?;

        serde_json::from_slice(&buf).map_err(ClientError::Deserialize)
    }

    async fn delete(&self, endpoint: &str) -> Result<(), Self::Error> {
        self.execute(self.request(Method::DELETE, endpoint))
            .await
            .map(|_| ())
    }
}

// -----------------------------------------------------------------------------
// helpers

/// returns the message of an api error, falling back on the raw body and then
/// on the status reason
fn message(status: StatusCode, buf: &[u8]) -> String {
    if let Ok(err) = serde_json::from_slice::<ResponseError>(buf) {
        return err.message;
    }

    let body = String::from_utf8_lossy(buf).trim().to_string();
    if !body.is_empty() {
        return body;
    }

    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn requests_are_authenticated_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .and(header("authorization", "Bearer t0k3n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pong": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&format!("{}/", server.uri()), "t0k3n").unwrap();
        let body: serde_json::Value = client
            .get(&format!("{}/v1/ping", client.endpoint()))
            .await
            .unwrap();

        assert_eq!(body, json!({"pong": true}));
    }

    #[tokio::test]
    async fn error_status_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/instances/abc"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "instance is locked"})),
            )
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "t0k3n").unwrap();
        let err = client
            .delete(&format!("{}/v1/instances/abc", client.endpoint()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("instance is locked"), "{}", err);
    }

    #[test]
    fn message_falls_back_on_reason() {
        assert_eq!(message(StatusCode::BAD_GATEWAY, b""), "Bad Gateway");
        assert_eq!(message(StatusCode::BAD_GATEWAY, b"upstream down"), "upstream down");
    }
}
