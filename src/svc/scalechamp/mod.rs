//! # ScaleChamp module
//!
//! This module provide structures, traits and helpers related to the
//! scalechamp provisioning api.

use async_trait::async_trait;

use crate::svc::scalechamp::{
    client::Client,
    instance::{CreateRequest, Instance, UpdateRequest},
    plan::{FindRequest, Plan},
};

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod instance;
pub mod plan;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Plan(plan::Error),
    #[error("{0}")]
    Instance(instance::Error),
}

impl From<plan::Error> for Error {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn from(err: plan::Error) -> Self {
        Self::Plan(err)
    }
}

impl From<instance::Error> for Error {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn from(err: instance::Error) -> Self {
        Self::Instance(err)
    }
}

impl Error {
    /// returns if the error comes from a plan that does not exist in the
    /// catalog
    pub fn is_plan_not_found(&self) -> bool {
        matches!(self, Self::Plan(plan::Error::NotFound(_)))
    }
}

// -----------------------------------------------------------------------------
// Api trait

/// operations of the scalechamp api the lifecycle reconciler relies on
#[async_trait]
pub trait Api: Send + Sync {
    async fn find_plan(&self, request: &FindRequest) -> Result<Plan, Error>;

    async fn create_instance(&self, request: &CreateRequest) -> Result<Instance, Error>;

    async fn get_instance(&self, id: &str) -> Result<Instance, Error>;

    async fn update_instance(&self, request: &UpdateRequest) -> Result<Instance, Error>;

    async fn delete_instance(&self, id: &str) -> Result<(), Error>;
}

#[async_trait]
impl Api for Client {
    async fn find_plan(&self, request: &FindRequest) -> Result<Plan, Error> {
        Ok(plan::find(self, request).await?)
    }

    async fn create_instance(&self, request: &CreateRequest) -> Result<Instance, Error> {
        Ok(instance::create(self, request).await?)
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, Error> {
        Ok(instance::get(self, id).await?)
    }

    async fn update_instance(&self, request: &UpdateRequest) -> Result<Instance, Error> {
        Ok(instance::update(self, request).await?)
    }

    async fn delete_instance(&self, id: &str) -> Result<(), Error> {
        Ok(instance::delete(self, id).await?)
    }
}
