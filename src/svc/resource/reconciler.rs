//! # Reconciler module
//!
//! This module provides the lifecycle operations of an instance resource:
//! create, read, update and delete. Create and update wait for the remote
//! instance to settle before reading it back.

use std::fmt::{self, Display, Formatter};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::svc::{
    resource::{
        combine,
        data::{self, ResourceData},
        poll::{self, Outcome, Policy, Polling},
        schema::{
            CLOUD, ENABLED, EVICTION_POLICY, LICENSE_KEY, MASTER_HOST, NAME, PASSWORD, PLAN,
            REGION, REPLICA_HOST, WHITELIST,
        },
        Capability, Errors, Kind,
    },
    scalechamp::{
        self,
        instance::{CreateRequest, UpdateRequest},
        plan::FindRequest,
        Api,
    },
};

// -----------------------------------------------------------------------------
// Action enumeration

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub enum Action {
    ResolvePlan,
    CreateInstance,
    UpdateInstance,
    WaitInstance,
    ReadInstance,
    DeleteInstance,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ResolvePlan => write!(f, "ResolvePlan"),
            Self::CreateInstance => write!(f, "CreateInstance"),
            Self::UpdateInstance => write!(f, "UpdateInstance"),
            Self::WaitInstance => write!(f, "WaitInstance"),
            Self::ReadInstance => write!(f, "ReadInstance"),
            Self::DeleteInstance => write!(f, "DeleteInstance"),
        }
    }
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to resolve plan, {0}")]
    Lookup(scalechamp::Error),
    #[error("failed to execute request on scalechamp api, {0}")]
    Transport(scalechamp::Error),
    #[error("failed to provision instance '{0}', remote state is 'failed'")]
    ProvisioningFailed(String),
    #[error("failed to write back computed attributes, {0}")]
    ReadBack(Errors<data::Error>),
    #[error("failed to find the identifier of the resource, it has not been created")]
    MissingIdentifier,
    #[error("failed to create resource, it is already identified by '{0}'")]
    AlreadyIdentified(String),
    #[error("failed to update resource data, {0}")]
    Data(data::Error),
}

impl From<scalechamp::Error> for Error {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn from(err: scalechamp::Error) -> Self {
        if err.is_plan_not_found() {
            return Self::Lookup(err);
        }

        Self::Transport(err)
    }
}

impl From<poll::Error> for Error {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn from(err: poll::Error) -> Self {
        match err {
            poll::Error::Failed(id) => Self::ProvisioningFailed(id),
            poll::Error::Get(_, err) => Self::Transport(err),
        }
    }
}

impl From<data::Error> for Error {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn from(err: data::Error) -> Self {
        Self::Data(err)
    }
}

// -----------------------------------------------------------------------------
// Reconciler structure

/// maps the lifecycle of an instance resource of a given kind onto the
/// scalechamp api
#[derive(Clone, Debug)]
pub struct Reconciler<C> {
    kind: Kind,
    client: C,
    polling: Polling,
}

impl<C> Reconciler<C>
where
    C: Api,
{
    pub fn new(kind: Kind, client: C, polling: Polling) -> Self {
        Self {
            kind,
            client,
            polling,
        }
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// creates the instance, waits for it to run and reads back computed
    /// attributes
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn create<D>(&self, data: &mut D) -> Result<(), Error>
    where
        D: ResourceData,
    {
        if let Some(id) = data.id() {
            return Err(Error::AlreadyIdentified(id.to_string()));
        }

        let name = data.get_string(NAME);

        // ---------------------------------------------------------------------
        // Step 1: resolve plan

        let plan_id = self.resolve_plan(data).await?;

        // ---------------------------------------------------------------------
        // Step 2: create instance

        let request = CreateRequest {
            name: name.to_owned(),
            whitelist: data.get_set(WHITELIST).into_iter().collect(),
            password: data.get_string(PASSWORD),
            plan_id,
            eviction_policy: self.gated(data, Capability::Eviction, EVICTION_POLICY),
            license_key: self.gated(data, Capability::License, LICENSE_KEY),
        };

        info!(
            action = Action::CreateInstance.to_string(),
            kind = self.kind.to_string(),
            name = &name,
            "Create instance"
        );
        let instance = self.client.create_instance(&request).await?;

        data.set_id(&instance.id)?;

        // ---------------------------------------------------------------------
        // Step 3: wait for the instance and read it back

        self.wait(&instance.id, &self.polling.create).await?;
        self.read(data).await
    }

    /// sends the attributes that changed since the prior state, waits for the
    /// instance to run and reads back computed attributes
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn update<D>(&self, data: &mut D) -> Result<(), Error>
    where
        D: ResourceData,
    {
        let id = identifier(data)?;
        let mut request = UpdateRequest::new(&id);

        // ---------------------------------------------------------------------
        // Step 1: compute the partial update

        if data.has_change(NAME) {
            request.name = Some(data.get_string(NAME));
        }

        // any of them could lead to another plan
        if [CLOUD, REGION, PLAN].iter().any(|field| data.has_change(field)) {
            request.plan_id = Some(self.resolve_plan(data).await?);
        }

        if data.has_change(PASSWORD) {
            request.password = Some(data.get_string(PASSWORD));
        }

        if data.has_change(ENABLED) {
            request.enabled = Some(data.get_bool(ENABLED));
        }

        if data.has_change(WHITELIST) {
            request.whitelist = Some(data.get_set(WHITELIST).into_iter().collect());
        }

        if data.has_change(EVICTION_POLICY) {
            request.eviction_policy = self.gated(data, Capability::Eviction, EVICTION_POLICY);
        }

        if data.has_change(LICENSE_KEY) {
            request.license_key = self.gated(data, Capability::License, LICENSE_KEY);
        }

        // ---------------------------------------------------------------------
        // Step 2: update instance

        info!(
            action = Action::UpdateInstance.to_string(),
            kind = self.kind.to_string(),
            id = &id,
            "Update instance"
        );
        debug!(id = &id, request = ?request, "Send partial update");
        self.client.update_instance(&request).await?;

        // ---------------------------------------------------------------------
        // Step 3: wait for the instance and read it back

        self.wait(&id, &self.polling.update).await?;
        self.read(data).await
    }

    /// fetches the instance and writes back its computed attributes, every
    /// attribute is written even if a previous one failed
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn read<D>(&self, data: &mut D) -> Result<(), Error>
    where
        D: ResourceData,
    {
        let id = identifier(data)?;

        info!(
            action = Action::ReadInstance.to_string(),
            kind = self.kind.to_string(),
            id = &id,
            "Read instance"
        );
        let instance = self.client.get_instance(&id).await?;

        combine([
            data.set(PASSWORD, Value::String(instance.password)),
            data.set(
                REPLICA_HOST,
                Value::String(instance.connection_info.replica_host),
            ),
            data.set(
                MASTER_HOST,
                Value::String(instance.connection_info.master_host),
            ),
        ])
        .map_err(Error::ReadBack)
    }

    /// deletes the instance, the deletion is not awaited
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete<D>(&self, data: &mut D) -> Result<(), Error>
    where
        D: ResourceData,
    {
        let id = identifier(data)?;

        info!(
            action = Action::DeleteInstance.to_string(),
            kind = self.kind.to_string(),
            id = &id,
            "Delete instance"
        );
        self.client.delete_instance(&id).await?;

        data.clear_id();
        Ok(())
    }

    async fn resolve_plan<D>(&self, data: &D) -> Result<String, Error>
    where
        D: ResourceData,
    {
        let request = FindRequest {
            cloud: data.get_string(CLOUD),
            region: data.get_string(REGION),
            name: data.get_string(PLAN),
            kind: self.kind.to_string(),
        };

        info!(
            action = Action::ResolvePlan.to_string(),
            kind = self.kind.to_string(),
            "Resolve {}",
            request
        );
        let plan = self.client.find_plan(&request).await?;

        debug!(plan = &plan.id, "Resolved {}", request);
        Ok(plan.id)
    }

    async fn wait(&self, id: &str, policy: &Policy) -> Result<(), Error> {
        info!(
            action = Action::WaitInstance.to_string(),
            kind = self.kind.to_string(),
            id = id,
            attempts = policy.attempts,
            interval = policy.interval.as_secs(),
            "Wait for instance to run"
        );

        match poll::until_terminal(&self.client, id, policy).await? {
            Outcome::Running(attempts) => {
                debug!(id = id, attempts = attempts, "Instance is running");
            }
            // TODO: turn exhaustion into an error once callers are able to
            // resume waiting on a still provisioning instance
            Outcome::Exhausted(state) => {
                warn!(
                    id = id,
                    attempts = policy.attempts,
                    state = state.map(|s| s.to_string()).unwrap_or_default(),
                    "Instance has not reached a terminal state, carry on with its current state"
                );
            }
        }

        Ok(())
    }

    /// returns the value of the field if the kind has the capability and the
    /// value is not empty
    fn gated<D>(&self, data: &D, capability: Capability, field: &str) -> Option<String>
    where
        D: ResourceData,
    {
        if !self.kind.has(capability) {
            return None;
        }

        Some(data.get_string(field)).filter(|value| !value.is_empty())
    }
}

// -----------------------------------------------------------------------------
// helpers

fn identifier<D>(data: &D) -> Result<String, Error>
where
    D: ResourceData,
{
    data.id()
        .map(ToOwned::to_owned)
        .ok_or(Error::MissingIdentifier)
}
