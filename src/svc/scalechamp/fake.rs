//! # Fake module
//!
//! This module provides an in-memory implementation of the [`Api`] trait that
//! records calls and replays scripted instance states.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::svc::scalechamp::{
    client::ClientError,
    instance::{self, ConnectionInfo, CreateRequest, Instance, State, UpdateRequest},
    plan::{self, FindRequest, Plan},
    Api, Error,
};

// -----------------------------------------------------------------------------
// Constants

pub const INSTANCE_ID: &str = "i-1";
pub const PLAN_ID: &str = "plan-42";
pub const PASSWORD: &str = "pa55";
pub const MASTER_HOST: &str = "master.i-1.scalechamp.net";
pub const REPLICA_HOST: &str = "replica.i-1.scalechamp.net";

// -----------------------------------------------------------------------------
// Call enumeration

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Call {
    FindPlan(FindRequest),
    CreateInstance(CreateRequest),
    GetInstance(String),
    UpdateInstance(UpdateRequest),
    DeleteInstance(String),
}

// -----------------------------------------------------------------------------
// FakeApi structure

#[derive(Debug)]
pub struct FakeApi {
    plan: Option<Plan>,
    instance: Instance,
    states: Mutex<VecDeque<State>>,
    fallback: State,
    unreachable: bool,
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            plan: Some(Plan {
                id: PLAN_ID.to_string(),
                name: "hobby-100".to_string(),
            }),
            instance: Instance {
                id: INSTANCE_ID.to_string(),
                state: State::Transitional("provisioning".to_string()),
                password: PASSWORD.to_string(),
                connection_info: ConnectionInfo {
                    master_host: MASTER_HOST.to_string(),
                    replica_host: REPLICA_HOST.to_string(),
                },
            },
            states: Mutex::new(VecDeque::new()),
            fallback: State::Running,
            unreachable: false,
            calls: Mutex::new(vec![]),
        }
    }
}

impl FakeApi {
    /// the catalog does not hold any plan
    pub fn without_plan(mut self) -> Self {
        self.plan = None;
        self
    }

    /// states returned by successive gets, before the fallback one
    pub fn with_states<I>(self, states: I) -> Self
    where
        I: IntoIterator<Item = State>,
    {
        self.states
            .lock()
            .expect("states lock to not be poisoned")
            .extend(states);
        self
    }

    /// state returned once scripted states are consumed
    pub fn with_fallback(mut self, state: State) -> Self {
        self.fallback = state;
        self
    }

    /// gets fail as if the api was down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .expect("calls lock to not be poisoned")
            .to_owned()
    }

    pub fn gets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::GetInstance(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .expect("calls lock to not be poisoned")
            .push(call);
    }
}

#[async_trait]
impl Api for FakeApi {
    async fn find_plan(&self, request: &FindRequest) -> Result<Plan, Error> {
        self.record(Call::FindPlan(request.to_owned()));

        self.plan
            .to_owned()
            .ok_or_else(|| plan::Error::NotFound(request.to_owned()).into())
    }

    async fn create_instance(&self, request: &CreateRequest) -> Result<Instance, Error> {
        self.record(Call::CreateInstance(request.to_owned()));

        Ok(self.instance.to_owned())
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, Error> {
        self.record(Call::GetInstance(id.to_string()));
        if self.unreachable {
            return Err(instance::Error::Get(
                id.to_string(),
                ClientError::StatusCode(503, "service unavailable".to_string()),
            )
            .into());
        }

        let state = self
            .states
            .lock()
            .expect("states lock to not be poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.to_owned());

        Ok(Instance {
            state,
            ..self.instance.to_owned()
        })
    }

    async fn update_instance(&self, request: &UpdateRequest) -> Result<Instance, Error> {
        self.record(Call::UpdateInstance(request.to_owned()));

        Ok(self.instance.to_owned())
    }

    async fn delete_instance(&self, id: &str) -> Result<(), Error> {
        self.record(Call::DeleteInstance(id.to_string()));

        Ok(())
    }
}
