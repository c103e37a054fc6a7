//! # Command module
//!
//! This module provide command line interface structures and helpers
use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};

use crate::{
    cmd::{instance::InstanceError, schema::SchemaError},
    svc::cfg::Configuration,
};

pub mod instance;
pub mod schema;

// -----------------------------------------------------------------------------
// Executor trait

#[async_trait]
pub trait Executor {
    type Error;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// Error enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to execute command '{0}', {1}")]
    Execution(String, Arc<Error>),
    #[error("failed to execute command, {0}")]
    Schema(SchemaError),
    #[error("failed to execute command, {0}")]
    Instance(InstanceError),
    #[error("failed to find a command to execute, see '--help'")]
    MissingCommand,
}

// -----------------------------------------------------------------------------
// Command enum

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Interact with the schema of instance resources
    #[clap(name = "schema", aliases = &["s"], subcommand)]
    Schema(schema::Schema),
    /// Manage the lifecycle of instance resources
    #[clap(name = "instance", aliases = &["i"], subcommand)]
    Instance(instance::Instance),
}

#[async_trait]
impl Executor for Command {
    type Error = Error;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Schema(schema) => schema
                .execute(config)
                .await
                .map_err(Error::Schema)
                .map_err(|err| Error::Execution("schema".into(), Arc::new(err))),
            Self::Instance(instance) => instance
                .execute(config)
                .await
                .map_err(Error::Instance)
                .map_err(|err| Error::Execution("instance".into(), Arc::new(err))),
        }
    }
}

// -----------------------------------------------------------------------------
// Args struct

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Args {
    /// Increase log verbosity
    #[clap(short = 'v', global = true, action = ArgAction::Count)]
    pub verbosity: u8,
    /// Specify location of configuration
    #[clap(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Check if configuration is healthy
    #[clap(short = 't', long = "check", global = true)]
    pub check: bool,
    #[clap(subcommand)]
    pub command: Option<Command>,
}
