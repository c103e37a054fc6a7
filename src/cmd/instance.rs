//! # Instance module
//!
//! This module provides instance command line interface function
//! implementation. Resources are read from and written to yaml documents.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::Subcommand;
use tracing::debug;

use crate::{
    cmd::Executor,
    svc::{
        cfg::Configuration,
        resource::{
            data::{Data, Document},
            poll::Polling,
            reconciler::{self, Reconciler},
            schema::{self, Schema},
            Errors, Kind,
        },
        scalechamp::client::{Client, ClientError},
    },
};

// -----------------------------------------------------------------------------
// InstanceError enum

#[derive(thiserror::Error, Debug)]
pub enum InstanceError {
    #[error("failed to read file '{0:?}', {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to deserialize resource from file '{0:?}', {1}")]
    Deserialize(PathBuf, serde_yaml::Error),
    #[error("failed to validate resource from file '{0:?}', {1}")]
    Validate(PathBuf, Errors<schema::Error>),
    #[error("failed to create scalechamp client, {0}")]
    Client(ClientError),
    #[error("failed to reconcile instance, {0}")]
    Reconcile(reconciler::Error),
    #[error("failed to serialize resource, {0}")]
    Serialize(serde_yaml::Error),
}

// -----------------------------------------------------------------------------
// Instance enum

#[derive(Subcommand, Clone, Debug)]
pub enum Instance {
    /// Create an instance from a declared resource
    #[clap(name = "create", aliases = &["c"])]
    Create {
        #[clap(short = 'k', long = "kind", help = "Kind of the instance")]
        kind: Kind,
        #[clap(short = 'f', long = "file", help = "Resource declared by the user")]
        file: PathBuf,
    },
    /// Refresh computed attributes of a known resource
    #[clap(name = "read", aliases = &["r"])]
    Read {
        #[clap(short = 'k', long = "kind", help = "Kind of the instance")]
        kind: Kind,
        #[clap(short = 'f', long = "file", help = "State of the resource")]
        file: PathBuf,
    },
    /// Update an instance from its prior state to a planned resource
    #[clap(name = "update", aliases = &["u"])]
    Update {
        #[clap(short = 'k', long = "kind", help = "Kind of the instance")]
        kind: Kind,
        #[clap(short = 'p', long = "prior", help = "Prior state of the resource")]
        prior: PathBuf,
        #[clap(short = 'f', long = "file", help = "Resource planned by the user")]
        file: PathBuf,
    },
    /// Delete the instance of a known resource
    #[clap(name = "delete", aliases = &["d"])]
    Delete {
        #[clap(short = 'k', long = "kind", help = "Kind of the instance")]
        kind: Kind,
        #[clap(short = 'f', long = "file", help = "State of the resource")]
        file: PathBuf,
    },
}

#[async_trait]
impl Executor for Instance {
    type Error = InstanceError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Create { kind, file } => create(config, *kind, file).await,
            Self::Read { kind, file } => read(config, *kind, file).await,
            Self::Update { kind, prior, file } => update(config, *kind, prior, file).await,
            Self::Delete { kind, file } => delete(config, *kind, file).await,
        }
    }
}

// -----------------------------------------------------------------------------
// commands

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn create(
    config: Arc<Configuration>,
    kind: Kind,
    file: &PathBuf,
) -> Result<(), InstanceError> {
    let mut data = Data::declared(Schema::new(kind), load(file).await?)
        .map_err(|errs| InstanceError::Validate(file.to_owned(), errs))?;

    let result = reconciler(&config, kind)?.create(&mut data).await;

    // the identifier has to be kept even if waiting or reading back failed
    output(&data)?;
    result.map_err(InstanceError::Reconcile)
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn read(
    config: Arc<Configuration>,
    kind: Kind,
    file: &PathBuf,
) -> Result<(), InstanceError> {
    let mut data = Data::state(Schema::new(kind), load(file).await?)
        .map_err(|errs| InstanceError::Validate(file.to_owned(), errs))?;

    let result = reconciler(&config, kind)?.read(&mut data).await;

    output(&data)?;
    result.map_err(InstanceError::Reconcile)
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn update(
    config: Arc<Configuration>,
    kind: Kind,
    prior: &PathBuf,
    file: &PathBuf,
) -> Result<(), InstanceError> {
    let mut data = Data::planned(Schema::new(kind), load(prior).await?, load(file).await?)
        .map_err(|errs| InstanceError::Validate(file.to_owned(), errs))?;

    let result = reconciler(&config, kind)?.update(&mut data).await;

    output(&data)?;
    result.map_err(InstanceError::Reconcile)
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn delete(
    config: Arc<Configuration>,
    kind: Kind,
    file: &PathBuf,
) -> Result<(), InstanceError> {
    let mut data = Data::state(Schema::new(kind), load(file).await?)
        .map_err(|errs| InstanceError::Validate(file.to_owned(), errs))?;

    reconciler(&config, kind)?
        .delete(&mut data)
        .await
        .map_err(InstanceError::Reconcile)?;

    output(&data)
}

// -----------------------------------------------------------------------------
// helpers

fn reconciler(config: &Configuration, kind: Kind) -> Result<Reconciler<Client>, InstanceError> {
    let client = Client::try_from(&config.api).map_err(InstanceError::Client)?;

    Ok(Reconciler::new(kind, client, Polling::from(&config.polling)))
}

/// reads a resource document from the given yaml file
pub async fn load(file: &PathBuf) -> Result<Document, InstanceError> {
    debug!(file = file.display().to_string(), "Load resource");
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|err| InstanceError::Read(file.to_owned(), err))?;

    serde_yaml::from_str(&content).map_err(|err| InstanceError::Deserialize(file.to_owned(), err))
}

pub fn output(data: &Data) -> Result<(), InstanceError> {
    let yaml = serde_yaml::to_string(&data.to_document()).map_err(InstanceError::Serialize)?;

    print!("{}", yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[tokio::test]
    async fn load_a_resource_document() {
        let file = file(
            r#"
id: i-1
attributes:
  name: cache
  enabled: false
  whitelist:
    - 10.0.0.1/32
"#,
        );

        let document = load(&file.path().to_path_buf()).await.unwrap();

        assert_eq!(document.id.as_deref(), Some("i-1"));
        assert_eq!(document.attributes.get("enabled"), Some(&json!(false)));
        assert_eq!(
            document.attributes.get("whitelist"),
            Some(&json!(["10.0.0.1/32"]))
        );
    }

    #[tokio::test]
    async fn load_reports_the_faulty_file() {
        let file = file("attributes: [");

        let err = load(&file.path().to_path_buf()).await.unwrap_err();

        assert!(matches!(err, InstanceError::Deserialize(ref path, _) if path == file.path()));
    }

    #[tokio::test]
    async fn load_fails_on_missing_file() {
        let err = load(&PathBuf::from("/nonexistent/resource.yaml"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstanceError::Read(_, _)));
    }
}
