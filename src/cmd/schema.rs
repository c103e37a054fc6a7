//! # Schema module
//!
//! This module provides schema command line interface function
//! implementation

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;

use crate::{
    cmd::Executor,
    svc::{
        cfg::Configuration,
        resource::{schema::Schema as ResourceSchema, Kind},
    },
};

// -----------------------------------------------------------------------------
// SchemaError enum

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("failed to serialize schema, {0}")]
    Serialize(serde_yaml::Error),
}

// -----------------------------------------------------------------------------
// Schema enum

#[derive(Subcommand, Clone, Debug)]
pub enum Schema {
    /// View the schema of instance resources
    #[clap(name = "view", aliases = &["v"])]
    View {
        #[clap(name = "kind")]
        kind: Option<Kind>,
    },
}

#[async_trait]
impl Executor for Schema {
    type Error = SchemaError;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::View { kind } => view(config, kind).await,
        }
    }
}

// -----------------------------------------------------------------------------
// helpers

/// returns the yaml documents of the schema of the given kind or of every
/// kind
pub fn render(kind: &Option<Kind>) -> Result<String, SchemaError> {
    let kinds = match kind {
        Some(kind) => vec![*kind],
        None => Kind::ALL.to_vec(),
    };

    let documents = kinds
        .into_iter()
        .map(|kind| serde_yaml::to_string(&ResourceSchema::new(kind)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(SchemaError::Serialize)?;

    Ok(documents.join("---\n"))
}

#[cfg_attr(feature = "trace", tracing::instrument(skip(_config)))]
pub async fn view(_config: Arc<Configuration>, kind: &Option<Kind>) -> Result<(), SchemaError> {
    print!("{}", render(kind)?);
    Ok(())
}
