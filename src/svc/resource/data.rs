//! # Data module
//!
//! This module provides the resource data handed over to the lifecycle
//! reconciler: the identity of the resource, its attributes and the prior
//! attributes used to detect changes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::svc::resource::{
    schema::{self, Schema, Source, MASTER_HOST, PASSWORD, REPLICA_HOST},
    Errors,
};

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, PartialEq, Eq, Clone, Debug)]
pub enum Error {
    #[error("failed to set attribute, {0}")]
    Attribute(schema::Error),
    #[error("failed to set identifier '{1}', resource is already identified by '{0}'")]
    Identity(String, String),
}

impl From<schema::Error> for Error {
    fn from(err: schema::Error) -> Self {
        Self::Attribute(err)
    }
}

// -----------------------------------------------------------------------------
// ResourceData trait

/// view of a resource the lifecycle operations read from and write back to
pub trait ResourceData {
    fn id(&self) -> Option<&str>;

    /// assigns the identity of the resource, it could be done only once
    fn set_id(&mut self, id: &str) -> Result<(), Error>;

    fn clear_id(&mut self);

    fn get(&self, field: &str) -> Option<&Value>;

    /// returns if the attribute differs from its prior value
    fn has_change(&self, field: &str) -> bool;

    fn set(&mut self, field: &str, value: Value) -> Result<(), Error>;

    fn get_string(&self, field: &str) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.to_owned(),
            _ => String::new(),
        }
    }

    fn get_bool(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Value::Bool(true)))
    }

    fn get_set(&self, field: &str) -> BTreeSet<String> {
        match self.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// Document structure

/// serialized form of a resource
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
pub struct Document {
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "attributes", default)]
    pub attributes: BTreeMap<String, Value>,
}

// -----------------------------------------------------------------------------
// Data structure

#[derive(PartialEq, Clone, Debug)]
pub struct Data {
    schema: Schema,
    id: Option<String>,
    attributes: BTreeMap<String, Value>,
    prior: BTreeMap<String, Value>,
}

impl Data {
    /// returns the data of a resource declared by the user, there is no prior
    /// state so nothing is considered as changed
    pub fn declared(schema: Schema, document: Document) -> Result<Self, Errors<schema::Error>> {
        Self::load(schema, document, Source::Declared)
    }

    /// returns the data of an already known resource
    pub fn state(schema: Schema, document: Document) -> Result<Self, Errors<schema::Error>> {
        Self::load(schema, document, Source::State)
    }

    /// returns the data of a known resource whose user declaration moved to
    /// `planned`. Attributes computed by the provider and not declared are
    /// carried over from the prior state.
    pub fn planned(
        schema: Schema,
        prior: Document,
        planned: Document,
    ) -> Result<Self, Errors<schema::Error>> {
        let prior = Self::state(schema, prior)?;
        prior.schema.validate(&planned.attributes, Source::Declared)?;

        let mut attributes = planned.attributes;
        for (field, attribute) in &prior.schema.attributes {
            if !attribute.computed || attributes.contains_key(field) {
                continue;
            }

            if let Some(value) = prior.attributes.get(field) {
                attributes.insert(field.to_owned(), value.to_owned());
            }
        }

        prior.schema.apply_defaults(&mut attributes);

        Ok(Self {
            id: prior.id,
            prior: prior.attributes,
            schema: prior.schema,
            attributes,
        })
    }

    fn load(
        schema: Schema,
        document: Document,
        source: Source,
    ) -> Result<Self, Errors<schema::Error>> {
        schema.validate(&document.attributes, source)?;

        let mut attributes = document.attributes;
        schema.apply_defaults(&mut attributes);

        Ok(Self {
            schema,
            id: document.id,
            prior: attributes.to_owned(),
            attributes,
        })
    }

    /// returns the serialized form of the resource
    pub fn to_document(&self) -> Document {
        Document {
            id: self.id.to_owned(),
            attributes: self.attributes.to_owned(),
        }
    }

    /// returns the attributes computed by the provider
    pub fn computed(&self) -> BTreeMap<String, Value> {
        [PASSWORD, MASTER_HOST, REPLICA_HOST]
            .into_iter()
            .filter_map(|field| {
                self.attributes
                    .get(field)
                    .map(|value| (field.to_string(), value.to_owned()))
            })
            .collect()
    }
}

impl ResourceData for Data {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: &str) -> Result<(), Error> {
        match &self.id {
            Some(current) if current != id => Err(Error::Identity(current.to_owned(), id.to_string())),
            _ => {
                self.id = Some(id.to_string());
                Ok(())
            }
        }
    }

    fn clear_id(&mut self) {
        self.id = None;
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    fn has_change(&self, field: &str) -> bool {
        present(&self.attributes, field) != present(&self.prior, field)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), Error> {
        let value = self.schema.check(field, value)?;

        self.attributes.insert(field.to_string(), value);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// helpers

/// returns the value of the field, an empty set counts as an absent one
fn present<'a>(attributes: &'a BTreeMap<String, Value>, field: &str) -> Option<&'a Value> {
    attributes
        .get(field)
        .filter(|value| !matches!(value, Value::Array(items) if items.is_empty()))
}
