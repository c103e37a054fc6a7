//! # Schema module
//!
//! This module describes the attributes recognized by an instance resource
//! for a given kind, and checks values against them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::svc::resource::{combine, Capability, Errors, Kind};

// -----------------------------------------------------------------------------
// Constants

pub const NAME: &str = "name";
pub const PLAN: &str = "plan";
pub const CLOUD: &str = "cloud";
pub const REGION: &str = "region";
pub const ENABLED: &str = "enabled";
pub const EVICTION_POLICY: &str = "eviction_policy";
pub const WHITELIST: &str = "whitelist";
pub const LICENSE_KEY: &str = "license_key";
pub const PASSWORD: &str = "password";
pub const MASTER_HOST: &str = "master_host";
pub const REPLICA_HOST: &str = "replica_host";

// -----------------------------------------------------------------------------
// Type enumeration

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum Type {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "bool")]
    Bool,
    /// unordered collection of unique strings
    #[serde(rename = "set")]
    Set,
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Set => write!(f, "set of strings"),
        }
    }
}

// -----------------------------------------------------------------------------
// Source enumeration

/// where a set of attributes comes from, the user declares a configuration
/// whereas a state has already been filled by the provider
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Source {
    Declared,
    State,
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, PartialEq, Eq, Clone, Debug)]
pub enum Error {
    #[error("failed to find attribute '{0}' in the schema")]
    Unknown(String),
    #[error("failed to accept attribute '{0}', expected a {1}")]
    Mismatch(String, Type),
    #[error("failed to find required attribute '{0}'")]
    Missing(String),
    #[error("failed to accept attribute '{0}', it is computed by the provider")]
    Computed(String),
}

// -----------------------------------------------------------------------------
// Attribute structure

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: Type,
    #[serde(rename = "required")]
    pub required: bool,
    #[serde(rename = "optional")]
    pub optional: bool,
    #[serde(rename = "computed")]
    pub computed: bool,
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "description")]
    pub description: String,
}

impl Attribute {
    fn new(kind: Type, description: &str) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn required(kind: Type, description: &str) -> Self {
        Self {
            required: true,
            ..Self::new(kind, description)
        }
    }

    pub fn optional(kind: Type, description: &str) -> Self {
        Self {
            optional: true,
            ..Self::new(kind, description)
        }
    }

    pub fn computed(kind: Type, description: &str) -> Self {
        Self {
            computed: true,
            ..Self::new(kind, description)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// returns if only the provider is allowed to set the attribute
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// returns the value normalized for the attribute's type, sets are sorted
    /// and deduplicated
    pub fn normalize(&self, field: &str, value: Value) -> Result<Value, Error> {
        match (self.kind, value) {
            (Type::String, value @ Value::String(_)) => Ok(value),
            (Type::Bool, value @ Value::Bool(_)) => Ok(value),
            (Type::Set, Value::Array(items)) => {
                let mut set = BTreeSet::new();
                for item in items {
                    match item {
                        Value::String(s) => {
                            set.insert(s);
                        }
                        _ => return Err(Error::Mismatch(field.to_string(), self.kind)),
                    }
                }

                Ok(Value::Array(set.into_iter().map(Value::String).collect()))
            }
            _ => Err(Error::Mismatch(field.to_string(), self.kind)),
        }
    }
}

// -----------------------------------------------------------------------------
// Schema structure

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Schema {
    #[serde(rename = "kind")]
    pub kind: Kind,
    #[serde(rename = "attributes")]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// returns the schema of an instance resource of the given kind, it is the
    /// set of attributes common to every kind extended by the attributes of
    /// each capability of the kind
    pub fn new(kind: Kind) -> Self {
        let mut attributes = common();

        for capability in kind.capabilities() {
            attributes.extend(gated(*capability));
        }

        Self {
            kind,
            attributes: attributes
                .into_iter()
                .map(|(field, attribute)| (field.to_string(), attribute))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Attribute> {
        self.attributes.get(field)
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    /// returns the normalized value if the field belongs to the schema and
    /// the value has the expected type
    pub fn check(&self, field: &str, value: Value) -> Result<Value, Error> {
        self.get(field)
            .ok_or_else(|| Error::Unknown(field.to_string()))?
            .normalize(field, value)
    }

    /// checks a whole set of attributes and reports every problem found
    pub fn validate(
        &self,
        attributes: &BTreeMap<String, Value>,
        source: Source,
    ) -> Result<(), Errors<Error>> {
        let known = attributes.iter().map(|(field, value)| {
            let attribute = self
                .get(field)
                .ok_or_else(|| Error::Unknown(field.to_owned()))?;

            if source == Source::Declared && attribute.is_read_only() {
                return Err(Error::Computed(field.to_owned()));
            }

            attribute.normalize(field, value.to_owned()).map(|_| ())
        });

        let required = self
            .attributes
            .iter()
            .filter(|(_, attribute)| attribute.required)
            .map(|(field, _)| {
                if attributes.contains_key(field) {
                    Ok(())
                } else {
                    Err(Error::Missing(field.to_owned()))
                }
            });

        combine(known.chain(required))
    }

    /// normalizes known attributes and fills absent ones having a default
    pub fn apply_defaults(&self, attributes: &mut BTreeMap<String, Value>) {
        for (field, attribute) in &self.attributes {
            if let Some(value) = attributes.remove(field) {
                let value = attribute
                    .normalize(field, value.to_owned())
                    .unwrap_or(value);

                attributes.insert(field.to_owned(), value);
            } else if let Some(default) = &attribute.default {
                attributes.insert(field.to_owned(), default.to_owned());
            }
        }
    }
}

// -----------------------------------------------------------------------------
// helpers

fn common() -> Vec<(&'static str, Attribute)> {
    vec![
        (NAME, Attribute::required(Type::String, "Name of the instance")),
        (
            PLAN,
            Attribute::required(Type::String, "Name of the plan, see the pricing table"),
        ),
        (CLOUD, Attribute::required(Type::String, "Name of the cloud")),
        (
            REGION,
            Attribute::required(Type::String, "Name of the cloud region, see the pricing table"),
        ),
        (
            ENABLED,
            Attribute::optional(
                Type::Bool,
                "Whether the instance is up, set to false to disable it",
            )
            .with_default(Value::Bool(true)),
        ),
        (
            WHITELIST,
            Attribute::optional(Type::Set, "Set of whitelisted ip addresses"),
        ),
        (
            PASSWORD,
            Attribute::optional(
                Type::String,
                "Password provided by the user or generated by scalechamp",
            )
            .with_computed(),
        ),
        (
            MASTER_HOST,
            Attribute::computed(Type::String, "Hostname of the master node"),
        ),
        (
            REPLICA_HOST,
            Attribute::computed(Type::String, "Hostname of the replica node"),
        ),
    ]
}

fn gated(capability: Capability) -> Vec<(&'static str, Attribute)> {
    match capability {
        Capability::Eviction => vec![(
            EVICTION_POLICY,
            Attribute::optional(Type::String, "Eviction policy of the engine"),
        )],
        Capability::License => vec![(
            LICENSE_KEY,
            Attribute::required(Type::String, "License key of the engine"),
        )],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const COMMON: [&str; 9] = [
        NAME,
        PLAN,
        CLOUD,
        REGION,
        ENABLED,
        WHITELIST,
        PASSWORD,
        MASTER_HOST,
        REPLICA_HOST,
    ];

    fn attributes(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn every_kind_has_the_common_attributes() {
        for kind in Kind::ALL {
            let schema = Schema::new(kind);

            for field in COMMON {
                assert!(schema.contains(field), "{} misses '{}'", kind, field);
            }
        }
    }

    #[test]
    fn license_key_is_required_only_for_premium_kind() {
        for kind in Kind::ALL {
            let schema = Schema::new(kind);
            let license = schema.get(LICENSE_KEY);

            if kind == Kind::KeyDbPro {
                assert!(license.map(|a| a.required).unwrap_or(false));
            } else {
                assert!(license.is_none(), "{} exposes a license key", kind);
            }
        }
    }

    #[test]
    fn eviction_policy_is_exposed_only_for_evicting_kinds() {
        for kind in Kind::ALL {
            let schema = Schema::new(kind);
            let eviction = schema.get(EVICTION_POLICY);

            match kind {
                Kind::Redis | Kind::KeyDb | Kind::KeyDbPro => {
                    let eviction = eviction.unwrap();
                    assert!(eviction.optional && !eviction.computed);
                }
                Kind::Ssdb => assert!(eviction.is_none()),
            }
        }
    }

    #[test]
    fn schema_is_deterministic() {
        assert_eq!(Schema::new(Kind::KeyDbPro), Schema::new(Kind::KeyDbPro));
    }

    #[test]
    fn sets_are_sorted_and_deduplicated() {
        let schema = Schema::new(Kind::Redis);

        assert_eq!(
            schema
                .check(WHITELIST, json!(["10.0.0.2", "10.0.0.1", "10.0.0.2"]))
                .unwrap(),
            json!(["10.0.0.1", "10.0.0.2"])
        );
        assert_eq!(
            schema.check(WHITELIST, json!(["10.0.0.1", 42])),
            Err(Error::Mismatch(WHITELIST.to_string(), Type::Set))
        );
    }

    #[test]
    fn validate_reports_every_problem() {
        let schema = Schema::new(Kind::KeyDbPro);
        let errors = schema
            .validate(
                &attributes(json!({
                    "name": "cache",
                    "enabled": "yes",
                    "master_host": "somewhere",
                    "colour": "blue",
                })),
                Source::Declared,
            )
            .unwrap_err();

        let errors = errors.iter().cloned().collect::<Vec<_>>();
        assert!(errors.contains(&Error::Mismatch(ENABLED.to_string(), Type::Bool)));
        assert!(errors.contains(&Error::Computed(MASTER_HOST.to_string())));
        assert!(errors.contains(&Error::Unknown("colour".to_string())));
        assert!(errors.contains(&Error::Missing(PLAN.to_string())));
        assert!(errors.contains(&Error::Missing(LICENSE_KEY.to_string())));
        assert!(!errors.contains(&Error::Missing(NAME.to_string())));
    }

    #[test]
    fn state_may_carry_computed_attributes() {
        let schema = Schema::new(Kind::Redis);
        let state = attributes(json!({
            "name": "cache",
            "plan": "hobby-100",
            "cloud": "do",
            "region": "fra1",
            "password": "pa55",
            "master_host": "master.scalechamp.net",
        }));

        assert!(schema.validate(&state, Source::State).is_ok());
        assert!(schema.validate(&state, Source::Declared).is_err());
    }

    #[test]
    fn defaults_fill_absent_attributes_only() {
        let schema = Schema::new(Kind::Redis);

        let mut absent = attributes(json!({"name": "cache"}));
        schema.apply_defaults(&mut absent);
        assert_eq!(absent.get(ENABLED), Some(&json!(true)));
        assert!(!absent.contains_key(WHITELIST));

        let mut present = attributes(json!({"enabled": false}));
        schema.apply_defaults(&mut present);
        assert_eq!(present.get(ENABLED), Some(&json!(false)));
    }
}
