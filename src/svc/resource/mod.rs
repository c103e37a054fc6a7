//! # Resource module
//!
//! This module provide the instance resource, its schema per kind, the data
//! handed over by the orchestrator and the lifecycle reconciler.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

pub mod data;
pub mod poll;
pub mod reconciler;
pub mod schema;

// -----------------------------------------------------------------------------
// Capability enumeration

/// optional features of an instance resource gated by its kind
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub enum Capability {
    /// the engine evicts keys and exposes an `eviction_policy`
    Eviction,
    /// the engine is licensed and requires a `license_key`
    License,
}

// -----------------------------------------------------------------------------
// Kind enumeration

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub enum Kind {
    #[serde(rename = "redis")]
    Redis,
    #[serde(rename = "keydb")]
    KeyDb,
    #[serde(rename = "keydb-pro")]
    KeyDbPro,
    #[serde(rename = "ssdb")]
    Ssdb,
}

impl Kind {
    pub const ALL: [Self; 4] = [Self::Redis, Self::KeyDb, Self::KeyDbPro, Self::Ssdb];

    /// returns the capabilities of the kind
    pub const fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Redis | Self::KeyDb => &[Capability::Eviction],
            Self::KeyDbPro => &[Capability::Eviction, Capability::License],
            Self::Ssdb => &[],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::KeyDb => write!(f, "keydb"),
            Self::KeyDbPro => write!(f, "keydb-pro"),
            Self::Ssdb => write!(f, "ssdb"),
        }
    }
}

impl FromStr for Kind {
    type Err = Box<dyn Error + Send + Sync>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "keydb" => Ok(Self::KeyDb),
            "keydb-pro" | "keydb_pro" => Ok(Self::KeyDbPro),
            "ssdb" => Ok(Self::Ssdb),
            _ => Err(format!(
                "failed to parse '{}', available options are 'redis', 'keydb', 'keydb-pro' or 'ssdb'",
                s
            )
            .into()),
        }
    }
}

// -----------------------------------------------------------------------------
// Errors structure

/// collection of errors reported together, none of them hides another
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Errors<E>(pub Vec<E>);

#[cfg(test)]
impl<E> Errors<E> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.0.iter()
    }
}

impl<E> Display for Errors<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let messages = self.0.iter().map(ToString::to_string).collect::<Vec<_>>();

        write!(f, "{}", messages.join("; "))
    }
}

impl<E> Error for Errors<E> where E: Error {}

/// evaluates every result and returns all encountered errors at once
pub fn combine<E, I>(results: I) -> Result<(), Errors<E>>
where
    I: IntoIterator<Item = Result<(), E>>,
{
    let errors = results
        .into_iter()
        .filter_map(Result::err)
        .collect::<Vec<_>>();

    if errors.is_empty() {
        return Ok(());
    }

    Err(Errors(errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_their_name() {
        for kind in Kind::ALL {
            assert_eq!(kind.to_string().parse::<Kind>().unwrap(), kind);
        }

        assert!("memcached".parse::<Kind>().is_err());
    }

    #[test]
    fn capabilities_follow_the_engine() {
        assert!(Kind::Redis.has(Capability::Eviction));
        assert!(Kind::KeyDb.has(Capability::Eviction));
        assert!(Kind::KeyDbPro.has(Capability::Eviction));
        assert!(Kind::KeyDbPro.has(Capability::License));
        assert!(!Kind::KeyDb.has(Capability::License));
        assert!(Kind::Ssdb.capabilities().is_empty());
    }

    #[test]
    fn combine_keeps_every_error() {
        assert_eq!(combine::<String, _>(vec![Ok(()), Ok(())]), Ok(()));

        let err = combine(vec![
            Err("first".to_string()),
            Ok(()),
            Err("second".to_string()),
        ])
        .unwrap_err();

        assert_eq!(err.len(), 2);
        assert_eq!(err.to_string(), "first; second");
    }
}
