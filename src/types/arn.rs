//! Resource names in `arn:partition:service:region:account:resource` form.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BindingError;

use super::environment::Environment;
use super::resource_kind::ResourceKind;

static ACCOUNT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account: String,
    resource: String,
}

impl Arn {
    /// Build the ARN of a resource of `kind` called `name` living in `env`.
    /// Unknown environment dimensions render as pseudo references.
    pub fn for_resource(partition: &str, kind: ResourceKind, name: &str, env: &Environment) -> Self {
        let (region, account) = if kind.is_global() {
            (String::new(), String::new())
        } else {
            (
                env.region_or_pseudo().to_string(),
                env.account_or_pseudo().to_string(),
            )
        };
        Arn {
            partition: partition.to_string(),
            service: kind.service().to_string(),
            region,
            account,
            resource: kind.arn_resource(name),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn region(&self) -> Option<&str> {
        (!self.region.is_empty()).then_some(self.region.as_str())
    }

    pub fn account(&self) -> Option<&str> {
        (!self.account.is_empty()).then_some(self.account.as_str())
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The environment encoded in the ARN; empty fields are left unset.
    pub fn environment(&self) -> Environment {
        Environment {
            account: self.account().map(str::to_string),
            region: self.region().map(str::to_string),
        }
    }
}

impl Display for Arn {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = BindingError;

    /// Accepts:
    /// - arn:aws:sns:us-east-1:123456789012:my-topic
    /// - arn:aws:s3:::my-bucket
    /// - arn:aws:lambda:us-east-1:123456789012:function:my-fn (colons in the resource are kept)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(BindingError::InvalidFormat(format!(
                "Failed to parse ARN '{s}' (expected format: arn:partition:service:region:account:resource)"
            )));
        }
        if parts[1].is_empty() || parts[2].is_empty() || parts[5].is_empty() {
            return Err(BindingError::InvalidFormat(format!(
                "Failed to parse ARN '{s}': partition, service and resource must be non-empty"
            )));
        }
        if !parts[4].is_empty() && !ACCOUNT_ID.is_match(parts[4]) {
            return Err(BindingError::InvalidFormat(format!(
                "Failed to parse ARN '{s}': account '{}' is not a 12-digit account id",
                parts[4]
            )));
        }

        Ok(Arn {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }
}

impl Serialize for Arn {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Arn {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
