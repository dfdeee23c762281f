//! Deployment environments and graph-wide settings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PSEUDO_ACCOUNT: &str = "${AWS::AccountId}";
pub const PSEUDO_REGION: &str = "${AWS::Region}";

/// Account and region a deployment group targets. `None` means the group is
/// environment-agnostic in that dimension and only learns the value at
/// deployment time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Environment {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    pub fn agnostic() -> Self {
        Environment::default()
    }

    /// Fill unset dimensions from `fallback`.
    pub fn or(&self, fallback: &Environment) -> Environment {
        Environment {
            account: self.account.clone().or_else(|| fallback.account.clone()),
            region: self.region.clone().or_else(|| fallback.region.clone()),
        }
    }

    pub fn account_or_pseudo(&self) -> &str {
        self.account.as_deref().unwrap_or(PSEUDO_ACCOUNT)
    }

    pub fn region_or_pseudo(&self) -> &str {
        self.region.as_deref().unwrap_or(PSEUDO_REGION)
    }
}

/// Graph-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphSettings {
    /// ARN partition, `aws` unless targeting another partition.
    pub partition: String,
    pub default_account: Option<String>,
    pub default_region: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettings {
            partition: "aws".to_string(),
            default_account: None,
            default_region: None,
        }
    }
}

impl GraphSettings {
    pub fn default_environment(&self) -> Environment {
        Environment {
            account: self.default_account.clone(),
            region: self.default_region.clone(),
        }
    }
}
