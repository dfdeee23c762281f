use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::environment::Environment;
use super::ids::StackId;

/// An independently deployed group of resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    #[schema(value_type = usize)]
    id: StackId,
    name: String,
    env: Environment,
}

impl Stack {
    pub(crate) fn new(id: StackId, name: impl Into<String>, env: Environment) -> Self {
        Stack {
            id,
            name: name.into(),
            env,
        }
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

impl Display for Stack {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} ({}/{})",
            self.name,
            self.env.account_or_pseudo(),
            self.env.region_or_pseudo()
        )
    }
}
