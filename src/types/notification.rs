//! Bucket event notification types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::BindingError;

/// Object events a bucket can notify about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum EventType {
    #[strum(serialize = "s3:ObjectCreated:*")]
    ObjectCreated,
    #[strum(serialize = "s3:ObjectCreated:Put")]
    ObjectCreatedPut,
    #[strum(serialize = "s3:ObjectCreated:Post")]
    ObjectCreatedPost,
    #[strum(serialize = "s3:ObjectCreated:Copy")]
    ObjectCreatedCopy,
    #[strum(serialize = "s3:ObjectCreated:CompleteMultipartUpload")]
    ObjectCreatedCompleteMultipartUpload,
    #[strum(serialize = "s3:ObjectRemoved:*")]
    ObjectRemoved,
    #[strum(serialize = "s3:ObjectRemoved:Delete")]
    ObjectRemovedDelete,
    #[strum(serialize = "s3:ObjectRemoved:DeleteMarkerCreated")]
    ObjectRemovedDeleteMarkerCreated,
    #[strum(serialize = "s3:ObjectRestore:Post")]
    ObjectRestorePost,
    #[strum(serialize = "s3:ObjectRestore:Completed")]
    ObjectRestoreCompleted,
    #[strum(serialize = "s3:ReducedRedundancyLostObject")]
    ReducedRedundancyLostObject,
    #[strum(serialize = "s3:Replication:OperationFailedReplication")]
    ReplicationOperationFailedReplication,
    #[strum(serialize = "s3:LifecycleExpiration:*")]
    LifecycleExpiration,
    #[strum(serialize = "s3:LifecycleTransition")]
    LifecycleTransition,
    #[strum(serialize = "s3:ObjectTagging:*")]
    ObjectTagging,
    #[strum(serialize = "s3:ObjectAcl:Put")]
    ObjectAclPut,
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(self.as_ref())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a bucket notification is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
pub enum DestinationKind {
    Queue,
    Function,
    Topic,
}

/// Restricts a notification to object keys with the given prefix and/or suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NotificationKeyFilter {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl NotificationKeyFilter {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        NotificationKeyFilter {
            prefix: Some(prefix.into()),
            suffix: None,
        }
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        NotificationKeyFilter {
            prefix: None,
            suffix: Some(suffix.into()),
        }
    }
}

/// A single `{Name, Value}` rule of a rendered key filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FilterRule {
    #[serde(rename = "Name")]
    pub name: &'static str,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Flatten `filters` into key filter rules. Each filter must set a prefix or
/// a suffix, and at most one prefix and one suffix rule may result.
pub fn filter_rules(filters: &[NotificationKeyFilter]) -> Result<Vec<FilterRule>, BindingError> {
    let mut prefix: Option<&str> = None;
    let mut suffix: Option<&str> = None;

    for filter in filters {
        if filter.prefix.is_none() && filter.suffix.is_none() {
            return Err(BindingError::construction(
                "a notification key filter must specify a prefix and/or a suffix",
            ));
        }
        if let Some(p) = filter.prefix.as_deref() {
            if prefix.replace(p).is_some() {
                return Err(BindingError::construction(
                    "cannot specify more than one prefix rule in a notification filter",
                ));
            }
        }
        if let Some(s) = filter.suffix.as_deref() {
            if suffix.replace(s).is_some() {
                return Err(BindingError::construction(
                    "cannot specify more than one suffix rule in a notification filter",
                ));
            }
        }
    }

    let mut rules = Vec::new();
    if let Some(p) = prefix {
        rules.push(FilterRule {
            name: "prefix",
            value: p.to_string(),
        });
    }
    if let Some(s) = suffix {
        rules.push(FilterRule {
            name: "suffix",
            value: s.to_string(),
        });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_event_type_wire_names_round_trip() {
        for event in EventType::iter() {
            let wire = serde_json::to_value(event).unwrap();
            assert!(wire.as_str().unwrap().starts_with("s3:"));
            let back: EventType = serde_json::from_value(wire).unwrap();
            assert_eq!(back, event);
        }
        assert_eq!(
            EventType::from_str("s3:ObjectRemoved:*").unwrap(),
            EventType::ObjectRemoved
        );
    }

    #[test]
    fn test_filter_rules_prefix_and_suffix() {
        let rules = filter_rules(&[
            NotificationKeyFilter::prefix("images/"),
            NotificationKeyFilter::suffix(".png"),
        ])
        .unwrap();
        assert_eq!(
            serde_json::to_value(&rules).unwrap(),
            serde_json::json!([
                {"Name": "prefix", "Value": "images/"},
                {"Name": "suffix", "Value": ".png"}
            ])
        );
    }

    #[test]
    fn test_filter_rules_reject_empty_filter() {
        let err = filter_rules(&[NotificationKeyFilter::default()]).unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_filter_rules_reject_two_prefixes() {
        let err = filter_rules(&[
            NotificationKeyFilter::prefix("a/"),
            NotificationKeyFilter::prefix("b/"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_no_filters_no_rules() {
        assert!(filter_rules(&[]).unwrap().is_empty());
    }
}
