use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;

use crate::binder::{Binder, SubscriberKey};
use crate::error::BindingError;
use crate::graph::Topology;
use crate::types::{BindingResult, ResourceRef};

#[derive(Debug, Clone)]
struct CacheEntry {
    binder: Binder,
    result: Rc<BindingResult>,
}

/// Binds each (subscriber, target) pair at most once. Repeat calls hand back
/// the stored result without calling `bind` again, so a subscriber's policy
/// only ever receives the statements of the first binding. Keys are arena
/// handles, so two resources with similar paths never share an entry.
#[derive(Debug, Clone, Default)]
pub struct BindingCache {
    entries: HashMap<(SubscriberKey, ResourceRef), CacheEntry>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached result for a key, if bound.
    pub fn get(
        &self,
        subscriber: &SubscriberKey,
        target: ResourceRef,
    ) -> Option<Rc<BindingResult>> {
        self.entries
            .get(&(subscriber.clone(), target))
            .map(|e| Rc::clone(&e.result))
    }

    pub(crate) fn get_or_bind(
        &mut self,
        topology: &mut Topology,
        binder: &Binder,
        target: ResourceRef,
    ) -> Result<Rc<BindingResult>, BindingError> {
        let subscriber = binder.identity(topology)?;
        let target_path = topology.resource(target)?.path().to_string();
        let key = (binder.key(), target);

        if let Some(entry) = self.entries.get(&key) {
            if entry.binder != *binder {
                return Err(BindingError::construction(format!(
                    "'{subscriber}' is already bound to '{target_path}' with a different configuration"
                )));
            }
            info!(
                event = "Bind",
                phase = "Cached",
                subscriber = subscriber,
                target = target_path
            );
            return Ok(Rc::clone(&entry.result));
        }

        let result = Rc::new(binder.bind(topology, target)?);
        self.entries.insert(
            key,
            CacheEntry {
                binder: binder.clone(),
                result: Rc::clone(&result),
            },
        );
        Ok(result)
    }
}
