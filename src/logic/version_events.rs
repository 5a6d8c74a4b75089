use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use parking_lot::Mutex;

use crate::model::{DesignEvent, DesignId, Version, VersionId};
use crate::store::VersionStore;

pub type VersionEvents = Arc<HashMap<DesignId, DesignEvent>>;

/// Per-request cache of what each version did to its designs.
///
/// The first lookup for a version loads all of its actions in one query;
/// later lookups for any design of that version are answered from memory.
pub struct VersionEventCache<S: ?Sized> {
    store: Arc<S>,
    by_version: Mutex<HashMap<VersionId, VersionEvents>>,
}

impl<S> VersionEventCache<S>
where
    S: VersionStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            by_version: Mutex::new(HashMap::new()),
        }
    }

    /// Events recorded by `version`, keyed by design id
    pub async fn events_for(&self, version: &Version) -> Result<VersionEvents> {
        let cached = self.by_version.lock().get(&version.id).cloned();
        if let Some(events) = cached {
            return Ok(events);
        }

        let actions = self.store.actions_for_version(version.id).await?;
        debug!(
            "Loaded {} actions for version {}",
            actions.len(),
            version.id
        );
        let events: VersionEvents = Arc::new(
            actions
                .into_iter()
                .map(|a| (a.design_id, a.event))
                .collect(),
        );

        Ok(self
            .by_version
            .lock()
            .entry(version.id)
            .or_insert(events)
            .clone())
    }

    /// What `version` did to the design, or `None` if it left it untouched
    pub async fn event_for(
        &self,
        design_id: DesignId,
        version: &Version,
    ) -> Result<Option<DesignEvent>> {
        Ok(self.events_for(version).await?.get(&design_id).copied())
    }

    pub fn cached_versions(&self) -> usize {
        self.by_version.lock().len()
    }
}
