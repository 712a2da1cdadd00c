use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::storage::GraphStore;
use crate::types::{
    format_epoch_date, parse_observations, Entity, EntityRecord, Relation, Result,
};

/// Loads full entities and their mutual relations for an ordered id list.
pub struct ResultHydrator {
    store: Arc<dyn GraphStore>,
}

impl ResultHydrator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Entities come back in the order of `ids`. Ids the store no longer
    /// has (or that were invalidated) are skipped.
    pub async fn hydrate(&self, ids: &[String]) -> Result<(Vec<Entity>, Vec<Relation>)> {
        if ids.is_empty() {
            return Ok((vec![], vec![]));
        }

        let (records, relations) = self.store.hydrate(ids).await?;

        let mut by_name: HashMap<String, EntityRecord> = records
            .into_iter()
            .filter(EntityRecord::is_visible)
            .map(|r| (r.name.clone(), r))
            .collect();

        let entities: Vec<Entity> = ids
            .iter()
            .filter_map(|id| by_name.remove(id))
            .map(into_entity)
            .collect();

        let hydrated: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let mut seen = HashSet::new();
        let relations: Vec<Relation> = relations
            .into_iter()
            .filter(|r| hydrated.contains(r.from.as_str()) && hydrated.contains(r.to.as_str()))
            .filter(|r| seen.insert(r.clone()))
            .collect();

        if entities.len() < ids.len() {
            tracing::debug!(
                requested = ids.len(),
                hydrated = entities.len(),
                "Some candidates were not hydrated"
            );
        }

        Ok((entities, relations))
    }
}

fn into_entity(record: EntityRecord) -> Entity {
    let observations = match record.observations.as_deref() {
        None => vec![],
        Some(raw) => parse_observations(raw).unwrap_or_else(|e| {
            tracing::warn!(
                entity = %record.name,
                error = %e,
                "Failed to parse stored observations, returning none"
            );
            vec![]
        }),
    };

    Entity {
        created_date: format_epoch_date(record.created_at),
        updated_date: format_epoch_date(record.updated_at),
        name: record.name,
        entity_type: record.entity_type,
        observations,
        id: record.id,
        version: record.version,
        created_at: record.created_at,
        updated_at: record.updated_at,
        valid_from: record.valid_from,
        valid_to: record.valid_to,
    }
}
