use std::collections::HashMap;

use crate::asset::{Handle, VisualResource};
use crate::scene::Entity;

/// Per-frame grouping of entities by the visual resource they share, so each
/// batch binds its textures and material once.
pub struct EntityBatcher<'a> {
    batches: HashMap<Handle<VisualResource>, Vec<&'a Entity>>,
}

impl<'a> EntityBatcher<'a> {
    pub fn new() -> Self {
        Self {
            batches: HashMap::new(),
        }
    }

    /// Append an entity to its resource's batch, creating the batch on first use.
    pub fn add(&mut self, entity: &'a Entity) {
        self.batches.entry(entity.resource).or_default().push(entity);
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Entities queued for `resource`, in insertion order. Empty when none.
    pub fn get(&self, resource: Handle<VisualResource>) -> &[&'a Entity] {
        self.batches
            .get(&resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Hand every batch over at once and leave the batcher empty.
    pub fn drain(&mut self) -> RenderBatches<'a> {
        RenderBatches {
            batches: std::mem::take(&mut self.batches),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl Default for EntityBatcher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Extend<&'a Entity> for EntityBatcher<'a> {
    fn extend<I: IntoIterator<Item = &'a Entity>>(&mut self, iter: I) {
        for entity in iter {
            self.add(entity);
        }
    }
}

/// Batches drained for one frame. Iteration order between batches is
/// unspecified; order within a batch is insertion order.
#[derive(Default)]
pub struct RenderBatches<'a> {
    batches: HashMap<Handle<VisualResource>, Vec<&'a Entity>>,
}

impl<'a> RenderBatches<'a> {
    pub fn iter(&self) -> impl Iterator<Item = (Handle<VisualResource>, &[&'a Entity])> + '_ {
        self.batches
            .iter()
            .map(|(handle, entities)| (*handle, entities.as_slice()))
    }

    pub fn get(&self, resource: Handle<VisualResource>) -> &[&'a Entity] {
        self.batches
            .get(&resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn entity(resource: usize, x: f32) -> Entity {
        Entity::new(Handle::new(resource), Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn groups_by_resource_in_insertion_order() {
        let a1 = entity(0, 1.0);
        let b1 = entity(1, 2.0);
        let a2 = entity(0, 3.0);

        let mut batcher = EntityBatcher::new();
        batcher.extend([&a1, &b1, &a2]);

        assert_eq!(batcher.batch_count(), 2);
        let batch = batcher.get(Handle::new(0));
        assert_eq!(batch.len(), 2);
        assert!(std::ptr::eq(batch[0], &a1));
        assert!(std::ptr::eq(batch[1], &a2));
        assert_eq!(batcher.get(Handle::new(1)).len(), 1);
    }

    #[test]
    fn unknown_resource_yields_empty_batch() {
        let batcher = EntityBatcher::new();
        assert!(batcher.get(Handle::new(42)).is_empty());
    }

    #[test]
    fn drain_moves_everything_out() {
        let a = entity(0, 0.0);
        let b = entity(3, 0.0);
        let mut batcher = EntityBatcher::new();
        batcher.add(&a);
        batcher.add(&b);

        let batches = batcher.drain();
        assert!(batcher.is_empty());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.entity_count(), 2);
        assert_eq!(batches.get(Handle::new(3)).len(), 1);
    }

    #[test]
    fn clear_forgets_batches() {
        let a = entity(0, 0.0);
        let mut batcher = EntityBatcher::new();
        batcher.add(&a);
        batcher.clear();
        assert!(batcher.is_empty());
        assert!(batcher.drain().is_empty());
    }
}
