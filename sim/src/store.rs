//! Entity store: liveness-checked access to the ECS world.
//!
//! Entities are generation-checked [`Entity`] handles, so a handle that
//! outlived its entity is reported as [`StoreError::NotFound`] instead of
//! aliasing whatever reused the slot.
//!
//! Structural changes made by systems go through `Commands` and are applied at
//! the schedule's `apply_deferred` barrier. Callers outside the schedule can
//! flush pending world commands with [`EntityStore::flush`].

use crate::components::DynamicBuffer;
use bevy_ecs::prelude::*;
use bevy_ecs::query::QueryFilter;
use std::any::type_name;
use thiserror::Error;

/// Errors raised by store accessors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity {0:?} is not alive")]
    NotFound(Entity),
    #[error("entity {entity:?} has no {component} component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
}

/// Owns all component and buffer storage.
pub struct EntityStore {
    world: World,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    /// Create an entity with no components.
    pub fn create(&mut self) -> Entity {
        self.world.spawn_empty().id()
    }

    /// Create an entity from a bundle.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.world.spawn(bundle).id()
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.entities().contains(entity)
    }

    fn ensure_alive(&self, entity: Entity) -> Result<(), StoreError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(StoreError::NotFound(entity))
        }
    }

    /// Attach a component, replacing any existing value of the same kind.
    pub fn attach<C: Component>(&mut self, entity: Entity, component: C) -> Result<(), StoreError> {
        self.ensure_alive(entity)?;
        self.world.entity_mut(entity).insert(component);
        Ok(())
    }

    /// Attach an empty buffer of `T` elements (replaces an existing one).
    pub fn attach_buffer<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.attach(entity, DynamicBuffer::<T>::default())
    }

    pub fn get<C: Component>(&self, entity: Entity) -> Result<&C, StoreError> {
        self.ensure_alive(entity)?;
        self.world.get::<C>(entity).ok_or(StoreError::MissingComponent {
            entity,
            component: type_name::<C>(),
        })
    }

    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Result<Mut<'_, C>, StoreError> {
        self.ensure_alive(entity)?;
        self.world.get_mut::<C>(entity).ok_or(StoreError::MissingComponent {
            entity,
            component: type_name::<C>(),
        })
    }

    /// Read an entity's buffer of `T` elements.
    pub fn buffer<T: Send + Sync + 'static>(&self, entity: Entity) -> Result<&[T], StoreError> {
        self.get::<DynamicBuffer<T>>(entity).map(|b| b.as_slice())
    }

    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity) && self.world.get::<C>(entity).is_some()
    }

    /// Destroy an entity and all of its components.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), StoreError> {
        if self.world.despawn(entity) {
            Ok(())
        } else {
            Err(StoreError::NotFound(entity))
        }
    }

    /// Snapshot of every entity matching a component-set filter, e.g.
    /// `store.matching::<(With<SquadMember>, With<Transform>)>()`.
    ///
    /// The returned list is detached from storage and stays valid to iterate
    /// while the store is mutated; individual handles may go stale.
    pub fn matching<F: QueryFilter>(&mut self) -> Vec<Entity> {
        let mut query = self.world.query_filtered::<Entity, F>();
        query.iter(&self.world).collect()
    }

    /// Total live entities.
    pub fn entity_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    pub fn insert_resource<R: Resource>(&mut self, resource: R) {
        self.world.insert_resource(resource);
    }

    pub fn resource<R: Resource>(&self) -> Option<&R> {
        self.world.get_resource::<R>()
    }

    /// Apply structural changes queued on the world's command queue.
    pub fn flush(&mut self) {
        self.world.flush();
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for running schedules).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
