//! Store notifications consumed by caches and views.

use super::EntityType;
use crate::current_timestamp;
use uuid::Uuid;

/// Shared event metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    /// Unique identifier for this event.
    pub event_id: String,
    /// Event source component.
    pub source: &'static str,
    /// Timestamp (Unix epoch seconds).
    pub timestamp: u64,
}

impl EventMeta {
    /// Creates new event metadata using the current timestamp.
    #[must_use]
    pub fn new(source: &'static str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            source,
            timestamp: current_timestamp(),
        }
    }
}

/// Events raised when dossier data changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record was created.
    New {
        /// Event metadata.
        meta: EventMeta,
        /// Entity type of the record.
        entity: EntityType,
        /// Natural key of the record.
        key: String,
    },
    /// A record was modified in place.
    Updated {
        /// Event metadata.
        meta: EventMeta,
        /// Entity type of the record.
        entity: EntityType,
        /// Natural key of the record.
        key: String,
    },
    /// A record was removed.
    Deleted {
        /// Event metadata.
        meta: EventMeta,
        /// Entity type of the record.
        entity: EntityType,
        /// Natural key of the record.
        key: String,
    },
    /// The whole dataset of an entity type must be reloaded.
    ReloadDataset {
        /// Event metadata.
        meta: EventMeta,
        /// Entity type to reload.
        entity: EntityType,
    },
}

impl StoreEvent {
    /// Creates a `New` event.
    #[must_use]
    pub fn new_record(source: &'static str, entity: EntityType, key: impl Into<String>) -> Self {
        Self::New {
            meta: EventMeta::new(source),
            entity,
            key: key.into(),
        }
    }

    /// Creates a `Deleted` event.
    #[must_use]
    pub fn deleted(source: &'static str, entity: EntityType, key: impl Into<String>) -> Self {
        Self::Deleted {
            meta: EventMeta::new(source),
            entity,
            key: key.into(),
        }
    }

    /// Creates a `ReloadDataset` event.
    #[must_use]
    pub fn reload(source: &'static str, entity: EntityType) -> Self {
        Self::ReloadDataset {
            meta: EventMeta::new(source),
            entity,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::New { .. } => "new",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::ReloadDataset { .. } => "reload_dataset",
        }
    }

    /// Returns the entity type the event concerns.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        match self {
            Self::New { entity, .. }
            | Self::Updated { entity, .. }
            | Self::Deleted { entity, .. }
            | Self::ReloadDataset { entity, .. } => *entity,
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn meta(&self) -> &EventMeta {
        match self {
            Self::New { meta, .. }
            | Self::Updated { meta, .. }
            | Self::Deleted { meta, .. }
            | Self::ReloadDataset { meta, .. } => meta,
        }
    }
}
