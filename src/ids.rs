//! Entity and schema identifiers.
//!
//! Node and edge ids are dense 64-bit values recycled on deletion by the
//! entity stores. Label and relation ids are dense small integers assigned
//! at registration and never recycled.

/// Node identifier, dense and recycled on deletion
pub type NodeId = u64;

/// Edge identifier, dense and recycled on deletion
pub type EdgeId = u64;

/// Label identifier, dense, never recycled
pub type LabelId = i32;

/// Relation identifier, dense, never recycled
pub type RelationId = i32;

/// Attribute identifier mapping to a globally interned attribute name
pub type AttributeId = u16;

/// Sentinel for a missing node or edge
pub const INVALID_ID: u64 = u64::MAX;

/// Wildcard relation: match edges of every relation type
pub const NO_RELATION: RelationId = -1;

/// A relation name that failed to resolve against the schema
pub const UNKNOWN_RELATION: RelationId = -2;

/// Sentinel for a missing attribute
pub const ATTRIBUTE_ID_NONE: AttributeId = AttributeId::MAX;
