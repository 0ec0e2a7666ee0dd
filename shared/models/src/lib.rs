//! Shared data models for MindGraph services.
//!
//! One canonical type per concept; stores convert to and from their wire
//! formats at their own boundary.

pub mod graph;
pub mod requests;
pub mod sources;

pub use graph::{
    dedup_edges, dedup_nodes, DescriptionRecord, GraphEdge, GraphNode, GraphProjection,
    NodeRef, OriginalSentence, SchemaNode, SchemaRelationship, SchemaResult, SearchHit,
    VectorPayload, VectorPointRecord,
};
pub use requests::{
    AnswerRequest, AnswerResponse, ProcessTextRequest, ProcessTextResponse, ReferencedNode,
    SourceRef,
};
pub use sources::SourceKind;
