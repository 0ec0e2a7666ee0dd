pub mod brain_graph;
pub mod brains;
pub mod chat_sessions;
pub mod models;
pub mod sources;
