mod neo4j_client;

pub use neo4j_client::GraphStore;
