pub mod accuracy;
pub mod answer;
pub mod ingestion;
pub mod recovery;
