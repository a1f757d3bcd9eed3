use crate::record::Record;

pub mod entrez;

/// Where bibliographic records come from. A search yields identifiers,
/// newest first; a fetch resolves identifiers into full records. The
/// orchestrator only ever talks to this trait, so tests can stand in an
/// in-memory source.
pub trait RecordSource {
    fn search(&self, query: &str, retmax: usize) -> anyhow::Result<Vec<String>>;
    fn fetch(&self, ids: &[String]) -> anyhow::Result<Vec<Record>>;
}
