use thiserror::Error;

/// Errors raised while turning fetched PubMed data into citations.
///
/// Missing state files are not represented here: an absent or unreadable
/// identifier set loads as empty, and an absent citation store means a
/// bootstrap run. Both are handled where they occur.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record is missing a field the citation format cannot do without.
    #[error("record {pmid}: missing {field}")]
    Malformed { pmid: String, field: &'static str },

    /// The efetch response body was not well-formed XML.
    #[error("malformed article set: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl RecordError {
    pub fn malformed(pmid: Option<&str>, field: &'static str) -> Self {
        RecordError::Malformed {
            pmid: pmid.unwrap_or("unknown").to_string(),
            field,
        }
    }
}
