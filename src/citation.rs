use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::RecordError;
use crate::record::{Author, Record};

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Author counts at or above this render as "First Author et al."
const ET_AL_THRESHOLD: usize = 3;

/// A record normalized into its render-ready form. Fully derived from one
/// [`Record`] at construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub author_display: String,
    pub title: String,
    pub journal_issue: String,
    pub year: String,
    pub link: String,
    /// Only surfaced in verbose rendering; never persisted.
    pub abstract_text: String,
}

impl Citation {
    /// Normalize one record. Fails when the record lacks the shape the
    /// citation format cannot do without: a PMID, a title, and an author
    /// list (the list itself may be empty).
    pub fn parse(record: &Record) -> Result<Citation, RecordError> {
        let pmid = record
            .pmid
            .as_deref()
            .ok_or_else(|| RecordError::malformed(None, "PMID"))?;
        let title = record
            .title
            .as_deref()
            .ok_or_else(|| RecordError::malformed(Some(pmid), "ArticleTitle"))?;
        let authors = record
            .authors
            .as_deref()
            .ok_or_else(|| RecordError::malformed(Some(pmid), "AuthorList"))?;

        Ok(Citation {
            author_display: author_display(authors),
            title: title.to_string(),
            journal_issue: journal_issue(record),
            year: year(record),
            link: doi_link(record),
            abstract_text: record.abstract_text.clone().unwrap_or_default(),
        })
    }

    /// One persisted citation-store block, blank-line terminated.
    pub fn to_block(&self) -> String {
        format!(
            "- author: {}\n  title: '{} {}.'\n  alt_link: '{}'\n  year: {}\n\n",
            self.author_display, self.title, self.journal_issue, self.link, self.year
        )
    }

    /// The long print-only form, including the abstract.
    pub fn to_verbose(&self) -> String {
        format!(
            "author: {}\nyear: {}\ntitle: '{} \n{}.'\nabstract: '{}'\nDOI_link: '{}'\n",
            self.author_display,
            self.year,
            self.title,
            self.journal_issue,
            self.abstract_text,
            self.link
        )
    }

    /// Operator-visibility trace: who, what, where.
    pub fn trace_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.author_display, self.title, self.link, self.journal_issue
        )
    }
}

/// Below the threshold every co-author is credited; from the threshold up
/// only the first author is, to keep consortium papers short.
fn author_display(authors: &[Author]) -> String {
    if authors.len() < ET_AL_THRESHOLD {
        let joined = authors.iter().map(format_name).collect::<Vec<_>>().join(", ");
        format!("{joined}.")
    } else {
        format!("{} et al.", format_name(&authors[0]))
    }
}

fn format_name(author: &Author) -> String {
    match &author.fore {
        Some(fore) => format!("{}, {}", author.last, fore),
        None => author.last.clone(),
    }
}

/// Publication year: the article's own earliest explicit date wins, then
/// the journal issue's, then nothing. Never an error.
fn year(record: &Record) -> String {
    record
        .article_date_years
        .first()
        .cloned()
        .or_else(|| record.issue.as_ref().and_then(|i| i.pub_year.clone()))
        .unwrap_or_default()
}

/// Journal line built up additively: abbreviation, then volume when the
/// issue block carries one, then issue number and pages only when both are
/// present. Missing tiers are omitted, not placeholdered.
fn journal_issue(record: &Record) -> String {
    let abbrev = record
        .journal_abbrev
        .clone()
        .or_else(|| record.journal_title.clone())
        .unwrap_or_default();

    let mut parts = vec![abbrev];
    if let Some(issue) = &record.issue {
        if let Some(volume) = &issue.volume {
            parts.push(volume.clone());
        }
        if let (Some(number), Some(pages)) = (&issue.number, &record.pages) {
            parts.push(number.clone());
            parts.push(pages.clone());
        }
    }
    parts.join(", ")
}

fn doi_link(record: &Record) -> String {
    match record.elocation_ids.first() {
        Some(id) => format!(
            "https://doi.org/{}",
            utf8_percent_encode(id, PATH_SEGMENT_ENCODE_SET)
        ),
        None => String::new(),
    }
}
