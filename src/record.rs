use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::RecordError;

/// One bibliographic record as fetched from PubMed, lifted into a typed
/// shape. Every field the source may omit is an `Option` (or an empty
/// `Vec`), so downstream rendering decides each missing-field branch
/// explicitly instead of probing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub pmid: Option<String>,
    pub title: Option<String>,
    /// `None` when the record has no AuthorList element at all;
    /// `Some(vec![])` when the list exists but is empty.
    pub authors: Option<Vec<Author>>,
    pub journal_abbrev: Option<String>,
    pub journal_title: Option<String>,
    pub issue: Option<JournalIssue>,
    /// Year of each ArticleDate element, in document order.
    pub article_date_years: Vec<String>,
    pub pages: Option<String>,
    /// ELocationID values, in document order.
    pub elocation_ids: Vec<String>,
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub last: String,
    pub fore: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalIssue {
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pub_year: Option<String>,
}

/// Deserialize an efetch PubmedArticleSet body into records.
///
/// Only stream-level XML breakage is an error here; records missing
/// required fields come back as-is and fail later, at citation parsing,
/// so one bad record is attributable without losing the batch.
pub fn parse_article_set(xml: &str) -> Result<Vec<Record>, RecordError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut rec: Option<Record> = None;

    // Element path from the document root to the current position. Scopes
    // text capture: <Year> means different things under PubDate, ArticleDate
    // and DateCompleted, and <PMID> reappears under CommentsCorrections.
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    let mut cur_last = String::new();
    let mut cur_fore = String::new();
    let mut abstract_parts: Vec<String> = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "PubmedArticle" => {
                        rec = Some(Record::default());
                        abstract_parts.clear();
                    }
                    "AuthorList" => {
                        if let Some(r) = rec.as_mut() {
                            r.authors.get_or_insert_with(Vec::new);
                        }
                    }
                    "Author" => {
                        cur_last.clear();
                        cur_fore.clear();
                    }
                    "JournalIssue" => {
                        if let Some(r) = rec.as_mut()
                            && ends_with(&path, &["Article", "Journal"])
                        {
                            r.issue.get_or_insert_with(JournalIssue::default);
                        }
                    }
                    _ => {}
                }
                // Markup children of a text field (e.g. <i> inside
                // ArticleTitle) must not reset the accumulated text.
                if !inside_rich_text(&path) {
                    text.clear();
                }
                path.push(name);
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                if inside_rich_text(&path) {
                    // Closing a markup child of a text field; keep
                    // accumulating.
                } else if let Some(r) = rec.as_mut() {
                    let captured = std::mem::take(&mut text).trim().to_string();
                    match name.as_str() {
                        "PubmedArticle" => {
                            if !abstract_parts.is_empty() {
                                r.abstract_text = Some(abstract_parts.join(" "));
                            }
                            records.push(rec.take().unwrap_or_default());
                        }
                        "PMID" if ends_with(&path, &["MedlineCitation"]) => {
                            if r.pmid.is_none() && !captured.is_empty() {
                                r.pmid = Some(captured);
                            }
                        }
                        "ArticleTitle" if ends_with(&path, &["Article"]) => {
                            let t = normalize_ws(&captured);
                            if !t.is_empty() {
                                r.title = Some(t);
                            }
                        }
                        "AbstractText" if ends_with(&path, &["Abstract"]) => {
                            if !captured.is_empty() {
                                abstract_parts.push(normalize_ws(&captured));
                            }
                        }
                        "ISOAbbreviation" if ends_with(&path, &["Journal"]) => {
                            r.journal_abbrev = Some(captured);
                        }
                        "Title" if ends_with(&path, &["Journal"]) => {
                            r.journal_title = Some(captured);
                        }
                        "Volume" if ends_with(&path, &["Journal", "JournalIssue"]) => {
                            if let Some(issue) = r.issue.as_mut() {
                                issue.volume = Some(captured);
                            }
                        }
                        "Issue" if ends_with(&path, &["Journal", "JournalIssue"]) => {
                            if let Some(issue) = r.issue.as_mut() {
                                issue.number = Some(captured);
                            }
                        }
                        "Year" if ends_with(&path, &["JournalIssue", "PubDate"]) => {
                            if let Some(issue) = r.issue.as_mut() {
                                issue.pub_year = Some(captured);
                            }
                        }
                        "Year" if ends_with(&path, &["Article", "ArticleDate"]) => {
                            r.article_date_years.push(captured);
                        }
                        "MedlinePgn" if ends_with(&path, &["Pagination"]) => {
                            if !captured.is_empty() {
                                r.pages = Some(captured);
                            }
                        }
                        "ELocationID" if ends_with(&path, &["Article"]) => {
                            if !captured.is_empty() {
                                r.elocation_ids.push(captured);
                            }
                        }
                        "LastName" if ends_with(&path, &["AuthorList", "Author"]) => {
                            cur_last = captured;
                        }
                        "ForeName" if ends_with(&path, &["AuthorList", "Author"]) => {
                            cur_fore = captured;
                        }
                        // Consortium entries carry their name here instead
                        // of LastName/ForeName.
                        "CollectiveName" if ends_with(&path, &["AuthorList", "Author"]) => {
                            cur_last = normalize_ws(&captured);
                        }
                        "Author" if ends_with(&path, &["AuthorList"]) => {
                            if !cur_last.is_empty()
                                && let Some(authors) = r.authors.as_mut()
                            {
                                authors.push(Author {
                                    last: std::mem::take(&mut cur_last),
                                    fore: if cur_fore.is_empty() {
                                        None
                                    } else {
                                        Some(std::mem::take(&mut cur_fore))
                                    },
                                });
                            }
                            cur_last.clear();
                            cur_fore.clear();
                        }
                        _ => {}
                    }
                }
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"AuthorList"
                    && let Some(r) = rec.as_mut()
                {
                    r.authors.get_or_insert_with(Vec::new);
                }
            }
            Event::Text(t) => {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&t.decode().unwrap_or_default());
            }
            Event::CData(t) => {
                text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

/// True while positioned inside a field whose markup children contribute
/// to one accumulated text value.
fn inside_rich_text(path: &[String]) -> bool {
    path.iter()
        .any(|n| n == "ArticleTitle" || n == "AbstractText")
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
