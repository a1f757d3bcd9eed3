use anyhow::Context;
use indicatif::ProgressBar;
use owo_colors::OwoColorize;

use crate::citation::Citation;
use crate::source::RecordSource;
use crate::store::{CitationStore, DataPaths, SeenIds};

/// Result cap for an ordinary incremental run.
pub const DEFAULT_MAX: usize = 20;
/// Result cap for a first run, when no history bounds the result set.
pub const BOOTSTRAP_MAX: usize = 100;

pub struct RunOptions {
    /// Full search term, e.g. `Tran LM[Author]`.
    pub query: String,
    /// Explicit result cap; overrides both defaults.
    pub max: Option<usize>,
    /// Print full article information for every candidate. Read-only.
    pub verbose: bool,
    /// Stop after search + diff; fetch, parse and write nothing.
    pub no_write: bool,
}

/// One ingestion pass: search, diff against the identifier set, fetch the
/// delta, render, prepend to the store, persist the updated set.
pub fn run(
    source: &impl RecordSource,
    paths: &DataPaths,
    opts: &RunOptions,
) -> anyhow::Result<()> {
    let store = CitationStore::open(&paths.store)
        .with_context(|| format!("failed to open {}", paths.store.display()))?;

    let retmax = opts.max.unwrap_or(if store.is_empty() {
        BOOTSTRAP_MAX
    } else {
        DEFAULT_MAX
    });

    let candidates = source.search(&opts.query, retmax)?;
    if candidates.is_empty() {
        return Ok(());
    }

    if opts.verbose {
        print_all(source, &candidates)?;
    }

    let mut seen = SeenIds::load(&paths.seen_ids);
    let new_ids = seen.delta(&candidates);

    if opts.no_write {
        eprintln!("{} new paper(s) found; nothing written.", new_ids.len());
        return Ok(());
    }
    if new_ids.is_empty() {
        eprintln!("{}", "No new papers found.".yellow());
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("fetching {} record(s)", new_ids.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    let fetched = source.fetch(&new_ids);
    spinner.finish_and_clear();
    let records = fetched?;

    let mut block = String::new();
    let mut ingested: Vec<String> = Vec::new();
    let mut skipped = 0usize;
    for record in &records {
        match Citation::parse(record) {
            Ok(citation) => {
                eprintln!("{}", citation.trace_line());
                block.push_str(&citation.to_block());
                if let Some(pmid) = &record.pmid {
                    ingested.push(pmid.clone());
                }
            }
            // A bad record is dropped for this pass only: its id is not
            // admitted to the set, so it is retried on later runs.
            Err(e) => {
                skipped += 1;
                eprintln!("{} {e}", "skipping".red());
            }
        }
    }

    if ingested.is_empty() {
        eprintln!("{}", "No new papers added.".yellow());
        return Ok(());
    }

    // Store before identifier set: dying in between re-renders a visible
    // duplicate next run, the reverse order would lose records silently.
    store
        .prepend(&block)
        .context("failed to update the citation store")?;
    seen.admit(&ingested);
    seen.persist(&paths.seen_ids)
        .context("failed to persist the identifier set")?;

    eprintln!(
        "{}",
        format!("Added {} new papers.", ingested.len()).green()
    );
    if skipped > 0 {
        eprintln!(
            "{}",
            format!("Skipped {skipped} malformed record(s); they will be retried.").yellow()
        );
    }
    Ok(())
}

/// The verbose branch: fetch every candidate and print the long form.
/// Strictly read-only.
fn print_all(source: &impl RecordSource, ids: &[String]) -> anyhow::Result<()> {
    let records = source.fetch(ids)?;
    for record in &records {
        match Citation::parse(record) {
            Ok(citation) => {
                eprintln!("{}", citation.trace_line());
                println!("{}", citation.to_verbose());
            }
            Err(e) => eprintln!("{} {e}", "skipping".red()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Author, Record};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    /// In-memory stand-in for PubMed; records which calls were made.
    struct StubSource {
        upstream: Vec<Record>,
        searches: RefCell<Vec<usize>>,
        fetches: RefCell<Vec<Vec<String>>>,
    }

    impl StubSource {
        fn new(upstream: Vec<Record>) -> Self {
            StubSource {
                upstream,
                searches: RefCell::new(Vec::new()),
                fetches: RefCell::new(Vec::new()),
            }
        }
    }

    impl RecordSource for StubSource {
        fn search(&self, _query: &str, retmax: usize) -> anyhow::Result<Vec<String>> {
            self.searches.borrow_mut().push(retmax);
            Ok(self
                .upstream
                .iter()
                .filter_map(|r| r.pmid.clone())
                .take(retmax)
                .collect())
        }

        fn fetch(&self, ids: &[String]) -> anyhow::Result<Vec<Record>> {
            self.fetches.borrow_mut().push(ids.to_vec());
            Ok(self
                .upstream
                .iter()
                .filter(|r| r.pmid.as_ref().is_some_and(|p| ids.contains(p)))
                .cloned()
                .collect())
        }
    }

    fn record(pmid: &str, title: &str) -> Record {
        Record {
            pmid: Some(pmid.to_string()),
            title: Some(title.to_string()),
            authors: Some(vec![Author {
                last: "Doe".to_string(),
                fore: Some("Jane".to_string()),
            }]),
            journal_abbrev: Some("J Test".to_string()),
            ..Record::default()
        }
    }

    fn opts() -> RunOptions {
        RunOptions {
            query: "Doe J[Author]".to_string(),
            max: None,
            verbose: false,
            no_write: false,
        }
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn first_run_ingests_everything_newest_first() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(vec![record("1", "Newest"), record("2", "Older")]);

        run(&source, &paths, &opts()).unwrap();

        let store = read(&paths.store);
        let first = store.find("Newest").unwrap();
        let second = store.find("Older").unwrap();
        assert!(first < second);
        assert_eq!(read(&paths.seen_ids), "1,2");
        // No prior history: the bootstrap cap applies.
        assert_eq!(*source.searches.borrow(), vec![BOOTSTRAP_MAX]);
    }

    #[test]
    fn second_run_with_no_upstream_change_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(vec![record("1", "Newest"), record("2", "Older")]);

        run(&source, &paths, &opts()).unwrap();
        let store_after_first = read(&paths.store);
        let ids_after_first = read(&paths.seen_ids);

        run(&source, &paths, &opts()).unwrap();
        assert_eq!(read(&paths.store), store_after_first);
        assert_eq!(read(&paths.seen_ids), ids_after_first);
        // Everything was already seen, so nothing was fetched again.
        assert_eq!(source.fetches.borrow().len(), 1);
        // And history now bounds the search.
        assert_eq!(*source.searches.borrow(), vec![BOOTSTRAP_MAX, DEFAULT_MAX]);
    }

    #[test]
    fn incremental_run_fetches_only_the_delta() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());

        let source = StubSource::new(vec![record("2", "Older")]);
        run(&source, &paths, &opts()).unwrap();

        let source = StubSource::new(vec![record("1", "Newest"), record("2", "Older")]);
        run(&source, &paths, &opts()).unwrap();

        assert_eq!(*source.fetches.borrow(), vec![vec!["1".to_string()]]);
        let store = read(&paths.store);
        assert!(store.starts_with("- author: Doe, Jane.\n  title: 'Newest"));
        assert!(store.contains("Older"));
        assert_eq!(read(&paths.seen_ids), "1,2");
    }

    #[test]
    fn explicit_max_overrides_both_defaults() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(vec![record("1", "Only")]);

        let mut o = opts();
        o.max = Some(5);
        run(&source, &paths, &o).unwrap();
        assert_eq!(*source.searches.borrow(), vec![5]);
    }

    #[test]
    fn no_write_touches_nothing() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(vec![record("1", "Newest")]);

        let mut o = opts();
        o.no_write = true;
        run(&source, &paths, &o).unwrap();

        assert!(!paths.store.exists());
        assert!(!paths.seen_ids.exists());
        assert!(source.fetches.borrow().is_empty());
    }

    #[test]
    fn verbose_alone_still_does_not_mutate() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(vec![record("1", "Newest")]);

        let mut o = opts();
        o.verbose = true;
        o.no_write = true;
        run(&source, &paths, &o).unwrap();

        assert!(!paths.store.exists());
        assert!(!paths.seen_ids.exists());
        // The print pass fetches every candidate, not just the delta.
        assert_eq!(*source.fetches.borrow(), vec![vec!["1".to_string()]]);
    }

    #[test]
    fn verbose_with_ingest_fetches_all_then_only_the_delta() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        fs::write(dir.path().join("recent_pubmed_ids.txt"), "2").unwrap();
        let source = StubSource::new(vec![record("1", "Newest"), record("2", "Older")]);

        let mut o = opts();
        o.verbose = true;
        run(&source, &paths, &o).unwrap();

        assert_eq!(
            *source.fetches.borrow(),
            vec![
                vec!["1".to_string(), "2".to_string()],
                vec!["1".to_string()],
            ]
        );
        assert!(read(&paths.store).contains("Newest"));
        assert_eq!(read(&paths.seen_ids), "1,2");
    }

    #[test]
    fn malformed_record_is_skipped_and_left_unseen() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut bad = record("1", "ignored");
        bad.title = None;
        let source = StubSource::new(vec![bad.clone(), record("2", "Good paper")]);

        run(&source, &paths, &opts()).unwrap();

        let store = read(&paths.store);
        assert!(store.contains("Good paper"));
        assert!(!store.contains("ignored"));
        // The bad id stays out of the set, so the next run retries it.
        assert_eq!(read(&paths.seen_ids), "2");

        run(&source, &paths, &opts()).unwrap();
        assert_eq!(
            source.fetches.borrow().last().unwrap(),
            &vec!["1".to_string()]
        );
        assert_eq!(read(&paths.seen_ids), "2");
    }

    #[test]
    fn batch_of_only_malformed_records_writes_nothing() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut bad = record("1", "ignored");
        bad.authors = None;
        let source = StubSource::new(vec![bad]);

        run(&source, &paths, &opts()).unwrap();
        assert!(!paths.store.exists());
        assert!(!paths.seen_ids.exists());
    }

    #[test]
    fn empty_search_short_circuits_silently() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let source = StubSource::new(Vec::new());

        run(&source, &paths, &opts()).unwrap();
        assert!(!paths.store.exists());
        assert!(!paths.seen_ids.exists());
        assert!(source.fetches.borrow().is_empty());
    }
}
