//! The match predicate: does a candidate describe the same work?
//!
//! A fixed ladder of rules, first decisive rule wins. Identifier overlap
//! decides positively, structural disagreements veto, and finally the
//! title and author gates compare fuzzy text. The ladder is pure apart
//! from delegating format equivalence to the format mapper.

use bibdedup_formats::{MetadataView, Record};
use bibdedup_filters::{author_match, normalize};
use tracing::debug;

/// Titles and authors are compared on at most this many characters
pub const COMPARE_MAX_CHARS: usize = 255;

/// Title distance percentage at or above which the pair is rejected
pub const TITLE_DISTANCE_VETO: f64 = 10.0;

/// Author distance percentage above which the pair is rejected
pub const AUTHOR_DISTANCE_VETO: f64 = 20.0;

/// Largest tolerated page-count difference
pub const PAGE_COUNT_TOLERANCE: u32 = 10;

/// Maps a source-declared format to its canonical target format
///
/// Two records whose raw formats differ still pass the format rule when
/// their sources map both formats to the same target.
pub trait FormatMapper: Send + Sync {
    fn map_format(&self, source_id: &str, format: &str) -> String;
}

/// Mapper that leaves every format unchanged
#[derive(Debug, Default, Clone)]
pub struct IdentityFormatMapper;

impl FormatMapper for IdentityFormatMapper {
    fn map_format(&self, _source_id: &str, format: &str) -> String {
        format.to_string()
    }
}

/// Decide whether two records describe the same work
///
/// `subject_view` and `candidate_view` must be views over the records'
/// current payloads. Rules short-circuit in order:
///
/// 1. shared ISBN matches
/// 2. shared unique id matches
/// 3. disjoint ISSN sets veto
/// 4. unmappable format difference vetoes
/// 5. differing publication years veto
/// 6. page counts more than [`PAGE_COUNT_TOLERANCE`] apart veto
/// 7. differing series ISSN or numbering vetoes
/// 8. the title gate vetoes on empty or distant titles
/// 9. the author gate vetoes on one-sided or distant authors
/// 10. anything left matches
pub fn records_match(
    subject: &Record,
    subject_view: &dyn MetadataView,
    candidate: &Record,
    candidate_view: &dyn MetadataView,
    mapper: &dyn FormatMapper,
) -> bool {
    // Rules 1-2: identifier overlap decides immediately
    if intersects(&subject_view.isbns(), &candidate_view.isbns()) {
        debug!("{} matches {} on shared ISBN", subject.id, candidate.id);
        return true;
    }
    if intersects(&subject_view.unique_ids(), &candidate_view.unique_ids()) {
        debug!("{} matches {} on shared unique id", subject.id, candidate.id);
        return true;
    }

    // Rule 3: disjoint ISSN sets
    let subject_issns = subject_view.issns();
    let candidate_issns = candidate_view.issns();
    if !subject_issns.is_empty()
        && !candidate_issns.is_empty()
        && !intersects(&subject_issns, &candidate_issns)
    {
        return false;
    }

    // Rule 4: format difference the mapper cannot reconcile
    let subject_format = subject_view.format();
    let candidate_format = candidate_view.format();
    if subject_format != candidate_format {
        let mapped_subject = mapper.map_format(&subject.source_id, &subject_format);
        let mapped_candidate = mapper.map_format(&candidate.source_id, &candidate_format);
        if mapped_subject != mapped_candidate {
            return false;
        }
    }

    // Rule 5: publication year
    if let (Some(subject_year), Some(candidate_year)) = (
        subject_view.publication_year(),
        candidate_view.publication_year(),
    ) {
        if subject_year != candidate_year {
            return false;
        }
    }

    // Rule 6: page count
    if let (Some(subject_pages), Some(candidate_pages)) =
        (subject_view.page_count(), candidate_view.page_count())
    {
        if subject_pages.abs_diff(candidate_pages) > PAGE_COUNT_TOLERANCE {
            return false;
        }
    }

    // Rule 7: series
    if let (Some(subject_series), Some(candidate_series)) =
        (subject_view.series_issn(), candidate_view.series_issn())
    {
        if subject_series != candidate_series {
            return false;
        }
    }
    if let (Some(subject_numbering), Some(candidate_numbering)) = (
        subject_view.series_numbering(),
        candidate_view.series_numbering(),
    ) {
        if subject_numbering != candidate_numbering {
            return false;
        }
    }

    // Rule 8: title gate
    let subject_title = truncate_chars(&subject_view.title(true), COMPARE_MAX_CHARS);
    let candidate_title = truncate_chars(&candidate_view.title(true), COMPARE_MAX_CHARS);
    if subject_title.is_empty() || candidate_title.is_empty() {
        return false;
    }
    if distance_percentage(&subject_title, &candidate_title) >= TITLE_DISTANCE_VETO {
        return false;
    }

    // Rule 9: author gate
    let subject_author = normalize(&subject_view.main_author());
    let candidate_author = normalize(&candidate_view.main_author());
    match (subject_author.is_empty(), candidate_author.is_empty()) {
        (true, false) | (false, true) => return false,
        (false, false) => {
            if !author_match(&subject_author, &candidate_author) {
                let subject_author = truncate_chars(&subject_author, COMPARE_MAX_CHARS);
                let candidate_author = truncate_chars(&candidate_author, COMPARE_MAX_CHARS);
                if distance_percentage(&subject_author, &candidate_author)
                    > AUTHOR_DISTANCE_VETO
                {
                    return false;
                }
            }
        }
        (true, true) => {}
    }

    debug!(
        "{} matches {} on structural and fuzzy comparison",
        subject.id, candidate.id
    );
    true
}

fn intersects(a: &[String], b: &[String]) -> bool {
    a.iter().any(|value| b.contains(value))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Levenshtein distance as a percentage of the subject length
fn distance_percentage(subject: &str, candidate: &str) -> f64 {
    let distance = strsim::levenshtein(subject, candidate);
    100.0 * distance as f64 / subject.chars().count() as f64
}
