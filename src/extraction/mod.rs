//! Constant-reference extraction.
//!
//! A file's syntax tree is reduced to an ordered list of [`CandidateGroup`]s,
//! one per distinct reference site. Each group lists the fully-qualified
//! names the host would try, in lexical lookup order.

mod extractor;
mod ruby;
mod syntax;

pub use extractor::{expand_with_nesting, extract_candidates, CandidateGroup, ExtractionMode};
pub use ruby::{RubyParser, SourceParser};
pub use syntax::{ConstPath, SyntaxNode};

use crate::observability::{set_phase, CoveragePhase};

/// Parse `source` and extract its candidate groups.
///
/// Parse failures yield `None`; the caller treats the file as contributing nothing.
pub fn extract_source(
    parser: &dyn SourceParser,
    source: &str,
    mode: ExtractionMode,
) -> Option<Vec<CandidateGroup>> {
    if mode == ExtractionMode::Off {
        return Some(Vec::new());
    }

    let _phase = set_phase(CoveragePhase::Extraction);
    match parser.parse(source) {
        Ok(tree) => Some(extract_candidates(&tree, mode)),
        Err(err) => {
            log::debug!("Extraction skipped: {:#}", err);
            None
        }
    }
}
