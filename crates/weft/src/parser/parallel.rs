//! Parsing many buffers at once.
//!
//! Every buffer gets its own session; the compiled language and the
//! scanners are shared read-only between rayon workers.

use crate::parser::Parser;
use crate::syntax::SyntaxTree;
use rayon::prelude::*;

/// Parses every buffer in `sources` on the rayon thread pool. Trees come
/// back in input order.
#[must_use]
pub fn parse_batch<S>(parser: &Parser, sources: &[S]) -> Vec<SyntaxTree>
where
    S: AsRef<[u8]> + Sync,
{
    tracing::debug!(buffers = sources.len(), "parsing batch");
    sources
        .par_iter()
        .map(|source| parser.parse(source))
        .collect()
}
