//! Single-result reduction
//!
//! `find` runs the query with a logical limit of [`LOOKAHEAD`]: the one
//! allowed result plus a probe. A probe hit means the query was not unique
//! and is reported instead of truncated.

use crate::cursor::DocumentCursor;
use divan_core::{Document, Error, PageOptions, Result};

/// Logical limit used by single-result lookups.
pub const LOOKAHEAD: usize = 2;

/// Caller options with the limit replaced by [`LOOKAHEAD`].
pub fn single_result_options(options: PageOptions) -> Result<PageOptions> {
    options.with_limit(LOOKAHEAD)
}

/// Drain `cursor`, expecting at most one document.
///
/// # Errors
///
/// Returns `Error::MultipleResults` if a second document is produced.
pub async fn reduce_single(mut cursor: DocumentCursor) -> Result<Option<Document>> {
    let Some(first) = cursor.next().await? else {
        return Ok(None);
    };
    if let Some(second) = cursor.next().await? {
        tracing::warn!(
            target: "divan::store",
            first = %first.id,
            second = %second.id,
            "Single-result lookup matched more than one document"
        );
        return Err(Error::MultipleResults { first_id: first.id });
    }
    Ok(Some(first))
}
