pub mod github_sync;
pub mod notice;
pub mod service;
pub mod token_query;

pub use github_sync::{GitHubSync, SyncReport};
pub use notice::{Notice, NoticeLevel};
pub use service::{DemoQueryApi, QueryApi, RemoteQueryApi};
pub use token_query::{HistoryOutcome, LookupOutcome, TokenQuery, TokenQueryView};

use common::Envelope;
use myerrors::QueryError;

/// Collapses an envelope result into the error taxonomy.
///
/// Transport details are logged and replaced by `network_message`; a
/// `success = false` answer keeps the server message or falls back to
/// `fallback`.
pub(crate) fn settle<T>(
    result: Result<Envelope<T>, QueryError>,
    fallback: &str,
    network_message: &str,
) -> Result<Option<T>, QueryError> {
    let envelope = result.map_err(|e| {
        log::warn!("request to service failed: {e}");
        QueryError::transport(network_message)
    })?;
    if envelope.success {
        Ok(envelope.data)
    } else {
        Err(QueryError::logical(envelope.message_or(fallback)))
    }
}
