//! Assemble a streamed reply into its full text

use futures::{Stream, StreamExt};

use crate::Result;

/// Drain `fragments` and concatenate them in arrival order
///
/// Zero fragments yield an empty reply, which is a valid answer.
///
/// # Errors
///
/// Returns the first error the stream yields; no partial reply is returned
pub async fn aggregate<S>(fragments: S) -> Result<String>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    aggregate_with(fragments, |_| {}).await
}

/// Like [`aggregate`], reporting each fragment to `on_fragment` as it arrives
///
/// # Errors
///
/// Returns the first error the stream yields
pub async fn aggregate_with<S, F>(mut fragments: S, mut on_fragment: F) -> Result<String>
where
    S: Stream<Item = Result<String>> + Unpin,
    F: FnMut(&str),
{
    let mut reply = String::new();
    let mut count = 0usize;

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        reply.push_str(&fragment);
        count += 1;
    }

    tracing::debug!(fragments = count, reply_len = reply.len(), "reply aggregated");
    Ok(reply)
}
