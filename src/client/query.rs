//! Declarative find-query construction for the server's search endpoint.
//!
//! Queries filter on creation time range and repository equality, optionally
//! on a path prefix, include all item fields, and sort ascending by
//! modification time so consumers see older data first.

use chrono::{DateTime, Utc};

use crate::constants::QUERY_TIMESTAMP_FORMAT;
use crate::window::FetchWindow;

/// Format a timestamp the way the query API expects.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(QUERY_TIMESTAMP_FORMAT).to_string()
}

/// Build the find query for one repository and time window.
///
/// With a `path_prefix`, only items below that path match (the prefix gets a
/// trailing wildcard).
pub fn find_items(repo: &str, window: &FetchWindow, path_prefix: Option<&str>) -> String {
    let mut query = format!(
        "items.find({{\"created\" : {{\"$gt\" : \"{}\"}}, \"created\" : {{\"$lte\" : \"{}\"}},\"repo\":{{\"$eq\":\"{}\"}}",
        format_timestamp(window.start),
        format_timestamp(window.end),
        repo,
    );
    if let Some(prefix) = path_prefix {
        query.push_str(&format!(",\"path\":{{\"$match\":\"{}/*\"}}", prefix));
    }
    query.push_str("}).include(\"*\").sort({\"$asc\" : [\"modified\"]})");
    query
}
