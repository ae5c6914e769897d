//! CSV output for extracted posts.
//!
//! One row per post, UTF-8 with a byte-order mark so spreadsheet software
//! opens the Chinese titles correctly. Fields containing a comma, quote or
//! line break are quoted with embedded quotes doubled.

use crate::models::Post;
use crate::utils::file_stamp;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

const HEADER: &str = "title,link,read_count,comment_count,author,time,page,crawl_time";

/// Write all posts to `{out_dir}/guba_posts_{stock_code}_{timestamp}.csv`.
///
/// An empty post list writes nothing and returns `None`; absence of data is
/// already reported upstream.
#[instrument(level = "info", skip(posts), fields(out_dir = %out_dir, count = posts.len()))]
pub async fn write_posts(
    posts: &[Post],
    out_dir: &str,
    stock_code: &str,
) -> Result<Option<String>, Box<dyn Error>> {
    if posts.is_empty() {
        info!("No posts to save; skipping CSV output");
        return Ok(None);
    }

    fs::create_dir_all(out_dir).await?;
    let path = format!(
        "{}/guba_posts_{}_{}.csv",
        out_dir.trim_end_matches('/'),
        stock_code,
        file_stamp()
    );
    fs::write(&path, render_csv(posts)).await?;
    info!(path = %path, count = posts.len(), "Wrote post CSV");
    Ok(Some(path))
}

/// Render the full CSV document, BOM and header included.
fn render_csv(posts: &[Post]) -> String {
    let mut out = String::from("\u{feff}");
    out.push_str(HEADER);
    out.push('\n');
    for post in posts {
        let row = [
            csv_field(&post.title),
            csv_field(&post.link),
            post.read_count.to_string(),
            post.comment_count.to_string(),
            csv_field(&post.author),
            csv_field(&post.time),
            post.page.to_string(),
            csv_field(&post.crawl_time),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
