//! Patch-version bump for Python packaging metadata (`setup.py`).
//!
//! The rewrite is line oriented. The first line of the form
//! `    version='X.Y.Z'` supplies the current version; its value is replaced
//! with the next patch version. Every `    download_url='...<package>-X.Y.Z.tar.gz'`
//! line is then pointed at that same new version, so the archive URL can
//! never drift from the declared version. All other bytes pass through.

use crate::error::{CdError, Result};
use crate::version::Version;
use regex::Regex;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^\s+version='([^'\s]+)'").unwrap())
}

fn download_url_re(package: &str) -> Regex {
    let pattern = format!(
        r"^\s+download_url='\S+{}-(\d+\.\d+\.\d+)\.tar\.gz'",
        regex::escape(package)
    );
    Regex::new(&pattern).expect("escaped package name is a valid regex fragment")
}

/// Result of a successful metadata rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub previous: Version,
    pub next: Version,
    pub urls_updated: usize,
    pub text: String,
}

fn capture_range(re: &Regex, line: &str) -> Option<Range<usize>> {
    re.captures(line).and_then(|c| c.get(1)).map(|m| m.range())
}

/// Bump the patch version declared in `text` and return the rewritten text.
///
/// Fails with [`CdError::VersionLineMissing`] when no version assignment is
/// present, and with [`CdError::InvalidVersion`] when its value is not a
/// three-part numeric version. Nothing is rewritten in either case.
pub fn rewrite_metadata(text: &str, package: &str) -> Result<Rewrite> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    let (version_line, version_span) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| capture_range(version_re(), line).map(|r| (i, r)))
        .ok_or(CdError::VersionLineMissing)?;

    let previous: Version = lines[version_line][version_span.clone()].parse()?;
    let next = previous.bump_patch()?;
    let replacement = next.to_string();

    let url_re = download_url_re(package);
    let mut urls_updated = 0;
    let mut out = String::with_capacity(text.len() + 4);

    for (i, line) in lines.iter().enumerate() {
        let span = if i == version_line {
            Some(version_span.clone())
        } else {
            let span = capture_range(&url_re, line);
            if span.is_some() {
                urls_updated += 1;
            }
            span
        };

        match span {
            Some(r) => {
                out.push_str(&line[..r.start]);
                out.push_str(&replacement);
                out.push_str(&line[r.end..]);
            }
            None => out.push_str(line),
        }
    }

    Ok(Rewrite {
        previous,
        next,
        urls_updated,
        text: out,
    })
}

/// Rewrite the metadata file at `path` in place.
pub fn rewrite_metadata_file(path: &Path, package: &str) -> Result<Rewrite> {
    let text = std::fs::read_to_string(path)?;
    let rewrite = rewrite_metadata(&text, package)?;
    crate::io::atomic_write(path, rewrite.text.as_bytes())?;
    tracing::debug!(
        path = %path.display(),
        from = %rewrite.previous,
        to = %rewrite.next,
        urls = rewrite.urls_updated,
        "rewrote package metadata"
    );
    Ok(rewrite)
}
