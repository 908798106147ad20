//! Raw page files written by the fetch loop
//!
//! Each fetched page is saved as `page_{djb2(url)}_{unix_ts}.html` with three
//! comment lines in front of the body:
//!
//! ```text
//! <!-- URL: https://example.com/ -->
//! <!-- Timestamp: 1700000000 -->
//! <!-- Size: 1234 bytes -->
//! ```

use crate::url::djb2;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Builds the file name for a page fetched at `timestamp`
pub fn raw_page_name(url: &str, timestamp: i64) -> String {
    format!("page_{}_{}.html", djb2(url), timestamp)
}

/// Writes a fetched page into `raw_dir`
///
/// The body is stored byte for byte after the header, whatever its encoding,
/// and the size line counts those bytes. The file is written under a
/// temporary name and renamed into place so the preprocess stage never reads
/// a partial page.
pub fn write_raw_page(raw_dir: &Path, url: &str, body: &[u8], timestamp: i64) -> io::Result<PathBuf> {
    let path = raw_dir.join(raw_page_name(url, timestamp));
    let temp = path.with_extension("html.part");

    let mut file = fs::File::create(&temp)?;
    write!(
        file,
        "<!-- URL: {} -->\n<!-- Timestamp: {} -->\n<!-- Size: {} bytes -->\n",
        url,
        timestamp,
        body.len()
    )?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp, &path)?;

    Ok(path)
}

/// Returns the source URL recorded in a raw page's header, if present
pub fn header_url(content: &str) -> Option<&str> {
    content
        .lines()
        .take(3)
        .find_map(|line| line.trim().strip_prefix("<!-- URL: "))
        .and_then(|rest| rest.strip_suffix(" -->"))
        .map(str::trim)
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_name() {
        assert_eq!(raw_page_name("a", 42), "page_177670_42.html");
    }

    #[test]
    fn test_write_and_read_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw_page(dir.path(), "https://x.com/?a=1", b"<p>hi</p>", 1_700_000_000).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<!-- URL: https://x.com/?a=1 -->\n<!-- Timestamp: 1700000000 -->\n<!-- Size: 9 bytes -->\n"));
        assert!(content.ends_with("<p>hi</p>"));
        assert_eq!(header_url(&content), Some("https://x.com/?a=1"));

        // Only the final file remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_non_utf8_body_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        // Latin-1 "café" followed by a stray 0xFF
        let body = [b'c', b'a', b'f', 0xE9, 0xFF];
        let path = write_raw_page(dir.path(), "https://x.com/", &body, 5).unwrap();

        let header = "<!-- URL: https://x.com/ -->\n<!-- Timestamp: 5 -->\n<!-- Size: 5 bytes -->\n";
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..header.len()], header.as_bytes());
        assert_eq!(&bytes[header.len()..], &body[..]);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(header_url("<html></html>"), None);
        assert_eq!(header_url("<!-- URL:  -->"), None);
    }
}
