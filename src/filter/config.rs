//! Filter settings and the `url_filter.conf` file format
//!
//! The file is a small INI-style document:
//!
//! ```text
//! [file_types]
//! html=1
//! images=0
//!
//! [domain_whitelist]
//! example.com
//!
//! [domain_blacklist]
//! ads.example.net
//!
//! [url_patterns]
//! /login
//!
//! [query_params]
//! preserve=1
//! strip_tracking=1
//! ```

use crate::url::DEFAULT_TRACKING_PARAMS;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Names of the file-type allow flags, in file order
pub const FILE_TYPE_NAMES: &[&str] = &[
    "html", "pdf", "txt", "doc", "images", "video", "audio", "archives", "code", "data",
];

/// Allow flags per content category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTypes {
    pub html: bool,
    pub pdf: bool,
    pub txt: bool,
    pub doc: bool,
    pub images: bool,
    pub video: bool,
    pub audio: bool,
    pub archives: bool,
    pub code: bool,
    pub data: bool,
}

impl Default for FileTypes {
    fn default() -> Self {
        Self {
            html: true,
            pdf: true,
            txt: true,
            doc: true,
            images: false,
            video: false,
            audio: false,
            archives: false,
            code: false,
            data: false,
        }
    }
}

impl FileTypes {
    /// Returns the flag for a category name, or `None` for an unknown name
    pub fn get(&self, name: &str) -> Option<bool> {
        Some(match name {
            "html" => self.html,
            "pdf" => self.pdf,
            "txt" => self.txt,
            "doc" => self.doc,
            "images" => self.images,
            "video" => self.video,
            "audio" => self.audio,
            "archives" => self.archives,
            "code" => self.code,
            "data" => self.data,
            _ => return None,
        })
    }

    /// Sets the flag for a category name; returns `false` for an unknown name
    pub fn set(&mut self, name: &str, allow: bool) -> bool {
        let flag = match name {
            "html" => &mut self.html,
            "pdf" => &mut self.pdf,
            "txt" => &mut self.txt,
            "doc" => &mut self.doc,
            "images" => &mut self.images,
            "video" => &mut self.video,
            "audio" => &mut self.audio,
            "archives" => &mut self.archives,
            "code" => &mut self.code,
            "data" => &mut self.data,
            _ => return false,
        };
        *flag = allow;
        true
    }
}

/// Maps a lowercase extension to its category name
///
/// Unknown extensions fall under `html`.
pub fn category_for_extension(ext: &str) -> &'static str {
    match ext {
        "html" | "htm" => "html",
        "pdf" => "pdf",
        "txt" => "txt",
        "doc" | "docx" => "doc",
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => "images",
        "mp4" | "avi" | "mkv" | "webm" => "video",
        "mp3" | "wav" | "flac" | "ogg" => "audio",
        "zip" | "tar" | "gz" | "7z" => "archives",
        "c" | "h" | "cpp" | "py" | "js" | "java" => "code",
        "json" | "xml" | "csv" | "sql" => "data",
        _ => "html",
    }
}

/// Everything the URL filter decides on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub file_types: FileTypes,

    /// When non-empty, only these domains are admitted
    pub domain_whitelist: Vec<String>,

    /// Always rejected, even when whitelisted
    pub domain_blacklist: Vec<String>,

    /// Regex sources; a match anywhere in the URL rejects it
    pub url_patterns: Vec<String>,

    /// Keep query strings at all
    pub preserve_query_params: bool,

    /// Remove `tracking_params` from kept query strings
    pub strip_tracking_params: bool,

    pub tracking_params: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            file_types: FileTypes::default(),
            domain_whitelist: Vec::new(),
            domain_blacklist: Vec::new(),
            url_patterns: Vec::new(),
            preserve_query_params: true,
            strip_tracking_params: true,
            tracking_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    FileTypes,
    Whitelist,
    Blacklist,
    Patterns,
    QueryParams,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

impl FilterConfig {
    /// Parses the contents of a filter file
    ///
    /// Comments, blank lines and unknown keys never fail the parse; unknown
    /// entries are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        let mut section = Section::None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = match &line[1..line.len() - 1] {
                    "file_types" => Section::FileTypes,
                    "domain_whitelist" => Section::Whitelist,
                    "domain_blacklist" => Section::Blacklist,
                    "url_patterns" => Section::Patterns,
                    "query_params" => Section::QueryParams,
                    other => {
                        tracing::warn!("Unknown filter section [{}] on line {}", other, index + 1);
                        Section::None
                    }
                };
                continue;
            }

            match section {
                Section::FileTypes | Section::QueryParams => {
                    let Some((key, value)) = line.split_once('=') else {
                        tracing::warn!("Malformed filter line {}: {}", index + 1, line);
                        continue;
                    };
                    let key = key.trim();
                    let Some(flag) = parse_flag(value) else {
                        tracing::warn!("Invalid flag for '{}' on line {}", key, index + 1);
                        continue;
                    };

                    let known = if section == Section::FileTypes {
                        config.file_types.set(key, flag)
                    } else {
                        match key {
                            "preserve" => {
                                config.preserve_query_params = flag;
                                true
                            }
                            "strip_tracking" => {
                                config.strip_tracking_params = flag;
                                true
                            }
                            _ => false,
                        }
                    };
                    if !known {
                        tracing::warn!("Unknown filter key '{}' on line {}", key, index + 1);
                    }
                }
                Section::Whitelist => {
                    push_unique(&mut config.domain_whitelist, line.to_lowercase());
                }
                Section::Blacklist => {
                    push_unique(&mut config.domain_blacklist, line.to_lowercase());
                }
                Section::Patterns => {
                    push_unique(&mut config.url_patterns, line.to_string());
                }
                Section::None => {
                    tracing::warn!("Filter line {} is outside any section", index + 1);
                }
            }
        }

        config
    }

    /// Renders the settings in the filter file format
    pub fn to_conf_string(&self) -> String {
        let mut out = String::from("# Pagefeed URL filter\n\n[file_types]\n");
        for name in FILE_TYPE_NAMES {
            let flag = self.file_types.get(name).unwrap_or(false);
            let _ = writeln!(out, "{}={}", name, u8::from(flag));
        }

        out.push_str("\n[domain_whitelist]\n");
        for domain in &self.domain_whitelist {
            let _ = writeln!(out, "{}", domain);
        }

        out.push_str("\n[domain_blacklist]\n");
        for domain in &self.domain_blacklist {
            let _ = writeln!(out, "{}", domain);
        }

        out.push_str("\n[url_patterns]\n");
        for pattern in &self.url_patterns {
            let _ = writeln!(out, "{}", pattern);
        }

        let _ = write!(
            out,
            "\n[query_params]\npreserve={}\nstrip_tracking={}\n",
            u8::from(self.preserve_query_params),
            u8::from(self.strip_tracking_params)
        );

        out
    }

    /// Loads a filter file; a missing file yields the defaults
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Writes the filter file
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_conf_string())
    }
}

/// Appends a value unless it is already present; returns whether it was added
pub(crate) fn push_unique(list: &mut Vec<String>, value: String) -> bool {
    if list.contains(&value) {
        return false;
    }
    list.push(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let types = FileTypes::default();
        assert_eq!(types.get("html"), Some(true));
        assert_eq!(types.get("doc"), Some(true));
        assert_eq!(types.get("images"), Some(false));
        assert_eq!(types.get("data"), Some(false));
        assert_eq!(types.get("bogus"), None);
    }

    #[test]
    fn test_category_for_extension() {
        assert_eq!(category_for_extension("htm"), "html");
        assert_eq!(category_for_extension("webp"), "images");
        assert_eq!(category_for_extension("7z"), "archives");
        assert_eq!(category_for_extension("py"), "code");
        assert_eq!(category_for_extension("csv"), "data");
        assert_eq!(category_for_extension("php"), "html");
    }

    #[test]
    fn test_parse_full_file() {
        let text = "
# comment
[file_types]
images=1
pdf=0

[domain_whitelist]
Example.com

[domain_blacklist]
ads.example.com

[url_patterns]
/login
\\.exe$

[query_params]
preserve=0
strip_tracking=0
";
        let config = FilterConfig::parse(text);
        assert!(config.file_types.images);
        assert!(!config.file_types.pdf);
        assert!(config.file_types.html);
        assert_eq!(config.domain_whitelist, vec!["example.com"]);
        assert_eq!(config.domain_blacklist, vec!["ads.example.com"]);
        assert_eq!(config.url_patterns, vec!["/login", "\\.exe$"]);
        assert!(!config.preserve_query_params);
        assert!(!config.strip_tracking_params);
    }

    #[test]
    fn test_unknown_keys_are_skipped() {
        let text = "[file_types]\nfonts=1\nhtml=yes\n[mystery]\nvalue\n";
        let config = FilterConfig::parse(text);
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_conf_string_roundtrip() {
        let mut config = FilterConfig::default();
        config.file_types.video = true;
        config.domain_blacklist.push("bad.com".to_string());
        config.url_patterns.push("/admin".to_string());
        config.strip_tracking_params = false;

        let parsed = FilterConfig::parse(&config.to_conf_string());
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FilterConfig::load(&dir.path().join("url_filter.conf")).unwrap();
        assert_eq!(config, FilterConfig::default());
    }
}
