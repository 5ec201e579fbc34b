//! Line-oriented URL worklists

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::rules::ConfigError;

/// Characters after which the rest of a line is annotation
const ANNOTATION_MARKS: [char; 2] = ['#', '←'];

fn clean_line(line: &str) -> Option<&str> {
    let line = line.trim().trim_start_matches('\u{feff}');
    if line.starts_with('#') {
        return None;
    }
    let line = line.split(ANNOTATION_MARKS).next().unwrap_or_default();
    line.split_whitespace().next()
}

/// URLs listed in worklist text, in order and without duplicates.
///
/// Blank lines and `#` comment lines are skipped; inline comments and any
/// trailing annotation after the first whitespace are dropped.
pub fn parse_worklist(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(clean_line)
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}

/// Read and parse a worklist file; a missing file is a configuration error
pub fn load_worklist(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| ConfigError::read(path, e))?;
    Ok(parse_worklist(&String::from_utf8_lossy(&bytes)))
}

/// Append `urls` to the worklist at `path`, one per line, creating it if needed
pub fn append_worklist(path: impl AsRef<Path>, urls: &[String]) -> Result<usize, ConfigError> {
    if urls.is_empty() {
        return Ok(0);
    }
    let path = path.as_ref();
    let needs_newline = std::fs::read(path)
        .map(|existing| !existing.is_empty() && !existing.ends_with(b"\n"))
        .unwrap_or(false);

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ConfigError::read(path, e))?;

    let mut out = String::new();
    if needs_newline {
        out.push('\n');
    }
    for url in urls {
        out.push_str(url);
        out.push('\n');
    }
    file.write_all(out.as_bytes()).map_err(|e| ConfigError::read(path, e))?;
    Ok(urls.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_worklist() {
        let text = "\u{feff}https://a.gov/one\n\
                    # a comment line\n\
                    \n\
                    https://a.gov/two   # inline comment\n\
                    \thttps://a.gov/three ← added by hand\n\
                    https://a.gov/one\n\
                    https://a.gov/four extra words\n";

        assert_eq!(
            parse_worklist(text),
            vec![
                "https://a.gov/one",
                "https://a.gov/two",
                "https://a.gov/three",
                "https://a.gov/four",
            ]
        );
    }

    #[test]
    fn test_bom_before_comment() {
        assert!(parse_worklist("\u{feff}# header\r\n").is_empty());
        assert_eq!(parse_worklist("https://a.gov/x\r\n"), vec!["https://a.gov/x"]);
    }

    #[test]
    fn test_missing_worklist_is_config_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_worklist(dir.path().join("missing.txt")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_append_worklist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "https://a.gov/one").unwrap();

        let added = append_worklist(&path, &["https://a.gov/two".to_string()]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(append_worklist(&path, &[]).unwrap(), 0);
        assert_eq!(
            load_worklist(&path).unwrap(),
            vec!["https://a.gov/one", "https://a.gov/two"]
        );
    }
}
