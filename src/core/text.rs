//! Line protocol helpers
//!
//! Configuration files are plain text: one device command per line, with
//! blank lines and comment lines (`#`, `//`, `;`) ignored. Leading comments
//! may carry a `title:` tag and any number of `content:` tags describing the
//! file.

use crate::domain::error::{GnssConfError, GnssConfResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Prefixes marking a line as a comment
pub const COMMENT_PREFIXES: [&str; 3] = ["#", "//", ";"];

/// Number of leading lines scanned for description tags
pub const DESCRIPTION_SCAN_LINES: usize = 30;

/// Characters of a command kept in progress previews
pub const PREVIEW_CHARS: usize = 30;

/// Strip the byte-order mark, unify line endings and enforce exactly one
/// trailing newline.
pub fn normalize_text(raw: &str) -> String {
    let text = raw.strip_prefix('\u{FEFF}').unwrap_or(raw);
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut normalized = unified.trim().to_string();
    normalized.push('\n');
    normalized
}

/// Whether a trimmed line is a comment
pub fn is_comment(line: &str) -> bool {
    COMMENT_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// Ordered device commands taken from a configuration text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandBatch {
    commands: Vec<String>,
}

impl CommandBatch {
    /// Extract the commands of a configuration text, keeping their order.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.split('\n'))
    }

    /// Build a batch from individual lines, applying the same filtering as
    /// [`CommandBatch::from_text`].
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty() && !is_comment(line))
            .collect();

        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

/// Human description found in the leading comments of a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescription {
    pub title: Option<String>,
    pub details: Vec<String>,
}

impl ConfigDescription {
    /// Scan the leading comment lines for `title:` and `content:` tags.
    ///
    /// Blank lines are skipped. The first non-comment line ends the scan
    /// once something has been found, and never more than
    /// [`DESCRIPTION_SCAN_LINES`] lines are looked at.
    pub fn extract(text: &str) -> Option<Self> {
        let mut description = ConfigDescription::default();

        for line in text.split('\n').take(DESCRIPTION_SCAN_LINES) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let comment = match line
                .strip_prefix('#')
                .or_else(|| line.strip_prefix("//"))
            {
                Some(rest) => rest.trim_start(),
                None => {
                    if !description.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            if let Some(title) = strip_tag(comment, "title:") {
                description.title = Some(title.trim().to_string());
            } else if let Some(detail) = strip_tag(comment, "content:") {
                let detail = detail.trim();
                if !detail.is_empty() {
                    description.details.push(detail.to_string());
                }
            }
        }

        if description.is_empty() {
            None
        } else {
            Some(description)
        }
    }

    fn is_empty(&self) -> bool {
        self.title.as_deref().map_or(true, str::is_empty) && self.details.is_empty()
    }
}

fn strip_tag<'a>(comment: &'a str, tag: &str) -> Option<&'a str> {
    let head = comment.get(..tag.len())?;
    if head.eq_ignore_ascii_case(tag) {
        comment.get(tag.len()..)
    } else {
        None
    }
}

/// Line ending appended to every transmitted command.
///
/// Parsed from a fixed set of selectors or from a template made only of
/// `\r` and `\n` escapes; nothing else is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LineTerminator {
    Lf,
    #[default]
    CrLf,
    Cr,
    None,
    Custom(String),
}

impl LineTerminator {
    pub fn as_str(&self) -> &str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
            LineTerminator::Cr => "\r",
            LineTerminator::None => "",
            LineTerminator::Custom(sequence) => sequence,
        }
    }

    /// Append the terminator to a command.
    pub fn terminate(&self, command: &str) -> String {
        let mut line = String::with_capacity(command.len() + 2);
        line.push_str(command);
        line.push_str(self.as_str());
        line
    }

    fn from_sequence(sequence: String) -> Self {
        match sequence.as_str() {
            "\n" => LineTerminator::Lf,
            "\r\n" => LineTerminator::CrLf,
            "\r" => LineTerminator::Cr,
            "" => LineTerminator::None,
            _ => LineTerminator::Custom(sequence),
        }
    }
}

impl FromStr for LineTerminator {
    type Err = GnssConfError;

    fn from_str(selector: &str) -> GnssConfResult<Self> {
        match selector.trim().to_ascii_uppercase().as_str() {
            "LF" => return Ok(LineTerminator::Lf),
            "CRLF" => return Ok(LineTerminator::CrLf),
            "CR" => return Ok(LineTerminator::Cr),
            "NONE" => return Ok(LineTerminator::None),
            _ => {}
        }

        let mut sequence = String::new();
        let mut chars = selector.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('r') => sequence.push('\r'),
                    Some('n') => sequence.push('\n'),
                    _ => return Err(GnssConfError::InvalidTerminator(selector.to_string())),
                },
                '\r' | '\n' => sequence.push(c),
                _ => return Err(GnssConfError::InvalidTerminator(selector.to_string())),
            }
        }

        if sequence.is_empty() {
            return Err(GnssConfError::InvalidTerminator(selector.to_string()));
        }

        Ok(Self::from_sequence(sequence))
    }
}

impl fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineTerminator::Lf => write!(f, "LF"),
            LineTerminator::CrLf => write!(f, "CRLF"),
            LineTerminator::Cr => write!(f, "CR"),
            LineTerminator::None => write!(f, "NONE"),
            LineTerminator::Custom(sequence) => write!(f, "{}", escape_controls(sequence)),
        }
    }
}

/// Make carriage returns and line feeds visible.
pub fn escape_controls(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

/// Shorten a command for progress reports.
pub fn preview(command: &str) -> String {
    if command.chars().count() > PREVIEW_CHARS {
        let head: String = command.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        command.to_string()
    }
}

/// Incremental UTF-8 decoder for a byte stream.
///
/// Multi-byte sequences split across chunks are held back until complete;
/// invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut decoded = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    decoded.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            // incomplete trailing sequence
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        decoded
    }

    /// Flush whatever is still buffered at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Piece of text split around URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSegment<'a> {
    Plain(&'a str),
    Url(&'a str),
}

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r#"(?i)https?://[^\s<>"]+"#).expect("static URL pattern"))
}

/// Split text into plain runs and URLs. A single trailing punctuation mark
/// (`.,!?;:`) is left out of the URL.
pub fn segment_urls(text: &str) -> Vec<TextSegment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for found in url_regex().find_iter(text) {
        let mut end = found.end();
        if text[found.start()..end].ends_with(['.', ',', '!', '?', ';', ':']) {
            end -= 1;
        }
        if found.start() > cursor {
            segments.push(TextSegment::Plain(&text[cursor..found.start()]));
        }
        segments.push(TextSegment::Url(&text[found.start()..end]));
        cursor = end;
    }

    if cursor < text.len() {
        segments.push(TextSegment::Plain(&text[cursor..]));
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROVER: &str = "#title: Rover\n#content: desc one\n#content: desc two\nCMD1\n";

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("\u{FEFF}A\r\nB\rC\n"), "A\nB\nC\n");
        assert_eq!(normalize_text("  A\n\n\n"), "A\n");
        assert_eq!(normalize_text(""), "\n");
    }

    #[test]
    fn test_extract_commands() {
        let batch = CommandBatch::from_text(ROVER);
        assert_eq!(batch.commands(), &["CMD1".to_string()]);

        let text = "  MODE ROVER  \n\n// comment\n; other\n# hash\nGPGGA COM1 1\r\n";
        let batch = CommandBatch::from_text(text);
        assert_eq!(batch.commands(), &["MODE ROVER".to_string(), "GPGGA COM1 1".to_string()]);
    }

    #[test]
    fn test_extract_description() {
        let description = ConfigDescription::extract(ROVER).unwrap();
        assert_eq!(description.title.as_deref(), Some("Rover"));
        assert_eq!(description.details, vec!["desc one", "desc two"]);
    }

    #[test]
    fn test_description_tags_are_case_insensitive() {
        let description = ConfigDescription::extract("// TITLE:  Base station \n#Content: RTCM out\n").unwrap();
        assert_eq!(description.title.as_deref(), Some("Base station"));
        assert_eq!(description.details, vec!["RTCM out"]);
    }

    #[test]
    fn test_description_stops_at_first_command() {
        let text = "#title: Rover\nCMD1\n#content: too late\n";
        let description = ConfigDescription::extract(text).unwrap();
        assert!(description.details.is_empty());
    }

    #[test]
    fn test_description_skips_commands_before_tags() {
        let text = "CMD0\n#title: Late title\n";
        let description = ConfigDescription::extract(text).unwrap();
        assert_eq!(description.title.as_deref(), Some("Late title"));
    }

    #[test]
    fn test_description_scan_limit() {
        let mut text = "# plain comment\n".repeat(DESCRIPTION_SCAN_LINES);
        text.push_str("#title: hidden\n");
        assert!(ConfigDescription::extract(&text).is_none());
    }

    #[test]
    fn test_description_ignores_empty_content() {
        assert!(ConfigDescription::extract("#content:   \nCMD\n").is_none());
    }

    #[test]
    fn test_terminator_selectors() {
        assert_eq!("LF".parse::<LineTerminator>().unwrap().as_str(), "\n");
        assert_eq!("crlf".parse::<LineTerminator>().unwrap().as_str(), "\r\n");
        assert_eq!("CR".parse::<LineTerminator>().unwrap().as_str(), "\r");
        assert_eq!("none".parse::<LineTerminator>().unwrap().as_str(), "");
        assert_eq!("\\r\\n".parse::<LineTerminator>().unwrap(), LineTerminator::CrLf);
        assert_eq!(
            "\\n\\r".parse::<LineTerminator>().unwrap(),
            LineTerminator::Custom("\n\r".to_string())
        );
    }

    #[test]
    fn test_terminator_rejects_code() {
        for selector in ["${alert(1)}", "\\t", "", "\\", "LF; rm -rf /"] {
            assert!(
                matches!(selector.parse::<LineTerminator>(), Err(GnssConfError::InvalidTerminator(_))),
                "accepted {:?}",
                selector
            );
        }
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(LineTerminator::CrLf.to_string(), "CRLF");
        assert_eq!(LineTerminator::Custom("\n\r".into()).to_string(), "\\n\\r");
        assert_eq!(LineTerminator::Lf.terminate("CMD"), "CMD\n");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("SHORT"), "SHORT");
        let long = "CONFIG COM2 921600 WITH A VERY LONG TAIL";
        assert_eq!(preview(long), "CONFIG COM2 921600 WITH A VERY...");
    }

    #[test]
    fn test_escape_controls() {
        assert_eq!(escape_controls("CMD\r\n"), "CMD\\r\\n");
    }

    #[test]
    fn test_utf8_decoder_split_sequence() {
        let bytes = "é°".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..3]), "é");
        assert_eq!(decoder.decode(&bytes[3..]), "°");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_utf8_decoder_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'O', 0xFF, b'K']), "O\u{FFFD}K");
        assert_eq!(decoder.decode(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_segment_urls() {
        let segments = segment_urls("See https://docs.centipede.fr/rover. Then reboot.");
        assert_eq!(
            segments,
            vec![
                TextSegment::Plain("See "),
                TextSegment::Url("https://docs.centipede.fr/rover"),
                TextSegment::Plain(". Then reboot."),
            ]
        );
        assert_eq!(segment_urls("no links"), vec![TextSegment::Plain("no links")]);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[A-Z \r\n#;/]{0,64}") {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once.clone());
            prop_assert!(once.ends_with('\n'));
            prop_assert!(!once.contains('\r'));
        }

        #[test]
        fn prop_batch_has_no_comments_or_blanks(raw in "[A-Z0-9 \n#;/]{0,128}") {
            let batch = CommandBatch::from_text(&raw);
            for command in batch.iter() {
                prop_assert!(!command.is_empty());
                prop_assert!(!is_comment(command));
                prop_assert_eq!(command.trim(), command);
            }
            let expected = raw
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty() && !is_comment(line))
                .count();
            prop_assert_eq!(batch.len(), expected);
        }
    }
}
