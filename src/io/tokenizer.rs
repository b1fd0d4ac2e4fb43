//! Splits delimited text into lines of fields using a stream format.

use crate::io::{StreamFormat, StreamMode};
use crate::{Error, Result};
use std::io::Read;

/// One input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedLine {
    /// 1-based physical line number where the record starts.
    pub number: usize,
    /// Raw field values, untrimmed.
    pub fields: Vec<String>,
}

impl TokenizedLine {
    /// Creates a line from string slices.
    #[must_use]
    pub fn new(number: usize, fields: &[&str]) -> Self {
        Self {
            number,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// A record with a single blank field carries no data. Records of
    /// several empty fields still reach the entity parser.
    fn is_blank(&self) -> bool {
        matches!(self.fields.as_slice(), [only] if only.trim().is_empty())
    }
}

/// Character encodings supported for delimited files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Charmap {
    Utf8,
    Latin1,
}

impl Charmap {
    pub(crate) fn parse(name: &str) -> Result<Self> {
        match name.to_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Ok(Self::Utf8),
            "ISO-8859-1" | "ISO8859-1" | "LATIN1" | "LATIN-1" => Ok(Self::Latin1),
            _ => Err(Error::InvalidInput(format!("Unsupported charmap: {name}"))),
        }
    }

    fn decode(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes)
                .map_err(|e| Error::InvalidInput(format!("input is not valid UTF-8: {e}"))),
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    pub(crate) fn encode(self, text: String) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.into_bytes()),
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(c).map_err(|_| {
                        Error::InvalidInput(format!("{c:?} cannot be written as ISO-8859-1"))
                    })
                })
                .collect(),
        }
    }
}

/// Turns a byte stream into [`TokenizedLine`]s.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    charmap: Charmap,
    delimiter: u8,
    quote: u8,
    skip: usize,
}

impl Tokenizer {
    /// Creates a tokenizer for `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if the charmap is unsupported or a separator is not
    /// a single-byte character.
    pub fn new(format: &StreamFormat) -> Result<Self> {
        Ok(Self {
            charmap: Charmap::parse(format.charmap())?,
            delimiter: ascii_byte("field separator", format.field_separator())?,
            quote: ascii_byte("string delimiter", format.string_delimiter())?,
            skip: match format.mode() {
                StreamMode::Import => format.header_lines(),
                StreamMode::Export => 0,
            },
        })
    }

    /// Reads every record from `reader`.
    ///
    /// Header lines are skipped and blank records (a single blank field) are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or decoded.
    pub fn tokenize<R: Read>(&self, mut reader: R) -> Result<Vec<TokenizedLine>> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::operation("read_input", e))?;
        let text = self.charmap.decode(bytes)?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(text.as_bytes());

        let mut lines = Vec::new();
        for (ordinal, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| Error::operation("tokenize", e))?;
            if ordinal < self.skip {
                continue;
            }
            let number = record
                .position()
                .and_then(|p| usize::try_from(p.line()).ok())
                .unwrap_or(ordinal + 1);
            let line = TokenizedLine {
                number,
                fields: record.iter().map(str::to_string).collect(),
            };
            if !line.is_blank() {
                lines.push(line);
            }
        }

        tracing::debug!(records = lines.len(), skipped = self.skip, "Input tokenized");
        Ok(lines)
    }
}

/// Counts the records `format` would yield from `reader`.
///
/// # Errors
///
/// Returns an error if the input cannot be tokenized.
pub fn count_records<R: Read>(reader: R, format: &StreamFormat) -> Result<usize> {
    Ok(Tokenizer::new(format)?.tokenize(reader)?.len())
}

pub(crate) fn ascii_byte(what: &str, c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::InvalidInput(format!("{what} {c:?} must be a single-byte character")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FormatSettings, HeaderPolicy};

    fn import_format(settings: FormatSettings) -> StreamFormat {
        StreamFormat::with_settings("Test", StreamMode::Import, settings).unwrap()
    }

    #[test]
    fn test_default_separator_and_trailing_empty_field() {
        let format = StreamFormat::new("Test", StreamMode::Import);
        let lines = Tokenizer::new(&format)
            .unwrap()
            .tokenize("1;Class One;\n2;Class Two;notes\n".as_bytes())
            .unwrap();
        assert_eq!(
            lines,
            vec![
                TokenizedLine::new(1, &["1", "Class One", ""]),
                TokenizedLine::new(2, &["2", "Class Two", "notes"]),
            ]
        );
    }

    #[test]
    fn test_header_lines_are_skipped_and_blanks_dropped() {
        let format = import_format(FormatSettings {
            field_sep: Some(','),
            header: Some(HeaderPolicy::Skip(1)),
            ..FormatSettings::default()
        });
        let lines = Tokenizer::new(&format)
            .unwrap()
            .tokenize("code,name\n\n   \n1,One\n".as_bytes())
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].fields, vec!["1", "One"]);
        assert_eq!(lines[0].number, 4);
    }

    #[test]
    fn test_records_of_empty_fields_are_kept() {
        let format = StreamFormat::new("Test", StreamMode::Import);
        let lines = Tokenizer::new(&format)
            .unwrap()
            .tokenize("1;One\n;\n ; ;\n2;Two\n".as_bytes())
            .unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], TokenizedLine::new(2, &["", ""]));
        assert_eq!(lines[2].fields.len(), 3);
    }

    #[test]
    fn test_string_delimiter_protects_separator() {
        let format = import_format(FormatSettings {
            string_delim: Some('\''),
            ..FormatSettings::default()
        });
        let lines = Tokenizer::new(&format)
            .unwrap()
            .tokenize("1;'a;b';c\n".as_bytes())
            .unwrap();
        assert_eq!(lines[0].fields, vec!["1", "a;b", "c"]);
    }

    #[test]
    fn test_latin1_decoding() {
        let format = import_format(FormatSettings {
            charmap: Some("ISO-8859-1".to_string()),
            ..FormatSettings::default()
        });
        let lines = Tokenizer::new(&format)
            .unwrap()
            .tokenize(&b"1;Caf\xe9\n"[..])
            .unwrap();
        assert_eq!(lines[0].fields[1], "Café");
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let format = StreamFormat::new("Test", StreamMode::Import);
        let result = Tokenizer::new(&format).unwrap().tokenize(&b"1;Caf\xe9\n"[..]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_settings() {
        let charmap = import_format(FormatSettings {
            charmap: Some("EBCDIC".to_string()),
            ..FormatSettings::default()
        });
        assert!(Tokenizer::new(&charmap).is_err());

        let separator = import_format(FormatSettings {
            field_sep: Some('§'),
            ..FormatSettings::default()
        });
        assert!(Tokenizer::new(&separator).is_err());
    }

    #[test]
    fn test_count_records() {
        let format = StreamFormat::new("Test", StreamMode::Import);
        assert_eq!(count_records("a;b\nc;d\n\n".as_bytes(), &format).unwrap(), 2);
    }
}
