//! Stream formats: named dialects for producing and consuming delimited text.
//!
//! A [`StreamFormat`] is identified by its name and [`StreamMode`]. Each
//! optional setting is gated by its own indicator bit; a clear indicator means
//! "use the contextual default", which is different from a separator that was
//! explicitly set to the nul character.
//!
//! # Persisted layout
//!
//! Formats are stored in a [`ConfigStore`] under `"{name}-{ModeLabel}-format"`
//! as an ordered list:
//!
//! | Index | Content |
//! |-------|---------|
//! | 0 | indicator bitmask (decimal) |
//! | 1 | charmap |
//! | 2 | date format code |
//! | 3 | thousands separator character code |
//! | 4 | decimal separator character code |
//! | 5 | field separator character code |
//! | 6 | header: `True`/`False` (Export) or lines to skip (Import) |
//! | 7 | string delimiter character code |
//!
//! Separators are stored as numeric character codes so that control
//! characters survive any text-based store.

use crate::config::ConfigStore;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Name of the format used when none is specified.
pub const DEFAULT_FORMAT_NAME: &str = "Default";

/// Charmap applied when none is set.
pub const DEFAULT_CHARMAP: &str = "UTF-8";

const DEFAULT_DECIMAL_SEP: char = '.';
const DEFAULT_FIELD_SEP: char = ';';
const DEFAULT_STRING_DELIM: char = '"';
const PERSISTED_FIELDS: usize = 8;

/// Direction a stream format is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamMode {
    /// Producing delimited text from the store.
    #[default]
    Export,
    /// Consuming delimited text into the store.
    Import,
}

impl StreamMode {
    /// Returns the label used in persisted keys.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Export => "Export",
            Self::Import => "Import",
        }
    }
}

impl FromStr for StreamMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "export" => Ok(Self::Export),
            "import" => Ok(Self::Import),
            _ => Err(Error::InvalidInput(format!("Unknown stream mode: {s}"))),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bit set recording which optional settings of a format are explicitly set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatIndicators(u8);

impl FormatIndicators {
    /// Charmap is set.
    pub const CHARMAP: Self = Self(1);
    /// Date format is set.
    pub const DATE_FORMAT: Self = Self(1 << 1);
    /// Thousands separator is set.
    pub const THOUSAND_SEP: Self = Self(1 << 2);
    /// Decimal separator is set.
    pub const DECIMAL_SEP: Self = Self(1 << 3);
    /// Field separator is set.
    pub const FIELD_SEP: Self = Self(1 << 4);
    /// String delimiter is set.
    pub const STRING_DELIM: Self = Self(1 << 5);
    /// Every indicator.
    pub const ALL: Self = Self(0b0011_1111);

    /// No indicator set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds indicators from raw bits, rejecting unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Returns whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears the bits of `other`.
    pub const fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for FormatIndicators {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Date layouts a format can use, persisted by numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateFormat {
    /// `2024-03-31` (code 0).
    #[default]
    Sql,
    /// `31/03/2024` (code 1).
    DayMonthYear,
    /// `03/31/2024` (code 2).
    MonthDayYear,
    /// `31.03.2024` (code 3).
    DottedDayMonthYear,
    /// `20240331` (code 4).
    Compact,
}

impl DateFormat {
    /// Returns every date format in code order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Sql,
            Self::DayMonthYear,
            Self::MonthDayYear,
            Self::DottedDayMonthYear,
            Self::Compact,
        ]
    }

    /// Returns the persisted code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Sql => 0,
            Self::DayMonthYear => 1,
            Self::MonthDayYear => 2,
            Self::DottedDayMonthYear => 3,
            Self::Compact => 4,
        }
    }

    /// Looks a format up by persisted code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.code() == code)
    }

    /// Returns the `chrono` pattern.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Sql => "%Y-%m-%d",
            Self::DayMonthYear => "%d/%m/%Y",
            Self::MonthDayYear => "%m/%d/%Y",
            Self::DottedDayMonthYear => "%d.%m.%Y",
            Self::Compact => "%Y%m%d",
        }
    }

    /// Returns the short name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::DayMonthYear => "dmy",
            Self::MonthDayYear => "mdy",
            Self::DottedDayMonthYear => "dotted",
            Self::Compact => "compact",
        }
    }
}

impl FromStr for DateFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == lower || f.pattern() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown date format: {s}")))
    }
}

/// Header handling; the variant is fixed by the format's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderPolicy {
    /// Export: whether to write a header row.
    Emit(bool),
    /// Import: number of leading lines to skip.
    Skip(usize),
}

impl HeaderPolicy {
    /// Returns the default policy for `mode`.
    #[must_use]
    pub const fn default_for(mode: StreamMode) -> Self {
        match mode {
            StreamMode::Export => Self::Emit(true),
            StreamMode::Import => Self::Skip(0),
        }
    }

    const fn matches(self, mode: StreamMode) -> bool {
        matches!(
            (self, mode),
            (Self::Emit(_), StreamMode::Export) | (Self::Skip(_), StreamMode::Import)
        )
    }
}

/// Values for [`StreamFormat::set`]. `None` clears the matching indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSettings {
    /// Charmap, e.g. `UTF-8`.
    pub charmap: Option<String>,
    /// Date layout.
    pub date_format: Option<DateFormat>,
    /// Thousands separator.
    pub thousand_sep: Option<char>,
    /// Decimal separator.
    pub decimal_sep: Option<char>,
    /// Field separator.
    pub field_sep: Option<char>,
    /// String delimiter.
    pub string_delim: Option<char>,
    /// Header handling; `None` keeps the current policy.
    pub header: Option<HeaderPolicy>,
}

/// A named text dialect used to produce or consume delimited text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    name: String,
    mode: StreamMode,
    indicators: FormatIndicators,
    charmap: String,
    date_format: DateFormat,
    thousand_sep: char,
    decimal_sep: char,
    field_sep: char,
    string_delim: char,
    header: HeaderPolicy,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::new(DEFAULT_FORMAT_NAME, StreamMode::Export)
    }
}

impl StreamFormat {
    /// Creates a format with every indicator clear.
    #[must_use]
    pub fn new(name: impl Into<String>, mode: StreamMode) -> Self {
        Self {
            name: name.into(),
            mode,
            indicators: FormatIndicators::empty(),
            charmap: String::new(),
            date_format: DateFormat::Sql,
            thousand_sep: '\0',
            decimal_sep: '\0',
            field_sep: '\0',
            string_delim: '\0',
            header: HeaderPolicy::default_for(mode),
        }
    }

    /// Creates a format and applies `settings` in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the header policy does not match `mode`.
    pub fn with_settings(
        name: impl Into<String>,
        mode: StreamMode,
        settings: FormatSettings,
    ) -> Result<Self> {
        let mut format = Self::new(name, mode);
        format.set(settings)?;
        Ok(format)
    }

    /// Returns the format name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mode, fixed at creation.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns the indicator bits.
    #[must_use]
    pub const fn indicators(&self) -> FormatIndicators {
        self.indicators
    }

    /// Returns whether `indicator` is set.
    #[must_use]
    pub const fn has(&self, indicator: FormatIndicators) -> bool {
        self.indicators.contains(indicator)
    }

    /// Replaces every setting at once.
    ///
    /// # Errors
    ///
    /// Returns an error if `settings.header` does not match the mode; the
    /// format is left unchanged in that case.
    pub fn set(&mut self, settings: FormatSettings) -> Result<()> {
        if let Some(header) = settings.header {
            self.check_header(header)?;
        }
        self.set_charmap(settings.charmap);
        self.set_date_format(settings.date_format);
        self.set_thousand_separator(settings.thousand_sep);
        self.set_decimal_separator(settings.decimal_sep);
        self.set_field_separator(settings.field_sep);
        self.set_string_delimiter(settings.string_delim);
        if let Some(header) = settings.header {
            self.header = header;
        }
        Ok(())
    }

    /// Returns the current settings; unset values are `None`.
    #[must_use]
    pub fn settings(&self) -> FormatSettings {
        FormatSettings {
            charmap: self
                .has(FormatIndicators::CHARMAP)
                .then(|| self.charmap.clone()),
            date_format: self
                .has(FormatIndicators::DATE_FORMAT)
                .then_some(self.date_format),
            thousand_sep: self.thousand_separator(),
            decimal_sep: self
                .has(FormatIndicators::DECIMAL_SEP)
                .then_some(self.decimal_sep),
            field_sep: self
                .has(FormatIndicators::FIELD_SEP)
                .then_some(self.field_sep),
            string_delim: self
                .has(FormatIndicators::STRING_DELIM)
                .then_some(self.string_delim),
            header: Some(self.header),
        }
    }

    /// Returns the charmap, `UTF-8` when unset.
    #[must_use]
    pub fn charmap(&self) -> &str {
        if self.has(FormatIndicators::CHARMAP) {
            &self.charmap
        } else {
            DEFAULT_CHARMAP
        }
    }

    /// Sets or clears the charmap.
    pub fn set_charmap(&mut self, charmap: Option<String>) {
        self.indicators
            .set(FormatIndicators::CHARMAP, charmap.is_some());
        self.charmap = charmap.unwrap_or_default();
    }

    /// Returns the date format, [`DateFormat::Sql`] when unset.
    #[must_use]
    pub const fn date_format(&self) -> DateFormat {
        if self.has(FormatIndicators::DATE_FORMAT) {
            self.date_format
        } else {
            DateFormat::Sql
        }
    }

    /// Sets or clears the date format.
    pub fn set_date_format(&mut self, date_format: Option<DateFormat>) {
        self.indicators
            .set(FormatIndicators::DATE_FORMAT, date_format.is_some());
        self.date_format = date_format.unwrap_or_default();
    }

    /// Returns the thousands separator; there is none when unset.
    #[must_use]
    pub const fn thousand_separator(&self) -> Option<char> {
        if self.has(FormatIndicators::THOUSAND_SEP) {
            Some(self.thousand_sep)
        } else {
            None
        }
    }

    /// Sets or clears the thousands separator.
    pub fn set_thousand_separator(&mut self, sep: Option<char>) {
        self.indicators
            .set(FormatIndicators::THOUSAND_SEP, sep.is_some());
        self.thousand_sep = sep.unwrap_or('\0');
    }

    /// Returns the decimal separator, `.` when unset.
    #[must_use]
    pub const fn decimal_separator(&self) -> char {
        if self.has(FormatIndicators::DECIMAL_SEP) {
            self.decimal_sep
        } else {
            DEFAULT_DECIMAL_SEP
        }
    }

    /// Sets or clears the decimal separator.
    pub fn set_decimal_separator(&mut self, sep: Option<char>) {
        self.indicators
            .set(FormatIndicators::DECIMAL_SEP, sep.is_some());
        self.decimal_sep = sep.unwrap_or('\0');
    }

    /// Returns the field separator, `;` when unset.
    #[must_use]
    pub const fn field_separator(&self) -> char {
        if self.has(FormatIndicators::FIELD_SEP) {
            self.field_sep
        } else {
            DEFAULT_FIELD_SEP
        }
    }

    /// Sets or clears the field separator.
    pub fn set_field_separator(&mut self, sep: Option<char>) {
        self.indicators
            .set(FormatIndicators::FIELD_SEP, sep.is_some());
        self.field_sep = sep.unwrap_or('\0');
    }

    /// Returns the string delimiter, `"` when unset.
    #[must_use]
    pub const fn string_delimiter(&self) -> char {
        if self.has(FormatIndicators::STRING_DELIM) {
            self.string_delim
        } else {
            DEFAULT_STRING_DELIM
        }
    }

    /// Sets or clears the string delimiter.
    pub fn set_string_delimiter(&mut self, delim: Option<char>) {
        self.indicators
            .set(FormatIndicators::STRING_DELIM, delim.is_some());
        self.string_delim = delim.unwrap_or('\0');
    }

    /// Returns the header policy.
    #[must_use]
    pub const fn header(&self) -> HeaderPolicy {
        self.header
    }

    /// Sets the header policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy variant does not match the mode.
    pub fn set_header(&mut self, header: HeaderPolicy) -> Result<()> {
        self.check_header(header)?;
        self.header = header;
        Ok(())
    }

    /// Export: whether a header row is written. Always `false` for Import.
    #[must_use]
    pub const fn emits_header(&self) -> bool {
        matches!(self.header, HeaderPolicy::Emit(true))
    }

    /// Import: number of leading lines skipped. Always 0 for Export.
    #[must_use]
    pub const fn header_lines(&self) -> usize {
        match self.header {
            HeaderPolicy::Skip(n) => n,
            HeaderPolicy::Emit(_) => 0,
        }
    }

    fn check_header(&self, header: HeaderPolicy) -> Result<()> {
        if header.matches(self.mode) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "header policy {header:?} does not apply to {} formats",
                self.mode
            )))
        }
    }

    /// Parses a decimal number written with this format's separators.
    #[must_use]
    pub fn parse_decimal(&self, text: &str) -> Option<f64> {
        let mut normalized: String = text.trim().to_string();
        if let Some(sep) = self.thousand_separator() {
            normalized.retain(|c| c != sep);
        }
        let decimal = self.decimal_separator();
        if decimal != '.' {
            normalized = normalized.replace(decimal, ".");
        }
        normalized.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Writes `value` with two decimals using this format's separators.
    #[must_use]
    pub fn format_decimal(&self, value: f64) -> String {
        let raw = format!("{:.2}", value.abs());
        let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

        let mut out = String::with_capacity(raw.len() + 4);
        if value < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        match self.thousand_separator() {
            Some(sep) => {
                let digits: Vec<char> = int_part.chars().collect();
                for (i, digit) in digits.iter().enumerate() {
                    if i > 0 && (digits.len() - i) % 3 == 0 {
                        out.push(sep);
                    }
                    out.push(*digit);
                }
            },
            None => out.push_str(int_part),
        }
        out.push(self.decimal_separator());
        out.push_str(frac_part);
        out
    }

    /// Parses a date written in this format's date layout.
    #[must_use]
    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), self.date_format().pattern()).ok()
    }

    /// Writes `date` in this format's date layout.
    #[must_use]
    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(self.date_format().pattern()).to_string()
    }

    /// Returns the persisted key for `name` and `mode`.
    #[must_use]
    pub fn storage_key(name: &str, mode: StreamMode) -> String {
        format!("{name}-{}-format", mode.label())
    }

    /// Encodes the format as its persisted string list.
    #[must_use]
    pub fn to_persisted(&self) -> Vec<String> {
        let header = match self.header {
            HeaderPolicy::Emit(true) => "True".to_string(),
            HeaderPolicy::Emit(false) => "False".to_string(),
            HeaderPolicy::Skip(n) => n.to_string(),
        };
        vec![
            self.indicators.bits().to_string(),
            self.charmap.clone(),
            self.date_format.code().to_string(),
            u32::from(self.thousand_sep).to_string(),
            u32::from(self.decimal_sep).to_string(),
            u32::from(self.field_sep).to_string(),
            header,
            u32::from(self.string_delim).to_string(),
        ]
    }

    /// Decodes a persisted string list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list has the wrong length or any entry is malformed.
    pub fn from_persisted(name: &str, mode: StreamMode, values: &[String]) -> Result<Self> {
        if values.len() != PERSISTED_FIELDS {
            return Err(Error::InvalidInput(format!(
                "format '{name}': expected {PERSISTED_FIELDS} persisted values, got {}",
                values.len()
            )));
        }

        let bits = parse_number::<u8>(name, "indicators", &values[0])?;
        let indicators = FormatIndicators::from_bits(bits).ok_or_else(|| {
            Error::InvalidInput(format!("format '{name}': unknown indicator bits {bits}"))
        })?;
        let code = parse_number::<u8>(name, "date format", &values[2])?;
        let date_format = DateFormat::from_code(code).ok_or_else(|| {
            Error::InvalidInput(format!("format '{name}': unknown date format code {code}"))
        })?;
        let header = match mode {
            StreamMode::Export => match values[6].as_str() {
                "True" => HeaderPolicy::Emit(true),
                "False" => HeaderPolicy::Emit(false),
                other => {
                    return Err(Error::InvalidInput(format!(
                        "format '{name}': export header must be True or False, got {other:?}"
                    )));
                },
            },
            StreamMode::Import => HeaderPolicy::Skip(parse_number(name, "header", &values[6])?),
        };

        Ok(Self {
            name: name.to_string(),
            mode,
            indicators,
            charmap: values[1].clone(),
            date_format,
            thousand_sep: parse_char(name, "thousands separator", &values[3])?,
            decimal_sep: parse_char(name, "decimal separator", &values[4])?,
            field_sep: parse_char(name, "field separator", &values[5])?,
            string_delim: parse_char(name, "string delimiter", &values[7])?,
            header,
        })
    }

    /// Saves the format under its key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn serialize(&self, store: &mut dyn ConfigStore) -> Result<()> {
        let key = Self::storage_key(&self.name, self.mode);
        store.set_list(&key, self.to_persisted())?;
        tracing::debug!(key = %key, "Stream format saved");
        Ok(())
    }

    /// Loads a saved format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing is saved under the key, or an
    /// error if the saved list is malformed.
    pub fn load(store: &dyn ConfigStore, name: &str, mode: StreamMode) -> Result<Self> {
        let key = Self::storage_key(name, mode);
        let values = store
            .get_list(&key)?
            .ok_or_else(|| Error::NotFound(format!("stream format '{key}'")))?;
        Self::from_persisted(name, mode, &values)
    }

    /// Loads a saved format, or creates a fresh one when none is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if a saved list exists but is malformed.
    pub fn load_or_new(store: &dyn ConfigStore, name: &str, mode: StreamMode) -> Result<Self> {
        match Self::load(store, name, mode) {
            Err(Error::NotFound(_)) => Ok(Self::new(name, mode)),
            other => other,
        }
    }

    /// Deletes a saved format. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn delete(store: &mut dyn ConfigStore, name: &str, mode: StreamMode) -> Result<bool> {
        store.remove(&Self::storage_key(name, mode))
    }

    /// Lists the names of saved formats for `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list(store: &dyn ConfigStore, mode: StreamMode) -> Result<Vec<String>> {
        let suffix = format!("-{}-format", mode.label());
        Ok(store
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_suffix(&suffix).map(str::to_string))
            .collect())
    }
}

fn parse_number<T: FromStr>(name: &str, field: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::InvalidInput(format!("format '{name}': invalid {field} value {value:?}"))
    })
}

fn parse_char(name: &str, field: &str, value: &str) -> Result<char> {
    let code = parse_number::<u32>(name, field, value)?;
    char::from_u32(code).ok_or_else(|| {
        Error::InvalidInput(format!("format '{name}': invalid {field} code {code}"))
    })
}
