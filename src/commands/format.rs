//! Stream format command handlers.

use super::FormatAction;
use ledgerio::config::{LedgerioConfig, TomlConfigStore};
use ledgerio::io::{
    DateFormat, FormatIndicators, FormatSettings, HeaderPolicy, StreamFormat, StreamMode,
};
use ledgerio::{Error, Result};

/// Format command.
pub fn cmd_format(config: &LedgerioConfig, action: FormatAction) -> Result<()> {
    let mut store = TomlConfigStore::open(&config.format_store_path)?;

    match action {
        FormatAction::Show { name, mode } => {
            let format = StreamFormat::load(&store, &name, mode.parse()?)?;
            print_format(&format);
        },
        FormatAction::Save {
            name,
            mode,
            charmap,
            date_format,
            thousand_sep,
            decimal_sep,
            field_sep,
            string_delim,
            header,
        } => {
            let mode: StreamMode = mode.parse()?;
            let settings = FormatSettings {
                charmap,
                date_format: date_format.as_deref().map(str::parse::<DateFormat>).transpose()?,
                thousand_sep: thousand_sep.as_deref().map(parse_separator).transpose()?,
                decimal_sep: decimal_sep.as_deref().map(parse_separator).transpose()?,
                field_sep: field_sep.as_deref().map(parse_separator).transpose()?,
                string_delim: string_delim.as_deref().map(parse_separator).transpose()?,
                header: header.as_deref().map(|h| parse_header(h, mode)).transpose()?,
            };
            let mut format = StreamFormat::load_or_new(&store, &name, mode)?;
            format.set(settings)?;
            format.serialize(&mut store)?;
            println!("Saved {mode} format '{name}' to {}", store.path().display());
            print_format(&format);
        },
        FormatAction::List { mode } => {
            let mode: StreamMode = mode.parse()?;
            let names = StreamFormat::list(&store, mode)?;
            if names.is_empty() {
                println!("No saved {mode} formats.");
            } else {
                println!("Saved {mode} formats:");
                for name in names {
                    println!("  {name}");
                }
            }
        },
        FormatAction::Delete { name, mode } => {
            let mode: StreamMode = mode.parse()?;
            if StreamFormat::delete(&mut store, &name, mode)? {
                println!("Deleted {mode} format '{name}'");
            } else {
                return Err(Error::NotFound(format!("{mode} format '{name}'")));
            }
        },
    }

    Ok(())
}

fn print_format(format: &StreamFormat) {
    let marker = |indicator: FormatIndicators| if format.has(indicator) { "" } else { " (default)" };

    println!("{} ({})", format.name(), format.mode());
    println!(
        "  Charmap:          {}{}",
        format.charmap(),
        marker(FormatIndicators::CHARMAP)
    );
    println!(
        "  Date format:      {}{}",
        format.date_format().as_str(),
        marker(FormatIndicators::DATE_FORMAT)
    );
    println!(
        "  Thousands sep:    {}{}",
        format
            .thousand_separator()
            .map_or_else(|| "none".to_string(), describe_char),
        marker(FormatIndicators::THOUSAND_SEP)
    );
    println!(
        "  Decimal sep:      {}{}",
        describe_char(format.decimal_separator()),
        marker(FormatIndicators::DECIMAL_SEP)
    );
    println!(
        "  Field sep:        {}{}",
        describe_char(format.field_separator()),
        marker(FormatIndicators::FIELD_SEP)
    );
    println!(
        "  String delimiter: {}{}",
        describe_char(format.string_delimiter()),
        marker(FormatIndicators::STRING_DELIM)
    );
    match format.header() {
        HeaderPolicy::Emit(emit) => println!("  Header row:       {emit}"),
        HeaderPolicy::Skip(lines) => println!("  Skipped lines:    {lines}"),
    }
}

fn describe_char(c: char) -> String {
    match c {
        '\t' => "tab".to_string(),
        ' ' => "space".to_string(),
        '\0' => "nul".to_string(),
        c => c.to_string(),
    }
}

/// Parses a separator argument: a single character or one of `tab`,
/// `\t`, `space`, `nul`.
fn parse_separator(value: &str) -> Result<char> {
    match value {
        "tab" | "\\t" => Ok('\t'),
        "space" => Ok(' '),
        "nul" => Ok('\0'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(Error::InvalidInput(format!(
                    "separator must be a single character, got {value:?}"
                ))),
            }
        },
    }
}

fn parse_header(value: &str, mode: StreamMode) -> Result<HeaderPolicy> {
    match mode {
        StreamMode::Export => value
            .parse::<bool>()
            .map(HeaderPolicy::Emit)
            .map_err(|_| Error::InvalidInput(format!("export header must be true or false, got {value:?}"))),
        StreamMode::Import => value
            .parse::<usize>()
            .map(HeaderPolicy::Skip)
            .map_err(|_| Error::InvalidInput(format!("import header must be a line count, got {value:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separator() {
        assert_eq!(parse_separator(";").unwrap(), ';');
        assert_eq!(parse_separator("tab").unwrap(), '\t');
        assert_eq!(parse_separator("\\t").unwrap(), '\t');
        assert_eq!(parse_separator("nul").unwrap(), '\0');
        assert!(parse_separator(";;").is_err());
        assert!(parse_separator("").is_err());
    }

    #[test]
    fn test_parse_header_follows_mode() {
        assert_eq!(
            parse_header("true", StreamMode::Export).unwrap(),
            HeaderPolicy::Emit(true)
        );
        assert_eq!(
            parse_header("2", StreamMode::Import).unwrap(),
            HeaderPolicy::Skip(2)
        );
        assert!(parse_header("2", StreamMode::Export).is_err());
    }
}
