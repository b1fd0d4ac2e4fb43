//! Property-based tests for stream formats and tokenizing.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Serialize then load yields an equal format, whatever subset of
//!   indicators is set
//! - A set separator equal to NUL is distinguishable from an unset one
//! - The tokenizer reproduces fields written with the same dialect

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use ledgerio::config::{ConfigStore, MemoryConfigStore};
use ledgerio::io::{
    DateFormat, FormatIndicators, FormatSettings, HeaderPolicy, StreamFormat, StreamMode,
    Tokenizer,
};
use proptest::prelude::*;

fn any_mode() -> impl Strategy<Value = StreamMode> {
    prop_oneof![Just(StreamMode::Import), Just(StreamMode::Export)]
}

fn any_separator() -> impl Strategy<Value = Option<char>> {
    prop::option::of(prop_oneof![
        Just('\0'),
        Just(';'),
        Just(','),
        Just('\t'),
        Just(' '),
        Just('.'),
        Just('\''),
        Just('"'),
        Just('|'),
    ])
}

fn any_settings(mode: StreamMode) -> impl Strategy<Value = FormatSettings> {
    let header = match mode {
        StreamMode::Import => (0usize..5).prop_map(HeaderPolicy::Skip).boxed(),
        StreamMode::Export => any::<bool>().prop_map(HeaderPolicy::Emit).boxed(),
    };
    (
        prop::option::of(prop_oneof![Just("UTF-8"), Just("ISO-8859-1")]),
        prop::option::of(prop::sample::select(DateFormat::all().to_vec())),
        any_separator(),
        any_separator(),
        any_separator(),
        any_separator(),
        header,
    )
        .prop_map(
            |(charmap, date_format, thousand, decimal, field, delim, header)| FormatSettings {
                charmap: charmap.map(str::to_string),
                date_format,
                thousand_sep: thousand,
                decimal_sep: decimal,
                field_sep: field,
                string_delim: delim,
                header: Some(header),
            },
        )
}

fn any_format() -> impl Strategy<Value = StreamFormat> {
    ("[A-Za-z][A-Za-z0-9 ]{0,12}", any_mode()).prop_flat_map(|(name, mode)| {
        any_settings(mode)
            .prop_map(move |settings| StreamFormat::with_settings(name.clone(), mode, settings).unwrap())
    })
}

proptest! {
    /// Property: a saved format loads back equal, indicators included.
    #[test]
    fn prop_serialize_then_load_roundtrips(format in any_format()) {
        let mut store = MemoryConfigStore::new();
        format.serialize(&mut store).unwrap();

        let loaded = StreamFormat::load(&store, format.name(), format.mode()).unwrap();
        prop_assert_eq!(&loaded, &format);
        prop_assert_eq!(loaded.indicators(), format.indicators());
        prop_assert_eq!(loaded.settings(), format.settings());
    }

    /// Property: the persisted list always has eight entries under the
    /// mode-qualified key.
    #[test]
    fn prop_persisted_shape(format in any_format()) {
        let mut store = MemoryConfigStore::new();
        format.serialize(&mut store).unwrap();

        let key = StreamFormat::storage_key(format.name(), format.mode());
        let values = store.get_list(&key).unwrap().unwrap();
        prop_assert_eq!(values.len(), 8);
        prop_assert_eq!(values[0].parse::<u8>().unwrap(), format.indicators().bits());
    }

    /// Property: set-to-NUL and unset stay distinct after a round trip.
    #[test]
    fn prop_nul_separator_differs_from_unset(mode in any_mode(), set in any::<bool>()) {
        let settings = FormatSettings {
            thousand_sep: set.then_some('\0'),
            ..FormatSettings::default()
        };
        let format = StreamFormat::with_settings("Nul", mode, settings).unwrap();
        let mut store = MemoryConfigStore::new();
        format.serialize(&mut store).unwrap();
        let loaded = StreamFormat::load(&store, "Nul", mode).unwrap();

        prop_assert_eq!(loaded.has(FormatIndicators::THOUSAND_SEP), set);
        prop_assert_eq!(loaded.thousand_separator(), set.then_some('\0'));
    }

    /// Property: import and export formats of the same name never collide.
    #[test]
    fn prop_modes_are_stored_apart(name in "[A-Za-z]{1,10}") {
        let mut store = MemoryConfigStore::new();
        StreamFormat::new(name.clone(), StreamMode::Import).serialize(&mut store).unwrap();

        prop_assert_eq!(StreamFormat::list(&store, StreamMode::Import).unwrap(), vec![name.clone()]);
        prop_assert!(StreamFormat::list(&store, StreamMode::Export).unwrap().is_empty());
        prop_assert!(StreamFormat::load(&store, &name, StreamMode::Export).is_err());
    }

    /// Property: fields written with a dialect tokenize back unchanged.
    #[test]
    fn prop_tokenizer_reads_back_written_fields(
        rows in prop::collection::vec(
            prop::collection::vec("[A-Za-z0-9][A-Za-z0-9 ;,\"]{0,7}", 2..5),
            1..6,
        ),
        separator in prop_oneof![Just(';'), Just(','), Just('\t')],
    ) {
        let format = StreamFormat::with_settings(
            "Prop",
            StreamMode::Import,
            FormatSettings {
                field_sep: Some(separator),
                string_delim: Some('"'),
                ..FormatSettings::default()
            },
        )
        .unwrap();

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(u8::try_from(separator).unwrap())
            .from_writer(Vec::new());
        for row in &rows {
            writer.write_record(row).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let lines = Tokenizer::new(&format).unwrap().tokenize(bytes.as_slice()).unwrap();
        let fields: Vec<Vec<String>> = lines.into_iter().map(|l| l.fields).collect();
        prop_assert_eq!(fields, rows);
    }
}
