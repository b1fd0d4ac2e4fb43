//! Command handlers module.
//!
//! - `io.rs`: import and export commands
//! - `format.rs`: stream format management

mod format;
mod io;

use clap::Subcommand;

// Re-export command functions
pub use format::cmd_format;
pub use io::{cmd_export, cmd_import};

/// Stream format subcommands.
#[derive(Subcommand)]
pub enum FormatAction {
    /// Show a format with its effective settings.
    Show {
        /// Format name.
        name: String,

        /// Mode: import or export.
        #[arg(short, long, default_value = "import")]
        mode: String,
    },

    /// Create or update a format. Omitted settings are cleared.
    Save {
        /// Format name.
        name: String,

        /// Mode: import or export.
        #[arg(short, long, default_value = "import")]
        mode: String,

        /// Charmap: UTF-8 or ISO-8859-1.
        #[arg(long)]
        charmap: Option<String>,

        /// Date format: sql, dmy, mdy, dotted or compact.
        #[arg(long)]
        date_format: Option<String>,

        /// Thousands separator (a character, `space`, `tab` or `nul`).
        #[arg(long)]
        thousand_sep: Option<String>,

        /// Decimal separator.
        #[arg(long)]
        decimal_sep: Option<String>,

        /// Field separator.
        #[arg(long)]
        field_sep: Option<String>,

        /// String delimiter.
        #[arg(long)]
        string_delim: Option<String>,

        /// Header: `true`/`false` for export, lines to skip for import.
        #[arg(long)]
        header: Option<String>,
    },

    /// List saved formats.
    List {
        /// Mode: import or export.
        #[arg(short, long, default_value = "import")]
        mode: String,
    },

    /// Delete a saved format.
    Delete {
        /// Format name.
        name: String,

        /// Mode: import or export.
        #[arg(short, long, default_value = "import")]
        mode: String,
    },
}
