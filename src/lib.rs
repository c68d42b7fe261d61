//! This crate reads and writes `.bib` files in pure, safe rust.
//!
//! `.bib` files are popular in reference management since many resources
//! allow to export metadata in a BibTeχ or BibLaTeχ file. One entry
//! in such a file can look like this:
//!
//! ```tex
//! @book{DBLP:books/aw/Knuth73a,
//!     author    = {Donald E. Knuth},
//!     title     = {The Art of Computer Programming, Volume {I:} Fundamental Algorithms,
//!                  2nd Edition},
//!     publisher = {Addison-Wesley},
//!     year      = {1973},
//!     url       = {https://www.worldcat.org/oclc/310903895},
//!     isbn      = {0201038218},
//!  }
//! ```
//!
//! In this example, we call `book` the `kind` or `type` and `DBLP:books/aw/Knuth73a`
//! the `ID`. Then we have a sequence of fields with `name` (like `year`) and a
//! value (like `1973`). The formal grammar is not well-specified, but the
//! [biblatex package documentation](https://ctan.ebinger.cc/tex-archive/macros/latex/contrib/biblatex/doc/biblatex.pdf)
//! and [Tame the BeaST](https://ftp.rrze.uni-erlangen.de/ctan/info/bibtex/tamethebeast/ttb_en.pdf)
//! provide some insights.
//!
//! Values are not kept as raw text. Each is a [`Value`], a sequence of typed
//! [`ValueItem`]s: author lists become [`Person`]s, keywords are split,
//! URLs and DOIs are kept verbatim and references to `@string` macros stay
//! references. LaTeX accents are decoded to Unicode on the way in and
//! encoded again by the [`Writer`].
//!
//! ```rust
//! use bibkit::{Parser, ValueItem, Writer};
//! use std::str::FromStr;
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut p = Parser::from_str(r#"@book{tolkien1937, author = {Tolkien, J. R. R.}}"#)?;
//!     let file = p.parse_file()?;
//!     for entry in file.entries() {
//!         println!("type = {}", entry.kind);
//!         println!("id = {}", entry.id);
//!         for (name, value) in entry.fields() {
//!             println!("\t{}\t= {}", name, value.text());
//!         }
//!         assert!(matches!(entry.value("author").map(|v| &v[0]), Some(ValueItem::Person(_))));
//!     }
//!     // the source style is kept when writing
//!     assert_eq!(
//!         Writer::new().to_string(&file),
//!         "@book{tolkien1937,\n\tauthor = {Tolkien, J. R. R.}\n}\n"
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Broken elements do not stop the parser. They are skipped and reported
//! through [`Parser::diagnostics`]; parsing resumes at the next `@`.

mod config;
mod crossref;
mod entry;
mod errors;
mod file;
pub mod keywords;
pub mod latex;
mod lexer;
pub mod names;
mod parser;
mod statistics;
mod value;
mod writer;

pub use crate::config::{Config, EntryTypeDef, FieldClass};
pub use crate::crossref::{resolve_crossref, CrossrefMapping};
pub use crate::entry::{Comment, CommentContext, Element, Entry, Macro, Preamble};
pub use crate::errors::{ConfigError, Diagnostic, DiagnosticKind, LoadError, Severity};
pub use crate::file::{CasingProtection, ElementId, File, FileProperties, StringDelimiter};
pub use crate::parser::{Elements, Parser};
pub use crate::statistics::Statistics;
pub use crate::value::{NameFormat, Person, ReplaceMode, Value, ValueItem};
pub use crate::writer::{to_string, Casing, Writer};
