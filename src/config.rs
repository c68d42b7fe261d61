use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::crossref::CrossrefMapping;
#[cfg(feature = "json")]
use crate::errors::ConfigError;

/// How the content of a field is interpreted while parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldClass {
    /// list of persons separated by “and”
    Person,
    Keywords,
    /// page ranges, hyphens become an en dash
    Pages,
    Month,
    /// one or more DOIs, surrounding text is dropped
    Doi,
    /// URLs or local file names, separated by semicolons
    Url,
    /// the JabRef/Mendeley `file` field, `description:path:type`
    File,
    /// kept exactly as written, e.g. `crossref` or `xdata`
    Verbatim,
    /// `title` or `booktitle`, tallied for casing protection
    Title,
    Plain,
}

/// Known entry type with the fields it expects
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryTypeDef {
    /// canonical spelling, e.g. “InProceedings”
    pub name: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl EntryTypeDef {
    fn new(name: &str, required: &[&str], optional: &[&str]) -> EntryTypeDef {
        EntryTypeDef {
            name: name.to_string(),
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Read-only settings shared by parser and writer. Build a custom one or
/// use [`Config::global`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub entry_types: Vec<EntryTypeDef>,
    /// canonical spelling of field names, e.g. “DOI” or “ISBN”
    pub fields: Vec<String>,
    /// fields holding person lists
    pub person_fields: Vec<String>,
    pub crossref_mapping: CrossrefMapping,
}

static GLOBAL: Lazy<Config> = Lazy::new(Config::default);

const FIELDS: &[&str] = &[
    "Abstract", "Address", "Annote", "Author", "BookAuthor", "BookTitle", "Chapter",
    "Comment", "CrossRef", "DOI", "Edition", "Editor", "EPrint", "EPrintType", "File",
    "HowPublished", "Institution", "ISBN", "ISSN", "Journal", "JournalTitle", "Key",
    "Keywords", "Language", "LocalFile", "Location", "MainTitle", "Month", "Note",
    "Number", "Organization", "Pages", "Publisher", "School", "Series", "Title",
    "Translator", "Type", "URL", "UrlDate", "Volume", "XData", "Year",
];

impl Default for Config {
    fn default() -> Self {
        let types = vec![
            EntryTypeDef::new("Article", &["author", "title", "journal", "year"], &["volume", "number", "pages", "month", "note", "doi"]),
            EntryTypeDef::new("Book", &["author", "title", "publisher", "year"], &["editor", "volume", "series", "address", "edition", "isbn"]),
            EntryTypeDef::new("Booklet", &["title"], &["author", "howpublished", "address", "month", "year"]),
            EntryTypeDef::new("InBook", &["author", "title", "chapter", "publisher", "year"], &["pages", "volume", "series"]),
            EntryTypeDef::new("InCollection", &["author", "title", "booktitle", "publisher", "year"], &["editor", "pages", "address"]),
            EntryTypeDef::new("InProceedings", &["author", "title", "booktitle", "year"], &["editor", "pages", "organization", "publisher", "address"]),
            EntryTypeDef::new("Manual", &["title"], &["author", "organization", "address", "edition", "year"]),
            EntryTypeDef::new("MastersThesis", &["author", "title", "school", "year"], &["type", "address", "month"]),
            EntryTypeDef::new("Misc", &[], &["author", "title", "howpublished", "month", "year", "url"]),
            EntryTypeDef::new("PhDThesis", &["author", "title", "school", "year"], &["type", "address", "month"]),
            EntryTypeDef::new("Proceedings", &["title", "year"], &["editor", "publisher", "organization", "address"]),
            EntryTypeDef::new("TechReport", &["author", "title", "institution", "year"], &["type", "number", "address", "month"]),
            EntryTypeDef::new("Unpublished", &["author", "title", "note"], &["month", "year"]),
            EntryTypeDef::new("Collection", &["editor", "title", "year"], &["publisher", "location"]),
            EntryTypeDef::new("Online", &["title", "url"], &["author", "urldate", "year"]),
            EntryTypeDef::new("Periodical", &["editor", "title", "year"], &["issn"]),
            EntryTypeDef::new("MVBook", &["author", "title", "year"], &["publisher", "location", "volumes"]),
            EntryTypeDef::new("XData", &[], &[]),
        ];
        Config {
            entry_types: types,
            fields: FIELDS.iter().map(|s| s.to_string()).collect(),
            person_fields: ["author", "editor", "bookauthor", "translator"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            crossref_mapping: CrossrefMapping::biblatex(),
        }
    }
}

impl Config {
    /// Process-wide default configuration
    pub fn global() -> &'static Config {
        &GLOBAL
    }

    /// Load a configuration document; missing keys take their defaults
    #[cfg(feature = "json")]
    pub fn from_json(src: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(src)?)
    }

    /// Interpretation of a field's content, given its (any-case) name
    pub fn field_class(&self, name: &str) -> FieldClass {
        let name = name.to_lowercase();
        if self.person_fields.iter().any(|f| f.eq_ignore_ascii_case(&name)) {
            return FieldClass::Person;
        }
        match name.as_str() {
            "keywords" => FieldClass::Keywords,
            "pages" => FieldClass::Pages,
            "month" => FieldClass::Month,
            "file" => FieldClass::File,
            "localfile" | "ee" | "biburl" | "pdf" => FieldClass::Url,
            "crossref" | "xdata" | "color" => FieldClass::Verbatim,
            "title" | "booktitle" => FieldClass::Title,
            "urldate" => FieldClass::Plain,
            n if n.starts_with("url") => FieldClass::Url,
            n if n.starts_with("doi") => FieldClass::Doi,
            _ => FieldClass::Plain,
        }
    }

    /// Canonical spelling of an entry type, or the name itself if unknown
    pub fn canonical_type<'a>(&'a self, name: &'a str) -> &'a str {
        self.entry_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map_or(name, |t| t.name.as_str())
    }

    /// Canonical spelling of a field name, or the name itself if unknown
    pub fn canonical_field<'a>(&'a self, name: &'a str) -> &'a str {
        self.fields
            .iter()
            .find(|f| f.eq_ignore_ascii_case(name))
            .map_or(name, String::as_str)
    }

    pub fn entry_type(&self, name: &str) -> Option<&EntryTypeDef> {
        self.entry_types.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}
