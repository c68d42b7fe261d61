//! Field inheritance through `crossref` and `xdata`.
//!
//! An entry referencing a parent via `crossref = {parent}` inherits every
//! field of the parent it does not set itself. Under biblatex rules a parent
//! field may arrive under a different name, e.g. the `title` of a `@book`
//! becomes the `booktitle` of an `@inbook`; the [`CrossrefMapping`] table
//! describes these renames. `xdata = {a, b}` copies fields from data-only
//! entries, which may in turn name further `xdata` entries.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use indexmap::IndexMap;
use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::entry::Entry;
use crate::errors::ConfigError;
use crate::file::File;

/// Field renames applied when inheriting from a crossref parent, written
/// as lines of the form `type:field>field1&field2`. The type is the parent's
/// entry type, `*` matching any type. An empty right-hand side means the
/// field is never inherited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<String>", into = "Vec<String>"))]
pub struct CrossrefMapping {
    rules: IndexMap<(String, String), Vec<String>>,
}

const BIBLATEX_MAPPING: &str = "
*:ids>
*:crossref>
*:xref>
*:xdata>
*:entryset>
*:entrysubtype>
*:execute>
*:label>
*:options>
*:presort>
*:related>
*:relatedoptions>
*:relatedstring>
*:relatedtype>
*:shorthand>
*:shorthandintro>
*:sortkey>
mvbook:author>author&bookauthor
mvbook:title>maintitle
mvbook:subtitle>mainsubtitle
mvbook:titleaddon>maintitleaddon
mvcollection:title>maintitle
mvcollection:subtitle>mainsubtitle
mvcollection:titleaddon>maintitleaddon
mvproceedings:title>maintitle
mvproceedings:subtitle>mainsubtitle
mvproceedings:titleaddon>maintitleaddon
mvreference:title>maintitle
mvreference:subtitle>mainsubtitle
mvreference:titleaddon>maintitleaddon
book:author>author&bookauthor
book:title>booktitle
book:subtitle>booksubtitle
book:titleaddon>booktitleaddon
collection:title>booktitle
collection:subtitle>booksubtitle
collection:titleaddon>booktitleaddon
proceedings:title>booktitle
proceedings:subtitle>booksubtitle
proceedings:titleaddon>booktitleaddon
reference:title>booktitle
reference:subtitle>booksubtitle
reference:titleaddon>booktitleaddon
periodical:title>journaltitle
periodical:subtitle>journalsubtitle
";

impl CrossrefMapping {
    /// Rules following biblatex' inheritance setup
    pub fn biblatex() -> CrossrefMapping {
        let mut mapping = CrossrefMapping::default();
        for line in BIBLATEX_MAPPING.lines() {
            let added = mapping.add_line(line);
            debug_assert!(added.is_ok(), "malformed built-in mapping line '{line}'");
        }
        mapping
    }

    /// Parse and add one `type:field>field1&field2` line. Blank lines and
    /// lines starting with `#` are ignored.
    pub fn add_line(&mut self, line: &str) -> Result<(), ConfigError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let malformed = || ConfigError::MalformedMapping(line.to_string());
        let (source, targets) = line.split_once('>').ok_or_else(malformed)?;
        let (kind, field) = source.split_once(':').ok_or_else(malformed)?;
        let (kind, field) = (kind.trim().to_lowercase(), field.trim().to_lowercase());
        if kind.is_empty() || field.is_empty() {
            return Err(malformed());
        }
        let targets = targets
            .split('&')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.rules.insert((kind, field), targets);
        Ok(())
    }

    /// Destination names for `field` inherited from a parent of type `kind`,
    /// `None` if no rule applies
    pub fn lookup(&self, kind: &str, field: &str) -> Option<&[String]> {
        let kind = kind.to_lowercase();
        let field = field.to_lowercase();
        self.rules
            .get(&(kind, field.clone()))
            .or_else(|| self.rules.get(&("*".to_string(), field)))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromStr for CrossrefMapping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mapping = CrossrefMapping::default();
        for line in s.lines() {
            mapping.add_line(line)?;
        }
        Ok(mapping)
    }
}

impl TryFrom<Vec<String>> for CrossrefMapping {
    type Error = ConfigError;

    fn try_from(lines: Vec<String>) -> Result<Self, Self::Error> {
        let mut mapping = CrossrefMapping::default();
        for line in lines.iter() {
            mapping.add_line(line)?;
        }
        Ok(mapping)
    }
}

impl From<CrossrefMapping> for Vec<String> {
    fn from(mapping: CrossrefMapping) -> Self {
        mapping
            .rules
            .into_iter()
            .map(|((kind, field), targets)| format!("{kind}:{field}>{}", targets.join("&")))
            .collect()
    }
}

fn find_entry<'f>(file: &'f File, id: &str) -> Option<&'f Entry> {
    file.entry(id)
        .or_else(|| file.entries().find(|entry| entry.id.eq_ignore_ascii_case(id)))
}

/// Copy of `entry` with all fields inherited through `crossref` and
/// `xdata` filled in. Fields the entry sets itself always win. Neither the
/// entry nor the file is modified.
pub fn resolve_crossref(entry: &Entry, file: &File, mapping: &CrossrefMapping) -> Entry {
    let mut result = entry.clone();

    if let Some(key) = entry.plain_text("crossref") {
        let key = key.trim();
        match find_entry(file, key) {
            Some(parent) => {
                trace!("inheriting fields of '{}' into '{}'", parent.id, entry.id);
                for (name, value) in parent.fields() {
                    if name.eq_ignore_ascii_case("crossref") {
                        continue;
                    }
                    match mapping.lookup(&parent.kind, name) {
                        Some(targets) => {
                            for target in targets.iter() {
                                if !result.contains(target) {
                                    result.insert(target, value.clone());
                                }
                            }
                        }
                        None => {
                            if !result.contains(name) {
                                result.insert(name, value.clone());
                            }
                        }
                    }
                }
            }
            None => debug!("crossref '{}' of '{}' not found", key, entry.id),
        }
        result.remove("crossref");
    }

    let mut queue: VecDeque<String> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(entry.id.to_lowercase());
    let mut enqueue = |text: &str, queue: &mut VecDeque<String>| {
        for key in text.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if seen.insert(key.to_lowercase()) {
                queue.push_back(key.to_string());
            }
        }
    };
    if let Some(text) = entry.plain_text("xdata") {
        enqueue(&text, &mut queue);
    }
    while let Some(key) = queue.pop_front() {
        let Some(data) = find_entry(file, &key) else {
            debug!("xdata '{}' of '{}' not found", key, entry.id);
            continue;
        };
        for (name, value) in data.fields() {
            if name.eq_ignore_ascii_case("xdata") {
                enqueue(&value.text(), &mut queue);
            } else if !result.contains(name) {
                result.insert(name, value.clone());
            }
        }
    }
    result.remove("xdata");

    result
}

impl Entry {
    /// This entry with inherited fields filled in, see [`resolve_crossref`]
    pub fn resolve_crossref(&self, file: &File, config: &Config) -> Entry {
        resolve_crossref(self, file, &config.crossref_mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Person, Value, ValueItem};
    use std::error;

    fn text(s: &str) -> Value {
        Value::from(ValueItem::PlainText(s.to_string()))
    }

    fn verbatim(s: &str) -> Value {
        Value::from(ValueItem::VerbatimText(s.to_string()))
    }

    #[test]
    fn test_mapping_lines() -> Result<(), Box<dyn error::Error>> {
        let mapping: CrossrefMapping = "# comment\nbook:title>booktitle\n*:sortkey>\nBook:Author>author&bookauthor".parse()?;
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.lookup("book", "title"), Some(&["booktitle".to_string()][..]));
        assert_eq!(mapping.lookup("article", "sortkey"), Some(&[][..]));
        assert_eq!(mapping.lookup("BOOK", "author").map(<[String]>::len), Some(2));
        assert_eq!(mapping.lookup("article", "title"), None);

        assert!("book:title".parse::<CrossrefMapping>().is_err());
        assert!(":title>booktitle".parse::<CrossrefMapping>().is_err());
        Ok(())
    }

    #[test]
    fn test_biblatex_table_is_well_formed() -> Result<(), Box<dyn error::Error>> {
        let parsed = CrossrefMapping::from_str(BIBLATEX_MAPPING)?;
        assert_eq!(parsed, CrossrefMapping::biblatex());
        assert!(!parsed.is_empty());
        Ok(())
    }

    #[test]
    fn test_crossref_fan_out() {
        let mut file = File::new();
        let mut parent = Entry::new("book", "b");
        parent.insert("title", text("Collected Works"));
        parent.insert("author", Value::from(ValueItem::Person(Person::new("Jane", "Doe", ""))));
        parent.insert("publisher", text("ACME"));
        parent.insert("sortkey", text("zzz"));
        file.push(parent);
        let mut child = Entry::new("inbook", "c");
        child.insert("title", text("Chapter One"));
        child.insert("crossref", verbatim("b"));
        file.push(child.clone());

        let resolved = resolve_crossref(&child, &file, &CrossrefMapping::biblatex());
        assert_eq!(resolved.plain_text("title"), Some("Chapter One".to_string()));
        assert_eq!(resolved.plain_text("booktitle"), Some("Collected Works".to_string()));
        assert_eq!(resolved.plain_text("author"), Some("Jane Doe".to_string()));
        assert_eq!(resolved.plain_text("bookauthor"), Some("Jane Doe".to_string()));
        assert_eq!(resolved.plain_text("publisher"), Some("ACME".to_string()));
        assert!(!resolved.contains("sortkey"));
        assert!(!resolved.contains("crossref"));
        // source stays untouched
        assert!(child.contains("crossref"));
    }

    #[test]
    fn test_idempotent() {
        let mut file = File::new();
        let mut parent = Entry::new("proceedings", "p");
        parent.insert("title", text("Proc. of Things"));
        parent.insert("year", text("1999"));
        file.push(parent);
        let mut child = Entry::new("inproceedings", "c");
        child.insert("crossref", verbatim("p"));
        child.insert("year", text("2000"));

        let mapping = CrossrefMapping::biblatex();
        let once = resolve_crossref(&child, &file, &mapping);
        let twice = resolve_crossref(&once, &file, &mapping);
        assert_eq!(once, twice);
        assert_eq!(once.plain_text("year"), Some("2000".to_string()));
        assert_eq!(once.plain_text("booktitle"), Some("Proc. of Things".to_string()));
    }

    #[test]
    fn test_xdata_cycle() {
        let mut file = File::new();
        let mut a = Entry::new("xdata", "A");
        a.insert("xdata", verbatim("B"));
        a.insert("publisher", text("ACME"));
        let mut b = Entry::new("xdata", "B");
        b.insert("xdata", verbatim("A"));
        b.insert("location", text("Springfield"));
        b.insert("publisher", text("Other"));
        file.push(a.clone());
        file.push(b);

        let resolved = resolve_crossref(&a, &file, &CrossrefMapping::default());
        assert_eq!(resolved.plain_text("publisher"), Some("ACME".to_string()));
        assert_eq!(resolved.plain_text("location"), Some("Springfield".to_string()));
        assert!(!resolved.contains("xdata"));
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_xdata_chain() {
        let mut file = File::new();
        let mut first = Entry::new("xdata", "d1");
        first.insert("xdata", verbatim("d2"));
        first.insert("series", text("LNCS"));
        let mut second = Entry::new("xdata", "d2");
        second.insert("publisher", text("Springer"));
        file.push(first);
        file.push(second);
        let mut article = Entry::new("article", "x");
        article.insert("xdata", verbatim("d1, missing"));

        let resolved = resolve_crossref(&article, &file, &CrossrefMapping::default());
        assert_eq!(resolved.plain_text("series"), Some("LNCS".to_string()));
        assert_eq!(resolved.plain_text("publisher"), Some("Springer".to_string()));
    }
}
