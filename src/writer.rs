//! Serialization of a [`File`] back to BibTeX text.
//!
//! Style decisions (delimiters, name order, keyword separator, casing
//! protection, encoding) are taken from [`FileProperties`], so writing an
//! unmodified parsed file reproduces the style of its source.

use std::borrow::Cow;
use std::fmt::{self, Write};

use crate::config::{Config, FieldClass};
use crate::entry::{Comment, CommentContext, Element, Entry};
use crate::file::{CasingProtection, File, FileProperties, StringDelimiter};
use crate::latex;
use crate::value::{Value, ValueItem};

/// Spelling of entry types and field names in the output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Casing {
    /// as stored in the entry
    #[default]
    AsIs,
    Lowercase,
    /// as given in [`Config`], e.g. “InProceedings” or “DOI”
    Canonical,
}

pub struct Writer<'c> {
    config: &'c Config,
    casing: Casing,
}

impl Default for Writer<'static> {
    fn default() -> Self {
        Writer {
            config: Config::global(),
            casing: Casing::default(),
        }
    }
}

/// Does `text` contain a double quote outside of curly braces?
fn has_unbraced_quote(text: &str) -> bool {
    let mut level = 0usize;
    let mut escape = false;
    for chr in text.chars() {
        if !escape {
            match chr {
                '{' => level += 1,
                '}' => level = level.saturating_sub(1),
                '"' if level == 0 => return true,
                _ => {}
            }
        }
        escape = chr == '\\' && !escape;
    }
    false
}

fn delimit(text: &str, properties: &FileProperties) -> String {
    match properties.string_delimiter {
        StringDelimiter::Quotes if !has_unbraced_quote(text) => format!("\"{text}\""),
        _ => format!("{{{text}}}"),
    }
}

impl Writer<'static> {
    pub fn new() -> Writer<'static> {
        Writer::default()
    }
}

impl<'c> Writer<'c> {
    pub fn with_config<'n>(self, config: &'n Config) -> Writer<'n> {
        Writer {
            config,
            casing: self.casing,
        }
    }

    pub fn with_casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }

    fn type_name<'a>(&'a self, kind: &'a str) -> Cow<'a, str> {
        match self.casing {
            Casing::AsIs => Cow::Borrowed(kind),
            Casing::Lowercase => Cow::Owned(kind.to_lowercase()),
            Casing::Canonical => Cow::Borrowed(self.config.canonical_type(kind)),
        }
    }

    fn field_name<'a>(&'a self, name: &'a str) -> Cow<'a, str> {
        match self.casing {
            Casing::AsIs => Cow::Borrowed(name),
            Casing::Lowercase => Cow::Owned(name.to_lowercase()),
            Casing::Canonical => Cow::Borrowed(self.config.canonical_field(name)),
        }
    }

    /// Render a value as `part # part …`. `field` is the name of the field
    /// holding the value, if any.
    pub fn value_to_string(&self, value: &Value, field: Option<&str>, properties: &FileProperties) -> String {
        let ascii_only = properties.encoding.as_deref().map_or(true, |e| e == "latex");
        let class = field.map(|f| self.config.field_class(f));
        // the parser splits these fields on `;`, other verbatim parts were joined by `#`
        let merge_verbatim = matches!(class, Some(FieldClass::Url | FieldClass::File | FieldClass::Doi));
        let items = value.items();
        let mut parts = Vec::new();
        let mut i = 0;
        while i < items.len() {
            match &items[i] {
                ValueItem::Person(_) => {
                    let mut names = Vec::new();
                    while let Some(item) = items.get(i) {
                        match item {
                            ValueItem::Person(person) => {
                                names.push(latex::encode(&person.format(properties.name_format), ascii_only))
                            }
                            ValueItem::PlainText(text) if text == "others" => names.push(text.clone()),
                            _ => break,
                        }
                        i += 1;
                    }
                    parts.push(delimit(&names.join(" and "), properties));
                }
                ValueItem::Keyword(_) => {
                    let mut keywords = Vec::new();
                    while let Some(ValueItem::Keyword(keyword)) = items.get(i) {
                        keywords.push(latex::encode(keyword, ascii_only));
                        i += 1;
                    }
                    parts.push(delimit(&keywords.join(&properties.list_separator), properties));
                }
                ValueItem::VerbatimText(text) if !merge_verbatim => {
                    i += 1;
                    parts.push(delimit(text, properties));
                }
                ValueItem::VerbatimText(_) => {
                    let mut texts = Vec::new();
                    while let Some(ValueItem::VerbatimText(text)) = items.get(i) {
                        texts.push(text.as_str());
                        i += 1;
                    }
                    parts.push(delimit(&texts.join("; "), properties));
                }
                ValueItem::PlainText(text) => {
                    i += 1;
                    if properties.bare_numbers && !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                        parts.push(text.clone());
                        continue;
                    }
                    let mut encoded = latex::encode(text, ascii_only);
                    if class == Some(FieldClass::Title)
                        && items.len() == 1
                        && properties.protect_casing == CasingProtection::Always
                        && !latex::is_brace_protected(&encoded)
                    {
                        encoded = format!("{{{encoded}}}");
                    }
                    parts.push(delimit(&encoded, properties));
                }
                ValueItem::MacroKey(key) => {
                    i += 1;
                    parts.push(key.clone());
                }
            }
        }
        parts.join(" # ")
    }

    fn write_entry<W: Write>(&self, entry: &Entry, properties: &FileProperties, out: &mut W) -> fmt::Result {
        write!(out, "@{}{{{}", self.type_name(&entry.kind), entry.id)?;
        if entry.is_empty() {
            return out.write_char('}');
        }
        let fields: Vec<String> = entry
            .fields()
            .map(|(name, value)| {
                format!(
                    "\t{} = {}",
                    self.field_name(name),
                    self.value_to_string(value, Some(name), properties)
                )
            })
            .collect();
        write!(out, ",\n{}\n}}", fields.join(",\n"))
    }

    fn write_comment<W: Write>(&self, comment: &Comment, out: &mut W) -> fmt::Result {
        match &comment.context {
            CommentContext::Command => write!(out, "@comment{{{}}}", comment.text),
            CommentContext::Prefix(prefix) => {
                let lines: Vec<String> = comment
                    .text
                    .lines()
                    .map(|line| format!("{prefix}{line}").trim_end().to_string())
                    .collect();
                out.write_str(&lines.join("\n"))
            }
            CommentContext::Verbatim => out.write_str(&comment.text),
        }
    }

    pub fn write_element<W: Write>(&self, element: &Element, properties: &FileProperties, out: &mut W) -> fmt::Result {
        match element {
            Element::Entry(entry) => self.write_entry(entry, properties, out),
            Element::Macro(m) => write!(
                out,
                "@string{{{} = {}}}",
                m.key,
                self.value_to_string(&m.value, None, properties)
            ),
            Element::Preamble(preamble) => write!(
                out,
                "@preamble{{{}}}",
                self.value_to_string(&preamble.value, None, properties)
            ),
            Element::Comment(comment) => self.write_comment(comment, out),
        }
    }

    /// Write all elements separated by blank lines, preceded by an encoding
    /// directive unless the file is plain LaTeX-escaped ASCII
    pub fn write<W: Write>(&self, file: &File, out: &mut W) -> fmt::Result {
        let mut first = true;
        if let Some(encoding) = file.properties.encoding.as_deref().filter(|e| *e != "latex") {
            writeln!(out, "@comment{{x-kbibtex-encoding={encoding}}}")?;
            first = false;
        }
        for element in file.elements() {
            if !first {
                out.write_char('\n')?;
            }
            self.write_element(element, &file.properties, out)?;
            out.write_char('\n')?;
            first = false;
        }
        Ok(())
    }

    pub fn to_string(&self, file: &File) -> String {
        let mut out = String::new();
        // writing into a String never fails
        let _ = self.write(file, &mut out);
        out
    }

    /// Text encoded with the codec named in the file's properties, UTF-8
    /// if there is none
    pub fn to_bytes(&self, file: &File) -> Vec<u8> {
        let text = self.to_string(file);
        let encoding = file
            .properties
            .encoding
            .as_deref()
            .filter(|e| *e != "latex")
            .and_then(|e| encoding_rs::Encoding::for_label(e.as_bytes()));
        match encoding {
            Some(encoding) => encoding.encode(&text).0.into_owned(),
            None => text.into_bytes(),
        }
    }
}

/// Serialize `file` with the default writer
pub fn to_string(file: &File) -> String {
    Writer::default().to_string(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Macro;
    use crate::value::{NameFormat, Person};
    use std::error;

    fn plain(s: &str) -> ValueItem {
        ValueItem::PlainText(s.to_string())
    }

    fn sample() -> File {
        let mut file = File::new();
        let mut entry = Entry::new("article", "k1");
        entry.insert(
            "author",
            vec![
                ValueItem::Person(Person::new("Jane", "Doe", "")),
                ValueItem::Person(Person::new("Richard", "Roe", "Jr.")),
                plain("others"),
            ]
            .into(),
        );
        entry.insert("title", Value::from(plain("Über \"Quotes\"")));
        entry.insert("journal", vec![ValueItem::MacroKey("short".to_string()), plain(" Supplement")].into());
        entry.insert("keywords", ["a", "b"].iter().map(|k| ValueItem::Keyword(k.to_string())).collect());
        entry.insert("year", Value::from(plain("2020")));
        file.push(entry);
        file
    }

    #[test]
    fn test_entry_braces_last_first() {
        let file = sample();
        assert_eq!(
            to_string(&file),
            concat!(
                "@article{k1,\n",
                "\tauthor = {Doe, Jane and Roe, Richard, Jr. and others},\n",
                "\ttitle = {{\\\"U}ber \"Quotes\"},\n",
                "\tjournal = short # { Supplement},\n",
                "\tkeywords = {a; b},\n",
                "\tyear = 2020\n",
                "}\n"
            )
        );
    }

    #[test]
    fn test_quotes_first_last() {
        let mut file = sample();
        file.properties.string_delimiter = StringDelimiter::Quotes;
        file.properties.name_format = NameFormat::FirstLast;
        file.properties.list_separator = ", ".to_string();
        file.properties.encoding = Some("utf-8".to_string());
        let text = Writer::new().to_string(&file);
        assert!(text.starts_with("@comment{x-kbibtex-encoding=utf-8}\n\n@article{k1,\n"));
        assert!(text.contains("\tauthor = \"Jane Doe and Richard Roe Jr. and others\",\n"));
        // an unbraced quote forces braces
        assert!(text.contains("\ttitle = {Über \"Quotes\"},\n"));
        assert!(text.contains("\tkeywords = \"a, b\",\n"));
    }

    #[test]
    fn test_casing_protection_and_names() {
        let mut file = File::new();
        let mut entry = Entry::new("inproceedings", "p");
        entry.insert("Title", Value::from(plain("Deep Learning")));
        entry.insert("doi", Value::from(ValueItem::VerbatimText("10.1/x".to_string())));
        file.push(entry);
        file.properties.protect_casing = CasingProtection::Always;
        let text = Writer::new().with_casing(Casing::Canonical).to_string(&file);
        assert_eq!(text, "@InProceedings{p,\n\tTitle = {{Deep Learning}},\n\tDOI = {10.1/x}\n}\n");
        let text = Writer::new().with_casing(Casing::Lowercase).to_string(&file);
        assert!(text.starts_with("@inproceedings{p,\n\ttitle = {{Deep Learning}},"));
    }

    #[test]
    fn test_other_elements() {
        let mut file = File::new();
        file.push(Comment::new("first\nsecond", CommentContext::Prefix("% ".to_string())));
        file.push(Macro::new("tug", Value::from(plain("TeX Users & Group"))));
        file.push(Comment::new("jabref-meta: x", CommentContext::Command));
        file.push(Entry::new("misc", "empty"));
        assert_eq!(
            to_string(&file),
            "% first\n% second\n\n@string{tug = {TeX Users \\& Group}}\n\n@comment{jabref-meta: x}\n\n@misc{empty}\n"
        );
    }

    #[test]
    fn test_verbatim_parts() {
        let writer = Writer::new();
        let properties = FileProperties::default();
        let verbatim = |s: &str| ValueItem::VerbatimText(s.to_string());
        let parts: Value = vec![verbatim(r"\newcommand{\a}{A}"), verbatim(r"\newcommand{\b}{B}")].into();
        assert_eq!(
            writer.value_to_string(&parts, None, &properties),
            r"{\newcommand{\a}{A}} # {\newcommand{\b}{B}}"
        );
        assert_eq!(
            writer.value_to_string(&parts, Some("note"), &properties),
            r"{\newcommand{\a}{A}} # {\newcommand{\b}{B}}"
        );
        let urls: Value = vec![verbatim("https://a.org"), verbatim("https://b.org")].into();
        assert_eq!(
            writer.value_to_string(&urls, Some("url"), &properties),
            "{https://a.org; https://b.org}"
        );
    }

    #[test]
    fn test_delimited_numbers() {
        let mut file = sample();
        file.properties.bare_numbers = false;
        assert!(to_string(&file).contains("\tyear = {2020}\n"));
    }

    #[test]
    fn test_to_bytes() -> Result<(), Box<dyn error::Error>> {
        let mut file = File::new();
        let mut entry = Entry::new("misc", "m");
        entry.insert("title", Value::from(plain("Café")));
        file.push(entry);
        file.properties.encoding = Some("iso-8859-1".to_string());
        let bytes = Writer::new().to_bytes(&file);
        assert!(bytes.windows(4).any(|w| w == [b'C', b'a', b'f', 0xe9]));
        file.properties.encoding = None;
        let text = String::from_utf8(Writer::new().to_bytes(&file))?;
        assert!(text.contains("{Caf{\\'e}}"));
        Ok(())
    }
}
