use std::collections::HashSet;
use std::convert::Infallible;
use std::mem;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Config, FieldClass};
use crate::entry::{Comment, CommentContext, Element, Entry, Macro, Preamble};
use crate::errors::{Diagnostic, DiagnosticKind, LoadError, SyntaxError};
use crate::file::{unique_id, File};
use crate::keywords;
use crate::latex;
use crate::lexer::{Scanner, Token, TokenInfo};
use crate::names;
use crate::statistics::Statistics;
use crate::value::{Value, ValueItem};

static PAGE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-+\s*").unwrap());
static URL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*;+\s*").unwrap());
static DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)10(\.[0-9]+)+/[-/a-z0-9.()<>_:\\]+").unwrap());
static ENCODING_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@comment\s*[{(]\s*x-kbibtex-encoding\s*=\s*([^\s})]+)").unwrap());
static ENCODING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*%\s*encoding:\s*(\S+)\s*$").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Placeholder for entries written without an id
const EMPTY_ID: &str = "EmptyId";

/// Find an encoding directive within the ASCII prefix of `data`
fn sniff_encoding(data: &[u8]) -> Option<String> {
    let end = data.iter().position(|b| *b >= 0x80).unwrap_or(data.len());
    let prefix = str::from_utf8(&data[..end]).ok()?;
    ENCODING_COMMENT
        .captures(prefix)
        .or_else(|| ENCODING_LINE.captures(prefix))
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_lowercase())
}

fn is_known_encoding(name: &str) -> bool {
    name == "latex" || encoding_rs::Encoding::for_label(name.as_bytes()).is_some()
}

/// Parser reading the text of a `.bib` file into [`Element`]s
///
/// ```rust
/// use bibkit::Parser;
/// use std::str::FromStr;
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut p = Parser::from_str(r#"@book{tolkien1937, author = {J. R. R. Tolkien}}"#)?;
///     let file = p.parse_file()?;
///     assert_eq!(file.entries().count(), 1);
///     assert!(p.diagnostics().is_empty());
///     Ok(())
/// }
/// ```
pub struct Parser<'c> {
    src: String,
    config: &'c Config,
    cancel: Option<Arc<AtomicBool>>,
    diagnostics: Vec<Diagnostic>,
    statistics: Statistics,
}

impl Parser<'static> {
    /// Use a string as source for the parsing process.
    pub fn from_string(data: String) -> Parser<'static> {
        Parser {
            src: data,
            config: Config::global(),
            cancel: None,
            diagnostics: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    /// Use raw bytes as source. The codec is taken from an encoding
    /// directive before the first non-ASCII byte, UTF-8 otherwise.
    pub fn from_bytes(data: &[u8]) -> Parser<'static> {
        let encoding = sniff_encoding(data)
            .and_then(|name| encoding_rs::Encoding::for_label(name.as_bytes()))
            .unwrap_or(encoding_rs::UTF_8);
        let (src, _, malformed) = encoding.decode(data);
        if malformed {
            debug!("malformed {} sequences replaced", encoding.name());
        }
        Parser::from_string(src.into_owned())
    }
}

impl<'c> Parser<'c> {
    /// Use another configuration than [`Config::global`]
    pub fn with_config<'n>(self, config: &'n Config) -> Parser<'n> {
        Parser {
            src: self.src,
            config,
            cancel: self.cancel,
            diagnostics: self.diagnostics,
            statistics: self.statistics,
        }
    }

    /// Stop loading once `flag` is set. The flag is checked before each element.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Iterate over the elements. Every call starts over from the beginning
    /// and resets diagnostics and statistics.
    pub fn iter(&mut self) -> Elements<'_> {
        let Parser {
            src,
            config,
            cancel,
            diagnostics,
            statistics,
        } = self;
        diagnostics.clear();
        *statistics = Statistics::default();
        Elements {
            scanner: Scanner::new(src.as_str()),
            config: *config,
            cancel: cancel.as_deref(),
            diagnostics,
            statistics,
            known_ids: HashSet::new(),
            pending_at: false,
            finished: false,
        }
    }

    /// Parse the whole source into a [`File`] whose properties reflect the
    /// style of the source. Only cancellation makes this fail; problems
    /// with single elements end up in [`Parser::diagnostics`].
    pub fn parse_file(&mut self) -> Result<File, LoadError> {
        info!("parsing {} bytes", self.src.len());
        let mut file = File::new();
        for element in self.iter() {
            file.push_unique(element?);
        }
        file.properties = self.statistics.reduce();
        info!(
            "parsed {} elements with {} diagnostics",
            file.len(),
            self.diagnostics.len()
        );
        Ok(file)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

impl str::FromStr for Parser<'static> {
    type Err = Infallible;

    /// Use a string as source for the parsing process.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(Parser::from_string(data.to_string()))
    }
}

/// Syntactic form a value part was written in
enum Part {
    Braced(String),
    Quoted(String),
    Bare(String),
}

/// What reading one top-level construct resulted in
enum Step {
    Element(Element),
    /// consumed without producing an element, e.g. an encoding directive
    Skipped,
    End,
}

/// A stateful iterator yielding one Element after another
pub struct Elements<'p> {
    scanner: Scanner<'p>,
    config: &'p Config,
    cancel: Option<&'p AtomicBool>,
    diagnostics: &'p mut Vec<Diagnostic>,
    statistics: &'p mut Statistics,
    known_ids: HashSet<String>,
    pending_at: bool,
    finished: bool,
}

impl<'p> Elements<'p> {
    fn diagnose(&mut self, kind: DiagnosticKind, info: &TokenInfo, message: String) {
        match kind {
            DiagnosticKind::Structural | DiagnosticKind::Encoding => warn!("{}", message),
            _ => debug!("{}", message),
        }
        self.diagnostics.push(Diagnostic::new(kind, info, message));
    }

    fn next_element(&mut self) -> Result<Step, SyntaxError> {
        self.scanner.current_id = None;
        let token = if mem::take(&mut self.pending_at) {
            Token::At
        } else {
            self.scanner.next_token()
        };
        match token {
            Token::At => self.read_at_construct(),
            Token::EndOfFile => Ok(Step::End),
            Token::Unknown('%') => Ok(self.read_percent_comment()),
            Token::Unknown(_) => Ok(self.read_verbatim_comment(String::new())),
            Token::BracketOpen(c) | Token::BracketClose(c) => {
                Ok(self.read_verbatim_comment(c.to_string()))
            }
            Token::Comma => Ok(self.read_verbatim_comment(",".to_string())),
            Token::Assign => Ok(self.read_verbatim_comment("=".to_string())),
            Token::Doublecross => Ok(self.read_verbatim_comment("#".to_string())),
        }
    }

    fn read_at_construct(&mut self) -> Result<Step, SyntaxError> {
        let kind = self.scanner.read_simple_string();
        trace!("reading @{}", kind);
        match kind.to_lowercase().as_str() {
            "comment" => self.read_comment_command(),
            "string" => self.read_macro(),
            "preamble" => self.read_preamble(),
            "import" => {
                self.scanner.skip_white_char();
                if matches!(self.scanner.peek(), Some('{') | Some('(')) {
                    self.scanner.read_bracket_string()?;
                } else {
                    self.scanner.read_line();
                }
                debug!("discarded @import at line {}", self.scanner.info().lineno);
                Ok(Step::Skipped)
            }
            "" => {
                let info = self.scanner.info();
                let found = self.scanner.next_token();
                Err(SyntaxError::UnexpectedToken {
                    found,
                    action: "reading element type",
                    info,
                })
            }
            _ => self.read_entry(kind),
        }
    }

    fn record_encoding(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        if is_known_encoding(&name) {
            self.statistics.encoding = Some(name);
        } else {
            let info = self.scanner.info();
            self.diagnose(
                DiagnosticKind::Encoding,
                &info,
                format!("unknown encoding '{name}', using UTF-8"),
            );
        }
    }

    /// Consecutive lines starting with `%`
    fn read_percent_comment(&mut self) -> Step {
        let mut lines = Vec::new();
        loop {
            let line = self.scanner.read_line();
            let directive = ENCODING_LINE
                .captures(&line)
                .and_then(|c| c.get(1))
                .map(|name| name.as_str().to_string());
            match directive {
                Some(name) => self.record_encoding(&name),
                None => lines.push(line),
            }
            if !self.scanner.rest().trim_start_matches([' ', '\t']).starts_with('%') {
                break;
            }
            self.scanner.skip_white_char();
        }
        if lines.is_empty() {
            return Step::Skipped;
        }
        let prefix = if lines.iter().all(|line| line.starts_with("% ")) { "% " } else { "%" };
        let text = lines
            .iter()
            .map(|line| line.strip_prefix(prefix).unwrap_or(line))
            .collect::<Vec<_>>()
            .join("\n");
        let context = CommentContext::Prefix(prefix.to_string());
        self.statistics.count_comment(&context);
        Step::Element(Comment::new(&text, context).into())
    }

    /// Stray text up to an `@`, a blank line or a line starting with `%`
    fn read_verbatim_comment(&mut self, mut text: String) -> Step {
        loop {
            while let Some(chr) = self.scanner.peek() {
                if chr == '@' || chr == '\n' {
                    break;
                }
                if chr != '\r' {
                    text.push(chr);
                }
                self.scanner.read_char();
            }
            if self.scanner.peek() != Some('\n') {
                break;
            }
            self.scanner.read_char();
            let next_line = self.scanner.rest().split('\n').next().unwrap_or_default().trim();
            if next_line.is_empty() || next_line.starts_with('%') || next_line.starts_with('@') {
                break;
            }
            text.push('\n');
        }
        let text = text.trim_end();
        if text.is_empty() {
            return Step::Skipped;
        }
        self.statistics.count_comment(&CommentContext::Verbatim);
        Step::Element(Comment::new(text, CommentContext::Verbatim).into())
    }

    fn read_comment_command(&mut self) -> Result<Step, SyntaxError> {
        self.scanner.skip_white_char();
        if !matches!(self.scanner.peek(), Some('{') | Some('(')) {
            let text = self.scanner.read_line();
            self.statistics.count_comment(&CommentContext::Command);
            return Ok(Step::Element(Comment::new(text.trim(), CommentContext::Command).into()));
        }
        let text = self.scanner.read_bracket_string()?;
        let trimmed = text.trim();
        if trimmed.to_lowercase().starts_with("x-kbibtex-encoding=") {
            let name = &trimmed["x-kbibtex-encoding=".len()..];
            self.record_encoding(name);
            return Ok(Step::Skipped);
        }
        self.statistics.count_comment(&CommentContext::Command);
        Ok(Step::Element(Comment::new(&text, CommentContext::Command).into()))
    }

    fn expect_open(&mut self, action: &'static str) -> Result<(), SyntaxError> {
        let info = self.scanner.info();
        match self.scanner.next_token() {
            Token::BracketOpen(_) => Ok(()),
            Token::EndOfFile => Err(SyntaxError::UnexpectedEof { action, info }),
            found => Err(SyntaxError::UnexpectedToken { found, action, info }),
        }
    }

    fn expect_close(&mut self, token: Token, action: &'static str) -> Result<(), SyntaxError> {
        let info = self.scanner.info();
        match token {
            Token::BracketClose(_) => Ok(()),
            Token::EndOfFile => Err(SyntaxError::UnexpectedEof { action, info }),
            found => Err(SyntaxError::UnexpectedToken { found, action, info }),
        }
    }

    /// Read `PART ('#' PART)*` and return the parts plus the token
    /// following the value
    fn read_parts(&mut self) -> Result<(Vec<Part>, Token), SyntaxError> {
        let mut parts = Vec::new();
        loop {
            if !self.scanner.skip_white_char() {
                return Err(SyntaxError::UnexpectedEof {
                    action: "reading value",
                    info: self.scanner.info(),
                });
            }
            let part = match self.scanner.peek() {
                Some('{') => {
                    self.statistics.braced_values += 1;
                    Part::Braced(self.scanner.read_bracket_string()?)
                }
                Some('(') => Part::Braced(self.scanner.read_bracket_string()?),
                Some('"') => {
                    self.statistics.quoted_values += 1;
                    Part::Quoted(self.scanner.read_quoted_string()?)
                }
                _ => {
                    let word = self.scanner.read_simple_string();
                    if word.is_empty() {
                        let info = self.scanner.info();
                        let found = self.scanner.next_token();
                        return Err(SyntaxError::UnexpectedToken {
                            found,
                            action: "reading value",
                            info,
                        });
                    }
                    Part::Bare(word)
                }
            };
            parts.push(part);
            match self.scanner.next_token() {
                Token::Doublecross => continue,
                token => return Ok((parts, token)),
            }
        }
    }

    fn read_macro(&mut self) -> Result<Step, SyntaxError> {
        self.expect_open("reading @string")?;
        let key = self.scanner.read_simple_string();
        let info = self.scanner.info();
        match self.scanner.next_token() {
            Token::Assign if !key.is_empty() => {}
            found => {
                return Err(SyntaxError::UnexpectedToken {
                    found,
                    action: "reading @string key",
                    info,
                })
            }
        }
        let (parts, token) = self.read_parts()?;
        self.expect_close(token, "reading @string")?;
        let value = parts
            .into_iter()
            .map(|part| match part {
                Part::Bare(word) => ValueItem::MacroKey(word),
                Part::Braced(raw) | Part::Quoted(raw) => ValueItem::PlainText(latex::decode(&raw)),
            })
            .collect();
        Ok(Step::Element(Macro::new(&key, value).into()))
    }

    fn read_preamble(&mut self) -> Result<Step, SyntaxError> {
        self.expect_open("reading @preamble")?;
        let (parts, token) = self.read_parts()?;
        self.expect_close(token, "reading @preamble")?;
        let value = parts
            .into_iter()
            .map(|part| match part {
                Part::Bare(word) => ValueItem::MacroKey(word),
                Part::Braced(raw) | Part::Quoted(raw) => ValueItem::VerbatimText(raw),
            })
            .collect();
        Ok(Step::Element(Preamble { value }.into()))
    }

    fn read_entry(&mut self, kind: String) -> Result<Step, SyntaxError> {
        self.expect_open("reading entry")?;
        let info = self.scanner.info();
        let raw_id = self.scanner.read_id();
        self.scanner.current_id = Some(raw_id.clone());

        // reported only if the entry is read completely
        let mut warnings = Vec::new();
        let mut id = if raw_id.is_ascii() {
            raw_id
        } else {
            let ascii = latex::to_ascii(&raw_id);
            warnings.push(format!("non-ASCII id '{raw_id}' transliterated to '{ascii}'"));
            ascii
        };
        if id.is_empty() {
            id = EMPTY_ID.to_string();
        }
        if self.known_ids.contains(&id) {
            let renamed = unique_id(&id, |candidate| self.known_ids.contains(candidate));
            warnings.push(format!("duplicate id '{id}' renamed to '{renamed}'"));
            id = renamed;
        }

        let mut entry = Entry::new(&kind, &id);
        let mut token = self.scanner.next_token();
        loop {
            match token {
                Token::BracketClose(_) => break,
                Token::Comma => {}
                Token::EndOfFile => {
                    return Err(SyntaxError::UnexpectedEof {
                        action: "reading entry",
                        info: self.scanner.info(),
                    })
                }
                found => {
                    return Err(SyntaxError::UnexpectedToken {
                        found,
                        action: "reading entry",
                        info: self.scanner.info(),
                    })
                }
            }
            let name = self.scanner.read_simple_string();
            let field_info = self.scanner.info();
            if name.is_empty() {
                // tolerate a trailing comma
                match self.scanner.next_token() {
                    Token::BracketClose(_) => break,
                    Token::EndOfFile => {
                        return Err(SyntaxError::UnexpectedEof {
                            action: "reading field name",
                            info: field_info,
                        })
                    }
                    found => {
                        return Err(SyntaxError::UnexpectedToken {
                            found,
                            action: "reading field name",
                            info: field_info,
                        })
                    }
                }
            }
            match self.scanner.next_token() {
                Token::Assign => {}
                found => {
                    return Err(SyntaxError::UnexpectedToken {
                        found,
                        action: "reading field",
                        info: field_info,
                    })
                }
            }
            let (parts, next) = self.read_parts()?;
            self.add_field(&mut entry, name, parts, &field_info, &mut warnings);
            token = next;
        }

        for message in warnings {
            self.diagnose(DiagnosticKind::Structural, &info, message);
        }
        self.known_ids.insert(entry.id.clone());
        Ok(Step::Element(entry.into()))
    }

    fn add_field(
        &mut self,
        entry: &mut Entry,
        name: String,
        parts: Vec<Part>,
        info: &TokenInfo,
        warnings: &mut Vec<String>,
    ) {
        let mut name = if name.is_ascii() {
            name
        } else {
            let ascii = latex::to_ascii(&name);
            warnings.push(format!("non-ASCII field name '{name}' transliterated to '{ascii}'"));
            ascii
        };
        let class = self.config.field_class(&name);
        let value = self.field_value(class, parts, info);

        if let Some(existing) = entry.value_mut(&name) {
            // repeated multi-valued fields are merged
            if matches!(
                class,
                FieldClass::Person | FieldClass::Keywords | FieldClass::Url | FieldClass::File
            ) {
                existing.extend(value);
                return;
            }
            let mut counter = 2;
            while entry.contains(&format!("{name}{counter}")) {
                counter += 1;
            }
            let renamed = format!("{name}{counter}");
            warnings.push(format!("duplicate field '{name}' renamed to '{renamed}'"));
            name = renamed;
        }
        entry.insert(&name, value);
    }

    /// Turn the parts of one field into typed value items
    fn field_value(&mut self, class: FieldClass, parts: Vec<Part>, info: &TokenInfo) -> Value {
        let mut value = Value::new();
        for part in parts {
            let raw = match part {
                Part::Bare(word) => {
                    if is_number(&word) {
                        self.statistics.bare_numbers += 1;
                    }
                    value.push(bare_item(class, word));
                    continue;
                }
                Part::Braced(raw) | Part::Quoted(raw) => raw,
            };
            if is_number(raw.trim()) {
                self.statistics.delimited_numbers += 1;
            }
            match class {
                FieldClass::Person => {
                    let list = names::parse_person_list(&latex::decode(&raw));
                    if list.items.iter().any(|item| matches!(item, ValueItem::Person(_))) {
                        self.statistics.count_names(list.comma_ordered);
                    }
                    for name in list.ambiguous.iter() {
                        self.diagnose(
                            DiagnosticKind::AmbiguousHeuristic,
                            info,
                            format!("cannot tell first from last name in '{name}'"),
                        );
                    }
                    value.extend(list.items);
                }
                FieldClass::Pages => {
                    let text = latex::decode(&raw);
                    value.push(ValueItem::PlainText(PAGE_RANGE.replace_all(&text, "–").into_owned()));
                }
                FieldClass::Url => value.extend(
                    URL_SEPARATOR
                        .split(raw.trim())
                        .filter(|url| !url.is_empty())
                        .map(|url| ValueItem::VerbatimText(url.to_string())),
                ),
                FieldClass::File => value.extend(
                    URL_SEPARATOR
                        .split(raw.trim())
                        .filter(|file| !file.is_empty())
                        .map(|file| ValueItem::VerbatimText(decode_file_link(file))),
                ),
                FieldClass::Doi => {
                    let dois: Vec<ValueItem> = DOI
                        .find_iter(&raw)
                        .map(|doi| ValueItem::VerbatimText(doi.as_str().to_string()))
                        .collect();
                    if dois.is_empty() {
                        self.diagnose(
                            DiagnosticKind::AmbiguousHeuristic,
                            info,
                            format!("no DOI found in '{raw}'"),
                        );
                        value.push(ValueItem::PlainText(latex::decode(&raw)));
                    } else {
                        value.extend(dois);
                    }
                }
                FieldClass::Keywords => {
                    let split = keywords::split_keywords(&latex::decode(&raw));
                    if let Some(separator) = split.list_separator() {
                        self.statistics.list_separator = Some(separator.to_string());
                    }
                    value.extend(split.keywords.into_iter().map(ValueItem::Keyword));
                }
                FieldClass::Verbatim => value.push(ValueItem::VerbatimText(raw)),
                FieldClass::Title => {
                    self.statistics.count_title(latex::is_brace_protected(&raw));
                    value.push(ValueItem::PlainText(latex::decode(&raw)));
                }
                FieldClass::Month | FieldClass::Plain => {
                    value.push(ValueItem::PlainText(latex::decode(&raw)))
                }
            }
        }
        value
    }
}

/// Item for an undelimited part: numbers are text, anything else refers
/// to a macro. Month names are reduced to the predefined macros.
fn is_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn bare_item(class: FieldClass, word: String) -> ValueItem {
    if is_number(&word) {
        return ValueItem::PlainText(word);
    }
    if class == FieldClass::Month {
        let prefix: String = word.chars().take(3).collect::<String>().to_lowercase();
        if MONTHS.contains(&prefix.as_str()) {
            return ValueItem::MacroKey(prefix);
        }
    }
    ValueItem::MacroKey(word)
}

/// JabRef and Mendeley store files as `description:path:type` with
/// escaped colons (Mendeley also drops the leading slash). Anything else
/// is returned unchanged.
fn decode_file_link(link: &str) -> String {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = link.chars().peekable();
    while let Some(chr) = chars.next() {
        match chr {
            '\\' if chars.peek() == Some(&':') => {
                chars.next();
                current.push(':');
            }
            ':' => fields.push(mem::take(&mut current)),
            _ => current.push(chr),
        }
    }
    fields.push(current);
    if fields.len() != 3 {
        return link.to_string();
    }
    let path = fields[1].replace("$\\backslash$", "\\");
    let has_drive = path.chars().nth(1) == Some(':');
    if fields[0].is_empty() && !path.starts_with('/') && !has_drive {
        format!("/{path}")
    } else {
        path
    }
}

impl<'p> Iterator for Elements<'p> {
    type Item = Result<Element, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                info!("loading cancelled at line {}", self.scanner.info().lineno);
                self.finished = true;
                return Some(Err(LoadError::Cancelled));
            }
            match self.next_element() {
                Ok(Step::Element(element)) => return Some(Ok(element)),
                Ok(Step::Skipped) => continue,
                Ok(Step::End) => self.finished = true,
                Err(err) => {
                    let at = matches!(err.found(), Some(Token::At));
                    let diagnostic = Diagnostic::from(err);
                    debug!("{}", diagnostic);
                    self.diagnostics.push(diagnostic);
                    if at {
                        self.pending_at = true;
                    } else {
                        self.scanner.read_char_until(&['@']);
                    }
                }
            }
        }
    }
}
