use std::fmt;

use crate::errors::SyntaxError;

/// A token is one lexical unit read from the bib file.
/// Remember, that bib file entry looks as follows:
///
/// ```tex
/// @Book{works:4,
///   author     = {Shakespeare, William},
///   title      = "Sonnets" # { and more},
/// }
/// ```
///
/// Only the structural characters are tokens. Words, ids and delimited
/// strings are read by the parser through the dedicated `read_*` methods of
/// [`Scanner`], since how to read them depends on the grammatical context.
/// Be aware that Token is just the data contract between scanner and parser
/// and not meant to be externally visible.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    At,
    BracketOpen(char),
    BracketClose(char),
    Comma,
    Assign,
    Doublecross,
    EndOfFile,
    /// The scanner stays positioned on this character, it is not consumed
    Unknown(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At => write!(f, "'@'"),
            Self::BracketOpen(c) | Self::BracketClose(c) => write!(f, "'{c}'"),
            Self::Comma => write!(f, "','"),
            Self::Assign => write!(f, "'='"),
            Self::Doublecross => write!(f, "'#'"),
            Self::EndOfFile => write!(f, "end of file"),
            Self::Unknown(c) => write!(f, "character '{c}'"),
        }
    }
}

/// Additional source code information attached to a Token
/// for improved error messages
#[derive(Clone, Debug)]
pub(crate) struct TokenInfo {
    pub(crate) lineno: usize,
    pub(crate) colno: usize,
    pub(crate) current_line: String,
    pub(crate) current_id: Option<String>,
}

/// Characters besides alphanumerics that may occur in bare words
const EXTRA_WORD_CHARS: &str = "?'`-_:.+/$\\&";

fn is_white(chr: char) -> bool {
    matches!(chr, ' ' | '\t' | '\r' | '\n')
}

/// Character reader with one character of lookahead over an in-memory source
pub(crate) struct Scanner<'s> {
    src: &'s str,
    pos: usize, // byte offset of `next_char`
    next_char: Option<char>,
    lineno: usize,     // 1-based
    colno: usize,      // 0-based column of `next_char`
    line_start: usize, // byte offset where the current line starts
    pub(crate) current_id: Option<String>, // the ID of the current entry, e.g. “DBLP:books/lib/Knuth97”
}

impl<'s> Scanner<'s> {
    pub(crate) fn new(src: &'s str) -> Scanner<'s> {
        Scanner {
            src,
            pos: 0,
            next_char: src.chars().next(),
            lineno: 1,
            colno: 0,
            line_start: 0,
            current_id: None,
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.next_char
    }

    /// Unread part of the source, starting at the lookahead character
    pub(crate) fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    /// Consume the lookahead character. Returns false once the end of the
    /// source has been reached.
    pub(crate) fn read_char(&mut self) -> bool {
        let Some(chr) = self.next_char else {
            return false;
        };
        self.pos += chr.len_utf8();
        if chr == '\n' {
            self.lineno += 1;
            self.colno = 0;
            self.line_start = self.pos;
        } else {
            self.colno += 1;
        }
        self.next_char = self.src[self.pos..].chars().next();
        self.next_char.is_some()
    }

    /// Skip spaces, tabs and line breaks. Returns false at the end of the source.
    pub(crate) fn skip_white_char(&mut self) -> bool {
        while let Some(chr) = self.next_char {
            if !is_white(chr) {
                return true;
            }
            self.read_char();
        }
        false
    }

    /// Advance until the lookahead character is one of `until`.
    /// Returns false if the end of the source is reached first.
    pub(crate) fn read_char_until(&mut self, until: &[char]) -> bool {
        while let Some(chr) = self.next_char {
            if until.contains(&chr) {
                return true;
            }
            self.read_char();
        }
        false
    }

    /// Read the remainder of the current line and consume its line break
    pub(crate) fn read_line(&mut self) -> String {
        let mut line = String::new();
        while let Some(chr) = self.next_char {
            self.read_char();
            if chr == '\n' {
                break;
            }
            line.push(chr);
        }
        if line.ends_with('\r') {
            line.pop();
        }
        line
    }

    pub(crate) fn current_line(&self) -> &'s str {
        let line = &self.src[self.line_start..];
        line.split('\n').next().unwrap_or_default().trim_end_matches('\r')
    }

    pub(crate) fn info(&self) -> TokenInfo {
        TokenInfo {
            lineno: self.lineno,
            colno: self.colno,
            current_line: self.current_line().to_string(),
            current_id: self.current_id.clone(),
        }
    }

    /// Classify the next token. Structural characters are consumed,
    /// anything else (including a comment-starting '%') is left in place.
    pub(crate) fn next_token(&mut self) -> Token {
        if !self.skip_white_char() {
            return Token::EndOfFile;
        }
        let Some(chr) = self.next_char else {
            return Token::EndOfFile;
        };
        let token = match chr {
            '@' => Token::At,
            '{' | '(' => Token::BracketOpen(chr),
            '}' | ')' => Token::BracketClose(chr),
            ',' => Token::Comma,
            '=' => Token::Assign,
            '#' => Token::Doublecross,
            _ => return Token::Unknown(chr),
        };
        self.read_char();
        token
    }

    /// Read a bare word like an entry type, a field name, a macro key or an
    /// undelimited value such as `2020`
    pub(crate) fn read_simple_string(&mut self) -> String {
        let mut result = String::new();
        if !self.skip_white_char() {
            return result;
        }
        while let Some(chr) = self.next_char {
            if chr.is_alphanumeric() || EXTRA_WORD_CHARS.contains(chr) {
                result.push(chr);
                self.read_char();
            } else {
                break;
            }
        }
        result
    }

    /// Read an entry id, which extends up to the next comma, closing bracket
    /// or whitespace
    pub(crate) fn read_id(&mut self) -> String {
        let mut result = String::new();
        if !self.skip_white_char() {
            return result;
        }
        while let Some(chr) = self.next_char {
            if is_white(chr) || matches!(chr, ',' | '}' | ')' | '{' | '(' | '=') {
                break;
            }
            result.push(chr);
            self.read_char();
        }
        result
    }

    /// Read a string enclosed in `{…}` or `(…)`. The lookahead character must
    /// be the opening bracket. Returns the content without the outer brackets.
    pub(crate) fn read_bracket_string(&mut self) -> Result<String, SyntaxError> {
        let (open, close) = match self.next_char {
            Some('(') => ('(', ')'),
            _ => ('{', '}'),
        };
        let mut result = String::new();
        let mut level = 1usize;
        let mut escape = false;
        self.read_char();
        loop {
            let Some(chr) = self.next_char else {
                return Err(SyntaxError::UnexpectedEof {
                    action: "reading bracketed string",
                    info: self.info(),
                });
            };
            if !escape {
                if chr == open {
                    level += 1;
                } else if chr == close {
                    level -= 1;
                    if level == 0 {
                        self.read_char();
                        return Ok(result);
                    }
                }
            }
            escape = chr == '\\' && !escape;
            result.push(chr);
            self.read_char();
        }
    }

    /// Read a string enclosed in double quotes. The lookahead character must
    /// be the opening quote. Quotes inside curly braces or escaped by a
    /// backslash do not terminate the string.
    pub(crate) fn read_quoted_string(&mut self) -> Result<String, SyntaxError> {
        let mut result = String::new();
        let mut level = 0usize;
        let mut escape = false;
        self.read_char();
        loop {
            let Some(chr) = self.next_char else {
                return Err(SyntaxError::UnexpectedEof {
                    action: "reading quoted string",
                    info: self.info(),
                });
            };
            if !escape {
                match chr {
                    '{' => level += 1,
                    '}' => level = level.saturating_sub(1),
                    '"' if level == 0 => {
                        self.read_char();
                        return Ok(result);
                    }
                    _ => {}
                }
            }
            escape = chr == '\\' && !escape;
            result.push(chr);
            self.read_char();
        }
    }
}
