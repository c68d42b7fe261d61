use crate::entry::CommentContext;
use crate::file::{CasingProtection, FileProperties, StringDelimiter};
use crate::value::NameFormat;

/// Stylistic choices observed while parsing one source. Reduced into
/// [`FileProperties`] once parsing is complete, so that writing the file
/// again reproduces what the source did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub braced_values: usize,
    pub quoted_values: usize,
    /// numbers written without delimiters, e.g. `year = 2020`
    pub bare_numbers: usize,
    pub delimited_numbers: usize,
    pub comma_ordered_names: usize,
    pub natural_ordered_names: usize,
    pub protected_titles: usize,
    pub unprotected_titles: usize,
    pub command_comments: usize,
    pub prefix_comments: usize,
    pub verbatim_comments: usize,
    /// prefix of the most recent `%` comment, “%” or “% ”
    pub comment_prefix: Option<String>,
    /// separator of the most recently split keyword field
    pub list_separator: Option<String>,
    pub encoding: Option<String>,
}

impl Statistics {
    pub(crate) fn count_comment(&mut self, context: &CommentContext) {
        match context {
            CommentContext::Command => self.command_comments += 1,
            CommentContext::Prefix(prefix) => {
                self.prefix_comments += 1;
                self.comment_prefix = Some(prefix.clone());
            }
            CommentContext::Verbatim => self.verbatim_comments += 1,
        }
    }

    pub(crate) fn count_names(&mut self, comma_ordered: bool) {
        if comma_ordered {
            self.comma_ordered_names += 1;
        } else {
            self.natural_ordered_names += 1;
        }
    }

    pub(crate) fn count_title(&mut self, protected: bool) {
        if protected {
            self.protected_titles += 1;
        } else {
            self.unprotected_titles += 1;
        }
    }

    fn comment_context(&self) -> CommentContext {
        // ties go to the command form
        let command = self.command_comments;
        let prefix = self.prefix_comments;
        let verbatim = self.verbatim_comments;
        if prefix > command && prefix >= verbatim {
            CommentContext::Prefix(self.comment_prefix.clone().unwrap_or_else(|| "%".to_string()))
        } else if verbatim > command && verbatim > prefix {
            CommentContext::Verbatim
        } else {
            CommentContext::Command
        }
    }

    /// Reduce every tally to the property value it favors
    pub fn reduce(&self) -> FileProperties {
        let defaults = FileProperties::default();
        FileProperties {
            encoding: self.encoding.clone(),
            string_delimiter: if self.braced_values >= self.quoted_values {
                StringDelimiter::Braces
            } else {
                StringDelimiter::Quotes
            },
            bare_numbers: self.bare_numbers >= self.delimited_numbers,
            name_format: if self.comma_ordered_names >= self.natural_ordered_names {
                NameFormat::LastFirst
            } else {
                NameFormat::FirstLast
            },
            protect_casing: match (self.protected_titles, self.unprotected_titles) {
                (p, 0) if p > 0 => CasingProtection::Always,
                (0, u) if u > 0 => CasingProtection::Never,
                _ => CasingProtection::Keep,
            },
            comment_context: self.comment_context(),
            list_separator: self.list_separator.clone().unwrap_or(defaults.list_separator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reduces_to_defaults() {
        assert_eq!(Statistics::default().reduce(), FileProperties::default());
    }

    #[test]
    fn test_argmax() {
        let stats = Statistics {
            braced_values: 2,
            quoted_values: 5,
            comma_ordered_names: 1,
            natural_ordered_names: 3,
            protected_titles: 4,
            prefix_comments: 2,
            comment_prefix: Some("% ".to_string()),
            list_separator: Some(", ".to_string()),
            ..Statistics::default()
        };
        let properties = stats.reduce();
        assert_eq!(properties.string_delimiter, StringDelimiter::Quotes);
        assert_eq!(properties.name_format, NameFormat::FirstLast);
        assert_eq!(properties.protect_casing, CasingProtection::Always);
        assert_eq!(properties.comment_context, CommentContext::Prefix("% ".to_string()));
        assert_eq!(properties.list_separator, ", ");
    }

    #[test]
    fn test_number_style() {
        let mut stats = Statistics::default();
        assert!(stats.reduce().bare_numbers);
        stats.delimited_numbers = 2;
        stats.bare_numbers = 1;
        assert!(!stats.reduce().bare_numbers);
        stats.bare_numbers = 2;
        assert!(stats.reduce().bare_numbers);
    }

    #[test]
    fn test_casing_protection() {
        let mut stats = Statistics::default();
        stats.count_title(false);
        assert_eq!(stats.reduce().protect_casing, CasingProtection::Never);
        stats.count_title(true);
        assert_eq!(stats.reduce().protect_casing, CasingProtection::Keep);
    }

    #[test]
    fn test_comment_ties_favor_command() {
        let mut stats = Statistics::default();
        stats.count_comment(&CommentContext::Verbatim);
        stats.count_comment(&CommentContext::Command);
        assert_eq!(stats.reduce().comment_context, CommentContext::Command);
        stats.count_comment(&CommentContext::Verbatim);
        assert_eq!(stats.reduce().comment_context, CommentContext::Verbatim);
    }
}
