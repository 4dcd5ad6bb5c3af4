//! Naming template parsing.

use crate::error::TemplateError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A placeholder that can appear in a naming template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Year,
    Month,
    MonthName,
    Day,
    Hour,
    Minute,
    Second,
    Make,
    Model,
    Camera,
    Stem,
}

impl Token {
    const ALL: [Token; 11] = [
        Token::Year,
        Token::Month,
        Token::MonthName,
        Token::Day,
        Token::Hour,
        Token::Minute,
        Token::Second,
        Token::Make,
        Token::Model,
        Token::Camera,
        Token::Stem,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Token::Year => "year",
            Token::Month => "month",
            Token::MonthName => "month_name",
            Token::Day => "day",
            Token::Hour => "hour",
            Token::Minute => "minute",
            Token::Second => "second",
            Token::Make => "make",
            Token::Model => "model",
            Token::Camera => "camera",
            Token::Stem => "stem",
        }
    }

    fn from_name(name: &str) -> Option<Token> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Whether the token needs a capture date
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            Token::Year
                | Token::Month
                | Token::MonthName
                | Token::Day
                | Token::Hour
                | Token::Minute
                | Token::Second
        )
    }
}

/// Piece of a single path component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

/// Folder structure presets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderStructure {
    /// Year/Month - Name/timestamp (e.g., 2024/01 - January/2024-01-15 14-30-00.jpg)
    #[default]
    YearMonth,
    /// Year/Month/Day/original name (e.g., 2024/01/15/IMG_0001.jpg)
    YearMonthDay,
    /// Flat Year-Month/original name (e.g., 2024-01/IMG_0001.jpg)
    YearMonthFlat,
}

impl FolderStructure {
    pub fn template(&self) -> &'static str {
        match self {
            FolderStructure::YearMonth => {
                "{year}/{month} - {month_name}/{year}-{month}-{day} {hour}-{minute}-{second}"
            }
            FolderStructure::YearMonthDay => "{year}/{month}/{day}/{stem}",
            FolderStructure::YearMonthFlat => "{year}-{month}/{stem}",
        }
    }
}

/// A parsed naming template.
///
/// Components are separated by `/`; the last component names the file
/// (without extension), the rest name folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    source: String,
    components: Vec<Vec<Segment>>,
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("token pattern is valid"))
}

impl NamingTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let source = template.trim();
        if source.is_empty() {
            return Err(TemplateError::Empty);
        }

        if source.starts_with('/') || source.starts_with('\\') {
            return Err(TemplateError::EscapesLibrary {
                template: source.to_string(),
            });
        }

        let mut components = Vec::new();
        for raw in source.split('/').filter(|c| !c.trim().is_empty()) {
            if raw.trim() == ".." || raw.trim() == "." {
                return Err(TemplateError::EscapesLibrary {
                    template: source.to_string(),
                });
            }
            components.push(Self::parse_component(raw, source)?);
        }

        if components.is_empty() {
            return Err(TemplateError::Empty);
        }

        Ok(Self {
            source: source.to_string(),
            components,
        })
    }

    fn parse_component(raw: &str, template: &str) -> Result<Vec<Segment>, TemplateError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in token_regex().captures_iter(raw) {
            let whole = caps.get(0).map(|m| (m.start(), m.end()));
            let (start, end) = match whole {
                Some(range) => range,
                None => continue,
            };
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

            Self::push_literal(&mut segments, &raw[last..start], template)?;

            let token = Token::from_name(name).ok_or_else(|| TemplateError::UnknownToken {
                token: name.to_string(),
                known: Token::ALL
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
            segments.push(Segment::Token(token));
            last = end;
        }

        Self::push_literal(&mut segments, &raw[last..], template)?;
        Ok(segments)
    }

    fn push_literal(
        segments: &mut Vec<Segment>,
        text: &str,
        template: &str,
    ) -> Result<(), TemplateError> {
        if text.contains('{') || text.contains('}') {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
            });
        }
        if !text.is_empty() {
            segments.push(Segment::Literal(text.to_string()));
        }
        Ok(())
    }

    /// Parsed path components
    pub fn components(&self) -> &[Vec<Segment>] {
        &self.components
    }

    /// Whether any component needs a capture date
    pub fn uses_date(&self) -> bool {
        self.tokens().any(|t| t.is_date())
    }

    fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.components.iter().flatten().filter_map(|s| match s {
            Segment::Token(t) => Some(*t),
            Segment::Literal(_) => None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for NamingTemplate {
    fn default() -> Self {
        Self::from(FolderStructure::default())
    }
}

impl From<FolderStructure> for NamingTemplate {
    fn from(structure: FolderStructure) -> Self {
        // Presets are known-good
        Self::parse(structure.template()).unwrap_or_else(|_| Self {
            source: String::new(),
            components: vec![vec![Segment::Token(Token::Stem)]],
        })
    }
}

impl FromStr for NamingTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NamingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_template() {
        let template = NamingTemplate::default();
        assert_eq!(template.components().len(), 3);
        assert!(template.uses_date());
        assert_eq!(
            template.components()[1],
            vec![
                Segment::Token(Token::Month),
                Segment::Literal(" - ".to_string()),
                Segment::Token(Token::MonthName),
            ]
        );
    }

    #[test]
    fn all_presets_parse() {
        for structure in [
            FolderStructure::YearMonth,
            FolderStructure::YearMonthDay,
            FolderStructure::YearMonthFlat,
        ] {
            let template = NamingTemplate::parse(structure.template()).unwrap();
            assert_eq!(template.as_str(), structure.template());
        }
    }

    #[test]
    fn camera_only_template_does_not_use_date() {
        let template = NamingTemplate::parse("{camera}/{stem}").unwrap();
        assert!(!template.uses_date());
    }

    #[test]
    fn rejects_unknown_token() {
        let err = NamingTemplate::parse("{year}/{lens}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownToken { ref token, .. } if token == "lens"));
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert!(matches!(
            NamingTemplate::parse("{year/{stem}"),
            Err(TemplateError::Unbalanced { .. })
        ));
        assert!(matches!(
            NamingTemplate::parse("year}/{stem}"),
            Err(TemplateError::Unbalanced { .. })
        ));
    }

    #[test]
    fn rejects_empty_and_escaping_templates() {
        assert_eq!(NamingTemplate::parse("  "), Err(TemplateError::Empty));
        assert_eq!(
            NamingTemplate::parse("//"),
            Err(TemplateError::EscapesLibrary {
                template: "//".to_string()
            })
        );
        assert!(matches!(
            NamingTemplate::parse("../{stem}"),
            Err(TemplateError::EscapesLibrary { .. })
        ));
    }

    #[test]
    fn empty_components_are_skipped() {
        let template = NamingTemplate::parse("{year}//{stem}").unwrap();
        assert_eq!(template.components().len(), 2);
    }
}
