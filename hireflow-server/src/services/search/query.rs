//! Boolean candidate query language
//!
//! ```text
//! or      := and ("OR" and)*
//! and     := unary (["AND"] unary)*
//! unary   := ("NOT" | "-") unary | primary
//! primary := "(" or ")" | [field ":"] (word | "quoted phrase")
//! ```
//!
//! Operators are matched case-sensitively, so `and`, `or` and `not` are
//! ordinary terms. Positions in errors count characters from zero.
//!
//! Queries are bounded in length, term count and nesting so that both the
//! parser and the generated SQL stay within fixed limits.

use std::fmt;
use std::fmt::Write as _;

/// Column a term can be restricted to with `field:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Skills,
    Title,
    Company,
    Location,
    Source,
}

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 1000;

/// Most terms in one query; a bare term binds one parameter per searched
/// column, so this keeps the statement under SQLite's 999-variable floor
pub const MAX_TERMS: usize = 32;

/// Deepest nesting of `NOT`, `-` and parentheses
pub const MAX_DEPTH: usize = 64;

const FULL_NAME: &str = "(c.first_name || ' ' || c.last_name)";

/// Columns searched by an unqualified term
const ANY_COLUMNS: &[&str] = &[
    FULL_NAME,
    "c.email",
    "c.skills",
    "c.current_title",
    "c.current_company",
    "c.location",
    "c.source",
    "c.summary",
    "c.resume_text",
];

impl Field {
    fn parse(name: &str) -> Option<Field> {
        match name.to_ascii_lowercase().as_str() {
            "name" => Some(Field::Name),
            "email" => Some(Field::Email),
            "skills" => Some(Field::Skills),
            "title" => Some(Field::Title),
            "company" => Some(Field::Company),
            "location" => Some(Field::Location),
            "source" => Some(Field::Source),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Skills => "skills",
            Field::Title => "title",
            Field::Company => "company",
            Field::Location => "location",
            Field::Source => "source",
        }
    }

    fn columns(self) -> &'static [&'static str] {
        match self {
            Field::Name => &[FULL_NAME],
            Field::Email => &["c.email"],
            Field::Skills => &["c.skills"],
            Field::Title => &["c.current_title"],
            Field::Company => &["c.current_company"],
            Field::Location => &["c.location"],
            Field::Source => &["c.source"],
        }
    }
}

/// Parsed query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Term { field: Option<Field>, text: String },
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
    Not(Box<Query>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for hireflow_common::Error {
    fn from(err: ParseError) -> Self {
        hireflow_common::Error::InvalidInput(format!("invalid search query: {}", err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Phrase(String),
    Field(Field),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Word(w) => format!("'{}'", w),
            TokenKind::Phrase(p) => format!("\"{}\"", p),
            TokenKind::Field(f) => format!("'{}:'", f.as_str()),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
        }
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Word(_)
                | TokenKind::Phrase(_)
                | TokenKind::Field(_)
                | TokenKind::Not
                | TokenKind::Minus
                | TokenKind::LParen
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn ends_word(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ':')
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() > MAX_QUERY_CHARS {
        return Err(ParseError::new(
            format!("query longer than {} characters", MAX_QUERY_CHARS),
            MAX_QUERY_CHARS,
        ));
    }
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, pos: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, pos: i });
                i += 1;
            }
            '"' => {
                let start = i;
                i += 1;
                let body_start = i;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ParseError::new("unterminated quote", start));
                }
                let phrase: String = chars[body_start..i].iter().collect();
                i += 1;
                let phrase = phrase.trim();
                if phrase.is_empty() {
                    return Err(ParseError::new("empty phrase", start));
                }
                tokens.push(Token {
                    kind: TokenKind::Phrase(phrase.to_string()),
                    pos: start,
                });
            }
            '-' => match chars.get(i + 1) {
                Some(&next) if !next.is_whitespace() && next != ')' => {
                    tokens.push(Token { kind: TokenKind::Minus, pos: i });
                    i += 1;
                }
                _ => return Err(ParseError::new("'-' must be followed by a term", i)),
            },
            ':' => return Err(ParseError::new("unexpected ':'", i)),
            _ => {
                let start = i;
                while i < chars.len() && !ends_word(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                if chars.get(i) == Some(&':') {
                    let field = Field::parse(&word)
                        .ok_or_else(|| ParseError::new(format!("unknown field '{}'", word), start))?;
                    tokens.push(Token {
                        kind: TokenKind::Field(field),
                        pos: start,
                    });
                    i += 1;
                    continue;
                }

                let kind = match word.as_str() {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    _ => TokenKind::Word(word),
                };
                tokens.push(Token { kind, pos: start });
            }
        }
    }

    let mut terms = tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Word(_) | TokenKind::Phrase(_)));
    if let Some(extra) = terms.nth(MAX_TERMS) {
        return Err(ParseError::new(
            format!("query has more than {} terms", MAX_TERMS),
            extra.pos,
        ));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    /// Position reported for errors at end of input
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn descend(&mut self, pos: usize) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new("query nested too deeply", pos));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token { kind: TokenKind::Or, .. })) {
            self.cursor += 1;
            let right = self.parse_and()?;
            left = Query::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token { kind: TokenKind::And, .. }) => {
                    self.cursor += 1;
                }
                Some(token) if token.kind.starts_operand() => {}
                _ => break,
            }
            let right = self.parse_unary()?;
            left = Query::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Query, ParseError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Not | TokenKind::Minus,
                pos,
            }) => {
                let pos = *pos;
                self.descend(pos)?;
                self.cursor += 1;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Query::Not(Box::new(inner)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Query, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("expected a term", self.end));
        };

        match token.kind {
            TokenKind::Word(text) | TokenKind::Phrase(text) => Ok(Query::Term { field: None, text }),
            TokenKind::Field(field) => match self.advance() {
                Some(Token {
                    kind: TokenKind::Word(text) | TokenKind::Phrase(text),
                    ..
                }) => Ok(Query::Term {
                    field: Some(field),
                    text,
                }),
                Some(other) => Err(ParseError::new(
                    format!("expected a term after '{}:'", field.as_str()),
                    other.pos,
                )),
                None => Err(ParseError::new(
                    format!("expected a term after '{}:'", field.as_str()),
                    self.end,
                )),
            },
            TokenKind::LParen => {
                self.descend(token.pos)?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(ParseError::new("unclosed '('", token.pos)),
                }
            }
            other => Err(ParseError::new(format!("unexpected {}", other.describe()), token.pos)),
        }
    }
}

/// Parse a query string
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::new("search query is empty", 0));
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: input.chars().count(),
        depth: 0,
    };
    let query = parser.parse_or()?;

    if let Some(extra) = parser.peek() {
        return Err(ParseError::new(format!("unexpected {}", extra.kind.describe()), extra.pos));
    }
    Ok(query)
}

/// Escape `LIKE` wildcards for use with `ESCAPE '\'`
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A WHERE fragment with positional parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPredicate {
    pub sql: String,
    pub params: Vec<String>,
}

/// Translate a query over the `candidates c` table
pub fn to_sql(query: &Query) -> SqlPredicate {
    let mut predicate = SqlPredicate {
        sql: String::new(),
        params: Vec::new(),
    };
    write_sql(query, &mut predicate);
    predicate
}

fn write_sql(query: &Query, out: &mut SqlPredicate) {
    match query {
        Query::Term { field, text } => {
            let columns = field.map(Field::columns).unwrap_or(ANY_COLUMNS);
            let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
            out.sql.push('(');
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    out.sql.push_str(" OR ");
                }
                let _ = write!(out.sql, "lower(COALESCE({}, '')) LIKE ? ESCAPE '\\'", column);
                out.params.push(pattern.clone());
            }
            out.sql.push(')');
        }
        Query::And(left, right) | Query::Or(left, right) => {
            let op = if matches!(query, Query::And(..)) { " AND " } else { " OR " };
            out.sql.push('(');
            write_sql(left, out);
            out.sql.push_str(op);
            write_sql(right, out);
            out.sql.push(')');
        }
        Query::Not(inner) => {
            out.sql.push_str("NOT ");
            write_sql(inner, out);
        }
    }
}
