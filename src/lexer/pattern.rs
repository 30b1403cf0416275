//! Terminal pattern mini-language.
//!
//! Grammar authors write terminal patterns in a small regex subset:
//! literals, `[...]` classes with ranges and negation, escapes (`\n`, `\t`,
//! `\d`, `\w`, `\s`, `\p{ID_Start}`, `\p{ID_Continue}`), `.`, postfix
//! `* + ?`, alternation and grouping. Patterns are tokenized with logos and
//! parsed by a small recursive-descent parser into a [`Pattern`] tree.

use logos::Logos;
use serde::{Deserialize, Serialize};

/// Tokens of the pattern syntax itself.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum PatternToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("|")]
    Pipe,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
    #[token(".")]
    Dot,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("^")]
    Caret,
    #[token("-")]
    Dash,

    #[regex(r"\\p\{[A-Za-z_]+\}")]
    UnicodeClass,

    #[regex(r"\\[\s\S]")]
    Escape,

    #[regex(r"[\s\S]", priority = 0)]
    Char,
}

/// One item of a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassItem {
    Char(char),
    Range(char, char),
    /// `\d`
    Digit,
    /// `\w`
    Word,
    /// `\s`
    Space,
    /// `\p{ID_Start}`
    IdStart,
    /// `\p{ID_Continue}`
    IdContinue,
}

impl ClassItem {
    fn matches(self, c: char) -> bool {
        match self {
            ClassItem::Char(x) => c == x,
            ClassItem::Range(lo, hi) => lo <= c && c <= hi,
            ClassItem::Digit => c.is_ascii_digit(),
            ClassItem::Word => c == '_' || c.is_alphanumeric(),
            ClassItem::Space => c.is_whitespace(),
            ClassItem::IdStart => unicode_ident::is_xid_start(c),
            ClassItem::IdContinue => unicode_ident::is_xid_continue(c),
        }
    }
}

/// A (possibly negated) character class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharClass {
    pub negated: bool,
    pub items: Vec<ClassItem>,
}

impl CharClass {
    pub fn matches(&self, c: char) -> bool {
        self.items.iter().any(|item| item.matches(c)) != self.negated
    }

    fn single(item: ClassItem) -> Self {
        CharClass {
            negated: false,
            items: vec![item],
        }
    }

    fn negated(item: ClassItem) -> Self {
        CharClass {
            negated: true,
            items: vec![item],
        }
    }
}

/// A parsed terminal pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Char(char),
    /// `.` - any character
    Any,
    Class(CharClass),
    Seq(Vec<Pattern>),
    Alt(Vec<Pattern>),
    /// `*`
    Repeat(Box<Pattern>),
    /// `+`
    Repeat1(Box<Pattern>),
    /// `?`
    Optional(Box<Pattern>),
}

impl Pattern {
    /// A pattern matching exactly `text`.
    pub fn literal(text: &str) -> Pattern {
        Pattern::Seq(text.chars().map(Pattern::Char).collect())
    }

    /// Parse the pattern syntax. Errors are plain strings; callers wrap
    /// them into `GrammarError::BadPattern`.
    pub fn parse(src: &str) -> Result<Pattern, String> {
        let mut tokens = Vec::new();
        let mut lexer = PatternToken::lexer(src);
        while let Some(tok) = lexer.next() {
            let tok = tok.map_err(|()| format!("unrecognized input at byte {}", lexer.span().start))?;
            tokens.push((tok, lexer.slice().to_string()));
        }
        let mut parser = PatternParser { tokens, pos: 0 };
        let pattern = parser.alternation()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!(
                "unexpected `{}` at token {}",
                parser.tokens[parser.pos].1, parser.pos
            ));
        }
        Ok(pattern)
    }
}

struct PatternParser {
    tokens: Vec<(PatternToken, String)>,
    pos: usize,
}

impl PatternParser {
    fn peek(&self) -> Option<PatternToken> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn bump(&mut self) -> (PatternToken, String) {
        let t = self.tokens[self.pos].clone();
        self.pos += 1;
        t
    }

    fn alternation(&mut self) -> Result<Pattern, String> {
        let mut branches = vec![self.sequence()?];
        while self.peek() == Some(PatternToken::Pipe) {
            self.bump();
            branches.push(self.sequence()?);
        }
        Ok(if branches.len() == 1 {
            branches.pop().unwrap()
        } else {
            Pattern::Alt(branches)
        })
    }

    fn sequence(&mut self) -> Result<Pattern, String> {
        let mut parts = Vec::new();
        while let Some(tok) = self.peek() {
            if matches!(tok, PatternToken::Pipe | PatternToken::RParen) {
                break;
            }
            parts.push(self.postfix()?);
        }
        Ok(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Pattern::Seq(parts)
        })
    }

    fn postfix(&mut self) -> Result<Pattern, String> {
        let mut pattern = self.atom()?;
        loop {
            pattern = match self.peek() {
                Some(PatternToken::Star) => {
                    self.bump();
                    Pattern::Repeat(Box::new(pattern))
                }
                Some(PatternToken::Plus) => {
                    self.bump();
                    Pattern::Repeat1(Box::new(pattern))
                }
                Some(PatternToken::Question) => {
                    self.bump();
                    Pattern::Optional(Box::new(pattern))
                }
                _ => return Ok(pattern),
            };
        }
    }

    fn atom(&mut self) -> Result<Pattern, String> {
        let (tok, text) = match self.tokens.get(self.pos) {
            Some(t) => t.clone(),
            None => return Err("unexpected end of pattern".to_string()),
        };
        match tok {
            PatternToken::LParen => {
                self.bump();
                let inner = self.alternation()?;
                match self.peek() {
                    Some(PatternToken::RParen) => {
                        self.bump();
                        Ok(inner)
                    }
                    _ => Err("unclosed group".to_string()),
                }
            }
            PatternToken::Dot => {
                self.bump();
                Ok(Pattern::Any)
            }
            PatternToken::LBracket => self.class(),
            PatternToken::Escape => {
                self.bump();
                self.escape(&text).map(|either| match either {
                    EscapeItem::Char(c) => Pattern::Char(c),
                    EscapeItem::Class(class) => Pattern::Class(class),
                })
            }
            PatternToken::UnicodeClass => {
                self.bump();
                Ok(Pattern::Class(CharClass::single(unicode_class(&text)?)))
            }
            PatternToken::Star | PatternToken::Plus | PatternToken::Question => {
                Err(format!("`{text}` has nothing to repeat"))
            }
            PatternToken::RParen => Err("unmatched `)`".to_string()),
            // `]`, `^`, `-` and plain characters all stand for themselves
            // outside a class.
            _ => {
                self.bump();
                Ok(Pattern::Char(text.chars().next().unwrap()))
            }
        }
    }

    fn class(&mut self) -> Result<Pattern, String> {
        self.bump(); // [
        let negated = if self.peek() == Some(PatternToken::Caret) {
            self.bump();
            true
        } else {
            false
        };
        let mut items: Vec<ClassItem> = Vec::new();
        loop {
            let (tok, text) = match self.tokens.get(self.pos) {
                Some(t) => t.clone(),
                None => return Err("unclosed character class".to_string()),
            };
            match tok {
                PatternToken::RBracket => {
                    self.bump();
                    if items.is_empty() {
                        return Err("empty character class".to_string());
                    }
                    return Ok(Pattern::Class(CharClass { negated, items }));
                }
                PatternToken::Escape => {
                    self.bump();
                    match self.escape(&text)? {
                        EscapeItem::Char(c) => items.push(ClassItem::Char(c)),
                        EscapeItem::Class(class) if !class.negated && class.items.len() == 1 => {
                            items.push(class.items[0]);
                        }
                        EscapeItem::Class(_) => {
                            return Err(format!("`{text}` is not allowed inside a class"));
                        }
                    }
                }
                PatternToken::UnicodeClass => {
                    self.bump();
                    items.push(unicode_class(&text)?);
                }
                PatternToken::Dash => {
                    self.bump();
                    // A dash is a range operator only between two plain
                    // characters; elsewhere it is literal.
                    match (items.last().copied(), self.peek_class_char()) {
                        (Some(ClassItem::Char(lo)), Some(hi)) => {
                            self.bump();
                            if lo > hi {
                                return Err(format!("invalid range {lo}-{hi}"));
                            }
                            items.pop();
                            items.push(ClassItem::Range(lo, hi));
                        }
                        _ => items.push(ClassItem::Char('-')),
                    }
                }
                _ => {
                    self.bump();
                    items.push(ClassItem::Char(text.chars().next().unwrap()));
                }
            }
        }
    }

    /// The next token seen as a plain class character, if it is one.
    fn peek_class_char(&self) -> Option<char> {
        let (tok, text) = self.tokens.get(self.pos)?;
        match tok {
            PatternToken::RBracket
            | PatternToken::Escape
            | PatternToken::UnicodeClass
            | PatternToken::Dash => None,
            _ => text.chars().next(),
        }
    }

    fn escape(&self, text: &str) -> Result<EscapeItem, String> {
        let c = text.chars().nth(1).unwrap();
        Ok(match c {
            'n' => EscapeItem::Char('\n'),
            't' => EscapeItem::Char('\t'),
            'r' => EscapeItem::Char('\r'),
            '0' => EscapeItem::Char('\0'),
            'd' => EscapeItem::Class(CharClass::single(ClassItem::Digit)),
            'w' => EscapeItem::Class(CharClass::single(ClassItem::Word)),
            's' => EscapeItem::Class(CharClass::single(ClassItem::Space)),
            'D' => EscapeItem::Class(CharClass::negated(ClassItem::Digit)),
            'W' => EscapeItem::Class(CharClass::negated(ClassItem::Word)),
            'S' => EscapeItem::Class(CharClass::negated(ClassItem::Space)),
            c if c.is_ascii_alphanumeric() => {
                return Err(format!("unknown escape `\\{c}`"));
            }
            c => EscapeItem::Char(c),
        })
    }
}

enum EscapeItem {
    Char(char),
    Class(CharClass),
}

fn unicode_class(text: &str) -> Result<ClassItem, String> {
    // text is `\p{Name}`
    let name = &text[3..text.len() - 1];
    match name {
        "ID_Start" | "XID_Start" => Ok(ClassItem::IdStart),
        "ID_Continue" | "XID_Continue" => Ok(ClassItem::IdContinue),
        other => Err(format!("unsupported unicode class `{other}`")),
    }
}
