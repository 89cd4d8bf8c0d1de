//!
//! The argument-rewrite template language for delegation rules.
//!
//! A template is a whitespace-separated sequence of words, each mixing
//! literal text with `%` markers. The recognized markers are:
//!
//! - `%c` — the component's currently bound handle path;
//! - `%m` — the forwarded name itself (after any substitution override);
//! - `%s` — the instance's local scope name;
//! - `%w` — the instance's full scope path;
//! - `%n` — the declared identity name of the instance's class;
//! - `%%` — a literal percent sign.
//!
//! Templates are parsed once at declaration time and expanded at every
//! forwarded call, against the live bindings of that call.
//!

use crate::error::{ObjError, Result};

/// One piece of a template word.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    /// Verbatim text.
    Literal(String),
    /// The component's bound handle path (`%c`).
    Component,
    /// The forwarded name (`%m`).
    Message,
    /// The instance's local scope name (`%s`).
    SelfName,
    /// The instance's full scope path (`%w`).
    SelfPath,
    /// The class's declared identity name (`%n`).
    ClassName,
}

/// A parsed rewrite template, ready for repeated expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTemplate {
    words: Vec<Vec<Piece>>,
}

/// The live bindings a template expands against.
#[derive(Debug, Clone, Copy)]
pub struct Expansion<'a> {
    /// The component's currently bound handle path.
    pub component: &'a str,
    /// The forwarded name, after any substitution override.
    pub message: &'a str,
    /// The instance's local scope name.
    pub self_name: &'a str,
    /// The instance's full scope path.
    pub self_path: &'a str,
    /// The declared identity name of the instance's class.
    pub class_name: &'a str,
}

impl ForwardTemplate {
    /// Parse a template source into its word/marker structure.
    pub fn parse(source: &str) -> Result<Self> {
        let mut words = Vec::new();
        for word in source.split_whitespace() {
            let mut pieces = Vec::new();
            let mut literal = String::new();
            let mut chars = word.chars();
            while let Some(ch) = chars.next() {
                if ch != '%' {
                    literal.push(ch);
                    continue;
                }
                let marker = match chars.next() {
                    Some(marker) => marker,
                    None => {
                        return Err(ObjError::InvalidTemplate {
                            detail: format!("dangling '%' at the end of '{}'", word),
                        })
                    }
                };
                if marker == '%' {
                    literal.push('%');
                    continue;
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                let piece = match marker {
                    'c' => Piece::Component,
                    'm' => Piece::Message,
                    's' => Piece::SelfName,
                    'w' => Piece::SelfPath,
                    'n' => Piece::ClassName,
                    other => {
                        return Err(ObjError::InvalidTemplate {
                            detail: format!("unknown marker '%{}' in '{}'", other, word),
                        })
                    }
                };
                pieces.push(piece);
            }
            if !literal.is_empty() {
                pieces.push(Piece::Literal(literal));
            }
            words.push(pieces);
        }
        if words.is_empty() {
            return Err(ObjError::InvalidTemplate {
                detail: "template has no words".to_string(),
            });
        }
        Ok(Self { words })
    }

    /// The number of words this template expands to.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the template expands to no words at all (never true for a
    /// successfully parsed template).
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Expand every word against the given live bindings.
    pub fn expand(&self, bindings: &Expansion<'_>) -> Vec<String> {
        self.words
            .iter()
            .map(|pieces| {
                let mut word = String::new();
                for piece in pieces {
                    match piece {
                        Piece::Literal(text) => word.push_str(text),
                        Piece::Component => word.push_str(bindings.component),
                        Piece::Message => word.push_str(bindings.message),
                        Piece::SelfName => word.push_str(bindings.self_name),
                        Piece::SelfPath => word.push_str(bindings.self_path),
                        Piece::ClassName => word.push_str(bindings.class_name),
                    }
                }
                word
            })
            .collect()
    }
}
