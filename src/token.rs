//! Token cursor contract shared by the reader and the writer.
//!
//! The lexical layer is an external collaborator: the codec consumes an
//! abstract, element-granular token stream and never touches bytes. Tokens
//! follow one normalization rule: every `Start` has a matching `End`, even
//! for self-closed elements. The `empty` flag on `Start` records that the
//! element had no content on the wire.
//!
//! [`TokenBuffer`] is the in-memory cursor shipped with the crate; it
//! implements both sides of the contract and backs the round-trip tests.

use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Cow<'static, str>,
    pub local: Cow<'static, str>,
}

impl QName {
    pub fn new(namespace: impl Into<Cow<'static, str>>, local: impl Into<Cow<'static, str>>) -> Self {
        QName {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Constant-friendly constructor for well-known names.
    pub const fn borrowed(namespace: &'static str, local: &'static str) -> Self {
        QName {
            namespace: Cow::Borrowed(namespace),
            local: Cow::Borrowed(local),
        }
    }

    #[inline(always)]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Attribute {
            name,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Start {
        name: QName,
        attributes: Vec<Attribute>,
        empty: bool,
    },
    Text(String),
    End(QName),
    Eof,
}

impl Token {
    /// Short description used in structural error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Start { name, .. } => format!("start of element '{}'", name),
            Token::Text(_) => "text content".to_string(),
            Token::End(name) => format!("end of element '{}'", name),
            Token::Eof => "end of payload".to_string(),
        }
    }
}

/// Read side of the token cursor.
///
/// A cursor is positioned on exactly one token at a time; a fresh cursor is
/// positioned on the first token of the payload.
pub trait TokenRead {
    /// The token the cursor is positioned on.
    fn token(&self) -> &Token;

    /// Advance to the next token and return it. Past the last token the
    /// cursor stays on [`Token::Eof`].
    fn advance(&mut self) -> Result<&Token>;
}

/// Write side of the token cursor.
///
/// Attributes must be written directly after `start_element`, before any
/// text or child element.
pub trait TokenWrite {
    fn start_element(&mut self, name: &QName) -> Result<()>;
    fn attribute(&mut self, name: &QName, value: &str) -> Result<()>;
    fn text(&mut self, text: &str) -> Result<()>;
    fn end_element(&mut self) -> Result<()>;
}

static EOF: Token = Token::Eof;

/// In-memory token cursor implementing both sides of the contract.
///
/// Writing appends tokens; reading walks them from the front. A buffer that
/// was just written to reads back from the first token without rewinding.
#[derive(Debug, Clone, Default)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
    pos: usize,
    pending: Option<(QName, Vec<Attribute>)>,
    open: Vec<QName>,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tokens written so far. Elements still open are not flushed.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Reset the read position to the first token.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    fn misuse(message: &'static str) -> Error {
        Error::Cursor(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            message,
        ))
    }

    // Flush a pending start element, marking it empty if requested.
    fn flush_pending(&mut self, empty: bool) {
        if let Some((name, attributes)) = self.pending.take() {
            self.open.push(name.clone());
            self.tokens.push(Token::Start {
                name,
                attributes,
                empty,
            });
        }
    }
}

impl TokenRead for TokenBuffer {
    fn token(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Result<&Token> {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        Ok(self.token())
    }
}

impl TokenWrite for TokenBuffer {
    fn start_element(&mut self, name: &QName) -> Result<()> {
        self.flush_pending(false);
        self.pending = Some((name.clone(), Vec::new()));
        Ok(())
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<()> {
        match self.pending.as_mut() {
            Some((_, attributes)) => {
                attributes.push(Attribute::new(name.clone(), value));
                Ok(())
            }
            None => Err(Self::misuse("attribute written outside an element start")),
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.flush_pending(false);
        if self.open.is_empty() {
            return Err(Self::misuse("text written outside any element"));
        }
        self.tokens.push(Token::Text(text.to_string()));
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        // An end directly after a start collapses to an empty element.
        let empty = self.pending.is_some();
        self.flush_pending(empty);
        match self.open.pop() {
            Some(name) => {
                self.tokens.push(Token::End(name));
                Ok(())
            }
            None => Err(Self::misuse("end_element without a matching start")),
        }
    }
}
