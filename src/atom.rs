//! ATOM metadata blocks and service-document support.
//!
//! Feeds and entries carry syndication metadata (titles, authors,
//! categories, a generator) that is not part of the data model proper. The
//! reader builds these blocks lazily, at most once per scope, and attaches
//! them to the node when the scope is popped.

use crate::constants;
use crate::error::{Error, Result};
use crate::token::{QName, Token, TokenRead, TokenWrite};

/// Flavor of an ATOM text construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextKind {
    #[default]
    Text,
    Html,
    Xhtml,
}

impl TextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TextKind::Text => "text",
            TextKind::Html => "html",
            TextKind::Xhtml => "xhtml",
        }
    }

    pub fn from_str(value: &str) -> TextKind {
        match value {
            "html" => TextKind::Html,
            "xhtml" => TextKind::Xhtml,
            _ => TextKind::Text,
        }
    }
}

/// A title, subtitle or summary with its flavor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextConstruct {
    pub kind: TextKind,
    pub text: String,
}

impl TextConstruct {
    pub fn plain(text: impl Into<String>) -> Self {
        TextConstruct {
            kind: TextKind::Text,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomCategory {
    pub term: String,
    pub scheme: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomPerson {
    pub name: String,
    pub uri: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomGenerator {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub version: Option<String>,
}

/// Syndication metadata of a feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedMetadata {
    pub title: Option<TextConstruct>,
    pub subtitle: Option<TextConstruct>,
    pub updated: Option<String>,
    pub authors: Vec<AtomPerson>,
    pub generator: Option<AtomGenerator>,
    pub self_link: Option<String>,
}

/// Syndication metadata of an entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryMetadata {
    pub title: Option<TextConstruct>,
    pub summary: Option<TextConstruct>,
    pub updated: Option<String>,
    pub authors: Vec<AtomPerson>,
    /// Categories other than the entity type category.
    pub categories: Vec<AtomCategory>,
}

/// One workspace of a service document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomWorkspace {
    pub title: Option<TextConstruct>,
    pub collections: Vec<AtomResourceCollection>,
}

/// One resource collection inside a workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomResourceCollection {
    pub title: Option<TextConstruct>,
    pub href: String,
}

fn atom(local: &'static str) -> QName {
    QName::borrowed(constants::ATOM_NS, local)
}

/// Write a service document listing the given workspaces.
pub fn write_service_document<C: TokenWrite>(
    cursor: &mut C,
    workspaces: &[AtomWorkspace],
) -> Result<()> {
    cursor.start_element(&atom(constants::SERVICE))?;
    for workspace in workspaces {
        cursor.start_element(&atom(constants::WORKSPACE))?;
        if let Some(title) = &workspace.title {
            cursor.start_element(&atom(constants::TITLE))?;
            cursor.attribute(&atom(constants::TYPE), title.kind.as_str())?;
            cursor.text(&title.text)?;
            cursor.end_element()?;
        }
        for collection in &workspace.collections {
            cursor.start_element(&atom(constants::COLLECTION))?;
            cursor.attribute(&atom(constants::HREF), &collection.href)?;
            if let Some(title) = &collection.title {
                cursor.start_element(&atom(constants::TITLE))?;
                cursor.attribute(&atom(constants::TYPE), title.kind.as_str())?;
                cursor.text(&title.text)?;
                cursor.end_element()?;
            }
            cursor.end_element()?;
        }
        cursor.end_element()?;
    }
    cursor.end_element()?;
    Ok(())
}

fn unexpected(expected: &'static str, token: &Token) -> Error {
    Error::UnexpectedToken {
        expected,
        found: token.describe(),
    }
}

// Collect the text content of the current element; leaves the cursor on the
// matching end token.
fn read_text<C: TokenRead>(cursor: &mut C) -> Result<String> {
    let mut text = String::new();
    loop {
        match cursor.advance()? {
            Token::Text(t) => text.push_str(t),
            Token::End(_) => return Ok(text),
            token => return Err(unexpected("text content", token)),
        }
    }
}

fn read_title<C: TokenRead>(cursor: &mut C) -> Result<TextConstruct> {
    let kind = match cursor.token() {
        Token::Start { attributes, .. } => attributes
            .iter()
            .find(|a| a.name.local == constants::TYPE)
            .map(|a| TextKind::from_str(&a.value))
            .unwrap_or_default(),
        token => return Err(unexpected("title element", token)),
    };
    Ok(TextConstruct {
        kind,
        text: read_text(cursor)?,
    })
}

/// Read a service document into its workspaces.
pub fn read_service_document<C: TokenRead>(cursor: &mut C) -> Result<Vec<AtomWorkspace>> {
    match cursor.token() {
        Token::Start { name, .. } if name.local == constants::SERVICE => {}
        token => return Err(unexpected("service document", token)),
    }

    let mut workspaces = Vec::new();
    loop {
        match cursor.advance()? {
            Token::Start { name, .. } if name.local == constants::WORKSPACE => {
                workspaces.push(read_workspace(cursor)?);
            }
            Token::Text(_) => {}
            Token::End(_) => return Ok(workspaces),
            token => return Err(unexpected("workspace element", token)),
        }
    }
}

fn read_workspace<C: TokenRead>(cursor: &mut C) -> Result<AtomWorkspace> {
    let mut workspace = AtomWorkspace::default();
    loop {
        match cursor.advance()? {
            Token::Start { name, .. } if name.local == constants::TITLE => {
                workspace.title = Some(read_title(cursor)?);
            }
            Token::Start { name, attributes, .. } if name.local == constants::COLLECTION => {
                let href = attributes
                    .iter()
                    .find(|a| a.name.local == constants::HREF)
                    .map(|a| a.value.clone())
                    .ok_or(Error::MissingAttribute(constants::HREF))?;
                let mut title = None;
                loop {
                    match cursor.advance()? {
                        Token::Start { name, .. } if name.local == constants::TITLE => {
                            title = Some(read_title(cursor)?);
                        }
                        Token::Text(_) => {}
                        Token::End(_) => break,
                        token => return Err(unexpected("collection content", token)),
                    }
                }
                workspace
                    .collections
                    .push(AtomResourceCollection { title, href });
            }
            Token::Text(_) => {}
            Token::End(_) => return Ok(workspace),
            token => return Err(unexpected("workspace content", token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenBuffer;

    #[test]
    fn service_document_round_trips() {
        let workspaces = vec![AtomWorkspace {
            title: Some(TextConstruct::plain("Default")),
            collections: vec![
                AtomResourceCollection {
                    title: Some(TextConstruct::plain("People")),
                    href: "People".to_string(),
                },
                AtomResourceCollection {
                    title: None,
                    href: "Orders".to_string(),
                },
            ],
        }];

        let mut buf = TokenBuffer::new();
        write_service_document(&mut buf, &workspaces).unwrap();
        let read = read_service_document(&mut buf).unwrap();
        assert_eq!(read, workspaces);
    }

    #[test]
    fn collection_without_href_is_rejected() {
        let mut buf = TokenBuffer::new();
        buf.start_element(&atom(constants::SERVICE)).unwrap();
        buf.start_element(&atom(constants::WORKSPACE)).unwrap();
        buf.start_element(&atom(constants::COLLECTION)).unwrap();
        buf.end_element().unwrap();
        buf.end_element().unwrap();
        buf.end_element().unwrap();

        assert!(matches!(
            read_service_document(&mut buf),
            Err(Error::MissingAttribute(_))
        ));
    }
}
