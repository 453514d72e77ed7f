// Hierarchical symbol names and their persisted key encoding
//
// Key layout: separator \tm element (\tn element)*, where an element is
// name \ts prefix \tp postfix. A literal TAB inside any component is written
// as \t\t, so every TAB in a key starts a two-character token.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

const ESCAPE: char = '\t';
const META_DELIMITER: char = 'm';
const NAME_DELIMITER: char = 'n';
const PART_DELIMITER: char = 's';
const POSTFIX_DELIMITER: char = 'p';

/// One level of a qualified name, e.g. `void` + `my_method` + `() const`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NameElement {
    pub prefix: String,
    pub name: String,
    pub postfix: String,
}

impl NameElement {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
            postfix: postfix.into(),
        }
    }

    /// Element with no prefix or postfix
    pub fn named(name: impl Into<String>) -> Self {
        Self::new("", name, "")
    }
}

/// Fully qualified symbol name: elements joined by a language separator.
///
/// Two hierarchies name the same symbol iff they are structurally equal,
/// which is also when their [`serialize`] keys are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NameHierarchy {
    pub separator: String,
    pub elements: Vec<NameElement>,
}

impl NameHierarchy {
    pub fn new(separator: impl Into<String>, elements: Vec<NameElement>) -> Self {
        Self {
            separator: separator.into(),
            elements,
        }
    }

    /// Extend the hierarchy by one child element.
    pub fn child(&self, element: NameElement) -> Self {
        let mut name = self.clone();
        name.elements.push(element);
        name
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element names joined by the separator, without prefix or postfix.
    pub fn qualified_name(&self) -> String {
        self.elements
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

impl fmt::Display for NameHierarchy {
    /// Qualified name decorated with the last element's prefix and postfix,
    /// e.g. `void api::MyType::my_method() const`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(last) = self.elements.last() else {
            return Ok(());
        };
        if !last.prefix.is_empty() {
            write!(f, "{} ", last.prefix)?;
        }
        write!(f, "{}{}", self.qualified_name(), last.postfix)
    }
}

/// Encode a hierarchy as its unique lookup key.
pub fn serialize(name: &NameHierarchy) -> String {
    let mut key = String::with_capacity(
        name.separator.len()
            + name
                .elements
                .iter()
                .map(|e| e.prefix.len() + e.name.len() + e.postfix.len() + 6)
                .sum::<usize>()
            + 2,
    );

    push_escaped(&mut key, &name.separator);
    push_delimiter(&mut key, META_DELIMITER);

    for (i, element) in name.elements.iter().enumerate() {
        if i > 0 {
            push_delimiter(&mut key, NAME_DELIMITER);
        }
        push_escaped(&mut key, &element.name);
        push_delimiter(&mut key, PART_DELIMITER);
        push_escaped(&mut key, &element.prefix);
        push_delimiter(&mut key, POSTFIX_DELIMITER);
        push_escaped(&mut key, &element.postfix);
    }

    key
}

/// Decode a key produced by [`serialize`].
pub fn deserialize(key: &str) -> Result<NameHierarchy> {
    let mut chars = key.chars().peekable();

    let (separator, delimiter) = read_segment(&mut chars)?;
    if delimiter != Some(META_DELIMITER) {
        return Err(malformed(key, "missing separator delimiter"));
    }

    let (mut name, mut delimiter) = read_segment(&mut chars)?;
    if delimiter.is_none() {
        return if name.is_empty() {
            Ok(NameHierarchy::new(separator, Vec::new()))
        } else {
            Err(malformed(key, "element without prefix and postfix"))
        };
    }

    let mut elements = Vec::new();
    loop {
        if delimiter != Some(PART_DELIMITER) {
            return Err(malformed(key, "expected prefix delimiter"));
        }
        let (prefix, next) = read_segment(&mut chars)?;
        if next != Some(POSTFIX_DELIMITER) {
            return Err(malformed(key, "expected postfix delimiter"));
        }
        let (postfix, next) = read_segment(&mut chars)?;

        elements.push(NameElement { prefix, name, postfix });

        match next {
            None => break,
            Some(NAME_DELIMITER) => {
                (name, delimiter) = read_segment(&mut chars)?;
            }
            Some(_) => return Err(malformed(key, "unexpected delimiter after postfix")),
        }
    }

    Ok(NameHierarchy::new(separator, elements))
}

fn push_escaped(key: &mut String, text: &str) {
    for c in text.chars() {
        if c == ESCAPE {
            key.push(ESCAPE);
        }
        key.push(c);
    }
}

fn push_delimiter(key: &mut String, delimiter: char) {
    key.push(ESCAPE);
    key.push(delimiter);
}

/// Read text up to the next delimiter token. Returns the unescaped text and
/// the delimiter that ended it, or `None` at end of input.
fn read_segment(chars: &mut Peekable<Chars<'_>>) -> Result<(String, Option<char>)> {
    let mut text = String::new();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some(ESCAPE) => text.push(ESCAPE),
            Some(d @ (META_DELIMITER | NAME_DELIMITER | PART_DELIMITER | POSTFIX_DELIMITER)) => {
                return Ok((text, Some(d)));
            }
            Some(other) => {
                return Err(Error::MalformedName(format!("unknown escape \\t{other}")));
            }
            None => return Err(Error::MalformedName("dangling escape at end of key".to_string())),
        }
    }
    Ok((text, None))
}

fn malformed(key: &str, reason: &str) -> Error {
    Error::MalformedName(format!("{reason}: {:?}", key))
}
