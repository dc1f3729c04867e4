//! Single-line template parser
//!
//! Understands the slice of Go `text/template` action syntax that env-file
//! templates use:
//!
//! ```text
//! PASSWORD={{ kv "https://example.vault.azure.net/secrets/pass" }}
//! TOKEN={{ lookup `https://example.vault.azure.net/secrets/token/3f2a` }}
//! BRACES={{ "{{" }}
//! {{/* comment */}}
//! A = {{- kv "..." -}} ;
//! ```
//!
//! Double-quoted strings accept Go's escapes (`\n`, `\x41`, `\101`, `\u00e9`,
//! `\U0001F600` and the rest), except `\'`, which Go rejects there as well.

/// Names under which the lookup function can be called
pub const LOOKUP_FUNCTIONS: [&str; 2] = ["kv", "lookup"];

/// A byte range within the parsed line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first byte
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
}

/// A parse failure within one line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Where it went wrong
    pub span: Span,
}

/// One piece of a parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text copied to the output as-is
    Text(String),
    /// A secret lookup
    Lookup {
        /// The secret reference URL argument
        reference: String,
        /// The whole `{{ ... }}` action
        span: Span,
    },
}

/// A parsed line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse one line (without its terminator).
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError`] for unterminated actions, strings or comments,
    /// unknown functions, and lookups without exactly one string argument.
    pub fn parse(line: &str) -> Result<Self, SyntaxError> {
        Parser::new(line).parse()
    }

    /// The parsed nodes in line order
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Secret references in line order
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Lookup { reference, .. } => Some(reference.as_str()),
            Node::Text(_) => None,
        })
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            nodes: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Template, SyntaxError> {
        let src = self.src;
        let mut trim_next_text = false;

        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let Some(relative) = rest.find("{{") else {
                self.push_text(rest, trim_next_text, false);
                break;
            };

            let open = self.pos + relative;
            let trim_left =
                src[open + 2..].starts_with('-') && src[open + 3..].starts_with(is_space);
            self.push_text(&src[self.pos..open], trim_next_text, trim_left);

            self.pos = open + if trim_left { 3 } else { 2 };
            trim_next_text = self.action(open)?;
        }

        Ok(Template { nodes: self.nodes })
    }

    fn push_text(&mut self, text: &str, trim_start: bool, trim_end: bool) {
        let text = if trim_start { text.trim_start_matches(is_space) } else { text };
        let text = if trim_end { text.trim_end_matches(is_space) } else { text };
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(previous)) = self.nodes.last_mut() {
            previous.push_str(text);
        } else {
            self.nodes.push(Node::Text(text.to_string()));
        }
    }

    /// Parse the inside of an action starting at `open` (the `{{`), leaving
    /// `pos` after the closing `}}`. Returns whether the action ended with `-}}`.
    fn action(&mut self, open: usize) -> Result<bool, SyntaxError> {
        self.skip_space();

        if self.rest().starts_with("/*") {
            let Some(end) = self.rest().find("*/") else {
                return Err(self.error_at(open, self.src.len() - open, "unclosed comment"));
            };
            self.pos += end + 2;
            return self.close(open);
        }

        match self.peek() {
            None => Err(self.error_at(open, self.src.len() - open, "unclosed action")),
            Some('"' | '`') => {
                let literal = self.string(open)?;
                let trim = self.close(open)?;
                self.push_text(&literal, false, false);
                Ok(trim)
            }
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                let name = self.ident();
                if !LOOKUP_FUNCTIONS.contains(&name) {
                    return Err(self.error_at(
                        start,
                        name.len(),
                        format!("function {name:?} not defined"),
                    ));
                }
                let name = name.to_string();

                self.skip_space();
                match self.peek() {
                    Some('"' | '`') => {}
                    None => {
                        return Err(self.error_at(open, self.src.len() - open, "unclosed action"));
                    }
                    Some(_) if self.at_close() => {
                        return Err(self.error_at(
                            open,
                            self.pos - open,
                            format!("wrong number of args for {name}: want 1 got 0"),
                        ));
                    }
                    Some(c) => {
                        return Err(self.error_at(
                            self.pos,
                            c.len_utf8(),
                            format!("argument to {name} must be a quoted string"),
                        ));
                    }
                }
                let reference = self.string(open)?;

                let rest = self.rest();
                let after = rest.trim_start_matches(is_space);
                if !(after.is_empty() || after.starts_with("}}") || after.starts_with("-}}")) {
                    return Err(self.error_at(
                        self.pos + rest.len() - after.len(),
                        1,
                        format!("wrong number of args for {name}: want 1 got more"),
                    ));
                }
                let trim = self.close(open)?;
                self.nodes.push(Node::Lookup {
                    reference,
                    span: Span {
                        offset: open,
                        len: self.pos - open,
                    },
                });
                Ok(trim)
            }
            Some('}') if self.rest().starts_with("}}") => {
                Err(self.error_at(open, self.pos + 2 - open, "missing value for command"))
            }
            Some(c) => Err(self.error_at(
                self.pos,
                c.len_utf8(),
                format!("unexpected {c:?} in command"),
            )),
        }
    }

    /// Consume optional whitespace and the closing `}}` or ` -}}`
    fn close(&mut self, open: usize) -> Result<bool, SyntaxError> {
        let before = self.pos;
        self.skip_space();
        let had_space = self.pos > before;

        if had_space && self.rest().starts_with("-}}") {
            self.pos += 3;
            Ok(true)
        } else if self.rest().starts_with("}}") {
            self.pos += 2;
            Ok(false)
        } else if self.pos >= self.src.len() {
            Err(self.error_at(open, self.src.len() - open, "unclosed action"))
        } else {
            let c = self.peek().map_or(1, char::len_utf8);
            Err(self.error_at(self.pos, c, "expected end of action"))
        }
    }

    fn at_close(&self) -> bool {
        self.rest().starts_with("}}") || self.rest().starts_with("-}}")
    }

    /// Parse a `"..."` or `` `...` `` literal at `pos`
    fn string(&mut self, open: usize) -> Result<String, SyntaxError> {
        let start = self.pos;
        let Some(quote) = self.peek() else {
            return Err(self.error_at(open, self.src.len() - open, "unclosed action"));
        };
        self.pos += 1;

        if quote == '`' {
            let Some(end) = self.rest().find('`') else {
                return Err(self.error_at(start, self.src.len() - start, "unterminated raw quoted string"));
            };
            let value = self.rest()[..end].to_string();
            self.pos += end + 1;
            return Ok(value);
        }

        let mut value = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, self.src.len() - start, "unterminated quoted string"));
            };
            self.pos += c.len_utf8();
            match c {
                '"' => {
                    return String::from_utf8(value).map_err(|_| {
                        self.error_at(start, self.pos - start, "invalid UTF-8 in quoted string")
                    });
                }
                '\\' => self.escape(start, &mut value)?,
                other => value.extend_from_slice(other.encode_utf8(&mut [0; 4]).as_bytes()),
            }
        }
    }

    /// Decode the escape sequence after a backslash, as Go's `strconv.Unquote` does
    /// for double-quoted strings. `\x` and octal escapes produce raw bytes.
    fn escape(&mut self, start: usize, value: &mut Vec<u8>) -> Result<(), SyntaxError> {
        let escape_at = self.pos - 1;
        let Some(c) = self.peek() else {
            return Err(self.error_at(start, self.src.len() - start, "unterminated quoted string"));
        };
        self.pos += c.len_utf8();

        let simple = match c {
            'a' => Some(b'\x07'),
            'b' => Some(b'\x08'),
            'f' => Some(b'\x0c'),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(b'\x0b'),
            '\\' => Some(b'\\'),
            '"' => Some(b'"'),
            _ => None,
        };
        if let Some(byte) = simple {
            value.push(byte);
            return Ok(());
        }

        let (digits, radix) = match c {
            'x' => (2, 16),
            'u' => (4, 16),
            'U' => (8, 16),
            '0'..='7' => {
                self.pos -= 1;
                (3, 8)
            }
            other => {
                return Err(self.error_at(
                    escape_at,
                    1 + other.len_utf8(),
                    format!("unknown escape sequence \\{other}"),
                ));
            }
        };

        let rest = self.rest();
        let code = rest
            .get(..digits)
            .filter(|d| d.chars().all(|ch| ch.is_digit(radix)))
            .and_then(|d| u32::from_str_radix(d, radix).ok());
        let Some(code) = code else {
            let digits_len: usize = rest.chars().take(digits).map(char::len_utf8).sum();
            let len = self.pos - escape_at + digits_len;
            return Err(self.error_at(escape_at, len, "invalid escape sequence"));
        };
        self.pos += digits;

        match c {
            'u' | 'U' => {
                let ch = char::from_u32(code).ok_or_else(|| {
                    self.error_at(
                        escape_at,
                        self.pos - escape_at,
                        "escape sequence is invalid Unicode code point",
                    )
                })?;
                value.extend_from_slice(ch.encode_utf8(&mut [0; 4]).as_bytes());
            }
            _ => {
                let byte = u8::try_from(code).map_err(|_| {
                    self.error_at(escape_at, self.pos - escape_at, "octal escape value > 255")
                })?;
                value.push(byte);
            }
        }
        Ok(())
    }

    fn ident(&mut self) -> &'a str {
        let src: &'a str = self.src;
        let start = self.pos;
        let len = src[start..]
            .find(|c: char| !is_ident_continue(c))
            .unwrap_or(src.len() - start);
        self.pos += len;
        &src[start..start + len]
    }

    fn skip_space(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches(is_space).len();
    }

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error_at(&self, offset: usize, len: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span: Span {
                offset,
                len: len.max(1).min(self.src.len().saturating_sub(offset).max(1)),
            },
        }
    }
}

const fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
