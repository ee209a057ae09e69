//! Parser for `.page` module sources.
//!
//! ```text
//! # comment
//! @page(path="/hello", title="Hello", security_policy=SecurityPolicy(allowed_iframe_parents=["localhost:*"]))
//! heading "Hello"
//! text "Welcome!"
//! divider
//! ```
//!
//! Directives attach to the most recent declaration. Pages without a `path`
//! are served at `/`.

use crate::domain::model::{Block, Page, SecurityPolicy};
use crate::utils::error::{Result, RunnerError};

pub fn parse_module(source: &str, module_name: &str) -> Result<Vec<Page>> {
    let mut pages: Vec<Page> = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        let err = |message: String| RunnerError::script(module_name, line_no, message);

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("@page") {
            let page = parse_declaration(rest, module_name).map_err(err)?;
            pages.push(page);
            continue;
        }

        let block = parse_directive(line).map_err(err)?;
        match pages.last_mut() {
            Some(page) => page.blocks.push(block),
            None => {
                return Err(err(
                    "directive appears before any @page declaration".to_string(),
                ))
            }
        }
    }

    Ok(pages)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    List(Vec<String>),
    Call {
        name: String,
        args: Vec<(String, Value)>,
    },
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Call { .. } => "call",
        }
    }
}

fn parse_declaration(rest: &str, module_name: &str) -> std::result::Result<Page, String> {
    let mut cursor = Cursor::new(rest);
    cursor.expect('(')?;
    let args = cursor.arguments(')')?;
    cursor.expect_end()?;

    let mut page = Page {
        path: "/".to_string(),
        title: None,
        policy: SecurityPolicy::default(),
        module: module_name.to_string(),
        blocks: Vec::new(),
    };

    for (key, value) in args {
        match (key.as_str(), value) {
            ("path", Value::Str(path)) => {
                if !path.starts_with('/') {
                    return Err(format!("page path must start with '/', got {:?}", path));
                }
                page.path = path;
            }
            ("title", Value::Str(title)) => page.title = Some(title),
            ("security_policy", Value::Call { name, args }) if name == "SecurityPolicy" => {
                page.policy = parse_policy(args)?;
            }
            ("path" | "title" | "security_policy", other) => {
                return Err(format!("unexpected {} for argument '{}'", other.kind(), key));
            }
            (unknown, _) => return Err(format!("unknown @page argument '{}'", unknown)),
        }
    }

    Ok(page)
}

fn parse_policy(args: Vec<(String, Value)>) -> std::result::Result<SecurityPolicy, String> {
    let mut policy = SecurityPolicy::default();
    for (key, value) in args {
        match (key.as_str(), value) {
            ("allowed_iframe_parents", Value::List(parents)) => {
                policy.allowed_iframe_parents = parents
            }
            (other, _) => return Err(format!("unknown SecurityPolicy argument '{}'", other)),
        }
    }
    Ok(policy)
}

fn parse_directive(line: &str) -> std::result::Result<Block, String> {
    let (keyword, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };

    let mut cursor = Cursor::new(rest);
    let block = match keyword {
        "text" => Block::Text(cursor.string()?),
        "heading" => Block::Heading(cursor.string()?),
        "divider" => Block::Divider,
        other => return Err(format!("unknown directive '{}'", other)),
    };
    cursor.expect_end()?;
    Ok(block)
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest.chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.rest = &self.rest[expected.len_utf8()..];
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> std::result::Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected '{}' {}", expected, self.found()))
        }
    }

    fn expect_end(&mut self) -> std::result::Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(format!("unexpected trailing input {:?}", self.rest)),
        }
    }

    fn found(&self) -> String {
        match self.rest.chars().next() {
            Some(c) => format!("but found '{}'", c),
            None => "but reached end of line".to_string(),
        }
    }

    fn ident(&mut self) -> std::result::Result<String, String> {
        self.skip_ws();
        let len = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        if len == 0 {
            return Err(format!("expected identifier {}", self.found()));
        }
        let ident = self.rest[..len].to_string();
        self.rest = &self.rest[len..];
        Ok(ident)
    }

    fn string(&mut self) -> std::result::Result<String, String> {
        self.expect('"')?;
        let input = self.rest;
        let mut value = String::new();
        let mut chars = input.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '"' => {
                    self.rest = &input[pos + 1..];
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, other)) => return Err(format!("unknown escape '\\{}'", other)),
                    None => break,
                },
                _ => value.push(c),
            }
        }

        Err("unterminated string literal".to_string())
    }

    /// `key=value` pairs up to and including `close`. A trailing comma is allowed.
    fn arguments(&mut self, close: char) -> std::result::Result<Vec<(String, Value)>, String> {
        let mut args = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(args);
            }
            let key = self.ident()?;
            self.expect('=')?;
            let value = self.value()?;
            if args.iter().any(|(k, _)| *k == key) {
                return Err(format!("argument '{}' given more than once", key));
            }
            args.push((key, value));
            if !self.eat(',') {
                self.expect(close)?;
                return Ok(args);
            }
        }
    }

    fn value(&mut self) -> std::result::Result<Value, String> {
        match self.peek() {
            Some('"') => Ok(Value::Str(self.string()?)),
            Some('[') => {
                self.expect('[')?;
                let mut items = Vec::new();
                loop {
                    if self.eat(']') {
                        return Ok(Value::List(items));
                    }
                    items.push(self.string()?);
                    if !self.eat(',') {
                        self.expect(']')?;
                        return Ok(Value::List(items));
                    }
                }
            }
            Some(_) => {
                let name = self.ident()?;
                self.expect('(')?;
                let args = self.arguments(')')?;
                Ok(Value::Call { name, args })
            }
            None => Err("expected a value but reached end of line".to_string()),
        }
    }
}
