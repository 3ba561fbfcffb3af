// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal STEP (ISO 10303-21) reader and writer for patching IFC files.
//!
//! Entities are indexed by id and only tokenized on demand. Writing keeps
//! every untouched entity byte-for-byte and appends new entities at the end
//! of the DATA section.
//!
//! Files are read as UTF-8 when they are valid UTF-8 and as ISO-8859-1
//! otherwise, and written back in the same encoding.

use std::collections::BTreeMap;
use std::fmt;

use memchr::memmem;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, peek, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A STEP attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `#123`
    Ref(u32),
    /// `'text'`, stored with `''` escapes intact.
    Str(String),
    Integer(i64),
    Real(f64),
    /// `.ELEMENT.`
    Enum(String),
    List(Vec<Value>),
    /// `IFCLABEL('x')`
    Typed(String, Vec<Value>),
    /// `$`
    Null,
    /// `*`
    Derived,
}

impl Value {
    /// String value, escaping single quotes.
    pub fn string(text: &str) -> Self {
        Value::Str(text.replace('\'', "''"))
    }

    pub fn enumeration(name: &str) -> Self {
        Value::Enum(name.to_string())
    }

    pub fn refs(ids: impl IntoIterator<Item = u32>) -> Self {
        Value::List(ids.into_iter().map(Value::Ref).collect())
    }

    pub fn as_entity_ref(&self) -> Option<u32> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Raw string contents (escapes intact).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Entity references of a list value, skipping non-references.
    pub fn entity_refs(&self) -> Vec<u32> {
        self.as_list()
            .map(|items| items.iter().filter_map(Value::as_entity_ref).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ref(id) => write!(f, "#{}", id),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Real(x) => f.write_str(&format_real(*x)),
            Value::Enum(e) => write!(f, ".{}.", e),
            Value::List(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                f.write_str(")")
            }
            Value::Typed(name, args) => {
                write!(f, "{}(", name)?;
                write_joined(f, args)?;
                f.write_str(")")
            }
            Value::Null => f.write_str("$"),
            Value::Derived => f.write_str("*"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// STEP reals always carry a decimal point: `1.0`, `0.5`, `1.E-10`.
fn format_real(x: f64) -> String {
    let s = format!("{:?}", x);
    match s.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.E{}", mantissa, exponent),
        None if s.contains('.') => s,
        None => format!("{}.", s),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn ws(input: &str) -> IResult<&str, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

fn entity_ref(input: &str) -> IResult<&str, Value> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
        Value::Ref,
    )(input)
}

/// `'...'` with `''` as an escaped quote.
fn string_literal(input: &str) -> IResult<&str, Value> {
    fn contents(input: &str) -> IResult<&str, &str> {
        let bytes = input.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                return Ok((&input[i..], &input[..i]));
            }
            i += 1;
        }
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }

    map(delimited(char('\''), contents, char('\'')), |s: &str| {
        Value::Str(s.to_string())
    })(input)
}

fn real(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Value::Real),
    )(input)
}

fn integer(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(pair(opt(one_of("+-")), digit1)),
        |s: &str| s.parse::<i64>().map(Value::Integer),
    )(input)
}

fn enum_value(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            char('.'),
        ),
        |s: &str| Value::Enum(s.to_string()),
    )(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        char('('),
        separated_list0(delimited(ws, char(','), ws), token),
        preceded(ws, char(')')),
    )(input)
}

fn list(input: &str) -> IResult<&str, Value> {
    map(arguments, Value::List)(input)
}

fn typed_value(input: &str) -> IResult<&str, Value> {
    map(
        pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            arguments,
        ),
        |(name, args): (&str, Vec<Value>)| Value::Typed(name.to_string(), args),
    )(input)
}

fn token(input: &str) -> IResult<&str, Value> {
    delimited(
        ws,
        alt((
            real,
            integer,
            entity_ref,
            string_literal,
            enum_value,
            list,
            typed_value,
            map(char('$'), |_| Value::Null),
            map(char('*'), |_| Value::Derived),
        )),
        ws,
    )(input)
}

fn entity_id(input: &str) -> IResult<&str, u32> {
    delimited(
        ws,
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
        ws,
    )(input)
}

/// `#123 = IFCWALL` at the start of an entity statement.
fn entity_header(input: &str) -> IResult<&str, (u32, &str)> {
    tuple((
        entity_id,
        preceded(
            char('='),
            delimited(
                ws,
                take_while1(|c: char| c.is_alphanumeric() || c == '_'),
                ws,
            ),
        ),
    ))(input)
}

/// `#123 = (` opening a complex instance, which has no single type name.
fn complex_header(input: &str) -> IResult<&str, u32> {
    terminated(entity_id, tuple((char('='), ws, peek(char('(')))))(input)
}

/// Tokenize a full entity statement: `#1=IFCWALL('guid',$,...);`
pub fn parse_entity(input: &str) -> Result<(u32, String, Vec<Value>)> {
    let result: IResult<&str, ((u32, &str), Vec<Value>)> = tuple((
        entity_header,
        terminated(arguments, tuple((ws, char(';')))),
    ))(input);

    match result {
        Ok((_, ((id, type_name), args))) => Ok((id, type_name.to_string(), args)),
        Err(e) => Err(Error::step(0, format!("failed to parse entity: {}", e))),
    }
}

// ---------------------------------------------------------------------------
// File index
// ---------------------------------------------------------------------------

/// Byte encoding a file was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    /// Decode file bytes; each ISO-8859-1 byte maps to the char of the same value.
    fn decode(data: Vec<u8>) -> (String, Encoding) {
        match String::from_utf8(data) {
            Ok(text) => (text, Encoding::Utf8),
            Err(e) => (
                e.into_bytes().into_iter().map(char::from).collect(),
                Encoding::Latin1,
            ),
        }
    }

    fn encode(self, text: String) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.into_bytes(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).unwrap_or(b'?'))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct EntitySpan {
    id: u32,
    type_name: String,
    start: usize,
    end: usize,
}

/// An indexed STEP file.
#[derive(Debug, Clone)]
pub struct StepFile {
    text: String,
    encoding: Encoding,
    schema: Option<String>,
    entities: Vec<EntitySpan>,
    index: FxHashMap<u32, usize>,
    data_end: usize,
    max_id: u32,
}

impl StepFile {
    /// Index every entity of the DATA section.
    pub fn parse(data: impl Into<Vec<u8>>) -> Result<Self> {
        let (text, encoding) = Encoding::decode(data.into());
        let bytes = text.as_bytes();

        let data_start = memmem::find(bytes, b"DATA;")
            .map(|i| i + "DATA;".len())
            .ok_or_else(|| Error::step(0, "missing DATA section"))?;
        let schema = read_schema(&text[..data_start]);

        let mut entities = Vec::new();
        let mut index = FxHashMap::default();
        let mut max_id = 0;
        let mut pos = data_start;

        let data_end = loop {
            pos = skip_blank(bytes, pos);
            if pos >= bytes.len() {
                return Err(Error::step(max_id, "unterminated DATA section"));
            }
            if bytes[pos] != b'#' {
                if text[pos..].starts_with("ENDSEC") {
                    break pos;
                }
                return Err(Error::step(max_id, format!("unexpected content at byte {}", pos)));
            }

            let end = statement_end(bytes, pos)
                .ok_or_else(|| Error::step(max_id, "unterminated entity"))?;
            let statement = &text[pos..end];
            let (id, type_name) = match entity_header(statement) {
                Ok((_, header)) => header,
                Err(e) => match complex_header(statement) {
                    Ok((_, id)) => (id, ""),
                    Err(_) => {
                        return Err(Error::step(max_id, format!("bad entity header: {}", e)))
                    }
                },
            };

            if index.insert(id, entities.len()).is_some() {
                return Err(Error::step(id, "duplicate entity id"));
            }
            entities.push(EntitySpan {
                id,
                type_name: type_name.to_ascii_uppercase(),
                start: pos,
                end,
            });
            max_id = max_id.max(id);
            pos = end;
        };

        tracing::debug!(
            entities = entities.len(),
            schema = ?schema,
            encoding = ?encoding,
            "Indexed STEP file"
        );

        Ok(Self {
            text,
            encoding,
            schema,
            entities,
            index,
            data_end,
            max_id,
        })
    }

    /// First schema name of `FILE_SCHEMA`, e.g. `IFC2X3`.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Upper-case type name of an entity. `None` for complex instances.
    pub fn type_name(&self, id: u32) -> Option<&str> {
        self.span(id)
            .map(|s| s.type_name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Raw statement text of an entity, including the trailing `;`.
    pub fn raw(&self, id: u32) -> Option<&str> {
        self.span(id).map(|s| &self.text[s.start..s.end])
    }

    /// Tokenized attributes of an entity.
    pub fn attributes(&self, id: u32) -> Result<Vec<Value>> {
        let raw = self
            .raw(id)
            .ok_or_else(|| Error::step(id, "entity not found"))?;
        parse_entity(raw)
            .map(|(_, _, args)| args)
            .map_err(|e| match e {
                Error::Step { message, .. } => Error::step(id, message),
                other => other,
            })
    }

    /// Ids of all entities of a type (case-insensitive).
    pub fn ids_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = u32> + 'a {
        self.entities
            .iter()
            .filter(move |s| s.type_name.eq_ignore_ascii_case(type_name))
            .map(|s| s.id)
    }

    /// Map of GlobalId to entity id for every rooted entity.
    ///
    /// Reads only the first attribute, so this stays cheap on large files.
    pub fn global_id_index(&self) -> FxHashMap<String, u32> {
        let mut out = FxHashMap::default();
        for span in &self.entities {
            let raw = &self.text[span.start..span.end];
            if let Some(guid) = leading_global_id(raw) {
                out.entry(guid.to_string()).or_insert(span.id);
            }
        }
        out
    }

    fn span(&self, id: u32) -> Option<&EntitySpan> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }
}

/// First attribute if it is a 22 character IFC GlobalId.
fn leading_global_id(raw: &str) -> Option<&str> {
    let open = raw.find('(')?;
    let rest = raw[open + 1..].trim_start().strip_prefix('\'')?;
    let close = rest.find('\'')?;
    let candidate = &rest[..close];
    let valid = candidate.len() == 22
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
    valid.then_some(candidate)
}

fn read_schema(header: &str) -> Option<String> {
    let at = header.find("FILE_SCHEMA")?;
    let rest = &header[at..];
    let open = rest.find('\'')?;
    let close = rest[open + 1..].find('\'')?;
    Some(rest[open + 1..open + 1 + close].to_string())
}

fn skip_blank(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes[pos..].starts_with(b"/*") {
            match memmem::find(&bytes[pos + 2..], b"*/") {
                Some(end) => pos += 2 + end + 2,
                None => return bytes.len(),
            }
        } else {
            return pos;
        }
    }
}

/// Offset just past the `;` ending the statement at `start`.
fn statement_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut in_string = false;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if in_string && bytes.get(i + 1) == Some(&b'\'') => {
                i += 2;
                continue;
            }
            b'\'' => in_string = !in_string,
            b';' if !in_string => return Some(i + 1),
            _ => {}
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Pending changes to a [`StepFile`].
#[derive(Debug)]
pub struct StepEdit<'a> {
    file: &'a StepFile,
    edits: BTreeMap<u32, String>,
    next_id: u32,
}

impl<'a> StepEdit<'a> {
    pub fn new(file: &'a StepFile) -> Self {
        Self {
            file,
            edits: BTreeMap::new(),
            next_id: file.max_id + 1,
        }
    }

    /// Append a new entity and return its id.
    pub fn add(&mut self, type_name: &str, attributes: &[Value]) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.edits.insert(id, format_entity(id, type_name, attributes));
        id
    }

    /// Rewrite an existing or previously added entity.
    pub fn replace(&mut self, id: u32, type_name: &str, attributes: &[Value]) -> Result<()> {
        if self.file.span(id).is_none() && !self.edits.contains_key(&id) {
            return Err(Error::step(id, "cannot replace unknown entity"));
        }
        self.edits.insert(id, format_entity(id, type_name, attributes));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Produce the patched file, in the encoding it was read with.
    pub fn finish(self) -> Vec<u8> {
        let text = &self.file.text;
        let extra: usize = self.edits.values().map(|s| s.len() + 1).sum();
        let mut out = String::with_capacity(text.len() + extra);
        let mut cursor = 0;

        for span in &self.file.entities {
            if let Some(line) = self.edits.get(&span.id) {
                out.push_str(&text[cursor..span.start]);
                out.push_str(line);
                cursor = span.end;
            }
        }
        out.push_str(&text[cursor..self.file.data_end]);
        let appends = self.edits.range(self.file.max_id + 1..).next().is_some();
        if appends && !out.ends_with('\n') {
            out.push('\n');
        }
        for (_, line) in self.edits.range(self.file.max_id + 1..) {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&text[self.file.data_end..]);
        self.file.encoding.encode(out)
    }
}

fn format_entity(id: u32, type_name: &str, attributes: &[Value]) -> String {
    format!(
        "#{}={};",
        id,
        Value::Typed(type_name.to_string(), attributes.to_vec())
    )
}
