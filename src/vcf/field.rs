//! Typed INFO/FORMAT field declarations and values.
//!
//! A [`FieldType`] is parsed once from a `##INFO=<...>` or `##FORMAT=<...>`
//! header line and shared by every [`FieldValue`] built against it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConcordanceError, Result};

lazy_static! {
    // key=value pairs of a structured header body; values may be quoted and
    // contain escaped quotes or commas
    static ref STRUCTURED_PAIR: Regex =
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_.]*)=("(?:[^"\\]|\\.)*"|[^,]*)"#).unwrap();
}

/// Scalar storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Integer,
    Float,
    Char,
    String,
    Flag,
}

impl ScalarKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Integer" => Some(ScalarKind::Integer),
            "Float" => Some(ScalarKind::Float),
            "Character" | "Char" => Some(ScalarKind::Char),
            "String" => Some(ScalarKind::String),
            "Flag" => Some(ScalarKind::Flag),
            _ => None,
        }
    }

    /// Name as written in a header `Type=` attribute
    pub fn as_header_str(&self) -> &'static str {
        match self {
            ScalarKind::Integer => "Integer",
            ScalarKind::Float => "Float",
            ScalarKind::Char => "Character",
            ScalarKind::String => "String",
            ScalarKind::Flag => "Flag",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Integer => "Integer",
            ScalarKind::Float => "Float",
            ScalarKind::Char => "Char",
            ScalarKind::String => "String",
            ScalarKind::Flag => "Flag",
        };
        f.write_str(name)
    }
}

/// Declared number of values (`Number=` attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    /// Exactly `n` values
    Fixed(usize),
    /// One value per alternate allele (`A`)
    PerAltAllele,
    /// One value per allele including the reference (`R`)
    PerAllele,
    /// One value per possible genotype (`G`)
    PerGenotype,
    /// Any number of values (`.`)
    Unbounded,
}

impl Arity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Arity::PerAltAllele),
            "R" => Some(Arity::PerAllele),
            "G" => Some(Arity::PerGenotype),
            "." => Some(Arity::Unbounded),
            n => n.parse().ok().map(Arity::Fixed),
        }
    }

    /// Largest number of slots the type alone allows, if bounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            Arity::Fixed(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::PerAltAllele => f.write_str("A"),
            Arity::PerAllele => f.write_str("R"),
            Arity::PerGenotype => f.write_str("G"),
            Arity::Unbounded => f.write_str("."),
        }
    }
}

/// Parse the body of a structured header line (`ID=DP,Number=1,...`) into
/// ordered key/value pairs. Quotes around values are removed.
pub fn parse_structured(body: &str) -> Vec<(String, String)> {
    let body = body.trim();
    let body = body
        .strip_prefix('<')
        .and_then(|b| b.strip_suffix('>'))
        .unwrap_or(body);

    STRUCTURED_PAIR
        .captures_iter(body)
        .map(|caps| {
            let key = caps[1].to_string();
            let raw = &caps[2];
            let value = match raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                Some(inner) => inner.replace("\\\"", "\""),
                None => raw.to_string(),
            };
            (key, value)
        })
        .collect()
}

/// Declared type of one INFO or FORMAT field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    id: String,
    kind: ScalarKind,
    arity: Arity,
    description: String,
}

impl FieldType {
    pub fn new(
        id: impl Into<String>,
        kind: ScalarKind,
        arity: Arity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            arity,
            description: description.into(),
        }
    }

    /// Parse a declaration body, with or without the surrounding `<...>`
    pub fn parse(body: &str) -> Result<Self> {
        let pairs = parse_structured(body);
        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let id = lookup("ID")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConcordanceError::schema(format!("Missing ID in field declaration: {}", body)))?;
        let kind_str = lookup("Type").ok_or_else(|| {
            ConcordanceError::schema(format!("Missing Type for field '{}'", id))
        })?;
        let kind = ScalarKind::parse(kind_str).ok_or_else(|| {
            ConcordanceError::schema(format!("Invalid Type '{}' for field '{}'", kind_str, id))
        })?;
        let number = lookup("Number").ok_or_else(|| {
            ConcordanceError::schema(format!("Missing Number for field '{}'", id))
        })?;
        let arity = Arity::parse(number).ok_or_else(|| {
            ConcordanceError::schema(format!("Invalid Number '{}' for field '{}'", number, id))
        })?;

        if kind == ScalarKind::Flag && arity != Arity::Fixed(0) {
            return Err(ConcordanceError::schema(format!(
                "Flag field '{}' must declare Number=0",
                id
            )));
        }

        Ok(Self {
            id: id.to_string(),
            kind,
            arity,
            description: lookup("Description").unwrap_or_default().to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Fail if `idx` is not a valid slot for this type
    pub fn validate_index(&self, idx: usize) -> Result<()> {
        match self.arity.limit() {
            Some(limit) if idx >= limit => Err(ConcordanceError::IndexOutOfRange {
                field: self.id.clone(),
                index: idx,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID={},Number={},Type={},Description=\"{}\"",
            self.id,
            self.arity,
            self.kind.as_header_str(),
            self.description.replace('"', "\\\"")
        )
    }
}

/// Kind-specific scalar storage
#[derive(Debug, Clone, PartialEq)]
pub enum Scalars {
    Integer(Vec<i64>),
    Float(Vec<f64>),
    Char(Vec<char>),
    String(Vec<String>),
    Flag,
}

impl Scalars {
    fn empty_for(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Integer => Scalars::Integer(Vec::new()),
            ScalarKind::Float => Scalars::Float(Vec::new()),
            ScalarKind::Char => Scalars::Char(Vec::new()),
            ScalarKind::String => Scalars::String(Vec::new()),
            ScalarKind::Flag => Scalars::Flag,
        }
    }

    fn len(&self) -> usize {
        match self {
            Scalars::Integer(v) => v.len(),
            Scalars::Float(v) => v.len(),
            Scalars::Char(v) => v.len(),
            Scalars::String(v) => v.len(),
            Scalars::Flag => 0,
        }
    }
}

/// A value of one INFO or FORMAT field, interpreted through its [`FieldType`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    field_type: Arc<FieldType>,
    scalars: Scalars,
}

impl FieldValue {
    /// An empty (missing) value of the given type
    pub fn missing(field_type: Arc<FieldType>) -> Self {
        let scalars = Scalars::empty_for(field_type.kind());
        Self {
            field_type,
            scalars,
        }
    }

    /// Parse comma-delimited text according to the type's scalar kind
    pub fn parse(field_type: Arc<FieldType>, text: &str) -> Result<Self> {
        let mut value = Self::missing(field_type);
        if value.field_type.kind() == ScalarKind::Flag || text.is_empty() || text == "." {
            return Ok(value);
        }

        for (idx, token) in text.split(',').enumerate() {
            value.field_type.validate_index(idx)?;
            value.push_token(token)?;
        }
        Ok(value)
    }

    fn push_token(&mut self, token: &str) -> Result<()> {
        let field_type = &self.field_type;
        let fail = || ConcordanceError::coercion(field_type.id(), token, field_type.kind());

        match &mut self.scalars {
            Scalars::Integer(v) => v.push(token.parse().map_err(|_| fail())?),
            Scalars::Float(v) => v.push(token.parse().map_err(|_| fail())?),
            Scalars::Char(v) => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => v.push(c),
                    _ => return Err(fail()),
                }
            }
            Scalars::String(v) => v.push(token.to_string()),
            Scalars::Flag => {}
        }
        Ok(())
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn field_type_arc(&self) -> &Arc<FieldType> {
        &self.field_type
    }

    pub fn kind(&self) -> ScalarKind {
        self.field_type.kind()
    }

    pub fn scalars(&self) -> &Scalars {
        &self.scalars
    }

    /// Number of stored scalar slots
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    /// True when the value is missing. Flags carry no scalars, so a flag
    /// value is always "empty"; its presence in a map is the value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wrong_kind(&self, wanted: ScalarKind) -> ConcordanceError {
        ConcordanceError::type_mismatch(
            format!("{} ({})", self.field_type.id(), self.kind()),
            wanted.to_string(),
        )
    }

    pub fn integers(&self) -> Result<&[i64]> {
        match &self.scalars {
            Scalars::Integer(v) => Ok(v),
            _ => Err(self.wrong_kind(ScalarKind::Integer)),
        }
    }

    pub fn floats(&self) -> Result<&[f64]> {
        match &self.scalars {
            Scalars::Float(v) => Ok(v),
            _ => Err(self.wrong_kind(ScalarKind::Float)),
        }
    }

    pub fn chars(&self) -> Result<&[char]> {
        match &self.scalars {
            Scalars::Char(v) => Ok(v),
            _ => Err(self.wrong_kind(ScalarKind::Char)),
        }
    }

    pub fn strings(&self) -> Result<&[String]> {
        match &self.scalars {
            Scalars::String(v) => Ok(v),
            _ => Err(self.wrong_kind(ScalarKind::String)),
        }
    }

    /// Render one slot. Slots past the stored values render as `.`.
    pub fn get_string(&self, idx: usize) -> Result<String> {
        self.field_type.validate_index(idx)?;
        let rendered = match &self.scalars {
            Scalars::Integer(v) => v.get(idx).map(|x| x.to_string()),
            Scalars::Float(v) => v.get(idx).map(|x| x.to_string()),
            Scalars::Char(v) => v.get(idx).map(|x| x.to_string()),
            Scalars::String(v) => v.get(idx).cloned(),
            Scalars::Flag => None,
        };
        Ok(rendered.unwrap_or_else(|| ".".to_string()))
    }

    /// Replace or append slot `idx` with coerced text. `.` or empty text
    /// clears the whole value.
    pub fn set_string(&mut self, idx: usize, text: &str) -> Result<()> {
        self.field_type.validate_index(idx)?;
        if text.is_empty() || text == "." {
            self.scalars = Scalars::empty_for(self.kind());
            return Ok(());
        }
        if self.kind() == ScalarKind::Flag {
            return Ok(());
        }
        if idx > self.len() {
            return Err(ConcordanceError::IndexOutOfRange {
                field: self.field_type.id().to_string(),
                index: idx,
                limit: self.len() + 1,
            });
        }

        let single = FieldValue::parse(Arc::clone(&self.field_type), text)?;
        if single.len() != 1 {
            return Err(ConcordanceError::coercion(
                self.field_type.id(),
                text,
                self.kind(),
            ));
        }
        match (&mut self.scalars, single.scalars) {
            (Scalars::Integer(v), Scalars::Integer(s)) => put(v, idx, s),
            (Scalars::Float(v), Scalars::Float(s)) => put(v, idx, s),
            (Scalars::Char(v), Scalars::Char(s)) => put(v, idx, s),
            (Scalars::String(v), Scalars::String(s)) => put(v, idx, s),
            _ => {}
        }
        Ok(())
    }

    /// Concatenate the slots of `other`, which must share this value's type.
    pub fn append(&mut self, other: &FieldValue) -> Result<()> {
        if *other.field_type != *self.field_type {
            return Err(ConcordanceError::type_mismatch(
                self.field_type.to_string(),
                other.field_type.to_string(),
            ));
        }
        let combined = self.len() + other.len();
        if combined > 0 {
            self.field_type.validate_index(combined - 1)?;
        }

        match (&mut self.scalars, &other.scalars) {
            (Scalars::Integer(a), Scalars::Integer(b)) => a.extend_from_slice(b),
            (Scalars::Float(a), Scalars::Float(b)) => a.extend_from_slice(b),
            (Scalars::Char(a), Scalars::Char(b)) => a.extend_from_slice(b),
            (Scalars::String(a), Scalars::String(b)) => a.extend(b.iter().cloned()),
            _ => {}
        }
        Ok(())
    }
}

fn put<T>(slots: &mut Vec<T>, idx: usize, mut single: Vec<T>) {
    if let Some(value) = single.pop() {
        if idx < slots.len() {
            slots[idx] = value;
        } else {
            slots.push(value);
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", v)?;
            }
            Ok(())
        }

        if self.kind() != ScalarKind::Flag && self.is_empty() {
            return f.write_str(".");
        }
        match &self.scalars {
            Scalars::Integer(v) => join(f, v),
            Scalars::Float(v) => join(f, v),
            Scalars::Char(v) => join(f, v),
            Scalars::String(v) => join(f, v),
            Scalars::Flag => Ok(()),
        }
    }
}
