//! Type registry model.
//!
//! # Data Flow
//! ```text
//! static table (nft.rs) / JSON bundle
//!     → TypeExpr parser (type strings)
//!     → RegistryTypes (ordered name → TypeDef)
//!     → JSON in the codec's shape ("_enum" arrays/objects)
//! ```
//!
//! # Design Decisions
//! - Declaration order is preserved everywhere; enum discriminants are
//!   declaration indices
//! - Type strings print back in their canonical input form
//! - Generic arguments of custom types are type parameters and are not
//!   resolved against the table

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key under which enums are declared.
pub const ENUM_KEY: &str = "_enum";

/// Containers whose generic arguments are concrete types.
const BUILTIN_CONTAINERS: &[&str] = &[
    "Vec", "Option", "Box", "Compact", "BTreeMap", "BTreeSet", "Result", "BoundedVec",
    "WeakBoundedVec",
];

/// Types the codec knows without a definition.
const BUILTIN_TYPES: &[&str] = &[
    "bool", "u8", "u16", "u32", "u64", "u128", "u256", "i8", "i16", "i32", "i64", "i128",
    "i256", "Text", "Bytes", "Null", "H160", "H256", "H512", "Hash", "AccountId",
    "AccountId32", "AccountIndex", "MultiAddress", "BlockNumber", "Balance", "Moment",
    "Index", "Call", "Perbill", "Permill", "Percent", "Weight",
];

/// Errors from parsing type strings or definition tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("unexpected end of type '{input}'")]
    UnexpectedEnd { input: String },

    #[error("unexpected '{found}' at offset {offset} in type '{input}'")]
    UnexpectedChar { found: char, offset: usize, input: String },

    #[error("invalid array length in type '{input}'")]
    InvalidLength { input: String },

    #[error("type '{0}' is defined more than once")]
    DuplicateType(String),

    #[error("invalid definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },
}

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// Named type with optional generic arguments (`u32`, `Option<BN>`).
    Path { name: String, params: Vec<TypeExpr> },
    /// Fixed-size array (`[u8; 20]`).
    Array { elem: Box<TypeExpr>, len: usize },
    /// Tuple (`(ClassIdOf, ClassIdOf, bool)`).
    Tuple(Vec<TypeExpr>),
}

impl TypeExpr {
    /// A bare named type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Path {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Names this expression requires the registry to know.
    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeExpr::Path { name, params } => {
                out.push(name.as_str());
                if BUILTIN_CONTAINERS.contains(&name.as_str()) {
                    for param in params {
                        param.collect_references(out);
                    }
                }
            }
            TypeExpr::Array { elem, .. } => elem.collect_references(out),
            TypeExpr::Tuple(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path { name, params } => {
                write!(f, "{}", name)?;
                if !params.is_empty() {
                    write!(f, "<")?;
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", param)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeExpr::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            TypeExpr::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl FromStr for TypeExpr {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input: s, pos: 0 };
        let expr = parser.expr()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(expr),
            Some(c) => Err(parser.unexpected(c)),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self, found: char) -> TypeParseError {
        TypeParseError::UnexpectedChar {
            found,
            offset: self.pos,
            input: self.input.to_string(),
        }
    }

    fn end(&self) -> TypeParseError {
        TypeParseError::UnexpectedEnd {
            input: self.input.to_string(),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), TypeParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.end()),
        }
    }

    fn expr(&mut self) -> Result<TypeExpr, TypeParseError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let items = self.list(')')?;
                Ok(TypeExpr::Tuple(items))
            }
            Some('[') => {
                self.pos += 1;
                let elem = self.expr()?;
                self.expect(';')?;
                self.skip_ws();
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let len = self.input[start..self.pos]
                    .parse::<usize>()
                    .map_err(|_| TypeParseError::InvalidLength {
                        input: self.input.to_string(),
                    })?;
                self.expect(']')?;
                Ok(TypeExpr::Array {
                    elem: Box::new(elem),
                    len,
                })
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == ':') {
                    self.pos += 1;
                }
                let name = self.input[start..self.pos].to_string();
                self.skip_ws();
                let params = if self.peek() == Some('<') {
                    self.pos += 1;
                    self.list('>')?
                } else {
                    Vec::new()
                };
                Ok(TypeExpr::Path { name, params })
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.end()),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn list(&mut self, close: char) -> Result<Vec<TypeExpr>, TypeParseError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(c) => return Err(self.unexpected(c)),
                None => return Err(self.end()),
            }
        }
    }
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
}

/// An enum variant carrying data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub ty: TypeExpr,
}

/// Enum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumDef {
    /// Plain variants (`{"_enum": ["None", "Transferable"]}`).
    Unit(Vec<String>),
    /// Variants carrying a value (`{"_enum": {"Simple": "u32"}}`).
    Tagged(Vec<Variant>),
}

impl EnumDef {
    /// Variant names in declaration order.
    pub fn variant_names(&self) -> Vec<&str> {
        match self {
            EnumDef::Unit(names) => names.iter().map(String::as_str).collect(),
            EnumDef::Tagged(variants) => variants.iter().map(|v| v.name.as_str()).collect(),
        }
    }

    /// Encoded discriminant of a variant.
    pub fn discriminant(&self, name: &str) -> Option<u8> {
        self.variant_names()
            .iter()
            .position(|n| *n == name)
            .and_then(|i| u8::try_from(i).ok())
    }

    /// Variant for an encoded discriminant, with its payload type if tagged.
    pub fn variant(&self, index: u8) -> Option<(&str, Option<&TypeExpr>)> {
        let i = usize::from(index);
        match self {
            EnumDef::Unit(names) => names.get(i).map(|n| (n.as_str(), None)),
            EnumDef::Tagged(variants) => variants.get(i).map(|v| (v.name.as_str(), Some(&v.ty))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EnumDef::Unit(names) => names.len(),
            EnumDef::Tagged(variants) => variants.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structural definition of one named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    /// Another name or composite expression.
    Alias(TypeExpr),
    /// Struct of named fields.
    Struct(Vec<Field>),
    /// Tagged union.
    Enum(EnumDef),
}

impl TypeDef {
    fn to_value(&self) -> Value {
        match self {
            TypeDef::Alias(expr) => Value::String(expr.to_string()),
            TypeDef::Struct(fields) => Value::Object(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::String(f.ty.to_string())))
                    .collect(),
            ),
            TypeDef::Enum(EnumDef::Unit(names)) => {
                let mut map = Map::new();
                map.insert(
                    ENUM_KEY.to_string(),
                    Value::Array(names.iter().cloned().map(Value::String).collect()),
                );
                Value::Object(map)
            }
            TypeDef::Enum(EnumDef::Tagged(variants)) => {
                let inner: Map<String, Value> = variants
                    .iter()
                    .map(|v| (v.name.clone(), Value::String(v.ty.to_string())))
                    .collect();
                let mut map = Map::new();
                map.insert(ENUM_KEY.to_string(), Value::Object(inner));
                Value::Object(map)
            }
        }
    }

    fn from_value(name: &str, value: &Value) -> Result<Self, TypeParseError> {
        let invalid = |reason: &str| TypeParseError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match value {
            Value::String(s) => Ok(TypeDef::Alias(s.parse()?)),
            Value::Object(map) => match map.get(ENUM_KEY) {
                Some(Value::Array(items)) => {
                    let names = items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| invalid("enum variant names must be strings")))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(TypeDef::Enum(EnumDef::Unit(names)))
                }
                Some(Value::Object(variants)) => {
                    let variants = variants
                        .iter()
                        .map(|(variant, ty)| {
                            let ty = ty.as_str().ok_or_else(|| invalid("enum variant types must be strings"))?;
                            Ok(Variant {
                                name: variant.clone(),
                                ty: ty.parse()?,
                            })
                        })
                        .collect::<Result<Vec<_>, TypeParseError>>()?;
                    Ok(TypeDef::Enum(EnumDef::Tagged(variants)))
                }
                Some(_) => Err(invalid("'_enum' must be an array or an object")),
                None => {
                    let fields = map
                        .iter()
                        .map(|(field, ty)| {
                            let ty = ty.as_str().ok_or_else(|| invalid("field types must be strings"))?;
                            Ok(Field {
                                name: field.clone(),
                                ty: ty.parse()?,
                            })
                        })
                        .collect::<Result<Vec<_>, TypeParseError>>()?;
                    Ok(TypeDef::Struct(fields))
                }
            },
            _ => Err(invalid("expected a type string or an object")),
        }
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeDef::Alias(expr) => expr.collect_references(out),
            TypeDef::Struct(fields) => fields.iter().for_each(|f| f.ty.collect_references(out)),
            TypeDef::Enum(EnumDef::Unit(_)) => {}
            TypeDef::Enum(EnumDef::Tagged(variants)) => {
                variants.iter().for_each(|v| v.ty.collect_references(out))
            }
        }
    }
}

/// Compile-time form of a definition, as written in a table.
#[derive(Debug, Clone, Copy)]
pub enum StaticDef {
    Alias(&'static str),
    Struct(&'static [(&'static str, &'static str)]),
    Enum(&'static [&'static str]),
    TaggedEnum(&'static [(&'static str, &'static str)]),
}

/// Ordered map from type name to definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryTypes {
    entries: Vec<(String, TypeDef)>,
}

impl RegistryTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition; names must be unique.
    pub fn insert(&mut self, name: impl Into<String>, def: TypeDef) -> Result<(), TypeParseError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(TypeParseError::DuplicateType(name));
        }
        self.entries.push((name, def));
        Ok(())
    }

    /// Parse a static table.
    pub fn from_static(table: &[(&str, StaticDef)]) -> Result<Self, TypeParseError> {
        let mut types = Self::new();
        for (name, def) in table {
            let def = match def {
                StaticDef::Alias(ty) => TypeDef::Alias(ty.parse()?),
                StaticDef::Struct(fields) => TypeDef::Struct(
                    fields
                        .iter()
                        .map(|(field, ty)| {
                            Ok(Field {
                                name: field.to_string(),
                                ty: ty.parse()?,
                            })
                        })
                        .collect::<Result<_, TypeParseError>>()?,
                ),
                StaticDef::Enum(names) => {
                    TypeDef::Enum(EnumDef::Unit(names.iter().map(|n| n.to_string()).collect()))
                }
                StaticDef::TaggedEnum(variants) => TypeDef::Enum(EnumDef::Tagged(
                    variants
                        .iter()
                        .map(|(variant, ty)| {
                            Ok(Variant {
                                name: variant.to_string(),
                                ty: ty.parse()?,
                            })
                        })
                        .collect::<Result<_, TypeParseError>>()?,
                )),
            };
            types.insert(*name, def)?;
        }
        Ok(types)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Type names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDef)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Referenced names that are neither defined here nor built in.
    ///
    /// Each name is reported once, in first-reference order.
    pub fn unresolved(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for (_, def) in &self.entries {
            def.collect_references(&mut refs);
        }

        let mut seen = HashSet::new();
        refs.into_iter()
            .filter(|name| {
                self.get(name).is_none()
                    && !BUILTIN_TYPES.contains(name)
                    && !BUILTIN_CONTAINERS.contains(name)
            })
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Render in the codec's JSON shape.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, def)| (name.clone(), def.to_value()))
                .collect(),
        )
    }

    /// Read the codec's JSON shape.
    pub fn from_json(value: &Value) -> Result<Self, TypeParseError> {
        let map = value.as_object().ok_or_else(|| TypeParseError::InvalidDefinition {
            name: "<root>".to_string(),
            reason: "expected an object of type definitions".to_string(),
        })?;
        let mut types = Self::new();
        for (name, def) in map {
            types.insert(name.clone(), TypeDef::from_value(name, def)?)?;
        }
        Ok(types)
    }
}

impl Serialize for RegistryTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, def) in &self.entries {
            map.serialize_entry(name, &def.to_value())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RegistryTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RegistryTypes::from_json(&value).map_err(de::Error::custom)
    }
}

/// A definitions bundle as handed to the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeDefinitions {
    pub types: RegistryTypes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(s: &str) -> TypeExpr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(parse("u32"), TypeExpr::named("u32"));
        assert_eq!(
            parse("Option<BN>"),
            TypeExpr::Path {
                name: "Option".into(),
                params: vec![TypeExpr::named("BN")]
            }
        );
        assert_eq!(
            parse("[u8; 20]"),
            TypeExpr::Array {
                elem: Box::new(TypeExpr::named("u8")),
                len: 20
            }
        );
        assert_eq!(
            parse("(ClassIdOf, ClassIdOf, bool)"),
            TypeExpr::Tuple(vec![
                TypeExpr::named("ClassIdOf"),
                TypeExpr::named("ClassIdOf"),
                TypeExpr::named("bool"),
            ])
        );
        assert_eq!(parse("()"), TypeExpr::Tuple(vec![]));
    }

    #[test]
    fn test_display_is_canonical() {
        for s in [
            "Vec<u8>",
            "ClassType<ID>",
            "[u8; 32]",
            "(ClassIdOf, ClassIdOf, bool)",
            "BTreeMap<AccountId, Vec<(u32, [u8; 4])>>",
            "T::AccountId",
        ] {
            assert_eq!(parse(s).to_string(), s);
        }
        assert_eq!(parse("  Vec< u8 >").to_string(), "Vec<u8>");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "Vec<u8".parse::<TypeExpr>(),
            Err(TypeParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            "[u8; x]".parse::<TypeExpr>(),
            Err(TypeParseError::InvalidLength { .. })
        ));
        assert!(matches!(
            "u8 u16".parse::<TypeExpr>(),
            Err(TypeParseError::UnexpectedChar { found: 'u', offset: 3, .. })
        ));
        assert!(matches!(
            "".parse::<TypeExpr>(),
            Err(TypeParseError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_enum_discriminants() {
        let unit = EnumDef::Unit(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(unit.discriminant("C"), Some(2));
        assert_eq!(unit.discriminant("D"), None);
        assert_eq!(unit.variant(1), Some(("B", None)));
        assert_eq!(unit.variant(3), None);

        let tagged = EnumDef::Tagged(vec![Variant {
            name: "Simple".into(),
            ty: TypeExpr::named("u32"),
        }]);
        assert_eq!(tagged.variant(0), Some(("Simple", Some(&TypeExpr::named("u32")))));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let source = json!({
            "Zeta": "u8",
            "Alpha": { "b": "u32", "a": "Vec<Zeta>" },
            "Kind": { "_enum": ["Off", "On"] },
            "Payload": { "_enum": { "Second": "u64", "First": "(u8, bool)" } }
        });

        let types = RegistryTypes::from_json(&source).unwrap();
        assert_eq!(types.names().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Kind", "Payload"]);

        match types.get("Payload") {
            Some(TypeDef::Enum(e)) => assert_eq!(e.variant_names(), vec!["Second", "First"]),
            other => panic!("unexpected {:?}", other),
        }
        match types.get("Alpha") {
            Some(TypeDef::Struct(fields)) => assert_eq!(fields[0].name, "b"),
            other => panic!("unexpected {:?}", other),
        }

        let text = serde_json::to_string(&types).unwrap();
        let back: RegistryTypes = serde_json::from_str(&text).unwrap();
        assert_eq!(back, types);
        assert_eq!(types.to_json(), source);
    }

    #[test]
    fn test_invalid_definitions() {
        let err = RegistryTypes::from_json(&json!({ "X": { "_enum": 5 } })).unwrap_err();
        assert!(matches!(err, TypeParseError::InvalidDefinition { ref name, .. } if name == "X"));

        assert!(RegistryTypes::from_json(&json!({ "X": 5 })).is_err());
        assert!(RegistryTypes::from_json(&json!(["X"])).is_err());
        assert!(RegistryTypes::from_json(&json!({ "X": { "f": "Vec<" } })).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = RegistryTypes::from_static(&[
            ("A", StaticDef::Alias("u8")),
            ("A", StaticDef::Alias("u16")),
        ])
        .unwrap_err();
        assert_eq!(err, TypeParseError::DuplicateType("A".into()));
    }

    #[test]
    fn test_unresolved_references() {
        let types = RegistryTypes::from_static(&[
            ("Known", StaticDef::Alias("u32")),
            ("Holder", StaticDef::Struct(&[("a", "Known"), ("b", "Option<Missing>"), ("c", "Missing")])),
            ("Generic", StaticDef::Alias("Custom<Param>")),
        ])
        .unwrap();
        assert_eq!(types.unresolved(), vec!["Missing".to_string(), "Custom".to_string()]);
    }
}
