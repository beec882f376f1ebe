// patter-core - Function signatures
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Function signatures: the callable shape of a function.
//!
//! A signature is an ordered list of parts. Each part is either a *name*
//! (one or more alternative keywords, optionally flagged optional) or a
//! *parameter* (optionally typed, with a variable name). `double {x}` has
//! a name part and a parameter part; `move {x} to/towards {y} (quickly)`
//! has alternatives and an optional trailing name.
//!
//! Signatures carry their visibility, owning library, and return flag, and
//! derive a stable [`RuntimeId`] from their canonical form, so the same
//! declaration always resolves to the same id.

use std::fmt;

use patter_lang::{
    BinaryReader, BinaryWriter, Lexer, ReadError, ReadResult, Symbol, SymbolKind, ValueType,
};

use crate::id::{RuntimeId, fnv1a};

// ============================================================================
// Visibility
// ============================================================================

/// Visibility of a function or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Visible only to the declaring script.
    #[default]
    Local,
    /// Visible inside the declaring library.
    Private,
    /// Visible to any script importing the library.
    Public,
}

impl Visibility {
    pub fn to_byte(self) -> u8 {
        match self {
            Visibility::Local => 0,
            Visibility::Private => 1,
            Visibility::Public => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Visibility> {
        match byte {
            0 => Some(Visibility::Local),
            1 => Some(Visibility::Private),
            2 => Some(Visibility::Public),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Visibility::Local => "local",
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

// ============================================================================
// Signature parts
// ============================================================================

/// Whether a part is a fixed name or a parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Name,
    Parameter,
}

/// One part of a function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePart {
    pub kind: PartKind,
    /// Name parts may be absent at the call site when optional.
    pub optional: bool,
    /// Alternative keywords for a name part; the variable name (possibly
    /// empty) for a parameter part.
    pub names: Vec<String>,
    /// Declared parameter type; `ValueType::Null` means untyped.
    pub value_type: ValueType,
}

impl SignaturePart {
    /// A required name part with a single keyword.
    pub fn name(word: impl Into<String>) -> Self {
        SignaturePart {
            kind: PartKind::Name,
            optional: false,
            names: vec![word.into()],
            value_type: ValueType::Null,
        }
    }

    /// An untyped parameter part.
    pub fn parameter(variable: impl Into<String>) -> Self {
        SignaturePart {
            kind: PartKind::Parameter,
            optional: false,
            names: vec![variable.into()],
            value_type: ValueType::Null,
        }
    }

    /// The part's first name (the canonical keyword or the variable name).
    pub fn first_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    fn matches_name(&self, text: &str) -> bool {
        self.names.iter().any(|n| n == text)
    }
}

/// A classified call-site part used to match incoming symbols against
/// registered signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallPart {
    /// A bare word that did not resolve as a variable or property.
    Name(String),
    /// A value, variable, property, or parenthesized subexpression.
    Parameter,
}

// ============================================================================
// FunctionSignature
// ============================================================================

/// The callable shape of a function, with its stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    visibility: Visibility,
    returns: bool,
    library: String,
    parts: Vec<SignaturePart>,
    id: RuntimeId,
}

impl FunctionSignature {
    /// Create a signature and derive its id from the canonical form.
    pub fn new(
        visibility: Visibility,
        returns: bool,
        library: impl Into<String>,
        parts: Vec<SignaturePart>,
    ) -> Self {
        let library = library.into();
        let id = Self::compute_id(&library, &parts);
        FunctionSignature {
            visibility,
            returns,
            library,
            parts,
            id,
        }
    }

    /// The canonical form hashes the library, the part kinds and names, and
    /// the parameter types. Visibility, the return flag, and parameter
    /// variable names do not contribute.
    fn compute_id(library: &str, parts: &[SignaturePart]) -> RuntimeId {
        let mut canonical = String::with_capacity(64);
        canonical.push_str(library);
        for part in parts {
            match part.kind {
                PartKind::Name => {
                    canonical.push_str(";n");
                    if part.optional {
                        canonical.push('?');
                    }
                    canonical.push(':');
                    canonical.push_str(&part.names.join("/"));
                }
                PartKind::Parameter => {
                    canonical.push_str(";p:");
                    canonical.push_str(part.value_type.name());
                }
            }
        }
        fnv1a(canonical.as_bytes())
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn returns(&self) -> bool {
        self.returns
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn parts(&self) -> &[SignaturePart] {
        &self.parts
    }

    /// The parameter parts in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &SignaturePart> {
        self.parts
            .iter()
            .filter(|p| p.kind == PartKind::Parameter)
    }

    /// Number of parameters the caller pushes.
    pub fn parameter_count(&self) -> usize {
        self.parameters().count()
    }

    /// A signature is valid if it has at least one non-optional name part
    /// and is not a single bare keyword.
    pub fn is_valid(&self) -> bool {
        let required_names = self
            .parts
            .iter()
            .filter(|p| p.kind == PartKind::Name && !p.optional)
            .count();
        if required_names == 0 {
            return false;
        }
        if self.parts.len() == 1 {
            let part = &self.parts[0];
            let all_keywords = part
                .names
                .iter()
                .all(|n| SymbolKind::keyword(&n.to_lowercase()).is_some());
            if part.kind == PartKind::Name && all_keywords {
                return false;
            }
        }
        true
    }

    /// Match a classified call-site parts list against this signature.
    /// Optional name parts may be absent; every other part must line up.
    pub fn matches(&self, call_parts: &[CallPart]) -> bool {
        let mut ci = 0;
        for part in &self.parts {
            match part.kind {
                PartKind::Name => {
                    let matched = call_parts.get(ci).is_some_and(|cp| match cp {
                        CallPart::Name(text) => part.matches_name(text),
                        CallPart::Parameter => false,
                    });
                    if matched {
                        ci += 1;
                    } else if !part.optional {
                        return false;
                    }
                }
                PartKind::Parameter => {
                    if matches!(call_parts.get(ci), Some(CallPart::Parameter)) {
                        ci += 1;
                    } else {
                        return false;
                    }
                }
            }
        }
        ci == call_parts.len()
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serialize into a bytecode stream.
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.visibility.to_byte());
        writer.write_u8(u8::from(self.returns));
        writer.write_str(&self.library);
        writer.write_u32(self.parts.len() as u32);
        for part in &self.parts {
            writer.write_u8(match part.kind {
                PartKind::Name => 0,
                PartKind::Parameter => 1,
            });
            writer.write_u8(u8::from(part.optional));
            writer.write_u8(part.value_type.to_byte());
            writer.write_u32(part.names.len() as u32);
            for name in &part.names {
                writer.write_str(name);
            }
        }
    }

    /// Deserialize from a bytecode stream.
    pub fn read(reader: &mut BinaryReader<'_>) -> ReadResult<FunctionSignature> {
        let offset = reader.tell();
        let visibility = Visibility::from_byte(reader.read_u8()?)
            .ok_or_else(|| ReadError::new(offset, "invalid visibility byte"))?;
        let returns = reader.read_u8()? != 0;
        let library = reader.read_str()?;
        let part_count = reader.read_u32()? as usize;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            let kind = match reader.read_u8()? {
                0 => PartKind::Name,
                1 => PartKind::Parameter,
                b => {
                    return Err(ReadError::new(
                        reader.tell(),
                        format!("invalid signature part kind {}", b),
                    ));
                }
            };
            let optional = reader.read_u8()? != 0;
            let type_byte = reader.read_u8()?;
            let value_type = ValueType::from_byte(type_byte).ok_or_else(|| {
                ReadError::new(reader.tell(), format!("invalid value type {}", type_byte))
            })?;
            let name_count = reader.read_u32()? as usize;
            let mut names = Vec::with_capacity(name_count);
            for _ in 0..name_count {
                names.push(reader.read_str()?);
            }
            parts.push(SignaturePart {
                kind,
                optional,
                names,
                value_type,
            });
        }
        Ok(FunctionSignature::new(visibility, returns, library, parts))
    }

    // ------------------------------------------------------------------------
    // Registration text
    // ------------------------------------------------------------------------

    /// Parse a signature from registration text, e.g.
    /// `"return {x} doubled"` or `"write line {}"`.
    ///
    /// The text uses the same shape as a script `function` declaration: an
    /// optional leading `return`, name words with `/` alternatives, `(…)`
    /// for optional names, and `{type name}` parameters (the variable name
    /// may be omitted for host functions).
    pub fn parse_text(
        visibility: Visibility,
        library: impl Into<String>,
        text: &str,
    ) -> std::result::Result<FunctionSignature, String> {
        let symbols = Lexer::new(text)
            .tokenize()
            .map_err(|e| e.to_string())?;
        let symbols: Vec<Symbol> = symbols
            .into_iter()
            .filter(|s| s.kind != SymbolKind::NewLine)
            .collect();
        if symbols.is_empty() {
            return Err("empty function signature".into());
        }

        let mut pos = 0;
        let returns = symbols[0].kind == SymbolKind::Return;
        if returns {
            pos += 1;
        }

        let mut parts: Vec<SignaturePart> = Vec::new();
        let mut last_was_parameter = false;
        while pos < symbols.len() {
            let symbol = &symbols[pos];
            if symbol.kind == SymbolKind::CurlyOpen {
                if last_was_parameter {
                    return Err(
                        "two parameters must be separated by a name part".into()
                    );
                }
                pos += 1;
                let mut value_type = ValueType::Null;
                if let Some(t) = type_keyword(symbols.get(pos)) {
                    value_type = t;
                    pos += 1;
                }
                let mut words: Vec<String> = Vec::new();
                while symbols.get(pos).is_some_and(|s| s.kind == SymbolKind::NameValue) {
                    words.push(symbols[pos].text.clone());
                    pos += 1;
                }
                if symbols.get(pos).map(|s| s.kind) != Some(SymbolKind::CurlyClose) {
                    return Err("expected '}' to close parameter".into());
                }
                pos += 1;
                parts.push(SignaturePart {
                    kind: PartKind::Parameter,
                    optional: false,
                    names: vec![words.join(" ")],
                    value_type,
                });
                last_was_parameter = true;
            } else {
                let optional = symbol.kind == SymbolKind::ParenOpen;
                if optional {
                    pos += 1;
                }
                let mut names: Vec<String> = Vec::new();
                match symbols.get(pos) {
                    Some(s) if s.kind == SymbolKind::NameValue || s.kind.is_keyword() => {
                        names.push(s.text.clone());
                        pos += 1;
                    }
                    _ => return Err("expected a name in function signature".into()),
                }
                while symbols.get(pos).map(|s| s.kind) == Some(SymbolKind::ForwardSlash) {
                    pos += 1;
                    match symbols.get(pos) {
                        Some(s) if s.kind == SymbolKind::NameValue || s.kind.is_keyword() => {
                            if names.contains(&s.text) {
                                return Err(format!(
                                    "duplicate alternative name '{}'",
                                    s.text
                                ));
                            }
                            names.push(s.text.clone());
                            pos += 1;
                        }
                        _ => return Err("expected a name after '/'".into()),
                    }
                }
                if optional {
                    if symbols.get(pos).map(|s| s.kind) != Some(SymbolKind::ParenClose) {
                        return Err("expected ')' to close optional name".into());
                    }
                    pos += 1;
                }
                parts.push(SignaturePart {
                    kind: PartKind::Name,
                    optional,
                    names,
                    value_type: ValueType::Null,
                });
                last_was_parameter = false;
            }
        }

        let signature = FunctionSignature::new(visibility, returns, library, parts);
        if !signature.is_valid() {
            return Err(
                "signature needs at least one non-optional name part and cannot be a bare keyword"
                    .into(),
            );
        }
        Ok(signature)
    }
}

/// Map a type-keyword symbol to its `ValueType`.
fn type_keyword(symbol: Option<&Symbol>) -> Option<ValueType> {
    match symbol?.kind {
        SymbolKind::Number => Some(ValueType::Number),
        SymbolKind::Integer => Some(ValueType::Integer),
        SymbolKind::Boolean => Some(ValueType::Boolean),
        SymbolKind::String => Some(ValueType::String),
        SymbolKind::Collection => Some(ValueType::Collection),
        SymbolKind::Guid => Some(ValueType::Guid),
        SymbolKind::Null => Some(ValueType::Null),
        _ => None,
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.library.is_empty() {
            write!(f, "{} ", self.library)?;
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match part.kind {
                PartKind::Name => {
                    if part.optional {
                        write!(f, "({})", part.names.join("/"))?;
                    } else {
                        write!(f, "{}", part.names.join("/"))?;
                    }
                }
                PartKind::Parameter => {
                    if part.value_type == ValueType::Null {
                        write!(f, "{{{}}}", part.first_name())?;
                    } else {
                        write!(f, "{{{} {}}}", part.value_type, part.first_name())?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(text: &str) -> FunctionSignature {
        FunctionSignature::parse_text(Visibility::Public, "test", text).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let s = sig("write {x}");
        assert_eq!(s.parts().len(), 2);
        assert_eq!(s.parts()[0].kind, PartKind::Name);
        assert_eq!(s.parts()[1].kind, PartKind::Parameter);
        assert!(!s.returns());
    }

    #[test]
    fn test_parse_return_and_type() {
        let s = sig("return {integer x} doubled");
        assert!(s.returns());
        assert_eq!(s.parts()[0].value_type, ValueType::Integer);
        assert_eq!(s.parameter_count(), 1);
    }

    #[test]
    fn test_parse_alternatives_and_optional() {
        let s = sig("move {x} to/towards {y} (quickly)");
        assert_eq!(s.parts().len(), 5);
        assert_eq!(s.parts()[2].names, vec!["to", "towards"]);
        assert!(s.parts()[4].optional);
    }

    #[test]
    fn test_parse_unnamed_parameter() {
        let s = sig("write line {}");
        assert_eq!(s.parameter_count(), 1);
        assert_eq!(s.parameters().next().unwrap().first_name(), "");
    }

    #[test]
    fn test_invalid_signatures() {
        assert!(FunctionSignature::parse_text(Visibility::Public, "test", "").is_err());
        // A single bare keyword cannot be a signature.
        assert!(FunctionSignature::parse_text(Visibility::Public, "test", "while").is_err());
        // All name parts optional.
        assert!(FunctionSignature::parse_text(Visibility::Public, "test", "(maybe) {x}").is_err());
        // Adjacent parameters.
        assert!(FunctionSignature::parse_text(Visibility::Public, "test", "add {x} {y}").is_err());
    }

    #[test]
    fn test_id_stability() {
        let a = sig("spawn {x} at {y}");
        let b = sig("spawn {x} at {y}");
        assert_eq!(a.id(), b.id());
        // Parameter variable names do not affect the id.
        let c = sig("spawn {a} at {b}");
        assert_eq!(a.id(), c.id());
        // Library does.
        let d = FunctionSignature::parse_text(Visibility::Public, "other", "spawn {x} at {y}")
            .unwrap();
        assert_ne!(a.id(), d.id());
    }

    #[test]
    fn test_matching() {
        let s = sig("move {x} to/towards {y} (quickly)");
        let name = |t: &str| CallPart::Name(t.to_string());

        assert!(s.matches(&[
            name("move"),
            CallPart::Parameter,
            name("to"),
            CallPart::Parameter,
        ]));
        assert!(s.matches(&[
            name("move"),
            CallPart::Parameter,
            name("towards"),
            CallPart::Parameter,
            name("quickly"),
        ]));
        assert!(!s.matches(&[name("move"), CallPart::Parameter]));
        assert!(!s.matches(&[
            name("shift"),
            CallPart::Parameter,
            name("to"),
            CallPart::Parameter,
        ]));
        // Trailing junk does not match.
        assert!(!s.matches(&[
            name("move"),
            CallPart::Parameter,
            name("to"),
            CallPart::Parameter,
            name("very"),
            name("fast"),
        ]));
    }

    #[test]
    fn test_serialization_round_trip() {
        let s = sig("return {collection c} sorted by/using {k} (descending)");
        let mut w = BinaryWriter::new();
        s.write(&mut w);
        let data = w.into_inner();
        let restored = FunctionSignature::read(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(restored, s);
        assert_eq!(restored.id(), s.id());
    }
}
