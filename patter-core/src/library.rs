// patter-core - Libraries
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Libraries: named registries of functions and properties.
//!
//! A library owns a function table (signature id → signature) and a
//! property table (name → [`PropertyName`]). The property table tracks the
//! maximum number of words used by any registered property name so the
//! compiler can bound its multi-word lookups.
//!
//! Libraries are created through [`crate::Runtime::library`] and hold a
//! weak reference back to their runtime for host-side registration.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;

use patter_lang::Variant;

use crate::error::RegistrationError;
use crate::function::NativeFunction;
use crate::id::RuntimeId;
use crate::property::PropertyName;
use crate::runtime::Runtime;
use crate::signature::{CallPart, FunctionSignature, Visibility};

/// Function table: registration-ordered so signature matching is
/// deterministic.
#[derive(Debug, Default)]
struct FunctionTable {
    signatures: IndexMap<RuntimeId, FunctionSignature>,
}

impl FunctionTable {
    fn register(&mut self, signature: FunctionSignature, check_duplicate: bool) -> bool {
        if check_duplicate && self.signatures.contains_key(&signature.id()) {
            return false;
        }
        self.signatures.insert(signature.id(), signature);
        true
    }

    fn find(&self, parts: &[CallPart]) -> Option<&FunctionSignature> {
        self.signatures.values().find(|s| s.matches(parts))
    }
}

/// Property table with the max word count of any registered name.
#[derive(Debug, Default)]
struct PropertyTable {
    names: HashMap<String, PropertyName>,
    max_parts: usize,
}

impl PropertyTable {
    fn register(&mut self, property: PropertyName, check_duplicate: bool) -> bool {
        if check_duplicate && self.names.contains_key(property.name()) {
            return false;
        }
        self.max_parts = self.max_parts.max(property.word_count());
        self.names.insert(property.name().to_string(), property);
        true
    }
}

/// A named registry of functions and properties.
#[derive(Debug)]
pub struct Library {
    name: String,
    runtime: Weak<Runtime>,
    functions: Mutex<FunctionTable>,
    properties: Mutex<PropertyTable>,
}

impl Library {
    pub(crate) fn new(name: impl Into<String>, runtime: Weak<Runtime>) -> Self {
        Library {
            name: name.into(),
            runtime,
            functions: Mutex::new(FunctionTable::default()),
            properties: Mutex::new(PropertyTable::default()),
        }
    }

    fn lock_functions(&self) -> MutexGuard<'_, FunctionTable> {
        self.functions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_properties(&self) -> MutexGuard<'_, PropertyTable> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The library's name. The default (unnamed) library has an empty name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------------
    // Host registration
    // ------------------------------------------------------------------------

    /// Register a native function from signature text, e.g.
    /// `"return {x} doubled"`.
    ///
    /// # Example
    ///
    /// ```
    /// use patter_core::{Runtime, RuntimeError, Visibility};
    /// use patter_lang::Variant;
    ///
    /// let runtime = Runtime::new();
    /// let library = runtime.library("math");
    /// library
    ///     .register_function(Visibility::Public, "return {x} doubled", |args| {
    ///         match args.first() {
    ///             Some(Variant::Integer(n)) => Ok(Variant::Integer(n * 2)),
    ///             _ => Err(RuntimeError::native("expected an integer")),
    ///         }
    ///     })
    ///     .unwrap();
    /// ```
    pub fn register_function(
        &self,
        visibility: Visibility,
        signature_text: &str,
        callback: impl Fn(&[Variant]) -> crate::error::Result<Variant> + Send + Sync + 'static,
    ) -> Result<RuntimeId, RegistrationError> {
        let signature =
            FunctionSignature::parse_text(visibility, self.name.clone(), signature_text)
                .map_err(RegistrationError::InvalidSignature)?;
        let runtime = self
            .runtime
            .upgrade()
            .ok_or(RegistrationError::RuntimeUnavailable)?;

        if !self.lock_functions().register(signature.clone(), true) {
            return Err(RegistrationError::DuplicateFunction(signature.to_string()));
        }
        let id = signature.id();
        runtime.register_native_function(signature, std::sync::Arc::new(callback));
        Ok(id)
    }

    /// Register a property with an initial value. Returns the property id
    /// used with [`crate::Runtime::get_property`] /
    /// [`crate::Runtime::set_property`].
    pub fn register_property(
        &self,
        visibility: Visibility,
        read_only: bool,
        name: &str,
        value: Variant,
    ) -> Result<RuntimeId, RegistrationError> {
        let property = PropertyName::new(visibility, read_only, self.name.clone(), name);
        let runtime = self
            .runtime
            .upgrade()
            .ok_or(RegistrationError::RuntimeUnavailable)?;

        if !self.lock_properties().register(property.clone(), true) {
            return Err(RegistrationError::DuplicateProperty(name.to_string()));
        }
        runtime.declare_property(&property);
        runtime.initialize_property(property.id(), value);
        Ok(property.id())
    }

    /// Look up the id of a registered property by name.
    pub fn property_id(&self, name: &str) -> Option<RuntimeId> {
        self.lock_properties().names.get(name).map(|p| p.id())
    }

    // ------------------------------------------------------------------------
    // Compiler and VM access
    // ------------------------------------------------------------------------

    /// Register a compiled function signature. Returns false when
    /// `check_duplicate` is set and the signature already exists.
    pub fn register_signature(&self, signature: FunctionSignature, check_duplicate: bool) -> bool {
        self.lock_functions().register(signature, check_duplicate)
    }

    /// Find the first registered signature matching a classified call-site
    /// parts list. Registration order breaks ties within a library.
    pub fn find_function(&self, parts: &[CallPart]) -> Option<FunctionSignature> {
        self.lock_functions().find(parts).cloned()
    }

    /// Register a property name record. Returns false when
    /// `check_duplicate` is set and the name already exists.
    pub fn register_property_name(&self, property: PropertyName, check_duplicate: bool) -> bool {
        self.lock_properties().register(property, check_duplicate)
    }

    /// Whether a property with this exact name is registered.
    pub fn property_exists(&self, name: &str) -> bool {
        self.lock_properties().names.contains_key(name)
    }

    /// The full name record for a registered property.
    pub fn property_name(&self, name: &str) -> Option<PropertyName> {
        self.lock_properties().names.get(name).cloned()
    }

    /// Maximum word count across registered property names; bounds the
    /// compiler's longest-match lookup.
    pub fn max_property_parts(&self) -> usize {
        self.lock_properties().max_parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn test_find_prefers_registration_order() {
        let runtime = Runtime::new();
        let library = runtime.library("test");
        library
            .register_function(Visibility::Public, "poke {x}", |_| Ok(Variant::Null))
            .unwrap();
        library
            .register_function(Visibility::Public, "poke {x} (gently)", |_| {
                Ok(Variant::Null)
            })
            .unwrap();

        let parts = [
            CallPart::Name("poke".into()),
            CallPart::Parameter,
        ];
        let found = library.find_function(&parts).unwrap();
        assert_eq!(found.parts().len(), 2);
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let runtime = Runtime::new();
        let library = runtime.library("test");
        library
            .register_function(Visibility::Public, "poke {x}", |_| Ok(Variant::Null))
            .unwrap();
        let err = library
            .register_function(Visibility::Public, "poke {y}", |_| Ok(Variant::Null))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateFunction(_)));
    }

    #[test]
    fn test_property_registration_and_max_parts() {
        let runtime = Runtime::new();
        let library = runtime.library("test");
        assert_eq!(library.max_property_parts(), 0);
        let id = library
            .register_property(Visibility::Public, false, "time of day", Variant::Integer(9))
            .unwrap();
        assert_eq!(library.max_property_parts(), 3);
        assert!(library.property_exists("time of day"));
        assert_eq!(library.property_id("time of day"), Some(id));
        assert_eq!(runtime.get_property(id), Some(Variant::Integer(9)));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let runtime = Runtime::new();
        let library = runtime.library("test");
        library
            .register_property(Visibility::Public, false, "score", Variant::Integer(0))
            .unwrap();
        assert!(matches!(
            library.register_property(Visibility::Public, false, "score", Variant::Null),
            Err(RegistrationError::DuplicateProperty(_))
        ));
    }
}
