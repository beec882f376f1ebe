// patter-core - The shared runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The shared runtime: libraries, function definitions, properties, and
//! performance statistics.
//!
//! One `Runtime` is the compilation and execution context for any number
//! of scripts, which may run on different host threads. Each table has its
//! own mutex, held only for the duration of a single lookup or update, so
//! a script never blocks another for longer than one operation.
//!
//! Dropping the runtime explicitly nulls the elements of every
//! collection-valued property: collections are reference-counted and may
//! form cycles, and cycles rooted at properties are broken here. Cycles
//! unreachable from properties must be broken by the script author.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use patter_lang::Variant;

use crate::error::{ConfigError, Result, RuntimeError};
use crate::function::{FunctionDefinition, NativeFunction};
use crate::id::RuntimeId;
use crate::library::Library;
use crate::params::RuntimeParams;
use crate::property::PropertyName;
use crate::signature::FunctionSignature;

/// Aggregate compilation and execution statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfStats {
    pub compilation_time_ns: u64,
    pub execution_time_ns: u64,
    pub instruction_count: u64,
    pub script_compilation_count: u64,
    pub script_execution_count: u64,
}

/// A property value slot. `written` arms the readonly check: a readonly
/// slot admits exactly one write after its declaration runs.
#[derive(Debug)]
struct PropertySlot {
    value: Variant,
    read_only: bool,
    written: bool,
    name: String,
}

/// The shared context for compiling and executing scripts.
#[derive(Debug)]
pub struct Runtime {
    params: RuntimeParams,
    libraries: Mutex<HashMap<String, Arc<Library>>>,
    functions: Mutex<HashMap<RuntimeId, Arc<FunctionDefinition>>>,
    properties: Mutex<HashMap<RuntimeId, PropertySlot>>,
    stats: Mutex<PerfStats>,
}

impl Runtime {
    /// Create a runtime with default parameters.
    pub fn new() -> Arc<Runtime> {
        Arc::new(Runtime {
            params: RuntimeParams::default(),
            libraries: Mutex::new(HashMap::new()),
            functions: Mutex::new(HashMap::new()),
            properties: Mutex::new(HashMap::new()),
            stats: Mutex::new(PerfStats::default()),
        })
    }

    /// Create a runtime with the given parameters.
    pub fn with_params(params: RuntimeParams) -> std::result::Result<Arc<Runtime>, ConfigError> {
        params.validate()?;
        Ok(Arc::new(Runtime {
            params,
            libraries: Mutex::new(HashMap::new()),
            functions: Mutex::new(HashMap::new()),
            properties: Mutex::new(HashMap::new()),
            stats: Mutex::new(PerfStats::default()),
        }))
    }

    /// The runtime's configuration.
    pub fn params(&self) -> &RuntimeParams {
        &self.params
    }

    fn lock_libraries(&self) -> MutexGuard<'_, HashMap<String, Arc<Library>>> {
        self.libraries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_functions(&self) -> MutexGuard<'_, HashMap<RuntimeId, Arc<FunctionDefinition>>> {
        self.functions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_properties(&self) -> MutexGuard<'_, HashMap<RuntimeId, PropertySlot>> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------------

    /// Get a library by name, creating it on first use. The empty name is
    /// the default library for scripts with no `library` declaration.
    pub fn library(self: &Arc<Self>, name: &str) -> Arc<Library> {
        let mut libraries = self.lock_libraries();
        if let Some(library) = libraries.get(name) {
            return Arc::clone(library);
        }
        tracing::debug!(library = %name, "creating library");
        let library = Arc::new(Library::new(name, Arc::downgrade(self)));
        libraries.insert(name.to_string(), Arc::clone(&library));
        library
    }

    /// Whether a library with this name has been created.
    pub fn library_exists(&self, name: &str) -> bool {
        self.lock_libraries().contains_key(name)
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    /// Resolve a function definition by id.
    pub fn find_function(&self, id: RuntimeId) -> Option<Arc<FunctionDefinition>> {
        self.lock_functions().get(&id).cloned()
    }

    /// Register a native (host callback) function definition.
    pub fn register_native_function(
        &self,
        signature: FunctionSignature,
        callback: NativeFunction,
    ) {
        let id = signature.id();
        let definition = Arc::new(FunctionDefinition::native(signature, callback));
        self.lock_functions().insert(id, definition);
    }

    /// Register a bytecode-backed function definition. Executing the
    /// declaring bytecode again re-registers the same definition.
    pub fn register_bytecode_function(
        &self,
        signature: FunctionSignature,
        buffer: Arc<Vec<u8>>,
        offset: usize,
    ) {
        let id = signature.id();
        let definition = Arc::new(FunctionDefinition::bytecode(signature, buffer, offset));
        self.lock_functions().insert(id, definition);
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Create or re-arm a property slot for a declaration. A fresh slot
    /// starts as `Null`; re-running the declaring script re-arms the
    /// readonly slot for its one initializing write.
    pub fn declare_property(&self, property: &PropertyName) {
        let mut properties = self.lock_properties();
        let slot = properties
            .entry(property.id())
            .or_insert_with(|| PropertySlot {
                value: Variant::Null,
                read_only: property.is_read_only(),
                written: false,
                name: property.to_string(),
            });
        slot.read_only = property.is_read_only();
        slot.written = false;
    }

    /// Set a property's value without the readonly check; used for the
    /// host-side initial value at registration. Marks the slot written.
    pub fn initialize_property(&self, id: RuntimeId, value: Variant) {
        let mut properties = self.lock_properties();
        if let Some(slot) = properties.get_mut(&id) {
            slot.value = value;
            slot.written = true;
        }
    }

    /// Read a property value.
    pub fn get_property(&self, id: RuntimeId) -> Option<Variant> {
        self.lock_properties().get(&id).map(|s| s.value.clone())
    }

    /// Whether a property slot exists.
    pub fn property_exists(&self, id: RuntimeId) -> bool {
        self.lock_properties().contains_key(&id)
    }

    /// Write a property value. Readonly slots admit exactly one write
    /// after their declaration. Writing an id with no slot creates a
    /// plain, writable slot, so hosts can seed values ahead of scripts.
    pub fn set_property(&self, id: RuntimeId, value: Variant) -> Result<()> {
        let mut properties = self.lock_properties();
        match properties.get_mut(&id) {
            Some(slot) => {
                if slot.read_only && slot.written {
                    return Err(RuntimeError::ReadOnlyProperty(slot.name.clone()));
                }
                slot.value = value;
                slot.written = true;
                Ok(())
            }
            None => {
                properties.insert(
                    id,
                    PropertySlot {
                        value,
                        read_only: false,
                        written: true,
                        name: format!("{:#018x}", id),
                    },
                );
                Ok(())
            }
        }
    }

    /// Read one element of a collection-valued property. The lookup and
    /// the element read happen under one lock acquisition.
    pub fn get_property_key(&self, id: RuntimeId, key: &Variant) -> Result<Variant> {
        let properties = self.lock_properties();
        let slot = properties.get(&id).ok_or(RuntimeError::UnknownProperty(id))?;
        match slot.value.as_collection() {
            Some(collection) => Ok(collection.get(key).unwrap_or(Variant::Null)),
            None => Err(RuntimeError::NotACollection {
                context: "property subscript",
                got: slot.value.type_name(),
            }),
        }
    }

    /// Write one element of a collection-valued property, atomically with
    /// respect to other property accesses.
    pub fn set_property_key(&self, id: RuntimeId, key: Variant, value: Variant) -> Result<()> {
        let properties = self.lock_properties();
        let slot = properties.get(&id).ok_or(RuntimeError::UnknownProperty(id))?;
        if slot.read_only {
            return Err(RuntimeError::ReadOnlyProperty(slot.name.clone()));
        }
        match slot.value.as_collection() {
            Some(collection) => {
                collection.insert(key, value);
                Ok(())
            }
            None => Err(RuntimeError::NotACollection {
                context: "property subscript",
                got: slot.value.type_name(),
            }),
        }
    }

    /// Delete a property slot.
    pub fn remove_property(&self, id: RuntimeId) -> Result<()> {
        let mut properties = self.lock_properties();
        match properties.get(&id) {
            Some(slot) if slot.read_only => {
                Err(RuntimeError::ReadOnlyProperty(slot.name.clone()))
            }
            Some(_) => {
                properties.remove(&id);
                Ok(())
            }
            None => Err(RuntimeError::UnknownProperty(id)),
        }
    }

    /// Delete one element of a collection-valued property.
    pub fn remove_property_key(&self, id: RuntimeId, key: &Variant) -> Result<()> {
        let properties = self.lock_properties();
        let slot = properties.get(&id).ok_or(RuntimeError::UnknownProperty(id))?;
        if slot.read_only {
            return Err(RuntimeError::ReadOnlyProperty(slot.name.clone()));
        }
        match slot.value.as_collection() {
            Some(collection) => {
                collection.remove(key);
                Ok(())
            }
            None => Err(RuntimeError::NotACollection {
                context: "property subscript",
                got: slot.value.type_name(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Performance statistics
    // ------------------------------------------------------------------------

    /// Fold one compilation into the statistics.
    pub fn add_compile_perf(&self, time_ns: u64) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.compilation_time_ns += time_ns;
        stats.script_compilation_count += 1;
    }

    /// Fold one execution slice into the statistics.
    pub fn add_execute_perf(&self, time_ns: u64, instructions: u64) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.execution_time_ns += time_ns;
        stats.instruction_count += instructions;
        stats.script_execution_count += 1;
    }

    /// Read the aggregate statistics, optionally resetting them.
    pub fn stats(&self, reset: bool) -> PerfStats {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = *stats;
        if reset {
            *stats = PerfStats::default();
        }
        snapshot
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Break reference cycles rooted at collection-valued properties by
        // nulling every element before the table is released.
        let properties = self.properties.get_mut().unwrap_or_else(PoisonError::into_inner);
        for slot in properties.values() {
            if let Some(collection) = slot.value.as_collection() {
                collection.clear_values();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Visibility;
    use patter_lang::Collection;

    #[test]
    fn test_library_created_once() {
        let runtime = Runtime::new();
        let a = runtime.library("demo");
        let b = runtime.library("demo");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(runtime.library_exists("demo"));
        assert!(!runtime.library_exists("other"));
    }

    #[test]
    fn test_property_readonly_single_write() {
        let runtime = Runtime::new();
        let property = PropertyName::new(Visibility::Public, true, "demo", "limit");
        runtime.declare_property(&property);

        // The declaring write succeeds, the second is rejected.
        runtime.set_property(property.id(), Variant::Integer(5)).unwrap();
        assert!(matches!(
            runtime.set_property(property.id(), Variant::Integer(6)),
            Err(RuntimeError::ReadOnlyProperty(_))
        ));
        assert_eq!(runtime.get_property(property.id()), Some(Variant::Integer(5)));

        // Re-declaration re-arms the slot for one write.
        runtime.declare_property(&property);
        runtime.set_property(property.id(), Variant::Integer(7)).unwrap();
        assert_eq!(runtime.get_property(property.id()), Some(Variant::Integer(7)));
    }

    #[test]
    fn test_property_key_access() {
        let runtime = Runtime::new();
        let property = PropertyName::new(Visibility::Public, false, "demo", "table");
        runtime.declare_property(&property);
        runtime
            .set_property(property.id(), Variant::Collection(Collection::new()))
            .unwrap();

        runtime
            .set_property_key(property.id(), Variant::Integer(1), Variant::from("a"))
            .unwrap();
        assert_eq!(
            runtime
                .get_property_key(property.id(), &Variant::Integer(1))
                .unwrap(),
            Variant::from("a")
        );
        assert_eq!(
            runtime
                .get_property_key(property.id(), &Variant::Integer(9))
                .unwrap(),
            Variant::Null
        );
    }

    #[test]
    fn test_property_key_on_scalar_fails() {
        let runtime = Runtime::new();
        let property = PropertyName::new(Visibility::Public, false, "demo", "n");
        runtime.declare_property(&property);
        runtime.set_property(property.id(), Variant::Integer(3)).unwrap();
        assert!(matches!(
            runtime.get_property_key(property.id(), &Variant::Integer(0)),
            Err(RuntimeError::NotACollection { .. })
        ));
    }

    #[test]
    fn test_remove_property() {
        let runtime = Runtime::new();
        let property = PropertyName::new(Visibility::Public, false, "demo", "x");
        runtime.declare_property(&property);
        runtime.set_property(property.id(), Variant::Integer(1)).unwrap();
        runtime.remove_property(property.id()).unwrap();
        assert_eq!(runtime.get_property(property.id()), None);
        assert!(runtime.remove_property(property.id()).is_err());
    }

    #[test]
    fn test_stats_accumulate_and_reset() {
        let runtime = Runtime::new();
        runtime.add_compile_perf(1_000);
        runtime.add_execute_perf(2_000, 50);
        runtime.add_execute_perf(3_000, 25);

        let stats = runtime.stats(true);
        assert_eq!(stats.script_compilation_count, 1);
        assert_eq!(stats.script_execution_count, 2);
        assert_eq!(stats.instruction_count, 75);
        assert_eq!(stats.execution_time_ns, 5_000);
        assert_eq!(runtime.stats(false), PerfStats::default());
    }

    #[test]
    fn test_drop_breaks_property_cycles() {
        let outer = Collection::new();
        let inner = Collection::new();
        outer.insert(Variant::from("in"), Variant::Collection(inner.clone()));
        inner.insert(Variant::from("out"), Variant::Collection(outer.clone()));

        {
            let runtime = Runtime::new();
            let property = PropertyName::new(Visibility::Public, false, "demo", "cycle");
            runtime.declare_property(&property);
            runtime
                .set_property(property.id(), Variant::Collection(outer.clone()))
                .unwrap();
        }
        // The runtime dropped: its walk nulled the elements of `outer`.
        assert_eq!(outer.get(&Variant::from("in")), Some(Variant::Null));
    }
}
