// patter-embed - Engine implementation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The `Engine` struct - main entry point for embedding Patter.

use std::sync::Arc;

use patter_core::{Library, PerfStats, Runtime, RuntimeId, RuntimeParams, Visibility};
use patter_lang::Variant;
use patter_vm::{Bytecode, Script, compile};

use crate::corelib;
use crate::error::{Error, Result};

/// The Patter scripting engine.
///
/// `Engine` wraps a shared [`Runtime`] with a high-level interface for
/// compiling scripts, creating cooperative execution instances, and
/// registering native functions and properties.
///
/// # Thread safety
///
/// The engine (and its runtime) may be shared across threads; every
/// runtime table is individually locked. Each [`Script`], however, is
/// single-threaded and must be driven by one host thread at a time.
///
/// # Example
///
/// ```rust
/// use patter_embed::{Engine, ExecutionStatus};
///
/// let engine = Engine::new();
/// let bytecode = engine.compile("set x to 40 + 2", "example", &[]).unwrap();
/// let mut script = engine.create_script(bytecode).unwrap();
/// assert_eq!(script.execute(), ExecutionStatus::Finished);
/// ```
pub struct Engine {
    runtime: Arc<Runtime>,
}

impl Engine {
    /// Create an engine with default parameters and the `core` library
    /// registered.
    pub fn new() -> Self {
        let runtime = Runtime::new();
        corelib::register(&runtime);
        Engine { runtime }
    }

    /// Create an engine without the `core` library, for sandboxed hosts
    /// that provide their own functions.
    pub fn new_bare() -> Self {
        Engine {
            runtime: Runtime::new(),
        }
    }

    /// Create an engine with explicit runtime parameters.
    pub fn with_params(params: RuntimeParams) -> Result<Self> {
        let runtime = Runtime::with_params(params)?;
        corelib::register(&runtime);
        Ok(Engine { runtime })
    }

    /// The shared runtime, for advanced use.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Get a library by name, creating it on first use.
    pub fn library(&self, name: &str) -> Arc<Library> {
        self.runtime.library(name)
    }

    // ------------------------------------------------------------------------
    // Compilation and execution
    // ------------------------------------------------------------------------

    /// Compile source text to bytecode. `unique_name` identifies the
    /// script in diagnostics; `imports` are implicit library imports in
    /// addition to any `import` statements in the source. The `core`
    /// library, when registered, is always importable without an explicit
    /// import.
    pub fn compile(&self, source: &str, unique_name: &str, imports: &[&str]) -> Result<Bytecode> {
        let mut import_list: Vec<&str> = Vec::with_capacity(imports.len() + 1);
        if self.runtime.library_exists("core") && !imports.contains(&"core") {
            import_list.push("core");
        }
        import_list.extend_from_slice(imports);
        Ok(compile(&self.runtime, source, unique_name, &import_list)?)
    }

    /// Create a cooperative execution instance over compiled bytecode.
    pub fn create_script(&self, bytecode: Bytecode) -> Result<Script> {
        Ok(Script::new(Arc::clone(&self.runtime), bytecode)?)
    }

    /// Compile, create, and run one execution slice of a script. The
    /// returned script may be finished, waiting, or mid-slice; the host
    /// keeps ticking it with [`Script::execute`].
    pub fn execute_script(
        &self,
        source: &str,
        unique_name: &str,
        imports: &[&str],
    ) -> Result<Script> {
        let bytecode = self.compile(source, unique_name, imports)?;
        let mut script = self.create_script(bytecode)?;
        let status = script.execute();
        tracing::debug!(script = %unique_name, ?status, "executed script slice");
        if let Some(error) = script.error() {
            return Err(Error::Runtime(error.clone()));
        }
        Ok(script)
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a native function in a library from signature text.
    ///
    /// # Example
    ///
    /// ```rust
    /// use patter_embed::{Engine, Variant, Visibility};
    ///
    /// let engine = Engine::new();
    /// engine
    ///     .register_function("host", Visibility::Public, "greet {name}", |args| {
    ///         println!("Hello, {}!", args[0]);
    ///         Ok(Variant::Null)
    ///     })
    ///     .unwrap();
    /// ```
    pub fn register_function(
        &self,
        library: &str,
        visibility: Visibility,
        signature_text: &str,
        callback: impl Fn(&[Variant]) -> patter_core::Result<Variant> + Send + Sync + 'static,
    ) -> Result<RuntimeId> {
        let library = self.runtime.library(library);
        Ok(library.register_function(visibility, signature_text, callback)?)
    }

    /// Register a property with an initial value in a library.
    pub fn register_property(
        &self,
        library: &str,
        visibility: Visibility,
        read_only: bool,
        name: &str,
        value: Variant,
    ) -> Result<RuntimeId> {
        let library = self.runtime.library(library);
        Ok(library.register_property(visibility, read_only, name, value)?)
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn property_id(&self, library: &str, name: &str) -> Result<RuntimeId> {
        self.runtime
            .library(library)
            .property_id(name)
            .ok_or_else(|| Error::UnknownProperty {
                library: library.to_string(),
                name: name.to_string(),
            })
    }

    /// Read a property by library and name.
    pub fn get_property(&self, library: &str, name: &str) -> Result<Option<Variant>> {
        let id = self.property_id(library, name)?;
        Ok(self.runtime.get_property(id))
    }

    /// Write a property by library and name.
    pub fn set_property(&self, library: &str, name: &str, value: Variant) -> Result<()> {
        let id = self.property_id(library, name)?;
        Ok(self.runtime.set_property(id, value)?)
    }

    /// Aggregate compile/execute statistics, optionally resetting them.
    pub fn stats(&self, reset: bool) -> PerfStats {
        self.runtime.stats(reset)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
