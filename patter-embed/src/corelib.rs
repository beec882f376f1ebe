// patter-embed - The core library
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The `core` library registered by [`crate::Engine::new`]: basic output,
//! size queries, loop-iterator accessors, and guid creation. Hosts that
//! want a sealed environment use `Engine::new_bare` and register their
//! own functions instead.

use std::sync::Arc;

use patter_core::{Runtime, RuntimeError, Visibility};
use patter_lang::{Uuid, Variant};

/// Register the core library into a runtime.
pub fn register(runtime: &Arc<Runtime>) {
    let library = runtime.library("core");

    // Registration of a fixed set of valid signatures into a fresh
    // library cannot fail; a duplicate would mean register was called
    // twice, which is fine to ignore.
    let _ = library.register_function(Visibility::Public, "write {}", |args| {
        for value in args {
            print!("{}", value);
        }
        Ok(Variant::Null)
    });

    let _ = library.register_function(Visibility::Public, "write line {}", |args| {
        for value in args {
            print!("{}", value);
        }
        println!();
        Ok(Variant::Null)
    });

    let _ = library.register_function(Visibility::Public, "return {} size", |args| {
        match args.first() {
            Some(Variant::Collection(c)) => Ok(Variant::Integer(c.len() as i64)),
            Some(Variant::String(s)) => Ok(Variant::Integer(s.chars().count() as i64)),
            Some(Variant::Buffer(b)) => Ok(Variant::Integer(b.len() as i64)),
            Some(other) => Err(RuntimeError::TypeMismatch {
                operation: "size",
                lhs: "collection or string",
                rhs: other.type_name(),
            }),
            None => Err(RuntimeError::native("size requires a value")),
        }
    });

    let _ = library.register_function(Visibility::Public, "return {} key", |args| {
        match args.first() {
            Some(Variant::Iterator(itr)) => Ok(itr.key().unwrap_or(Variant::Null)),
            Some(other) => Err(RuntimeError::TypeMismatch {
                operation: "key",
                lhs: "loop iterator",
                rhs: other.type_name(),
            }),
            None => Err(RuntimeError::native("key requires a value")),
        }
    });

    let _ = library.register_function(Visibility::Public, "return {} value", |args| {
        match args.first() {
            Some(Variant::Iterator(itr)) => Ok(itr.value().unwrap_or(Variant::Null)),
            Some(other) => Err(RuntimeError::TypeMismatch {
                operation: "value",
                lhs: "loop iterator",
                rhs: other.type_name(),
            }),
            None => Err(RuntimeError::native("value requires a value")),
        }
    });

    let _ = library.register_function(Visibility::Public, "return new guid", |_args| {
        Ok(Variant::Guid(Uuid::new_v4()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_functions_registered() {
        let runtime = Runtime::new();
        register(&runtime);
        let library = runtime.library("core");

        use patter_core::CallPart;
        let name = |t: &str| CallPart::Name(t.to_string());

        assert!(library
            .find_function(&[name("write"), CallPart::Parameter])
            .is_some());
        assert!(library
            .find_function(&[name("write"), name("line"), CallPart::Parameter])
            .is_some());
        assert!(library
            .find_function(&[CallPart::Parameter, name("size")])
            .is_some());
        assert!(library.find_function(&[name("new"), name("guid")]).is_some());
    }

    #[test]
    fn test_register_twice_is_harmless() {
        let runtime = Runtime::new();
        register(&runtime);
        register(&runtime);
    }
}
