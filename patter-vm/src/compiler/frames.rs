// patter-vm - Compile-time variable frame tracking
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compile-time tracking of variable names across frames and scopes.
//!
//! The compiler needs to know which names are variables (to distinguish
//! them from function name parts and properties) and how many words the
//! longest variable name in the current frame uses, which bounds the
//! multi-word longest-match lookup. Frames correspond to function bodies;
//! scopes to lexical blocks within a frame.

use std::collections::HashSet;

#[derive(Debug, Default)]
struct Frame {
    scopes: Vec<HashSet<String>>,
    max_parts: usize,
}

impl Frame {
    fn new() -> Self {
        Frame {
            scopes: vec![HashSet::new()],
            max_parts: 0,
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }
}

/// Frame and scope bookkeeping for the compiler.
#[derive(Debug)]
pub struct VariableFrames {
    frames: Vec<Frame>,
}

impl VariableFrames {
    /// Start with the root frame and its root scope.
    pub fn new() -> Self {
        VariableFrames {
            frames: vec![Frame::new()],
        }
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("at least the root frame exists")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("at least the root frame exists")
    }

    /// Register a variable assignment in the current scope. Assigning an
    /// existing name is a plain re-assignment, not a new binding.
    pub fn assign(&mut self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("variable name cannot be empty".into());
        }
        let words = name.split(' ').filter(|w| !w.is_empty()).count();
        let frame = self.frame_mut();
        frame.max_parts = frame.max_parts.max(words);
        if !frame.contains(name) {
            let scope = frame
                .scopes
                .last_mut()
                .ok_or_else(|| "no active scope".to_string())?;
            scope.insert(name.to_string());
        }
        Ok(())
    }

    /// Whether the name is a known variable in the current frame.
    pub fn exists(&self, name: &str) -> bool {
        self.frame().contains(name)
    }

    /// Maximum word count of any variable assigned in the current frame.
    pub fn max_parts(&self) -> usize {
        self.frame().max_parts
    }

    /// Enter a function body.
    pub fn frame_begin(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Leave a function body.
    pub fn frame_end(&mut self) -> Result<(), String> {
        if self.frames.len() <= 1 {
            return Err("cannot end the root frame".into());
        }
        self.frames.pop();
        Ok(())
    }

    /// Enter a lexical block.
    pub fn scope_begin(&mut self) {
        self.frame_mut().scopes.push(HashSet::new());
    }

    /// Leave a lexical block, dropping its bindings.
    pub fn scope_end(&mut self) -> Result<(), String> {
        let frame = self.frame_mut();
        if frame.scopes.len() <= 1 {
            return Err("cannot end the root scope".into());
        }
        frame.scopes.pop();
        Ok(())
    }

    /// Whether the compiler is in the root (script-level) frame.
    pub fn is_root_frame(&self) -> bool {
        self.frames.len() == 1
    }

    /// Whether the compiler is in the root scope of the current frame.
    pub fn is_root_scope(&self) -> bool {
        self.frame().scopes.len() == 1
    }

    /// Number of scopes open in the current frame; break statements use
    /// this to unwind the scopes they jump out of.
    pub fn scope_depth(&self) -> usize {
        self.frame().scopes.len()
    }
}

impl Default for VariableFrames {
    fn default() -> Self {
        Self::new()
    }
}
