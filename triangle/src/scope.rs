//! Nested-scope symbol table shared by semantic analysis and code
//! generation. A table is a stack of frames; each frame maps names to a
//! payload and carries one frame-local auxiliary value (the code generator
//! keeps the current stack top there).

use indexmap::IndexMap;

struct Frame<T, A> {
    bindings: IndexMap<String, T>,
    aux: A,
}

pub struct SymbolTable<T, A> {
    frames: Vec<Frame<T, A>>,
}

impl<T, A> SymbolTable<T, A> {
    /// A table whose always-present outermost frame holds `globals`.
    pub fn new(globals: IndexMap<String, T>, aux: A) -> Self {
        SymbolTable { frames: vec![Frame { bindings: globals, aux }] }
    }

    pub fn enter_scope(&mut self, aux: A) {
        self.frames.push(Frame { bindings: IndexMap::new(), aux });
    }

    pub fn exit_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot exit the global scope");
        self.frames.pop();
    }

    /// Binds in the top frame only; shadows any outer binding.
    pub fn add(&mut self, name: impl Into<String>, payload: T) {
        let frame = self.frames.last_mut().expect("symbol table has no frames");
        frame.bindings.insert(name.into(), payload);
    }

    /// First match from the innermost frame outward.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.lookup_with_depth(name).map(|(payload, _)| payload)
    }

    /// Like `lookup`, also reporting how many frames out the binding sits
    /// (0 is the innermost frame).
    pub fn lookup_with_depth(&self, name: &str) -> Option<(&T, usize)> {
        self.frames
            .iter()
            .rev()
            .enumerate()
            .find_map(|(depth, frame)| frame.bindings.get(name).map(|payload| (payload, depth)))
    }

    pub fn local_aux(&self) -> A
    where
        A: Copy,
    {
        self.frames.last().expect("symbol table has no frames").aux
    }

    pub fn set_local_aux(&mut self, aux: A) {
        self.frames.last_mut().expect("symbol table has no frames").aux = aux;
    }
}
