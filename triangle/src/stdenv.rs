//! The standard environment: the types and terms every Triangle program
//! sees without declaring them, and the mapping from builtin names to TAM
//! primitives used by the code generator.

use crate::types::Type;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tam::Primitive;

fn func(params: Vec<Type>, ret: Type) -> Type {
    Type::Func(params, Box::new(ret))
}

/// Builtin type names.
pub static STD_TYPES: Lazy<IndexMap<String, Type>> = Lazy::new(|| {
    let mut types = IndexMap::new();
    types.insert("Integer".to_string(), Type::Int);
    types.insert("Char".to_string(), Type::Char);
    types.insert("Boolean".to_string(), Type::Bool);
    types
});

/// Builtin term names and their types.
pub static STD_TERMS: Lazy<IndexMap<String, Type>> = Lazy::new(|| {
    let relation = func(vec![Type::Bool, Type::Bool], Type::Bool);
    let int_relation = func(vec![Type::Int, Type::Int], Type::Bool);
    let int_binary = func(vec![Type::Int, Type::Int], Type::Int);
    let int_unary = func(vec![Type::Int], Type::Int);

    let mut terms = IndexMap::new();

    terms.insert("\\/".to_string(), relation.clone());
    terms.insert("/\\".to_string(), relation);
    terms.insert("\\".to_string(), func(vec![Type::Bool], Type::Bool));

    terms.insert("<".to_string(), int_relation.clone());
    terms.insert("<=".to_string(), int_relation.clone());
    terms.insert(">".to_string(), int_relation.clone());
    terms.insert(">=".to_string(), int_relation);

    terms.insert("+".to_string(), int_binary.clone());
    terms.insert("-".to_string(), int_binary.clone());
    terms.insert("*".to_string(), int_binary.clone());
    terms.insert("/".to_string(), int_binary.clone());
    terms.insert("//".to_string(), int_binary);

    terms.insert("|".to_string(), int_unary.clone());
    terms.insert("++".to_string(), int_unary.clone());
    terms.insert("**".to_string(), int_unary.clone());

    // equality is special-cased by the checker before these are consulted
    terms.insert("=".to_string(), Type::Void);
    terms.insert("\\=".to_string(), Type::Void);

    terms.insert("id".to_string(), int_unary.clone());
    terms.insert("succ".to_string(), int_unary.clone());
    terms.insert("pred".to_string(), int_unary.clone());
    terms.insert("neg".to_string(), int_unary);

    terms.insert("get".to_string(), func(vec![Type::Ref(Box::new(Type::Char))], Type::Void));
    terms.insert("put".to_string(), func(vec![Type::Char], Type::Void));
    terms.insert("getint".to_string(), func(vec![Type::Ref(Box::new(Type::Int))], Type::Void));
    terms.insert("putint".to_string(), func(vec![Type::Int], Type::Void));
    terms.insert("geteol".to_string(), func(vec![], Type::Void));
    terms.insert("puteol".to_string(), func(vec![], Type::Void));
    terms.insert("eol".to_string(), func(vec![], Type::Bool));
    terms.insert("eof".to_string(), func(vec![], Type::Bool));

    terms.insert("chr".to_string(), func(vec![Type::Int], Type::Char));
    terms.insert("ord".to_string(), func(vec![Type::Char], Type::Int));

    terms.insert("new".to_string(), func(vec![Type::Int], Type::Int));
    terms.insert("dispose".to_string(), func(vec![Type::Int], Type::Void));

    terms
});

/// Builtin names realized directly by TAM primitive routines.
pub static PRIMITIVES: Lazy<IndexMap<String, Primitive>> = Lazy::new(|| {
    let mut primitives = IndexMap::new();

    primitives.insert("id".to_string(), Primitive::Id);
    primitives.insert("\\".to_string(), Primitive::Not);
    primitives.insert("/\\".to_string(), Primitive::And);
    primitives.insert("\\/".to_string(), Primitive::Or);

    primitives.insert("succ".to_string(), Primitive::Succ);
    primitives.insert("pred".to_string(), Primitive::Pred);
    primitives.insert("neg".to_string(), Primitive::Neg);
    primitives.insert("+".to_string(), Primitive::Add);
    primitives.insert("-".to_string(), Primitive::Sub);
    primitives.insert("*".to_string(), Primitive::Mult);
    primitives.insert("/".to_string(), Primitive::Div);
    primitives.insert("//".to_string(), Primitive::Mod);

    primitives.insert("<".to_string(), Primitive::Lt);
    primitives.insert("<=".to_string(), Primitive::Le);
    primitives.insert(">=".to_string(), Primitive::Ge);
    primitives.insert(">".to_string(), Primitive::Gt);
    primitives.insert("=".to_string(), Primitive::Eq);
    primitives.insert("\\=".to_string(), Primitive::Ne);

    primitives.insert("eol".to_string(), Primitive::Eol);
    primitives.insert("eof".to_string(), Primitive::Eof);
    primitives.insert("get".to_string(), Primitive::Get);
    primitives.insert("put".to_string(), Primitive::Put);
    primitives.insert("geteol".to_string(), Primitive::Geteol);
    primitives.insert("puteol".to_string(), Primitive::Puteol);
    primitives.insert("getint".to_string(), Primitive::Getint);
    primitives.insert("putint".to_string(), Primitive::Putint);
    primitives.insert("new".to_string(), Primitive::New);
    primitives.insert("dispose".to_string(), Primitive::Dispose);

    primitives
});
