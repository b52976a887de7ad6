use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

/// Primitive routines resident in the primitive segment. The discriminant is
/// the routine's displacement from PB; calling one is an ordinary CALL with
/// the primitive segment as code base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Display)]
#[repr(i32)]
pub enum Primitive {
    Id = 1,
    Not = 2,
    And = 3,
    Or = 4,
    Succ = 5,
    Pred = 6,
    Neg = 7,
    Add = 8,
    Sub = 9,
    Mult = 10,
    Div = 11,
    Mod = 12,
    Lt = 13,
    Le = 14,
    Ge = 15,
    Gt = 16,
    Eq = 17,
    Ne = 18,
    Eol = 19,
    Eof = 20,
    Get = 21,
    Put = 22,
    Geteol = 23,
    Puteol = 24,
    Getint = 25,
    Putint = 26,
    New = 27,
    Dispose = 28,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacements() {
        assert_eq!(i32::from(Primitive::Id), 1);
        assert_eq!(i32::from(Primitive::Mult), 10);
        assert_eq!(i32::from(Primitive::Eq), 17);
        assert_eq!(i32::from(Primitive::Dispose), 28);
    }
}
