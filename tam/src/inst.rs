use crate::reg::Register;
use std::fmt;

/// A code or data address: displacement `d` relative to register `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub r: Register,
    pub d: i32,
}

impl Address {
    pub fn new(r: Register, d: i32) -> Self {
        Address { r, d }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.d, self.r)
    }
}

/// The TAM instruction set. Every instruction encodes to a 4-tuple
/// `(op, r, n, d)` of signed 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Push `n` words read from `addr`.
    Load { n: i32, addr: Address },
    /// Push the address `addr`.
    LoadA { addr: Address },
    /// Pop an address, push the `n` words stored there.
    LoadI { n: i32 },
    /// Push the literal word `d`.
    LoadL { d: i32 },
    /// Pop `n` words, write them to `addr`.
    Store { n: i32, addr: Address },
    /// Pop an address, pop `n` words, write them there.
    StoreI { n: i32 },
    /// Call the routine at `addr`, taking the static link from
    /// `static_link`.
    Call { static_link: Register, addr: Address },
    /// Pop a closure (static link, code address) and call it.
    CallI,
    /// Return, keeping `n` result words and popping `d` argument words.
    Return { n: i32, d: i32 },
    /// Grow the stack by `d` uninitialized words.
    Push { d: i32 },
    /// Pop `d` words buried beneath the top `n` words.
    Pop { n: i32, d: i32 },
    Jump { addr: Address },
    /// Pop a code address and jump to it.
    JumpI,
    /// Pop a word; jump to `addr` iff it equals `n`.
    JumpIf { n: i32, addr: Address },
    Halt,
}

impl Instruction {
    /// The `(op, r, n, d)` encoding of this instruction.
    pub fn words(&self) -> [i32; 4] {
        let reg = |r: Register| i32::from(u8::from(r));
        match *self {
            Instruction::Load { n, addr } => [0, reg(addr.r), n, addr.d],
            Instruction::LoadA { addr } => [1, reg(addr.r), 0, addr.d],
            Instruction::LoadI { n } => [2, 0, n, 0],
            Instruction::LoadL { d } => [3, 0, 0, d],
            Instruction::Store { n, addr } => [4, reg(addr.r), n, addr.d],
            Instruction::StoreI { n } => [5, 0, n, 0],
            Instruction::Call { static_link, addr } => [6, reg(addr.r), reg(static_link), addr.d],
            Instruction::CallI => [7, 0, 0, 0],
            Instruction::Return { n, d } => [8, 0, n, d],
            Instruction::Push { d } => [10, 0, 0, d],
            Instruction::Pop { n, d } => [11, 0, n, d],
            Instruction::Jump { addr } => [12, reg(addr.r), 0, addr.d],
            Instruction::JumpI => [13, 0, 0, 0],
            Instruction::JumpIf { n, addr } => [14, reg(addr.r), n, addr.d],
            Instruction::Halt => [15, 0, 0, 0],
        }
    }

    /// Decode an `(op, r, n, d)` tuple. Returns `None` for an unknown opcode
    /// or register field.
    pub fn from_words(words: [i32; 4]) -> Option<Instruction> {
        let [op, r, n, d] = words;
        let reg = |w: i32| u8::try_from(w).ok().and_then(|b| Register::try_from(b).ok());
        Some(match op {
            0 => Instruction::Load { n, addr: Address::new(reg(r)?, d) },
            1 => Instruction::LoadA { addr: Address::new(reg(r)?, d) },
            2 => Instruction::LoadI { n },
            3 => Instruction::LoadL { d },
            4 => Instruction::Store { n, addr: Address::new(reg(r)?, d) },
            5 => Instruction::StoreI { n },
            6 => Instruction::Call { static_link: reg(n)?, addr: Address::new(reg(r)?, d) },
            7 => Instruction::CallI,
            8 => Instruction::Return { n, d },
            10 => Instruction::Push { d },
            11 => Instruction::Pop { n, d },
            12 => Instruction::Jump { addr: Address::new(reg(r)?, d) },
            13 => Instruction::JumpI,
            14 => Instruction::JumpIf { n, addr: Address::new(reg(r)?, d) },
            15 => Instruction::Halt,
            _ => return None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Load { n, addr } => write!(f, "LOAD({n}) {addr}"),
            Instruction::LoadA { addr } => write!(f, "LOADA {addr}"),
            Instruction::LoadI { n } => write!(f, "LOADI({n})"),
            Instruction::LoadL { d } => write!(f, "LOADL {d}"),
            Instruction::Store { n, addr } => write!(f, "STORE({n}) {addr}"),
            Instruction::StoreI { n } => write!(f, "STOREI({n})"),
            Instruction::Call { static_link, addr } => write!(f, "CALL({static_link}) {addr}"),
            Instruction::CallI => write!(f, "CALLI"),
            Instruction::Return { n, d } => write!(f, "RETURN({n}) {d}"),
            Instruction::Push { d } => write!(f, "PUSH {d}"),
            Instruction::Pop { n, d } => write!(f, "POP({n}) {d}"),
            Instruction::Jump { addr } => write!(f, "JUMP {addr}"),
            Instruction::JumpI => write!(f, "JUMPI"),
            Instruction::JumpIf { n, addr } => write!(f, "JUMPIF({n}) {addr}"),
            Instruction::Halt => write!(f, "HALT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_inst {
        ($($name:ident: $inst:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let inst: Instruction = $inst;
                    let words = inst.words();
                    let back = Instruction::from_words(words);
                    assert_eq!(back, Some(inst));
                }
            )*
        }
    }

    test_inst! {
        test_load: Instruction::Load { n: 2, addr: Address::new(Register::LB, 3) },
        test_loada: Instruction::LoadA { addr: Address::new(Register::L1, -4) },
        test_loadi: Instruction::LoadI { n: 1 },
        test_loadl: Instruction::LoadL { d: 42 },
        test_store: Instruction::Store { n: 1, addr: Address::new(Register::SB, 0) },
        test_storei: Instruction::StoreI { n: 3 },
        test_call: Instruction::Call { static_link: Register::SB, addr: Address::new(Register::PB, 22) },
        test_calli: Instruction::CallI,
        test_return: Instruction::Return { n: 1, d: 2 },
        test_push: Instruction::Push { d: 5 },
        test_pop: Instruction::Pop { n: 1, d: 4 },
        test_jump: Instruction::Jump { addr: Address::new(Register::CB, 17) },
        test_jumpi: Instruction::JumpI,
        test_jumpif: Instruction::JumpIf { n: 0, addr: Address::new(Register::CB, 9) },
        test_halt: Instruction::Halt,
    }

    #[test]
    fn call_packs_static_link_in_n() {
        let call = Instruction::Call {
            static_link: Register::LB,
            addr: Address::new(Register::CB, 12),
        };
        assert_eq!(call.words(), [6, 0, 8, 12]);
    }

    #[test]
    fn unknown_opcode_rejected() {
        assert_eq!(Instruction::from_words([9, 0, 0, 0]), None);
        assert_eq!(Instruction::from_words([16, 0, 0, 0]), None);
    }
}
