use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumString};

/// TAM register file. CB/CT bound the code segment, PB/PT the primitive
/// segment, SB/ST the data stack, HB/HT the heap. LB and L1..L6 form the
/// display: LB is the base of the current activation record, Ln the base of
/// the record n static levels out.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum Register {
    CB,
    CT,
    PB,
    PT,
    SB,
    ST,
    HB,
    HT,
    LB,
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
    CP,
}

impl Register {
    /// Display register addressing the frame `level` static levels out from
    /// the current one. Returns `None` past the reach of the display.
    pub fn display(level: usize) -> Option<Register> {
        match level {
            0 => Some(Register::LB),
            1 => Some(Register::L1),
            2 => Some(Register::L2),
            3 => Some(Register::L3),
            4 => Some(Register::L4),
            5 => Some(Register::L5),
            6 => Some(Register::L6),
            _ => None,
        }
    }
}
