//! Label resolution. Labels occupy no space in the final code, so the
//! offset of a label at source index `i` with `k` labels already seen is
//! `i - k`; the second pass drops the labels and rewrites every
//! label-bearing pseudo-instruction to a CB-relative address.

use super::ir::{Instruction, Label};
use indexmap::IndexMap;
use tam::{Address, Register};

pub fn backpatch(instructions: Vec<Instruction>) -> Vec<tam::Instruction> {
    let mut locations: IndexMap<Label, i32> = IndexMap::new();
    let mut seen = 0;
    for (index, instruction) in instructions.iter().enumerate() {
        if let Instruction::Label(label) = instruction {
            locations.insert(*label, index as i32 - seen);
            seen += 1;
        }
    }

    let code_address = |label: Label| Address::new(Register::CB, locations[&label]);

    instructions
        .into_iter()
        .filter_map(|instruction| match instruction {
            Instruction::Label(_) => None,
            Instruction::CallLabel(static_link, label) => Some(tam::Instruction::Call {
                static_link,
                addr: code_address(label),
            }),
            Instruction::JumpLabel(label) => {
                Some(tam::Instruction::Jump { addr: code_address(label) })
            }
            Instruction::JumpIfLabel(value, label) => Some(tam::Instruction::JumpIf {
                n: value,
                addr: code_address(label),
            }),
            Instruction::LoadALabel(label) => {
                Some(tam::Instruction::LoadA { addr: code_address(label) })
            }
            Instruction::Tam(instruction) => Some(instruction),
        })
        .collect()
}
