//! Object file emission: one 16-byte record per instruction, the four
//! fields `op, r, n, d` written as big-endian signed 32-bit integers, with
//! no header or padding.

use std::io::{self, Write};

pub struct ObjectWriter<W: Write> {
    out: W,
}

impl<W: Write> ObjectWriter<W> {
    pub fn new(out: W) -> Self {
        ObjectWriter { out }
    }

    pub fn write(&mut self, instructions: &[tam::Instruction]) -> io::Result<()> {
        for instruction in instructions {
            for word in instruction.words() {
                self.out.write_all(&word.to_be_bytes())?;
            }
        }
        self.out.flush()
    }
}
