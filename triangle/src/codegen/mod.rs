pub mod backpatch;
pub mod ir;
pub mod irgen;
pub mod writer;
