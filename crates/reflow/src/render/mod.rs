pub mod assemble;
pub mod cleanup;
