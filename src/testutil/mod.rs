//! Test-only helpers for synthesizing ELF32 object and archive byte buffers,
//! since this crate has no assembler of its own to produce real `.o` files
//! from. Not part of the public API; compiled only under `#[cfg(test)]`.

pub mod builder;
