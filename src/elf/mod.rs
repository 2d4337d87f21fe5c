//! ELF32 little-endian data structures, specialized to exactly the
//! configuration this linker reads and writes: i386 relocatable objects in,
//! an i386 executable out.

pub mod header;
pub mod ident;
pub mod primitive;
pub mod program;
pub mod relocation;
pub mod section;
pub mod symbol;
