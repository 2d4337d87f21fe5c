//! Crate-wide error type for every fallible stage of the link: parsing
//! relocatable objects, walking archives, resolving symbols, and applying
//! relocations.

#[derive(thiserror::Error, Debug, PartialEq, Eq, Hash)]
/// Error type for failures anywhere in the link pipeline
pub enum Error {
    #[error("I/O error: {kind}")]
    /// A read, write, or seek against an input or output file failed
    Io {
        /// The underlying [`std::io::ErrorKind`]
        kind: std::io::ErrorKind,
    },
    #[error("malformed ELF object: {reason}")]
    /// An ELF header, section header, or symbol table entry could not be
    /// parsed, or an offset it names falls outside the buffer
    MalformedElf {
        /// Human-readable description of what was wrong
        reason: String,
    },
    #[error("expected a relocatable object (ET_REL), found e_type = {found}")]
    /// `e_type` was not `ET_REL` where a relocatable object was required
    WrongKind {
        /// The `e_type` value actually found
        found: u16,
    },
    #[error("unsupported machine type {machine}, this linker only supports EM_386")]
    /// `e_machine` was not `EM_386`
    UnsupportedArch {
        /// The `e_machine` value actually found
        machine: u16,
    },
    #[error("malformed archive: {reason}")]
    /// A `.a` archive's magic, member header, or symbol index was malformed
    MalformedArchive {
        /// Human-readable description of what was wrong
        reason: String,
    },
    #[error("too many input files")]
    /// More input paths were given than the driver supports
    TooManyInputs,
    #[error("{name} undefined")]
    /// A referenced symbol was never defined by any loaded object or archive
    /// member
    UndefinedSymbol {
        /// The undefined symbol's name
        name: String,
    },
    #[error("unsupported relocation type {kind}")]
    /// A relocation entry named a type this linker does not implement
    UnsupportedReloc {
        /// The raw `r_info` relocation type
        kind: u32,
    },
    #[error("missing entry point symbol {symbol}")]
    /// The output has no resolvable entry point
    MissingEntry {
        /// The entry point symbol name (`_start`)
        symbol: String,
    },
    #[error("capacity exceeded: too many {what}")]
    /// A fixed-capacity table overflowed (growable containers make this
    /// effectively unreachable, see DESIGN.md)
    CapacityExceeded {
        /// What kind of table overflowed
        what: &'static str,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io { kind: err.kind() }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
