//! Symbol classification types.

/// Source language inferred from a linkage name's mangling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (`_R` v0 mangling or legacy `_ZN…E` mangling).
    Rust,
    /// C++ symbol (Itanium mangling).
    Cpp,
    /// Unmangled name, typically C or assembly.
    C,
}

impl SymbolLanguage
{
    /// `true` if names in this language need demangling.
    pub fn is_mangled(self) -> bool
    {
        !matches!(self, SymbolLanguage::C)
    }
}
