//! Compiler configuration

/// Default ceiling on the declared DMAR length.
///
/// Real platforms describe a handful of hardware units; anything past a page
/// is treated as corrupt firmware rather than parsed.
pub const DEFAULT_MAX_TABLE_LENGTH: usize = 4096;

/// Limits applied while compiling the DMAR table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Largest `Header.Length` accepted before any record is parsed.
    pub max_table_length: usize,
}

impl CompilerConfig {
    pub const DEFAULT: Self = Self {
        max_table_length: DEFAULT_MAX_TABLE_LENGTH,
    };
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
