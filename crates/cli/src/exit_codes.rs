//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: the nightly dataset job
//! branches on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                              |
//! |---------|-----------|------------------------------------------|
//! | 0       | Universal | Success                                  |
//! | 2       | Universal | CLI usage error (bad args, missing file) |
//! | 60-69   | merge     | Dataset merge codes                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
/// A run that produced diagnostics still exits 0 unless `--strict` is set.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, config file missing or unreadable.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Merge (60-69)
// =============================================================================

/// Config file parsed but invalid (bad TOML, tier order, unknown legacy tier).
pub const EXIT_MERGE_INVALID_CONFIG: u8 = 60;

/// An input file is missing required structure or cannot be read
/// (observation JSON, mapping CSV, override JSON, persisted index).
pub const EXIT_MERGE_MALFORMED_INPUT: u8 = 61;

/// Output could not be rendered or committed. The previous output tree is
/// left in place. A README stats refresh that fails after the commit only
/// logs a warning.
pub const EXIT_MERGE_WRITE: u8 = 62;

/// Run succeeded but produced diagnostics (unmapped ids, ambiguous
/// mappings, conflicting overrides) and `--strict` was given.
pub const EXIT_MERGE_DIAGNOSTICS: u8 = 63;
