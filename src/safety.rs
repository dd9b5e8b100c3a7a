//! Safety utilities to prevent clobbering input files.
//!
//! The CLI reads a playlist and recorded responses and writes a report. These
//! checks make sure a mistyped `--output` never overwrites one of the inputs.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Resolve a path for comparison, following symlinks when it exists.
fn comparable(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that an output path is safe to write.
///
/// Checks:
/// - Output must have the required extension (e.g. "json")
/// - Output cannot be the same file as any of the provided input paths
pub fn validate_output_path(output: &Path, required_extension: &str, input_paths: &[&Path]) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extension.eq_ignore_ascii_case(required_extension) {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            required_extension
        );
    }

    let output_resolved = comparable(output);
    for input in input_paths {
        if output == *input || output_resolved == comparable(input) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    Ok(())
}
