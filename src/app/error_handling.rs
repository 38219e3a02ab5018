//! Error handling utilities

use tracing::error;

/// Exit code for usage and configuration problems
pub const ARGUMENT_ERROR: i32 = 2;
/// Exit code for everything else
pub const GENERAL_ERROR: i32 = 1;

/// Exit code appropriate for `error`.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    use crate::error::Error;

    match error.downcast_ref::<Error>() {
        Some(Error::Arguments(_) | Error::Config(_) | Error::Toml(_)) => ARGUMENT_ERROR,
        _ => GENERAL_ERROR,
    }
}

/// Handle fatal errors and exit with appropriate status code
///
/// In verbose mode the full error chain is printed as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code_for(&error))
}
