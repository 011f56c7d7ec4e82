//! Script I/O for the offline dump commands
//!
//! A path of `-` means stdin for reading and stdout for writing.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use super::errors::{CliError, CliResult};

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read a SQL script
pub fn read_script(path: &Path) -> CliResult<String> {
    let script = if is_stdio(path) {
        let mut buf = String::new();
        io::stdin().lock().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path).map_err(|e| {
            CliError::io_error(format!("Failed to read {}: {}", path.display(), e))
        })?
    };

    if script.trim().is_empty() {
        return Err(CliError::io_error("Empty script"));
    }
    Ok(script)
}

/// Write a SQL script; stdout when no path is given
pub fn write_script(path: Option<&Path>, script: &str) -> CliResult<()> {
    match path {
        Some(path) if !is_stdio(path) => fs::write(path, script).map_err(|e| {
            CliError::io_error(format!("Failed to write {}: {}", path.display(), e))
        }),
        _ => {
            let mut stdout = io::stdout();
            stdout.write_all(script.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");

        write_script(Some(&path), "SELECT 1;\n").unwrap();
        assert_eq!(read_script(&path).unwrap(), "SELECT 1;\n");
    }

    #[test]
    fn test_empty_script_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.sql");
        fs::write(&path, "  \n").unwrap();

        let err = read_script(&path).unwrap_err();
        assert_eq!(err.code_str(), "PGB_CLI_IO_ERROR");
    }

    #[test]
    fn test_missing_script_reports_path() {
        let err = read_script(Path::new("/nonexistent/dump.sql")).unwrap_err();
        assert!(err.message().contains("/nonexistent/dump.sql"));
    }
}
