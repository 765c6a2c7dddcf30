use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// File extension used by procedure files (`1_CTI06.RTS`).
pub const PROCEDURE_EXTENSION: &str = "rts";

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home().join(rest);
    }
    PathBuf::from(trimmed)
}

/// True when the path names a procedure file, matching the extension case-insensitively.
pub fn is_procedure_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(PROCEDURE_EXTENSION))
}

/// Procedure identifier derived from a file name (`1_CTI06.RTS` → `1_CTI06`).
pub fn procedure_id_from_path(path: &Path) -> Option<String> {
    path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_procedure_files_in_any_case() {
        assert!(is_procedure_file(Path::new("/rts/1_CTI06.RTS")));
        assert!(is_procedure_file(Path::new("1_4_CTI.rts")));
        assert!(!is_procedure_file(Path::new("FOT_REQUEST.txt")));
        assert!(!is_procedure_file(Path::new("RTS")));
    }

    #[test]
    fn derives_identifier_from_stem() {
        assert_eq!(procedure_id_from_path(Path::new("/rts/1_CTI06.RTS")).as_deref(), Some("1_CTI06"));
    }

    #[test]
    fn leaves_plain_paths_alone() {
        assert_eq!(expand_tilde(" /etc/rts "), PathBuf::from("/etc/rts"));
    }
}
