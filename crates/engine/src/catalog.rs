//! Procedure sources keyed by identifier.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rts_types::Procedure;
use rts_util::{is_procedure_file, procedure_id_from_path};
use tracing::{debug, warn};

use crate::{error::LoadError, procedure::parse_procedure};

/// Holds procedure text by identifier. Parsing happens on lookup, so a broken
/// file only fails the loads that name it.
#[derive(Debug, Clone, Default)]
pub struct ProcedureCatalog {
    sources: IndexMap<String, String>,
}

impl ProcedureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every `*.RTS` file in `directory`, keyed by file stem.
    pub fn from_dir(directory: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        let entries = fs::read_dir(directory).with_context(|| format!("Failed to read procedure directory: {}", directory.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.with_context(|| format!("Failed to list procedure directory: {}", directory.display()))?.path();
            if path.is_file() && is_procedure_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let Some(identifier) = procedure_id_from_path(&path) else {
                warn!(path = %path.display(), "skipping procedure file without a usable name");
                continue;
            };
            let source = fs::read_to_string(&path).with_context(|| format!("Failed to read procedure file: {}", path.display()))?;
            if catalog.sources.contains_key(&identifier) {
                warn!(procedure = %identifier, path = %path.display(), "duplicate procedure identifier; keeping the first");
                continue;
            }
            catalog.insert_source(identifier, source);
        }
        debug!(directory = %directory.display(), procedures = catalog.len(), "procedure catalog loaded");
        Ok(catalog)
    }

    /// Adds or replaces the source text for `identifier`.
    pub fn insert_source(&mut self, identifier: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(identifier.into(), source.into());
    }

    pub fn source(&self, identifier: &str) -> Option<&str> {
        self.sources.get(identifier).map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.sources.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Parses the procedure registered as `identifier`.
    pub fn procedure(&self, identifier: &str) -> Result<Procedure, LoadError> {
        let source = self
            .source(identifier)
            .ok_or_else(|| LoadError::UnknownProcedure(identifier.to_string()))?;
        parse_procedure(identifier, source).map_err(|source| LoadError::Parse {
            procedure: identifier.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_rts_files_by_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("1_CTI06.RTS"), "/CMD, OORMPEN\nACIS, WSPOW00000, DELTA=00:00:01").expect("write");
        fs::write(dir.path().join("notes.txt"), "not a procedure").expect("write");
        fs::write(dir.path().join("lower.rts"), "ACIS, A").expect("write");

        let catalog = ProcedureCatalog::from_dir(dir.path()).expect("catalog");
        assert_eq!(catalog.identifiers().collect::<Vec<_>>(), vec!["1_CTI06", "lower"]);

        let procedure = catalog.procedure("1_CTI06").expect("procedure");
        assert_eq!(procedure.identifier, "1_CTI06");
        assert_eq!(procedure.entries.len(), 2);
    }

    #[test]
    fn unknown_and_broken_procedures_fail_on_lookup() {
        let mut catalog = ProcedureCatalog::new();
        catalog.insert_source("BROKEN", "ACIS, A\nACIS, B");

        assert_eq!(catalog.procedure("MISSING"), Err(LoadError::UnknownProcedure("MISSING".into())));
        match catalog.procedure("BROKEN") {
            Err(LoadError::Parse { procedure, source }) => {
                assert_eq!(procedure, "BROKEN");
                assert_eq!(source.line, 2);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ProcedureCatalog::from_dir(&dir.path().join("absent")).is_err());
    }
}
