//! `RTSLOAD` request parsing.
//!
//! A request line names a procedure and carries its load-time settings:
//!
//! ```text
//! RTSLOAD,1_CTI06,SCS_NUM=135,NUM_HOURS=001:15:00:00
//! ```
//!
//! `SCS_NUM` picks the slot and `PRIORITY` the tie-break priority; every other
//! `KEY=VALUE` field is a parameter binding. Request files may also carry a
//! `SCS_CATEGORY, <name>` header, blank lines, and `!` comments.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rts_types::SlotId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::procedure::BindingError;

pub const RTSLOAD_KEYWORD: &str = "RTSLOAD";
pub const SLOT_KEY: &str = "SCS_NUM";
pub const PRIORITY_KEY: &str = "PRIORITY";
pub const CATEGORY_KEYWORD: &str = "SCS_CATEGORY";

/// One parsed `RTSLOAD` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub procedure: String,
    /// Requested slot; `None` lets the scheduler pick the lowest free one.
    #[serde(default)]
    pub slot: Option<SlotId>,
    #[serde(default)]
    pub priority: Option<u32>,
    /// Category from the enclosing request file header, if any.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub bindings: IndexMap<String, String>,
}

impl LoadRequest {
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            slot: None,
            priority: None,
            category: None,
            bindings: IndexMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: SlotId) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct RequestError {
    pub line: usize,
    pub kind: RequestErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestErrorKind {
    #[error("expected an RTSLOAD line, found '{0}'")]
    NotALoad(String),
    #[error("RTSLOAD names no procedure")]
    MissingProcedure,
    #[error("expected KEY=VALUE, found '{0}'")]
    MalformedField(String),
    #[error("invalid SCS_NUM '{0}'")]
    InvalidSlot(String),
    #[error("invalid PRIORITY '{0}'")]
    InvalidPriority(String),
    #[error("{0} given more than once")]
    DuplicateSetting(&'static str),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Parses a single `RTSLOAD` line.
pub fn parse_load_request(line: &str) -> Result<LoadRequest, RequestError> {
    parse_line(line).map_err(|kind| RequestError { line: 1, kind })
}

/// Parses a request file: optional `SCS_CATEGORY` header plus any number of `RTSLOAD` lines.
pub fn parse_request_file(text: &str) -> Result<Vec<LoadRequest>, RequestError> {
    let mut category: Option<String> = None;
    let mut requests = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let keyword = line.split(',').next().unwrap_or_default().trim();
        if keyword.eq_ignore_ascii_case(CATEGORY_KEYWORD) {
            category = line.split_once(',').map(|(_, name)| name.trim().to_string()).filter(|name| !name.is_empty());
            continue;
        }
        let mut request = parse_line(line).map_err(|kind| RequestError { line: index + 1, kind })?;
        request.category = category.clone();
        requests.push(request);
    }

    debug!(requests = requests.len(), category = ?category, "parsed request file");
    Ok(requests)
}

/// Reads and parses a request file from disk.
pub fn load_request_file(path: &Path) -> Result<Vec<LoadRequest>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read request file: {}", path.display()))?;
    parse_request_file(&text).with_context(|| format!("Invalid request file: {}", path.display()))
}

fn parse_line(line: &str) -> Result<LoadRequest, RequestErrorKind> {
    let mut fields = line.split(',').map(str::trim);
    let keyword = fields.next().unwrap_or_default();
    if !keyword.eq_ignore_ascii_case(RTSLOAD_KEYWORD) {
        return Err(RequestErrorKind::NotALoad(line.to_string()));
    }
    let procedure = fields.next().filter(|name| !name.is_empty()).ok_or(RequestErrorKind::MissingProcedure)?;
    let mut request = LoadRequest::new(procedure);

    for field in fields.filter(|field| !field.is_empty()) {
        let (key, value) = field
            .split_once('=')
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| RequestErrorKind::MalformedField(field.to_string()))?;

        if key.eq_ignore_ascii_case(SLOT_KEY) {
            let slot = value.parse::<u32>().map_err(|_| RequestErrorKind::InvalidSlot(value.to_string()))?;
            if request.slot.replace(SlotId(slot)).is_some() {
                return Err(RequestErrorKind::DuplicateSetting(SLOT_KEY));
            }
        } else if key.eq_ignore_ascii_case(PRIORITY_KEY) {
            let priority = value.parse::<u32>().map_err(|_| RequestErrorKind::InvalidPriority(value.to_string()))?;
            if request.priority.replace(priority).is_some() {
                return Err(RequestErrorKind::DuplicateSetting(PRIORITY_KEY));
            }
        } else if request.bindings.insert(key.to_string(), value.to_string()).is_some() {
            return Err(BindingError::Duplicate { name: key.to_string() }.into());
        }
    }
    Ok(request)
}
