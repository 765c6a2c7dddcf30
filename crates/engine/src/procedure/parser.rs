//! Procedure text parsing.
//!
//! An RTS file is a list of comma-separated lines. Lines starting with `!` and
//! blank lines are ignored. `PARAM` lines declare load-time parameters; every
//! other line is a command:
//!
//! ```text
//! ! LTCTI six chip run
//! PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
//! /CMD, OORMPEN
//! ACIS, WSVIDALLDN, DELTA=00:00:01.000
//! /CMD, 2S2STHV, 2S2STHV2=0, DELTA=00:00:01.000
//! /CMD, OORMPDS, DELTA=&NUM_HOURS&
//! ```
//!
//! `DELTA` is the wait after the previous command. Only the first command may
//! omit it (its offset is then zero); an explicit zero is always accepted.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rts_types::{
    ArgumentValue, BoundValue, CommandEntry, DurationParseError, OffsetSpec, ParameterDeclaration, ParameterDomain, Procedure,
    RtsDuration,
};
use thiserror::Error;
use tracing::debug;

/// Argument key carrying the relative offset.
pub const DELTA_KEY: &str = "DELTA";
/// Leading keyword of a parameter declaration line.
pub const PARAM_KEYWORD: &str = "PARAM";
/// Separator between enumeration members in `VALUES=`.
pub const ENUM_SEPARATOR: char = '|';

static PARAMETER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name regex should compile"));

/// Parse failure with the 1-based line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("malformed offset '{value}': {source}")]
    MalformedOffset {
        value: String,
        #[source]
        source: DurationParseError,
    },
    #[error("negative offset '{0}'")]
    NegativeOffset(String),
    #[error("empty DELTA value")]
    EmptyOffset,
    #[error("command '{0}' has no DELTA; only the first command may omit it")]
    MissingOffset(String),
    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),
    #[error("argument '{0}' appears more than once on the same command")]
    DuplicateArgument(String),
    #[error("reference to undeclared parameter '{0}'")]
    UndeclaredParameter(String),
    #[error("DELTA references parameter '{0}', which is not a duration")]
    OffsetParameterNotDuration(String),
    #[error("command line has no mnemonic")]
    MissingMnemonic,
    #[error("expected KEY=VALUE, found '{0}'")]
    MalformedArgument(String),
    #[error("'{0}' is not a valid parameter name")]
    InvalidParameterName(String),
    #[error("parameter declaration needs a name and a domain")]
    IncompleteDeclaration,
    #[error("unknown parameter domain '{0}'")]
    UnknownDomain(String),
    #[error("parameter '{parameter}' is missing {attribute}=")]
    MissingAttribute { parameter: String, attribute: &'static str },
    #[error("parameter '{parameter}' has unknown attribute '{attribute}'")]
    UnknownAttribute { parameter: String, attribute: String },
    #[error("parameter '{parameter}' has invalid {attribute} '{value}': {reason}")]
    InvalidAttribute {
        parameter: String,
        attribute: &'static str,
        value: String,
        reason: String,
    },
    #[error("parameter '{parameter}' has MIN {min} above MAX {max}")]
    InvertedBounds { parameter: String, min: RtsDuration, max: RtsDuration },
    #[error("parameter '{0}' declares no enumeration values")]
    EmptyEnumeration(String),
    #[error("default '{value}' of parameter '{parameter}' lies outside its domain")]
    DefaultOutsideDomain { parameter: String, value: String },
}

/// Parses procedure text into a [`Procedure`] identified by `identifier`.
pub fn parse_procedure(identifier: &str, source: &str) -> Result<Procedure, ParseError> {
    let mut parser = ProcedureParser::default();

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let fields = match split_fields(raw_line) {
            Some(fields) => fields,
            None => continue,
        };
        let outcome = if fields[0].eq_ignore_ascii_case(PARAM_KEYWORD) {
            parser.declare(&fields[1..])
        } else {
            parser.command(&fields)
        };
        outcome.map_err(|kind| ParseError { line: line_number, kind })?;
    }

    debug!(
        procedure = %identifier,
        parameters = parser.parameters.len(),
        entries = parser.entries.len(),
        "parsed procedure"
    );

    Ok(Procedure {
        identifier: identifier.to_string(),
        parameters: parser.parameters,
        entries: parser.entries,
    })
}

/// Splits a line into trimmed fields. Returns `None` for comments and blank lines.
fn split_fields(raw_line: &str) -> Option<Vec<&str>> {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('!') {
        return None;
    }
    let mut fields: Vec<&str> = line.split(',').map(str::trim).collect();
    while fields.len() > 1 && fields.last().is_some_and(|field| field.is_empty()) {
        fields.pop();
    }
    Some(fields)
}

fn split_assignment(field: &str) -> Result<(&str, &str), ParseErrorKind> {
    match field.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseErrorKind::MalformedArgument(field.to_string())),
    }
}

/// Returns the parameter name of an `&NAME&` placeholder.
fn parameter_reference(value: &str) -> Option<&str> {
    value
        .strip_prefix('&')
        .and_then(|rest| rest.strip_suffix('&'))
        .filter(|name| !name.is_empty())
}

fn parse_offset_literal(value: &str) -> Result<RtsDuration, ParseErrorKind> {
    RtsDuration::parse(value).map_err(|source| match source {
        DurationParseError::Empty => ParseErrorKind::EmptyOffset,
        DurationParseError::Negative(text) => ParseErrorKind::NegativeOffset(text),
        other => ParseErrorKind::MalformedOffset {
            value: value.to_string(),
            source: other,
        },
    })
}

#[derive(Default)]
struct ProcedureParser {
    parameters: IndexMap<String, ParameterDeclaration>,
    entries: Vec<CommandEntry>,
}

impl ProcedureParser {
    fn declare(&mut self, fields: &[&str]) -> Result<(), ParseErrorKind> {
        let (name, keyword, attributes) = match fields {
            [name, keyword, attributes @ ..] if !name.is_empty() && !keyword.is_empty() => (*name, *keyword, attributes),
            _ => return Err(ParseErrorKind::IncompleteDeclaration),
        };
        if !PARAMETER_NAME.is_match(name) {
            return Err(ParseErrorKind::InvalidParameterName(name.to_string()));
        }
        if self.parameters.contains_key(name) {
            return Err(ParseErrorKind::DuplicateParameter(name.to_string()));
        }

        let mut values: IndexMap<&str, &str> = IndexMap::new();
        for field in attributes {
            let (key, value) = split_assignment(field)?;
            let known = matches!(key.to_ascii_uppercase().as_str(), "MIN" | "MAX" | "VALUES" | "DEFAULT");
            if !known {
                return Err(ParseErrorKind::UnknownAttribute {
                    parameter: name.to_string(),
                    attribute: key.to_string(),
                });
            }
            values.insert(key, value);
        }
        let attribute = |wanted: &str| {
            values
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| *value)
        };

        let domain = if keyword.eq_ignore_ascii_case("DURATION") {
            let min = duration_attribute(name, "MIN", attribute("MIN"))?;
            let max = duration_attribute(name, "MAX", attribute("MAX"))?;
            if min > max {
                return Err(ParseErrorKind::InvertedBounds {
                    parameter: name.to_string(),
                    min,
                    max,
                });
            }
            ParameterDomain::Duration { min, max }
        } else if keyword.eq_ignore_ascii_case("ENUM") {
            let raw = attribute("VALUES").ok_or_else(|| ParseErrorKind::MissingAttribute {
                parameter: name.to_string(),
                attribute: "VALUES",
            })?;
            let members: Vec<String> = raw
                .split(ENUM_SEPARATOR)
                .map(str::trim)
                .filter(|member| !member.is_empty())
                .map(str::to_string)
                .collect();
            if members.is_empty() {
                return Err(ParseErrorKind::EmptyEnumeration(name.to_string()));
            }
            ParameterDomain::Enumeration { values: members }
        } else {
            return Err(ParseErrorKind::UnknownDomain(keyword.to_string()));
        };

        let default = attribute("DEFAULT").map(|raw| parse_default(name, &domain, raw)).transpose()?;

        self.parameters.insert(
            name.to_string(),
            ParameterDeclaration {
                name: name.to_string(),
                domain,
                required: default.is_none(),
                default,
            },
        );
        Ok(())
    }

    fn command(&mut self, fields: &[&str]) -> Result<(), ParseErrorKind> {
        let target = fields[0];
        let mnemonic = match fields.get(1) {
            Some(mnemonic) if !mnemonic.is_empty() && !mnemonic.contains('=') && !target.is_empty() => *mnemonic,
            _ => return Err(ParseErrorKind::MissingMnemonic),
        };

        let mut arguments = IndexMap::new();
        let mut offset = None;
        for field in &fields[2..] {
            let (key, value) = split_assignment(field)?;
            if key.eq_ignore_ascii_case(DELTA_KEY) {
                if offset.is_some() {
                    return Err(ParseErrorKind::DuplicateArgument(key.to_string()));
                }
                offset = Some(self.offset(value)?);
                continue;
            }
            if arguments.contains_key(key) {
                return Err(ParseErrorKind::DuplicateArgument(key.to_string()));
            }
            let argument = match parameter_reference(value) {
                Some(parameter) => {
                    self.ensure_declared(parameter)?;
                    ArgumentValue::Parameter(parameter.to_string())
                }
                None => ArgumentValue::Literal(value.to_string()),
            };
            arguments.insert(key.to_string(), argument);
        }

        let offset = match offset {
            Some(offset) => offset,
            None if self.entries.is_empty() => OffsetSpec::Literal(RtsDuration::ZERO),
            None => return Err(ParseErrorKind::MissingOffset(mnemonic.to_string())),
        };

        self.entries.push(CommandEntry {
            target: target.to_string(),
            mnemonic: mnemonic.to_string(),
            arguments,
            offset,
        });
        Ok(())
    }

    fn offset(&self, value: &str) -> Result<OffsetSpec, ParseErrorKind> {
        match parameter_reference(value) {
            Some(parameter) => {
                let declaration = self.ensure_declared(parameter)?;
                if !matches!(declaration.domain, ParameterDomain::Duration { .. }) {
                    return Err(ParseErrorKind::OffsetParameterNotDuration(parameter.to_string()));
                }
                Ok(OffsetSpec::Parameter(parameter.to_string()))
            }
            None => parse_offset_literal(value).map(OffsetSpec::Literal),
        }
    }

    fn ensure_declared(&self, parameter: &str) -> Result<&ParameterDeclaration, ParseErrorKind> {
        self.parameters
            .get(parameter)
            .ok_or_else(|| ParseErrorKind::UndeclaredParameter(parameter.to_string()))
    }
}

fn duration_attribute(parameter: &str, attribute: &'static str, raw: Option<&str>) -> Result<RtsDuration, ParseErrorKind> {
    let raw = raw.ok_or_else(|| ParseErrorKind::MissingAttribute {
        parameter: parameter.to_string(),
        attribute,
    })?;
    RtsDuration::parse(raw).map_err(|error| ParseErrorKind::InvalidAttribute {
        parameter: parameter.to_string(),
        attribute,
        value: raw.to_string(),
        reason: error.to_string(),
    })
}

fn parse_default(parameter: &str, domain: &ParameterDomain, raw: &str) -> Result<BoundValue, ParseErrorKind> {
    let outside = || ParseErrorKind::DefaultOutsideDomain {
        parameter: parameter.to_string(),
        value: raw.to_string(),
    };
    match domain {
        ParameterDomain::Duration { min, max } => {
            let value = duration_attribute(parameter, "DEFAULT", Some(raw))?;
            if value < *min || value > *max {
                return Err(outside());
            }
            Ok(BoundValue::Duration(value))
        }
        ParameterDomain::Enumeration { values } => {
            if !values.iter().any(|member| member == raw) {
                return Err(outside());
            }
            Ok(BoundValue::Symbol(raw.to_string()))
        }
    }
}
