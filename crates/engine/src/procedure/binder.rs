//! Load-time parameter binding.
//!
//! Binding converts raw caller strings into typed [`BoundValue`]s and
//! substitutes every `&NAME&` reference, producing a [`ConcreteProcedure`].
//! The result is built completely before it is returned; a failure never
//! exposes a partially bound procedure.

use indexmap::IndexMap;
use rts_types::{
    ArgumentValue, BoundValue, ConcreteEntry, ConcreteProcedure, OffsetSpec, ParameterDeclaration, ParameterDomain, Procedure,
    RtsDuration,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("required parameter '{name}' is not bound")]
    Unbound { name: String },
    #[error("binding supplied for unknown parameter '{name}'")]
    Unknown { name: String },
    #[error("parameter '{name}' is bound more than once")]
    Duplicate { name: String },
    #[error("value '{value}' for parameter '{name}' is malformed: {reason}")]
    Malformed { name: String, value: String, reason: String },
}

/// Binds `bindings` against the declarations of `procedure`.
///
/// Unknown names are reported before missing ones, each in a stable order
/// (binding order, then declaration order).
pub fn bind(procedure: &Procedure, bindings: &IndexMap<String, String>) -> Result<ConcreteProcedure, BindingError> {
    if let Some(name) = bindings.keys().find(|name| !procedure.parameters.contains_key(name.as_str())) {
        return Err(BindingError::Unknown { name: name.clone() });
    }

    let mut values = IndexMap::with_capacity(procedure.parameters.len());
    for declaration in procedure.parameters.values() {
        let value = match bindings.get(&declaration.name) {
            Some(raw) => parse_binding(declaration, raw)?,
            None if declaration.required => {
                return Err(BindingError::Unbound {
                    name: declaration.name.clone(),
                });
            }
            None => declaration.default.clone().ok_or_else(|| BindingError::Unbound {
                name: declaration.name.clone(),
            })?,
        };
        values.insert(declaration.name.clone(), value);
    }

    let entries = procedure
        .entries
        .iter()
        .map(|entry| {
            let arguments = entry
                .arguments
                .iter()
                .map(|(key, argument)| {
                    let text = match argument {
                        ArgumentValue::Literal(literal) => literal.clone(),
                        ArgumentValue::Parameter(name) => lookup(&values, name)?.to_string(),
                    };
                    Ok((key.clone(), text))
                })
                .collect::<Result<IndexMap<_, _>, BindingError>>()?;

            let (offset, offset_parameter) = match &entry.offset {
                OffsetSpec::Literal(duration) => (*duration, None),
                OffsetSpec::Parameter(name) => (offset_value(lookup(&values, name)?, name)?, Some(name.clone())),
            };

            Ok(ConcreteEntry {
                target: entry.target.clone(),
                mnemonic: entry.mnemonic.clone(),
                arguments,
                offset,
                offset_parameter,
            })
        })
        .collect::<Result<Vec<_>, BindingError>>()?;

    debug!(procedure = %procedure.identifier, bound = values.len(), "bound procedure parameters");

    Ok(ConcreteProcedure {
        identifier: procedure.identifier.clone(),
        parameters: procedure.parameters.clone(),
        values,
        entries,
    })
}

fn parse_binding(declaration: &ParameterDeclaration, raw: &str) -> Result<BoundValue, BindingError> {
    let malformed = |reason: String| BindingError::Malformed {
        name: declaration.name.clone(),
        value: raw.to_string(),
        reason,
    };
    let trimmed = raw.trim();
    match declaration.domain {
        ParameterDomain::Duration { .. } => RtsDuration::parse(trimmed)
            .map(BoundValue::Duration)
            .map_err(|error| malformed(error.to_string())),
        ParameterDomain::Enumeration { .. } if trimmed.is_empty() => Err(malformed("value is empty".into())),
        ParameterDomain::Enumeration { .. } => Ok(BoundValue::Symbol(trimmed.to_string())),
    }
}

fn lookup<'a>(values: &'a IndexMap<String, BoundValue>, name: &str) -> Result<&'a BoundValue, BindingError> {
    values.get(name).ok_or_else(|| BindingError::Unbound { name: name.to_string() })
}

fn offset_value(value: &BoundValue, name: &str) -> Result<RtsDuration, BindingError> {
    value.as_duration().ok_or_else(|| BindingError::Malformed {
        name: name.to_string(),
        value: value.to_string(),
        reason: "offset parameters must be durations".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::parse_procedure;
    use indexmap::indexmap;

    const SOURCE: &str = "\
PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
PARAM, MODE, ENUM, VALUES=TE|CC, DEFAULT=TE
/CMD, OORMPEN
ACIS, WSPOW0CF3F, MODE=&MODE&, DELTA=00:00:01.000
/CMD, OORMPDS, DELTA=&NUM_HOURS&
";

    fn procedure() -> Procedure {
        parse_procedure("1_CTI06", SOURCE).expect("parse")
    }

    #[test]
    fn substitutes_references_and_defaults() {
        let bindings = indexmap! {"NUM_HOURS".to_string() => "000:04:00:00".to_string()};
        let concrete = bind(&procedure(), &bindings).expect("bind");

        assert_eq!(concrete.values["NUM_HOURS"], BoundValue::Duration(RtsDuration::from_hours(4)));
        assert_eq!(concrete.values["MODE"], BoundValue::Symbol("TE".into()));
        assert_eq!(concrete.entries[1].arguments["MODE"], "TE");
        assert_eq!(concrete.entries[2].offset, RtsDuration::from_hours(4));
        assert_eq!(concrete.entries[2].offset_parameter.as_deref(), Some("NUM_HOURS"));
        assert_eq!(concrete.entries[1].offset_parameter, None);
    }

    #[test]
    fn explicit_binding_overrides_default() {
        let bindings = indexmap! {
            "NUM_HOURS".to_string() => "000:04:00:00".to_string(),
            "MODE".to_string() => "CC".to_string(),
        };
        let concrete = bind(&procedure(), &bindings).expect("bind");
        assert_eq!(concrete.entries[1].arguments["MODE"], "CC");
    }

    #[test]
    fn missing_required_parameter_is_a_binding_error() {
        let error = bind(&procedure(), &IndexMap::new()).expect_err("missing NUM_HOURS");
        assert_eq!(
            error,
            BindingError::Unbound {
                name: "NUM_HOURS".into()
            }
        );
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let bindings = indexmap! {
            "NUM_HOURS".to_string() => "000:04:00:00".to_string(),
            "SCS_SLOT".to_string() => "135".to_string(),
        };
        let error = bind(&procedure(), &bindings).expect_err("unknown binding");
        assert_eq!(error, BindingError::Unknown { name: "SCS_SLOT".into() });
    }

    #[test]
    fn malformed_duration_is_rejected() {
        let bindings = indexmap! {"NUM_HOURS".to_string() => "four hours".to_string()};
        let error = bind(&procedure(), &bindings).expect_err("malformed");
        assert!(matches!(error, BindingError::Malformed { ref name, .. } if name == "NUM_HOURS"));
    }

    #[test]
    fn binding_does_not_check_bounds() {
        let bindings = indexmap! {"NUM_HOURS".to_string() => "001:00:00:00".to_string()};
        let concrete = bind(&procedure(), &bindings).expect("bounds are the validator's job");
        assert_eq!(concrete.values["NUM_HOURS"], BoundValue::Duration(RtsDuration::from_hours(24)));
    }
}
