//! Constraint validation of bound parameter values.
//!
//! The checks walk parameters in declaration order and stop at the first
//! violation, so the same procedure always reports the same error. A
//! procedure that passes needs no further range checks before scheduling.

use rts_types::{BoundValue, ConcreteProcedure, ParameterDomain};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter '{parameter}' value {value} violates bound {bound}")]
pub struct ConstraintViolation {
    pub parameter: String,
    pub value: String,
    pub bound: String,
}

pub fn validate(procedure: &ConcreteProcedure) -> Result<(), ConstraintViolation> {
    for (name, declaration) in &procedure.parameters {
        let Some(value) = procedure.values.get(name) else {
            return Err(ConstraintViolation {
                parameter: name.clone(),
                value: "<unbound>".into(),
                bound: "a bound value".into(),
            });
        };
        if let Some(bound) = violated_bound(&declaration.domain, value) {
            debug!(procedure = %procedure.identifier, parameter = %name, value = %value, bound = %bound, "constraint violated");
            return Err(ConstraintViolation {
                parameter: name.clone(),
                value: value.to_string(),
                bound,
            });
        }
    }
    Ok(())
}

/// Describes the bound `value` violates, or `None` when it lies inside `domain`.
fn violated_bound(domain: &ParameterDomain, value: &BoundValue) -> Option<String> {
    match (domain, value) {
        (ParameterDomain::Duration { min, .. }, BoundValue::Duration(duration)) if duration < min => Some(format!("MIN={min}")),
        (ParameterDomain::Duration { max, .. }, BoundValue::Duration(duration)) if duration > max => Some(format!("MAX={max}")),
        (ParameterDomain::Duration { .. }, BoundValue::Duration(_)) => None,
        (ParameterDomain::Duration { .. }, BoundValue::Symbol(_)) => Some("a duration".into()),
        (ParameterDomain::Enumeration { values }, BoundValue::Symbol(symbol)) => {
            (!values.iter().any(|member| member == symbol)).then(|| format!("VALUES={}", values.join("|")))
        }
        (ParameterDomain::Enumeration { values }, BoundValue::Duration(_)) => Some(format!("VALUES={}", values.join("|"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{bind, parse_procedure};
    use indexmap::{IndexMap, indexmap};

    const SOURCE: &str = "\
PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
PARAM, MODE, ENUM, VALUES=TE|CC, DEFAULT=TE
/CMD, OORMPEN
ACIS, WSPOW0CF3F, MODE=&MODE&, DELTA=00:00:01.000
/CMD, OORMPDS, DELTA=&NUM_HOURS&
";

    fn concrete(bindings: IndexMap<String, String>) -> ConcreteProcedure {
        let procedure = parse_procedure("1_CTI06", SOURCE).expect("parse");
        bind(&procedure, &bindings).expect("bind")
    }

    #[test]
    fn accepts_values_inside_bounds() {
        let procedure = concrete(indexmap! {"NUM_HOURS".into() => "000:04:00:00".into()});
        assert_eq!(validate(&procedure), Ok(()));

        let at_min = concrete(indexmap! {"NUM_HOURS".into() => "000:00:01:00".into()});
        let at_max = concrete(indexmap! {"NUM_HOURS".into() => "000:21:00:00".into()});
        assert!(validate(&at_min).is_ok());
        assert!(validate(&at_max).is_ok());
    }

    #[test]
    fn rejects_duration_above_maximum() {
        let procedure = concrete(indexmap! {"NUM_HOURS".into() => "001:00:00:00".into()});
        let violation = validate(&procedure).expect_err("exceeds 21h");
        assert_eq!(violation.parameter, "NUM_HOURS");
        assert_eq!(violation.value, "001:00:00:00.000");
        assert_eq!(violation.bound, "MAX=000:21:00:00.000");
    }

    #[test]
    fn rejects_duration_below_minimum() {
        let procedure = concrete(indexmap! {"NUM_HOURS".into() => "00:00:30".into()});
        let violation = validate(&procedure).expect_err("below one minute");
        assert_eq!(violation.bound, "MIN=000:00:01:00.000");
    }

    #[test]
    fn rejects_symbol_outside_enumeration() {
        let procedure = concrete(indexmap! {
            "NUM_HOURS".into() => "000:04:00:00".into(),
            "MODE".into() => "RAW".into(),
        });
        let violation = validate(&procedure).expect_err("not a member");
        assert_eq!(violation.parameter, "MODE");
        assert_eq!(violation.bound, "VALUES=TE|CC");
    }

    #[test]
    fn reports_first_violation_in_declaration_order() {
        let procedure = concrete(indexmap! {
            "MODE".into() => "RAW".into(),
            "NUM_HOURS".into() => "002:00:00:00".into(),
        });
        assert_eq!(validate(&procedure).expect_err("two violations").parameter, "NUM_HOURS");
    }

    #[test]
    fn validation_is_idempotent() {
        for raw in ["000:04:00:00", "001:00:00:00", "00:00:00"] {
            let procedure = concrete(indexmap! {"NUM_HOURS".into() => raw.into()});
            assert_eq!(validate(&procedure), validate(&procedure), "differing results for {raw}");
        }
    }
}
