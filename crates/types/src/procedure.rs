//! Strongly typed procedure definitions shared by the parser, binder, and scheduler.
//!
//! A [`Procedure`] is the immutable template read from an RTS file. Binding
//! load-time parameters turns it into a [`ConcreteProcedure`], which is what the
//! scheduler executes. Both preserve authoring order (via `IndexMap`) so
//! diagnostics and renderings follow the file.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::RtsDuration;

/// Immutable procedure template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Procedure {
    /// Identifier used by `RTSLOAD` requests (normally the file stem).
    pub identifier: String,
    /// Declared load-time parameters keyed by name, in declaration order.
    pub parameters: IndexMap<String, ParameterDeclaration>,
    /// Ordered command entries.
    pub entries: Vec<CommandEntry>,
}

impl Procedure {
    /// Names of the parameters that must be bound at load time.
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters.values().filter(|declaration| declaration.required).map(|declaration| declaration.name.as_str())
    }
}

/// Declares a load-time parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterDeclaration {
    /// Parameter name as referenced by `&NAME&`.
    pub name: String,
    /// Value domain and its bounds.
    pub domain: ParameterDomain,
    /// When true the caller must supply a binding.
    pub required: bool,
    /// Value used when an optional parameter is left unbound.
    #[serde(default)]
    pub default: Option<BoundValue>,
}

/// Value domain of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDomain {
    /// Duration with inclusive bounds.
    Duration { min: RtsDuration, max: RtsDuration },
    /// One of a fixed set of symbols.
    Enumeration { values: Vec<String> },
}

impl ParameterDomain {
    /// Keyword used for this domain in procedure text.
    pub fn keyword(&self) -> &'static str {
        match self {
            ParameterDomain::Duration { .. } => "DURATION",
            ParameterDomain::Enumeration { .. } => "ENUM",
        }
    }
}

/// Concrete value for a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundValue {
    Duration(RtsDuration),
    Symbol(String),
}

impl BoundValue {
    pub fn as_duration(&self) -> Option<RtsDuration> {
        match self {
            BoundValue::Duration(duration) => Some(*duration),
            BoundValue::Symbol(_) => None,
        }
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Duration(duration) => write!(f, "{duration}"),
            BoundValue::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

/// One command line of a procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandEntry {
    /// Subsystem tag the command is addressed to (for example `ACIS` or `/CMD`).
    pub target: String,
    /// Command mnemonic.
    pub mnemonic: String,
    /// Named arguments in authoring order, excluding the offset.
    #[serde(default)]
    pub arguments: IndexMap<String, ArgumentValue>,
    /// Delay after the previous entry's nominal dispatch time.
    pub offset: OffsetSpec,
}

/// Argument value before binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentValue {
    Literal(String),
    /// `&NAME&` placeholder.
    Parameter(String),
}

/// Entry offset before binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OffsetSpec {
    Literal(RtsDuration),
    /// `DELTA=&NAME&`; the parameter must be a duration.
    Parameter(String),
}

/// Procedure with every parameter reference substituted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcreteProcedure {
    pub identifier: String,
    /// Declarations carried over for validation and diagnostics.
    pub parameters: IndexMap<String, ParameterDeclaration>,
    /// Bound value per declared parameter, in declaration order.
    pub values: IndexMap<String, BoundValue>,
    pub entries: Vec<ConcreteEntry>,
}

/// Command entry with literal arguments and a concrete offset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcreteEntry {
    pub target: String,
    pub mnemonic: String,
    #[serde(default)]
    pub arguments: IndexMap<String, String>,
    pub offset: RtsDuration,
    /// Parameter the offset was taken from, if any.
    #[serde(default)]
    pub offset_parameter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    fn sample_procedure() -> Procedure {
        Procedure {
            identifier: "1_CTI06".into(),
            parameters: indexmap! {
                "NUM_HOURS".into() => ParameterDeclaration {
                    name: "NUM_HOURS".into(),
                    domain: ParameterDomain::Duration { min: RtsDuration::from_secs(60), max: RtsDuration::from_hours(21) },
                    required: true,
                    default: None,
                },
                "MODE".into() => ParameterDeclaration {
                    name: "MODE".into(),
                    domain: ParameterDomain::Enumeration { values: vec!["TE".into(), "CC".into()] },
                    required: false,
                    default: Some(BoundValue::Symbol("TE".into())),
                },
            },
            entries: vec![CommandEntry {
                target: "ACIS".into(),
                mnemonic: "WSPOW00000".into(),
                arguments: indexmap! {"MODE".into() => ArgumentValue::Parameter("MODE".into())},
                offset: OffsetSpec::Parameter("NUM_HOURS".into()),
            }],
        }
    }

    #[test]
    fn lists_required_parameters_in_declaration_order() {
        let procedure = sample_procedure();
        let required: Vec<&str> = procedure.required_parameters().collect();
        assert_eq!(required, vec!["NUM_HOURS"]);
    }

    #[test]
    fn procedure_survives_json_and_yaml() {
        let procedure = sample_procedure();
        let json = serde_json::to_string(&procedure).expect("json");
        assert_eq!(serde_json::from_str::<Procedure>(&json).expect("from json"), procedure);

        let yaml = serde_yaml::to_string(&procedure).expect("yaml");
        assert_eq!(serde_yaml::from_str::<Procedure>(&yaml).expect("from yaml"), procedure);
    }

    #[test]
    fn bound_values_display_their_literal_form() {
        assert_eq!(BoundValue::Duration(RtsDuration::from_hours(4)).to_string(), "000:04:00:00.000");
        assert_eq!(BoundValue::Symbol("TE".into()).to_string(), "TE");
    }
}
