//! Serializes a [`Procedure`] back into procedure text.
//!
//! Parsing the rendered text yields a procedure equal to the input. Comments
//! from the original file are not preserved, and every command carries an
//! explicit `DELTA` in canonical `DDD:HH:MM:SS.fff` form.

use rts_types::{ArgumentValue, OffsetSpec, ParameterDeclaration, ParameterDomain, Procedure};

use super::parser::{DELTA_KEY, ENUM_SEPARATOR, PARAM_KEYWORD};

pub fn render_procedure(procedure: &Procedure) -> String {
    let mut output = String::new();
    output.push_str(&format!("! {}\n", procedure.identifier));

    for declaration in procedure.parameters.values() {
        output.push_str(&render_declaration(declaration));
        output.push('\n');
    }

    for entry in &procedure.entries {
        let mut line = format!("{}, {}", entry.target, entry.mnemonic);
        for (key, value) in &entry.arguments {
            let rendered = match value {
                ArgumentValue::Literal(literal) => literal.clone(),
                ArgumentValue::Parameter(name) => format!("&{name}&"),
            };
            line.push_str(&format!(", {key}={rendered}"));
        }
        let offset = match &entry.offset {
            OffsetSpec::Literal(duration) => duration.to_string(),
            OffsetSpec::Parameter(name) => format!("&{name}&"),
        };
        line.push_str(&format!(", {DELTA_KEY}={offset}"));
        output.push_str(&line);
        output.push('\n');
    }

    output
}

fn render_declaration(declaration: &ParameterDeclaration) -> String {
    let mut line = format!("{PARAM_KEYWORD}, {}, {}", declaration.name, declaration.domain.keyword());
    match &declaration.domain {
        ParameterDomain::Duration { min, max } => {
            line.push_str(&format!(", MIN={min}, MAX={max}"));
        }
        ParameterDomain::Enumeration { values } => {
            line.push_str(&format!(", VALUES={}", values.join(&ENUM_SEPARATOR.to_string())));
        }
    }
    if let Some(default) = &declaration.default {
        line.push_str(&format!(", DEFAULT={default}"));
    }
    line
}
