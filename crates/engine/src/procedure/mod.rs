//! Procedure loading pipeline: text → [`Procedure`](rts_types::Procedure) →
//! [`ConcreteProcedure`](rts_types::ConcreteProcedure) → validated.

pub mod binder;
pub mod parser;
pub mod render;
pub mod validator;

pub use binder::{BindingError, bind};
pub use parser::{ParseError, ParseErrorKind, parse_procedure};
pub use render::render_procedure;
pub use validator::{ConstraintViolation, validate};
