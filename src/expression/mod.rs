//! Expression engine contract.
//!
//! The dependency engine never interprets formula text itself. It asks an
//! [`ExpressionEngine`] to compile the text, reads the variable names the
//! compiled expression references, and later evaluates it against a set of
//! bindings. [`XlFormulaEngine`] is the bundled implementation.

mod xl;

pub use xl::{XlExpression, XlFormulaEngine};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CellGraphResult;
use crate::types::CellValue;

/// Variable name (as written in the formula) -> current value.
pub type Bindings = HashMap<String, CellValue>;

/// Host-registered function over numeric arguments.
pub type CustomFunction = Arc<dyn Fn(&[f64]) -> CellValue + Send + Sync>;

/// A compiled formula handle.
pub trait CompiledExpression {
    /// Formula text the expression was compiled from (sigil stripped).
    fn source(&self) -> &str;

    /// Distinct variable names the expression reads, in first-use order.
    fn referenced_names(&self) -> &[String];
}

pub trait ExpressionEngine {
    type Expression: CompiledExpression;

    /// Compile formula text. Fails with `CellGraphError::Parse` on malformed text.
    fn compile(&self, text: &str) -> CellGraphResult<Self::Expression>;

    /// Evaluate with every referenced name bound. Evaluation errors come back
    /// as `CellValue::Error`, never as `Err`.
    fn evaluate(&self, expression: &Self::Expression, bindings: &Bindings) -> CellValue;

    /// Register a global named value visible to every formula.
    fn set_variable(&mut self, name: &str, value: CellValue);

    /// Register a global function visible to every formula.
    fn set_function(&mut self, name: &str, function: CustomFunction);
}
