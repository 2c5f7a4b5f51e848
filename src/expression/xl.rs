use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::trace;
use xlformula_engine::{calculate, parse_formula, types};

use super::{Bindings, CompiledExpression, CustomFunction, ExpressionEngine};
use crate::error::{CellGraphError, CellGraphResult};
use crate::types::CellValue;

/// `[Sheet!]A1` or `'Quoted Sheet'!A1`
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:'[^']+'!|\b[A-Za-z_][A-Za-z0-9_]*!|\b)[A-Za-z]+[0-9]+\b")
        .expect("reference pattern is valid")
});

/// Function-call names, `SUM(` or `my_fn (`
static CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_.]*)\s*\(").expect("call pattern is valid")
});

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CELLREF_([0-9]+)").expect("placeholder pattern is valid"));

const PLACEHOLDER_PREFIX: &str = "CELLREF_";

/// Formula compiled for [`XlFormulaEngine`].
///
/// Cell references are rewritten to `CELLREF_<n>` placeholders so sheet
/// qualifiers never reach the formula grammar; `names[n]` is the original text.
#[derive(Debug, Clone)]
pub struct XlExpression {
    source: String,
    rewritten: String,
    names: Vec<String>,
    /// Called function names, uppercased
    calls: Vec<String>,
}

impl XlExpression {
    /// True when the whole formula is one reference, e.g. `=A1`.
    fn is_bare_reference(&self) -> bool {
        self.rewritten == format!("={PLACEHOLDER_PREFIX}0")
    }
}

impl CompiledExpression for XlExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn referenced_names(&self) -> &[String] {
        &self.names
    }
}

/// Expression engine backed by `xlformula_engine`.
///
/// The evaluator works in `f32`: numbers pass through it with about seven
/// significant digits (`=A1 * 1` on `16777217` yields `16777216`) and results
/// are rounded to `decimal_places`. A formula that is a single reference
/// (`=A1`) skips the evaluator and copies the value exactly.
///
/// `xlformula_engine` calls custom functions while parsing, so a formula that
/// calls a function registered with `set_function` is parsed again at each
/// evaluation with its cell values written into the text as literals.
/// Global variables are not visible inside custom-function arguments.
pub struct XlFormulaEngine {
    variables: HashMap<String, CellValue>,
    functions: HashMap<String, CustomFunction>,
    decimal_places: u32,
}

impl Default for XlFormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl XlFormulaEngine {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            functions: HashMap::new(),
            decimal_places: 6,
        }
    }

    #[must_use]
    pub fn with_decimal_places(mut self, decimal_places: u32) -> Self {
        self.decimal_places = decimal_places;
        self
    }

    fn parse(&self, text: &str) -> types::Formula {
        let custom = |name: String, args: Vec<f32>| -> types::Value {
            match self.functions.get(&name.to_uppercase()) {
                Some(function) => {
                    let args: Vec<f64> = args.into_iter().map(f64::from).collect();
                    to_xl_value(&function(&args))
                }
                None => types::Value::Error(types::Error::Value),
            }
        };
        parse_formula::parse_string_to_formula(text, Some(&custom))
    }

    fn calls_custom_function(&self, expression: &XlExpression) -> bool {
        expression
            .calls
            .iter()
            .any(|name| self.functions.contains_key(name))
    }
}

impl XlFormulaEngine {
    /// Global variable lookup for names that are not cell references.
    fn global(&self, name: &str) -> types::Value {
        match self.variables.get(&name.trim().to_uppercase()) {
            Some(value) => to_xl_value(value),
            None => types::Value::Error(types::Error::Value),
        }
    }
}

impl ExpressionEngine for XlFormulaEngine {
    type Expression = XlExpression;

    fn compile(&self, text: &str) -> CellGraphResult<XlExpression> {
        check_structure(text)?;
        let (rewritten, names) = rewrite_references(text);
        let rewritten = format!("={rewritten}");

        // Grammar check only; custom functions run for real at evaluation
        let stub = |_: String, _: Vec<f32>| types::Value::Number(0.0);
        let checked = parse_formula::parse_string_to_formula(&rewritten, Some(&stub));
        if let types::Formula::Value(types::Value::Error(e)) = checked {
            return Err(CellGraphError::Parse(format!(
                "'{}' is not a valid formula ({:?})",
                text, e
            )));
        }

        trace!(formula = text, references = names.len(), "compiled formula");
        Ok(XlExpression {
            source: text.to_string(),
            calls: function_calls(&rewritten),
            rewritten,
            names,
        })
    }

    fn evaluate(&self, expression: &XlExpression, bindings: &Bindings) -> CellValue {
        let bound = |index: usize| {
            expression
                .names
                .get(index)
                .and_then(|name| bindings.get(name))
        };

        if expression.is_bare_reference() {
            return bound(0)
                .cloned()
                .unwrap_or_else(|| CellValue::Text(String::new()));
        }

        if self.calls_custom_function(expression) {
            return match inline_bindings(&expression.rewritten, |index| bound(index)) {
                Some(text) => {
                    let parsed = self.parse(&text);
                    let result = calculate::calculate_formula(parsed, Some(&|name: String| {
                        self.global(&name)
                    }));
                    from_xl_value(result, self.decimal_places)
                }
                None => CellValue::Error("#VALUE!".to_string()),
            };
        }

        let resolver = |var_name: String| -> types::Value {
            // Cell references come back as placeholders
            if let Some(index) = placeholder_index(&var_name) {
                return match bound(index) {
                    Some(value) => to_xl_value(value),
                    None => types::Value::Text(String::new()),
                };
            }
            self.global(&var_name)
        };

        let parsed = self.parse(&expression.rewritten);
        let result = calculate::calculate_formula(parsed, Some(&resolver));
        from_xl_value(result, self.decimal_places)
    }

    fn set_variable(&mut self, name: &str, value: CellValue) {
        self.variables.insert(name.to_uppercase(), value);
    }

    fn set_function(&mut self, name: &str, function: CustomFunction) {
        self.functions.insert(name.to_uppercase(), function);
    }
}

/// Reject text the formula grammar would silently mis-read: empty input,
/// unbalanced parentheses or quotes, or a dangling operator.
fn check_structure(text: &str) -> CellGraphResult<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CellGraphError::Parse("empty formula".to_string()));
    }

    let mut depth: i32 = 0;
    let mut in_string = false;
    for ch in trimmed.chars() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    return Err(CellGraphError::Parse(format!(
                        "unexpected ')' in '{text}'"
                    )));
                }
            }
            _ => {}
        }
    }
    if in_string {
        return Err(CellGraphError::Parse(format!("unterminated string in '{text}'")));
    }
    if depth != 0 {
        return Err(CellGraphError::Parse(format!("unbalanced parentheses in '{text}'")));
    }
    if trimmed.ends_with(['+', '-', '*', '/', '^', '&', ',', '=', '<', '>']) {
        return Err(CellGraphError::Parse(format!("dangling operator in '{text}'")));
    }
    Ok(())
}

/// Replace every cell reference outside string literals with a placeholder.
///
/// Returns the rewritten text and the distinct reference names in first-use
/// order. A letter-digit run directly followed by `(` is a function name
/// (`LOG10(`) and is left alone.
fn rewrite_references(text: &str) -> (String, Vec<String>) {
    let mut names: Vec<String> = Vec::new();
    let mut out = String::with_capacity(text.len());

    for (i, segment) in text.split('"').enumerate() {
        if i > 0 {
            out.push('"');
        }
        // Odd segments sit inside a string literal
        if i % 2 == 1 {
            out.push_str(segment);
            continue;
        }

        let mut last = 0;
        for m in REFERENCE_PATTERN.find_iter(segment) {
            let is_call = segment[m.end()..].trim_start().starts_with('(');
            if is_call {
                continue;
            }
            let name = m.as_str().to_string();
            let index = match names.iter().position(|n| *n == name) {
                Some(index) => index,
                None => {
                    names.push(name);
                    names.len() - 1
                }
            };
            out.push_str(&segment[last..m.start()]);
            out.push_str(&format!("{PLACEHOLDER_PREFIX}{index}"));
            last = m.end();
        }
        out.push_str(&segment[last..]);
    }

    (out, names)
}

/// Uppercased names of every function called outside string literals.
fn function_calls(text: &str) -> Vec<String> {
    let mut calls: Vec<String> = Vec::new();
    for segment in text.split('"').step_by(2) {
        for cap in CALL_PATTERN.captures_iter(segment) {
            let name = cap[1].to_uppercase();
            if !calls.contains(&name) {
                calls.push(name);
            }
        }
    }
    calls
}

/// Replace every placeholder with its bound value written as a literal.
///
/// Returns `None` when a value has no literal form (an error, or text holding
/// a double quote).
fn inline_bindings<'v>(
    rewritten: &str,
    bound: impl Fn(usize) -> Option<&'v CellValue>,
) -> Option<String> {
    let mut out = String::with_capacity(rewritten.len());
    for (i, segment) in rewritten.split('"').enumerate() {
        if i > 0 {
            out.push('"');
        }
        if i % 2 == 1 {
            out.push_str(segment);
            continue;
        }

        let mut last = 0;
        for cap in PLACEHOLDER_PATTERN.captures_iter(segment) {
            let whole = cap.get(0)?;
            let index: usize = cap[1].parse().ok()?;
            let literal = match bound(index) {
                Some(value) => to_literal(value)?,
                None => "\"\"".to_string(),
            };
            out.push_str(&segment[last..whole.start()]);
            out.push_str(&literal);
            last = whole.end();
        }
        out.push_str(&segment[last..]);
    }
    Some(out)
}

fn to_literal(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Empty => Some("\"\"".to_string()),
        CellValue::Number(n) => Some(format!("({n})")),
        CellValue::Text(s) if !s.contains('"') => Some(format!("\"{s}\"")),
        CellValue::Text(_) => None,
        CellValue::Boolean(true) => Some("TRUE".to_string()),
        CellValue::Boolean(false) => Some("FALSE".to_string()),
        CellValue::Error(_) => None,
    }
}

fn placeholder_index(var_name: &str) -> Option<usize> {
    var_name
        .trim()
        .to_ascii_uppercase()
        .strip_prefix(PLACEHOLDER_PREFIX)?
        .parse()
        .ok()
}

fn to_xl_value(value: &CellValue) -> types::Value {
    match value {
        CellValue::Empty => types::Value::Text(String::new()),
        CellValue::Number(n) => types::Value::Number(*n as f32),
        CellValue::Text(s) => types::Value::Text(s.clone()),
        CellValue::Boolean(true) => types::Value::Boolean(types::Boolean::True),
        CellValue::Boolean(false) => types::Value::Boolean(types::Boolean::False),
        CellValue::Error(_) => types::Value::Error(types::Error::Value),
    }
}

fn from_xl_value(value: types::Value, decimal_places: u32) -> CellValue {
    match value {
        types::Value::Number(n) => {
            let scale = 10f64.powi(decimal_places as i32);
            CellValue::Number((f64::from(n) * scale).round() / scale)
        }
        types::Value::Text(s) => CellValue::Text(s),
        types::Value::Boolean(b) => CellValue::Boolean(matches!(b, types::Boolean::True)),
        types::Value::Error(e) => CellValue::Error(format!("#{}!", format!("{e:?}").to_uppercase())),
        _ => CellValue::Error("#VALUE!".to_string()),
    }
}
