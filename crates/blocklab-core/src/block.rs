//! Block tree: the value and statement blocks a program is assembled from.
//!
//! Value blocks are [`Expr`]s, statement blocks are [`Stmt`]s. Both are
//! plain owned trees; the only cross references are by name (variables and
//! procedures), which is how the block editor links them too.
//!
//! The serde representation is internally tagged by `"block"`, so a program
//! document reads like the editor's own palette:
//!
//! ```json
//! { "block": "print", "value": { "block": "text", "value": "hi" } }
//! ```

use serde::{Deserialize, Serialize};

/// `+ - × ÷ ^`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

/// Single-operand math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleOp {
    Root,
    Abs,
    Negate,
    Ln,
    Log10,
    Exp,
    Pow10,
}

/// Trigonometric functions. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrigOp {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathConstant {
    Pi,
    E,
    GoldenRatio,
    Sqrt2,
    Sqrt1_2,
    Infinity,
}

/// Predicate tested by the "number is ..." block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberProperty {
    Even,
    Odd,
    Whole,
    Positive,
    Negative,
    DivisibleBy { divisor: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOp {
    Round,
    RoundUp,
    RoundDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

/// Which occurrence the text "find" block looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEnd {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCase {
    Upper,
    Lower,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimMode {
    Both,
    Left,
    Right,
}

/// Whether a prompt block asks for text or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Text,
    Number,
}

/// `while` repeats while the condition holds, `until` while it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    While,
    Until,
}

/// A value block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Expr {
    Number { value: f64 },
    Text { value: String },
    Boolean { value: bool },
    Null,
    Variable { name: String },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Single { op: SingleOp, operand: Box<Expr> },
    Trig { op: TrigOp, operand: Box<Expr> },
    Constant { constant: MathConstant },
    NumberProperty {
        property: NumberProperty,
        operand: Box<Expr>,
    },
    Round { op: RoundOp, operand: Box<Expr> },
    Modulo {
        dividend: Box<Expr>,
        divisor: Box<Expr>,
    },
    Constrain {
        value: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    RandomInt { from: Box<Expr>, to: Box<Expr> },
    RandomFraction,
    Atan2 { x: Box<Expr>, y: Box<Expr> },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logic {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not { operand: Box<Expr> },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Join { parts: Vec<Expr> },
    TextLength { text: Box<Expr> },
    TextIsEmpty { text: Box<Expr> },
    TextIndexOf {
        end: TextEnd,
        text: Box<Expr>,
        find: Box<Expr>,
    },
    ChangeCase { case: TextCase, text: Box<Expr> },
    Trim { mode: TrimMode, text: Box<Expr> },
    Prompt { kind: PromptKind, message: Box<Expr> },
    ListCreate { items: Vec<Expr> },
    ListRepeat { item: Box<Expr>, times: Box<Expr> },
    ListLength { list: Box<Expr> },
    ListIsEmpty { list: Box<Expr> },
    /// 1-based item access, as in the editor.
    ListGet { list: Box<Expr>, index: Box<Expr> },
    Call { name: String, args: Vec<Expr> },
}

/// One `if`/`else if` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// A statement block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Stmt {
    Set { name: String, value: Expr },
    ChangeBy { name: String, delta: Expr },
    Append { name: String, text: Expr },
    If {
        branches: Vec<Branch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Stmt>>,
    },
    Repeat { times: Expr, body: Vec<Stmt> },
    While {
        mode: LoopMode,
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        name: String,
        from: Expr,
        to: Expr,
        by: Expr,
        body: Vec<Stmt>,
    },
    ForEach {
        name: String,
        list: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Print { value: Expr },
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn number(value: f64) -> Expr {
        Expr::Number { value }
    }

    pub fn text(value: impl Into<String>) -> Expr {
        Expr::Text {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Boolean { value }
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Variable { name: name.into() }
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
        Expr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logic(op: LogicOp, left: Expr, right: Expr) -> Expr {
        Expr::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn join(parts: Vec<Expr>) -> Expr {
        Expr::Join { parts }
    }

    pub fn list(items: Vec<Expr>) -> Expr {
        Expr::ListCreate { items }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// Direct child value blocks, in input order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Number { .. }
            | Expr::Text { .. }
            | Expr::Boolean { .. }
            | Expr::Null
            | Expr::Variable { .. }
            | Expr::Constant { .. }
            | Expr::RandomFraction => Vec::new(),
            Expr::Arithmetic { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logic { left, right, .. } => vec![&**left, &**right],
            Expr::Single { operand, .. }
            | Expr::Trig { operand, .. }
            | Expr::Round { operand, .. }
            | Expr::Not { operand } => vec![&**operand],
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::DivisibleBy { divisor } => vec![&**operand, &**divisor],
                _ => vec![&**operand],
            },
            Expr::Modulo { dividend, divisor } => vec![&**dividend, &**divisor],
            Expr::Constrain { value, low, high } => vec![&**value, &**low, &**high],
            Expr::RandomInt { from, to } => vec![&**from, &**to],
            Expr::Atan2 { x, y } => vec![&**x, &**y],
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => vec![&**condition, &**then, &**otherwise],
            Expr::Join { parts } => parts.iter().collect(),
            Expr::TextLength { text }
            | Expr::TextIsEmpty { text }
            | Expr::ChangeCase { text, .. }
            | Expr::Trim { text, .. } => vec![&**text],
            Expr::TextIndexOf { text, find, .. } => vec![&**text, &**find],
            Expr::Prompt { message, .. } => vec![&**message],
            Expr::ListCreate { items } => items.iter().collect(),
            Expr::ListRepeat { item, times } => vec![&**item, &**times],
            Expr::ListLength { list } | Expr::ListIsEmpty { list } => vec![&**list],
            Expr::ListGet { list, index } => vec![&**list, &**index],
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Number { .. }
            | Expr::Text { .. }
            | Expr::Boolean { .. }
            | Expr::Null
            | Expr::Variable { .. }
            | Expr::Constant { .. }
            | Expr::RandomFraction => Vec::new(),
            Expr::Arithmetic { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logic { left, right, .. } => vec![&mut **left, &mut **right],
            Expr::Single { operand, .. }
            | Expr::Trig { operand, .. }
            | Expr::Round { operand, .. }
            | Expr::Not { operand } => vec![&mut **operand],
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::DivisibleBy { divisor } => vec![&mut **operand, &mut **divisor],
                _ => vec![&mut **operand],
            },
            Expr::Modulo { dividend, divisor } => vec![&mut **dividend, &mut **divisor],
            Expr::Constrain { value, low, high } => vec![&mut **value, &mut **low, &mut **high],
            Expr::RandomInt { from, to } => vec![&mut **from, &mut **to],
            Expr::Atan2 { x, y } => vec![&mut **x, &mut **y],
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => vec![&mut **condition, &mut **then, &mut **otherwise],
            Expr::Join { parts } => parts.iter_mut().collect(),
            Expr::TextLength { text }
            | Expr::TextIsEmpty { text }
            | Expr::ChangeCase { text, .. }
            | Expr::Trim { text, .. } => vec![&mut **text],
            Expr::TextIndexOf { text, find, .. } => vec![&mut **text, &mut **find],
            Expr::Prompt { message, .. } => vec![&mut **message],
            Expr::ListCreate { items } => items.iter_mut().collect(),
            Expr::ListRepeat { item, times } => vec![&mut **item, &mut **times],
            Expr::ListLength { list } | Expr::ListIsEmpty { list } => vec![&mut **list],
            Expr::ListGet { list, index } => vec![&mut **list, &mut **index],
            Expr::Call { args, .. } => args.iter_mut().collect(),
        }
    }

    /// Calls `f` on this block and every nested value block, pre-order.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub(crate) fn rename_variable(&mut self, from: &str, to: &str) {
        if let Expr::Variable { name } = self {
            if name == from {
                *name = to.to_string();
            }
        }
        for child in self.children_mut() {
            child.rename_variable(from, to);
        }
    }

    /// Whether this block or any nested block asks the user for input.
    pub fn prompts(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Prompt { .. }) {
                found = true;
            }
        });
        found
    }
}

impl Stmt {
    pub fn set(name: impl Into<String>, value: Expr) -> Stmt {
        Stmt::Set {
            name: name.into(),
            value,
        }
    }

    pub fn print(value: Expr) -> Stmt {
        Stmt::Print { value }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Stmt {
        Stmt::Call {
            name: name.into(),
            args,
        }
    }

    pub fn if_then(condition: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::If {
            branches: vec![Branch { condition, body }],
            otherwise: None,
        }
    }

    pub fn repeat(times: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::Repeat { times, body }
    }

    /// The variable this statement writes, if any.
    pub fn assigned_variable(&self) -> Option<&str> {
        match self {
            Stmt::Set { name, .. }
            | Stmt::ChangeBy { name, .. }
            | Stmt::Append { name, .. }
            | Stmt::For { name, .. }
            | Stmt::ForEach { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Value inputs of this statement (not those of nested statements).
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Set { value, .. } => vec![value],
            Stmt::ChangeBy { delta, .. } => vec![delta],
            Stmt::Append { text, .. } => vec![text],
            Stmt::If { branches, .. } => branches.iter().map(|b| &b.condition).collect(),
            Stmt::Repeat { times, .. } => vec![times],
            Stmt::While { condition, .. } => vec![condition],
            Stmt::For { from, to, by, .. } => vec![from, to, by],
            Stmt::ForEach { list, .. } => vec![list],
            Stmt::Break | Stmt::Continue => Vec::new(),
            Stmt::Print { value } => vec![value],
            Stmt::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Nested statement bodies, in display order.
    pub fn bodies(&self) -> Vec<&[Stmt]> {
        match self {
            Stmt::If {
                branches,
                otherwise,
            } => {
                let mut bodies: Vec<&[Stmt]> = branches.iter().map(|b| b.body.as_slice()).collect();
                if let Some(otherwise) = otherwise {
                    bodies.push(otherwise);
                }
                bodies
            }
            Stmt::Repeat { body, .. }
            | Stmt::While { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. } => vec![body.as_slice()],
            _ => Vec::new(),
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::Repeat { .. } | Stmt::While { .. } | Stmt::For { .. } | Stmt::ForEach { .. }
        )
    }

    pub(crate) fn rename_variable(&mut self, from: &str, to: &str) {
        match self {
            Stmt::Set { name, value } => {
                rename_in_place(name, from, to);
                value.rename_variable(from, to);
            }
            Stmt::ChangeBy { name, delta } => {
                rename_in_place(name, from, to);
                delta.rename_variable(from, to);
            }
            Stmt::Append { name, text } => {
                rename_in_place(name, from, to);
                text.rename_variable(from, to);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    branch.condition.rename_variable(from, to);
                    rename_all(&mut branch.body, from, to);
                }
                if let Some(otherwise) = otherwise {
                    rename_all(otherwise, from, to);
                }
            }
            Stmt::Repeat { times, body } => {
                times.rename_variable(from, to);
                rename_all(body, from, to);
            }
            Stmt::While {
                condition, body, ..
            } => {
                condition.rename_variable(from, to);
                rename_all(body, from, to);
            }
            Stmt::For {
                name,
                from: start,
                to: end,
                by,
                body,
            } => {
                rename_in_place(name, from, to);
                start.rename_variable(from, to);
                end.rename_variable(from, to);
                by.rename_variable(from, to);
                rename_all(body, from, to);
            }
            Stmt::ForEach { name, list, body } => {
                rename_in_place(name, from, to);
                list.rename_variable(from, to);
                rename_all(body, from, to);
            }
            Stmt::Break | Stmt::Continue => {}
            Stmt::Print { value } => value.rename_variable(from, to),
            Stmt::Call { args, .. } => {
                for arg in args {
                    arg.rename_variable(from, to);
                }
            }
        }
    }
}

fn rename_in_place(name: &mut String, from: &str, to: &str) {
    if name == from {
        *name = to.to_string();
    }
}

pub(crate) fn rename_all(stmts: &mut [Stmt], from: &str, to: &str) {
    for stmt in stmts {
        stmt.rename_variable(from, to);
    }
}

/// Calls `stmt_fn` for every statement and `expr_fn` for every value block
/// reachable from `stmts`, in source order.
pub fn walk_stmts<'a>(
    stmts: &'a [Stmt],
    stmt_fn: &mut dyn FnMut(&'a Stmt),
    expr_fn: &mut dyn FnMut(&'a Expr),
) {
    for stmt in stmts {
        stmt_fn(stmt);
        match stmt {
            // Conditions interleave with their bodies.
            Stmt::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    branch.condition.walk(expr_fn);
                    walk_stmts(&branch.body, stmt_fn, expr_fn);
                }
                if let Some(otherwise) = otherwise {
                    walk_stmts(otherwise, stmt_fn, expr_fn);
                }
            }
            _ => {
                for expr in stmt.exprs() {
                    expr.walk(expr_fn);
                }
                for body in stmt.bodies() {
                    walk_stmts(body, stmt_fn, expr_fn);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_serde_is_tagged_by_block() {
        let expr = Expr::arithmetic(ArithmeticOp::Add, Expr::number(1.0), Expr::var("x"));
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["block"], "arithmetic");
        assert_eq!(json["op"], "add");
        assert_eq!(json["left"]["block"], "number");
        assert_eq!(json["right"]["name"], "x");
    }

    #[test]
    fn stmt_parses_from_document_form() {
        let stmt: Stmt = serde_json::from_str(
            r#"{ "block": "print", "value": { "block": "text", "value": "hi" } }"#,
        )
        .unwrap();
        assert_eq!(stmt, Stmt::print(Expr::text("hi")));
    }

    #[test]
    fn if_without_else_omits_otherwise() {
        let stmt = Stmt::if_then(Expr::boolean(true), vec![Stmt::Break]);
        let json = serde_json::to_value(&stmt).unwrap();
        assert!(json.get("otherwise").is_none());
    }

    #[test]
    fn walk_visits_nested_values_pre_order() {
        let expr = Expr::join(vec![Expr::text("a"), Expr::call("f", vec![Expr::var("x")])]);
        let mut seen = Vec::new();
        expr.walk(&mut |e| {
            seen.push(match e {
                Expr::Join { .. } => "join",
                Expr::Text { .. } => "text",
                Expr::Call { .. } => "call",
                Expr::Variable { .. } => "var",
                _ => "other",
            })
        });
        assert_eq!(seen, vec!["join", "text", "call", "var"]);
    }

    #[test]
    fn divisible_by_exposes_divisor_as_child() {
        let expr = Expr::NumberProperty {
            property: NumberProperty::DivisibleBy {
                divisor: Box::new(Expr::number(3.0)),
            },
            operand: Box::new(Expr::var("n")),
        };
        assert_eq!(expr.children().len(), 2);
    }

    #[test]
    fn rename_reaches_loop_variables_and_values() {
        let mut stmts = vec![Stmt::For {
            name: "i".into(),
            from: Expr::number(1.0),
            to: Expr::var("i"),
            by: Expr::number(1.0),
            body: vec![Stmt::print(Expr::var("i"))],
        }];
        rename_all(&mut stmts, "i", "k");
        let json = serde_json::to_string(&stmts).unwrap();
        assert!(!json.contains("\"i\""));
        assert_eq!(json.matches("\"k\"").count(), 3);
    }

    #[test]
    fn prompts_detects_nested_prompt() {
        let expr = Expr::join(vec![Expr::Prompt {
            kind: PromptKind::Text,
            message: Box::new(Expr::text("name?")),
        }]);
        assert!(expr.prompts());
        assert!(!Expr::text("x").prompts());
    }
}
