//! JavaScript emitter.
//!
//! This is the only output the execution harness can run, so it sticks to
//! the subset the script engine understands: `var` declarations, function
//! declarations, C-style and `for … in` loops, and `window.alert` /
//! `window.prompt` for user interaction.

use blocklab_core::block::{
    ArithmeticOp, CompareOp, LogicOp, LoopMode, MathConstant, NumberProperty, PromptKind, RoundOp,
    SingleOp, TextCase, TextEnd, TrigOp, TrimMode,
};
use blocklab_core::{Expr, LanguageKey, Procedure, Program, Stmt};

use super::{is_simple, join_stacks, looks_numeric, number_literal, template, LiteralRange};
use crate::context::{as_whole, format_number, parenthesize, quote_single, EmitContext, Order, ORDER_NONE};
use crate::emitter::Emitter;
use crate::writer::{assemble, CodeWriter};

const INDENT: &str = "  ";

const ATOMIC: Order = 0;
const MEMBER: Order = 12;
const CALL: Order = 20;
const UNARY_NEGATION: Order = 43;
const LOGICAL_NOT: Order = 44;
const MULTIPLICATIVE: Order = 51;
const ADDITIVE: Order = 62;
const RELATIONAL: Order = 80;
const EQUALITY: Order = 90;
const LOGICAL_AND: Order = 130;
const LOGICAL_OR: Order = 140;
const CONDITIONAL: Order = 150;
const ASSIGNMENT: Order = 160;

/// Receivers of `.member` access: calls and member chains need no parens.
const RECEIVER: Order = CALL + 1;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "let", "static", "await", "implements",
    "package", "protected", "interface", "private", "public", "undefined", "NaN", "Infinity",
    "eval", "arguments", "Math", "JSON", "String", "Number", "Boolean", "Array", "Object", "Error",
    "window", "console", "alert", "prompt", "parseInt", "parseFloat", "isNaN",
];

const RANDOM_INT: &[&str] = &[
    "function {NAME}(a, b) {",
    "  if (a > b) {",
    "    var c = a;",
    "    a = b;",
    "    b = c;",
    "  }",
    "  return Math.floor(Math.random() * (b - a + 1) + a);",
    "}",
];

const TITLE_CASE: &[&str] = &[
    "function {NAME}(str) {",
    "  return str.split(' ').map(function (word) {",
    "    return word.length ? word.charAt(0).toUpperCase() + word.substring(1).toLowerCase() : word;",
    "  }).join(' ');",
    "}",
];

const LIST_REPEAT: &[&str] = &[
    "function {NAME}(value, n) {",
    "  var array = [];",
    "  for (var i = 0; i < n; i++) {",
    "    array[i] = value;",
    "  }",
    "  return array;",
    "}",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptEmitter;

impl Emitter for JavaScriptEmitter {
    fn language(&self) -> LanguageKey {
        LanguageKey::JavaScript
    }

    fn emit(&self, program: &Program) -> String {
        let mut gen = Gen {
            ctx: EmitContext::new(program, RESERVED),
        };
        let procedures: Vec<String> = program
            .procedures
            .iter()
            .map(|p| gen.procedure(p))
            .collect();
        let stacks = program
            .stacks
            .iter()
            .map(|stack| {
                let mut w = CodeWriter::new(INDENT);
                gen.block(&mut w, &stack.body);
                w.finish()
            })
            .collect();
        let code = join_stacks(stacks);

        let mut definitions = Vec::new();
        let variables: Vec<String> = program
            .all_variables()
            .iter()
            .map(|v| gen.ctx.var(v))
            .collect();
        if !variables.is_empty() {
            definitions.push(format!("var {};", variables.join(", ")));
        }
        definitions.extend(gen.ctx.helper_definitions().map(str::to_string));
        definitions.extend(procedures);
        assemble(&definitions, &code)
    }
}

struct Gen {
    ctx: EmitContext,
}

impl Gen {
    fn procedure(&mut self, procedure: &Procedure) -> String {
        let mut w = CodeWriter::new(INDENT);
        let params: Vec<String> = procedure.params.iter().map(|p| self.ctx.var(p)).collect();
        w.line(format!(
            "function {}({}) {{",
            self.ctx.procedure(&procedure.name),
            params.join(", ")
        ));
        w.indent();
        self.block(&mut w, &procedure.body);
        if let Some(value) = &procedure.returns {
            let value = self.expr(value, ORDER_NONE);
            w.line(format!("return {value};"));
        }
        w.dedent();
        w.line("}");
        w.finish()
    }

    fn block(&mut self, w: &mut CodeWriter, body: &[Stmt]) {
        for stmt in body {
            self.stmt(w, stmt);
        }
    }

    fn braced(&mut self, w: &mut CodeWriter, header: String, body: &[Stmt]) {
        w.line(format!("{header} {{"));
        w.indent();
        self.block(w, body);
        w.dedent();
        w.line("}");
    }

    fn stmt(&mut self, w: &mut CodeWriter, stmt: &Stmt) {
        match stmt {
            Stmt::Set { name, value } => {
                let value = self.expr(value, ASSIGNMENT);
                w.line(format!("{} = {value};", self.ctx.var(name)));
            }
            Stmt::ChangeBy { name, delta } => {
                let x = self.ctx.var(name);
                let delta = self.expr(delta, ADDITIVE);
                w.line(format!(
                    "{x} = (typeof {x} === 'number' ? {x} : 0) + {delta};"
                ));
            }
            Stmt::Append { name, text } => {
                let text = self.string_of(text);
                w.line(format!("{} += {text};", self.ctx.var(name)));
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                if branches.is_empty() {
                    if let Some(otherwise) = otherwise {
                        self.block(w, otherwise);
                    }
                    return;
                }
                for (i, branch) in branches.iter().enumerate() {
                    let condition = self.expr(&branch.condition, ORDER_NONE);
                    if i == 0 {
                        w.line(format!("if ({condition}) {{"));
                    } else {
                        w.line(format!("}} else if ({condition}) {{"));
                    }
                    w.indent();
                    self.block(w, &branch.body);
                    w.dedent();
                }
                if let Some(otherwise) = otherwise {
                    w.line("} else {");
                    w.indent();
                    self.block(w, otherwise);
                    w.dedent();
                }
                w.line("}");
            }
            Stmt::Repeat { times, body } => {
                let count = self.ctx.names.distinct("count");
                let bound = match number_literal(times) {
                    Some(n) => format_number(n),
                    None if is_simple(times) => self.expr(times, RELATIONAL),
                    None => {
                        let end = self.ctx.names.distinct(&format!("{count}_end"));
                        let value = self.expr(times, ASSIGNMENT);
                        w.line(format!("var {end} = {value};"));
                        end
                    }
                };
                self.braced(
                    w,
                    format!("for (var {count} = 0; {count} < {bound}; {count}++)"),
                    body,
                );
            }
            Stmt::While {
                mode,
                condition,
                body,
            } => {
                let header = match mode {
                    LoopMode::While => format!("while ({})", self.expr(condition, ORDER_NONE)),
                    LoopMode::Until => format!("while (!{})", self.expr(condition, LOGICAL_NOT)),
                };
                self.braced(w, header, body);
            }
            Stmt::For {
                name,
                from,
                to,
                by,
                body,
            } => {
                let i = self.ctx.var(name);
                if let Some(range) = LiteralRange::of(from, to, by) {
                    let (cmp, step) = if range.ascending() {
                        let step = if range.step == 1.0 {
                            format!("{i}++")
                        } else {
                            format!("{i} += {}", format_number(range.step))
                        };
                        ("<=", step)
                    } else {
                        let step = if range.step == 1.0 {
                            format!("{i}--")
                        } else {
                            format!("{i} -= {}", format_number(range.step))
                        };
                        (">=", step)
                    };
                    let header = format!(
                        "for ({i} = {}; {i} {cmp} {}; {step})",
                        format_number(range.from),
                        format_number(range.to)
                    );
                    self.braced(w, header, body);
                } else {
                    let start = self.ctx.names.distinct(&format!("{i}_start"));
                    let end = self.ctx.names.distinct(&format!("{i}_end"));
                    let inc = self.ctx.names.distinct(&format!("{i}_inc"));
                    let from = self.expr(from, ASSIGNMENT);
                    let to = self.expr(to, ASSIGNMENT);
                    let by = self.expr(by, ORDER_NONE);
                    w.line(format!("var {start} = {from};"));
                    w.line(format!("var {end} = {to};"));
                    w.line(format!("var {inc} = Math.abs({by});"));
                    w.line(format!("if ({start} > {end}) {{"));
                    w.indent();
                    w.line(format!("{inc} = -{inc};"));
                    w.dedent();
                    w.line("}");
                    let header = format!(
                        "for ({i} = {start}; {inc} >= 0 ? {i} <= {end} : {i} >= {end}; {i} += {inc})"
                    );
                    self.braced(w, header, body);
                }
            }
            Stmt::ForEach { name, list, body } => {
                let x = self.ctx.var(name);
                let list_var = self.ctx.names.distinct(&format!("{x}_list"));
                let index_var = self.ctx.names.distinct(&format!("{x}_index"));
                let list = self.expr(list, ASSIGNMENT);
                w.line(format!("var {list_var} = {list};"));
                w.line(format!("for (var {index_var} in {list_var}) {{"));
                w.indent();
                w.line(format!("{x} = {list_var}[{index_var}];"));
                self.block(w, body);
                w.dedent();
                w.line("}");
            }
            Stmt::Break => w.line("break;"),
            Stmt::Continue => w.line("continue;"),
            Stmt::Print { value } => {
                let value = self.expr(value, ORDER_NONE);
                w.line(format!("window.alert({value});"));
            }
            Stmt::Call { name, args } => {
                let call = self.call(name, args);
                w.line(format!("{call};"));
            }
        }
    }

    fn expr(&mut self, expr: &Expr, outer: Order) -> String {
        let (code, inner) = self.value(expr);
        parenthesize(code, inner, outer)
    }

    /// An expression used as the receiver of `.member`.
    fn receiver(&mut self, expr: &Expr) -> String {
        let code = self.expr(expr, RECEIVER);
        if looks_numeric(&code) {
            format!("({code})")
        } else {
            code
        }
    }

    fn string_of(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Text { value } => quote_single(value, &[]),
            _ => format!("String({})", self.expr(expr, ORDER_NONE)),
        }
    }

    fn args(&mut self, args: &[Expr]) -> String {
        args.iter()
            .map(|a| self.expr(a, ORDER_NONE))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> String {
        let args = self.args(args);
        format!("{}({args})", self.ctx.procedure(name))
    }

    fn value(&mut self, expr: &Expr) -> (String, Order) {
        match expr {
            Expr::Number { value } => {
                let code = format_number(*value);
                let order = if code.starts_with('-') {
                    UNARY_NEGATION
                } else {
                    ATOMIC
                };
                (code, order)
            }
            Expr::Text { value } => (quote_single(value, &[]), ATOMIC),
            Expr::Boolean { value } => (value.to_string(), ATOMIC),
            Expr::Null => ("null".into(), ATOMIC),
            Expr::Variable { name } => (self.ctx.var(name), ATOMIC),
            Expr::Arithmetic { op, left, right } => {
                let (symbol, order) = match op {
                    ArithmeticOp::Add => ("+", ADDITIVE),
                    ArithmeticOp::Subtract => ("-", ADDITIVE),
                    ArithmeticOp::Multiply => ("*", MULTIPLICATIVE),
                    ArithmeticOp::Divide => ("/", MULTIPLICATIVE),
                    ArithmeticOp::Power => {
                        let base = self.expr(left, ORDER_NONE);
                        let exponent = self.expr(right, ORDER_NONE);
                        return (format!("Math.pow({base}, {exponent})"), CALL);
                    }
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Single { op, operand } => match op {
                SingleOp::Negate => (format!("-{}", self.expr(operand, UNARY_NEGATION)), UNARY_NEGATION),
                SingleOp::Log10 => (
                    format!("Math.log({}) / Math.log(10)", self.expr(operand, ORDER_NONE)),
                    MULTIPLICATIVE,
                ),
                SingleOp::Pow10 => (
                    format!("Math.pow(10, {})", self.expr(operand, ORDER_NONE)),
                    CALL,
                ),
                _ => {
                    let function = match op {
                        SingleOp::Root => "sqrt",
                        SingleOp::Abs => "abs",
                        SingleOp::Ln => "log",
                        _ => "exp",
                    };
                    (
                        format!("Math.{function}({})", self.expr(operand, ORDER_NONE)),
                        CALL,
                    )
                }
            },
            Expr::Trig { op, operand } => match op {
                TrigOp::Sin | TrigOp::Cos | TrigOp::Tan => {
                    let function = match op {
                        TrigOp::Sin => "sin",
                        TrigOp::Cos => "cos",
                        _ => "tan",
                    };
                    let x = self.expr(operand, MULTIPLICATIVE);
                    (format!("Math.{function}({x} / 180 * Math.PI)"), CALL)
                }
                TrigOp::Asin | TrigOp::Acos | TrigOp::Atan => {
                    let function = match op {
                        TrigOp::Asin => "asin",
                        TrigOp::Acos => "acos",
                        _ => "atan",
                    };
                    let x = self.expr(operand, ORDER_NONE);
                    (format!("Math.{function}({x}) / Math.PI * 180"), MULTIPLICATIVE)
                }
            },
            Expr::Constant { constant } => match constant {
                MathConstant::Pi => ("Math.PI".into(), MEMBER),
                MathConstant::E => ("Math.E".into(), MEMBER),
                MathConstant::GoldenRatio => ("(1 + Math.sqrt(5)) / 2".into(), MULTIPLICATIVE),
                MathConstant::Sqrt2 => ("Math.SQRT2".into(), MEMBER),
                MathConstant::Sqrt1_2 => ("Math.SQRT1_2".into(), MEMBER),
                MathConstant::Infinity => ("Infinity".into(), ATOMIC),
            },
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::Positive => (format!("{} > 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::Negative => (format!("{} < 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::DivisibleBy { divisor } => {
                    let x = self.expr(operand, MULTIPLICATIVE);
                    let d = self.expr(divisor, MULTIPLICATIVE);
                    (format!("{x} % {d} === 0"), EQUALITY)
                }
                _ => {
                    let (modulus, remainder) = match property {
                        NumberProperty::Even => (2, 0),
                        NumberProperty::Odd => (2, 1),
                        _ => (1, 0),
                    };
                    let x = self.expr(operand, MULTIPLICATIVE);
                    (format!("{x} % {modulus} === {remainder}"), EQUALITY)
                }
            },
            Expr::Round { op, operand } => {
                let function = match op {
                    RoundOp::Round => "round",
                    RoundOp::RoundUp => "ceil",
                    RoundOp::RoundDown => "floor",
                };
                (format!("Math.{function}({})", self.expr(operand, ORDER_NONE)), CALL)
            }
            Expr::Modulo { dividend, divisor } => {
                let a = self.expr(dividend, MULTIPLICATIVE);
                let b = self.expr(divisor, MULTIPLICATIVE);
                (format!("{a} % {b}"), MULTIPLICATIVE)
            }
            Expr::Constrain { value, low, high } => {
                let value = self.expr(value, ORDER_NONE);
                let low = self.expr(low, ORDER_NONE);
                let high = self.expr(high, ORDER_NONE);
                (format!("Math.min(Math.max({value}, {low}), {high})"), CALL)
            }
            Expr::RandomInt { from, to } => {
                let helper = self.ctx.helper("mathRandomInt", |name| template(RANDOM_INT, name));
                let a = self.expr(from, ORDER_NONE);
                let b = self.expr(to, ORDER_NONE);
                (format!("{helper}({a}, {b})"), CALL)
            }
            Expr::RandomFraction => ("Math.random()".into(), CALL),
            Expr::Atan2 { x, y } => {
                let x = self.expr(x, ORDER_NONE);
                let y = self.expr(y, ORDER_NONE);
                (format!("Math.atan2({y}, {x}) / Math.PI * 180"), MULTIPLICATIVE)
            }
            Expr::Compare { op, left, right } => {
                let (symbol, order) = match op {
                    CompareOp::Eq => ("==", EQUALITY),
                    CompareOp::Neq => ("!=", EQUALITY),
                    CompareOp::Lt => ("<", RELATIONAL),
                    CompareOp::Lte => ("<=", RELATIONAL),
                    CompareOp::Gt => (">", RELATIONAL),
                    CompareOp::Gte => (">=", RELATIONAL),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Logic { op, left, right } => {
                let (symbol, order) = match op {
                    LogicOp::And => ("&&", LOGICAL_AND),
                    LogicOp::Or => ("||", LOGICAL_OR),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Not { operand } => (format!("!{}", self.expr(operand, LOGICAL_NOT)), LOGICAL_NOT),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let c = self.expr(condition, CONDITIONAL);
                let a = self.expr(then, CONDITIONAL);
                let b = self.expr(otherwise, CONDITIONAL);
                (format!("{c} ? {a} : {b}"), CONDITIONAL)
            }
            Expr::Join { parts } => match parts.as_slice() {
                [] => ("''".into(), ATOMIC),
                [only] => match only {
                    Expr::Text { value } => (quote_single(value, &[]), ATOMIC),
                    _ => (self.string_of(only), CALL),
                },
                [a, b] => {
                    let a = self.string_of(a);
                    let b = self.string_of(b);
                    (format!("{a} + {b}"), ADDITIVE)
                }
                _ => {
                    let items = self.args(parts);
                    (format!("[{items}].join('')"), CALL)
                }
            },
            Expr::TextLength { text } => (format!("{}.length", self.receiver(text)), MEMBER),
            Expr::TextIsEmpty { text } => (format!("!{}.length", self.receiver(text)), LOGICAL_NOT),
            Expr::TextIndexOf { end, text, find } => {
                let method = match end {
                    TextEnd::First => "indexOf",
                    TextEnd::Last => "lastIndexOf",
                };
                let text = self.receiver(text);
                let find = self.expr(find, ORDER_NONE);
                (format!("{text}.{method}({find}) + 1"), ADDITIVE)
            }
            Expr::ChangeCase { case, text } => match case {
                TextCase::Upper => (format!("{}.toUpperCase()", self.receiver(text)), CALL),
                TextCase::Lower => (format!("{}.toLowerCase()", self.receiver(text)), CALL),
                TextCase::Title => {
                    let helper = self.ctx.helper("textToTitleCase", |name| template(TITLE_CASE, name));
                    (format!("{helper}({})", self.expr(text, ORDER_NONE)), CALL)
                }
            },
            Expr::Trim { mode, text } => {
                let method = match mode {
                    TrimMode::Both => "trim",
                    TrimMode::Left => "trimStart",
                    TrimMode::Right => "trimEnd",
                };
                (format!("{}.{method}()", self.receiver(text)), CALL)
            }
            Expr::Prompt { kind, message } => {
                let message = self.expr(message, ORDER_NONE);
                match kind {
                    PromptKind::Text => (format!("window.prompt({message})"), CALL),
                    PromptKind::Number => (format!("Number(window.prompt({message}))"), CALL),
                }
            }
            Expr::ListCreate { items } => (format!("[{}]", self.args(items)), ATOMIC),
            Expr::ListRepeat { item, times } => {
                let helper = self.ctx.helper("listsRepeat", |name| template(LIST_REPEAT, name));
                let item = self.expr(item, ORDER_NONE);
                let times = self.expr(times, ORDER_NONE);
                (format!("{helper}({item}, {times})"), CALL)
            }
            Expr::ListLength { list } => (format!("{}.length", self.receiver(list)), MEMBER),
            Expr::ListIsEmpty { list } => (format!("!{}.length", self.receiver(list)), LOGICAL_NOT),
            Expr::ListGet { list, index } => {
                let list = self.receiver(list);
                let index = match number_literal(index).and_then(as_whole) {
                    Some(n) => (n - 1).to_string(),
                    None => format!("{} - 1", self.expr(index, ADDITIVE)),
                };
                (format!("{list}[{index}]"), MEMBER)
            }
            Expr::Call { name, args } => (self.call(name, args), CALL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocklab_core::{BlockId, BlockStack};

    fn emit_stack(body: Vec<Stmt>) -> String {
        let program = Program {
            stacks: vec![BlockStack {
                id: BlockId(1),
                body,
            }],
            ..Program::default()
        };
        JavaScriptEmitter.emit(&program)
    }

    #[test]
    fn empty_program_is_empty_text() {
        assert_eq!(JavaScriptEmitter.emit(&Program::new()), "");
    }

    #[test]
    fn print_and_variables() {
        let code = emit_stack(vec![
            Stmt::set("x", Expr::number(3.0)),
            Stmt::print(Expr::var("x")),
        ]);
        assert_eq!(code, "var x;\n\n\nx = 3;\nwindow.alert(x);\n");
    }

    #[test]
    fn precedence_adds_needed_parens_only() {
        let sum = Expr::arithmetic(ArithmeticOp::Add, Expr::number(1.0), Expr::number(2.0));
        let product = Expr::arithmetic(ArithmeticOp::Multiply, sum.clone(), Expr::number(3.0));
        let code = emit_stack(vec![Stmt::print(product)]);
        assert_eq!(code, "window.alert((1 + 2) * 3);\n");

        let product = Expr::arithmetic(ArithmeticOp::Multiply, Expr::number(2.0), Expr::number(3.0));
        let sum = Expr::arithmetic(ArithmeticOp::Add, Expr::number(1.0), product);
        assert_eq!(emit_stack(vec![Stmt::print(sum)]), "window.alert(1 + 2 * 3);\n");
    }

    #[test]
    fn counted_loop_with_literals() {
        let code = emit_stack(vec![Stmt::For {
            name: "i".into(),
            from: Expr::number(10.0),
            to: Expr::number(1.0),
            by: Expr::number(3.0),
            body: vec![Stmt::print(Expr::var("i"))],
        }]);
        assert_eq!(
            code,
            "var i;\n\n\nfor (i = 10; i >= 1; i -= 3) {\n  window.alert(i);\n}\n"
        );
    }

    #[test]
    fn repeat_uses_fresh_counter_names() {
        let inner = Stmt::repeat(Expr::number(2.0), vec![Stmt::print(Expr::text("x"))]);
        let code = emit_stack(vec![Stmt::repeat(Expr::number(3.0), vec![inner])]);
        assert_eq!(
            code,
            concat!(
                "for (var count = 0; count < 3; count++) {\n",
                "  for (var count2 = 0; count2 < 2; count2++) {\n",
                "    window.alert('x');\n",
                "  }\n",
                "}\n"
            )
        );
    }

    #[test]
    fn helpers_precede_code_once() {
        let roll = Expr::RandomInt {
            from: Box::new(Expr::number(1.0)),
            to: Box::new(Expr::number(6.0)),
        };
        let code = emit_stack(vec![Stmt::print(roll.clone()), Stmt::print(roll)]);
        assert_eq!(code.matches("function mathRandomInt(a, b)").count(), 1);
        assert!(code.ends_with("window.alert(mathRandomInt(1, 6));\nwindow.alert(mathRandomInt(1, 6));\n"));
    }

    #[test]
    fn list_index_is_one_based() {
        let get = Expr::ListGet {
            list: Box::new(Expr::list(vec![Expr::text("a"), Expr::text("b")])),
            index: Box::new(Expr::number(2.0)),
        };
        assert_eq!(emit_stack(vec![Stmt::print(get)]), "window.alert(['a', 'b'][1]);\n");
    }

    #[test]
    fn procedures_come_before_code() {
        let program = Program {
            variables: vec![],
            procedures: vec![Procedure {
                id: BlockId(1),
                name: "greet".into(),
                params: vec!["who".into()],
                body: vec![Stmt::print(Expr::join(vec![Expr::text("Hi "), Expr::var("who")]))],
                returns: None,
            }],
            stacks: vec![BlockStack {
                id: BlockId(2),
                body: vec![Stmt::call("greet", vec![Expr::text("Ada")])],
            }],
        };
        assert_eq!(
            JavaScriptEmitter.emit(&program),
            concat!(
                "var who;\n",
                "\n",
                "function greet(who) {\n",
                "  window.alert('Hi ' + String(who));\n",
                "}\n",
                "\n",
                "\n",
                "greet('Ada');\n"
            )
        );
    }
}
