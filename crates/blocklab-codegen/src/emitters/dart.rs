//! Dart emitter. Top-level stacks become the body of `main()`.

use blocklab_core::block::{
    ArithmeticOp, CompareOp, LogicOp, LoopMode, MathConstant, NumberProperty, PromptKind, RoundOp,
    SingleOp, TextCase, TextEnd, TrigOp, TrimMode,
};
use blocklab_core::{Expr, LanguageKey, Procedure, Program, Stmt};

use super::{is_simple, join_stacks, looks_numeric, number_literal, template, LiteralRange};
use crate::context::{as_whole, format_number, parenthesize, quote_single, EmitContext, Order, ORDER_NONE};
use crate::emitter::Emitter;
use crate::writer::{assemble, prefix_lines, CodeWriter};

const INDENT: &str = "  ";

const ATOMIC: Order = 0;
const POSTFIX: Order = 10;
const PREFIX: Order = 20;
const MULTIPLICATIVE: Order = 30;
const ADDITIVE: Order = 40;
const RELATIONAL: Order = 90;
const EQUALITY: Order = 100;
const LOGICAL_AND: Order = 110;
const LOGICAL_OR: Order = 120;
const CONDITIONAL: Order = 140;
const ASSIGNMENT: Order = 160;

const RESERVED: &[&str] = &[
    "assert", "break", "case", "catch", "class", "const", "continue", "default", "do", "else",
    "enum", "extends", "false", "final", "finally", "for", "if", "in", "is", "new", "null",
    "rethrow", "return", "super", "switch", "this", "throw", "true", "try", "var", "void",
    "while", "with", "async", "await", "yield", "dynamic", "main", "print", "Math", "num", "int",
    "double", "String", "List", "stdin",
];

const MATH_IMPORT: &str = "import 'dart:math' as Math;";
const IO_IMPORT: &str = "import 'dart:io';";

const RANDOM_INT: &[&str] = &[
    "int {NAME}(num a, num b) {",
    "  if (a > b) {",
    "    num c = a;",
    "    a = b;",
    "    b = c;",
    "  }",
    "  return new Math.Random().nextInt((b - a + 1).toInt()) + a.toInt();",
    "}",
];

const TITLE_CASE: &[&str] = &[
    "String {NAME}(String str) {",
    "  return str",
    "      .split(' ')",
    "      .map((word) => word.isEmpty",
    "          ? word",
    "          : word[0].toUpperCase() + word.substring(1).toLowerCase())",
    "      .join(' ');",
    "}",
];

const PROMPT: &[&str] = &[
    "String {NAME}(String msg) {",
    "  print(msg);",
    "  return stdin.readLineSync() ?? '';",
    "}",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DartEmitter;

impl Emitter for DartEmitter {
    fn language(&self) -> LanguageKey {
        LanguageKey::Dart
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
        let main = format!("main() {{\n{}}}\n", prefix_lines(&code, INDENT));

        let mut definitions = Vec::new();
        let imports: Vec<&str> = gen.ctx.imports().collect();
        if !imports.is_empty() {
            definitions.push(imports.join("\n"));
        }
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
        assemble(&definitions, &main)
    }
}

struct Gen {
    ctx: EmitContext,
}

impl Gen {
    fn procedure(&mut self, procedure: &Procedure) -> String {
        let mut w = CodeWriter::new(INDENT);
        let params: Vec<String> = procedure.params.iter().map(|p| self.ctx.var(p)).collect();
        let return_type = if procedure.returns.is_some() {
            "dynamic"
        } else {
            "void"
        };
        w.line(format!(
            "{return_type} {}({}) {{",
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
                w.line(format!("{x} = ({x} is num ? {x} : 0) + {delta};"));
            }
            Stmt::Append { name, text } => {
                let x = self.ctx.var(name);
                let text = self.expr(text, ORDER_NONE);
                w.line(format!("{x} = [{x}, {text}].join();"));
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
                    format!("for (int {count} = 0; {count} < {bound}; {count}++)"),
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
                    LoopMode::Until => format!("while (!{})", self.expr(condition, PREFIX)),
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
                    let (cmp, step) = match (range.ascending(), range.step == 1.0) {
                        (true, true) => ("<=", format!("{i}++")),
                        (true, false) => ("<=", format!("{i} += {}", format_number(range.step))),
                        (false, true) => (">=", format!("{i}--")),
                        (false, false) => (">=", format!("{i} -= {}", format_number(range.step))),
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
                    let by = self.receiver(by);
                    w.line(format!("var {start} = {from};"));
                    w.line(format!("var {end} = {to};"));
                    w.line(format!("num {inc} = {by}.abs();"));
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
                let list = self.expr(list, ASSIGNMENT);
                self.braced(w, format!("for (var {x} in {list})"), body);
            }
            Stmt::Break => w.line("break;"),
            Stmt::Continue => w.line("continue;"),
            Stmt::Print { value } => {
                let value = self.expr(value, ORDER_NONE);
                w.line(format!("print({value});"));
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
        let code = self.expr(expr, POSTFIX + 1);
        if looks_numeric(&code) {
            format!("({code})")
        } else {
            code
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

    fn math(&mut self, function: &str, operand: &Expr) -> (String, Order) {
        self.ctx.import(MATH_IMPORT);
        (format!("Math.{function}({})", self.expr(operand, ORDER_NONE)), POSTFIX)
    }

    fn method(&mut self, receiver: &Expr, call: &str) -> (String, Order) {
        (format!("{}.{call}", self.receiver(receiver)), POSTFIX)
    }

    fn value(&mut self, expr: &Expr) -> (String, Order) {
        match expr {
            Expr::Number { value } => {
                if value.is_nan() {
                    ("double.nan".into(), POSTFIX)
                } else if value.is_infinite() {
                    if *value > 0.0 {
                        ("double.infinity".into(), POSTFIX)
                    } else {
                        ("-double.infinity".into(), PREFIX)
                    }
                } else {
                    let code = format_number(*value);
                    let order = if code.starts_with('-') { PREFIX } else { ATOMIC };
                    (code, order)
                }
            }
            Expr::Text { value } => (quote_single(value, &['$']), ATOMIC),
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
                        self.ctx.import(MATH_IMPORT);
                        let base = self.expr(left, ORDER_NONE);
                        let exponent = self.expr(right, ORDER_NONE);
                        return (format!("Math.pow({base}, {exponent})"), POSTFIX);
                    }
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Single { op, operand } => match op {
                SingleOp::Negate => (format!("-{}", self.expr(operand, PREFIX)), PREFIX),
                SingleOp::Abs => self.method(operand, "abs()"),
                SingleOp::Root => self.math("sqrt", operand),
                SingleOp::Ln => self.math("log", operand),
                SingleOp::Exp => self.math("exp", operand),
                SingleOp::Log10 => {
                    self.ctx.import(MATH_IMPORT);
                    let x = self.expr(operand, ORDER_NONE);
                    (format!("Math.log({x}) / Math.log(10)"), MULTIPLICATIVE)
                }
                SingleOp::Pow10 => {
                    self.ctx.import(MATH_IMPORT);
                    (format!("Math.pow(10, {})", self.expr(operand, ORDER_NONE)), POSTFIX)
                }
            },
            Expr::Trig { op, operand } => {
                self.ctx.import(MATH_IMPORT);
                match op {
                    TrigOp::Sin | TrigOp::Cos | TrigOp::Tan => {
                        let function = match op {
                            TrigOp::Sin => "sin",
                            TrigOp::Cos => "cos",
                            _ => "tan",
                        };
                        let x = self.expr(operand, MULTIPLICATIVE);
                        (format!("Math.{function}({x} / 180 * Math.pi)"), POSTFIX)
                    }
                    _ => {
                        let function = match op {
                            TrigOp::Asin => "asin",
                            TrigOp::Acos => "acos",
                            _ => "atan",
                        };
                        let x = self.expr(operand, ORDER_NONE);
                        (format!("Math.{function}({x}) / Math.pi * 180"), MULTIPLICATIVE)
                    }
                }
            }
            Expr::Constant { constant } => {
                if *constant == MathConstant::Infinity {
                    return ("double.infinity".into(), POSTFIX);
                }
                self.ctx.import(MATH_IMPORT);
                match constant {
                    MathConstant::Pi => ("Math.pi".into(), POSTFIX),
                    MathConstant::E => ("Math.e".into(), POSTFIX),
                    MathConstant::GoldenRatio => ("(1 + Math.sqrt(5)) / 2".into(), MULTIPLICATIVE),
                    MathConstant::Sqrt2 => ("Math.sqrt2".into(), POSTFIX),
                    _ => ("Math.sqrt1_2".into(), POSTFIX),
                }
            }
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::Positive => (format!("{} > 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::Negative => (format!("{} < 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::DivisibleBy { divisor } => {
                    let x = self.expr(operand, MULTIPLICATIVE);
                    let d = self.expr(divisor, MULTIPLICATIVE);
                    (format!("{x} % {d} == 0"), EQUALITY)
                }
                _ => {
                    let (modulus, remainder) = match property {
                        NumberProperty::Even => (2, 0),
                        NumberProperty::Odd => (2, 1),
                        _ => (1, 0),
                    };
                    let x = self.expr(operand, MULTIPLICATIVE);
                    (format!("{x} % {modulus} == {remainder}"), EQUALITY)
                }
            },
            Expr::Round { op, operand } => match op {
                RoundOp::Round => self.method(operand, "round()"),
                RoundOp::RoundUp => self.method(operand, "ceil()"),
                RoundOp::RoundDown => self.method(operand, "floor()"),
            },
            Expr::Modulo { dividend, divisor } => {
                let a = self.expr(dividend, MULTIPLICATIVE);
                let b = self.expr(divisor, MULTIPLICATIVE);
                (format!("{a} % {b}"), MULTIPLICATIVE)
            }
            Expr::Constrain { value, low, high } => {
                self.ctx.import(MATH_IMPORT);
                let value = self.expr(value, ORDER_NONE);
                let low = self.expr(low, ORDER_NONE);
                let high = self.expr(high, ORDER_NONE);
                (format!("Math.min(Math.max({value}, {low}), {high})"), POSTFIX)
            }
            Expr::RandomInt { from, to } => {
                self.ctx.import(MATH_IMPORT);
                let helper = self.ctx.helper("math_random_int", |name| template(RANDOM_INT, name));
                let a = self.expr(from, ORDER_NONE);
                let b = self.expr(to, ORDER_NONE);
                (format!("{helper}({a}, {b})"), POSTFIX)
            }
            Expr::RandomFraction => {
                self.ctx.import(MATH_IMPORT);
                ("new Math.Random().nextDouble()".into(), POSTFIX)
            }
            Expr::Atan2 { x, y } => {
                self.ctx.import(MATH_IMPORT);
                let x = self.expr(x, ORDER_NONE);
                let y = self.expr(y, ORDER_NONE);
                (format!("Math.atan2({y}, {x}) / Math.pi * 180"), MULTIPLICATIVE)
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
            Expr::Not { operand } => (format!("!{}", self.expr(operand, PREFIX)), PREFIX),
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
                [Expr::Text { value }] => (quote_single(value, &['$']), ATOMIC),
                [only] => self.method(only, "toString()"),
                _ => (format!("[{}].join()", self.args(parts)), POSTFIX),
            },
            Expr::TextLength { text } => self.method(text, "length"),
            Expr::TextIsEmpty { text } => self.method(text, "isEmpty"),
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
                TextCase::Upper => self.method(text, "toUpperCase()"),
                TextCase::Lower => self.method(text, "toLowerCase()"),
                TextCase::Title => {
                    let helper = self.ctx.helper("text_toTitleCase", |name| template(TITLE_CASE, name));
                    (format!("{helper}({})", self.expr(text, ORDER_NONE)), POSTFIX)
                }
            },
            Expr::Trim { mode, text } => match mode {
                TrimMode::Both => self.method(text, "trim()"),
                TrimMode::Left => self.method(text, "trimLeft()"),
                TrimMode::Right => self.method(text, "trimRight()"),
            },
            Expr::Prompt { kind, message } => {
                self.ctx.import(IO_IMPORT);
                let helper = self.ctx.helper("text_prompt", |name| template(PROMPT, name));
                let message = self.expr(message, ORDER_NONE);
                match kind {
                    PromptKind::Text => (format!("{helper}({message})"), POSTFIX),
                    PromptKind::Number => (format!("double.parse({helper}({message}))"), POSTFIX),
                }
            }
            Expr::ListCreate { items } => (format!("[{}]", self.args(items)), ATOMIC),
            Expr::ListRepeat { item, times } => {
                let item = self.expr(item, ORDER_NONE);
                let times = self.expr(times, ORDER_NONE);
                (format!("new List.filled({times}, {item})"), POSTFIX)
            }
            Expr::ListLength { list } => self.method(list, "length"),
            Expr::ListIsEmpty { list } => self.method(list, "isEmpty"),
            Expr::ListGet { list, index } => {
                let list = self.receiver(list);
                let index = match number_literal(index).and_then(as_whole) {
                    Some(n) => (n - 1).to_string(),
                    None => format!("{} - 1", self.expr(index, ADDITIVE)),
                };
                (format!("{list}[{index}]"), POSTFIX)
            }
            Expr::Call { name, args } => (self.call(name, args), POSTFIX),
        }
    }
}
