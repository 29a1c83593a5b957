//! PHP emitter.

use blocklab_core::block::{
    ArithmeticOp, CompareOp, LogicOp, LoopMode, MathConstant, NumberProperty, PromptKind, RoundOp,
    SingleOp, TextCase, TextEnd, TrigOp, TrimMode,
};
use blocklab_core::{Expr, LanguageKey, Procedure, Program, Stmt};

use super::{is_simple, join_stacks, number_literal, template, LiteralRange};
use crate::context::{as_whole, format_number, parenthesize, EmitContext, Order, ORDER_NONE};
use crate::emitter::Emitter;
use crate::writer::{assemble, CodeWriter};

const INDENT: &str = "  ";

const ATOMIC: Order = 0;
const MEMBER: Order = 21;
const CALL: Order = 22;
const POWER: Order = 30;
const LOGICAL_NOT: Order = 60;
const UNARY_NEGATION: Order = 72;
const MULTIPLICATIVE: Order = 81;
/// `+`, `-` and `.` share one level so mixed chains are always explicit.
const ADDITIVE: Order = 91;
const RELATIONAL: Order = 110;
const EQUALITY: Order = 120;
const LOGICAL_AND: Order = 140;
const LOGICAL_OR: Order = 150;
const CONDITIONAL: Order = 160;
const ASSIGNMENT: Order = 170;

/// Variables live behind `$`, so only function names can clash.
const RESERVED: &[&str] = &[
    "abstract", "and", "array", "as", "break", "callable", "case", "catch", "class", "clone",
    "const", "continue", "declare", "default", "do", "echo", "else", "elseif", "empty",
    "enddeclare", "endfor", "endforeach", "endif", "endswitch", "endwhile", "eval", "exit",
    "extends", "final", "finally", "fn", "for", "foreach", "function", "global", "goto", "if",
    "implements", "include", "instanceof", "insteadof", "interface", "isset", "list", "match",
    "namespace", "new", "or", "print", "private", "protected", "public", "require", "return",
    "static", "switch", "throw", "trait", "try", "unset", "use", "var", "while", "xor", "yield",
    "count", "strlen", "readline", "round", "floor", "ceil", "abs", "sqrt", "rand",
];

const INDEX_OF: &[&str] = &[
    "function {NAME}($text, $search) {",
    "  $pos = strpos($text, $search);",
    "  return $pos === false ? 0 : $pos + 1;",
    "}",
];

const LAST_INDEX_OF: &[&str] = &[
    "function {NAME}($text, $search) {",
    "  $pos = strrpos($text, $search);",
    "  return $pos === false ? 0 : $pos + 1;",
    "}",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PhpEmitter;

impl Emitter for PhpEmitter {
    fn language(&self) -> LanguageKey {
        LanguageKey::Php
    }

    fn emit(&self, program: &Program) -> String {
        let mut gen = Gen {
            ctx: EmitContext::new(program, RESERVED),
            globals: program.all_variables(),
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

        let mut definitions: Vec<String> = gen.ctx.helper_definitions().map(str::to_string).collect();
        definitions.extend(procedures);
        assemble(&definitions, &code)
    }
}

/// PHP string literal. Single quotes unless the text needs escapes that
/// only double quotes understand.
fn quote(text: &str) -> String {
    if !text.contains(['\n', '\r', '\t']) {
        return format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"));
    }
    let mut out = String::from("\"");
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct Gen {
    ctx: EmitContext,
    globals: Vec<String>,
}

impl Gen {
    fn var(&self, name: &str) -> String {
        format!("${}", self.ctx.var(name))
    }

    fn temp(&mut self, base: &str) -> String {
        format!("${}", self.ctx.names.distinct(base))
    }

    fn procedure(&mut self, procedure: &Procedure) -> String {
        let mut w = CodeWriter::new(INDENT);
        let params: Vec<String> = procedure.params.iter().map(|p| self.var(p)).collect();
        w.line(format!(
            "function {}({}) {{",
            self.ctx.procedure(&procedure.name),
            params.join(", ")
        ));
        w.indent();
        let globals: Vec<String> = self
            .globals
            .iter()
            .filter(|v| !procedure.params.contains(*v))
            .map(|v| self.var(v))
            .collect();
        if !globals.is_empty() {
            w.line(format!("global {};", globals.join(", ")));
        }
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
                w.line(format!("{} = {value};", self.var(name)));
            }
            Stmt::ChangeBy { name, delta } => {
                let delta = self.expr(delta, ASSIGNMENT);
                w.line(format!("{} += {delta};", self.var(name)));
            }
            Stmt::Append { name, text } => {
                let text = self.expr(text, ASSIGNMENT);
                w.line(format!("{} .= {text};", self.var(name)));
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
                let count = self.temp("count");
                let bound = match number_literal(times) {
                    Some(n) => format_number(n),
                    None if is_simple(times) => self.expr(times, RELATIONAL),
                    None => {
                        let end = self.temp(&format!("{}_end", &count[1..]));
                        let value = self.expr(times, ASSIGNMENT);
                        w.line(format!("{end} = {value};"));
                        end
                    }
                };
                self.braced(
                    w,
                    format!("for ({count} = 0; {count} < {bound}; {count}++)"),
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
                let i = self.var(name);
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
                    let base = self.ctx.var(name);
                    let start = self.temp(&format!("{base}_start"));
                    let end = self.temp(&format!("{base}_end"));
                    let inc = self.temp(&format!("{base}_inc"));
                    let from = self.expr(from, ASSIGNMENT);
                    let to = self.expr(to, ASSIGNMENT);
                    let by = self.expr(by, ORDER_NONE);
                    w.line(format!("{start} = {from};"));
                    w.line(format!("{end} = {to};"));
                    w.line(format!("{inc} = abs({by});"));
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
                let list = self.expr(list, ASSIGNMENT);
                let header = format!("foreach ({list} as {})", self.var(name));
                self.braced(w, header, body);
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

    fn function(&mut self, function: &str, operand: &Expr) -> (String, Order) {
        (format!("{function}({})", self.expr(operand, ORDER_NONE)), CALL)
    }

    fn value(&mut self, expr: &Expr) -> (String, Order) {
        match expr {
            Expr::Number { value } => {
                if value.is_nan() {
                    ("NAN".into(), ATOMIC)
                } else if value.is_infinite() {
                    if *value > 0.0 {
                        ("INF".into(), ATOMIC)
                    } else {
                        ("-INF".into(), UNARY_NEGATION)
                    }
                } else {
                    let code = format_number(*value);
                    let order = if code.starts_with('-') {
                        UNARY_NEGATION
                    } else {
                        ATOMIC
                    };
                    (code, order)
                }
            }
            Expr::Text { value } => (quote(value), ATOMIC),
            Expr::Boolean { value } => (value.to_string(), ATOMIC),
            Expr::Null => ("null".into(), ATOMIC),
            Expr::Variable { name } => (self.var(name), ATOMIC),
            Expr::Arithmetic { op, left, right } => {
                let (symbol, order) = match op {
                    ArithmeticOp::Add => ("+", ADDITIVE),
                    ArithmeticOp::Subtract => ("-", ADDITIVE),
                    ArithmeticOp::Multiply => ("*", MULTIPLICATIVE),
                    ArithmeticOp::Divide => ("/", MULTIPLICATIVE),
                    ArithmeticOp::Power => ("**", POWER),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Single { op, operand } => match op {
                SingleOp::Negate => (
                    format!("-{}", self.expr(operand, UNARY_NEGATION)),
                    UNARY_NEGATION,
                ),
                SingleOp::Root => self.function("sqrt", operand),
                SingleOp::Abs => self.function("abs", operand),
                SingleOp::Ln => self.function("log", operand),
                SingleOp::Log10 => self.function("log10", operand),
                SingleOp::Exp => self.function("exp", operand),
                SingleOp::Pow10 => (format!("pow(10, {})", self.expr(operand, ORDER_NONE)), CALL),
            },
            Expr::Trig { op, operand } => {
                let function = match op {
                    TrigOp::Sin => "sin",
                    TrigOp::Cos => "cos",
                    TrigOp::Tan => "tan",
                    TrigOp::Asin => "asin",
                    TrigOp::Acos => "acos",
                    TrigOp::Atan => "atan",
                };
                match op {
                    TrigOp::Sin | TrigOp::Cos | TrigOp::Tan => {
                        let x = self.expr(operand, MULTIPLICATIVE);
                        (format!("{function}({x} / 180 * pi())"), CALL)
                    }
                    _ => {
                        let x = self.expr(operand, ORDER_NONE);
                        (format!("{function}({x}) / pi() * 180"), MULTIPLICATIVE)
                    }
                }
            }
            Expr::Constant { constant } => match constant {
                MathConstant::Pi => ("M_PI".into(), ATOMIC),
                MathConstant::E => ("M_E".into(), ATOMIC),
                MathConstant::GoldenRatio => ("(1 + sqrt(5)) / 2".into(), MULTIPLICATIVE),
                MathConstant::Sqrt2 => ("M_SQRT2".into(), ATOMIC),
                MathConstant::Sqrt1_2 => ("M_SQRT1_2".into(), ATOMIC),
                MathConstant::Infinity => ("INF".into(), ATOMIC),
            },
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::Even => {
                    (format!("{} % 2 == 0", self.expr(operand, MULTIPLICATIVE)), EQUALITY)
                }
                NumberProperty::Odd => {
                    (format!("{} % 2 == 1", self.expr(operand, MULTIPLICATIVE)), EQUALITY)
                }
                NumberProperty::Whole => {
                    (format!("fmod({}, 1) == 0", self.expr(operand, ORDER_NONE)), EQUALITY)
                }
                NumberProperty::Positive => {
                    (format!("{} > 0", self.expr(operand, RELATIONAL)), RELATIONAL)
                }
                NumberProperty::Negative => {
                    (format!("{} < 0", self.expr(operand, RELATIONAL)), RELATIONAL)
                }
                NumberProperty::DivisibleBy { divisor } => {
                    let x = self.expr(operand, MULTIPLICATIVE);
                    let d = self.expr(divisor, MULTIPLICATIVE);
                    (format!("{x} % {d} == 0"), EQUALITY)
                }
            },
            Expr::Round { op, operand } => match op {
                RoundOp::Round => self.function("round", operand),
                RoundOp::RoundUp => self.function("ceil", operand),
                RoundOp::RoundDown => self.function("floor", operand),
            },
            Expr::Modulo { dividend, divisor } => {
                let a = self.expr(dividend, MULTIPLICATIVE);
                let b = self.expr(divisor, MULTIPLICATIVE);
                (format!("{a} % {b}"), MULTIPLICATIVE)
            }
            Expr::Constrain { value, low, high } => {
                let value = self.expr(value, ORDER_NONE);
                let low = self.expr(low, ORDER_NONE);
                let high = self.expr(high, ORDER_NONE);
                (format!("min(max({value}, {low}), {high})"), CALL)
            }
            Expr::RandomInt { from, to } => {
                let a = self.expr(from, ORDER_NONE);
                let b = self.expr(to, ORDER_NONE);
                (format!("rand({a}, {b})"), CALL)
            }
            Expr::RandomFraction => ("(float)rand() / (float)getrandmax()".into(), MULTIPLICATIVE),
            Expr::Atan2 { x, y } => {
                let x = self.expr(x, ORDER_NONE);
                let y = self.expr(y, ORDER_NONE);
                (format!("atan2({y}, {x}) / pi() * 180"), MULTIPLICATIVE)
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
                [Expr::Text { value }] => (quote(value), ATOMIC),
                [only] => self.function("strval", only),
                [a, b] => {
                    let a = self.expr(a, ADDITIVE);
                    let b = self.expr(b, ADDITIVE);
                    (format!("{a} . {b}"), ADDITIVE)
                }
                _ => (format!("implode('', array({}))", self.args(parts)), CALL),
            },
            Expr::TextLength { text } => self.function("strlen", text),
            Expr::TextIsEmpty { text } => self.function("empty", text),
            Expr::TextIndexOf { end, text, find } => {
                let helper = match end {
                    TextEnd::First => self.ctx.helper("text_indexOf", |name| template(INDEX_OF, name)),
                    TextEnd::Last => {
                        self.ctx.helper("text_lastIndexOf", |name| template(LAST_INDEX_OF, name))
                    }
                };
                let text = self.expr(text, ORDER_NONE);
                let find = self.expr(find, ORDER_NONE);
                (format!("{helper}({text}, {find})"), CALL)
            }
            Expr::ChangeCase { case, text } => match case {
                TextCase::Upper => self.function("strtoupper", text),
                TextCase::Lower => self.function("strtolower", text),
                TextCase::Title => (
                    format!("ucwords(strtolower({}))", self.expr(text, ORDER_NONE)),
                    CALL,
                ),
            },
            Expr::Trim { mode, text } => match mode {
                TrimMode::Both => self.function("trim", text),
                TrimMode::Left => self.function("ltrim", text),
                TrimMode::Right => self.function("rtrim", text),
            },
            Expr::Prompt { kind, message } => match kind {
                PromptKind::Text => self.function("readline", message),
                PromptKind::Number => (
                    format!("floatval(readline({}))", self.expr(message, ORDER_NONE)),
                    CALL,
                ),
            },
            Expr::ListCreate { items } => (format!("array({})", self.args(items)), CALL),
            Expr::ListRepeat { item, times } => {
                let item = self.expr(item, ORDER_NONE);
                let times = self.expr(times, ORDER_NONE);
                (format!("array_fill(0, {times}, {item})"), CALL)
            }
            Expr::ListLength { list } => self.function("count", list),
            Expr::ListIsEmpty { list } => self.function("empty", list),
            Expr::ListGet { list, index } => {
                let list = self.expr(list, MEMBER);
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
        PhpEmitter.emit(&Program {
            stacks: vec![BlockStack {
                id: BlockId(1),
                body,
            }],
            ..Program::default()
        })
    }

    #[test]
    fn variables_are_sigiled() {
        let code = emit_stack(vec![
            Stmt::set("name", Expr::text("Ada")),
            Stmt::Append {
                name: "name".into(),
                text: Expr::text("!"),
            },
            Stmt::print(Expr::var("name")),
        ]);
        assert_eq!(code, "$name = 'Ada';\n$name .= '!';\nprint($name);\n");
    }

    #[test]
    fn strings_with_newlines_use_double_quotes() {
        assert_eq!(quote("a\nb$"), "\"a\\nb\\$\"");
        assert_eq!(quote("it's"), "'it\\'s'");
    }

    #[test]
    fn index_of_registers_helper() {
        let code = emit_stack(vec![Stmt::print(Expr::TextIndexOf {
            end: TextEnd::First,
            text: Box::new(Expr::text("banana")),
            find: Box::new(Expr::text("an")),
        })]);
        assert!(code.starts_with("function text_indexOf($text, $search) {\n"));
        assert!(code.ends_with("\n\n\nprint(text_indexOf('banana', 'an'));\n"));
    }

    #[test]
    fn procedures_import_globals() {
        let program = Program {
            variables: vec!["hits".into()],
            procedures: vec![Procedure {
                id: BlockId(1),
                name: "hit".into(),
                params: vec![],
                body: vec![Stmt::ChangeBy {
                    name: "hits".into(),
                    delta: Expr::number(1.0),
                }],
                returns: None,
            }],
            stacks: vec![],
        };
        assert_eq!(
            PhpEmitter.emit(&program),
            "function hit() {\n  global $hits;\n  $hits += 1;\n}\n"
        );
    }
}
