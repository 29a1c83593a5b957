//! Python 3 emitter.

use blocklab_core::block::{
    ArithmeticOp, CompareOp, LogicOp, LoopMode, MathConstant, NumberProperty, PromptKind, RoundOp,
    SingleOp, TextCase, TextEnd, TrigOp, TrimMode,
};
use blocklab_core::{Expr, LanguageKey, Procedure, Program, Stmt};

use super::{join_stacks, number_literal, template, LiteralRange};
use crate::context::{as_whole, format_number, parenthesize, quote_single, EmitContext, Order, ORDER_NONE};
use crate::emitter::Emitter;
use crate::writer::{assemble, CodeWriter};

const INDENT: &str = "  ";

const ATOMIC: Order = 0;
const MEMBER: Order = 21;
const CALL: Order = 22;
const EXPONENTIATION: Order = 30;
const UNARY_SIGN: Order = 40;
const MULTIPLICATIVE: Order = 50;
const ADDITIVE: Order = 60;
const RELATIONAL: Order = 110;
const LOGICAL_NOT: Order = 120;
const LOGICAL_AND: Order = 130;
const LOGICAL_OR: Order = 140;
const CONDITIONAL: Order = 150;

const RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "print", "input", "len", "range", "str", "int", "float", "abs",
    "min", "max", "round", "list", "math", "random", "Number",
];

const COUNT_RANGE: &[&str] = &[
    "def {NAME}(start, stop, step):",
    "  step = abs(step) if start <= stop else -abs(step)",
    "  while (step >= 0 and start <= stop) or (step < 0 and start >= stop):",
    "    yield start",
    "    start += step",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonEmitter;

impl Emitter for PythonEmitter {
    fn language(&self) -> LanguageKey {
        LanguageKey::Python
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
                gen.block(&mut w, &stack.body, true);
                w.finish()
            })
            .collect();
        let code = join_stacks(stacks);

        let mut definitions = Vec::new();
        let imports: Vec<&str> = gen.ctx.imports().collect();
        if !imports.is_empty() {
            definitions.push(imports.join("\n"));
        }
        if !gen.globals.is_empty() {
            let declarations: Vec<String> = gen
                .globals
                .iter()
                .map(|v| format!("{} = None", gen.ctx.var(v)))
                .collect();
            definitions.push(declarations.join("\n"));
        }
        definitions.extend(gen.ctx.helper_definitions().map(str::to_string));
        definitions.extend(procedures);
        assemble(&definitions, &code)
    }
}

struct Gen {
    ctx: EmitContext,
    globals: Vec<String>,
}

impl Gen {
    fn procedure(&mut self, procedure: &Procedure) -> String {
        let mut w = CodeWriter::new(INDENT);
        let params: Vec<String> = procedure.params.iter().map(|p| self.ctx.var(p)).collect();
        w.line(format!(
            "def {}({}):",
            self.ctx.procedure(&procedure.name),
            params.join(", ")
        ));
        w.indent();
        let globals: Vec<String> = self
            .globals
            .iter()
            .filter(|v| !procedure.params.contains(*v))
            .map(|v| self.ctx.var(v))
            .collect();
        if !globals.is_empty() {
            w.line(format!("global {}", globals.join(", ")));
        }
        let mark = w.len();
        self.block(&mut w, &procedure.body, true);
        if let Some(value) = &procedure.returns {
            let value = self.expr(value, ORDER_NONE);
            w.line(format!("return {value}"));
        } else if globals.is_empty() && w.since(mark).is_empty() {
            w.line("pass");
        }
        w.finish()
    }

    /// Writes `body`; an empty body becomes `pass` unless `allow_empty`.
    fn block(&mut self, w: &mut CodeWriter, body: &[Stmt], allow_empty: bool) {
        let mark = w.len();
        for stmt in body {
            self.stmt(w, stmt);
        }
        if !allow_empty && w.since(mark).is_empty() {
            w.line("pass");
        }
    }

    fn suite(&mut self, w: &mut CodeWriter, header: String, body: &[Stmt]) {
        w.line(format!("{header}:"));
        w.indent();
        self.block(w, body, false);
        w.dedent();
    }

    fn stmt(&mut self, w: &mut CodeWriter, stmt: &Stmt) {
        match stmt {
            Stmt::Set { name, value } => {
                let value = self.expr(value, ORDER_NONE);
                w.line(format!("{} = {value}", self.ctx.var(name)));
            }
            Stmt::ChangeBy { name, delta } => {
                self.ctx.import("from numbers import Number");
                let x = self.ctx.var(name);
                let delta = self.expr(delta, ADDITIVE);
                w.line(format!("{x} = ({x} if isinstance({x}, Number) else 0) + {delta}"));
            }
            Stmt::Append { name, text } => {
                let x = self.ctx.var(name);
                let text = self.string_of(text);
                w.line(format!("{x} = str({x}) + {text}"));
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                if branches.is_empty() {
                    if let Some(otherwise) = otherwise {
                        self.block(w, otherwise, true);
                    }
                    return;
                }
                for (i, branch) in branches.iter().enumerate() {
                    let condition = self.expr(&branch.condition, ORDER_NONE);
                    let keyword = if i == 0 { "if" } else { "elif" };
                    self.suite(w, format!("{keyword} {condition}"), &branch.body);
                }
                if let Some(otherwise) = otherwise {
                    self.suite(w, "else".into(), otherwise);
                }
            }
            Stmt::Repeat { times, body } => {
                let count = self.ctx.names.distinct("count");
                let bound = match number_literal(times).and_then(as_whole) {
                    Some(n) => n.to_string(),
                    None => format!("int({})", self.expr(times, ORDER_NONE)),
                };
                self.suite(w, format!("for {count} in range({bound})"), body);
            }
            Stmt::While {
                mode,
                condition,
                body,
            } => {
                let header = match mode {
                    LoopMode::While => format!("while {}", self.expr(condition, ORDER_NONE)),
                    LoopMode::Until => format!("while not {}", self.expr(condition, LOGICAL_NOT)),
                };
                self.suite(w, header, body);
            }
            Stmt::For {
                name,
                from,
                to,
                by,
                body,
            } => {
                let i = self.ctx.var(name);
                let whole = LiteralRange::of(from, to, by)
                    .and_then(|range| range.whole().map(|bounds| (range, bounds)));
                let header = match whole {
                    Some((range, (a, b, step))) if step != 0 => {
                        let args = if range.ascending() {
                            if step == 1 {
                                format!("{a}, {}", b + 1)
                            } else {
                                format!("{a}, {}, {step}", b + 1)
                            }
                        } else {
                            format!("{a}, {}, -{step}", b - 1)
                        };
                        format!("for {i} in range({args})")
                    }
                    _ => {
                        let helper = self.ctx.helper("count_range", |name| template(COUNT_RANGE, name));
                        let from = self.expr(from, ORDER_NONE);
                        let to = self.expr(to, ORDER_NONE);
                        let by = self.expr(by, ORDER_NONE);
                        format!("for {i} in {helper}({from}, {to}, {by})")
                    }
                };
                self.suite(w, header, body);
            }
            Stmt::ForEach { name, list, body } => {
                let x = self.ctx.var(name);
                let list = self.expr(list, RELATIONAL);
                self.suite(w, format!("for {x} in {list}"), body);
            }
            Stmt::Break => w.line("break"),
            Stmt::Continue => w.line("continue"),
            Stmt::Print { value } => {
                let value = self.expr(value, ORDER_NONE);
                w.line(format!("print({value})"));
            }
            Stmt::Call { name, args } => {
                let call = self.call(name, args);
                w.line(call);
            }
        }
    }

    fn expr(&mut self, expr: &Expr, outer: Order) -> String {
        let (code, inner) = self.value(expr);
        parenthesize(code, inner, outer)
    }

    fn string_of(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Text { value } => quote_single(value, &[]),
            _ => format!("str({})", self.expr(expr, ORDER_NONE)),
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
        self.ctx.import("import math");
        (format!("math.{function}({})", self.expr(operand, ORDER_NONE)), CALL)
    }

    fn value(&mut self, expr: &Expr) -> (String, Order) {
        match expr {
            Expr::Number { value } => {
                if value.is_nan() {
                    ("float('nan')".into(), CALL)
                } else if value.is_infinite() {
                    if *value > 0.0 {
                        ("float('inf')".into(), CALL)
                    } else {
                        ("-float('inf')".into(), UNARY_SIGN)
                    }
                } else {
                    let code = format_number(*value);
                    let order = if code.starts_with('-') { UNARY_SIGN } else { ATOMIC };
                    (code, order)
                }
            }
            Expr::Text { value } => (quote_single(value, &[]), ATOMIC),
            Expr::Boolean { value } => ((if *value { "True" } else { "False" }).into(), ATOMIC),
            Expr::Null => ("None".into(), ATOMIC),
            Expr::Variable { name } => (self.ctx.var(name), ATOMIC),
            Expr::Arithmetic { op, left, right } => {
                let (symbol, order) = match op {
                    ArithmeticOp::Add => ("+", ADDITIVE),
                    ArithmeticOp::Subtract => ("-", ADDITIVE),
                    ArithmeticOp::Multiply => ("*", MULTIPLICATIVE),
                    ArithmeticOp::Divide => ("/", MULTIPLICATIVE),
                    ArithmeticOp::Power => ("**", EXPONENTIATION),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Single { op, operand } => match op {
                SingleOp::Negate => (format!("-{}", self.expr(operand, UNARY_SIGN)), UNARY_SIGN),
                SingleOp::Root => self.math("sqrt", operand),
                SingleOp::Abs => self.math("fabs", operand),
                SingleOp::Ln => self.math("log", operand),
                SingleOp::Log10 => self.math("log10", operand),
                SingleOp::Exp => self.math("exp", operand),
                SingleOp::Pow10 => {
                    self.ctx.import("import math");
                    (format!("math.pow(10, {})", self.expr(operand, ORDER_NONE)), CALL)
                }
            },
            Expr::Trig { op, operand } => {
                self.ctx.import("import math");
                match op {
                    TrigOp::Sin | TrigOp::Cos | TrigOp::Tan => {
                        let function = match op {
                            TrigOp::Sin => "sin",
                            TrigOp::Cos => "cos",
                            _ => "tan",
                        };
                        let x = self.expr(operand, MULTIPLICATIVE);
                        (format!("math.{function}({x} / 180.0 * math.pi)"), CALL)
                    }
                    _ => {
                        let function = match op {
                            TrigOp::Asin => "asin",
                            TrigOp::Acos => "acos",
                            _ => "atan",
                        };
                        let x = self.expr(operand, ORDER_NONE);
                        (format!("math.{function}({x}) / math.pi * 180"), MULTIPLICATIVE)
                    }
                }
            }
            Expr::Constant { constant } => {
                if *constant == MathConstant::Infinity {
                    return ("float('inf')".into(), CALL);
                }
                self.ctx.import("import math");
                match constant {
                    MathConstant::Pi => ("math.pi".into(), MEMBER),
                    MathConstant::E => ("math.e".into(), MEMBER),
                    MathConstant::GoldenRatio => ("(1 + math.sqrt(5)) / 2".into(), MULTIPLICATIVE),
                    MathConstant::Sqrt2 => ("math.sqrt(2)".into(), CALL),
                    _ => ("math.sqrt(1.0 / 2)".into(), CALL),
                }
            }
            Expr::NumberProperty { property, operand } => match property {
                NumberProperty::Positive => (format!("{} > 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::Negative => (format!("{} < 0", self.expr(operand, RELATIONAL)), RELATIONAL),
                NumberProperty::DivisibleBy { divisor } => {
                    let x = self.expr(operand, MULTIPLICATIVE);
                    let d = self.expr(divisor, MULTIPLICATIVE);
                    (format!("{x} % {d} == 0"), RELATIONAL)
                }
                _ => {
                    let (modulus, remainder) = match property {
                        NumberProperty::Even => (2, 0),
                        NumberProperty::Odd => (2, 1),
                        _ => (1, 0),
                    };
                    let x = self.expr(operand, MULTIPLICATIVE);
                    (format!("{x} % {modulus} == {remainder}"), RELATIONAL)
                }
            },
            Expr::Round { op, operand } => match op {
                RoundOp::Round => (format!("round({})", self.expr(operand, ORDER_NONE)), CALL),
                RoundOp::RoundUp => self.math("ceil", operand),
                RoundOp::RoundDown => self.math("floor", operand),
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
                self.ctx.import("import random");
                let a = self.expr(from, ORDER_NONE);
                let b = self.expr(to, ORDER_NONE);
                (format!("random.randint({a}, {b})"), CALL)
            }
            Expr::RandomFraction => {
                self.ctx.import("import random");
                ("random.random()".into(), CALL)
            }
            Expr::Atan2 { x, y } => {
                self.ctx.import("import math");
                let x = self.expr(x, ORDER_NONE);
                let y = self.expr(y, ORDER_NONE);
                (format!("math.atan2({y}, {x}) / math.pi * 180"), MULTIPLICATIVE)
            }
            Expr::Compare { op, left, right } => {
                let symbol = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Neq => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Lte => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Gte => ">=",
                };
                let l = self.expr(left, RELATIONAL);
                let r = self.expr(right, RELATIONAL);
                (format!("{l} {symbol} {r}"), RELATIONAL)
            }
            Expr::Logic { op, left, right } => {
                let (symbol, order) = match op {
                    LogicOp::And => ("and", LOGICAL_AND),
                    LogicOp::Or => ("or", LOGICAL_OR),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Not { operand } => (format!("not {}", self.expr(operand, LOGICAL_NOT)), LOGICAL_NOT),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let c = self.expr(condition, CONDITIONAL);
                let a = self.expr(then, CONDITIONAL);
                let b = self.expr(otherwise, CONDITIONAL);
                (format!("{a} if {c} else {b}"), CONDITIONAL)
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
                    let items: Vec<String> = parts.iter().map(|p| self.string_of(p)).collect();
                    (format!("''.join([{}])", items.join(", ")), CALL)
                }
            },
            Expr::TextLength { text } => (format!("len({})", self.expr(text, ORDER_NONE)), CALL),
            Expr::TextIsEmpty { text } => (format!("not len({})", self.expr(text, ORDER_NONE)), LOGICAL_NOT),
            Expr::TextIndexOf { end, text, find } => {
                let method = match end {
                    TextEnd::First => "find",
                    TextEnd::Last => "rfind",
                };
                let text = self.expr(text, MEMBER);
                let find = self.expr(find, ORDER_NONE);
                (format!("{text}.{method}({find}) + 1"), ADDITIVE)
            }
            Expr::ChangeCase { case, text } => {
                let method = match case {
                    TextCase::Upper => "upper",
                    TextCase::Lower => "lower",
                    TextCase::Title => "title",
                };
                (format!("{}.{method}()", self.expr(text, MEMBER)), CALL)
            }
            Expr::Trim { mode, text } => {
                let method = match mode {
                    TrimMode::Both => "strip",
                    TrimMode::Left => "lstrip",
                    TrimMode::Right => "rstrip",
                };
                (format!("{}.{method}()", self.expr(text, MEMBER)), CALL)
            }
            Expr::Prompt { kind, message } => {
                let message = self.expr(message, ORDER_NONE);
                match kind {
                    PromptKind::Text => (format!("input({message})"), CALL),
                    PromptKind::Number => (format!("float(input({message}))"), CALL),
                }
            }
            Expr::ListCreate { items } => (format!("[{}]", self.args(items)), ATOMIC),
            Expr::ListRepeat { item, times } => {
                let item = self.expr(item, ORDER_NONE);
                let times = self.expr(times, MULTIPLICATIVE);
                (format!("[{item}] * {times}"), MULTIPLICATIVE)
            }
            Expr::ListLength { list } => (format!("len({})", self.expr(list, ORDER_NONE)), CALL),
            Expr::ListIsEmpty { list } => (format!("not len({})", self.expr(list, ORDER_NONE)), LOGICAL_NOT),
            Expr::ListGet { list, index } => {
                let list = self.expr(list, MEMBER);
                let index = match number_literal(index).and_then(as_whole) {
                    Some(n) => (n - 1).to_string(),
                    None => format!("int({} - 1)", self.expr(index, ADDITIVE)),
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

    fn program_with(body: Vec<Stmt>) -> Program {
        Program {
            stacks: vec![BlockStack {
                id: BlockId(1),
                body,
            }],
            ..Program::default()
        }
    }

    #[test]
    fn globals_are_initialised_to_none() {
        let code = PythonEmitter.emit(&program_with(vec![
            Stmt::set("x", Expr::number(1.5)),
            Stmt::print(Expr::var("x")),
        ]));
        assert_eq!(code, "x = None\n\n\nx = 1.5\nprint(x)\n");
    }

    #[test]
    fn imports_come_first() {
        let code = PythonEmitter.emit(&program_with(vec![Stmt::print(Expr::Constant {
            constant: MathConstant::Pi,
        })]));
        assert_eq!(code, "import math\n\n\nprint(math.pi)\n");
    }

    #[test]
    fn empty_loop_body_gets_pass() {
        let code = PythonEmitter.emit(&program_with(vec![Stmt::repeat(Expr::number(4.0), vec![])]));
        assert_eq!(code, "for count in range(4):\n  pass\n");
    }

    #[test]
    fn literal_for_uses_inclusive_range() {
        let code = PythonEmitter.emit(&program_with(vec![Stmt::For {
            name: "i".into(),
            from: Expr::number(1.0),
            to: Expr::number(10.0),
            by: Expr::number(2.0),
            body: vec![Stmt::print(Expr::var("i"))],
        }]));
        assert!(code.ends_with("for i in range(1, 11, 2):\n  print(i)\n"));
    }

    #[test]
    fn procedure_declares_globals_except_params() {
        let program = Program {
            variables: vec!["total".into()],
            procedures: vec![Procedure {
                id: BlockId(1),
                name: "add".into(),
                params: vec!["n".into()],
                body: vec![Stmt::set(
                    "total",
                    Expr::arithmetic(ArithmeticOp::Add, Expr::var("total"), Expr::var("n")),
                )],
                returns: None,
            }],
            stacks: vec![],
        };
        assert_eq!(
            PythonEmitter.emit(&program),
            concat!(
                "total = None\n",
                "n = None\n",
                "\n",
                "def add(n):\n",
                "  global total\n",
                "  total = total + n\n"
            )
        );
    }

    #[test]
    fn ternary_reads_python_style() {
        let expr = Expr::Ternary {
            condition: Box::new(Expr::boolean(true)),
            then: Box::new(Expr::text("yes")),
            otherwise: Box::new(Expr::text("no")),
        };
        let code = PythonEmitter.emit(&program_with(vec![Stmt::print(expr)]));
        assert_eq!(code, "print('yes' if True else 'no')\n");
    }
}
