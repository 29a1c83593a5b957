//! Lua 5.2+ emitter.
//!
//! Lua has no `continue`; loops whose body continues get a `goto` target
//! label at the end of the body, named uniquely per loop.

use blocklab_core::block::{
    ArithmeticOp, CompareOp, LogicOp, LoopMode, MathConstant, NumberProperty, PromptKind, RoundOp,
    SingleOp, TextCase, TextEnd, TrigOp, TrimMode,
};
use blocklab_core::{Expr, LanguageKey, Procedure, Program, Stmt};

use super::{continues_here, join_stacks, template, LiteralRange};
use crate::context::{format_number, parenthesize, quote_single, EmitContext, Order, ORDER_NONE};
use crate::emitter::Emitter;
use crate::writer::{assemble, CodeWriter};

const INDENT: &str = "  ";

const ATOMIC: Order = 0;
const HIGH: Order = 10;
const EXPONENTIATION: Order = 20;
const UNARY: Order = 30;
const MULTIPLICATIVE: Order = 40;
const ADDITIVE: Order = 50;
const CONCATENATION: Order = 60;
const RELATIONAL: Order = 70;
const AND: Order = 80;
const OR: Order = 90;

const RESERVED: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    "_G", "_", "math", "string", "table", "io", "print", "tostring", "tonumber", "ipairs",
    "pairs",
];

const FIRST_INDEX_OF: &[&str] = &[
    "function {NAME}(str, substr)",
    "  local i = string.find(str, substr, 1, true)",
    "  if i == nil then",
    "    return 0",
    "  end",
    "  return i",
    "end",
];

const LAST_INDEX_OF: &[&str] = &[
    "function {NAME}(str, substr)",
    "  local i = string.find(string.reverse(str), string.reverse(substr), 1, true)",
    "  if i then",
    "    return #str + 2 - i - #substr",
    "  end",
    "  return 0",
    "end",
];

const TITLE_CASE: &[&str] = &[
    "function {NAME}(str)",
    "  return (string.gsub(str, \"(%a)([%w_']*)\", function(first, rest)",
    "    return string.upper(first) .. string.lower(rest)",
    "  end))",
    "end",
];

const PROMPT: &[&str] = &[
    "function {NAME}(msg)",
    "  io.write(msg)",
    "  io.flush()",
    "  return io.read()",
    "end",
];

const LIST_REPEAT: &[&str] = &[
    "function {NAME}(item, count)",
    "  local t = {}",
    "  for i = 1, count do",
    "    table.insert(t, item)",
    "  end",
    "  return t",
    "end",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LuaEmitter;

impl Emitter for LuaEmitter {
    fn language(&self) -> LanguageKey {
        LanguageKey::Lua
    }

    fn emit(&self, program: &Program) -> String {
        let mut gen = Gen {
            ctx: EmitContext::new(program, RESERVED),
            continue_labels: Vec::new(),
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

struct Gen {
    ctx: EmitContext,
    /// Label targeted by `continue` in each enclosing loop that needs one.
    continue_labels: Vec<String>,
}

impl Gen {
    fn procedure(&mut self, procedure: &Procedure) -> String {
        let mut w = CodeWriter::new(INDENT);
        let params: Vec<String> = procedure.params.iter().map(|p| self.ctx.var(p)).collect();
        w.line(format!(
            "function {}({})",
            self.ctx.procedure(&procedure.name),
            params.join(", ")
        ));
        w.indent();
        self.block(&mut w, &procedure.body);
        if let Some(value) = &procedure.returns {
            let value = self.expr(value, ORDER_NONE);
            w.line(format!("return {value}"));
        }
        w.dedent();
        w.line("end");
        w.finish()
    }

    fn block(&mut self, w: &mut CodeWriter, body: &[Stmt]) {
        for stmt in body {
            self.stmt(w, stmt);
        }
    }

    /// `header` line, loop body (with a continue label if needed), `end`.
    fn loop_block(&mut self, w: &mut CodeWriter, header: String, body: &[Stmt]) {
        w.line(header);
        w.indent();
        if continues_here(body) {
            let label = self.ctx.names.distinct("continue");
            self.continue_labels.push(label);
            self.block(w, body);
            if let Some(label) = self.continue_labels.pop() {
                w.line(format!("::{label}::"));
            }
        } else {
            self.block(w, body);
        }
        w.dedent();
        w.line("end");
    }

    fn stmt(&mut self, w: &mut CodeWriter, stmt: &Stmt) {
        match stmt {
            Stmt::Set { name, value } => {
                let value = self.expr(value, ORDER_NONE);
                w.line(format!("{} = {value}", self.ctx.var(name)));
            }
            Stmt::ChangeBy { name, delta } => {
                let x = self.ctx.var(name);
                let delta = self.expr(delta, ADDITIVE);
                w.line(format!("{x} = {x} + {delta}"));
            }
            Stmt::Append { name, text } => {
                let x = self.ctx.var(name);
                let text = self.string_of(text);
                w.line(format!("{x} = tostring({x}) .. {text}"));
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
                    let keyword = if i == 0 { "if" } else { "elseif" };
                    w.line(format!("{keyword} {condition} then"));
                    w.indent();
                    self.block(w, &branch.body);
                    w.dedent();
                }
                if let Some(otherwise) = otherwise {
                    w.line("else");
                    w.indent();
                    self.block(w, otherwise);
                    w.dedent();
                }
                w.line("end");
            }
            Stmt::Repeat { times, body } => {
                let count = self.ctx.names.distinct("count");
                let bound = self.expr(times, ORDER_NONE);
                self.loop_block(w, format!("for {count} = 1, {bound} do"), body);
            }
            Stmt::While {
                mode,
                condition,
                body,
            } => {
                let header = match mode {
                    LoopMode::While => format!("while {} do", self.expr(condition, ORDER_NONE)),
                    LoopMode::Until => format!("while not {} do", self.expr(condition, UNARY)),
                };
                self.loop_block(w, header, body);
            }
            Stmt::For {
                name,
                from,
                to,
                by,
                body,
            } => {
                let i = self.ctx.var(name);
                let header = if let Some(range) = LiteralRange::of(from, to, by) {
                    let (a, b) = (format_number(range.from), format_number(range.to));
                    match (range.ascending(), range.step == 1.0) {
                        (true, true) => format!("for {i} = {a}, {b} do"),
                        (true, false) => format!("for {i} = {a}, {b}, {} do", format_number(range.step)),
                        (false, _) => format!("for {i} = {a}, {b}, -{} do", format_number(range.step)),
                    }
                } else {
                    let start = self.ctx.names.distinct(&format!("{i}_start"));
                    let end = self.ctx.names.distinct(&format!("{i}_end"));
                    let inc = self.ctx.names.distinct(&format!("{i}_inc"));
                    let from = self.expr(from, ORDER_NONE);
                    let to = self.expr(to, ORDER_NONE);
                    let by = self.expr(by, ORDER_NONE);
                    w.line(format!("local {start} = {from}"));
                    w.line(format!("local {end} = {to}"));
                    w.line(format!("local {inc} = math.abs({by})"));
                    w.line(format!("if {start} > {end} then"));
                    w.indent();
                    w.line(format!("{inc} = -{inc}"));
                    w.dedent();
                    w.line("end");
                    format!("for {i} = {start}, {end}, {inc} do")
                };
                self.loop_block(w, header, body);
            }
            Stmt::ForEach { name, list, body } => {
                let x = self.ctx.var(name);
                let list = self.expr(list, ORDER_NONE);
                self.loop_block(w, format!("for _, {x} in ipairs({list}) do"), body);
            }
            Stmt::Break => w.line("break"),
            Stmt::Continue => {
                let label = self
                    .continue_labels
                    .last()
                    .map_or("continue", String::as_str);
                w.line(format!("goto {label}"));
            }
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
            _ => format!("tostring({})", self.expr(expr, ORDER_NONE)),
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

    fn function(&mut self, function: &str, operand: &Expr) -> (String, Order) {
        (format!("{function}({})", self.expr(operand, ORDER_NONE)), HIGH)
    }

    fn value(&mut self, expr: &Expr) -> (String, Order) {
        match expr {
            Expr::Number { value } => {
                if value.is_nan() {
                    ("0 / 0".into(), MULTIPLICATIVE)
                } else if value.is_infinite() {
                    if *value > 0.0 {
                        ("math.huge".into(), HIGH)
                    } else {
                        ("-math.huge".into(), UNARY)
                    }
                } else {
                    let code = format_number(*value);
                    let order = if code.starts_with('-') { UNARY } else { ATOMIC };
                    (code, order)
                }
            }
            Expr::Text { value } => (quote_single(value, &[]), ATOMIC),
            Expr::Boolean { value } => (value.to_string(), ATOMIC),
            Expr::Null => ("nil".into(), ATOMIC),
            Expr::Variable { name } => (self.ctx.var(name), ATOMIC),
            Expr::Arithmetic { op, left, right } => {
                let (symbol, order) = match op {
                    ArithmeticOp::Add => ("+", ADDITIVE),
                    ArithmeticOp::Subtract => ("-", ADDITIVE),
                    ArithmeticOp::Multiply => ("*", MULTIPLICATIVE),
                    ArithmeticOp::Divide => ("/", MULTIPLICATIVE),
                    ArithmeticOp::Power => ("^", EXPONENTIATION),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Single { op, operand } => match op {
                SingleOp::Negate => (format!("-{}", self.expr(operand, UNARY)), UNARY),
                SingleOp::Root => self.function("math.sqrt", operand),
                SingleOp::Abs => self.function("math.abs", operand),
                SingleOp::Ln => self.function("math.log", operand),
                SingleOp::Log10 => (format!("math.log({}, 10)", self.expr(operand, ORDER_NONE)), HIGH),
                SingleOp::Exp => self.function("math.exp", operand),
                SingleOp::Pow10 => (format!("10 ^ {}", self.expr(operand, EXPONENTIATION)), EXPONENTIATION),
            },
            Expr::Trig { op, operand } => {
                let x = self.expr(operand, ORDER_NONE);
                let code = match op {
                    TrigOp::Sin => format!("math.sin(math.rad({x}))"),
                    TrigOp::Cos => format!("math.cos(math.rad({x}))"),
                    TrigOp::Tan => format!("math.tan(math.rad({x}))"),
                    TrigOp::Asin => format!("math.deg(math.asin({x}))"),
                    TrigOp::Acos => format!("math.deg(math.acos({x}))"),
                    TrigOp::Atan => format!("math.deg(math.atan({x}))"),
                };
                (code, HIGH)
            }
            Expr::Constant { constant } => match constant {
                MathConstant::Pi => ("math.pi".into(), HIGH),
                MathConstant::E => ("math.exp(1)".into(), HIGH),
                MathConstant::GoldenRatio => ("(1 + math.sqrt(5)) / 2".into(), MULTIPLICATIVE),
                MathConstant::Sqrt2 => ("math.sqrt(2)".into(), HIGH),
                MathConstant::Sqrt1_2 => ("math.sqrt(1 / 2)".into(), HIGH),
                MathConstant::Infinity => ("math.huge".into(), HIGH),
            },
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
                RoundOp::Round => (format!("math.floor({} + .5)", self.expr(operand, ADDITIVE)), HIGH),
                RoundOp::RoundUp => self.function("math.ceil", operand),
                RoundOp::RoundDown => self.function("math.floor", operand),
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
                (format!("math.min(math.max({value}, {low}), {high})"), HIGH)
            }
            Expr::RandomInt { from, to } => {
                let a = self.expr(from, ORDER_NONE);
                let b = self.expr(to, ORDER_NONE);
                (format!("math.random({a}, {b})"), HIGH)
            }
            Expr::RandomFraction => ("math.random()".into(), HIGH),
            Expr::Atan2 { x, y } => {
                let x = self.expr(x, ORDER_NONE);
                let y = self.expr(y, ORDER_NONE);
                (format!("math.deg(math.atan2({y}, {x}))"), HIGH)
            }
            Expr::Compare { op, left, right } => {
                let symbol = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Neq => "~=",
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
                    LogicOp::And => ("and", AND),
                    LogicOp::Or => ("or", OR),
                };
                let l = self.expr(left, order);
                let r = self.expr(right, order);
                (format!("{l} {symbol} {r}"), order)
            }
            Expr::Not { operand } => (format!("not {}", self.expr(operand, UNARY)), UNARY),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let c = self.expr(condition, AND);
                let a = self.expr(then, AND);
                let b = self.expr(otherwise, OR);
                (format!("{c} and {a} or {b}"), OR)
            }
            Expr::Join { parts } => match parts.as_slice() {
                [] => ("''".into(), ATOMIC),
                [Expr::Text { value }] => (quote_single(value, &[]), ATOMIC),
                [only] => (self.string_of(only), HIGH),
                [a, b] => {
                    let a = self.string_of(a);
                    let b = self.string_of(b);
                    (format!("{a} .. {b}"), CONCATENATION)
                }
                _ => {
                    let items: Vec<String> = parts.iter().map(|p| self.string_of(p)).collect();
                    (format!("table.concat({{{}}})", items.join(", ")), HIGH)
                }
            },
            Expr::TextLength { text } => (format!("#{}", self.expr(text, UNARY)), UNARY),
            Expr::TextIsEmpty { text } => (format!("#{} == 0", self.expr(text, UNARY)), RELATIONAL),
            Expr::TextIndexOf { end, text, find } => {
                let helper = match end {
                    TextEnd::First => self.ctx.helper("firstIndexOf", |name| template(FIRST_INDEX_OF, name)),
                    TextEnd::Last => self.ctx.helper("lastIndexOf", |name| template(LAST_INDEX_OF, name)),
                };
                let text = self.expr(text, ORDER_NONE);
                let find = self.expr(find, ORDER_NONE);
                (format!("{helper}({text}, {find})"), HIGH)
            }
            Expr::ChangeCase { case, text } => match case {
                TextCase::Upper => self.function("string.upper", text),
                TextCase::Lower => self.function("string.lower", text),
                TextCase::Title => {
                    let helper = self.ctx.helper("string_title_case", |name| template(TITLE_CASE, name));
                    (format!("{helper}({})", self.expr(text, ORDER_NONE)), HIGH)
                }
            },
            Expr::Trim { mode, text } => {
                let pattern = match mode {
                    TrimMode::Both => "^%s*(.-)%s*$",
                    TrimMode::Left => "^%s*(.-)$",
                    TrimMode::Right => "^(.-)%s*$",
                };
                let text = self.expr(text, ORDER_NONE);
                (format!("(string.gsub({text}, \"{pattern}\", \"%1\"))"), ATOMIC)
            }
            Expr::Prompt { kind, message } => {
                let helper = self.ctx.helper("text_prompt", |name| template(PROMPT, name));
                let message = self.expr(message, ORDER_NONE);
                match kind {
                    PromptKind::Text => (format!("{helper}({message})"), HIGH),
                    PromptKind::Number => (format!("tonumber({helper}({message}))"), HIGH),
                }
            }
            Expr::ListCreate { items } => (format!("{{{}}}", self.args(items)), HIGH),
            Expr::ListRepeat { item, times } => {
                let helper = self.ctx.helper("create_list_repeated", |name| template(LIST_REPEAT, name));
                let item = self.expr(item, ORDER_NONE);
                let times = self.expr(times, ORDER_NONE);
                (format!("{helper}({item}, {times})"), HIGH)
            }
            Expr::ListLength { list } => (format!("#{}", self.expr(list, UNARY)), UNARY),
            Expr::ListIsEmpty { list } => (format!("#{} == 0", self.expr(list, UNARY)), RELATIONAL),
            Expr::ListGet { list, index } => {
                let list = self.expr(list, HIGH);
                let index = self.expr(index, ORDER_NONE);
                (format!("{list}[{index}]"), HIGH)
            }
            Expr::Call { name, args } => (self.call(name, args), HIGH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocklab_core::{BlockId, BlockStack};

    fn emit_stack(body: Vec<Stmt>) -> String {
        LuaEmitter.emit(&Program {
            stacks: vec![BlockStack {
                id: BlockId(1),
                body,
            }],
            ..Program::default()
        })
    }

    #[test]
    fn if_chain_uses_elseif_and_end() {
        let code = emit_stack(vec![Stmt::If {
            branches: vec![
                blocklab_core::Branch {
                    condition: Expr::compare(CompareOp::Neq, Expr::var("x"), Expr::number(1.0)),
                    body: vec![Stmt::print(Expr::text("a"))],
                },
                blocklab_core::Branch {
                    condition: Expr::boolean(false),
                    body: vec![Stmt::print(Expr::text("b"))],
                },
            ],
            otherwise: Some(vec![Stmt::print(Expr::Null)]),
        }]);
        assert_eq!(
            code,
            concat!(
                "if x ~= 1 then\n",
                "  print('a')\n",
                "elseif false then\n",
                "  print('b')\n",
                "else\n",
                "  print(nil)\n",
                "end\n"
            )
        );
    }

    #[test]
    fn continue_becomes_goto_label() {
        let code = emit_stack(vec![Stmt::repeat(
            Expr::number(3.0),
            vec![Stmt::Continue, Stmt::print(Expr::text("never"))],
        )]);
        assert_eq!(
            code,
            concat!(
                "for count = 1, 3 do\n",
                "  goto continue\n",
                "  print('never')\n",
                "  ::continue::\n",
                "end\n"
            )
        );
    }

    #[test]
    fn nested_continues_get_distinct_labels() {
        let inner = Stmt::repeat(Expr::number(2.0), vec![Stmt::Continue]);
        let code = emit_stack(vec![Stmt::repeat(
            Expr::number(2.0),
            vec![inner, Stmt::Continue],
        )]);
        assert!(code.contains("    goto continue2\n    ::continue2::\n"));
        assert!(code.contains("  goto continue\n  ::continue::\n"));
    }

    #[test]
    fn list_literals_are_parenthesised_before_indexing() {
        let get = Expr::ListGet {
            list: Box::new(Expr::list(vec![Expr::number(7.0)])),
            index: Box::new(Expr::number(1.0)),
        };
        assert_eq!(emit_stack(vec![Stmt::print(get)]), "print(({7})[1])\n");
    }

    #[test]
    fn ternary_uses_and_or() {
        let expr = Expr::Ternary {
            condition: Box::new(Expr::var("ok")),
            then: Box::new(Expr::number(1.0)),
            otherwise: Box::new(Expr::number(2.0)),
        };
        assert_eq!(emit_stack(vec![Stmt::print(expr)]), "print(ok and 1 or 2)\n");
    }
}
