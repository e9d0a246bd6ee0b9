use crate::error::{ResponseError, ResponseResult};
use crate::traits::Scalar;
use std::fmt;

/// Instructions of the forcing VM. Binary ops pop the right operand first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    LoadConst(f64),
    /// Push `t`.
    LoadTime,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Sin,
    Cos,
    Exp,
    Neg,
}

/// Postfix program for one forcing expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Evaluates a [`Bytecode`] program at one value of `t`, using `stack` as
/// scratch space so callers can reuse the allocation across steps.
///
/// Malformed bytecode yields NaN, which callers detect as a non-finite result.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, t: T, stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match op {
                OpCode::LoadConst(val) => stack.push(T::lit(*val)),
                OpCode::LoadTime => stack.push(t),
                OpCode::Add => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a + b);
                }
                OpCode::Sub => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a - b);
                }
                OpCode::Mul => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a * b);
                }
                OpCode::Div => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a / b);
                }
                OpCode::Pow => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a.powf(b));
                }
                OpCode::Sin => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(a.sin());
                }
                OpCode::Cos => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(a.cos());
                }
                OpCode::Exp => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(a.exp());
                }
                OpCode::Neg => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(-a);
                }
            }
        }

        stack.pop().unwrap_or_else(T::nan)
    }
}

fn pop_pair<T: Scalar>(stack: &mut Vec<T>) -> (T, T) {
    let b = stack.pop().unwrap_or_else(T::nan);
    let a = stack.pop().unwrap_or_else(T::nan);
    (a, b)
}

// --- Expression tree ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Exp,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "exp" => Some(Function::Exp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Exp => "exp",
        }
    }
}

/// Abstract Syntax Tree nodes for expressions in `t`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Time,
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, ^
    Unary(char, Box<Expr>),             // only '-'
    Call(Function, Box<Expr>),
}

impl Expr {
    /// True when the expression does not depend on `t`.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Number(_) => true,
            Expr::Time => false,
            Expr::Binary(left, _, right) => left.is_constant() && right.is_constant(),
            Expr::Unary(_, operand) | Expr::Call(_, operand) => operand.is_constant(),
        }
    }

    /// Evaluates a `t`-free expression.
    pub fn constant_value(&self) -> Option<f64> {
        if !self.is_constant() {
            return None;
        }
        let value = VM::execute(&compile(self), 0.0_f64, &mut Vec::new());
        value.is_finite().then_some(value)
    }
}

impl Expr {
    /// Binding strength, matching the parser's grammar levels.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, '+' | '-', _) => 1,
            Expr::Binary(_, '*' | '/', _) => 2,
            Expr::Unary(..) => 3,
            Expr::Binary(..) => 4,
            Expr::Number(_) | Expr::Time | Expr::Call(..) => 5,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Time => write!(f, "t"),
            Expr::Binary(left, op, right) => {
                let own = self.precedence();
                // `^` is right-associative and its base must be atomic; the
                // other operators are left-associative, and `-` and `/` also
                // need a same-level right operand wrapped.
                let (left_min, right_min) = match op {
                    '^' => (5, 3),
                    '-' | '/' => (own, own + 1),
                    _ => (own, own),
                };
                let left = Grouped(left, left_min);
                let right = Grouped(right, right_min);
                match op {
                    '+' | '-' => write!(f, "{left} {op} {right}"),
                    _ => write!(f, "{left}{op}{right}"),
                }
            }
            Expr::Unary(op, operand) => write!(f, "{op}{}", Grouped(operand, 3)),
            Expr::Call(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

/// Parenthesizes `expr` when it binds looser than `min_precedence`.
struct Grouped<'a>(&'a Expr, u8);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.precedence() < self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Compiles an AST (`Expr`) into `Bytecode`.
pub fn compile(expr: &Expr) -> Bytecode {
    let mut ops = Vec::new();
    compile_recursive(expr, &mut ops);
    Bytecode { ops }
}

fn compile_recursive(expr: &Expr, ops: &mut Vec<OpCode>) {
    match expr {
        Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
        Expr::Time => ops.push(OpCode::LoadTime),
        Expr::Binary(left, op, right) => {
            compile_recursive(left, ops);
            compile_recursive(right, ops);
            ops.push(match op {
                '+' => OpCode::Add,
                '-' => OpCode::Sub,
                '*' => OpCode::Mul,
                '/' => OpCode::Div,
                _ => OpCode::Pow,
            });
        }
        Expr::Unary(_, operand) => {
            compile_recursive(operand, ops);
            ops.push(OpCode::Neg);
        }
        Expr::Call(func, arg) => {
            compile_recursive(arg, ops);
            ops.push(match func {
                Function::Sin => OpCode::Sin,
                Function::Cos => OpCode::Cos,
                Function::Exp => OpCode::Exp,
            });
        }
    }
}

// --- Tokenizer and recursive-descent parser ---

/// Parses a string expression in `t` into an AST.
pub fn parse(input: &str) -> ResponseResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ResponseError::ForcingSyntax("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    if let Some(token) = parser.peek() {
        return Err(ResponseError::ForcingSyntax(format!(
            "unexpected trailing token {token:?}"
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> ResponseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str.parse().map_err(|_| {
                ResponseError::ForcingSyntax(format!("malformed number `{num_str}`"))
            })?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => {
                    return Err(ResponseError::ForcingSyntax(format!(
                        "unexpected character `{c}`"
                    )))
                }
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> ResponseResult<Expr> {
        let mut left = self.parse_product()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_product()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> ResponseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Unary minus binds looser than `^`, so `-t^2` is `-(t^2)`.
    fn parse_unary(&mut self) -> ResponseResult<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary('-', Box::new(expr)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ResponseResult<Expr> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ResponseResult<Expr> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    let func = Function::from_name(&name).ok_or_else(|| {
                        ResponseError::ForcingSyntax(format!("unknown function `{name}`"))
                    })?;
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_closing()?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else if name == "t" {
                    Ok(Expr::Time)
                } else {
                    Err(ResponseError::ForcingSyntax(format!(
                        "unknown identifier `{name}`, only `t` is allowed"
                    )))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_closing()?;
                Ok(expr)
            }
            Some(token) => Err(ResponseError::ForcingSyntax(format!(
                "unexpected token {token:?}"
            ))),
            None => Err(ResponseError::ForcingSyntax(
                "unexpected end of expression".to_string(),
            )),
        }
    }

    fn expect_closing(&mut self) -> ResponseResult<()> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ResponseError::ForcingSyntax("expected ')'".to_string())),
        }
    }
}
