//! Tree-walking evaluator.
//!
//! Statements and expressions are dispatched by two `match`es over the AST.
//! Variable occurrences resolved by the static pass are read through
//! `Environment::get_at`/`assign_at` with the recorded depth; everything
//! else goes to the globals by name.
//!
//! `return` and `break` are modelled as a `Signal` carried in the `Err`
//! channel of evaluation: `Signal::Return` is caught by the function-call
//! frame, `Signal::Break` by the nearest `while`.  Real runtime errors ride
//! the same channel as `Signal::Error` and propagate to the driver.  The
//! resolver's static rules guarantee neither control signal can escape the
//! outermost statement.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::parser::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};

/// Non-local control flow riding the `Err` channel during evaluation.
pub(crate) enum Signal {
    Error(LoxError),
    Return(Value),
    Break,
}

impl From<LoxError> for Signal {
    fn from(e: LoxError) -> Self {
        Signal::Error(e)
    }
}

impl From<io::Error> for Signal {
    fn from(e: io::Error) -> Self {
        Signal::Error(LoxError::Io(e))
    }
}

impl Signal {
    fn into_error(self) -> LoxError {
        match self {
            Signal::Error(e) => e,

            // The resolver rejects `return` outside functions and the parser
            // rejects `break` outside loops, so an escape to the outermost
            // statement is an interpreter bug.
            Signal::Return(_) => LoxError::runtime(0, "Internal error: stray 'return'."),

            Signal::Break => LoxError::runtime(0, "Internal error: stray 'break'."),
        }
    }
}

type Exec<T> = std::result::Result<T, Signal>;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Side-table filled by the resolver: node id → number of environment
    /// frames between the use and the frame defining the name.
    locals: HashMap<usize, usize>,
    output: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// An interpreter whose `print` output goes to the given sink.  Tests
    /// pass an `Rc<RefCell<Vec<u8>>>` and read it back.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );

        info!("Interpreter initialised; globals carry 'clock'");

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a resolved local: the occurrence `id` reaches its definition
    /// `depth` frames up.  Called by the resolver; absent ids are globals.
    pub fn note_local(&mut self, id: usize, depth: usize) {
        debug!("note_local: node {} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// The recorded side-table (node id → depth).
    pub fn locals(&self) -> &HashMap<usize, usize> {
        &self.locals
    }

    /// Run a resolved program.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt).map_err(Signal::into_error)?;
        }

        Ok(())
    }

    /// Evaluate a single expression to a value (REPL echo path).
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value> {
        self.evaluate(expr).map_err(Signal::into_error)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Exec<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                let mut out = self.output.borrow_mut();

                writeln!(&mut *out, "{}", value)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, Rc::new(RefCell::new(env)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body) {
                        Ok(()) => {}

                        Err(Signal::Break) => break,

                        Err(signal) => return Err(signal),
                    }
                }

                Ok(())
            }

            Stmt::Break => Err(Signal::Break),

            Stmt::Function(declaration) => {
                let function = LoxFunction {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,

                    None => Value::Nil,
                };

                Err(Signal::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` inside `environment`, restoring the previous frame
    /// on every exit path (normal, error, or control signal).
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Exec<()> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Exec<()> {
        // 1. The superclass expression must name a class value.
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let line = match expr {
                    Expr::Variable { name, .. } => name.line,

                    _ => name.line,
                };

                match self.evaluate(expr)? {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(LoxError::runtime(line, "Superclass must be a class.").into());
                    }
                }
            }

            None => None,
        };

        // 2. Define the name first so methods can refer to the class.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // 3. Methods close over a frame that binds `super` when inheriting.
        let method_env: Rc<RefCell<Environment>> = match &superclass_value {
            Some(superclass) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));

                env.define("super", Value::Class(Rc::clone(superclass)));

                Rc::new(RefCell::new(env))
            }

            None => Rc::clone(&self.environment),
        };

        // 4. Build the method map.
        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for declaration in methods {
            let is_initializer = declaration.name.lexeme == "init";

            let function = LoxFunction {
                declaration: Rc::clone(declaration),
                closure: Rc::clone(&method_env),
                is_initializer,
            };

            method_map.insert(declaration.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
        };

        debug!("Declared class {}", class.name);

        // 5. Populate the earlier nil binding with the finished class.
        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal(literal) => Ok(evaluate_literal(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => Ok(self.lookup_variable(name, *id)?),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone(), name.line)?
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee_value, args, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),

                _ => Err(LoxError::runtime(name.line, "Only instances have properties.").into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.borrow_mut().set(name, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields.").into()),
            },

            Expr::This { id, keyword } => Ok(self.lookup_variable(keyword, *id)?),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Exec<Value> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Exec<Value> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                // Mixed string/number concatenates via number stringification
                // (trailing `.0` trimmed by the `Value` formatter).
                (Value::String(a), Value::Number(b)) => {
                    Ok(Value::String(format!("{}{}", a, Value::Number(b))))
                }

                (Value::Number(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", Value::Number(a), b)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings or one number & one string.",
                )
                .into()),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(LoxError::runtime(operator.line, "Operands must not be zero.").into())
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.").into()),
        }
    }

    /// `and`/`or` yield an operand, not a boolean, and skip the right side
    /// when the left decides.
    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Exec<Value> {
        let left_value = self.evaluate(left)?;

        match operator.token_type {
            TokenType::OR => {
                if is_truthy(&left_value) {
                    Ok(left_value)
                } else {
                    self.evaluate(right)
                }
            }

            TokenType::AND => {
                if !is_truthy(&left_value) {
                    Ok(left_value)
                } else {
                    self.evaluate(right)
                }
            }

            _ => Err(LoxError::runtime(operator.line, "Invalid logical operator.").into()),
        }
    }

    fn evaluate_super(&mut self, id: usize, keyword: &Token, method: &Token) -> Exec<Value> {
        let distance = match self.locals.get(&id) {
            Some(&distance) => distance,

            None => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Can't use 'super' outside of a class.",
                )
                .into());
            }
        };

        let superclass =
            Environment::get_at(&self.environment, distance, "super", keyword.line)?;

        // `this` lives in the bound-method frame, one link below `super`.
        let object = Environment::get_at(&self.environment, distance - 1, "this", keyword.line)?;

        match (superclass, object) {
            (Value::Class(superclass), Value::Instance(instance)) => {
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(&instance)))),

                    None => Err(LoxError::runtime(
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )
                    .into()),
                }
            }

            _ => Err(LoxError::runtime(keyword.line, "Invalid 'super' binding.").into()),
        }
    }

    fn lookup_variable(&self, name: &Token, id: usize) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, &name.lexeme, name.line)
            }

            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Exec<Value> {
        match callee {
            Value::NativeFunction { arity, func, .. } => {
                check_arity(arity, args.len(), paren)?;

                func(&args).map_err(|msg| LoxError::runtime(paren.line, msg).into())
            }

            Value::Function(function) => {
                check_arity(function.arity(), args.len(), paren)?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                check_arity(class.arity(), args.len(), paren)?;

                let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&class))));

                if let Some(init) = class.find_method("init") {
                    self.call_function(&init.bind(&instance), args)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => {
                Err(LoxError::runtime(paren.line, "Can only call functions and classes.").into())
            }
        }
    }

    /// Invoke a user function: fresh frame over the closure, parameters
    /// bound to arguments, body executed with `Return` caught here.  An
    /// initializer always yields its `this`, even on a bare `return;`.
    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Exec<Value> {
        let mut env = Environment::with_enclosing(Rc::clone(&function.closure));

        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(env)));

        let line = function.declaration.name.line;

        match result {
            Ok(()) => {
                if function.is_initializer {
                    Ok(Environment::get_at(&function.closure, 0, "this", line)?)
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Signal::Return(value)) => {
                if function.is_initializer {
                    Ok(Environment::get_at(&function.closure, 0, "this", line)?)
                } else {
                    Ok(value)
                }
            }

            Err(signal) => Err(signal),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_literal(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),

        LiteralValue::Str(s) => Value::String(s.clone()),

        LiteralValue::True => Value::Bool(true),

        LiteralValue::False => Value::Bool(false),

        LiteralValue::Nil => Value::Nil,
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Exec<()> {
    if expected != got {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments but got {}.", expected, got),
        )
        .into());
    }

    Ok(())
}

/// `nil` and `false` are falsey; everything else (including 0 and "") is
/// truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
