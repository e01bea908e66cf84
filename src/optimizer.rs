// Constant folding and dead-code elimination, run to a fixed point: each
// pass rewrites the tree immutably (produces a new `Program`) and the
// driver re-runs until a pass makes no change or `max_passes` is reached.

use std::time::Duration;

use crate::ast::{count_nodes, BinOp, Expression, ExpressionKind, Literal, Program, Statement, StatementKind, UnOp};

#[derive(Debug, Clone, Default)]
pub struct OptimizationMetrics {
    pub original_count: usize,
    pub optimized_count: usize,
    pub reduction_percent: f64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationResult {
    pub optimized_tree: Program,
    pub pass_count: usize,
    pub optimizations_applied: Vec<String>,
    pub metrics: OptimizationMetrics,
}

pub struct Optimizer {
    pub max_passes: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer { max_passes: 32 }
    }
}

impl Optimizer {
    pub fn new(max_passes: usize) -> Self {
        Optimizer { max_passes }
    }

    /// `elapsed` is always zero: wall-clock timing depends on a
    /// non-deterministic clock source the caller is free to stamp in
    /// instead (see `crate::clock`), so the optimizer itself stays pure.
    pub fn optimize(&self, program: Program) -> OptimizationResult {
        let original_count = count_nodes(&program);
        let mut tree = program;
        let mut pass_count = 0;
        let mut applied = Vec::new();

        loop {
            if pass_count >= self.max_passes {
                break;
            }
            let before = count_nodes(&tree);
            tree = fold_program(tree);
            let (next, dce_changed) = eliminate_dead_code(tree);
            tree = next;
            pass_count += 1;
            let after = count_nodes(&tree);
            if after != before {
                applied.push(format!("pass {}: {} -> {} nodes", pass_count, before, after));
            }
            if after == before && !dce_changed {
                break;
            }
        }

        let optimized_count = count_nodes(&tree);
        let reduction_percent = if original_count == 0 {
            0.0
        } else {
            100.0 * (original_count as f64 - optimized_count as f64) / original_count as f64
        };

        OptimizationResult {
            optimized_tree: tree,
            pass_count,
            optimizations_applied: applied,
            metrics: OptimizationMetrics {
                original_count,
                optimized_count,
                reduction_percent,
                elapsed: Duration::ZERO,
            },
        }
    }
}

fn fold_program(program: Program) -> Program {
    Program { body: program.body.into_iter().map(fold_statement).collect() }
}

fn fold_statement(stmt: Statement) -> Statement {
    let location = stmt.location;
    let kind = match stmt.kind {
        StatementKind::Block(body) => StatementKind::Block(body.into_iter().map(fold_statement).collect()),
        StatementKind::VariableDeclaration { name, initializer } => {
            StatementKind::VariableDeclaration { name, initializer: initializer.map(|e| Box::new(fold_expr(*e))) }
        }
        StatementKind::Expression(expr) => StatementKind::Expression(Box::new(fold_expr(*expr))),
        StatementKind::If { condition, consequent, alternate } => StatementKind::If {
            condition: Box::new(fold_expr(*condition)),
            consequent: Box::new(fold_statement(*consequent)),
            alternate: alternate.map(|s| Box::new(fold_statement(*s))),
        },
        StatementKind::While { condition, body } => {
            StatementKind::While { condition: Box::new(fold_expr(*condition)), body: Box::new(fold_statement(*body)) }
        }
        StatementKind::Return(argument) => StatementKind::Return(argument.map(|e| Box::new(fold_expr(*e)))),
        StatementKind::FunctionDeclaration { name, parameters, body } => {
            StatementKind::FunctionDeclaration { name, parameters, body: body.into_iter().map(fold_statement).collect() }
        }
    };
    Statement { kind, location }
}

/// Post-order constant fold: children first, then try to collapse this
/// node if both operands turned out to be literals.
fn fold_expr(expr: Expression) -> Expression {
    let location = expr.location;
    match expr.kind {
        ExpressionKind::Binary { left, op, right } => {
            let left = fold_expr(*left);
            let right = fold_expr(*right);
            if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                if let Some(folded) = fold_binary(op, l, r) {
                    return Expression::new(ExpressionKind::Literal(folded), location);
                }
            }
            Expression::new(ExpressionKind::Binary { left: Box::new(left), op, right: Box::new(right) }, location)
        }
        ExpressionKind::Unary { op, operand } => {
            let operand = fold_expr(*operand);
            if let Some(lit) = operand.as_literal() {
                if let Some(folded) = fold_unary(op, lit) {
                    return Expression::new(ExpressionKind::Literal(folded), location);
                }
            }
            Expression::new(ExpressionKind::Unary { op, operand: Box::new(operand) }, location)
        }
        ExpressionKind::Assignment { target, right } => {
            Expression::new(ExpressionKind::Assignment { target, right: Box::new(fold_expr(*right)) }, location)
        }
        ExpressionKind::Call { callee, arguments } => {
            Expression::new(ExpressionKind::Call { callee, arguments: arguments.into_iter().map(fold_expr).collect() }, location)
        }
        // Identifiers and literals are never folded further.
        kind @ (ExpressionKind::Literal(_) | ExpressionKind::Identifier(_)) => Expression::new(kind, location),
    }
}

fn fold_binary(op: BinOp, left: &Literal, right: &Literal) -> Option<Literal> {
    use Literal::*;
    match (op, left, right) {
        (BinOp::Add, Number(a), Number(b)) => Some(Number(a + b)),
        (BinOp::Sub, Number(a), Number(b)) => Some(Number(a - b)),
        (BinOp::Mul, Number(a), Number(b)) => Some(Number(a * b)),
        (BinOp::Div, Number(a), Number(b)) => {
            if *b == 0.0 {
                None
            } else {
                Some(Number(a / b))
            }
        }
        (BinOp::Mod, Number(a), Number(b)) => {
            if *b == 0.0 {
                None
            } else {
                Some(Number(a % b))
            }
        }
        // String concatenation: `+` with at least one string operand.
        (BinOp::Add, String(_), _) | (BinOp::Add, _, String(_)) => Some(String(format!("{}{}", display(left), display(right)))),

        (BinOp::Eq, _, _) => Some(Boolean(literal_eq(left, right))),
        (BinOp::NotEq, _, _) => Some(Boolean(!literal_eq(left, right))),
        (BinOp::Lt, Number(a), Number(b)) => Some(Boolean(a < b)),
        (BinOp::Gt, Number(a), Number(b)) => Some(Boolean(a > b)),
        (BinOp::Le, Number(a), Number(b)) => Some(Boolean(a <= b)),
        (BinOp::Ge, Number(a), Number(b)) => Some(Boolean(a >= b)),
        (BinOp::And, Boolean(a), Boolean(b)) => Some(Boolean(*a && *b)),
        (BinOp::Or, Boolean(a), Boolean(b)) => Some(Boolean(*a || *b)),
        _ => None,
    }
}

fn fold_unary(op: UnOp, operand: &Literal) -> Option<Literal> {
    use Literal::*;
    match (op, operand) {
        (UnOp::Neg, Number(n)) => Some(Number(-n)),
        (UnOp::Pos, Number(n)) => Some(Number(*n)),
        (UnOp::Not, Boolean(b)) => Some(Boolean(!b)),
        (UnOp::Typeof, Number(_)) => Some(String("number".to_string())),
        (UnOp::Typeof, String(_)) => Some(String("string".to_string())),
        (UnOp::Typeof, Boolean(_)) => Some(String("boolean".to_string())),
        _ => None,
    }
}

fn literal_eq(a: &Literal, b: &Literal) -> bool {
    use Literal::*;
    match (a, b) {
        (Number(a), Number(b)) => a == b,
        (String(a), String(b)) => a == b,
        (Boolean(a), Boolean(b)) => a == b,
        _ => false,
    }
}

fn display(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => crate::value::format_number(*n),
        Literal::String(s) => s.clone(),
        Literal::Boolean(b) => b.to_string(),
    }
}

/// Returns the rewritten program and whether anything actually changed,
/// so the fixed-point driver can detect convergence even when the node
/// count happens to stay the same (e.g. an `if` collapsing to a
/// same-sized branch).
fn eliminate_dead_code(program: Program) -> (Program, bool) {
    let mut changed = false;
    let body = eliminate_in_list(program.body, &mut changed);
    (Program { body }, changed)
}

fn eliminate_in_list(statements: Vec<Statement>, changed: &mut bool) -> Vec<Statement> {
    let mut result = Vec::new();
    for stmt in statements {
        let stmt = eliminate_in_statement(stmt, changed);
        let was_return = matches!(stmt.kind, StatementKind::Return(_));
        result.push(stmt);
        if was_return {
            break;
        }
    }
    result
}

fn eliminate_in_statement(stmt: Statement, changed: &mut bool) -> Statement {
    let location = stmt.location;
    let kind = match stmt.kind {
        StatementKind::Block(body) => {
            let before = body.len();
            let body = eliminate_in_list(body, changed);
            if body.len() != before {
                *changed = true;
            }
            StatementKind::Block(body)
        }
        StatementKind::If { condition, consequent, alternate } => {
            if let Some(Literal::Boolean(cond_value)) = condition.as_literal() {
                *changed = true;
                let selected = if *cond_value { Some(*consequent) } else { alternate.map(|s| *s) };
                return match selected {
                    Some(selected) => eliminate_in_statement(selected, changed),
                    // Non-selected branch absent: replace with an empty block (preserved, not an error).
                    None => Statement::new(StatementKind::Block(Vec::new()), location),
                };
            }
            StatementKind::If {
                condition,
                consequent: Box::new(eliminate_in_statement(*consequent, changed)),
                alternate: alternate.map(|s| Box::new(eliminate_in_statement(*s, changed))),
            }
        }
        StatementKind::While { condition, body } => {
            StatementKind::While { condition, body: Box::new(eliminate_in_statement(*body, changed)) }
        }
        StatementKind::FunctionDeclaration { name, parameters, body } => {
            let before = body.len();
            let body = eliminate_in_list(body, changed);
            if body.len() != before {
                *changed = true;
            }
            StatementKind::FunctionDeclaration { name, parameters, body }
        }
        other => other,
    };
    Statement { kind, location }
}
