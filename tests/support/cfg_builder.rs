#![allow(dead_code)]

//! Small DSL for building typed CFGs in tests.
//!
//! Every statement and terminator gets its own source row, in the order they
//! are added, starting at row 2 (row 1 is the signature). Within a row,
//! targets and then expression nodes get consecutive columns in preorder, so
//! assertions only ever need the row returned by the builder.

use itxn_check::Checker;
use itxn_check::classify::ResourceKind;
use itxn_check::diagnostics::Span;
use itxn_check::fields::TxnField;
use itxn_check::ir::{
    BasicBlock, BlockId, Expr, ExprKind, Param, Program, Routine, Stmt, Target, Terminator,
};
use itxn_check::report::{ProgramReport, RoutineReport};

pub fn params() -> Expr {
    Expr::create_params(Span::default())
}

pub fn copy(name: &str) -> Expr {
    Expr::copy_params(var(name), Span::default())
}

pub fn var(name: &str) -> Expr {
    Expr::var(name, Span::default())
}

pub fn lit(value: &str) -> Expr {
    Expr::literal(value, Span::default())
}

pub fn submit(params: Vec<Expr>) -> Expr {
    Expr::submit(params, Span::default())
}

/// `name.field[0]`
pub fn read(name: &str, field: TxnField) -> Expr {
    Expr::field_read(var(name), field, Some(lit("0")), Span::default())
}

/// `base.field[0]` for an arbitrary base expression.
pub fn read_of(base: Expr, field: TxnField) -> Expr {
    Expr::field_read(base, field, Some(lit("0")), Span::default())
}

pub fn call(target: &str, args: Vec<Expr>) -> Expr {
    Expr::call(target, args, Span::default())
}

pub fn walrus(name: &str, value: Expr) -> Expr {
    Expr::assign_expr(Target::new(name, Span::default()), value, Span::default())
}

pub fn tuple(items: Vec<Expr>) -> Expr {
    Expr::tuple(items, Span::default())
}

pub fn tuple_item(base: Expr, index: usize) -> Expr {
    Expr::new(
        ExprKind::TupleItem {
            base: Box::new(base),
            index,
        },
        Span::default(),
    )
}

/// `log(value)`: an intrinsic that consumes a value and cannot submit.
pub fn log(value: Expr) -> Expr {
    Expr::intrinsic("log", vec![value], Span::default())
}

pub struct RoutineBuilder {
    name: String,
    params: Vec<Param>,
    returns: ResourceKind,
    blocks: Vec<(Vec<Stmt>, Option<Terminator>)>,
    next_row: usize,
}

impl RoutineBuilder {
    /// A routine with a single, empty entry block.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            returns: ResourceKind::Plain,
            blocks: vec![(Vec::new(), None)],
            next_row: 2,
        }
    }

    pub fn param(mut self, name: &str, kind: ResourceKind) -> Self {
        let column = self.params.len() + 2;
        self.params.push(Param {
            name: name.to_string(),
            kind,
            span: Span::on_row(1, column, 1),
        });
        self
    }

    pub fn returns(mut self, kind: ResourceKind) -> Self {
        self.returns = kind;
        self
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn block(&mut self) -> BlockId {
        self.blocks.push((Vec::new(), None));
        BlockId(self.blocks.len() - 1)
    }

    fn row(&mut self) -> usize {
        let row = self.next_row;
        self.next_row += 1;
        row
    }

    /// `targets = value`; returns the statement's row.
    pub fn assign(&mut self, block: BlockId, targets: &[&str], mut value: Expr) -> usize {
        let row = self.row();
        let mut col = 1;
        let targets = targets
            .iter()
            .map(|name| {
                let target = Target::new(*name, Span::on_row(row, col, 1));
                col += 1;
                target
            })
            .collect();
        stamp(&mut value, row, &mut col);
        self.blocks[block.index()]
            .0
            .push(Stmt::assign(targets, value, Span::on_row(row, 1, col)));
        row
    }

    /// Expression statement; returns its row.
    pub fn eval(&mut self, block: BlockId, mut expr: Expr) -> usize {
        let row = self.row();
        let mut col = 1;
        stamp(&mut expr, row, &mut col);
        self.blocks[block.index()]
            .0
            .push(Stmt::expr(expr, Span::on_row(row, 1, col)));
        row
    }

    pub fn goto(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].1 = Some(Terminator::Goto { target: to });
    }

    pub fn branch(&mut self, from: BlockId, then_block: BlockId, else_block: BlockId) -> usize {
        let row = self.row();
        let mut cond = lit("cond");
        stamp(&mut cond, row, &mut 1);
        self.blocks[from.index()].1 = Some(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
        row
    }

    pub fn ret(&mut self, block: BlockId, value: Option<Expr>) -> usize {
        let row = self.row();
        let value = value.map(|mut v| {
            stamp(&mut v, row, &mut 2);
            v
        });
        self.blocks[block.index()].1 = Some(Terminator::Return {
            value,
            span: Span::on_row(row, 1, 1),
        });
        row
    }

    /// Blocks without a terminator return nothing.
    pub fn build(self) -> Routine {
        let end_row = self.next_row;
        Routine {
            name: self.name,
            span: Span::on_row(1, 1, 1),
            params: self.params,
            returns: self.returns,
            returns_span: None,
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, (stmts, terminator))| BasicBlock {
                    id: BlockId(idx),
                    stmts,
                    terminator: terminator.unwrap_or(Terminator::Return {
                        value: None,
                        span: Span::on_row(end_row, 1, 1),
                    }),
                })
                .collect(),
        }
    }
}

fn stamp(expr: &mut Expr, row: usize, col: &mut usize) {
    expr.span = Span::on_row(row, *col, 1);
    *col += 1;
    match &mut expr.kind {
        ExprKind::Literal { .. } | ExprKind::Var { .. } => {}
        ExprKind::CreateParams { fields, .. } => {
            for init in fields {
                stamp(&mut init.value, row, col);
            }
        }
        ExprKind::CopyParams { params } => stamp(params, row, col),
        ExprKind::SetParams { params, fields } => {
            stamp(params, row, col);
            for init in fields {
                stamp(&mut init.value, row, col);
            }
        }
        ExprKind::Submit { params } => {
            for p in params {
                stamp(p, row, col);
            }
        }
        ExprKind::FieldRead { base, index, .. } => {
            stamp(base, row, col);
            if let Some(index) = index {
                stamp(index, row, col);
            }
        }
        ExprKind::Call { args, .. } | ExprKind::Intrinsic { args, .. } => {
            for arg in args {
                stamp(arg, row, col);
            }
        }
        ExprKind::AssignExpr { target, value } => {
            target.span = Span::on_row(row, *col, 1);
            *col += 1;
            stamp(value, row, col);
        }
        ExprKind::Tuple { items } => {
            for item in items {
                stamp(item, row, col);
            }
        }
        ExprKind::TupleItem { base, .. } => stamp(base, row, col),
    }
}

pub fn program(routines: Vec<Routine>) -> Program {
    Program {
        file: Some("contract.json".to_string()),
        routines,
        may_submit: None,
    }
}

pub fn check(routines: Vec<Routine>) -> ProgramReport {
    Checker::default()
        .check_program(&program(routines))
        .expect("well-formed program")
}

pub fn check_one(routine: Routine) -> RoutineReport {
    check(vec![routine]).routines.remove(0)
}

pub fn codes(report: &RoutineReport) -> Vec<&'static str> {
    report.diagnostics.iter().map(|d| d.code()).collect()
}
