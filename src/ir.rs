//! Typed control-flow graph consumed by the checker.
//!
//! The front end lowers each subroutine into basic blocks of statements with
//! resolved call targets and source spans, then serializes it as JSON. Only the
//! expression forms that matter to inner transaction ownership are modelled
//! explicitly; everything else arrives as an `intrinsic` with its operands.

use crate::classify::ResourceKind;
use crate::diagnostics::Span;
use crate::fields::TxnField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A compilation unit: every routine of one contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub file: Option<String>,
    pub routines: Vec<Routine>,
    /// Precomputed may-submit summary. When absent it is derived from the
    /// call graph of `routines`.
    #[serde(default)]
    pub may_submit: Option<BTreeMap<String, bool>>,
}

impl Program {
    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    pub span: Span,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub returns: ResourceKind,
    #[serde(default)]
    pub returns_span: Option<Span>,
    /// `blocks[0]` is the entry block; block ids equal their index.
    pub blocks: Vec<BasicBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub kind: ResourceKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Terminator {
    Goto {
        target: BlockId,
    },
    Branch {
        cond: Expr,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
        span: Span,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto { target } => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => {
                if then_block == else_block {
                    vec![*then_block]
                } else {
                    vec![*then_block, *else_block]
                }
            }
            Terminator::Return { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub span: Span,
    #[serde(flatten)]
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmtKind {
    /// `a = value`, or `a, b = value` when more than one target is given.
    Assign { targets: Vec<Target>, value: Expr },
    /// An expression evaluated for its effects.
    Expr { expr: Expr },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    #[serde(flatten)]
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub field: TxnField,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprKind {
    Literal {
        value: String,
    },
    Var {
        name: String,
    },
    /// Construction of an inner transaction parameter object.
    CreateParams {
        #[serde(default)]
        type_name: Option<String>,
        #[serde(default)]
        fields: Vec<FieldInit>,
    },
    /// The explicit, side-effecting copy of a parameter object.
    CopyParams {
        params: Box<Expr>,
    },
    /// In-place update of a parameter object's fields.
    SetParams {
        params: Box<Expr>,
        #[serde(default)]
        fields: Vec<FieldInit>,
    },
    /// Submission of one parameter object, or of several as a group.
    Submit {
        params: Vec<Expr>,
    },
    FieldRead {
        base: Box<Expr>,
        field: TxnField,
        #[serde(default)]
        index: Option<Box<Expr>>,
    },
    /// Call of a user subroutine or external routine.
    Call {
        target: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Any operation that cannot submit: arithmetic, comparisons, opcodes.
    Intrinsic {
        op: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Inline assign-and-use, e.g. `(x := value)`.
    AssignExpr {
        target: Target,
        value: Box<Expr>,
    },
    Tuple {
        items: Vec<Expr>,
    },
    TupleItem {
        base: Box<Expr>,
        index: usize,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { span, kind }
    }

    pub fn literal(value: impl Into<String>, span: Span) -> Self {
        Self::new(
            ExprKind::Literal {
                value: value.into(),
            },
            span,
        )
    }

    pub fn var(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Var { name: name.into() }, span)
    }

    pub fn create_params(span: Span) -> Self {
        Self::new(
            ExprKind::CreateParams {
                type_name: None,
                fields: Vec::new(),
            },
            span,
        )
    }

    pub fn copy_params(params: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::CopyParams {
                params: Box::new(params),
            },
            span,
        )
    }

    pub fn submit(params: Vec<Expr>, span: Span) -> Self {
        Self::new(ExprKind::Submit { params }, span)
    }

    pub fn field_read(base: Expr, field: TxnField, index: Option<Expr>, span: Span) -> Self {
        Self::new(
            ExprKind::FieldRead {
                base: Box::new(base),
                field,
                index: index.map(Box::new),
            },
            span,
        )
    }

    pub fn call(target: impl Into<String>, args: Vec<Expr>, span: Span) -> Self {
        Self::new(
            ExprKind::Call {
                target: target.into(),
                args,
            },
            span,
        )
    }

    pub fn intrinsic(op: impl Into<String>, args: Vec<Expr>, span: Span) -> Self {
        Self::new(
            ExprKind::Intrinsic {
                op: op.into(),
                args,
            },
            span,
        )
    }

    pub fn assign_expr(target: Target, value: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::AssignExpr {
                target,
                value: Box::new(value),
            },
            span,
        )
    }

    pub fn tuple(items: Vec<Expr>, span: Span) -> Self {
        Self::new(ExprKind::Tuple { items }, span)
    }

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal { .. } | ExprKind::Var { .. } => Vec::new(),
            ExprKind::CreateParams { fields, .. } => fields.iter().map(|f| &f.value).collect(),
            ExprKind::CopyParams { params } => vec![params.as_ref()],
            ExprKind::SetParams { params, fields } => std::iter::once(params.as_ref())
                .chain(fields.iter().map(|f| &f.value))
                .collect(),
            ExprKind::Submit { params } => params.iter().collect(),
            ExprKind::FieldRead { base, index, .. } => std::iter::once(base.as_ref())
                .chain(index.as_deref())
                .collect(),
            ExprKind::Call { args, .. } | ExprKind::Intrinsic { args, .. } => {
                args.iter().collect()
            }
            ExprKind::AssignExpr { value, .. } => vec![value.as_ref()],
            ExprKind::Tuple { items } => items.iter().collect(),
            ExprKind::TupleItem { base, .. } => vec![base.as_ref()],
        }
    }
}

impl Stmt {
    pub fn assign(targets: Vec<Target>, value: Expr, span: Span) -> Self {
        Self {
            span,
            kind: StmtKind::Assign { targets, value },
        }
    }

    pub fn expr(expr: Expr, span: Span) -> Self {
        Self {
            span,
            kind: StmtKind::Expr { expr },
        }
    }

    /// Top-level expression of the statement.
    pub fn value(&self) -> &Expr {
        match &self.kind {
            StmtKind::Assign { value, .. } => value,
            StmtKind::Expr { expr } => expr,
        }
    }
}

impl Target {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}
