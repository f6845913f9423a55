//! Abstract Syntax Tree node types
//!
//! The statement tree is produced by an external parser and handed over
//! either as Rust values or as JSON (every node is tagged with `"t"`). The
//! constructor helpers at the bottom of this file build span-less nodes for
//! hosts that assemble steps in code.

use serde::{Deserialize, Serialize};

use super::values::Value;

/// Source location span for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

/* ===================== Step ===================== */

/// A complete DATA step: `DATA <outputs>; <input binding>; <body> RUN;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStep {
    pub outputs: Vec<OutputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputBinding>,
    pub body: Vec<Stmt>,
}

/// A dataset named on the DATA statement, with its dataset options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
    /// (old name, new name) pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rename: Vec<(String, String)>,
}

/// An input dataset reference with its dataset options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rename: Vec<(String, String)>,
    /// `IN=` flag variable: 1 when this dataset contributed to the current row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_var: Option<String>,
}

/// One BY variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByKey {
    pub name: String,
    #[serde(default)]
    pub descending: bool,
}

/// How input rows are bound to the PDV
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum InputBinding {
    /// `SET a b;` concatenates; with BY it interleaves sorted inputs
    Set {
        datasets: Vec<InputSpec>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        by: Vec<ByKey>,
        /// `END=` flag variable
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<String>,
    },
    /// `MERGE a b; BY k;` match-merges; without BY it merges one-to-one
    Merge {
        datasets: Vec<InputSpec>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        by: Vec<ByKey>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<String>,
    },
}

impl InputBinding {
    pub fn datasets(&self) -> &[InputSpec] {
        match self {
            InputBinding::Set { datasets, .. } | InputBinding::Merge { datasets, .. } => datasets,
        }
    }

    pub fn by(&self) -> &[ByKey] {
        match self {
            InputBinding::Set { by, .. } | InputBinding::Merge { by, .. } => by,
        }
    }

    pub fn end(&self) -> Option<&str> {
        match self {
            InputBinding::Set { end, .. } | InputBinding::Merge { end, .. } => end.as_deref(),
        }
    }
}

/* ===================== Statements ===================== */

/// Assignment target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Target {
    Var {
        name: String,
    },
    Element {
        array: String,
        indices: Vec<Expr>,
    },
}

/// Iterative DO loop forms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum DoKind {
    /// `DO var = start TO end [BY step] [WHILE(..) | UNTIL(..)];`
    Counted {
        var: String,
        start: Expr,
        end: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        while_test: Option<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until_test: Option<Expr>,
    },
    /// `DO var = v1, v2, ...;`
    List { var: String, values: Vec<Expr> },
    /// `DO WHILE(test);` tested before each pass
    While { test: Expr },
    /// `DO UNTIL(test);` tested after each pass
    Until { test: Expr },
}

/// Array dimension bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ArrayBound {
    /// `{lower:upper}`; `{n}` is `{1:n}`
    Range { lower: i64, upper: i64 },
    /// `{*}`: extent taken from the member count
    Star,
}

impl ArrayBound {
    pub fn extent(n: i64) -> Self {
        ArrayBound::Range { lower: 1, upper: n }
    }
}

/// `RETAIN name [initial];`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetainItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
}

/// `LENGTH name [$] n;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthItem {
    pub name: String,
    #[serde(default)]
    pub char_type: bool,
    pub length: usize,
}

/// One item of a PUT statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum PutItem {
    /// Quoted text written as is
    Text { text: String },
    /// `name=` written as `name=value`
    Named { name: String },
    /// A bare expression
    Value { expr: Expr },
}

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Assign {
        target: Target,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Sum statement `var + expr;`
    Sum {
        var: String,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    If {
        test: Expr,
        then_s: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_s: Option<Vec<Stmt>>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Subsetting IF: `IF test;`
    SubsetIf {
        test: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Plain `DO; ... END;` group
    Block {
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    DoLoop {
        kind: DoKind,
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Leave {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Continue {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `RETAIN;` with no items retains every variable
    Retain {
        vars: Vec<RetainItem>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Array {
        name: String,
        bounds: Vec<ArrayBound>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        members: Vec<String>,
        #[serde(default)]
        char_type: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<usize>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Length {
        vars: Vec<LengthItem>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Format {
        vars: Vec<String>,
        format: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Informat {
        vars: Vec<String>,
        informat: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Label {
        /// (variable, label) pairs
        labels: Vec<(String, String)>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `OUTPUT [ds ...];` with no names writes to every DATA-statement dataset
    Output {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        datasets: Vec<String>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Drop {
        vars: Vec<String>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Keep {
        vars: Vec<String>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Delete {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Return {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Stop {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Put {
        items: Vec<PutItem>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign { span, .. }
            | Stmt::Sum { span, .. }
            | Stmt::If { span, .. }
            | Stmt::SubsetIf { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::DoLoop { span, .. }
            | Stmt::Leave { span }
            | Stmt::Continue { span }
            | Stmt::Retain { span, .. }
            | Stmt::Array { span, .. }
            | Stmt::Length { span, .. }
            | Stmt::Format { span, .. }
            | Stmt::Informat { span, .. }
            | Stmt::Label { span, .. }
            | Stmt::Output { span, .. }
            | Stmt::Drop { span, .. }
            | Stmt::Keep { span, .. }
            | Stmt::Delete { span }
            | Stmt::Return { span }
            | Stmt::Stop { span }
            | Stmt::Put { span, .. } => *span,
        }
    }
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `||`
    Concat,
    /// `><`
    Min,
    /// `<>`
    Max,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Expression AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    LitNum {
        v: f64,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    LitStr {
        v: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// The `.` literal
    LitMissing {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Variable reference, including automatic names such as `_N_` and `FIRST.id`
    Ident {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `array{i, j}`
    Element {
        array: String,
        indices: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `OF array{*}`, only valid as a function argument
    ArrayAll {
        array: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `operand IN (v1, v2, ...)`
    In {
        operand: Box<Expr>,
        list: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::LitNum { span, .. }
            | Expr::LitStr { span, .. }
            | Expr::LitMissing { span }
            | Expr::Ident { span, .. }
            | Expr::Element { span, .. }
            | Expr::ArrayAll { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::In { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }
}

/// Helper function for serde to skip serializing default spans
fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/* ===================== Constructors ===================== */

impl Expr {
    pub fn num(v: f64) -> Self {
        Expr::LitNum {
            v,
            span: Span::default(),
        }
    }

    pub fn str(v: impl Into<String>) -> Self {
        Expr::LitStr {
            v: v.into(),
            span: Span::default(),
        }
    }

    pub fn missing() -> Self {
        Expr::LitMissing {
            span: Span::default(),
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Ident {
            name: name.into(),
            span: Span::default(),
        }
    }

    pub fn elem(array: impl Into<String>, indices: Vec<Expr>) -> Self {
        Expr::Element {
            array: array.into(),
            indices,
            span: Span::default(),
        }
    }

    pub fn all(array: impl Into<String>) -> Self {
        Expr::ArrayAll {
            array: array.into(),
            span: Span::default(),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            span: Span::default(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    pub fn is_in(operand: Expr, list: Vec<Expr>) -> Self {
        Expr::In {
            operand: Box::new(operand),
            list,
            span: Span::default(),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
            span: Span::default(),
        }
    }
}

impl Stmt {
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: Target::Var { name: name.into() },
            value,
            span: Span::default(),
        }
    }

    pub fn assign_elem(array: impl Into<String>, indices: Vec<Expr>, value: Expr) -> Self {
        Stmt::Assign {
            target: Target::Element {
                array: array.into(),
                indices,
            },
            value,
            span: Span::default(),
        }
    }

    pub fn sum(var: impl Into<String>, value: Expr) -> Self {
        Stmt::Sum {
            var: var.into(),
            value,
            span: Span::default(),
        }
    }

    pub fn if_then(test: Expr, then_s: Vec<Stmt>) -> Self {
        Stmt::If {
            test,
            then_s,
            else_s: None,
            span: Span::default(),
        }
    }

    pub fn if_else(test: Expr, then_s: Vec<Stmt>, else_s: Vec<Stmt>) -> Self {
        Stmt::If {
            test,
            then_s,
            else_s: Some(else_s),
            span: Span::default(),
        }
    }

    pub fn subset_if(test: Expr) -> Self {
        Stmt::SubsetIf {
            test,
            span: Span::default(),
        }
    }

    pub fn block(body: Vec<Stmt>) -> Self {
        Stmt::Block {
            body,
            span: Span::default(),
        }
    }

    pub fn do_loop(kind: DoKind, body: Vec<Stmt>) -> Self {
        Stmt::DoLoop {
            kind,
            body,
            span: Span::default(),
        }
    }

    /// `DO var = start TO end [BY step];`
    pub fn do_to(
        var: impl Into<String>,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    ) -> Self {
        Stmt::do_loop(
            DoKind::Counted {
                var: var.into(),
                start,
                end,
                step,
                while_test: None,
                until_test: None,
            },
            body,
        )
    }

    pub fn do_while(test: Expr, body: Vec<Stmt>) -> Self {
        Stmt::do_loop(DoKind::While { test }, body)
    }

    pub fn do_until(test: Expr, body: Vec<Stmt>) -> Self {
        Stmt::do_loop(DoKind::Until { test }, body)
    }

    pub fn leave() -> Self {
        Stmt::Leave {
            span: Span::default(),
        }
    }

    pub fn cont() -> Self {
        Stmt::Continue {
            span: Span::default(),
        }
    }

    pub fn retain(vars: Vec<RetainItem>) -> Self {
        Stmt::Retain {
            vars,
            span: Span::default(),
        }
    }

    /// `RETAIN name initial;`
    pub fn retain_init(name: impl Into<String>, initial: Value) -> Self {
        Stmt::retain(vec![RetainItem {
            name: name.into(),
            initial: Some(initial),
        }])
    }

    /// Numeric `ARRAY name{bounds} members;`
    pub fn array(name: impl Into<String>, bounds: Vec<ArrayBound>, members: Vec<&str>) -> Self {
        Stmt::Array {
            name: name.into(),
            bounds,
            members: members.into_iter().map(String::from).collect(),
            char_type: false,
            length: None,
            span: Span::default(),
        }
    }

    pub fn output() -> Self {
        Stmt::Output {
            datasets: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn output_to(datasets: Vec<&str>) -> Self {
        Stmt::Output {
            datasets: datasets.into_iter().map(String::from).collect(),
            span: Span::default(),
        }
    }

    pub fn keep(vars: Vec<&str>) -> Self {
        Stmt::Keep {
            vars: vars.into_iter().map(String::from).collect(),
            span: Span::default(),
        }
    }

    pub fn drop(vars: Vec<&str>) -> Self {
        Stmt::Drop {
            vars: vars.into_iter().map(String::from).collect(),
            span: Span::default(),
        }
    }

    pub fn delete() -> Self {
        Stmt::Delete {
            span: Span::default(),
        }
    }

    pub fn ret() -> Self {
        Stmt::Return {
            span: Span::default(),
        }
    }

    pub fn stop() -> Self {
        Stmt::Stop {
            span: Span::default(),
        }
    }

    pub fn length(name: impl Into<String>, char_type: bool, length: usize) -> Self {
        Stmt::Length {
            vars: vec![LengthItem {
                name: name.into(),
                char_type,
                length,
            }],
            span: Span::default(),
        }
    }

    pub fn put(items: Vec<PutItem>) -> Self {
        Stmt::Put {
            items,
            span: Span::default(),
        }
    }
}
