//! Static pass
//!
//! Walks the step once, before any row is read, and builds everything the
//! iterations share: PDV slots in order of first reference, array bindings,
//! retained values, the bound inputs and the output sink.
//!
//! Variable types come from a hints walk that runs first: a variable's type
//! is the type of its first typed assignment anywhere in the step, otherwise
//! numeric. Character variables assigned a literal first take the literal's
//! length.

use std::collections::HashMap;

use crate::store::DatasetStore;

use super::arrays::{element_count, resolve_bounds, ArrayBindings};
use super::errors::StepError;
use super::output::OutputSink;
use super::pdv::{Pdv, SlotId, VariableMeta, ERROR_VAR, N_VAR};
use super::sources::SourceInput;
use super::types::values::DEFAULT_ARRAY_CHAR_LENGTH;
use super::types::{
    ArrayBound, BinaryOp, DataStep, DoKind, Expr, InputBinding, InputSpec, PutItem, Stmt, Target, Value,
    VarType,
};
use super::StepEnv;

/// An input dataset with its columns resolved against the PDV
pub(crate) struct BoundInput<'a> {
    pub source: SourceInput<'a>,
    /// (dataset column, PDV slot) pairs copied on each read
    pub columns: Vec<(usize, SlotId)>,
    /// `IN=` flag
    pub in_slot: Option<SlotId>,
}

/// Everything the driver needs to start iterating
pub(crate) struct Prepared<'a> {
    pub pdv: Pdv,
    pub arrays: ArrayBindings,
    pub sink: OutputSink,
    pub inputs: Vec<BoundInput<'a>>,
    pub first_slots: Vec<SlotId>,
    pub last_slots: Vec<SlotId>,
    pub end_slot: Option<SlotId>,
    pub n_slot: SlotId,
    pub error_slot: SlotId,
    /// The step contains an `OUTPUT` statement somewhere
    pub explicit_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hint {
    var_type: VarType,
    length: Option<usize>,
}

pub(crate) fn prepare<'a>(
    step: &DataStep,
    store: &'a DatasetStore,
    env: &StepEnv,
) -> Result<Prepared<'a>, StepError> {
    let mut pdv = Pdv::new(env.options.strictness);
    let n_slot = pdv.declare_automatic(N_VAR)?;
    let error_slot = pdv.declare_automatic(ERROR_VAR)?;

    let mut inputs = Vec::new();
    let mut first_slots = Vec::new();
    let mut last_slots = Vec::new();
    let mut end_slot = None;

    if let Some(binding) = &step.input {
        for spec in binding.datasets() {
            inputs.push(bind_input(&mut pdv, store, spec, binding)?);
        }
        for key in binding.by() {
            first_slots.push(pdv.declare_automatic(&format!("FIRST.{}", key.name))?);
            last_slots.push(pdv.declare_automatic(&format!("LAST.{}", key.name))?);
        }
        if let Some(end) = binding.end() {
            end_slot = Some(pdv.declare_automatic(end)?);
        }
    }

    let mut hints = Hints::new(env);
    hints.walk_block(&step.body, &pdv);

    let mut declarer = Declarer {
        pdv,
        arrays: ArrayBindings::new(env.options.array_order),
        sink: OutputSink::new(&step.outputs),
        hints: hints.vars,
        retain_all: false,
        explicit_output: false,
    };
    declarer.block(&step.body)?;

    let Declarer {
        mut pdv,
        arrays,
        mut sink,
        retain_all,
        explicit_output,
        ..
    } = declarer;

    if retain_all {
        pdv.retain_all();
    }
    sink.set_slots(pdv.output_slots());

    tracing::debug!(
        variables = pdv.len(),
        inputs = inputs.len(),
        explicit_output,
        "static pass complete"
    );

    Ok(Prepared {
        pdv,
        arrays,
        sink,
        inputs,
        first_slots,
        last_slots,
        end_slot,
        n_slot,
        error_slot,
        explicit_output,
    })
}

/* ===================== Inputs ===================== */

fn bind_input<'a>(
    pdv: &mut Pdv,
    store: &'a DatasetStore,
    spec: &InputSpec,
    binding: &InputBinding,
) -> Result<BoundInput<'a>, StepError> {
    let dataset = store
        .get(&spec.name)
        .ok_or_else(|| StepError::DatasetNotFound {
            name: spec.name.clone(),
        })?;

    let contains = |list: &[String], name: &str| list.iter().any(|n| n.eq_ignore_ascii_case(name));

    for name in spec.keep.iter().flatten().chain(&spec.drop) {
        if dataset.column_index(name).is_none() {
            return Err(StepError::UnknownColumn {
                name: name.clone(),
                dataset: spec.name.clone(),
            });
        }
    }

    // Column names as the step sees them
    let renamed: Vec<String> = dataset
        .columns
        .iter()
        .map(|c| {
            spec.rename
                .iter()
                .find(|(old, _)| old.eq_ignore_ascii_case(&c.name))
                .map(|(_, new)| new.clone())
                .unwrap_or_else(|| c.name.clone())
        })
        .collect();

    let mut columns = Vec::new();
    for (index, column) in dataset.columns.iter().enumerate() {
        let selected = spec.keep.as_ref().map_or(true, |k| contains(k, &column.name))
            && !contains(&spec.drop, &column.name);
        if !selected {
            continue;
        }
        let meta = VariableMeta {
            label: column.label.clone(),
            format: column.format.clone(),
            informat: column.informat.clone(),
            ..VariableMeta::new(renamed[index].clone(), column.var_type)
                .with_length(column.effective_length())
        };
        columns.push((index, pdv.declare(meta)?));
    }

    let mut keys = Vec::with_capacity(binding.by().len());
    for key in binding.by() {
        let index = renamed
            .iter()
            .position(|n| n.eq_ignore_ascii_case(&key.name))
            .ok_or_else(|| StepError::ByKeyMissing {
                key: key.name.clone(),
                dataset: spec.name.clone(),
            })?;
        keys.push(index);
    }

    let in_slot = match &spec.in_var {
        Some(name) => Some(pdv.declare_automatic(name)?),
        None => None,
    };

    Ok(BoundInput {
        source: SourceInput {
            name: spec.name.clone(),
            dataset,
            keys,
        },
        columns,
        in_slot,
    })
}

/* ===================== Type Hints ===================== */

struct Hints<'e> {
    env: &'e StepEnv,
    vars: HashMap<String, Hint>,
    /// Array name -> element type
    arrays: HashMap<String, VarType>,
}

impl<'e> Hints<'e> {
    fn new(env: &'e StepEnv) -> Self {
        Self {
            env,
            vars: HashMap::new(),
            arrays: HashMap::new(),
        }
    }

    fn note(&mut self, name: &str, hint: Hint) {
        self.vars.entry(name.to_ascii_uppercase()).or_insert(hint);
    }

    fn note_expr(&mut self, name: &str, expr: &Expr, pdv: &Pdv) {
        if pdv.contains(name) {
            return;
        }
        if let Some(hint) = self.infer(expr, pdv) {
            self.note(name, hint);
        }
    }

    fn infer(&self, expr: &Expr, pdv: &Pdv) -> Option<Hint> {
        let num = Some(Hint {
            var_type: VarType::Num,
            length: None,
        });
        let text = |length| {
            Some(Hint {
                var_type: VarType::Char,
                length,
            })
        };

        match expr {
            Expr::LitStr { v, .. } => text(Some(v.chars().count().max(1))),
            Expr::Ident { name, .. } => match pdv.slot_of(name) {
                Some(id) => {
                    let meta = pdv.meta(id);
                    Some(Hint {
                        var_type: meta.var_type,
                        length: Some(meta.length),
                    })
                }
                None => self.vars.get(&name.to_ascii_uppercase()).copied(),
            },
            Expr::Element { array, .. } => match self.arrays.get(&array.to_ascii_uppercase()) {
                Some(VarType::Char) => text(None),
                Some(VarType::Num) => num,
                None => None,
            },
            Expr::ArrayAll { .. } => None,
            Expr::Binary {
                op: BinaryOp::Concat,
                ..
            } => text(None),
            Expr::Call { name, .. } => match self.env.functions.return_type(&name.to_ascii_uppercase()) {
                Some(VarType::Char) => text(None),
                Some(VarType::Num) => num,
                None => None,
            },
            _ => num,
        }
    }

    fn walk_block(&mut self, body: &[Stmt], pdv: &Pdv) {
        for stmt in body {
            self.walk(stmt, pdv);
        }
    }

    fn walk(&mut self, stmt: &Stmt, pdv: &Pdv) {
        match stmt {
            Stmt::Assign {
                target: Target::Var { name },
                value,
                ..
            } => self.note_expr(name, value, pdv),
            Stmt::Length { vars, .. } => {
                for item in vars {
                    let var_type = if item.char_type {
                        VarType::Char
                    } else {
                        VarType::Num
                    };
                    self.note(
                        &item.name,
                        Hint {
                            var_type,
                            length: Some(item.length),
                        },
                    );
                }
            }
            Stmt::Retain { vars, .. } => {
                for item in vars {
                    if let Some(initial) = &item.initial {
                        let length = initial.as_text().map(|s| s.chars().count().max(1));
                        self.note(
                            &item.name,
                            Hint {
                                var_type: initial.var_type(),
                                length,
                            },
                        );
                    }
                }
            }
            Stmt::Array {
                name,
                char_type,
                ..
            } => {
                let var_type = if *char_type {
                    VarType::Char
                } else {
                    VarType::Num
                };
                self.arrays.insert(name.to_ascii_uppercase(), var_type);
            }
            Stmt::If { then_s, else_s, .. } => {
                self.walk_block(then_s, pdv);
                if let Some(else_s) = else_s {
                    self.walk_block(else_s, pdv);
                }
            }
            Stmt::Block { body, .. } => self.walk_block(body, pdv),
            Stmt::DoLoop { kind, body, .. } => {
                if let DoKind::List { var, values } = kind {
                    if let Some(first) = values.first() {
                        self.note_expr(var, first, pdv);
                    }
                }
                self.walk_block(body, pdv);
            }
            _ => {}
        }
    }
}

/* ===================== Declarations ===================== */

struct Declarer {
    pdv: Pdv,
    arrays: ArrayBindings,
    sink: OutputSink,
    hints: HashMap<String, Hint>,
    retain_all: bool,
    explicit_output: bool,
}

impl Declarer {
    fn hinted(&self, name: &str) -> VariableMeta {
        match self.hints.get(&name.to_ascii_uppercase()) {
            Some(hint) => {
                let meta = VariableMeta::new(name, hint.var_type);
                match hint.length {
                    Some(length) => meta.with_length(length),
                    None => meta,
                }
            }
            None => VariableMeta::new(name, VarType::Num),
        }
    }

    /// Declare a referenced variable on first sight
    fn reference(&mut self, name: &str) -> Result<SlotId, StepError> {
        if let Some(id) = self.pdv.slot_of(name) {
            return Ok(id);
        }
        if name.contains('.') {
            // FIRST./LAST. flags only exist for BY variables
            return Err(StepError::UndeclaredVariable {
                name: name.to_string(),
            });
        }
        if self.arrays.contains(name) {
            return Err(StepError::type_mismatch(format!(
                "array {name} used where a variable is required"
            )));
        }
        let meta = self.hinted(name);
        self.pdv.declare(meta)
    }

    fn block(&mut self, body: &[Stmt]) -> Result<(), StepError> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), StepError> {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                match target {
                    Target::Var { name } => {
                        self.reference(name)?;
                    }
                    Target::Element { array, indices } => self.element(array, indices)?,
                }
                self.expr(value)
            }

            Stmt::Sum { var, value, .. } => {
                self.pdv.declare(VariableMeta::new(var.as_str(), VarType::Num))?;
                self.pdv.retain_or_default(var, Value::Num(0.0))?;
                self.expr(value)
            }

            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.expr(test)?;
                self.block(then_s)?;
                match else_s {
                    Some(else_s) => self.block(else_s),
                    None => Ok(()),
                }
            }

            Stmt::SubsetIf { test, .. } => self.expr(test),

            Stmt::Block { body, .. } => self.block(body),

            Stmt::DoLoop { kind, body, .. } => {
                match kind {
                    DoKind::Counted {
                        var,
                        start,
                        end,
                        step,
                        while_test,
                        until_test,
                    } => {
                        self.pdv.declare(VariableMeta::new(var.as_str(), VarType::Num))?;
                        for expr in [Some(start), Some(end), step.as_ref(), while_test.as_ref(), until_test.as_ref()]
                            .into_iter()
                            .flatten()
                        {
                            self.expr(expr)?;
                        }
                    }
                    DoKind::List { var, values } => {
                        self.reference(var)?;
                        for value in values {
                            self.expr(value)?;
                        }
                    }
                    DoKind::While { test } | DoKind::Until { test } => self.expr(test)?,
                }
                self.block(body)
            }

            Stmt::Retain { vars, .. } => {
                if vars.is_empty() {
                    self.retain_all = true;
                }
                for item in vars {
                    self.reference(&item.name)?;
                    self.pdv.retain(&item.name, item.initial.clone())?;
                }
                Ok(())
            }

            Stmt::Array {
                name,
                bounds,
                members,
                char_type,
                length,
                ..
            } => self.array(name, bounds, members, *char_type, *length),

            Stmt::Length { vars, .. } => {
                for item in vars {
                    let var_type = if item.char_type {
                        VarType::Char
                    } else {
                        VarType::Num
                    };
                    let id = self
                        .pdv
                        .declare(VariableMeta::new(item.name.as_str(), var_type).with_length(item.length))?;
                    if var_type == VarType::Char {
                        self.pdv.meta_mut(id).length = item.length.max(1);
                    }
                }
                Ok(())
            }

            Stmt::Format { vars, format, .. } => {
                for var in vars {
                    let id = self.reference(var)?;
                    self.pdv.meta_mut(id).format = Some(format.clone());
                }
                Ok(())
            }

            Stmt::Informat { vars, informat, .. } => {
                for var in vars {
                    let id = self.reference(var)?;
                    self.pdv.meta_mut(id).informat = Some(informat.clone());
                }
                Ok(())
            }

            Stmt::Label { labels, .. } => {
                for (var, label) in labels {
                    let id = self.reference(var)?;
                    self.pdv.meta_mut(id).label = Some(label.clone());
                }
                Ok(())
            }

            Stmt::Output { datasets, .. } => {
                self.explicit_output = true;
                for name in datasets {
                    if !self.sink.has_target(name) {
                        return Err(StepError::UnknownOutput { name: name.clone() });
                    }
                }
                Ok(())
            }

            Stmt::Drop { vars, .. } => {
                self.sink.add_drop(vars);
                Ok(())
            }

            Stmt::Keep { vars, .. } => {
                self.sink.add_keep(vars);
                Ok(())
            }

            Stmt::Put { items, .. } => {
                for item in items {
                    match item {
                        PutItem::Text { .. } => {}
                        PutItem::Named { name } => {
                            self.reference(name)?;
                        }
                        PutItem::Value { expr } => self.expr(expr)?,
                    }
                }
                Ok(())
            }

            Stmt::Leave { .. }
            | Stmt::Continue { .. }
            | Stmt::Delete { .. }
            | Stmt::Return { .. }
            | Stmt::Stop { .. } => Ok(()),
        }
    }

    fn array(
        &mut self,
        name: &str,
        bounds: &[ArrayBound],
        members: &[String],
        char_type: bool,
        length: Option<usize>,
    ) -> Result<(), StepError> {
        let var_type = if char_type { VarType::Char } else { VarType::Num };

        let members: Vec<String> = if members.is_empty() {
            if bounds.contains(&ArrayBound::Star) {
                return Err(StepError::InvalidArray {
                    array: name.to_string(),
                    message: "{*} requires an explicit member list".into(),
                });
            }
            let count = element_count(&resolve_bounds(name, bounds, 0)?);
            (1..=count).map(|i| format!("{name}{i}")).collect()
        } else {
            members.to_vec()
        };

        for member in &members {
            if self.pdv.contains(member) {
                continue;
            }
            let mut meta = VariableMeta::new(member.as_str(), var_type);
            if var_type == VarType::Char {
                meta = meta.with_length(length.unwrap_or(DEFAULT_ARRAY_CHAR_LENGTH));
            }
            self.pdv.declare(meta)?;
        }

        self.arrays
            .define(&self.pdv, name, var_type, bounds, &members)
    }

    fn element(&mut self, array: &str, indices: &[Expr]) -> Result<(), StepError> {
        if !self.arrays.contains(array) {
            return Err(StepError::UndefinedArray {
                name: array.to_string(),
            });
        }
        for index in indices {
            self.expr(index)?;
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), StepError> {
        match expr {
            Expr::LitNum { .. } | Expr::LitStr { .. } | Expr::LitMissing { .. } => Ok(()),
            Expr::Ident { name, .. } => self.reference(name).map(|_| ()),
            Expr::Element { array, indices, .. } => self.element(array, indices),
            Expr::ArrayAll { array, .. } => {
                if self.arrays.contains(array) {
                    Ok(())
                } else {
                    Err(StepError::UndefinedArray {
                        name: array.clone(),
                    })
                }
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            Expr::In { operand, list, .. } => {
                self.expr(operand)?;
                list.iter().try_for_each(|item| self.expr(item))
            }
            Expr::Call { name, args, .. } => {
                let upper = name.to_ascii_uppercase();
                let array_fn = matches!(upper.as_str(), "DIM" | "LBOUND" | "HBOUND");
                for (i, arg) in args.iter().enumerate() {
                    match arg {
                        Expr::Ident { name, .. } if array_fn && i == 0 => {
                            if !self.arrays.contains(name) {
                                return Err(StepError::UndefinedArray { name: name.clone() });
                            }
                        }
                        _ => self.expr(arg)?,
                    }
                }
                Ok(())
            }
        }
    }
}
