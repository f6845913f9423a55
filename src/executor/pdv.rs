//! Program Data Vector
//!
//! The PDV is the single row buffer every statement reads and writes. Slots
//! are created during the static pass in order of first appearance, and that
//! order is the output column order. Names are case-insensitive.

use std::collections::HashMap;

use crate::config::Strictness;

use super::errors::StepError;
use super::types::values::{parse_number, render_number, ParsedNumber, NUM_LENGTH};
use super::types::{Value, VarType};

/// Index of a slot in the PDV
pub type SlotId = usize;

/// Name of the automatic iteration counter
pub const N_VAR: &str = "_N_";

/// Name of the automatic error flag
pub const ERROR_VAR: &str = "_ERROR_";

/// Variable metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMeta {
    pub name: String,
    pub var_type: VarType,
    pub length: usize,
    pub label: Option<String>,
    pub format: Option<String>,
    pub informat: Option<String>,
    /// Exempt from the per-iteration reset
    pub retained: bool,
    /// Maintained by the engine; never reset and never written to output
    pub automatic: bool,
}

impl VariableMeta {
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            length: var_type.default_length(),
            label: None,
            format: None,
            informat: None,
            retained: false,
            automatic: false,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = match self.var_type {
            VarType::Num => NUM_LENGTH,
            VarType::Char => length.max(1),
        };
        self
    }
}

#[derive(Debug, Clone)]
struct Slot {
    meta: VariableMeta,
    value: Value,
    /// Value applied at step start (RETAIN initial values); missing when unset
    initial: Option<Value>,
}

/// Result of converting a value for storage
struct Coerced {
    value: Value,
    invalid: bool,
}

/* ===================== PDV ===================== */

#[derive(Debug, Clone)]
pub struct Pdv {
    slots: Vec<Slot>,
    index: HashMap<String, SlotId>,
    strictness: Strictness,
    error_slot: Option<SlotId>,
    /// Text that failed numeric conversion under lenient rules
    invalid_data: usize,
}

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl Pdv {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            strictness,
            error_slot: None,
            invalid_data: 0,
        }
    }

    /// Declare a variable, or reconcile with an existing declaration.
    ///
    /// Redeclaring with the same type is idempotent; attributes missing from
    /// the existing declaration are filled in. A different type is fatal.
    pub fn declare(&mut self, meta: VariableMeta) -> Result<SlotId, StepError> {
        if let Some(&id) = self.index.get(&key(&meta.name)) {
            let existing = &mut self.slots[id].meta;
            if existing.var_type != meta.var_type {
                return Err(StepError::Redefinition {
                    name: existing.name.clone(),
                    declared: existing.var_type,
                    requested: meta.var_type,
                });
            }
            if existing.label.is_none() {
                existing.label = meta.label;
            }
            if existing.format.is_none() {
                existing.format = meta.format;
            }
            if existing.informat.is_none() {
                existing.informat = meta.informat;
            }
            return Ok(id);
        }

        let id = self.slots.len();
        let missing = meta.var_type.missing();
        self.index.insert(key(&meta.name), id);
        self.slots.push(Slot {
            meta,
            value: missing,
            initial: None,
        });
        Ok(id)
    }

    /// Declare an automatic variable (`_N_`, `FIRST.x`, `IN=` flags, ...)
    pub fn declare_automatic(&mut self, name: &str) -> Result<SlotId, StepError> {
        let mut meta = VariableMeta::new(name, VarType::Num);
        meta.automatic = true;
        let id = self.declare(meta)?;
        self.slots[id].meta.automatic = true;
        if name.eq_ignore_ascii_case(ERROR_VAR) {
            self.error_slot = Some(id);
        }
        Ok(id)
    }

    pub fn slot_of(&self, name: &str) -> Option<SlotId> {
        self.index.get(&key(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&key(name))
    }

    pub fn meta(&self, id: SlotId) -> &VariableMeta {
        &self.slots[id].meta
    }

    pub fn meta_mut(&mut self, id: SlotId) -> &mut VariableMeta {
        &mut self.slots[id].meta
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /* ===================== Access ===================== */

    pub fn get(&self, name: &str) -> Result<&Value, StepError> {
        let id = self
            .slot_of(name)
            .ok_or_else(|| StepError::UndeclaredVariable {
                name: name.to_string(),
            })?;
        Ok(&self.slots[id].value)
    }

    pub fn get_slot(&self, id: SlotId) -> &Value {
        &self.slots[id].value
    }

    /// Assign by name, coercing to the slot's type
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), StepError> {
        let id = self
            .slot_of(name)
            .ok_or_else(|| StepError::UndeclaredVariable {
                name: name.to_string(),
            })?;
        self.set_slot(id, value)
    }

    /// Assign to a slot, coercing to its type and truncating text to its length
    pub fn set_slot(&mut self, id: SlotId, value: Value) -> Result<(), StepError> {
        let coerced = coerce(&self.slots[id].meta, value, self.strictness)?;
        if coerced.invalid {
            let name = self.slots[id].meta.name.clone();
            self.note_invalid_data(&name);
        }
        self.slots[id].value = coerced.value;
        Ok(())
    }

    /// Store a value the engine already knows matches the slot type
    pub(crate) fn store(&mut self, id: SlotId, value: Value) {
        self.slots[id].value = value;
    }

    /// Record a failed text-to-number conversion: sets `_ERROR_` and logs a note
    pub fn note_invalid_data(&mut self, context: &str) {
        self.invalid_data += 1;
        if let Some(id) = self.error_slot {
            self.slots[id].value = Value::Num(1.0);
        }
        tracing::warn!(context, "invalid numeric data; value set to missing");
    }

    pub fn invalid_data(&self) -> usize {
        self.invalid_data
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /* ===================== Retain / Reset ===================== */

    /// Exempt a slot from the per-iteration reset, with an optional initial value
    pub fn retain(&mut self, name: &str, initial: Option<Value>) -> Result<(), StepError> {
        let id = self
            .slot_of(name)
            .ok_or_else(|| StepError::UndeclaredVariable {
                name: name.to_string(),
            })?;
        self.slots[id].meta.retained = true;
        if let Some(initial) = initial {
            let coerced = coerce(&self.slots[id].meta, initial, self.strictness)?;
            self.slots[id].initial = Some(coerced.value.clone());
            self.slots[id].value = coerced.value;
        }
        Ok(())
    }

    /// Retain with `default` as the initial value unless one was already given
    pub fn retain_or_default(&mut self, name: &str, default: Value) -> Result<(), StepError> {
        let has_initial = self
            .slot_of(name)
            .is_some_and(|id| self.slots[id].initial.is_some());
        self.retain(name, (!has_initial).then_some(default))
    }

    /// Retain every non-automatic variable (`RETAIN;` with no list)
    pub fn retain_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| !s.meta.automatic) {
            slot.meta.retained = true;
        }
    }

    /// Put every slot in its step-start state
    pub fn initialize(&mut self) {
        for slot in &mut self.slots {
            slot.value = slot
                .initial
                .clone()
                .unwrap_or_else(|| slot.meta.var_type.missing());
        }
    }

    /// Set every non-retained, non-automatic slot to its missing sentinel.
    /// Retained and automatic slots are left untouched.
    pub fn reset_for_next_iteration(&mut self) {
        for slot in &mut self.slots {
            if !slot.meta.retained && !slot.meta.automatic {
                slot.value = slot.meta.var_type.missing();
            }
        }
    }

    /* ===================== Snapshots ===================== */

    /// Slots written to output datasets, in column order
    pub fn output_slots(&self) -> Vec<SlotId> {
        (0..self.slots.len())
            .filter(|&id| !self.slots[id].meta.automatic)
            .collect()
    }

    /// Copy the given slots' current values
    pub fn snapshot(&self, ids: &[SlotId]) -> Vec<Value> {
        ids.iter().map(|&id| self.slots[id].value.clone()).collect()
    }
}

/* ===================== Coercion ===================== */

fn coerce(meta: &VariableMeta, value: Value, strictness: Strictness) -> Result<Coerced, StepError> {
    fn ok(value: Value) -> Result<Coerced, StepError> {
        Ok(Coerced {
            value,
            invalid: false,
        })
    }

    match (meta.var_type, value) {
        (VarType::Num, v @ (Value::Num(_) | Value::MissingNum)) => ok(v),
        (VarType::Char, Value::Str(s)) => ok(truncate(s, meta.length)),
        (VarType::Char, Value::MissingStr) => ok(Value::MissingStr),

        // Missing converts to missing of the other type under any strictness
        (VarType::Num, Value::MissingStr) => ok(Value::MissingNum),
        (VarType::Char, Value::MissingNum) => ok(Value::MissingStr),

        (VarType::Num, Value::Str(s)) => match strictness {
            Strictness::Strict => Err(StepError::type_mismatch(format!(
                "cannot assign character value '{}' to numeric variable {}",
                s.trim_end(),
                meta.name
            ))),
            Strictness::Lenient => match parse_number(&s) {
                ParsedNumber::Number(v) => ok(Value::Num(v)),
                ParsedNumber::Missing => ok(Value::MissingNum),
                ParsedNumber::Invalid => Ok(Coerced {
                    value: Value::MissingNum,
                    invalid: true,
                }),
            },
        },

        (VarType::Char, Value::Num(v)) => match strictness {
            Strictness::Strict => Err(StepError::type_mismatch(format!(
                "cannot assign numeric value {} to character variable {}",
                render_number(v),
                meta.name
            ))),
            Strictness::Lenient => ok(truncate(render_number(v), meta.length)),
        },
    }
}

fn truncate(s: String, length: usize) -> Value {
    if s.chars().count() <= length {
        Value::Str(s)
    } else {
        Value::Str(s.chars().take(length).collect())
    }
}
