//! Output sink
//!
//! Rows are snapshots of the PDV taken when `OUTPUT` runs (or at the end of
//! the iteration for implicit output). Snapshots are buffered per iteration
//! and committed in the emitting phase. Column projection (`KEEP`, `DROP`,
//! dataset options) is applied once, when the step finishes.

use std::collections::HashSet;

use crate::types::{Column, Dataset};

use super::errors::StepError;
use super::pdv::{Pdv, SlotId};
use super::types::{OutputSpec, Value};

#[derive(Debug)]
struct Target {
    spec: OutputSpec,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
pub struct OutputSink {
    targets: Vec<Target>,
    /// PDV slots captured by every snapshot, in column order
    slots: Vec<SlotId>,
    /// Snapshots taken during the current iteration: (target, row)
    pending: Vec<(usize, Vec<Value>)>,
    /// `KEEP` statements, merged
    keep: Option<Vec<String>>,
    /// `DROP` statements, merged
    drop: Vec<String>,
}

impl OutputSink {
    pub fn new(specs: &[OutputSpec]) -> Self {
        Self {
            targets: specs
                .iter()
                .map(|spec| Target {
                    spec: spec.clone(),
                    rows: Vec::new(),
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Fix the columns every snapshot captures
    pub fn set_slots(&mut self, slots: Vec<SlotId>) {
        self.slots = slots;
    }

    pub fn add_keep(&mut self, vars: &[String]) {
        self.keep.get_or_insert_with(Vec::new).extend(vars.iter().cloned());
    }

    pub fn add_drop(&mut self, vars: &[String]) {
        self.drop.extend(vars.iter().cloned());
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.target_index(name).is_some()
    }

    fn target_index(&self, name: &str) -> Option<usize> {
        self.targets
            .iter()
            .position(|t| t.spec.name.eq_ignore_ascii_case(name))
    }

    /// `OUTPUT [names];`: snapshot into the named targets, or all of them
    pub fn record(&mut self, names: &[String], pdv: &Pdv) -> Result<(), StepError> {
        let indices = if names.is_empty() {
            (0..self.targets.len()).collect()
        } else {
            names
                .iter()
                .map(|name| {
                    self.target_index(name)
                        .ok_or_else(|| StepError::UnknownOutput { name: name.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let snapshot = pdv.snapshot(&self.slots);
        for index in indices {
            self.pending.push((index, snapshot.clone()));
        }
        Ok(())
    }

    /// End-of-iteration output to every target
    pub fn record_implicit(&mut self, pdv: &Pdv) {
        let snapshot = pdv.snapshot(&self.slots);
        for index in 0..self.targets.len() {
            self.pending.push((index, snapshot.clone()));
        }
    }

    /// Move this iteration's snapshots into their targets
    pub fn commit_iteration(&mut self) -> usize {
        let count = self.pending.len();
        for (index, row) in self.pending.drain(..) {
            self.targets[index].rows.push(row);
        }
        count
    }

    /// Build the output datasets: step-level `KEEP`/`DROP`, then each
    /// dataset's own options, then renames
    pub fn finalize(self, pdv: &Pdv) -> Vec<Dataset> {
        let names: Vec<&str> = self
            .slots
            .iter()
            .map(|&id| pdv.meta(id).name.as_str())
            .collect();
        let step_columns = project(&names, self.keep.as_deref(), &self.drop);

        self.targets
            .into_iter()
            .map(|target| {
                let spec = &target.spec;
                let visible: Vec<&str> = step_columns.iter().map(|&i| names[i]).collect();
                let kept = project(&visible, spec.keep.as_deref(), &spec.drop);
                let positions: Vec<usize> = kept.iter().map(|&k| step_columns[k]).collect();

                let columns = positions
                    .iter()
                    .map(|&p| {
                        let meta = pdv.meta(self.slots[p]);
                        let name = spec
                            .rename
                            .iter()
                            .find(|(old, _)| old.eq_ignore_ascii_case(&meta.name))
                            .map(|(_, new)| new.clone())
                            .unwrap_or_else(|| meta.name.clone());
                        Column {
                            name,
                            var_type: meta.var_type,
                            length: Some(meta.length),
                            label: meta.label.clone(),
                            format: meta.format.clone(),
                            informat: meta.informat.clone(),
                        }
                    })
                    .collect();

                let rows = target
                    .rows
                    .into_iter()
                    .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                    .collect();

                Dataset {
                    name: spec.name.clone(),
                    columns,
                    rows,
                }
            })
            .collect()
    }
}

fn upper(s: &str) -> String {
    s.to_ascii_uppercase()
}

/// Positions of `names` that survive a keep list and a drop list
fn project(names: &[&str], keep: Option<&[String]>, drop: &[String]) -> Vec<usize> {
    let keep: Option<HashSet<String>> = keep.map(|k| k.iter().map(|s| upper(s)).collect());
    let drop: HashSet<String> = drop.iter().map(|s| upper(s)).collect();

    for name in keep.iter().flatten().chain(drop.iter()) {
        if !names.iter().any(|n| upper(n) == *name) {
            tracing::warn!(variable = %name, "KEEP/DROP variable is not in the step");
        }
    }

    names
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            let name = upper(name);
            keep.as_ref().map_or(true, |k| k.contains(&name)) && !drop.contains(&name)
        })
        .map(|(i, _)| i)
        .collect()
}
