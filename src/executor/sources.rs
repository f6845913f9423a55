//! Row sources
//!
//! A [`RowSource`] decides which input rows feed each iteration. The
//! [`BoundRows`] wrapper keeps a one-row lookahead over it so it can report
//! `FIRST.`/`LAST.` flags and the end-of-input flag.
//!
//! Sources never touch the PDV: they hand back row indices, and the driver
//! copies the named columns.

use std::cmp::Ordering;

use crate::types::Dataset;

use super::errors::StepError;
use super::types::{ByKey, Value};

/// One input dataset as seen by a row source
#[derive(Debug, Clone)]
pub struct SourceInput<'a> {
    pub name: String,
    pub dataset: &'a Dataset,
    /// Dataset column index of each BY key, in BY order
    pub keys: Vec<usize>,
}

/// Rows selected for one iteration, before boundary flags are known
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Row index per input, `None` when the input contributes nothing
    pub rows: Vec<Option<usize>>,
    /// Inputs re-supplying a row read on an earlier iteration
    pub carried: Vec<bool>,
    /// BY-key tuple of this iteration; empty without BY
    pub key: Vec<Value>,
}

/// Rows selected for one iteration
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRow {
    pub rows: Vec<Option<usize>>,
    pub carried: Vec<bool>,
    /// `FIRST.` flag per BY key
    pub first: Vec<bool>,
    /// `LAST.` flag per BY key
    pub last: Vec<bool>,
    /// No rows follow this one
    pub is_last: bool,
}

pub trait RowSource {
    /// Select the rows for the next iteration, or `None` when exhausted
    fn advance(&mut self) -> Result<Option<RawRow>, StepError>;
}

/// Compare BY tuples, honoring `DESCENDING` per key
pub fn compare_keys(a: &[Value], b: &[Value], by: &[ByKey]) -> Ordering {
    for ((x, y), key) in a.iter().zip(b).zip(by) {
        let ordering = if key.descending {
            y.collate(x)
        } else {
            x.collate(y)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/* ===================== Cursor ===================== */

/// Read position in one input, checking sort order as it moves
#[derive(Debug)]
struct Cursor<'a> {
    input: SourceInput<'a>,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: SourceInput<'a>) -> Self {
        Self { input, position: 0 }
    }

    fn exhausted(&self) -> bool {
        self.position >= self.input.dataset.len()
    }

    fn key_at(&self, row: usize) -> Vec<Value> {
        let values = &self.input.dataset.rows[row];
        self.input.keys.iter().map(|&c| values[c].clone()).collect()
    }

    fn head_key(&self) -> Option<Vec<Value>> {
        (!self.exhausted()).then(|| self.key_at(self.position))
    }

    /// Consume the head row and return its index
    fn take(&mut self, by: &[ByKey]) -> Result<usize, StepError> {
        let taken = self.position;
        self.position += 1;

        if !by.is_empty() && !self.exhausted() {
            let previous = self.key_at(taken);
            let next = self.key_at(self.position);
            if compare_keys(&previous, &next, by) == Ordering::Greater {
                return Err(StepError::UnsortedInput {
                    dataset: self.input.name.clone(),
                    row: self.position + 1,
                });
            }
        }
        Ok(taken)
    }
}

/// Index of the cursor whose head key comes first; ties go to the earliest
fn extremal(cursors: &[Cursor<'_>], by: &[ByKey]) -> Option<(usize, Vec<Value>)> {
    let mut best: Option<(usize, Vec<Value>)> = None;
    for (i, cursor) in cursors.iter().enumerate() {
        let Some(key) = cursor.head_key() else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((_, current)) => compare_keys(&key, current, by) == Ordering::Less,
        };
        if better {
            best = Some((i, key));
        }
    }
    best
}

/* ===================== SET ===================== */

/// `SET a b;` without BY: each input to exhaustion, in listed order
pub struct Concat<'a> {
    cursors: Vec<Cursor<'a>>,
    current: usize,
}

impl<'a> Concat<'a> {
    pub fn new(inputs: Vec<SourceInput<'a>>) -> Self {
        Self {
            cursors: inputs.into_iter().map(Cursor::new).collect(),
            current: 0,
        }
    }
}

impl RowSource for Concat<'_> {
    fn advance(&mut self) -> Result<Option<RawRow>, StepError> {
        while self.current < self.cursors.len() {
            if self.cursors[self.current].exhausted() {
                self.current += 1;
                continue;
            }
            let taken = self.cursors[self.current].take(&[])?;
            let mut rows = vec![None; self.cursors.len()];
            rows[self.current] = Some(taken);
            return Ok(Some(RawRow {
                carried: vec![false; rows.len()],
                rows,
                key: Vec::new(),
            }));
        }
        Ok(None)
    }
}

/// `SET a b; BY k;`: one row per iteration, taken from whichever input holds
/// the next key in sort order
pub struct Interleave<'a> {
    cursors: Vec<Cursor<'a>>,
    by: Vec<ByKey>,
}

impl<'a> Interleave<'a> {
    pub fn new(inputs: Vec<SourceInput<'a>>, by: Vec<ByKey>) -> Self {
        Self {
            cursors: inputs.into_iter().map(Cursor::new).collect(),
            by,
        }
    }
}

impl RowSource for Interleave<'_> {
    fn advance(&mut self) -> Result<Option<RawRow>, StepError> {
        let Some((index, key)) = extremal(&self.cursors, &self.by) else {
            return Ok(None);
        };
        let taken = self.cursors[index].take(&self.by)?;
        let mut rows = vec![None; self.cursors.len()];
        rows[index] = Some(taken);
        Ok(Some(RawRow {
            carried: vec![false; rows.len()],
            rows,
            key,
        }))
    }
}

/* ===================== MERGE ===================== */

/// `MERGE a b; BY k;`
///
/// Within a BY group every input that still has a row for the group advances;
/// an input that ran out of rows for the group re-supplies its last one.
/// Inputs with no rows in the group contribute nothing.
pub struct Merge<'a> {
    cursors: Vec<Cursor<'a>>,
    by: Vec<ByKey>,
    group: Option<Vec<Value>>,
    /// Last row taken from each input in the current group
    held: Vec<Option<usize>>,
}

impl<'a> Merge<'a> {
    pub fn new(inputs: Vec<SourceInput<'a>>, by: Vec<ByKey>) -> Self {
        let held = vec![None; inputs.len()];
        Self {
            cursors: inputs.into_iter().map(Cursor::new).collect(),
            by,
            group: None,
            held,
        }
    }

    fn in_group(&self, cursor: &Cursor<'_>, group: &[Value]) -> bool {
        cursor
            .head_key()
            .is_some_and(|key| compare_keys(&key, group, &self.by) == Ordering::Equal)
    }
}

impl RowSource for Merge<'_> {
    fn advance(&mut self) -> Result<Option<RawRow>, StepError> {
        let continues = match &self.group {
            Some(group) => self.cursors.iter().any(|c| self.in_group(c, group)),
            None => false,
        };

        if !continues {
            let Some((_, key)) = extremal(&self.cursors, &self.by) else {
                return Ok(None);
            };
            self.group = Some(key);
            self.held.iter_mut().for_each(|c| *c = None);
        }

        let Some(group) = self.group.clone() else {
            return Ok(None);
        };

        let mut carried = vec![false; self.cursors.len()];
        for i in 0..self.cursors.len() {
            if self.in_group(&self.cursors[i], &group) {
                let taken = self.cursors[i].take(&self.by)?;
                self.held[i] = Some(taken);
            } else {
                carried[i] = self.held[i].is_some();
            }
        }

        Ok(Some(RawRow {
            rows: self.held.clone(),
            carried,
            key: group,
        }))
    }
}

/// `MERGE a b;` without BY: row i of every input forms iteration i
pub struct OneToOne<'a> {
    cursors: Vec<Cursor<'a>>,
}

impl<'a> OneToOne<'a> {
    pub fn new(inputs: Vec<SourceInput<'a>>) -> Self {
        Self {
            cursors: inputs.into_iter().map(Cursor::new).collect(),
        }
    }
}

impl RowSource for OneToOne<'_> {
    fn advance(&mut self) -> Result<Option<RawRow>, StepError> {
        if self.cursors.iter().all(Cursor::exhausted) {
            return Ok(None);
        }
        let mut rows = Vec::with_capacity(self.cursors.len());
        for cursor in &mut self.cursors {
            rows.push(if cursor.exhausted() {
                None
            } else {
                Some(cursor.take(&[])?)
            });
        }
        Ok(Some(RawRow {
            carried: vec![false; rows.len()],
            rows,
            key: Vec::new(),
        }))
    }
}

/// Steps without input run exactly one iteration
#[derive(Debug, Default)]
pub struct Single {
    done: bool,
}

impl RowSource for Single {
    fn advance(&mut self) -> Result<Option<RawRow>, StepError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(RawRow {
            rows: Vec::new(),
            carried: Vec::new(),
            key: Vec::new(),
        }))
    }
}

/* ===================== Lookahead ===================== */

/// One-row lookahead over a source, producing boundary flags
pub struct BoundRows<'a> {
    source: Box<dyn RowSource + 'a>,
    primed: bool,
    lookahead: Option<RawRow>,
    previous: Option<Vec<Value>>,
}

impl<'a> BoundRows<'a> {
    pub fn new(source: Box<dyn RowSource + 'a>) -> Self {
        Self {
            source,
            primed: false,
            lookahead: None,
            previous: None,
        }
    }

    pub fn next_row(&mut self) -> Result<Option<BoundRow>, StepError> {
        if !self.primed {
            self.lookahead = self.source.advance()?;
            self.primed = true;
        }
        let Some(current) = self.lookahead.take() else {
            return Ok(None);
        };
        self.lookahead = self.source.advance()?;

        let first = boundary_flags(self.previous.as_deref(), &current.key);
        let last = boundary_flags(self.lookahead.as_ref().map(|r| r.key.as_slice()), &current.key);
        let is_last = self.lookahead.is_none();
        self.previous = Some(current.key);

        Ok(Some(BoundRow {
            rows: current.rows,
            carried: current.carried,
            first,
            last,
            is_last,
        }))
    }
}

/// A flag per key: set when `key` differs from `neighbor` at that key or at
/// any higher-order key, or when there is no neighbor
fn boundary_flags(neighbor: Option<&[Value]>, key: &[Value]) -> Vec<bool> {
    let mut changed = neighbor.is_none();
    key.iter()
        .enumerate()
        .map(|(i, value)| {
            if !changed {
                changed = neighbor
                    .and_then(|n| n.get(i))
                    .map_or(true, |other| other.collate(value) != Ordering::Equal);
            }
            changed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn keyed(name: &str, rows: &[(f64, &str)]) -> Dataset {
        let mut ds = Dataset::new(name, vec![Column::num("k"), Column::char("v")]);
        for (k, v) in rows {
            ds.push_row(vec![Value::Num(*k), Value::text(*v)]).unwrap();
        }
        ds
    }

    fn input<'a>(ds: &'a Dataset) -> SourceInput<'a> {
        SourceInput {
            name: ds.name.clone(),
            dataset: ds,
            keys: vec![0],
        }
    }

    fn by_k() -> Vec<ByKey> {
        vec![ByKey {
            name: "k".into(),
            descending: false,
        }]
    }

    fn drain(mut rows: BoundRows<'_>) -> Vec<BoundRow> {
        let mut out = Vec::new();
        while let Some(row) = rows.next_row().unwrap() {
            out.push(row);
        }
        out
    }

    #[test]
    fn test_concat_reads_inputs_in_order() {
        let a = keyed("a", &[(1.0, "a1"), (2.0, "a2")]);
        let b = keyed("b", &[(0.0, "b1")]);
        let rows = drain(BoundRows::new(Box::new(Concat::new(vec![input(&a), input(&b)]))));

        let picked: Vec<_> = rows.iter().map(|r| r.rows.clone()).collect();
        assert_eq!(
            picked,
            vec![vec![Some(0), None], vec![Some(1), None], vec![None, Some(0)]]
        );
        assert_eq!(
            rows.iter().map(|r| r.is_last).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[test]
    fn test_merge_carries_last_row_within_group() {
        let a = keyed("a", &[(1.0, "a1"), (2.0, "a2")]);
        let b = keyed("b", &[(1.0, "b1"), (1.0, "b2"), (3.0, "b3")]);
        let rows = drain(BoundRows::new(Box::new(Merge::new(
            vec![input(&a), input(&b)],
            by_k(),
        ))));

        let picked: Vec<_> = rows.iter().map(|r| r.rows.clone()).collect();
        assert_eq!(
            picked,
            vec![
                vec![Some(0), Some(0)],
                vec![Some(0), Some(1)],
                vec![Some(1), None],
                vec![None, Some(2)],
            ]
        );
        let carried: Vec<_> = rows.iter().map(|r| r.carried.clone()).collect();
        assert_eq!(
            carried,
            vec![
                vec![false, false],
                vec![true, false],
                vec![false, false],
                vec![false, false],
            ]
        );
        let first: Vec<_> = rows.iter().map(|r| r.first[0]).collect();
        let last: Vec<_> = rows.iter().map(|r| r.last[0]).collect();
        assert_eq!(first, vec![true, false, true, true]);
        assert_eq!(last, vec![false, true, true, true]);
    }

    #[test]
    fn test_interleave_ties_go_to_earlier_input() {
        let a = keyed("a", &[(1.0, "a1"), (3.0, "a3")]);
        let b = keyed("b", &[(1.0, "b1"), (2.0, "b2")]);
        let rows = drain(BoundRows::new(Box::new(Interleave::new(
            vec![input(&a), input(&b)],
            by_k(),
        ))));

        let picked: Vec<_> = rows.iter().map(|r| r.rows.clone()).collect();
        assert_eq!(
            picked,
            vec![
                vec![Some(0), None],
                vec![None, Some(0)],
                vec![None, Some(1)],
                vec![Some(1), None],
            ]
        );
    }

    #[test]
    fn test_unsorted_input_fails() {
        let a = keyed("a", &[(2.0, "x"), (1.0, "y")]);
        let mut rows = BoundRows::new(Box::new(Merge::new(vec![input(&a)], by_k())));
        let err = rows.next_row().unwrap_err();
        assert_eq!(
            err,
            StepError::UnsortedInput {
                dataset: "a".into(),
                row: 2
            }
        );
    }

    #[test]
    fn test_descending_keys() {
        let a = keyed("a", &[(3.0, "x"), (1.0, "y")]);
        let by = vec![ByKey {
            name: "k".into(),
            descending: true,
        }];
        let rows = drain(BoundRows::new(Box::new(Merge::new(vec![input(&a)], by))));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_one_to_one_runs_to_longest_input() {
        let a = keyed("a", &[(1.0, "a1")]);
        let b = keyed("b", &[(5.0, "b1"), (6.0, "b2")]);
        let rows = drain(BoundRows::new(Box::new(OneToOne::new(vec![input(&a), input(&b)]))));
        let picked: Vec<_> = rows.iter().map(|r| r.rows.clone()).collect();
        assert_eq!(picked, vec![vec![Some(0), Some(0)], vec![None, Some(1)]]);
    }

    #[test]
    fn test_higher_key_change_forces_lower_flags() {
        let flags = boundary_flags(
            Some(&[Value::Num(1.0), Value::Num(5.0)][..]),
            &[Value::Num(2.0), Value::Num(5.0)],
        );
        assert_eq!(flags, vec![true, true]);

        let flags = boundary_flags(
            Some(&[Value::Num(1.0), Value::Num(4.0)][..]),
            &[Value::Num(1.0), Value::Num(5.0)],
        );
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_single_runs_once() {
        let rows = drain(BoundRows::new(Box::new(Single::default())));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_last);
    }
}
