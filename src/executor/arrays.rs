//! Array bindings
//!
//! An array is a named view over existing PDV slots. It owns no storage:
//! resolving `arr{i, j}` yields a [`SlotId`] and the caller reads or writes
//! the PDV through it.

use std::collections::HashMap;

use crate::config::ArrayOrder;

use super::errors::StepError;
use super::pdv::{Pdv, SlotId};
use super::types::{ArrayBound, VarType};

/// Most elements one array may alias
pub const MAX_ARRAY_ELEMENTS: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct ArrayDef {
    pub name: String,
    pub var_type: VarType,
    /// (lower, upper) per dimension, inclusive
    pub bounds: Vec<(i64, i64)>,
    pub members: Vec<SlotId>,
}

impl ArrayDef {
    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    /// Number of elements in dimension `n` (1-based)
    pub fn dim(&self, n: usize) -> Option<i64> {
        self.bounds
            .get(n.checked_sub(1)?)
            .map(|(lower, upper)| upper - lower + 1)
    }

    pub fn lbound(&self, n: usize) -> Option<i64> {
        self.bounds.get(n.checked_sub(1)?).map(|(lower, _)| *lower)
    }

    pub fn hbound(&self, n: usize) -> Option<i64> {
        self.bounds.get(n.checked_sub(1)?).map(|(_, upper)| *upper)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrayBindings {
    defs: HashMap<String, ArrayDef>,
    order: ArrayOrder,
}

/// Resolve `{*}` and validate each dimension
pub fn resolve_bounds(
    name: &str,
    bounds: &[ArrayBound],
    member_count: usize,
) -> Result<Vec<(i64, i64)>, StepError> {
    let invalid = |message: String| StepError::InvalidArray {
        array: name.to_string(),
        message,
    };

    if bounds.is_empty() {
        return Err(invalid("no dimensions given".into()));
    }

    let mut resolved = Vec::with_capacity(bounds.len());
    for bound in bounds {
        match *bound {
            ArrayBound::Star if bounds.len() == 1 => {
                resolved.push((1, member_count as i64));
            }
            ArrayBound::Star => {
                return Err(invalid("{*} is only allowed for one-dimensional arrays".into()));
            }
            ArrayBound::Range { lower, upper } if upper < lower => {
                return Err(invalid(format!("upper bound {upper} is below lower bound {lower}")));
            }
            ArrayBound::Range { lower, upper } => resolved.push((lower, upper)),
        }
    }

    let count = resolved.iter().try_fold(1usize, |acc, &(lower, upper)| {
        let extent = upper.checked_sub(lower)?.checked_add(1)?;
        acc.checked_mul(usize::try_from(extent).ok()?)
    });
    match count {
        Some(count) if count <= MAX_ARRAY_ELEMENTS => Ok(resolved),
        _ => Err(invalid(format!("more than {MAX_ARRAY_ELEMENTS} elements"))),
    }
}

/// Product of the extents of bounds checked by [`resolve_bounds`]
pub fn element_count(bounds: &[(i64, i64)]) -> usize {
    bounds
        .iter()
        .map(|(lower, upper)| upper.saturating_sub(*lower).saturating_add(1).max(0) as usize)
        .fold(1usize, usize::saturating_mul)
}

impl ArrayBindings {
    pub fn new(order: ArrayOrder) -> Self {
        Self {
            defs: HashMap::new(),
            order,
        }
    }

    /// Bind `name` over existing PDV variables.
    ///
    /// The member count must equal the product of the extents, and every
    /// member must already be declared with the array's type.
    pub fn define(
        &mut self,
        pdv: &Pdv,
        name: &str,
        var_type: VarType,
        bounds: &[ArrayBound],
        members: &[String],
    ) -> Result<(), StepError> {
        let key = name.to_ascii_uppercase();
        if self.defs.contains_key(&key) {
            return Err(StepError::InvalidArray {
                array: name.to_string(),
                message: "array is already defined".into(),
            });
        }
        if pdv.contains(name) {
            return Err(StepError::InvalidArray {
                array: name.to_string(),
                message: "name is already used by a variable".into(),
            });
        }

        let resolved = resolve_bounds(name, bounds, members.len())?;
        let expected = element_count(&resolved);
        if expected != members.len() {
            return Err(StepError::InvalidArray {
                array: name.to_string(),
                message: format!(
                    "{} members given for {} elements",
                    members.len(),
                    expected
                ),
            });
        }

        let mut slots = Vec::with_capacity(members.len());
        for member in members {
            let id = pdv
                .slot_of(member)
                .ok_or_else(|| StepError::UndeclaredVariable {
                    name: member.clone(),
                })?;
            let declared = pdv.meta(id).var_type;
            if declared != var_type {
                return Err(StepError::Redefinition {
                    name: member.clone(),
                    declared,
                    requested: var_type,
                });
            }
            slots.push(id);
        }

        self.defs.insert(
            key,
            ArrayDef {
                name: name.to_string(),
                var_type,
                bounds: resolved,
                members: slots,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArrayDef> {
        self.defs.get(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(&name.to_ascii_uppercase())
    }

    /// Resolve a subscript tuple to the aliased slot
    pub fn at(&self, name: &str, indices: &[i64]) -> Result<SlotId, StepError> {
        let def = self.get(name).ok_or_else(|| StepError::UndefinedArray {
            name: name.to_string(),
        })?;

        if indices.len() != def.bounds.len() {
            return Err(StepError::bounds(
                &def.name,
                format!(
                    "{} subscripts given for {} dimensions",
                    indices.len(),
                    def.bounds.len()
                ),
            ));
        }

        for (index, (lower, upper)) in indices.iter().zip(&def.bounds) {
            if index < lower || index > upper {
                return Err(StepError::bounds(
                    &def.name,
                    format!("subscript {index} is outside {lower}:{upper}"),
                ));
            }
        }

        let offset = match self.order {
            ArrayOrder::RowMajor => offset(indices.iter().zip(&def.bounds)),
            ArrayOrder::ColumnMajor => offset(indices.iter().zip(&def.bounds).rev()),
        };
        Ok(def.members[offset])
    }
}

/// Linear offset where the last dimension yielded varies fastest
fn offset<'a>(dims: impl Iterator<Item = (&'a i64, &'a (i64, i64))>) -> usize {
    dims.fold(0usize, |acc, (index, (lower, upper))| {
        let extent = (upper - lower + 1) as usize;
        acc * extent + (index - lower) as usize
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strictness;
    use crate::executor::pdv::VariableMeta;

    fn pdv_with(names: &[&str]) -> Pdv {
        let mut pdv = Pdv::new(Strictness::Lenient);
        for name in names {
            pdv.declare(VariableMeta::new(*name, VarType::Num)).unwrap();
        }
        pdv
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_dimensional_lookup() {
        let pdv = pdv_with(&["a", "b", "c"]);
        let mut arrays = ArrayBindings::new(ArrayOrder::RowMajor);
        arrays
            .define(&pdv, "arr", VarType::Num, &[ArrayBound::extent(3)], &names(&["a", "b", "c"]))
            .unwrap();

        assert_eq!(arrays.at("ARR", &[1]).unwrap(), pdv.slot_of("a").unwrap());
        assert_eq!(arrays.at("arr", &[3]).unwrap(), pdv.slot_of("c").unwrap());
    }

    #[test]
    fn test_out_of_range_is_bounds_error() {
        let pdv = pdv_with(&["a", "b"]);
        let mut arrays = ArrayBindings::new(ArrayOrder::RowMajor);
        arrays
            .define(&pdv, "arr", VarType::Num, &[ArrayBound::Star], &names(&["a", "b"]))
            .unwrap();

        assert!(matches!(arrays.at("arr", &[0]), Err(StepError::Bounds { .. })));
        assert!(matches!(arrays.at("arr", &[3]), Err(StepError::Bounds { .. })));
        assert!(matches!(arrays.at("arr", &[1, 1]), Err(StepError::Bounds { .. })));
    }

    #[test]
    fn test_member_count_must_match_extents() {
        let pdv = pdv_with(&["a", "b"]);
        let mut arrays = ArrayBindings::new(ArrayOrder::RowMajor);
        let err = arrays
            .define(&pdv, "arr", VarType::Num, &[ArrayBound::extent(3)], &names(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidArray { .. }));
    }

    #[test]
    fn test_oversized_bounds_are_rejected() {
        let huge = [ArrayBound::Range {
            lower: i64::MIN,
            upper: i64::MAX,
        }];
        let err = resolve_bounds("a", &huge, 0).unwrap_err();
        assert!(matches!(err, StepError::InvalidArray { .. }));

        let wide = [
            ArrayBound::Range { lower: 1, upper: 10_000 },
            ArrayBound::Range { lower: 1, upper: 10_000 },
        ];
        let err = resolve_bounds("a", &wide, 0).unwrap_err();
        assert!(matches!(err, StepError::InvalidArray { .. }));

        let fits = [ArrayBound::Range { lower: -2, upper: 2 }];
        assert_eq!(element_count(&resolve_bounds("a", &fits, 0).unwrap()), 5);
    }

    #[test]
    fn test_two_dimensional_orders() {
        let pdv = pdv_with(&["m11", "m12", "m13", "m21", "m22", "m23"]);
        let members = names(&["m11", "m12", "m13", "m21", "m22", "m23"]);
        let bounds = [ArrayBound::extent(2), ArrayBound::extent(3)];

        let mut rows = ArrayBindings::new(ArrayOrder::RowMajor);
        rows.define(&pdv, "m", VarType::Num, &bounds, &members).unwrap();
        assert_eq!(rows.at("m", &[2, 1]).unwrap(), pdv.slot_of("m21").unwrap());
        assert_eq!(rows.at("m", &[1, 3]).unwrap(), pdv.slot_of("m13").unwrap());

        let mut cols = ArrayBindings::new(ArrayOrder::ColumnMajor);
        cols.define(&pdv, "m", VarType::Num, &bounds, &members).unwrap();
        // First subscript varies fastest
        assert_eq!(cols.at("m", &[2, 1]).unwrap(), pdv.slot_of("m12").unwrap());
        assert_eq!(cols.at("m", &[1, 2]).unwrap(), pdv.slot_of("m13").unwrap());
    }

    #[test]
    fn test_custom_lower_bound() {
        let pdv = pdv_with(&["y2020", "y2021"]);
        let mut arrays = ArrayBindings::new(ArrayOrder::RowMajor);
        arrays
            .define(
                &pdv,
                "yr",
                VarType::Num,
                &[ArrayBound::Range {
                    lower: 2020,
                    upper: 2021,
                }],
                &names(&["y2020", "y2021"]),
            )
            .unwrap();
        assert_eq!(arrays.at("yr", &[2021]).unwrap(), pdv.slot_of("y2021").unwrap());
        let def = arrays.get("yr").unwrap();
        assert_eq!(def.dim(1), Some(2));
        assert_eq!(def.lbound(1), Some(2020));
        assert_eq!(def.hbound(1), Some(2021));
        assert_eq!(def.dim(2), None);
    }
}
