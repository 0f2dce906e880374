//! # Incremental Elimination
//!
//! The decoder's coefficient matrix, kept in reduced row echelon form one
//! equation at a time.
//!
//! Rows are dense and stored relative to their pivot: a row pivoted on source
//! id `p` holds the coefficients for ids `p, p+1, ...` with `coeffs[0] == 1`.
//! Slot `i` of the row table belongs to id `base + i`, so pivots are ordered
//! by leading index by construction and looking up the pivot for an id is a
//! single index.
//!
//! Each insertion:
//!
//! 1. forward-reduces the incoming row against every pivot it touches,
//! 2. normalises it so its leading coefficient is 1,
//! 3. back-substitutes it into every earlier row that references its pivot
//!    column.
//!
//! Afterwards every pivot column is zero in every other row, so the row at
//! `base` is a unit vector exactly when its symbol is fully determined.

use std::collections::VecDeque;

use crate::error::Result;
use crate::field::GaloisField;

#[derive(Debug)]
struct PivotRow {
    coeffs: Vec<u8>,
    symbol: Vec<u8>,
}

impl PivotRow {
    fn coefficient(&self, offset: usize) -> u8 {
        self.coeffs.get(offset).copied().unwrap_or(0)
    }

    fn is_unit(&self) -> bool {
        self.coeffs[1..].iter().all(|&c| c == 0)
    }
}

#[derive(Debug, Default)]
pub struct EliminationMatrix {
    /// Source id of slot 0, the oldest unresolved id.
    base: u64,
    rows: VecDeque<Option<PivotRow>>,
    dof: usize,
}

impl EliminationMatrix {
    pub fn new(base: u64) -> Self {
        EliminationMatrix {
            base,
            rows: VecDeque::new(),
            dof: 0,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Independent equations held.
    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn has_pivot(&self, id: u64) -> bool {
        id >= self.base && matches!(self.rows.get((id - self.base) as usize), Some(Some(_)))
    }

    /// Drop every row and restart at `base`.
    pub fn reset(&mut self, base: u64) {
        self.rows.clear();
        self.base = base;
        self.dof = 0;
    }

    /// Fold the equation `sum(coeffs[j] * x[start + j]) = symbol` into the
    /// matrix. Returns `false` when it reduces to zero, leaving the matrix
    /// untouched.
    ///
    /// `start` must not be below `base`; callers cancel resolved ids first.
    pub fn insert(
        &mut self,
        field: &GaloisField,
        start: u64,
        mut coeffs: Vec<u8>,
        mut symbol: Vec<u8>,
    ) -> Result<bool> {
        debug_assert!(start >= self.base, "row starts below the matrix base");
        let origin = (start - self.base) as usize;

        // Forward reduction. Pivot rows are zero at every other pivot column,
        // so one left-to-right pass clears all of them.
        let mut j = 0;
        while j < coeffs.len() {
            let c = coeffs[j];
            if c != 0 {
                if let Some(Some(pivot)) = self.rows.get(origin + j) {
                    let span = j + pivot.coeffs.len();
                    if coeffs.len() < span {
                        coeffs.resize(span, 0);
                    }
                    field.mul_add_elements(&mut coeffs[j..], &pivot.coeffs, c);
                    field.mul_add_region(&mut symbol, &pivot.symbol, c);
                }
            }
            j += 1;
        }

        let Some(lead) = coeffs.iter().position(|&c| c != 0) else {
            return Ok(false);
        };
        coeffs.drain(..lead);
        while coeffs.last() == Some(&0) {
            coeffs.pop();
        }
        let inv = field.inv(coeffs[0]);
        field.mul_elements(&mut coeffs, inv);
        field.mul_region(&mut symbol, inv);

        // Back-substitution. Only rows pivoted before the new one can reach
        // its column.
        let slot = origin + lead;
        for (k, row) in self.rows.iter_mut().take(slot).enumerate() {
            let Some(row) = row else { continue };
            let rel = slot - k;
            let c = row.coefficient(rel);
            if c == 0 {
                continue;
            }
            let span = rel + coeffs.len();
            if row.coeffs.len() < span {
                row.coeffs.resize(span, 0);
            }
            field.mul_add_elements(&mut row.coeffs[rel..], &coeffs, c);
            field.mul_add_region(&mut row.symbol, &symbol, c);
        }

        if self.rows.len() <= slot {
            self.rows.try_reserve(slot + 1 - self.rows.len())?;
            self.rows.resize_with(slot + 1, || None);
        }
        debug_assert!(self.rows[slot].is_none(), "pivot column already taken");
        self.rows[slot] = Some(PivotRow { coeffs, symbol });
        self.dof += 1;
        Ok(true)
    }

    /// Pop the symbol at `base` if its row has become a unit vector, advancing
    /// `base` by one.
    pub fn pop_resolved(&mut self) -> Option<Vec<u8>> {
        match self.rows.front() {
            Some(Some(row)) if row.is_unit() => {}
            _ => return None,
        }
        let row = self.rows.pop_front().flatten()?;
        self.base += 1;
        self.dof -= 1;
        Some(row.symbol)
    }
}
