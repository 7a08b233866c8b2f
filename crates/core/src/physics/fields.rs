//! Solved field arrays
//!
//! A `Fields` value holds one column per frequency, time or DC source and one
//! row per cell, node, edge or face. Storage is an `nalgebra::DMatrix`, which
//! is column-major and therefore maps directly onto a Fortran-ordered NPY
//! array.

use super::{Formulation, PhysicsError};
use crate::io::npy::{self, NpyError};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::Serialize;
use std::path::Path;

/// Where on the mesh the rows of a field array live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLocation {
    CellCenters,
    Nodes,
    Edges,
    Faces,
}

/// What the columns of a field array stand for
#[derive(Debug, Clone, PartialEq)]
pub enum FieldColumns {
    /// One column per frequency (Hz)
    Frequencies(Vec<f64>),
    /// One column per time (s), starting with t = 0
    Times(Vec<f64>),
    /// A single static column
    Static,
}

impl FieldColumns {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            FieldColumns::Frequencies(v) | FieldColumns::Times(v) => v.len(),
            FieldColumns::Static => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Real or complex field values
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    Real(DMatrix<f64>),
    Complex(DMatrix<Complex<f64>>),
}

impl FieldValues {
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            FieldValues::Real(m) => m.shape(),
            FieldValues::Complex(m) => m.shape(),
        }
    }
}

/// Solution of a forward problem
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    formulation: Formulation,
    location: FieldLocation,
    columns: FieldColumns,
    values: FieldValues,
}

impl Fields {
    /// Wrap solved values
    ///
    /// # Errors
    /// Returns error if the number of value columns differs from `columns`
    pub fn new(
        formulation: Formulation,
        location: FieldLocation,
        columns: FieldColumns,
        values: FieldValues,
    ) -> Result<Self, PhysicsError> {
        let (_, n_values) = values.shape();
        if n_values != columns.len() {
            return Err(PhysicsError::ColumnMismatch {
                values: n_values,
                labels: columns.len(),
            });
        }
        Ok(Self {
            formulation,
            location,
            columns,
            values,
        })
    }

    #[must_use]
    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    #[must_use]
    pub fn location(&self) -> FieldLocation {
        self.location
    }

    #[must_use]
    pub fn columns(&self) -> &FieldColumns {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Key the solution is known by, e.g. `"hSolution"`
    #[must_use]
    pub fn solution_key(&self) -> String {
        format!("{}Solution", self.formulation)
    }

    /// Real values, if the fields are real
    #[must_use]
    pub fn real(&self) -> Option<&DMatrix<f64>> {
        match &self.values {
            FieldValues::Real(m) => Some(m),
            FieldValues::Complex(_) => None,
        }
    }

    /// Complex values, if the fields are complex
    #[must_use]
    pub fn complex(&self) -> Option<&DMatrix<Complex<f64>>> {
        match &self.values {
            FieldValues::Complex(m) => Some(m),
            FieldValues::Real(_) => None,
        }
    }

    /// Largest magnitude in the array
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        match &self.values {
            FieldValues::Real(m) => m.iter().fold(0.0, |acc, v| acc.max(v.abs())),
            FieldValues::Complex(m) => m.iter().fold(0.0, |acc, v| acc.max(v.norm())),
        }
    }

    /// Write the solution array as a 2-D NPY file
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_npy(&self, path: &Path) -> Result<(), NpyError> {
        let (rows, cols) = self.shape();
        match &self.values {
            FieldValues::Real(m) => npy::write_f64(path, &[rows, cols], m.as_slice()),
            FieldValues::Complex(m) => npy::write_c128(path, &[rows, cols], m.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::npy::NpyData;

    #[test]
    fn test_solution_key() {
        let fields = Fields::new(
            Formulation::Phi,
            FieldLocation::CellCenters,
            FieldColumns::Static,
            FieldValues::Real(DMatrix::zeros(4, 1)),
        )
        .unwrap();
        assert_eq!(fields.solution_key(), "phiSolution");
        assert_eq!(fields.shape(), (4, 1));
        assert!(fields.complex().is_none());
    }

    #[test]
    fn test_column_count_must_match() {
        let result = Fields::new(
            Formulation::E,
            FieldLocation::Edges,
            FieldColumns::Frequencies(vec![1.0, 2.0]),
            FieldValues::Real(DMatrix::zeros(3, 1)),
        );
        assert!(matches!(
            result,
            Err(PhysicsError::ColumnMismatch {
                values: 1,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_write_npy_column_major() {
        let values = DMatrix::from_fn(3, 2, |i, j| Complex::new(i as f64, j as f64));
        let fields = Fields::new(
            Formulation::H,
            FieldLocation::Faces,
            FieldColumns::Frequencies(vec![1.0, 2.0]),
            FieldValues::Complex(values.clone()),
        )
        .unwrap();
        let path = std::env::temp_dir().join(format!("casing-sim-fields-{}.npy", std::process::id()));
        fields.write_npy(&path).unwrap();

        let array = npy::read(&path).unwrap();
        assert_eq!(array.shape, vec![3, 2]);
        assert!(array.fortran_order);
        assert_eq!(array.data, NpyData::Complex128(values.as_slice().to_vec()));
        let _ = std::fs::remove_file(&path);
    }
}
