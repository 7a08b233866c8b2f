//! NumPy `.npy` array files
//!
//! Solved field arrays are written in the NPY 1.0 format so they can be opened
//! directly with `numpy.load`. Arrays are stored in Fortran (column-major)
//! order, which is how `nalgebra::DMatrix` lays out its data, so no transpose
//! is needed on write.
//!
//! Format: magic `\x93NUMPY`, version bytes, little-endian header length,
//! a Python dict literal header padded with spaces to a 64-byte boundary and
//! terminated by `\n`, followed by the raw element bytes.

use num_complex::Complex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Errors produced while reading or writing NPY files
#[derive(Debug, Error)]
pub enum NpyError {
    /// Underlying I/O failure
    #[error("npy i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not a supported NPY array
    #[error("invalid npy file: {0}")]
    Format(String),
    /// Element count does not match the declared shape
    #[error("npy shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Declared shape
        shape: Vec<usize>,
        /// Product of the shape
        expected: usize,
        /// Elements supplied
        actual: usize,
    },
}

/// Element storage of an NPY array
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    /// `<f8`
    Float64(Vec<f64>),
    /// `<c16`
    Complex128(Vec<Complex<f64>>),
}

impl NpyData {
    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            NpyData::Float64(v) => v.len(),
            NpyData::Complex128(v) => v.len(),
        }
    }

    /// True when the array holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An array read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    /// Array shape
    pub shape: Vec<usize>,
    /// Column-major storage flag from the header
    pub fortran_order: bool,
    /// Element data in file order
    pub data: NpyData,
}

fn descr(kind: char, size: usize) -> String {
    let endian = if cfg!(target_endian = "little") { '<' } else { '>' };
    format!("{endian}{kind}{size}")
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        _ => {
            let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
            format!("({})", dims.join(", "))
        }
    }
}

fn header_bytes(descr: &str, shape: &[usize]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{descr}', 'fortran_order': True, 'shape': {}, }}",
        shape_literal(shape)
    );
    // magic + version + u16 length + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out
}

fn check_shape(shape: &[usize], actual: usize) -> Result<(), NpyError> {
    let expected: usize = shape.iter().product();
    if expected == actual {
        Ok(())
    } else {
        Err(NpyError::ShapeMismatch {
            shape: shape.to_vec(),
            expected,
            actual,
        })
    }
}

fn write_raw(path: &Path, descr: &str, shape: &[usize], bytes: &[u8]) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&header_bytes(descr, shape))?;
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write a real array in column-major order
///
/// # Errors
/// Returns error if the element count does not match `shape` or the file
/// cannot be written
pub fn write_f64(path: &Path, shape: &[usize], data: &[f64]) -> Result<(), NpyError> {
    check_shape(shape, data.len())?;
    write_raw(path, &descr('f', 8), shape, bytemuck::cast_slice(data))
}

/// Write a complex array in column-major order
///
/// # Errors
/// Returns error if the element count does not match `shape` or the file
/// cannot be written
pub fn write_c128(path: &Path, shape: &[usize], data: &[Complex<f64>]) -> Result<(), NpyError> {
    check_shape(shape, data.len())?;
    write_raw(path, &descr('c', 16), shape, bytemuck::cast_slice(data))
}

fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{key}':");
    let start = header
        .find(&needle)
        .ok_or_else(|| NpyError::Format(format!("header has no '{key}' entry")))?
        + needle.len();
    Ok(header[start..].trim_start())
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let rest = header_value(header, "shape")?;
    let open = rest
        .strip_prefix('(')
        .ok_or_else(|| NpyError::Format("shape is not a tuple".into()))?;
    let close = open
        .find(')')
        .ok_or_else(|| NpyError::Format("unterminated shape tuple".into()))?;
    open[..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| NpyError::Format(format!("bad shape entry '{s}': {e}")))
        })
        .collect()
}

/// Read an array written by [`write_f64`] or [`write_c128`]
///
/// Only little-endian `f8` and `c16` arrays are supported.
///
/// # Errors
/// Returns error if the file is unreadable or not a supported NPY array
pub fn read(path: &Path) -> Result<NpyArray, NpyError> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut preamble = [0u8; 8];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(NpyError::Format("missing NUMPY magic".into()));
    }

    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            usize::from(u16::from_le_bytes(len))
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => return Err(NpyError::Format(format!("unsupported version {v}"))),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header).map_err(|e| NpyError::Format(e.to_string()))?;

    let descr_value = header_value(&header, "descr")?;
    let fortran_order = header_value(&header, "fortran_order")?.starts_with("True");
    let shape = parse_shape(&header)?;

    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;

    let data = if descr_value.starts_with("'<f8'") {
        NpyData::Float64(
            body.chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        )
    } else if descr_value.starts_with("'<c16'") {
        NpyData::Complex128(
            body.chunks_exact(16)
                .map(|c| {
                    let re = f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
                    let im =
                        f64::from_le_bytes([c[8], c[9], c[10], c[11], c[12], c[13], c[14], c[15]]);
                    Complex::new(re, im)
                })
                .collect(),
        )
    } else {
        return Err(NpyError::Format(format!("unsupported dtype {descr_value}")));
    };

    check_shape(&shape, data.len())?;

    Ok(NpyArray {
        shape,
        fortran_order,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("casing-sim-npy-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_header_is_aligned() {
        for shape in [vec![3], vec![10, 4], vec![123_456, 70]] {
            let header = header_bytes("<f8", &shape);
            assert_eq!(header.len() % ALIGNMENT, 0);
            assert_eq!(*header.last().unwrap(), b'\n');
        }
    }

    #[test]
    fn test_shape_literal() {
        assert_eq!(shape_literal(&[5]), "(5,)");
        assert_eq!(shape_literal(&[5, 2]), "(5, 2)");
    }

    #[test]
    fn test_write_then_read_complex() {
        let path = scratch("complex.npy");
        let data = vec![Complex::new(1.0, -2.0), Complex::new(0.5, 3.25)];
        write_c128(&path, &[2, 1], &data).unwrap();

        let array = read(&path).unwrap();
        assert_eq!(array.shape, vec![2, 1]);
        assert!(array.fortran_order);
        assert_eq!(array.data, NpyData::Complex128(data));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let path = scratch("mismatch.npy");
        let err = write_f64(&path, &[2, 2], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, NpyError::ShapeMismatch { expected: 4, actual: 3, .. }));
        assert!(!path.exists());
    }
}
