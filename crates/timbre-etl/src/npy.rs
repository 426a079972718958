//! Minimal NumPy `.npy` support for embedding files.
//!
//! Reads numeric arrays (`f2`/`f4`/`f8`, signed and unsigned integers of 1
//! to 8 bytes, either byte order, C or Fortran layout) and returns them
//! flattened in C order as `f32`. Writes 1-D little-endian `f4` arrays in
//! format version 1.0.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{PipelineError, PipelineResult};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header alignment used by NumPy when writing.
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Float,
    Int,
    UInt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    endian: Endian,
    kind: Kind,
    /// Element size in bytes.
    width: usize,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl Header {
    fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

static DESCR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'descr'\s*:\s*'([<>|=]?)([a-zA-Z])(\d+)'").expect("valid descr regex")
});
static FORTRAN_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("valid fortran_order regex")
});
static SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("valid shape regex"));

/// A decoded array: its shape and its values in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl NpyArray {
    /// Split a 0-, 1- or 2-D array into rows. Higher ranks give `None`.
    pub fn into_rows(self) -> Option<Vec<Vec<f32>>> {
        match *self.shape.as_slice() {
            [] | [_] => Some(vec![self.values]),
            [rows, 0] => Some(vec![Vec::new(); rows]),
            [_, cols] => Some(self.values.chunks(cols).map(<[f32]>::to_vec).collect()),
            _ => None,
        }
    }
}

/// Read an `.npy` file as a flat `f32` vector.
pub fn read_f32(path: &Path) -> PipelineResult<Vec<f32>> {
    read_array(path).map(|array| array.values)
}

/// Read an `.npy` file, keeping its shape.
pub fn read_array(path: &Path) -> PipelineResult<NpyArray> {
    let bytes = fs::read(path)?;
    decode(&bytes).map_err(|message| PipelineError::npy(path, message))
}

/// Write `values` as a 1-D little-endian `f4` array.
pub fn write_f32(path: &Path, values: &[f32]) -> PipelineResult<()> {
    fs::write(path, encode(values))?;
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<NpyArray, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing NUMPY magic".to_string());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".to_string());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        other => return Err(format!("unsupported format version {other}")),
    };

    let data_start = header_start + header_len;
    let header_bytes = bytes
        .get(header_start..data_start)
        .ok_or_else(|| "truncated header".to_string())?;
    let header_text =
        std::str::from_utf8(header_bytes).map_err(|_| "header is not valid text".to_string())?;
    let header = parse_header(header_text)?;

    let count = header
        .element_count()
        .ok_or_else(|| "shape overflows".to_string())?;
    let data = &bytes[data_start..];
    let expected = count
        .checked_mul(header.width)
        .ok_or_else(|| "data size overflows".to_string())?;
    if data.len() < expected {
        return Err(format!(
            "expected {expected} data bytes, found {}",
            data.len()
        ));
    }

    let values: Vec<f32> = data[..expected]
        .chunks_exact(header.width)
        .map(|chunk| read_element(chunk, header.kind, header.endian))
        .collect();

    let values = if header.fortran_order && header.shape.len() > 1 {
        fortran_to_c_order(&values, &header.shape)
    } else {
        values
    };
    Ok(NpyArray {
        shape: header.shape,
        values,
    })
}

fn parse_header(text: &str) -> Result<Header, String> {
    let descr = DESCR
        .captures(text)
        .ok_or_else(|| "header has no 'descr'".to_string())?;
    let endian = match &descr[1] {
        ">" => Endian::Big,
        _ => Endian::Little,
    };
    let width: usize = descr[3]
        .parse()
        .map_err(|_| "invalid dtype width".to_string())?;
    let kind = match (&descr[2], width) {
        ("f", 2 | 4 | 8) => Kind::Float,
        ("i", 1 | 2 | 4 | 8) => Kind::Int,
        ("u", 1 | 2 | 4 | 8) => Kind::UInt,
        (code, _) => return Err(format!("unsupported dtype '{code}{width}'")),
    };

    let fortran_order = FORTRAN_ORDER
        .captures(text)
        .map(|c| &c[1] == "True")
        .ok_or_else(|| "header has no 'fortran_order'".to_string())?;

    let shape_text = SHAPE
        .captures(text)
        .ok_or_else(|| "header has no 'shape'".to_string())?;
    let shape = shape_text[1]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("invalid shape entry '{s}'")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header {
        endian,
        kind,
        width,
        fortran_order,
        shape,
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
fn read_element(chunk: &[u8], kind: Kind, endian: Endian) -> f32 {
    let width = chunk.len();
    let mut raw = [0u8; 8];
    match endian {
        Endian::Little => raw[..width].copy_from_slice(chunk),
        Endian::Big => {
            for (dst, src) in raw.iter_mut().zip(chunk.iter().rev()) {
                *dst = *src;
            }
        }
    }
    let bits = u64::from_le_bytes(raw);

    match (kind, width) {
        (Kind::Float, 2) => half::f16::from_bits(bits as u16).to_f32(),
        (Kind::Float, 4) => f32::from_bits(bits as u32),
        (Kind::Float, _) => f64::from_bits(bits) as f32,
        (Kind::UInt, _) => bits as f32,
        (Kind::Int, _) => {
            // Sign-extend from the element width.
            let shift = 64 - 8 * width as u32;
            ((bits << shift) as i64 >> shift) as f32
        }
    }
}

/// Reorder column-major values into row-major order.
fn fortran_to_c_order(values: &[f32], shape: &[usize]) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    let mut index = vec![0usize; shape.len()];
    for value in out.iter_mut() {
        // Column-major offset of the current row-major multi-index.
        let mut offset = 0;
        let mut stride = 1;
        for (axis, &dim) in shape.iter().enumerate() {
            offset += index[axis] * stride;
            stride *= dim;
        }
        *value = values[offset];

        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

fn encode(values: &[f32]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + values.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw_npy(descr: &str, fortran: bool, shape: &str, data: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': '{descr}', 'fortran_order': {}, 'shape': {shape}, }}\n",
            if fortran { "True" } else { "False" }
        );
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("42.npy");
        write_f32(&path, &[0.5, -1.25, 3.0]).unwrap();

        let bytes = fs::read(&path).unwrap();
        let header_len = usize::from(u16::from_le_bytes([bytes[8], bytes[9]]));
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(read_f32(&path).unwrap(), vec![0.5, -1.25, 3.0]);
    }

    #[test]
    fn test_reads_f8_as_f32() {
        let data: Vec<u8> = [1.5f64, 2.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let values = decode(&raw_npy("<f8", false, "(2,)", &data)).unwrap().values;
        assert_eq!(values, vec![1.5, 2.5]);
    }

    #[test]
    fn test_reads_big_endian() {
        let data: Vec<u8> = [1.0f32, -2.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        let array = decode(&raw_npy(">f4", false, "(1, 2)", &data)).unwrap();
        assert_eq!(array.shape, vec![1, 2]);
        assert_eq!(array.values, vec![1.0, -2.0]);
    }

    #[test]
    fn test_fortran_order_is_flattened_row_major() {
        // Logical 2x3 array [[1,2,3],[4,5,6]] stored column-major.
        let data: Vec<u8> = [1.0f32, 4.0, 2.0, 5.0, 3.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let values = decode(&raw_npy("<f4", true, "(2, 3)", &data)).unwrap().values;
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    fn values(descr: &str, data: &[u8]) -> Vec<f32> {
        decode(&raw_npy(descr, false, "(2,)", data)).unwrap().values
    }

    #[test]
    fn test_reads_half_floats() {
        let data: Vec<u8> = [half::f16::from_f32(0.5), half::f16::from_f32(-2.0)]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(values("<f2", &data), vec![0.5, -2.0]);
    }

    #[test]
    fn test_reads_signed_integers() {
        assert_eq!(values("|i1", &[0x05, 0xfe]), vec![5.0, -2.0]);

        let i2: Vec<u8> = [300i16, -7].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(values("<i2", &i2), vec![300.0, -7.0]);

        let i4: Vec<u8> = [7i32, -70_000].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(values(">i4", &i4), vec![7.0, -70_000.0]);

        let i8: Vec<u8> = [-1i64, 1 << 40].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(values("<i8", &i8), vec![-1.0, (1i64 << 40) as f32]);
    }

    #[test]
    fn test_reads_unsigned_integers() {
        assert_eq!(values("|u1", &[0, 255]), vec![0.0, 255.0]);

        let u2: Vec<u8> = [1u16, 65_535].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(values("<u2", &u2), vec![1.0, 65_535.0]);

        let u4: Vec<u8> = [3u32, 4_000_000].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(values(">u4", &u4), vec![3.0, 4_000_000.0]);

        let u8s: Vec<u8> = [2u64, 1 << 33].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(values("<u8", &u8s), vec![2.0, (1u64 << 33) as f32]);
    }

    #[test]
    fn test_rejects_non_numeric_dtype() {
        let err = decode(&raw_npy("<U4", false, "(1,)", &[0; 16])).unwrap_err();
        assert!(err.contains("unsupported dtype"));
        let err = decode(&raw_npy("<f16", false, "(1,)", &[0; 16])).unwrap_err();
        assert!(err.contains("unsupported dtype"));
    }

    #[test]
    fn test_into_rows_by_rank() {
        let matrix = NpyArray {
            shape: vec![2, 2],
            values: vec![1.0, 2.0, 3.0, 4.0],
        };
        assert_eq!(
            matrix.into_rows(),
            Some(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
        );

        let vector = NpyArray {
            shape: vec![3],
            values: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(vector.into_rows(), Some(vec![vec![1.0, 2.0, 3.0]]));

        let cube = NpyArray {
            shape: vec![1, 1, 2],
            values: vec![1.0, 2.0],
        };
        assert_eq!(cube.into_rows(), None);
    }

    #[test]
    fn test_rejects_truncated_data() {
        let err = decode(&raw_npy("<f4", false, "(4,)", &[0; 8])).unwrap_err();
        assert!(err.contains("data bytes"));
    }

    #[test]
    fn test_rejects_non_npy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.npy");
        fs::write(&path, b"plain text").unwrap();
        assert!(matches!(read_f32(&path), Err(PipelineError::Npy { .. })));
    }
}
