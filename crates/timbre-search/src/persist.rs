//! On-disk index format.
//!
//! An index is stored as a zlib-compressed little-endian blob:
//!
//! ```text
//! magic "TIMBRIDX" | version u16 | kind u8 | dimension u32 | count u64
//! vectors: count * dimension f32
//! IVFFlat only: nlist u32 | nprobe u32 | iterations u32
//!               centroids: nlist * dimension f32 | assignments: count u32
//! ```
//!
//! Values are stored bit-exactly, so a reloaded index returns the same
//! neighbors and distances as the index that was saved.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{SearchError, SearchResult};
use crate::flat::FlatIndex;
use crate::index::{IvfParams, Metric, VectorIndex};
use crate::ivf::IvfIndex;

const MAGIC: &[u8; 8] = b"TIMBRIDX";
const VERSION: u16 = 1;

const KIND_FLAT_L2: u8 = 0;
const KIND_IVF_FLAT: u8 = 1;
const KIND_COSINE: u8 = 2;

/// Write `index` to `path`.
///
/// The blob is written to a sibling temporary file and renamed into place,
/// so readers never observe a partially written index.
pub fn save_index(index: &VectorIndex, path: &Path) -> SearchResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let payload = encode(index);
    let tmp_path = temporary_path(path);
    {
        let file = File::create(&tmp_path)?;
        let mut encoder = ZlibEncoder::new(BufWriter::new(file), flate2::Compression::default());
        encoder.write_all(&payload)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    log::info!("Index saved to {}", path.display());
    Ok(())
}

/// Read an index previously written by [`save_index`].
pub fn load_index(path: &Path) -> SearchResult<VectorIndex> {
    let file = File::open(path)?;
    let mut payload = Vec::new();
    ZlibDecoder::new(file)
        .read_to_end(&mut payload)
        .map_err(|e| SearchError::Corrupt(format!("failed to decompress: {e}")))?;
    decode(&payload)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode(index: &VectorIndex) -> Vec<u8> {
    let (kind, data) = match index {
        VectorIndex::FlatL2(flat) => (KIND_FLAT_L2, flat.data()),
        VectorIndex::Cosine(flat) => (KIND_COSINE, flat.data()),
        VectorIndex::IvfFlat(ivf) => (KIND_IVF_FLAT, ivf.data()),
    };

    let mut out = Vec::with_capacity(MAGIC.len() + 16 + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(kind);
    out.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    put_f32s(&mut out, data);

    if let VectorIndex::IvfFlat(ivf) = index {
        let params = ivf.params();
        out.extend_from_slice(&(params.nlist as u32).to_le_bytes());
        out.extend_from_slice(&(params.nprobe as u32).to_le_bytes());
        out.extend_from_slice(&(params.iterations as u32).to_le_bytes());
        put_f32s(&mut out, ivf.centroids());
        for &list in ivf.assignments() {
            out.extend_from_slice(&list.to_le_bytes());
        }
    }
    out
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for &v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn decode(payload: &[u8]) -> SearchResult<VectorIndex> {
    let mut reader = Reader::new(payload);

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(SearchError::Corrupt("not a timbre index file".to_string()));
    }
    let version = reader.u16()?;
    if version != VERSION {
        return Err(SearchError::Corrupt(format!(
            "unsupported index version {version}"
        )));
    }
    let kind = reader.u8()?;
    let dimension = reader.u32()? as usize;
    let count = usize::try_from(reader.u64()?)
        .map_err(|_| SearchError::Corrupt("vector count overflows".to_string()))?;
    if dimension == 0 {
        return Err(SearchError::Corrupt("dimension is 0".to_string()));
    }
    let values = count
        .checked_mul(dimension)
        .ok_or_else(|| SearchError::Corrupt("vector data size overflows".to_string()))?;
    let data = reader.f32s(values)?;

    let index = match kind {
        KIND_FLAT_L2 => VectorIndex::FlatL2(FlatIndex::from_parts(Metric::L2, dimension, data)?),
        KIND_COSINE => {
            VectorIndex::Cosine(FlatIndex::from_parts(Metric::InnerProduct, dimension, data)?)
        }
        KIND_IVF_FLAT => {
            let params = IvfParams {
                nlist: reader.u32()? as usize,
                nprobe: reader.u32()? as usize,
                iterations: reader.u32()? as usize,
            };
            let centroid_values = params
                .nlist
                .checked_mul(dimension)
                .ok_or_else(|| SearchError::Corrupt("centroid size overflows".to_string()))?;
            let centroids = reader.f32s(centroid_values)?;
            let assignments = reader.u32s(count)?;
            VectorIndex::IvfFlat(IvfIndex::from_parts(
                dimension,
                params,
                centroids,
                assignments,
                data,
            )?)
        }
        other => {
            return Err(SearchError::Corrupt(format!("unknown index kind {other}")));
        }
    };

    if !reader.is_at_end() {
        return Err(SearchError::Corrupt("trailing bytes after index".to_string()));
    }
    Ok(index)
}

/// Bounds-checked little-endian reader over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, n: usize) -> SearchResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| SearchError::Corrupt("unexpected end of index data".to_string()))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> SearchResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> SearchResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> SearchResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> SearchResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> SearchResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32s(&mut self, n: usize) -> SearchResult<Vec<f32>> {
        let bytes = self.take(
            n.checked_mul(4)
                .ok_or_else(|| SearchError::Corrupt("value count overflows".to_string()))?,
        )?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn u32s(&mut self, n: usize) -> SearchResult<Vec<u32>> {
        let bytes = self.take(
            n.checked_mul(4)
                .ok_or_else(|| SearchError::Corrupt("value count overflows".to_string()))?,
        )?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
