//! Exact nearest-neighbor vector index
//!
//! One `FlatIndex` per property, stored as a single binary file:
//!
//! ```text
//! magic "LISX" | version u16 | dimension u32 | count u64 | count x (id i64, dimension x f32)
//! ```
//!
//! All integers and floats are little-endian.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 4] = b"LISX";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Chunk row id stored with the vector
    pub id: i64,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// Brute-force index over f32 vectors using squared L2 distance
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    ids: Vec<i64>,
    /// Row-major, `ids.len() * dimension` values
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append a vector for the chunk `id`
    pub fn add(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::Index(format!("Vector for id {} has non-finite values", id)));
        }
        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// The `k` nearest vectors, closest first; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension.max(1))
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();

        // Stable sort preserves insertion order among equal distances
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, distance)| Neighbor {
                id: self.ids[pos],
                distance,
            })
            .collect())
    }

    /// Serialize to the on-disk format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer =
            Vec::with_capacity(HEADER_LEN + self.ids.len() * (8 + self.dimension * 4));

        buffer.extend_from_slice(MAGIC);
        buffer.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buffer.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());

        for (id, vector) in self.ids.iter().zip(self.vectors.chunks_exact(self.dimension.max(1))) {
            buffer.extend_from_slice(&id.to_le_bytes());
            for value in vector {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        buffer
    }

    /// Parse the on-disk format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        if reader.take(4)? != MAGIC {
            return Err(Error::Index("Not a lise index file (bad magic)".to_string()));
        }

        let version = u16::from_le_bytes(reader.array()?);
        if version != FORMAT_VERSION {
            return Err(Error::Index(format!("Unsupported index format version {}", version)));
        }

        let dimension = u32::from_le_bytes(reader.array()?) as usize;
        let count = u64::from_le_bytes(reader.array()?);
        let count = usize::try_from(count)
            .map_err(|_| Error::Index(format!("Index record count too large: {}", count)))?;

        let record_len = 8 + dimension * 4;
        if reader.remaining() != count.saturating_mul(record_len) {
            return Err(Error::Index(format!(
                "Index file size does not match {} records of dimension {}",
                count, dimension
            )));
        }

        let mut index = FlatIndex::new(dimension);
        index.ids.reserve(count);
        index.vectors.reserve(count * dimension);

        for _ in 0..count {
            index.ids.push(i64::from_le_bytes(reader.array()?));
            for _ in 0..dimension {
                index.vectors.push(f32::from_le_bytes(reader.array()?));
            }
        }

        Ok(index)
    }

    /// Write the index atomically (temp file, then rename)
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        tokio::fs::write(&tmp, self.to_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Wrote {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Load an index file
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::IndexNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_bytes(&bytes)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Index("Unexpected end of index file".to_string()));
        }
        let slice = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        index.add(10, &[0.0, 0.0]).unwrap();
        index.add(20, &[1.0, 0.0]).unwrap();
        index.add(30, &[0.0, 3.0]).unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample();
        let hits = index.search(&[0.9, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 20);
        assert_eq!(hits[1].id, 10);
        assert!((hits[0].distance - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_search_edge_cases() {
        let index = sample();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
        assert!(FlatIndex::new(2).search(&[0.0, 0.0], 3).unwrap().is_empty());
        assert!(matches!(
            index.search(&[0.0], 1),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(1);
        index.add(5, &[1.0]).unwrap();
        index.add(3, &[-1.0]).unwrap();
        index.add(4, &[1.0]).unwrap();

        let ids: Vec<_> = index.search(&[0.0], 3).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![5, 3, 4]);
    }

    #[test]
    fn test_add_rejects_bad_vectors() {
        let mut index = FlatIndex::new(2);
        assert!(index.add(1, &[1.0]).is_err());
        assert!(index.add(1, &[f32::NAN, 0.0]).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_bytes_roundtrip_and_corruption() {
        let index = sample();
        let bytes = index.to_bytes();
        assert_eq!(&bytes[..4], b"LISX");
        assert_eq!(FlatIndex::from_bytes(&bytes).unwrap(), index);

        assert!(FlatIndex::from_bytes(&bytes[..bytes.len() - 1]).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(FlatIndex::from_bytes(&trailing).is_err());

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(FlatIndex::from_bytes(&bad_magic).is_err());

        let mut bad_version = bytes;
        bad_version[4] = 9;
        assert!(FlatIndex::from_bytes(&bad_version).is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("indexes").join("1.index");

        assert!(matches!(
            FlatIndex::load(&path).await,
            Err(Error::IndexNotFound(_))
        ));

        let index = sample();
        index.save(&path).await.unwrap();
        assert!(!tmp.path().join("indexes").join("1.index.tmp").exists());

        let loaded = FlatIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.search(&[0.0, 2.9], 1).unwrap()[0].id, 30);
    }
}
