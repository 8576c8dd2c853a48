//! Width records collected over an optimization run.
//!
//! Each row is a full-length width record of a mesh (zero for pruned beams).
//! On disk a history is the magic `WHST`, the column and row counts as
//! little-endian `u32`, then every value as a little-endian `f64`, row by row.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use ndarray::{Array2, ArrayView1, Axis};

use crate::errors::HistoryError;
use crate::mesh::Mesh;

/// Leading bytes of a history file.
const MAGIC: &[u8; 4] = b"WHST";

/// Rows of beam widths with a fixed column count.
#[derive(Clone, Debug, PartialEq)]
pub struct WidthHistory {
    /// One row per recorded width vector.
    rows: Array2<f64>,
}

impl WidthHistory {
    /// Empty history for meshes with `columns` beams.
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self {
            rows: Array2::zeros((0, columns)),
        }
    }

    /// Number of values per row.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.rows.ncols()
    }

    /// Number of recorded rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows as a matrix.
    #[must_use]
    pub fn rows(&self) -> &Array2<f64> {
        &self.rows
    }

    /// One recorded row.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.len()).then(|| self.rows.index_axis(Axis(0), index))
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::ColumnMismatch`] when `row` has the wrong length.
    pub fn push_row(&mut self, row: &[f64]) -> Result<(), HistoryError> {
        let mismatch = HistoryError::ColumnMismatch {
            expected: self.columns(),
            found: row.len(),
        };
        if row.len() != self.columns() {
            return Err(mismatch);
        }
        self.rows
            .push_row(ArrayView1::from(row))
            .map_err(|_| mismatch)
    }

    /// Append the current width record of `mesh`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::ColumnMismatch`] when the mesh has a different
    /// beam count.
    pub fn record(&mut self, mesh: &Mesh) -> Result<(), HistoryError> {
        self.push_row(&mesh.width_record())
    }

    /// Encode the history.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Io`] when writing fails or a dimension does not
    /// fit in 32 bits.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), HistoryError> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(dimension(self.columns())?)?;
        writer.write_u32::<LittleEndian>(dimension(self.len())?)?;
        for &value in &self.rows {
            writer.write_f64::<LittleEndian>(value)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Decode a history written by [`WidthHistory::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::BadMagic`] for foreign data and
    /// [`HistoryError::Io`] for truncated input.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, HistoryError> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HistoryError::BadMagic);
        }
        let columns = reader.read_u32::<LittleEndian>()? as usize;
        let rows = reader.read_u32::<LittleEndian>()? as usize;

        let mut values = Vec::with_capacity(rows.saturating_mul(columns).min(1 << 20));
        for _ in 0..rows * columns {
            values.push(reader.read_f64::<LittleEndian>()?);
        }
        let rows = Array2::from_shape_vec((rows, columns), values)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        Ok(Self { rows })
    }

    /// Read a history file.
    ///
    /// # Errors
    ///
    /// See [`WidthHistory::read_from`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// Write a history file, replacing any existing one.
    ///
    /// # Errors
    ///
    /// See [`WidthHistory::write_to`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// Append one row to the history file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::ColumnMismatch`] when the file holds rows of a
    /// different length, and the errors of [`WidthHistory::load`] and
    /// [`WidthHistory::save`].
    pub fn append_to_file(path: impl AsRef<Path>, row: &[f64]) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        let mut history = if path.exists() {
            Self::load(path)?
        } else {
            Self::new(row.len())
        };
        history.push_row(row)?;
        history.save(path)?;
        debug!("{} now holds {} width records", path.display(), history.len());
        Ok(history)
    }
}

/// Narrow a dimension to the on-disk width.
fn dimension(value: usize) -> Result<u32, HistoryError> {
    u32::try_from(value).map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error).into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::generator::{Bracing, GridSpec};
    use crate::settings::MeshSettings;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("trussmesh-{name}-{}.whst", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn layout_is_magic_dimensions_then_values() {
        let mut history = WidthHistory::new(2);
        history.push_row(&[1.0, 0.0]).expect("two columns");
        let mut bytes = Vec::new();
        history.write_to(&mut bytes).expect("in memory");

        assert_eq!(&bytes[..4], b"WHST");
        assert_eq!(bytes[4..8], 2u32.to_le_bytes());
        assert_eq!(bytes[8..12], 1u32.to_le_bytes());
        assert_eq!(bytes[12..20], 1.0f64.to_le_bytes());
        assert_eq!(bytes.len(), 12 + 2 * 8);
    }

    #[test]
    fn decoding_restores_rows_in_order() {
        let mut history = WidthHistory::new(3);
        history.push_row(&[0.1, 0.2, 0.3]).expect("three columns");
        history.push_row(&[0.0, 0.5, 1.5]).expect("three columns");
        let mut bytes = Vec::new();
        history.write_to(&mut bytes).expect("in memory");

        let decoded = WidthHistory::read_from(bytes.as_slice()).expect("valid bytes");
        assert_eq!(decoded, history);
        assert_eq!(
            decoded.row(1).expect("second row").to_vec(),
            vec![0.0, 0.5, 1.5]
        );
        assert!(decoded.row(2).is_none());
    }

    #[test]
    fn foreign_or_truncated_data_is_rejected() {
        assert!(matches!(
            WidthHistory::read_from(&b"PLY\0\0\0\0\0"[..]),
            Err(HistoryError::BadMagic)
        ));
        let mut bytes = b"WHST".to_vec();
        bytes.extend(2u32.to_le_bytes());
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(1.0f64.to_le_bytes());
        assert!(matches!(
            WidthHistory::read_from(bytes.as_slice()),
            Err(HistoryError::Io(_))
        ));
    }

    #[test]
    fn rows_must_match_the_column_count() {
        let mut history = WidthHistory::new(2);
        assert!(matches!(
            history.push_row(&[1.0]),
            Err(HistoryError::ColumnMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn mesh_records_zero_pruned_beams() {
        let mut mesh = GridSpec::new(2.0, 1.0, (2, 1), Bracing::None)
            .build(MeshSettings::default())
            .expect("valid grid");
        mesh.make_boundary((1.0, 0.0), 1, true).expect("node exists");
        mesh.make_boundary((2.0, 0.0), 2, true).expect("node exists");
        mesh.set_width_array(vec![0.01, 0.02, 0.4, 0.5, 0.6, 0.03, 0.7])
            .expect("feasible");

        let mut history = WidthHistory::new(mesh.beam_count());
        history.record(&mesh).expect("matching beam count");
        assert_eq!(
            history.row(0).expect("recorded").to_vec(),
            vec![0.0, 0.0, 0.4, 0.5, 0.6, 0.0, 0.7]
        );
    }

    #[test]
    fn appending_grows_the_file() {
        let path = scratch_file("append");
        WidthHistory::append_to_file(&path, &[1.0, 2.0]).expect("created");
        let history = WidthHistory::append_to_file(&path, &[3.0, 4.0]).expect("appended");
        assert_eq!(history.len(), 2);
        assert_eq!(WidthHistory::load(&path).expect("readable"), history);

        assert!(matches!(
            WidthHistory::append_to_file(&path, &[1.0]),
            Err(HistoryError::ColumnMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert_eq!(WidthHistory::load(&path).expect("unchanged").len(), 2);
        std::fs::remove_file(path).expect("cleanup");
    }
}
