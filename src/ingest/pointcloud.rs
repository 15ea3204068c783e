//! Point-set decoders.
//!
//! The decoder is chosen by file extension:
//! - `.pcd`: point cloud container with a text header, `ascii` or `binary` body
//! - `.bin`: flat little-endian f32 records of (x, y, z, intensity)
//!
//! Only x, y and z are kept. Any other extension is `UnsupportedFormat`.

use std::path::Path;

use crate::error::{PatrolError, Result};
use crate::frame::PointSet;

/// Fields per record in the flat `.bin` layout.
const BIN_RECORD_FIELDS: usize = 4;
const BIN_FIELD_BYTES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointSetFormat {
    Pcd,
    FlatBin,
}

impl PointSetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pcd" => Ok(Self::Pcd),
            "bin" => Ok(Self::FlatBin),
            _ => Err(PatrolError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Read and decode one point-set file.
pub fn read_point_set(path: &Path) -> Result<PointSet> {
    let format = PointSetFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|e| PatrolError::io(path, e))?;
    decode_point_set(format, &bytes, path)
}

/// Decode in-memory bytes. `path` is only used for error messages.
pub fn decode_point_set(format: PointSetFormat, bytes: &[u8], path: &Path) -> Result<PointSet> {
    match format {
        PointSetFormat::FlatBin => Ok(decode_flat_bin(bytes)),
        PointSetFormat::Pcd => decode_pcd(bytes, path),
    }
}

fn decode_flat_bin(bytes: &[u8]) -> PointSet {
    bytes
        .chunks_exact(BIN_RECORD_FIELDS * BIN_FIELD_BYTES)
        .map(|record| {
            let field = |i: usize| {
                let start = i * BIN_FIELD_BYTES;
                f32::from_le_bytes([
                    record[start],
                    record[start + 1],
                    record[start + 2],
                    record[start + 3],
                ])
            };
            [field(0), field(1), field(2)]
        })
        .collect()
}

// ----------------------------------------------------------------------------
// PCD
// ----------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum PcdEncoding {
    Ascii,
    Binary,
}

#[derive(Debug)]
struct PcdField {
    name: String,
    size: usize,
    kind: char,
    count: usize,
    /// Column of the first element in an ascii row.
    column: usize,
    /// Byte offset of the first element in a binary record.
    offset: usize,
}

#[derive(Debug)]
struct PcdHeader {
    fields: Vec<PcdField>,
    points: usize,
    /// Bytes per binary record.
    stride: usize,
    encoding: PcdEncoding,
}

impl PcdHeader {
    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

fn decode_pcd(bytes: &[u8], path: &Path) -> Result<PointSet> {
    let (header, body) = parse_pcd_header(bytes, path)?;
    let axes = ["x", "y", "z"].map(|name| header.position(name));
    let [Some(x), Some(y), Some(z)] = axes else {
        return Err(PatrolError::decode(path, "pcd header lacks x/y/z fields"));
    };
    if [x, y, z].iter().any(|&idx| header.fields[idx].count == 0) {
        return Err(PatrolError::decode(path, "pcd x/y/z fields must have COUNT >= 1"));
    }
    match header.encoding {
        PcdEncoding::Ascii => decode_pcd_ascii(&header, [x, y, z], body, path),
        PcdEncoding::Binary => decode_pcd_binary(&header, [x, y, z], body, path),
    }
}

fn parse_pcd_header<'a>(bytes: &'a [u8], path: &Path) -> Result<(PcdHeader, &'a [u8])> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut kinds: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width: Option<usize> = None;
    let mut height: usize = 1;
    let mut points: Option<usize> = None;

    let mut pos = 0;
    while pos < bytes.len() {
        let end = bytes[pos..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|n| pos + n + 1)
            .unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[pos..end]);
        pos = end;

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        let values: Vec<&str> = parts.collect();
        match key.to_ascii_uppercase().as_str() {
            "VERSION" | "VIEWPOINT" => {}
            "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => sizes = parse_list(&values, "SIZE", path)?,
            "TYPE" => {
                kinds = values
                    .iter()
                    .map(|v| v.chars().next().unwrap_or('?').to_ascii_uppercase())
                    .collect()
            }
            "COUNT" => counts = parse_list(&values, "COUNT", path)?,
            "WIDTH" => width = Some(parse_single(&values, "WIDTH", path)?),
            "HEIGHT" => height = parse_single(&values, "HEIGHT", path)?,
            "POINTS" => points = Some(parse_single(&values, "POINTS", path)?),
            "DATA" => {
                let encoding = match values.first().map(|v| v.to_ascii_lowercase()) {
                    Some(v) if v == "ascii" => PcdEncoding::Ascii,
                    Some(v) if v == "binary" => PcdEncoding::Binary,
                    Some(other) => {
                        return Err(PatrolError::UnsupportedFormat {
                            path: path.to_path_buf(),
                            extension: format!("pcd/{}", other),
                        })
                    }
                    None => return Err(PatrolError::decode(path, "pcd DATA line is empty")),
                };
                if counts.is_empty() {
                    counts = vec![1; names.len()];
                }
                if names.is_empty()
                    || sizes.len() != names.len()
                    || kinds.len() != names.len()
                    || counts.len() != names.len()
                {
                    return Err(PatrolError::decode(
                        path,
                        "pcd FIELDS/SIZE/TYPE/COUNT lengths disagree",
                    ));
                }
                let overflow = || PatrolError::decode(path, "pcd field layout overflows");
                let mut fields = Vec::with_capacity(names.len());
                let (mut column, mut offset) = (0usize, 0usize);
                for (name, (size, (kind, count))) in names
                    .drain(..)
                    .zip(sizes.iter().zip(kinds.iter().zip(counts.iter())))
                {
                    fields.push(PcdField {
                        name,
                        size: *size,
                        kind: *kind,
                        count: *count,
                        column,
                        offset,
                    });
                    column = column.checked_add(*count).ok_or_else(overflow)?;
                    let field_bytes = size.checked_mul(*count).ok_or_else(overflow)?;
                    offset = offset.checked_add(field_bytes).ok_or_else(overflow)?;
                }
                let points = match (points, width) {
                    (Some(points), _) => points,
                    (None, Some(w)) => w.checked_mul(height).ok_or_else(|| {
                        PatrolError::decode(path, "pcd WIDTH x HEIGHT overflows")
                    })?,
                    (None, None) => {
                        return Err(PatrolError::decode(path, "pcd header lacks POINTS"))
                    }
                };
                let header = PcdHeader {
                    fields,
                    points,
                    stride: offset,
                    encoding,
                };
                return Ok((header, &bytes[pos..]));
            }
            other => log::debug!("pcd {}: ignoring header key {}", path.display(), other),
        }
    }
    Err(PatrolError::decode(path, "pcd header has no DATA line"))
}

fn parse_list(values: &[&str], key: &str, path: &Path) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| PatrolError::decode(path, format!("invalid {} value '{}'", key, v)))
        })
        .collect()
}

fn parse_single(values: &[&str], key: &str, path: &Path) -> Result<usize> {
    let list = parse_list(values, key, path)?;
    list.first()
        .copied()
        .ok_or_else(|| PatrolError::decode(path, format!("{} has no value", key)))
}

fn decode_pcd_ascii(
    header: &PcdHeader,
    axes: [usize; 3],
    body: &[u8],
    path: &Path,
) -> Result<PointSet> {
    let columns = axes.map(|idx| header.fields[idx].column);
    let text = String::from_utf8_lossy(body);
    // Smallest ascii row is "0 0 0\n".
    let mut points = Vec::with_capacity(header.points.min(body.len() / 6));
    for (row, line) in text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(header.points)
        .enumerate()
    {
        let cells: Vec<&str> = line.split_whitespace().collect();
        let mut point = [0.0f32; 3];
        for (slot, column) in point.iter_mut().zip(columns) {
            let cell = cells.get(column).ok_or_else(|| {
                PatrolError::decode(path, format!("pcd row {} has too few columns", row))
            })?;
            *slot = cell.parse::<f32>().map_err(|_| {
                PatrolError::decode(path, format!("pcd row {}: invalid number '{}'", row, cell))
            })?;
        }
        points.push(point);
    }
    Ok(PointSet::new(points))
}

fn decode_pcd_binary(
    header: &PcdHeader,
    axes: [usize; 3],
    body: &[u8],
    path: &Path,
) -> Result<PointSet> {
    for idx in axes {
        let field = &header.fields[idx];
        if field.kind != 'F' || !(field.size == 4 || field.size == 8) {
            return Err(PatrolError::decode(
                path,
                format!(
                    "pcd field {} must be F4 or F8, found {}{}",
                    field.name, field.kind, field.size
                ),
            ));
        }
    }
    let stride = header.stride;
    if stride == 0 {
        return Err(PatrolError::decode(path, "pcd record stride is zero"));
    }
    let offsets = axes.map(|idx| (header.fields[idx].offset, header.fields[idx].size));
    let points = body
        .chunks_exact(stride)
        .take(header.points)
        .map(|record| offsets.map(|(offset, size)| read_float(&record[offset..offset + size])))
        .collect();
    Ok(points)
}

fn read_float(bytes: &[u8]) -> f32 {
    match bytes.len() {
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            f64::from_le_bytes(buf) as f32
        }
        _ => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[..4]);
            f32::from_le_bytes(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fake_path(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(
            PointSetFormat::from_path(Path::new("a/000001.PCD")).unwrap(),
            PointSetFormat::Pcd
        );
        assert_eq!(
            PointSetFormat::from_path(Path::new("000001.bin")).unwrap(),
            PointSetFormat::FlatBin
        );
        let err = PointSetFormat::from_path(Path::new("000001.ply")).unwrap_err();
        assert!(matches!(
            err,
            PatrolError::UnsupportedFormat { ref extension, .. } if extension == "ply"
        ));
        assert!(PointSetFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn flat_bin_keeps_first_three_fields() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.9] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        // trailing partial record
        bytes.extend_from_slice(&7.0f32.to_le_bytes());
        let set = decode_point_set(PointSetFormat::FlatBin, &bytes, &fake_path("x.bin")).unwrap();
        assert_eq!(set.points(), &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn ascii_pcd_with_extra_fields() {
        let text = "# .PCD v0.7\nVERSION 0.7\nFIELDS intensity x y z\nSIZE 4 4 4 4\n\
                    TYPE F F F F\nCOUNT 1 1 1 1\nWIDTH 2\nHEIGHT 1\n\
                    VIEWPOINT 0 0 0 1 0 0 0\nPOINTS 2\nDATA ascii\n9 1 2 3\n8 4 5 nan\n";
        let set =
            decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("a.pcd")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0], [1.0, 2.0, 3.0]);
        assert!(set.points()[1][2].is_nan());
    }

    #[test]
    fn binary_pcd_reads_records() {
        let mut bytes = b"FIELDS x y z rgb\nSIZE 4 4 4 4\nTYPE F F F U\n\
                          WIDTH 2\nHEIGHT 1\nPOINTS 2\nDATA binary\n"
            .to_vec();
        for (x, y, z) in [(1.0f32, 0.0f32, 0.0f32), (0.0, 2.0, 0.0)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&z.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }
        let set = decode_point_set(PointSetFormat::Pcd, &bytes, &fake_path("b.pcd")).unwrap();
        assert_eq!(set.points(), &[[1.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
    }

    #[test]
    fn compressed_pcd_is_unsupported() {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 0\nDATA binary_compressed\n";
        let err = decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("c.pcd"))
            .unwrap_err();
        assert!(matches!(err, PatrolError::UnsupportedFormat { .. }));
    }

    #[test]
    fn pcd_without_xyz_is_a_decode_error() {
        let text = "FIELDS a b c\nSIZE 4 4 4\nTYPE F F F\nPOINTS 0\nDATA ascii\n";
        let err = decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("d.pcd"))
            .unwrap_err();
        assert!(matches!(err, PatrolError::Decode { .. }));
    }

    #[test]
    fn oversized_point_count_is_bounded_by_body() {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                    POINTS 4000000000000000000\nDATA ascii\n1 2 3\n";
        let set =
            decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("e.pcd")).unwrap();
        assert_eq!(set.points(), &[[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn overflowing_width_times_height_is_a_decode_error() {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                    WIDTH 18446744073709551615\nHEIGHT 2\nDATA ascii\n1 2 3\n";
        let err = decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("f.pcd"))
            .unwrap_err();
        assert!(matches!(err, PatrolError::Decode { .. }));
    }

    #[test]
    fn zero_count_axis_is_a_decode_error() {
        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 0\nPOINTS 1\nDATA binary\n";
        let mut bytes = text.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        let err = decode_point_set(PointSetFormat::Pcd, &bytes, &fake_path("h.pcd")).unwrap_err();
        assert!(matches!(err, PatrolError::Decode { .. }));
    }

    #[test]
    fn overflowing_field_layout_is_a_decode_error() {
        let text = "FIELDS x y z\nSIZE 4 4 18446744073709551615\nTYPE F F F\n\
                    COUNT 1 1 2\nPOINTS 1\nDATA binary\n";
        let err = decode_point_set(PointSetFormat::Pcd, text.as_bytes(), &fake_path("g.pcd"))
            .unwrap_err();
        assert!(matches!(err, PatrolError::Decode { .. }));
    }
}
