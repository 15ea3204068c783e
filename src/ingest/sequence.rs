//! Recorded sequence frame store.
//!
//! `FrameStore` replays a recorded patrol sequence from disk:
//! - an image directory (one image per frame)
//! - a point-set directory (one `.pcd` or `.bin` per frame)
//! - a timestamps file (one float per line, seconds)
//!
//! The three streams are paired by position after sorting both directories
//! lexicographically. Alignment is checked once at open time. Frames are
//! decoded lazily, one per `get` call.

use std::path::{Path, PathBuf};

use super::pointcloud::read_point_set;
use crate::config::SequenceSettings;
use crate::error::{PatrolError, Result};
use crate::frame::Frame;

pub struct FrameStore {
    image_files: Vec<PathBuf>,
    point_files: Vec<PathBuf>,
    timestamps: Vec<f64>,
}

impl FrameStore {
    /// Open a sequence and validate that all three streams line up.
    pub fn open(images_dir: &Path, points_dir: &Path, timestamps_file: &Path) -> Result<Self> {
        let timestamps = load_timestamps(timestamps_file)?;
        let image_files = gather_files(images_dir)?;
        let point_files = gather_files(points_dir)?;

        if image_files.len() != point_files.len() || image_files.len() != timestamps.len() {
            return Err(PatrolError::MisalignedInput {
                images: image_files.len(),
                point_sets: point_files.len(),
                timestamps: timestamps.len(),
            });
        }

        log::info!(
            "FrameStore: opened {} frames (images={}, points={})",
            timestamps.len(),
            images_dir.display(),
            points_dir.display()
        );

        Ok(Self {
            image_files,
            point_files,
            timestamps,
        })
    }

    /// Open the sequence described by the `[sequence]` config section.
    pub fn from_config(settings: &SequenceSettings) -> Result<Self> {
        Self::open(
            &settings.rgb_path(),
            &settings.pointcloud_path(),
            &settings.timestamps_path(),
        )
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Timestamp of frame `index` without decoding the frame.
    pub fn timestamp(&self, index: usize) -> Result<f64> {
        self.timestamps
            .get(index)
            .copied()
            .ok_or(PatrolError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Decode frame `index`.
    pub fn get(&self, index: usize) -> Result<Frame> {
        let timestamp = self.timestamp(index)?;
        let image_path = &self.image_files[index];
        let image = image::open(image_path)
            .map_err(|e| PatrolError::decode(image_path, e.to_string()))?
            .into_rgb8();
        let points = read_point_set(&self.point_files[index])?;
        log::debug!(
            "FrameStore: frame {} t={:.3} {}x{} points={}",
            index,
            timestamp,
            image.width(),
            image.height(),
            points.len()
        );
        Ok(Frame::new(index, image, points, timestamp))
    }

    /// Replay every frame once, in index order. Call again to restart.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            store: self,
            next: 0,
        }
    }
}

/// Sequential replay over a [`FrameStore`].
pub struct Frames<'a> {
    store: &'a FrameStore,
    next: usize,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.store.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.store.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.store.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

fn load_timestamps(path: &Path) -> Result<Vec<f64>> {
    if !path.is_file() {
        return Err(PatrolError::MissingResource(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|e| PatrolError::io(path, e))?;
    parse_timestamps(&raw, path)
}

fn parse_timestamps(raw: &str, path: &Path) -> Result<Vec<f64>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            line.trim().parse::<f64>().map_err(|_| {
                PatrolError::Configuration(format!(
                    "{}:{}: invalid timestamp '{}'",
                    path.display(),
                    n + 1,
                    line.trim()
                ))
            })
        })
        .collect()
}

fn gather_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PatrolError::MissingResource(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| PatrolError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PatrolError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_skip_blank_lines() {
        let parsed = parse_timestamps("0.0\n\n 0.1 \n0.2\n", Path::new("ts.txt")).unwrap();
        assert_eq!(parsed, vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn bad_timestamp_names_the_line() {
        let err = parse_timestamps("0.0\nabc\n", Path::new("ts.txt")).unwrap_err();
        match err {
            PatrolError::Configuration(msg) => assert!(msg.contains("ts.txt:2"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
