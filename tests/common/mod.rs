#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// On-disk recorded sequence laid out the default way (`rgb/`, `pointcloud/`,
/// `timestamps.txt`) under a temp root.
pub struct SequenceFixture {
    pub dir: TempDir,
}

impl SequenceFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("rgb")).expect("rgb dir");
        std::fs::create_dir_all(dir.path().join("pointcloud")).expect("pointcloud dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn rgb_dir(&self) -> PathBuf {
        self.root().join("rgb")
    }

    pub fn points_dir(&self) -> PathBuf {
        self.root().join("pointcloud")
    }

    pub fn timestamps_file(&self) -> PathBuf {
        self.root().join("timestamps.txt")
    }

    pub fn write_image(&self, name: &str) {
        let image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([40, 80, 120]));
        image.save(self.rgb_dir().join(name)).expect("save image");
    }

    /// Flat `.bin` record: x, y, z, intensity as little-endian f32.
    pub fn write_bin(&self, name: &str, points: &[[f32; 3]]) {
        let mut bytes = Vec::with_capacity(points.len() * 16);
        for p in points {
            for v in [p[0], p[1], p[2], 1.0] {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        std::fs::write(self.points_dir().join(name), bytes).expect("write bin");
    }

    pub fn write_pcd_ascii(&self, name: &str, points: &[[f32; 3]]) {
        let mut body = format!(
            "# .PCD v0.7\nVERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n\
             WIDTH {n}\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0\nPOINTS {n}\nDATA ascii\n",
            n = points.len()
        );
        for p in points {
            body.push_str(&format!("{} {} {}\n", p[0], p[1], p[2]));
        }
        std::fs::write(self.points_dir().join(name), body).expect("write pcd");
    }

    pub fn write_timestamps(&self, timestamps: &[f64]) {
        let body: String = timestamps.iter().map(|t| format!("{t}\n")).collect();
        std::fs::write(self.timestamps_file(), body).expect("write timestamps");
    }

    /// `n` frames, each with a single point at range `range_m`, one second apart.
    pub fn populate(&self, n: usize, range_m: f32) {
        for i in 0..n {
            self.write_image(&format!("{i:06}.png"));
            self.write_bin(&format!("{i:06}.bin"), &[[range_m, 0.0, 0.0]]);
        }
        let timestamps: Vec<f64> = (0..n).map(|i| i as f64).collect();
        self.write_timestamps(&timestamps);
    }
}
