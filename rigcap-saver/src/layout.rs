//! Run directory selection and output file naming.

use crate::error::SaverError;
use rand::Rng;
use rigcap_capture::{RigPosition, StreamKind};
use std::fs;
use std::path::{Path, PathBuf};

const RUN_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RUN_ID_LEN: usize = 5;
const MAX_ATTEMPTS: usize = 100;

/// Where one run's dumps are written and how files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveLayout {
    dir: PathBuf,
}

impl SaveLayout {
    /// Pick `<root>/<YYYY-MM-DD>/<RUNID>` that does not exist yet.
    ///
    /// The directory itself is created lazily by [`SaveLayout::ensure_dir`].
    pub fn dated(root: &Path) -> Result<Self, SaverError> {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_ATTEMPTS {
            let run_id: String = (0..RUN_ID_LEN)
                .map(|_| RUN_ID_CHARSET[rng.gen_range(0..RUN_ID_CHARSET.len())] as char)
                .collect();
            let dir = root.join(&date).join(run_id);
            if !dir.is_dir() {
                return Ok(Self { dir });
            }
        }

        Err(SaverError::Directory {
            path: root.to_path_buf(),
            reason: format!("no free run directory after {} attempts", MAX_ATTEMPTS),
        })
    }

    /// Use an exact directory.
    pub fn fixed(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), SaverError> {
        fs::create_dir_all(&self.dir).map_err(|e| SaverError::Directory {
            path: self.dir.clone(),
            reason: e.to_string(),
        })
    }

    /// `{cycle}_{position}_{kind}.png`
    pub fn image_path(&self, cycle: u64, position: &RigPosition, kind: StreamKind) -> PathBuf {
        self.dir.join(format!("{}_{}_{}.png", cycle, position, kind.name()))
    }

    /// `{cycle}_{position}_camera_info.json`
    pub fn camera_info_path(&self, cycle: u64, position: &RigPosition) -> PathBuf {
        self.dir.join(format!("{}_{}_camera_info.json", cycle, position))
    }
}
