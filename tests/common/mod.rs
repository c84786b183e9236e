#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use bemsetup::{ico::ico_surface, surface::write_surface};
use nalgebra::Vector3;
use tempfile::TempDir;

/// A subjects directory holding one subject with concentric ico-3 spheres
pub struct Subjects {
    pub tmp: TempDir,
}

impl Subjects {
    pub fn new(layers: &[(&str, f64)]) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let bem_dir = tmp.path().join("subjects").join("sample").join("bem");
        std::fs::create_dir_all(&bem_dir).expect("create bem dir");

        let ico = ico_surface(3);
        for (file_name, radius_mm) in layers {
            let rr: Vec<Vector3<f64>> = ico.rr.iter().map(|r| r * *radius_mm / 1000.0).collect();
            write_surface(&bem_dir.join(file_name), &rr, &ico.tris).expect("write surface");
        }
        std::fs::create_dir_all(tmp.path().join("home")).expect("create home");

        Self { tmp }
    }

    pub fn three_layer() -> Self {
        Self::new(&[
            ("inner_skull.surf", 80.0),
            ("outer_skull.surf", 85.0),
            ("outer_skin.surf", 90.0),
        ])
    }

    pub fn dir(&self) -> PathBuf {
        self.tmp.path().join("subjects")
    }

    pub fn bem_dir(&self) -> PathBuf {
        self.dir().join("sample").join("bem")
    }

    pub fn bem_file(&self, name: &str) -> PathBuf {
        self.bem_dir().join(name)
    }

    /// The binary with an isolated environment: no SUBJECTS_DIR, no RUST_LOG
    /// and an empty home directory
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bemsetup").expect("binary built");
        cmd.env_remove("SUBJECTS_DIR")
            .env_remove("RUST_LOG")
            .env("_MNE_FAKE_HOME_DIR", self.tmp.path().join("home"));
        cmd
    }
}

pub fn bem_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".fif"))
        .collect();
    names.sort();
    names
}

pub fn json_config(subjects_dir: &Path) -> String {
    format!(
        "{{\"SUBJECTS_DIR\": \"{}\"}}",
        subjects_dir.display().to_string().replace('\\', "\\\\")
    )
}
