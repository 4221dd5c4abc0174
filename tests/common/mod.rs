//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Stand-in for `pip install --requirement R --target T`.
///
/// Installs one fake package, or fails with status 3 when the manifest
/// names an unresolvable requirement.
const FAKE_PIP: &str = r##"#!/bin/sh
req="$3"
target="$5"
if grep -q unresolvable "$req"; then
    echo "ERROR: No matching distribution found for unresolvable" >&2
    exit 3
fi
mkdir -p "$target/retrying" "$target/retrying-1.3.3.dist-info"
echo "# retrying" > "$target/retrying/__init__.py"
echo "Name: retrying" > "$target/retrying-1.3.3.dist-info/METADATA"
"##;

/// A throwaway project directory laid out the way `lpack` expects.
pub struct TestProject {
    _tmp: TempDir,
    pub root: PathBuf,
    fake_pip: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("project");
        write_file(&root.join("bin/jpegoptim"), "#!/bin/sh\n");
        write_file(&root.join("bin/pngquant"), "#!/bin/sh\n");
        write_file(
            &root.join("main.py"),
            "from config import Config\n\ndef lambda_handler(event, context):\n    return Config.setting\n",
        );
        write_file(&root.join("requirements.txt"), "retrying\n");
        write_file(
            &root.join("config.json"),
            r#"{"a": 1, "b": [true, null, "x"]}"#,
        );
        let fake_pip = tmp.path().join("fake_pip.sh");
        write_file(&fake_pip, FAKE_PIP);
        Self {
            _tmp: tmp,
            root,
            fake_pip,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        write_file(&self.path(rel), contents);
    }

    /// `lpack` run from the project root, with no flags.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lpack"));
        cmd.current_dir(&self.root);
        cmd
    }

    /// `lpack` run from the project root with the fake installer wired in.
    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--installer")
            .arg(format!("sh '{}'", self.fake_pip.display()));
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("run lpack")
    }

    /// Sorted relative paths of everything under the project root.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        collect(&self.root, &self.root, &mut out);
        out.sort();
        out
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        out.push(path.strip_prefix(root).expect("strip root").to_path_buf());
        if path.is_dir() {
            collect(root, &path, out);
        }
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}

/// True when the host has the tools a real end-to-end bundle needs.
pub fn host_can_bundle() -> bool {
    which::which("zip").is_ok() && which::which("sh").is_ok()
}

/// File entries of a zip archive via `unzip -Z1`, sorted; `None` without unzip.
pub fn zip_entries(archive: &Path) -> Option<Vec<String>> {
    let unzip = which::which("unzip").ok()?;
    let output = Command::new(unzip).arg("-Z1").arg(archive).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let mut entries: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.ends_with('/'))
        .map(|line| line.to_string())
        .collect();
    entries.sort();
    Some(entries)
}

/// Contents of one archive member via `unzip -p`; `None` without unzip.
pub fn zip_member(archive: &Path, member: &str) -> Option<String> {
    let unzip = which::which("unzip").ok()?;
    let output = Command::new(unzip)
        .arg("-p")
        .arg(archive)
        .arg(member)
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).to_string())
}
