//! Archiver capability: optional compression before sending.
//!
//! The sender may compress the file with an external tool and send the
//! archive instead. The archive extension travels to the receiver in
//! every data packet and ends up on the saved filename.
//!
//! Supported tools, probed in configured order:
//!
//! | Name     | Extension | Invocation                        |
//! |----------|-----------|-----------------------------------|
//! | `7z`     | `.7z`     | `7z a -mx=9 <archive> <file>`     |
//! | `tar.xz` | `.tar.xz` | `tar -cJf <archive> <file>`       |
//! | `zip`    | `.zip`    | `zip -9 -j <archive> <file>`      |
//!
//! Each tool runs in the source file's directory with the bare file name,
//! so the archive holds no directory prefix.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

/// Compresses a file into an archive the receiver can extract.
pub trait Archiver {
    /// Short tool name for logs.
    fn name(&self) -> &str;

    /// Extension appended to the archive, including the leading dot.
    fn extension(&self) -> &str;

    /// Compress `file` into a fresh archive.
    fn compress(&self, file: &Path) -> Result<Archive, ArchiveError>;
}

/// A finished archive. The scratch directory holding it is removed when
/// this value is dropped.
#[derive(Debug)]
pub struct Archive {
    pub path: PathBuf,
    pub extension: String,
    _scratch: ScratchDir,
}

impl Archive {
    pub fn new(path: PathBuf, extension: impl Into<String>, scratch: ScratchDir) -> Self {
        Self {
            path,
            extension: extension.into(),
            _scratch: scratch,
        }
    }
}

// ── ScratchDir: Drop-based cleanup ───────────────────────────────────────────

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory removed on drop, including during unwinding.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create() -> Result<Self, ArchiveError> {
        let id = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("clipwire-archive-{}-{}", std::process::id(), id));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).map_err(|source| ArchiveError::Scratch {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

// ── External tools ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    SevenZip,
    TarXz,
    Zip,
}

impl ArchiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "7z" => Some(Self::SevenZip),
            "tar.xz" | "tar" => Some(Self::TarXz),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::TarXz => "tar.xz",
            Self::Zip => "zip",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::SevenZip => ".7z",
            Self::TarXz => ".tar.xz",
            Self::Zip => ".zip",
        }
    }

    /// Executable name without platform suffix.
    fn program(self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::TarXz => "tar",
            Self::Zip => "zip",
        }
    }

    /// Install locations probed after `PATH` on Windows.
    fn extra_dirs(self) -> &'static [&'static str] {
        if !cfg!(windows) {
            return &[];
        }
        match self {
            Self::SevenZip => &[r"C:\Program Files\7-Zip", r"C:\Program Files (x86)\7-Zip"],
            Self::TarXz | Self::Zip => &[r"C:\Program Files\Git\usr\bin"],
        }
    }

    fn args(self, archive: &Path, file_name: &str) -> Vec<String> {
        let archive = archive.to_string_lossy().into_owned();
        let file_name = file_name.to_string();
        match self {
            Self::SevenZip => vec!["a".into(), "-mx=9".into(), archive, file_name],
            Self::TarXz => vec!["-cJf".into(), archive, file_name],
            Self::Zip => vec!["-9".into(), "-j".into(), archive, file_name],
        }
    }
}

/// An archiver backed by an external command-line tool.
#[derive(Debug, Clone)]
pub struct ExternalArchiver {
    kind: ArchiveKind,
    program: PathBuf,
}

impl ExternalArchiver {
    pub fn new(kind: ArchiveKind, program: PathBuf) -> Self {
        Self { kind, program }
    }

    /// Find the first available tool from `preferred`, searching `PATH`
    /// and the usual install directories.
    pub fn detect(preferred: &[String]) -> Result<Self, ArchiveError> {
        Self::detect_in(preferred, &search_path(), true)
    }

    /// Like `detect`, over an explicit directory list.
    pub fn detect_in(
        preferred: &[String],
        search_dirs: &[PathBuf],
        include_install_dirs: bool,
    ) -> Result<Self, ArchiveError> {
        for name in preferred {
            let Some(kind) = ArchiveKind::from_name(name) else {
                tracing::warn!(archiver = %name, "unknown archiver in config, skipping");
                continue;
            };
            let mut dirs = search_dirs.to_vec();
            if include_install_dirs {
                dirs.extend(kind.extra_dirs().iter().map(PathBuf::from));
            }
            if let Some(program) = find_executable(kind.program(), &dirs) {
                tracing::info!(archiver = kind.name(), program = %program.display(), "archiver found");
                return Ok(Self::new(kind, program));
            }
        }
        Err(ArchiveError::NoArchiver {
            tried: preferred.join(", "),
        })
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Archiver for ExternalArchiver {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn extension(&self) -> &str {
        self.kind.extension()
    }

    fn compress(&self, file: &Path) -> Result<Archive, ArchiveError> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::InvalidInput(file.to_path_buf()))?;
        let source_dir = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let scratch = ScratchDir::create()?;
        let archive_path = scratch
            .path()
            .join(format!("{}{}", file_name, self.kind.extension()));

        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(self.kind.args(&archive_path, file_name))
            .current_dir(&source_dir)
            .output()
            .map_err(|source| ArchiveError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(ArchiveError::Failed {
                program,
                status: output.status.to_string(),
                detail: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        if !archive_path.is_file() {
            return Err(ArchiveError::Failed {
                program,
                status: output.status.to_string(),
                detail: format!("no archive produced at {}", archive_path.display()),
            });
        }

        tracing::info!(
            archiver = self.kind.name(),
            archive = %archive_path.display(),
            "file compressed"
        );
        Ok(Archive::new(archive_path, self.kind.extension(), scratch))
    }
}

/// Directories listed in `PATH`.
pub fn search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default()
}

/// Locate `name` in `dirs`, accepting a `.exe` suffix on Windows.
pub fn find_executable(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    dirs.iter()
        .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
        .find(|path| path.is_file())
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("no compatible archiver found (tried: {tried})")]
    NoArchiver { tried: String },

    #[error("cannot archive {0}: path has no usable file name")]
    InvalidInput(PathBuf),

    #[error("failed to create scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("archiving failed: {program} exited with {status}: {detail}")]
    Failed {
        program: String,
        status: String,
        detail: String,
    },
}
