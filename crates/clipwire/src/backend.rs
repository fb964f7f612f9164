//! Channel backends: the system clipboard through its command-line tools,
//! or a plain file.
//!
//! Resolved once at startup into a boxed `Channel`; nothing after that
//! point probes the environment.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clipwire_core::config::ChannelSettings;
use clipwire_transfer::archive::{find_executable, search_path};
use clipwire_transfer::{Channel, ChannelError, FileChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clipboard {
    Xclip,
    Xsel,
    WlClipboard,
    Pbcopy,
    PowerShell,
}

impl Clipboard {
    /// Probe order for `auto` on this platform.
    fn candidates() -> &'static [Clipboard] {
        if cfg!(target_os = "macos") {
            &[Clipboard::Pbcopy]
        } else if cfg!(windows) {
            &[Clipboard::PowerShell]
        } else {
            &[Clipboard::Xclip, Clipboard::Xsel, Clipboard::WlClipboard]
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "xclip" => Some(Self::Xclip),
            "xsel" => Some(Self::Xsel),
            "wl-clipboard" | "wl-copy" => Some(Self::WlClipboard),
            "pbcopy" | "macos" => Some(Self::Pbcopy),
            "powershell" | "windows" => Some(Self::PowerShell),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Xclip => "xclip",
            Self::Xsel => "xsel",
            Self::WlClipboard => "wl-clipboard",
            Self::Pbcopy => "pbcopy",
            Self::PowerShell => "powershell",
        }
    }

    /// Program and arguments that copy stdin to the clipboard.
    fn write_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Xclip => ("xclip", &["-selection", "clipboard", "-in"]),
            Self::Xsel => ("xsel", &["--clipboard", "--input"]),
            Self::WlClipboard => ("wl-copy", &[]),
            Self::Pbcopy => ("pbcopy", &[]),
            Self::PowerShell => (
                "powershell",
                &[
                    "-NoProfile",
                    "-Command",
                    "Set-Clipboard -Value ([Console]::In.ReadToEnd())",
                ],
            ),
        }
    }

    /// Program and arguments that print the clipboard to stdout.
    fn read_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Xclip => ("xclip", &["-selection", "clipboard", "-out"]),
            Self::Xsel => ("xsel", &["--clipboard", "--output"]),
            Self::WlClipboard => ("wl-paste", &["--no-newline"]),
            Self::Pbcopy => ("pbpaste", &[]),
            Self::PowerShell => ("powershell", &["-NoProfile", "-Command", "Get-Clipboard -Raw"]),
        }
    }

    fn installed(self, dirs: &[PathBuf]) -> bool {
        let (write, _) = self.write_command();
        let (read, _) = self.read_command();
        find_executable(write, dirs).is_some() && find_executable(read, dirs).is_some()
    }
}

/// The system clipboard, driven through external tools.
#[derive(Debug, Clone, Copy)]
pub struct ClipboardChannel {
    clipboard: Clipboard,
}

impl ClipboardChannel {
    pub fn new(clipboard: Clipboard) -> Self {
        Self { clipboard }
    }
}

impl Channel for ClipboardChannel {
    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let (program, args) = self.clipboard.write_command();
        copy_to_clipboard(Path::new(program), args, text)
    }

    fn read(&self) -> Result<String, ChannelError> {
        let (program, args) = self.clipboard.read_command();
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ChannelError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // an empty clipboard makes some tools exit non-zero
        if !output.status.success() {
            tracing::trace!(program, status = %output.status, "clipboard read failed, treating as empty");
            return Ok(String::new());
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if self.clipboard == Clipboard::PowerShell {
            let trimmed = text.trim_end_matches(['\r', '\n']).len();
            text.truncate(trimmed);
        }
        Ok(text)
    }
}

/// Feed `text` to a clipboard tool on stdin and wait for it to exit.
///
/// xclip forks a child that owns the selection until another client takes
/// it. That child inherits every output pipe, so nothing may be piped or
/// the wait lasts as long as the selection does.
fn copy_to_clipboard(program: &Path, args: &[&str], text: &str) -> Result<(), ChannelError> {
    let spawn_error = |source| ChannelError::Spawn {
        program: program.display().to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(spawn_error)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).map_err(spawn_error)?;
    }
    let status = child.wait().map_err(spawn_error)?;

    if !status.success() {
        return Err(ChannelError::Failed {
            program: program.display().to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport unavailable: no clipboard tool found (tried: {tried})")]
    Unavailable { tried: String },

    #[error("transport unavailable: {backend} is not installed")]
    NotInstalled { backend: &'static str },

    #[error("unknown channel backend {0:?}")]
    Unknown(String),

    #[error("the file backend needs channel.file_path or --channel-file")]
    MissingFilePath,
}

/// Resolve the configured backend into a channel.
pub fn open(settings: &ChannelSettings) -> Result<Box<dyn Channel>, BackendError> {
    open_in(settings, &search_path())
}

fn open_in(settings: &ChannelSettings, dirs: &[PathBuf]) -> Result<Box<dyn Channel>, BackendError> {
    match settings.backend.as_str() {
        "file" => {
            if settings.file_path.as_os_str().is_empty() {
                return Err(BackendError::MissingFilePath);
            }
            tracing::info!(path = %settings.file_path.display(), "using file channel");
            Ok(Box::new(FileChannel::new(settings.file_path.clone())))
        }
        "auto" => {
            let found = Clipboard::candidates()
                .iter()
                .copied()
                .find(|c| c.installed(dirs))
                .ok_or_else(|| BackendError::Unavailable {
                    tried: Clipboard::candidates()
                        .iter()
                        .map(|c| c.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;
            tracing::info!(backend = found.name(), "clipboard backend detected");
            Ok(Box::new(ClipboardChannel::new(found)))
        }
        name => {
            let clipboard =
                Clipboard::from_name(name).ok_or_else(|| BackendError::Unknown(name.to_string()))?;
            if !clipboard.installed(dirs) {
                return Err(BackendError::NotInstalled {
                    backend: clipboard.name(),
                });
            }
            tracing::info!(backend = clipboard.name(), "clipboard backend selected");
            Ok(Box::new(ClipboardChannel::new(clipboard)))
        }
    }
}
