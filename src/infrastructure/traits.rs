//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use serde_json::Value;

use crate::application::RemoteError;
use crate::domain::{Ec2Server, NamedResource, RackspaceServer, ServerRequest, Slice};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Write raw bytes to file.
    fn write_bytes(&self, path: &Path, content: &[u8]) -> io::Result<()>;

    /// Read raw bytes from file.
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Rename/move a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and all its contents.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Immediate subdirectories of `path`, sorted.
    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run a command with arguments.
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output>;

    /// Run a command with arguments in a working directory.
    fn run_in(&self, dir: &Path, cmd: &str, args: &[&str]) -> io::Result<Output>;

    /// Run a command feeding `stdin`, capturing output.
    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> io::Result<Output>;
}

/// Editor abstraction for opening files.
pub trait Editor: Send + Sync {
    /// Open a file in the editor.
    /// Blocks until editor exits.
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Interactive terminal: plain output and line prompts.
pub trait Console: Send + Sync {
    /// Print a line to stdout.
    fn say(&self, msg: &str);

    /// Print without a newline (progress markers).
    fn print(&self, msg: &str);

    /// Print `prompt` and read one line of input.
    fn ask(&self, prompt: &str) -> io::Result<String>;
}

/// JSON REST endpoint. Paths are relative to the client's base url;
/// absolute urls are used verbatim.
pub trait RestClient: Send + Sync {
    fn get(&self, path: &str) -> Result<Value, RemoteError>;

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    fn delete(&self, path: &str) -> Result<Value, RemoteError>;

    /// Fetch a file body without JSON decoding.
    fn get_raw(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// PUT file content to a sandbox upload url.
    fn put_file(&self, url: &str, checksum: &str, content: &[u8]) -> Result<(), RemoteError>;
}

/// EC2 instance operations.
pub trait Ec2Api: Send + Sync {
    fn list_servers(&self) -> Result<Vec<Ec2Server>, RemoteError>;

    fn get_server(&self, id: &str) -> Result<Option<Ec2Server>, RemoteError>;

    fn terminate_server(&self, id: &str) -> Result<(), RemoteError>;
}

/// Rackspace Cloud Servers operations.
pub trait RackspaceApi: Send + Sync {
    fn list_servers(&self) -> Result<Vec<RackspaceServer>, RemoteError>;

    fn get_server(&self, id: &str) -> Result<RackspaceServer, RemoteError>;

    fn create_server(&self, request: &ServerRequest) -> Result<RackspaceServer, RemoteError>;

    fn delete_server(&self, id: &str) -> Result<(), RemoteError>;

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError>;

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError>;
}

/// Slicehost slice operations.
pub trait SlicehostApi: Send + Sync {
    fn list_slices(&self) -> Result<Vec<Slice>, RemoteError>;

    fn get_slice(&self, id: &str) -> Result<Slice, RemoteError>;

    fn create_slice(&self, request: &ServerRequest) -> Result<Slice, RemoteError>;

    fn delete_slice(&self, id: &str) -> Result<(), RemoteError>;

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError>;

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError>;
}

/// TCP reachability check (sshd readiness).
pub trait PortProbe: Send + Sync {
    fn is_listening(&self, host: &str, port: u16) -> bool;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn write_bytes(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            // EXDEV: temp dir on another device, fall back to copy + delete
            Err(e) if e.raw_os_error() == Some(18) => {
                std::fs::copy(from, to)?;
                std::fs::remove_file(from)
            }
            Err(e) => Err(e),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        std::process::Command::new(cmd).args(args).output()
    }

    fn run_in(&self, dir: &Path, cmd: &str, args: &[&str]) -> io::Result<Output> {
        std::process::Command::new(cmd)
            .args(args)
            .current_dir(dir)
            .output()
    }

    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> io::Result<Output> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = std::process::Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut child_stdin) = child.stdin.take() {
            child_stdin.write_all(stdin.as_bytes())?;
        }

        child.wait_with_output()
    }
}

/// Real editor implementation running the configured editor command.
#[derive(Debug)]
pub struct CommandEditor {
    command: String,
}

impl CommandEditor {
    /// `command` may carry arguments, e.g. `code --wait`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Editor for CommandEditor {
    fn open(&self, path: &Path) -> io::Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no editor configured"))?;

        let status = std::process::Command::new(program)
            .args(parts)
            .arg(path)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("editor exited with status: {}", status),
            ))
        }
    }
}

/// Console bound to the process stdin/stdout.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn say(&self, msg: &str) {
        println!("{msg}");
    }

    fn print(&self, msg: &str) {
        use std::io::Write;
        print!("{msg}");
        io::stdout().flush().ok();
    }

    fn ask(&self, prompt: &str) -> io::Result<String> {
        use std::io::Write;
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line)
    }
}

/// Port probe using a plain TCP connect.
#[derive(Debug)]
pub struct TcpPortProbe {
    timeout: Duration,
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

impl PortProbe for TcpPortProbe {
    fn is_listening(&self, host: &str, port: u16) -> bool {
        let Ok(mut addrs) = (host, port).to_socket_addrs() else {
            return false;
        };
        addrs.any(|addr| TcpStream::connect_timeout(&addr, self.timeout).is_ok())
    }
}
