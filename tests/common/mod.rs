//! Shared mocks for service tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use knife::application::{RemoteError, Ui, UiOptions};
use knife::application::services::ObjectStore;
use knife::domain::{Ec2Server, NamedResource, RackspaceServer, ServerRequest, Slice};
use knife::infrastructure::traits::{
    CommandRunner, Console, Ec2Api, Editor, PortProbe, RackspaceApi, RealFileSystem, RestClient,
    SlicehostApi,
};

type Reply = Result<Value, RemoteError>;

/// Recorded REST call: method, path, body.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

/// REST client with scripted replies; unscripted calls answer `{}`.
#[derive(Default)]
pub struct MockRest {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    raw: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl MockRest {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: &str, path: &str, value: Value) {
        self.push(method, path, Ok(value));
    }

    pub fn fail(&self, method: &str, path: &str, status: u16) {
        let error = RemoteError::new(method, path, Some(status), format!("status {status}"));
        self.push(method, path, Err(error));
    }

    pub fn raw(&self, path: &str, content: &[u8]) {
        self.raw
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    fn push(&self, method: &str, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(reply);
    }

    fn answer(&self, method: &str, path: &str, body: Option<&Value>) -> Reply {
        self.calls.lock().unwrap().push(Call {
            method: method.to_string(),
            path: path.to_string(),
            body: body.cloned(),
        });
        self.replies
            .lock()
            .unwrap()
            .get_mut(&(method.to_string(), path.to_string()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({})))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// `"METHOD path"` for every call, in order.
    pub fn requests(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }

    pub fn body_of(&self, method: &str, path: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .find(|c| c.method == method && c.path == path)
            .and_then(|c| c.body)
    }

    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl RestClient for MockRest {
    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.answer("GET", path, None)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.answer("PUT", path, Some(body))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.answer("POST", path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value, RemoteError> {
        self.answer("DELETE", path, None)
    }

    fn get_raw(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.calls.lock().unwrap().push(Call {
            method: "GET".to_string(),
            path: path.to_string(),
            body: None,
        });
        self.raw
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::new("GET", path, Some(404), "not found"))
    }

    fn put_file(&self, url: &str, checksum: &str, content: &[u8]) -> Result<(), RemoteError> {
        self.uploads
            .lock()
            .unwrap()
            .push((url.to_string(), checksum.to_string(), content.to_vec()));
        Ok(())
    }
}

/// Console that replays scripted answers and records everything printed.
#[derive(Default)]
pub struct MockConsole {
    answers: Mutex<VecDeque<String>>,
    output: Mutex<String>,
}

impl MockConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answering(answers: &[&str]) -> Arc<Self> {
        let console = Self::default();
        console
            .answers
            .lock()
            .unwrap()
            .extend(answers.iter().map(|a| format!("{a}\n")));
        Arc::new(console)
    }

    pub fn output(&self) -> String {
        self.output.lock().unwrap().clone()
    }
}

impl Console for MockConsole {
    fn say(&self, msg: &str) {
        let mut out = self.output.lock().unwrap();
        out.push_str(msg);
        out.push('\n');
    }

    fn print(&self, msg: &str) {
        self.output.lock().unwrap().push_str(msg);
    }

    fn ask(&self, prompt: &str) -> io::Result<String> {
        self.output.lock().unwrap().push_str(prompt);
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Editor that replaces the file with fixed content, or leaves it untouched.
#[derive(Default)]
pub struct MockEditor {
    replacement: Option<String>,
    opened: Mutex<Vec<PathBuf>>,
}

impl MockEditor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writing(content: &str) -> Arc<Self> {
        Arc::new(Self {
            replacement: Some(content.to_string()),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl Editor for MockEditor {
    fn open(&self, path: &Path) -> io::Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        if let Some(content) = &self.replacement {
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

/// Recorded command: working dir, program, args, stdin.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCall {
    pub dir: Option<PathBuf>,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl CommandCall {
    pub fn line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Command runner answering from scripted stdout; listed commands fail.
#[derive(Default)]
pub struct MockCommandRunner {
    calls: Mutex<Vec<CommandCall>>,
    stdout: Mutex<HashMap<String, String>>,
    failing: Mutex<Vec<String>>,
}

impl MockCommandRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Output for the exact command line `line`.
    pub fn stdout_for(&self, line: &str, stdout: &str) {
        self.stdout
            .lock()
            .unwrap()
            .insert(line.to_string(), stdout.to_string());
    }

    /// Command lines starting with `prefix` exit with status 1.
    pub fn fail_on(&self, prefix: &str) {
        self.failing.lock().unwrap().push(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<CommandCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandCall::line).collect()
    }

    fn record(&self, call: CommandCall) -> io::Result<Output> {
        let line = call.line();
        self.calls.lock().unwrap().push(call);
        let failed = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()));
        let stdout = self
            .stdout
            .lock()
            .unwrap()
            .get(&line)
            .cloned()
            .unwrap_or_default();
        Ok(Output {
            status: ExitStatus::from_raw(if failed { 256 } else { 0 }),
            stdout: stdout.into_bytes(),
            stderr: if failed { b"failed".to_vec() } else { Vec::new() },
        })
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        self.record(CommandCall {
            dir: None,
            program: cmd.to_string(),
            args: owned(args),
            stdin: None,
        })
    }

    fn run_in(&self, dir: &Path, cmd: &str, args: &[&str]) -> io::Result<Output> {
        self.record(CommandCall {
            dir: Some(dir.to_path_buf()),
            program: cmd.to_string(),
            args: owned(args),
            stdin: None,
        })
    }

    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> io::Result<Output> {
        self.record(CommandCall {
            dir: None,
            program: cmd.to_string(),
            args: owned(args),
            stdin: Some(stdin.to_string()),
        })
    }
}

/// Probe that reports sshd up after `misses` failed checks.
#[derive(Default)]
pub struct MockProbe {
    misses: Mutex<usize>,
    probed: Mutex<Vec<(String, u16)>>,
}

impl MockProbe {
    pub fn after(misses: usize) -> Arc<Self> {
        Arc::new(Self {
            misses: Mutex::new(misses),
            probed: Mutex::new(Vec::new()),
        })
    }

    pub fn probed(&self) -> Vec<(String, u16)> {
        self.probed.lock().unwrap().clone()
    }
}

impl PortProbe for MockProbe {
    fn is_listening(&self, host: &str, port: u16) -> bool {
        self.probed.lock().unwrap().push((host.to_string(), port));
        let mut misses = self.misses.lock().unwrap();
        if *misses == 0 {
            true
        } else {
            *misses -= 1;
            false
        }
    }
}

/// EC2 API over a fixed instance list.
#[derive(Default)]
pub struct MockEc2 {
    pub servers: Vec<Ec2Server>,
    terminated: Mutex<Vec<String>>,
}

impl MockEc2 {
    pub fn with(servers: Vec<Ec2Server>) -> Arc<Self> {
        Arc::new(Self {
            servers,
            terminated: Mutex::new(Vec::new()),
        })
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }
}

impl Ec2Api for MockEc2 {
    fn list_servers(&self) -> Result<Vec<Ec2Server>, RemoteError> {
        Ok(self.servers.clone())
    }

    fn get_server(&self, id: &str) -> Result<Option<Ec2Server>, RemoteError> {
        Ok(self.servers.iter().find(|s| s.id == id).cloned())
    }

    fn terminate_server(&self, id: &str) -> Result<(), RemoteError> {
        self.terminated.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Rackspace API: `create_server` returns `created`, then `get_server`
/// walks through `states` (the last one repeats).
#[derive(Default)]
pub struct MockRackspace {
    pub created: RackspaceServer,
    states: Mutex<VecDeque<RackspaceServer>>,
    pub servers: Vec<RackspaceServer>,
    requests: Mutex<Vec<ServerRequest>>,
    deleted: Mutex<Vec<String>>,
}

impl MockRackspace {
    pub fn new(
        created: RackspaceServer,
        states: Vec<RackspaceServer>,
        servers: Vec<RackspaceServer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            created,
            states: Mutex::new(states.into()),
            servers,
            requests: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ServerRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl RackspaceApi for MockRackspace {
    fn list_servers(&self) -> Result<Vec<RackspaceServer>, RemoteError> {
        Ok(self.servers.clone())
    }

    fn get_server(&self, id: &str) -> Result<RackspaceServer, RemoteError> {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            if let Some(next) = states.pop_front() {
                return Ok(next);
            }
        }
        if let Some(last) = states.front() {
            return Ok(last.clone());
        }
        self.servers
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::new("GET", format!("servers/{id}"), Some(404), "itemNotFound"))
    }

    fn create_server(&self, request: &ServerRequest) -> Result<RackspaceServer, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.created.clone())
    }

    fn delete_server(&self, id: &str) -> Result<(), RemoteError> {
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError> {
        Ok(Vec::new())
    }

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError> {
        Ok(Vec::new())
    }
}

/// Slicehost API over fixed slices, images and flavors.
#[derive(Default)]
pub struct MockSlicehost {
    pub slices: Vec<Slice>,
    pub images: Vec<NamedResource>,
    pub flavors: Vec<NamedResource>,
    pub fail_delete: bool,
    states: Mutex<VecDeque<Slice>>,
    requests: Mutex<Vec<ServerRequest>>,
    deleted: Mutex<Vec<String>>,
}

impl MockSlicehost {
    pub fn new(slices: Vec<Slice>, images: Vec<NamedResource>, flavors: Vec<NamedResource>) -> Self {
        Self {
            slices,
            images,
            flavors,
            ..Default::default()
        }
    }

    /// Slices returned by successive `get_slice` calls.
    pub fn with_states(self, states: Vec<Slice>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    pub fn requests(&self) -> Vec<ServerRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl SlicehostApi for MockSlicehost {
    fn list_slices(&self) -> Result<Vec<Slice>, RemoteError> {
        Ok(self.slices.clone())
    }

    fn get_slice(&self, id: &str) -> Result<Slice, RemoteError> {
        self.states
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RemoteError::new("GET", format!("slices/{id}.xml"), Some(404), "missing"))
    }

    fn create_slice(&self, request: &ServerRequest) -> Result<Slice, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Slice {
            id: "15".to_string(),
            name: request.name.clone(),
            flavor_id: request.flavor_id.clone(),
            image_id: request.image_id.clone(),
            status: "build".to_string(),
            addresses: vec!["67.23.18.11".to_string(), "10.176.2.5".to_string()],
            root_password: Some("s3cret".to_string()),
        })
    }

    fn delete_slice(&self, id: &str) -> Result<(), RemoteError> {
        if self.fail_delete {
            return Err(RemoteError::new(
                "DELETE",
                format!("slices/{id}.xml"),
                Some(422),
                "Unprocessable Entity",
            ));
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError> {
        Ok(self.images.clone())
    }

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError> {
        Ok(self.flavors.clone())
    }
}

pub fn named(id: &str, name: &str) -> NamedResource {
    NamedResource {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Ui over a mock console and editor; confirmations are answered by `console`.
pub fn ui_with(console: Arc<MockConsole>, editor: Arc<MockEditor>, options: UiOptions) -> Arc<Ui> {
    Arc::new(Ui::new(console, editor, Arc::new(RealFileSystem), options))
}

/// Store that never opens an editor and auto-confirms.
pub fn quiet_store(rest: Arc<MockRest>, console: Arc<MockConsole>) -> ObjectStore {
    let ui = ui_with(
        console,
        MockEditor::new(),
        UiOptions {
            assume_yes: true,
            no_editor: true,
        },
    );
    ObjectStore::new(rest, ui)
}
