//! CLI argument definitions using clap
//!
//! Positional arguments are optional at the clap level so that each
//! command reports its own usage failure with the right message.

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};

/// Command-line client for a configuration-management server
#[derive(Parser, Debug)]
#[command(name = "knife")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// More verbose output (-V debug, -VV trace)
    #[arg(short = 'V', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: .chef/knife.toml)
    #[arg(short = 'c', long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Server URL
    #[arg(short = 's', long, global = true)]
    pub server_url: Option<String>,

    /// API client username
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// API client key
    #[arg(short = 'k', long, global = true, value_hint = ValueHint::FilePath)]
    pub key: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Editor for interactive commands
    #[arg(long, global = true)]
    pub editor: Option<String>,

    /// Do not open an editor; accept data as is
    #[arg(short = 'n', long, global = true)]
    pub no_editor: bool,

    /// Assume yes to all confirmations
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Clap command with `-v/--version` (`-V` is taken by verbose).
    pub fn build_command() -> Command {
        Cli::command().arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version")
                .action(ArgAction::Version),
        )
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage API clients
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Write client configuration
    Configure {
        #[command(subcommand)]
        command: ConfigureCommands,
    },

    /// Manage cookbooks
    Cookbook {
        #[command(subcommand)]
        command: CookbookCommands,
    },

    /// Manage data bags
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },

    /// Manage nodes
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Manage roles
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Search an index
    Search {
        /// Index: node, role, client or a data bag name
        index: Option<String>,
        /// Query, e.g. 'role:webserver'
        query: Option<String>,
        /// Sort order
        #[arg(short = 'o', long)]
        sort: Option<String>,
        /// Row to start returning results at
        #[arg(short = 'b', long, default_value_t = 0)]
        start: u64,
        /// Number of rows to return
        #[arg(short = 'R', long)]
        rows: Option<u64>,
        /// Only show ids
        #[arg(short = 'i', long)]
        id_only: bool,
        /// Only show the run list
        #[arg(short = 'r', long)]
        run_list: bool,
        /// Show only one attribute
        #[arg(short = 'a', long)]
        attribute: Option<String>,
    },

    /// Run knife command scripts
    Exec {
        /// Script files (default: STDIN)
        #[arg(value_hint = ValueHint::FilePath)]
        scripts: Vec<String>,
        /// Script text
        #[arg(short = 'E', long = "exec")]
        code: Option<String>,
    },

    /// Amazon EC2
    Ec2 {
        #[command(subcommand)]
        command: Ec2Commands,
    },

    /// Rackspace Cloud Servers
    Rackspace {
        #[command(subcommand)]
        command: RackspaceCommands,
    },

    /// Slicehost slices
    Slicehost {
        #[command(subcommand)]
        command: SlicehostCommands,
    },

    /// Install and register the client on a host over ssh
    Bootstrap {
        /// Host name or address
        host: Option<String>,
        /// SSH user
        #[arg(short = 'x', long)]
        ssh_user: Option<String>,
        /// SSH password
        #[arg(short = 'P', long)]
        ssh_password: Option<String>,
        /// Node name
        #[arg(short = 'N', long)]
        node_name: Option<String>,
        /// Comma-separated run list
        #[arg(short = 'r', long, value_delimiter = ',')]
        run_list: Vec<String>,
        /// Bootstrap template
        #[arg(long)]
        distro: Option<String>,
        /// Run the script with sudo
        #[arg(long)]
        sudo: bool,
        /// Print the script instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage knife settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// List clients
    List {
        /// Show uris
        #[arg(short = 'w', long)]
        with_uri: bool,
    },
    /// Show a client
    Show {
        name: Option<String>,
        /// Show only one attribute
        #[arg(short = 'a', long)]
        attribute: Option<String>,
    },
    /// Edit a client
    Edit {
        name: Option<String>,
        /// Show the data after saving
        #[arg(short = 'p', long)]
        print_after: bool,
    },
    /// Delete a client
    Delete { name: Option<String> },
    /// Create a client
    Create {
        name: Option<String>,
        /// Write the private key to a file
        #[arg(short = 'f', long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        /// Create an admin client
        #[arg(short = 'a', long)]
        admin: bool,
    },
    /// Regenerate a client's key pair
    Reregister {
        name: Option<String>,
        /// Write the private key to a file
        #[arg(short = 'f', long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigureCommands {
    /// Write client.rb and validation.pem into a directory
    Client {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CookbookCommands {
    /// List cookbooks
    List {
        #[arg(short = 'w', long)]
        with_uri: bool,
        /// Environment to list cookbooks for
        #[arg(short = 'E', long)]
        environment: Option<String>,
    },
    /// Delete one, several, or all versions of a cookbook
    Delete {
        name: Option<String>,
        version: Option<String>,
        /// Delete all versions
        #[arg(short = 'a', long)]
        all: bool,
        /// Permanently remove files from backing storage
        #[arg(short = 'p', long)]
        purge: bool,
    },
    /// Download a cookbook version
    Download {
        name: Option<String>,
        version: Option<String>,
        /// Directory to download into
        #[arg(short = 'd', long, value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
        /// Overwrite an existing directory
        #[arg(short = 'f', long)]
        force: bool,
        /// Download the latest version
        #[arg(short = 'N', long)]
        latest: bool,
    },
    /// Generate metadata.json from metadata.rb
    Metadata {
        name: Option<String>,
        /// Generate for every cookbook
        #[arg(short = 'a', long)]
        all: bool,
        /// Colon-separated cookbook path
        #[arg(short = 'o', long)]
        cookbook_path: Option<String>,
    },
    /// Upload cookbooks
    Upload {
        names: Vec<String>,
        /// Upload every cookbook
        #[arg(short = 'a', long)]
        all: bool,
        /// Colon-separated cookbook path
        #[arg(short = 'o', long)]
        cookbook_path: Option<String>,
    },
    /// Community cookbook site
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SiteCommands {
    /// List site cookbooks
    List {
        #[arg(short = 'w', long)]
        with_uri: bool,
    },
    /// Search site cookbooks
    Search { query: Option<String> },
    /// Show a site cookbook
    Show {
        name: Option<String>,
        version: Option<String>,
    },
    /// Download a site cookbook tarball
    Download {
        name: Option<String>,
        version: Option<String>,
        /// Target file
        #[arg(short = 'f', long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    /// Import a site cookbook into the cookbook repository
    Vendor {
        name: Option<String>,
        /// Also vendor dependencies
        #[arg(short = 'd', long)]
        dependencies: bool,
        /// Colon-separated cookbook path
        #[arg(short = 'o', long)]
        cookbook_path: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Data bags and items
    Bag {
        #[command(subcommand)]
        command: BagCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BagCommands {
    /// List data bags
    List {
        #[arg(short = 'w', long)]
        with_uri: bool,
    },
    /// Show a bag's items, or one item
    Show {
        bag: Option<String>,
        item: Option<String>,
    },
    /// Create a bag, or an item in it
    Create {
        bag: Option<String>,
        item: Option<String>,
        #[arg(short = 'p', long)]
        print_after: bool,
    },
    /// Delete a bag, or an item in it
    Delete {
        bag: Option<String>,
        item: Option<String>,
    },
    /// Edit an item
    Edit {
        /// BAG ITEM
        args: Vec<String>,
        #[arg(short = 'p', long)]
        print_after: bool,
    },
    /// Load items from files
    From {
        #[command(subcommand)]
        command: BagFromCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BagFromCommands {
    /// Create or update an item from a JSON file
    File {
        bag: Option<String>,
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// List nodes
    List {
        #[arg(short = 'w', long)]
        with_uri: bool,
    },
    /// Show a node
    Show {
        name: Option<String>,
        #[arg(short = 'a', long)]
        attribute: Option<String>,
        /// Only show the run list
        #[arg(short = 'r', long)]
        run_list: bool,
    },
    /// Create a node
    Create {
        name: Option<String>,
        #[arg(short = 'p', long)]
        print_after: bool,
    },
    /// Edit a node
    Edit {
        name: Option<String>,
        #[arg(short = 'p', long)]
        print_after: bool,
    },
    /// Delete a node
    Delete { name: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    /// List roles
    List {
        #[arg(short = 'w', long)]
        with_uri: bool,
    },
    /// Show a role
    Show {
        name: Option<String>,
        #[arg(short = 'a', long)]
        attribute: Option<String>,
    },
    /// Delete a role
    Delete { name: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum Ec2Commands {
    /// Instance user data
    Instance {
        #[command(subcommand)]
        command: Ec2InstanceCommands,
    },
    /// EC2 servers
    Server {
        #[command(subcommand)]
        command: Ec2ServerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum Ec2InstanceCommands {
    /// Generate user data for a new instance
    Data {
        run_list: Vec<String>,
        /// Edit the data before printing
        #[arg(short = 'e', long)]
        edit: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Ec2ServerCommands {
    /// List instances
    List,
    /// Terminate instances
    Delete { ids: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum RackspaceCommands {
    /// Rackspace servers
    Server {
        #[command(subcommand)]
        command: RackspaceServerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum RackspaceServerCommands {
    /// Create and bootstrap a server
    Create {
        run_list: Vec<String>,
        #[arg(short = 'f', long)]
        flavor: Option<String>,
        #[arg(short = 'i', long)]
        image: Option<String>,
        #[arg(short = 'N', long = "server-name")]
        name: Option<String>,
        #[arg(long)]
        distro: Option<String>,
    },
    /// Delete a server
    Delete { id: Option<String> },
    /// List servers
    List,
}

#[derive(Subcommand, Debug)]
pub enum SlicehostCommands {
    /// Slicehost images
    Images {
        #[command(subcommand)]
        command: SlicehostImagesCommands,
    },
    /// Slicehost slices
    Server {
        #[command(subcommand)]
        command: SlicehostServerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SlicehostImagesCommands {
    /// List images
    List,
}

#[derive(Subcommand, Debug)]
pub enum SlicehostServerCommands {
    /// Create a slice
    Create {
        #[arg(short = 'f', long)]
        flavor: Option<String>,
        #[arg(short = 'i', long)]
        image: Option<String>,
        #[arg(short = 'N', long = "server-name")]
        name: Option<String>,
    },
    /// Delete a slice by name
    Delete { name: Option<String> },
    /// List slices
    List,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
