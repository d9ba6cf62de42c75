//! Command dispatch: settings → container → service → output

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::services::{
    BootstrapRequest, DownloadOptions, RackspaceCreate, SearchOutput, SearchQuery, SliceCreate,
};
use crate::application::{ApplicationError, IoResultExt, UiOptions};
use crate::cli::args::{
    BagCommands, BagFromCommands, Cli, ClientCommands, Commands, ConfigCommands,
    ConfigureCommands, CookbookCommands, DataCommands, Ec2Commands, Ec2InstanceCommands,
    Ec2ServerCommands, NodeCommands, OutputFormat, RackspaceCommands, RackspaceServerCommands,
    RoleCommands, SiteCommands, SlicehostCommands, SlicehostImagesCommands,
    SlicehostServerCommands,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{self, Settings};
use crate::domain::{expand_env_vars, split_run_list};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::ServiceContainer;

/// Run the parsed command line.
pub fn execute(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::InvalidArgs("no command given".to_string()));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::build_command();
            clap_complete::generate(*shell, &mut cmd, "knife", &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => return run_config(cli, command),
        _ => {}
    }

    let settings = load_settings(cli, command)?;
    let container = ServiceContainer::new(
        settings,
        UiOptions {
            assume_yes: cli.yes,
            no_editor: cli.no_editor,
        },
    );
    dispatch(&container, command, cli.format)
}

/// Layered settings plus command-line overrides.
pub fn load_settings(cli: &Cli, command: &Commands) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_overrides(&mut settings, cli, command);
    debug!("settings: {:?}", settings);
    Ok(settings)
}

/// Global `-s`, `-u`, `-k`, `--editor`, then the per-command flags.
fn apply_overrides(settings: &mut Settings, cli: &Cli, command: &Commands) {
    if let Some(url) = &cli.server_url {
        settings.chef_server_url = url.clone();
    }
    if let Some(user) = &cli.user {
        settings.node_name = user.clone();
    }
    if let Some(key) = &cli.key {
        settings.client_key = key.clone();
    }
    if let Some(editor) = &cli.editor {
        settings.editor = editor.clone();
    }
    apply_command_overrides(settings, command);
}

/// Per-command `-o PATH` and `-E ENV`.
fn apply_command_overrides(settings: &mut Settings, command: &Commands) {
    let Commands::Cookbook { command } = command else {
        return;
    };
    let cookbook_path = match command {
        CookbookCommands::Metadata { cookbook_path, .. }
        | CookbookCommands::Upload { cookbook_path, .. }
        | CookbookCommands::Site {
            command: SiteCommands::Vendor { cookbook_path, .. },
        } => cookbook_path.as_deref(),
        CookbookCommands::List {
            environment: Some(env),
            ..
        } => {
            settings.environment = Some(env.clone());
            None
        }
        _ => None,
    };
    if let Some(paths) = cookbook_path {
        settings.cookbook_path = split_path_list(paths);
    }
}

fn split_path_list(paths: &str) -> Vec<PathBuf> {
    paths
        .split(':')
        .filter(|p| !p.is_empty())
        .map(|p| PathBuf::from(expand_env_vars(p)))
        .collect()
}

/// Run one command against an already wired container.
#[instrument(skip(container))]
pub fn dispatch(
    container: &ServiceContainer,
    command: &Commands,
    format: OutputFormat,
) -> CliResult<()> {
    match command {
        Commands::Client { command } => run_client(container, command, format),
        Commands::Configure {
            command: ConfigureCommands::Client { dir },
        } => Ok(container.configure_service().configure_client(dir.as_deref())?),
        Commands::Cookbook { command } => run_cookbook(container, command, format),
        Commands::Data {
            command: DataCommands::Bag { command },
        } => run_data_bag(container, command, format),
        Commands::Node { command } => run_node(container, command, format),
        Commands::Role { command } => run_role(container, command, format),
        Commands::Search {
            index,
            query,
            sort,
            start,
            rows,
            id_only,
            run_list,
            attribute,
        } => {
            let query = SearchQuery {
                index: index.clone(),
                query: query.clone(),
                sort: sort.clone(),
                start: *start,
                rows: *rows,
                attribute: attribute.clone(),
                run_list: *run_list,
            };
            match container.search_service()?.search(&query, *id_only)? {
                SearchOutput::Ids(ids) => {
                    for id in &ids {
                        output::info(id);
                    }
                    Ok(())
                }
                SearchOutput::Rows(rows) => output::output(&rows, format),
            }
        }
        Commands::Exec { scripts, code } => run_exec(container, scripts, code.as_deref()),
        Commands::Ec2 { command } => run_ec2(container, command, format),
        Commands::Rackspace {
            command: RackspaceCommands::Server { command },
        } => run_rackspace(container, command),
        Commands::Slicehost { command } => run_slicehost(container, command),
        Commands::Bootstrap {
            host,
            ssh_user,
            ssh_password,
            node_name,
            run_list,
            distro,
            sudo,
            dry_run,
        } => {
            let request = BootstrapRequest {
                host: host.clone().unwrap_or_default(),
                ssh_user: ssh_user
                    .clone()
                    .unwrap_or_else(|| container.settings.knife.ssh_user.clone()),
                ssh_password: ssh_password.clone(),
                node_name: node_name.clone(),
                run_list: split_run_list(run_list),
                distro: distro.clone(),
                sudo: *sudo,
            };
            let service = container.bootstrap_service();
            if *dry_run {
                output::info(&service.script(&request)?);
                Ok(())
            } else {
                Ok(service.run(&request)?)
            }
        }
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::InvalidArgs(
            "command cannot run inside a script".to_string(),
        )),
    }
}

fn run_client(
    container: &ServiceContainer,
    command: &ClientCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let service = container.client_service()?;
    match command {
        ClientCommands::List { with_uri } => output::output(&service.list(*with_uri)?, format),
        ClientCommands::Show { name, attribute } => {
            output::output(&service.show(name.as_deref(), attribute.as_deref())?, format)
        }
        ClientCommands::Edit { name, print_after } => {
            let saved = service.edit(name.as_deref())?;
            print_after_save(*print_after, &saved, format)
        }
        ClientCommands::Delete { name } => Ok(service.delete(name.as_deref())?),
        ClientCommands::Create { name, file, admin } => {
            let key = service.create(name.as_deref(), *admin)?;
            emit_key(&service, file.as_deref(), &key)
        }
        ClientCommands::Reregister { name, file } => {
            let key = service.reregister(name.as_deref())?;
            emit_key(&service, file.as_deref(), &key)
        }
    }
}

fn emit_key(
    service: &crate::application::services::ClientService,
    file: Option<&Path>,
    key: &str,
) -> CliResult<()> {
    match file {
        Some(path) => Ok(service.write_key(path, key)?),
        None => {
            output::info(&key);
            Ok(())
        }
    }
}

fn print_after_save(print_after: bool, saved: &Value, format: OutputFormat) -> CliResult<()> {
    if print_after {
        output::output(saved, format)?;
    }
    Ok(())
}

fn run_cookbook(
    container: &ServiceContainer,
    command: &CookbookCommands,
    format: OutputFormat,
) -> CliResult<()> {
    if let CookbookCommands::Site { command } = command {
        return run_site(container, command, format);
    }
    let service = container.cookbook_service()?;
    match command {
        CookbookCommands::List { with_uri, .. } => {
            output::output(&service.list(*with_uri)?, format)
        }
        CookbookCommands::Delete {
            name,
            version,
            all,
            purge,
        } => Ok(service.delete(name.as_deref(), version.as_deref(), *all, *purge)?),
        CookbookCommands::Download {
            name,
            version,
            dir,
            force,
            latest,
        } => {
            let options = DownloadOptions {
                dir: dir.clone(),
                force: *force,
                latest: *latest,
            };
            service.download(name.as_deref(), version.as_deref(), &options)?;
            Ok(())
        }
        CookbookCommands::Metadata { name, all, .. } => {
            Ok(service.generate_metadata(name.as_deref(), *all)?)
        }
        CookbookCommands::Upload { names, all, .. } => Ok(service.upload(names, *all)?),
        CookbookCommands::Site { .. } => Ok(()),
    }
}

fn run_site(
    container: &ServiceContainer,
    command: &SiteCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let service = container.cookbook_site_service()?;
    match command {
        SiteCommands::List { with_uri } => output::output(&service.list(*with_uri)?, format),
        SiteCommands::Search { query } => {
            output::output(&service.search(query.as_deref())?, format)
        }
        SiteCommands::Show { name, version } => {
            output::output(&service.show(name.as_deref(), version.as_deref())?, format)
        }
        SiteCommands::Download {
            name,
            version,
            file,
        } => {
            service.download(name.as_deref(), version.as_deref(), file.as_deref())?;
            Ok(())
        }
        SiteCommands::Vendor {
            name, dependencies, ..
        } => Ok(service.vendor(name.as_deref(), *dependencies)?),
    }
}

fn run_data_bag(
    container: &ServiceContainer,
    command: &BagCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let service = container.data_bag_service()?;
    match command {
        BagCommands::List { with_uri } => output::output(&service.list(*with_uri)?, format),
        BagCommands::Show { bag, item } => {
            output::output(&service.show(bag.as_deref(), item.as_deref())?, format)
        }
        BagCommands::Create {
            bag,
            item,
            print_after,
        } => match service.create(bag.as_deref(), item.as_deref())? {
            Some(created) => print_after_save(*print_after, &created, format),
            None => Ok(()),
        },
        BagCommands::Delete { bag, item } => {
            Ok(service.delete(bag.as_deref(), item.as_deref())?)
        }
        BagCommands::Edit { args, print_after } => {
            let saved = service.edit(args)?;
            print_after_save(*print_after, &saved, format)
        }
        BagCommands::From {
            command: BagFromCommands::File { bag, file },
        } => Ok(service.from_file(bag.as_deref(), file.as_deref())?),
    }
}

fn run_node(
    container: &ServiceContainer,
    command: &NodeCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let service = container.node_service()?;
    match command {
        NodeCommands::List { with_uri } => output::output(&service.list(*with_uri)?, format),
        NodeCommands::Show {
            name,
            attribute,
            run_list,
        } => output::output(
            &service.show(name.as_deref(), attribute.as_deref(), *run_list)?,
            format,
        ),
        NodeCommands::Create { name, print_after } => {
            let created = service.create(name.as_deref())?;
            print_after_save(*print_after, &created, format)
        }
        NodeCommands::Edit { name, print_after } => {
            let saved = service.edit(name.as_deref())?;
            print_after_save(*print_after, &saved, format)
        }
        NodeCommands::Delete { name } => Ok(service.delete(name.as_deref())?),
    }
}

fn run_role(
    container: &ServiceContainer,
    command: &RoleCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let service = container.role_service()?;
    match command {
        RoleCommands::List { with_uri } => output::output(&service.list(*with_uri)?, format),
        RoleCommands::Show { name, attribute } => {
            output::output(&service.show(name.as_deref(), attribute.as_deref())?, format)
        }
        RoleCommands::Delete { name } => Ok(service.delete(name.as_deref())?),
    }
}

/// Parse every script, then run its lines in order; the first failure stops the run.
fn run_exec(container: &ServiceContainer, scripts: &[String], code: Option<&str>) -> CliResult<()> {
    let service = container.exec_service();
    let sources = service.sources(code, scripts, || {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    })?;
    for command in service.parse(&sources)? {
        debug!("exec: {} {:?}", command.location(), command.argv);
        let script_error = |source: CliError| CliError::Script {
            location: command.location(),
            source: Box::new(source),
        };
        let line = Cli::try_parse_from(std::iter::once("knife".to_string()).chain(command.argv.clone()))
            .map_err(|e| script_error(CliError::InvalidArgs(e.to_string())))?;
        let Some(inner) = &line.command else {
            continue;
        };
        let line_container = line_container(container, &line, inner).map_err(script_error)?;
        dispatch(&line_container, inner, line.format).map_err(script_error)?;
    }
    Ok(())
}

/// Container for one script line: its own flags on top of the script's settings.
fn line_container(
    container: &ServiceContainer,
    line: &Cli,
    command: &Commands,
) -> CliResult<ServiceContainer> {
    let mut settings = match &line.config {
        Some(path) => Settings::load(Some(path))?,
        None => container.settings.as_ref().clone(),
    };
    apply_overrides(&mut settings, line, command);
    let options = UiOptions {
        assume_yes: container.options.assume_yes || line.yes,
        no_editor: container.options.no_editor || line.no_editor,
    };
    Ok(container.derive(settings, options))
}

fn run_ec2(
    container: &ServiceContainer,
    command: &Ec2Commands,
    format: OutputFormat,
) -> CliResult<()> {
    match command {
        Ec2Commands::Instance {
            command: Ec2InstanceCommands::Data { run_list, edit },
        } => {
            let data = container
                .instance_data_service()
                .instance_data(&split_run_list(run_list), *edit)?;
            output::output(&data, format)
        }
        Ec2Commands::Server {
            command: Ec2ServerCommands::List,
        } => {
            let rows: Vec<Vec<String>> = container
                .ec2_service()?
                .list()?
                .into_iter()
                .map(|s| {
                    vec![
                        s.id,
                        s.ip_address.unwrap_or_default(),
                        s.private_ip_address.unwrap_or_default(),
                        s.flavor_id,
                        s.image_id,
                        s.groups.join(", "),
                        s.state,
                    ]
                })
                .collect();
            output::info(&output::table(
                &[
                    "Instance ID",
                    "Public IP",
                    "Private IP",
                    "Flavor",
                    "Image",
                    "Security Groups",
                    "State",
                ],
                &rows,
            ));
            Ok(())
        }
        Ec2Commands::Server {
            command: Ec2ServerCommands::Delete { ids },
        } => Ok(container.ec2_service()?.delete(ids)?),
    }
}

fn run_rackspace(container: &ServiceContainer, command: &RackspaceServerCommands) -> CliResult<()> {
    let service = container.rackspace_service()?;
    match command {
        RackspaceServerCommands::Create {
            run_list,
            flavor,
            image,
            name,
            distro,
        } => {
            service.create(&RackspaceCreate {
                name: name.clone(),
                flavor: flavor.clone(),
                image: image.clone(),
                run_list: split_run_list(run_list),
                distro: distro.clone(),
            })?;
            Ok(())
        }
        RackspaceServerCommands::Delete { id } => Ok(service.delete(id.as_deref())?),
        RackspaceServerCommands::List => {
            let rows: Vec<Vec<String>> = service
                .list()?
                .into_iter()
                .map(|s| {
                    vec![
                        s.id,
                        s.name,
                        s.public_ips.first().cloned().unwrap_or_default(),
                        s.private_ips.first().cloned().unwrap_or_default(),
                        s.flavor_id,
                    ]
                })
                .collect();
            output::info(&output::table(
                &["ID", "Name", "Public IP", "Private IP", "Flavor"],
                &rows,
            ));
            Ok(())
        }
    }
}

fn run_slicehost(container: &ServiceContainer, command: &SlicehostCommands) -> CliResult<()> {
    let service = container.slicehost_service()?;
    match command {
        SlicehostCommands::Images {
            command: SlicehostImagesCommands::List,
        } => {
            let rows: Vec<Vec<String>> = service
                .images()?
                .into_iter()
                .map(|i| vec![i.id, i.name])
                .collect();
            output::info(&output::table(&["ID", "Name"], &rows));
            Ok(())
        }
        SlicehostCommands::Server { command } => match command {
            SlicehostServerCommands::Create {
                flavor,
                image,
                name,
            } => {
                service.create(&SliceCreate {
                    name: name.clone(),
                    flavor: flavor.clone(),
                    image: image.clone(),
                })?;
                Ok(())
            }
            SlicehostServerCommands::Delete { name } => Ok(service.delete(name.as_deref())?),
            SlicehostServerCommands::List => {
                let rows: Vec<Vec<String>> = service
                    .list()?
                    .into_iter()
                    .map(|s| vec![s.id, s.name, s.private_ip, s.public_ip, s.image, s.flavor])
                    .collect();
                output::info(&output::table(
                    &["ID", "Name", "Private IP", "Public IP", "Image", "Flavor"],
                    &rows,
                ));
                Ok(())
            }
        },
    }
}

fn run_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(cli.config.as_deref())?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                config::global_config_path().ok_or_else(|| ApplicationError::Config {
                    message: "cannot determine the global config directory".to_string(),
                })?
            } else {
                Path::new(config::LOCAL_CONFIG_DIR).join(config::CONFIG_FILE_NAME)
            };
            let fs = RealFileSystem;
            if fs.exists(&path) {
                return Err(ApplicationError::fatal(format!(
                    "Config file already exists: {}",
                    path.display()
                ))
                .into());
            }
            fs.ensure_parent(&path)
                .with_path_context("create config directory", &path)?;
            fs.write(&path, &Settings::template())
                .with_path_context("write config", &path)?;
            output::action("Created", &path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            output::header("Config files");
            match config::global_config_path() {
                Some(p) => output::info(&format!("global: {}", p.display())),
                None => output::info("global: (unavailable)"),
            }
            let local = std::env::current_dir()
                .ok()
                .and_then(|cwd| config::find_local_config(&cwd));
            match local {
                Some(p) => output::info(&format!("local:  {}", p.display())),
                None => output::info("local:  (none)"),
            }
            Ok(())
        }
    }
}
