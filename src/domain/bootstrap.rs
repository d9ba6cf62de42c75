//! Bootstrap script rendering for fresh hosts

use serde_json::json;

use crate::domain::DomainError;

pub const DEFAULT_DISTRO: &str = "ubuntu10.04-gems";

const UBUNTU_GEMS: &str = r#"if [ ! -f /usr/bin/chef-client ]; then
  apt-get update
  apt-get install -y ruby ruby1.8-dev build-essential wget libruby1.8-extras libruby1.8 libopenssl-ruby1.8 rdoc ri irb
  cd /tmp
  wget http://production.cf.rubygems.org/rubygems/rubygems-1.3.7.tgz
  tar zxf rubygems-1.3.7.tgz
  cd rubygems-1.3.7
  ruby setup.rb --no-format-executable
fi
gem update --no-rdoc --no-ri
gem install ohai --no-rdoc --no-ri --verbose
gem install chef --no-rdoc --no-ri --verbose
"#;

const UBUNTU_APT: &str = r#"if [ ! -f /usr/bin/chef-client ]; then
  echo "deb http://apt.opscode.com/ lucid main" > /etc/apt/sources.list.d/opscode.list
  wget -qO - http://apt.opscode.com/packages@opscode.com.gpg.key | apt-key add -
  apt-get update
  DEBIAN_FRONTEND=noninteractive apt-get install -y chef
fi
"#;

const CENTOS_GEMS: &str = r#"if [ ! -f /usr/bin/chef-client ]; then
  rpm -Uvh http://download.fedora.redhat.com/pub/epel/5/i386/epel-release-5-4.noarch.rpm
  yum install -y ruby ruby-devel gcc gcc-c++ automake autoconf make wget
  cd /tmp
  wget http://production.cf.rubygems.org/rubygems/rubygems-1.3.7.tgz
  tar zxf rubygems-1.3.7.tgz
  cd rubygems-1.3.7
  ruby setup.rb --no-format-executable
fi
gem update --no-rdoc --no-ri
gem install ohai --no-rdoc --no-ri --verbose
gem install chef --no-rdoc --no-ri --verbose
"#;

/// Values baked into a bootstrap script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapContext {
    pub chef_server_url: String,
    pub validation_client_name: String,
    pub validation_key: String,
    pub node_name: Option<String>,
    pub run_list: Vec<String>,
    pub distro: String,
}

fn install_section(distro: &str) -> Result<&'static str, DomainError> {
    match distro {
        "ubuntu10.04-gems" => Ok(UBUNTU_GEMS),
        "ubuntu10.04-apt" => Ok(UBUNTU_APT),
        "centos5-gems" => Ok(CENTOS_GEMS),
        other => Err(DomainError::UnknownDistro(other.to_string())),
    }
}

/// Render the shell script that installs the client, writes its
/// configuration, and runs it once with the requested run list.
pub fn render_bootstrap_script(ctx: &BootstrapContext) -> Result<String, DomainError> {
    let install = install_section(&ctx.distro)?;

    let mut client_rb = format!(
        "log_level        :info\nlog_location     STDOUT\nchef_server_url  \"{}\"\nvalidation_client_name \"{}\"\n",
        ctx.chef_server_url, ctx.validation_client_name
    );
    if let Some(node_name) = &ctx.node_name {
        client_rb.push_str(&format!("node_name \"{node_name}\"\n"));
    }
    let first_boot = json!({ "run_list": ctx.run_list }).to_string();

    Ok(format!(
        "set -e\n{install}\nmkdir -p /etc/chef\n\n\
         cat > /etc/chef/validation.pem <<'EOP'\n{key}\nEOP\n\n\
         cat > /etc/chef/client.rb <<'EOP'\n{client_rb}EOP\n\n\
         cat > /etc/chef/first-boot.json <<'EOP'\n{first_boot}\nEOP\n\n\
         chef-client -j /etc/chef/first-boot.json\n",
        key = ctx.validation_key.trim_end(),
    ))
}
