use std::path::PathBuf;

use capstan_core::Identity;
use clap::{Args, Parser, Subcommand};

/// Capstan: discover, enable and call plugin capabilities
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Settings file (defaults to ./capstan.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the plugin root directory
    #[arg(long, global = true, value_name = "DIR")]
    pub plugins_dir: Option<PathBuf>,

    /// Override the durable state directory
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// List the capabilities available to an identity
    Tools {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call a capability and print the dispatch result as JSON
    Call {
        /// Capability name
        name: String,

        /// Arguments as a JSON object
        #[arg(long, value_name = "JSON")]
        args: Option<String>,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginCommand {
    /// List discovered plugins and their state
    List {
        /// Print manifests as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enable a plugin (persisted)
    Enable {
        /// The name of the plugin to enable
        name: String,
    },
    /// Disable a plugin (persisted)
    Disable {
        /// The name of the plugin to disable
        name: String,
    },
    /// Rediscover plugins and rebuild the capability index
    Refresh,
}

#[derive(Args, Debug, Default)]
pub struct IdentityArgs {
    /// Subject to act as (anonymous when omitted)
    #[arg(long)]
    pub subject: Option<String>,

    /// Role granted to the subject; repeatable
    #[arg(long = "role", value_name = "ROLE")]
    pub roles: Vec<String>,
}

impl IdentityArgs {
    pub fn identity(&self) -> Identity {
        let identity = match &self.subject {
            Some(subject) => Identity::new(subject),
            None => Identity::anonymous(),
        };
        self.roles.iter().fold(identity, |identity, role| identity.with_role(role))
    }
}
