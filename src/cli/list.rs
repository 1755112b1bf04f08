//! List CLI commands

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::render::{render_engines, render_namespaces, ListFormat, ListOptions};
use crate::store::StoreClient;
use crate::walker::{walk_engines, walk_namespaces};

/// Flags shared by the engine and namespace listings.
#[derive(Debug, Clone)]
pub struct ListFlags {
    pub namespace: String,
    pub include_prefix: bool,
    pub regex: Option<String>,
    pub all: bool,
    pub format: String,
}

impl ListFlags {
    pub fn options(&self) -> Result<ListOptions> {
        Ok(ListOptions {
            format: self.format.parse::<ListFormat>()?,
            include_prefix: self.include_prefix,
            all: self.all,
            regex: self.regex.clone(),
        })
    }
}

/// Declares a clap argument group for a listing, with every flag bound to
/// `<prefix><FIELD>` in the environment.
macro_rules! list_flags {
    ($name:ident, $prefix:literal) => {
        #[derive(clap::Args, Debug, Clone)]
        pub struct $name {
            /// Namespace to start from
            #[arg(short, long, env = concat!($prefix, "NAMESPACE"), default_value = "")]
            pub namespace: String,

            /// Prefix every name with its namespace path
            #[arg(
                short = 'p',
                long = "include-namespace-prefix",
                env = concat!($prefix, "INCLUDE_NAMESPACE_PREFIX")
            )]
            pub include_prefix: bool,

            /// Keep only names matching this regular expression
            #[arg(short, long, env = concat!($prefix, "REGEX"), value_name = "REGEX")]
            pub regex: Option<String>,

            /// Include every namespace below the starting one
            #[arg(short, long, env = concat!($prefix, "ALL"))]
            pub all: bool,

            /// Output format
            #[arg(
                short,
                long,
                env = concat!($prefix, "FORMAT"),
                default_value = "base",
                value_parser = ["base", "yaml", "yml", "json"]
            )]
            pub format: String,
        }

        impl From<$name> for $crate::cli::list::ListFlags {
            fn from(flags: $name) -> Self {
                $crate::cli::list::ListFlags {
                    namespace: flags.namespace,
                    include_prefix: flags.include_prefix,
                    regex: flags.regex,
                    all: flags.all,
                    format: flags.format,
                }
            }
        }
    };
}

pub(crate) use list_flags;

list_flags!(NamespaceListFlags, "VKV_LIST_NAMESPACES_");
list_flags!(EngineListFlags, "VKV_LIST_ENGINES_");

#[derive(Subcommand, Debug, Clone)]
pub enum ListCommands {
    /// List child namespaces
    #[command(
        after_help = "EXAMPLES:\n    # Direct children of the base namespace\n    vkv list namespaces\n\n    # Every namespace below 'team' as JSON\n    vkv list namespaces -n team -a -f json"
    )]
    Namespaces {
        #[command(flatten)]
        flags: NamespaceListFlags,
    },

    /// List KV v2 engines
    #[command(
        after_help = "EXAMPLES:\n    # Engines of the base namespace\n    vkv list engines\n\n    # Every engine of every namespace, with prefixes\n    vkv list engines -a -p"
    )]
    Engines {
        #[command(flatten)]
        flags: EngineListFlags,
    },
}

/// Handle list commands
pub async fn handle_list_command(
    command: ListCommands,
    client: &dyn StoreClient,
    out: &mut dyn Write,
) -> Result<()> {
    let text = match command {
        ListCommands::Namespaces { flags } => {
            let flags = ListFlags::from(flags);
            let options = flags.options()?;
            let namespaces = walk_namespaces(client, &flags.namespace)
                .await
                .with_context(|| format!("Failed to list namespaces of '{}'", flags.namespace))?;
            render_namespaces(&namespaces, &flags.namespace, &options)?
        }
        ListCommands::Engines { flags } => {
            let flags = ListFlags::from(flags);
            let options = flags.options()?;
            let engines = walk_engines(client, &flags.namespace)
                .await
                .with_context(|| format!("Failed to list engines of '{}'", flags.namespace))?;
            render_engines(&engines, &flags.namespace, &options)?
        }
    };
    out.write_all(text.as_bytes()).context("Failed to write listing")?;
    Ok(())
}
