//! Find CLI commands
//!
//! Searches the whole store for namespaces, engines, paths, keys and values.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::list::{list_flags, ListFlags};
use crate::render::render_names;
use crate::search::{find_engines, find_namespaces, find_secrets, render_matches, FindOutput};
use crate::store::StoreClient;

list_flags!(EngineFindFlags, "VKV_FIND_ENGINES_");
list_flags!(NamespaceFindFlags, "VKV_FIND_NAMESPACES_");

#[derive(Subcommand, Debug, Clone)]
pub enum FindCommands {
    /// Find secrets whose path, keys or values match a pattern
    #[command(
        after_help = "EXAMPLES:\n    # Everything mentioning 'db'\n    vkv find secrets -p db\n\n    # Only paths, with links to the web UI\n    vkv find secrets -p '^prod' --no-match-kind --print-url"
    )]
    Secrets {
        /// Regular expression to search for
        #[arg(short, long, env = "VKV_FIND_SECRETS_PATTERN", value_name = "REGEX")]
        pattern: String,

        /// Omit the header row
        #[arg(long, env = "VKV_FIND_SECRETS_NO_HEADER")]
        no_header: bool,

        /// Add a column linking to the web UI
        #[arg(long, env = "VKV_FIND_SECRETS_PRINT_URL")]
        print_url: bool,

        /// Omit the match kind column
        #[arg(long, env = "VKV_FIND_SECRETS_NO_MATCH_KIND")]
        no_match_kind: bool,
    },

    /// Find engines whose name matches a pattern, in every namespace
    #[command(after_help = "EXAMPLES:\n    # Engines named like 'kv'\n    vkv find engines -r kv")]
    Engines {
        #[command(flatten)]
        flags: EngineFindFlags,
    },

    /// Find namespaces whose path matches a pattern
    #[command(after_help = "EXAMPLES:\n    # Production namespaces\n    vkv find namespaces -r prod")]
    Namespaces {
        #[command(flatten)]
        flags: NamespaceFindFlags,
    },
}

/// Display toggles that come from the environment rather than flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindDisplay {
    pub color: bool,
    pub hyperlinks: bool,
}

/// Handle find commands
pub async fn handle_find_command(
    command: FindCommands,
    client: &dyn StoreClient,
    display: FindDisplay,
    out: &mut dyn Write,
) -> Result<()> {
    let text = match command {
        FindCommands::Secrets { pattern, no_header, print_url, no_match_kind } => {
            let matches = find_secrets(client, &pattern)
                .await
                .with_context(|| format!("Failed to search for '{}'", pattern))?;
            let output = FindOutput {
                header: !no_header,
                match_kind: !no_match_kind,
                print_url,
                hyperlinks: display.hyperlinks,
                color: display.color,
            };
            render_matches(&matches, &output)
        }
        FindCommands::Engines { flags } => {
            let flags = ListFlags::from(flags);
            let options = flags.options()?;
            let pattern = flags.regex.clone().unwrap_or_default();
            let names = find_engines(client, &flags.namespace, &pattern).await?;
            render_names(&prefixed(names, &flags), options.format)?
        }
        FindCommands::Namespaces { flags } => {
            let flags = ListFlags::from(flags);
            let options = flags.options()?;
            let pattern = flags.regex.clone().unwrap_or_default();
            let names = find_namespaces(client, &flags.namespace, &pattern).await?;
            render_names(&prefixed(names, &flags), options.format)?
        }
    };
    out.write_all(text.as_bytes()).context("Failed to write search results")?;
    Ok(())
}

fn prefixed(names: Vec<String>, flags: &ListFlags) -> Vec<String> {
    if !flags.include_prefix {
        return names;
    }
    names.into_iter().map(|name| crate::utils::join_namespace(&flags.namespace, &name)).collect()
}
