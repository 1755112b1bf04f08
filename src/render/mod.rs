//! # Renderer
//!
//! Turns a walked [`Tree`] into one of seven output shapes. All backends
//! share one set of [`RenderOptions`], validated up front, and the same
//! projection step (key-only, path-only, masking, truncation).
//!
//! Trees are rendered relative to a target: the engine they were read from
//! and the engine-relative directory (`base`) they hang off. The label
//! shown for the root is `engine/` followed by `base`.

pub mod export;
pub mod list;
pub mod markdown;
pub mod policy;
pub mod table;
pub mod template;
pub mod tree;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{Result, VkvError};
use crate::projection::{mask_values, only_keys, only_paths, path_prefix, truncate_values};
use crate::store::{Capability, Tree};

pub use list::{render_engines, render_names, render_namespaces, ListFormat, ListOptions};

/// Default cap for masked and truncated values.
pub const DEFAULT_MAX_VALUE_LENGTH: i64 = 12;

/// Output backends of the export command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Tree,
    Yaml,
    Json,
    Export,
    Markdown,
    Policy,
    Template,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 8] =
        ["base", "tree", "yaml", "json", "export", "markdown", "policy", "template"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "base",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Export => "export",
            Self::Markdown => "markdown",
            Self::Policy => "policy",
            Self::Template => "template",
        }
    }

    /// Formats that exist to round-trip or export data, so always show it.
    fn is_structural(&self) -> bool {
        matches!(self, Self::Yaml | Self::Json | Self::Export | Self::Template)
    }
}

impl FromStr for OutputFormat {
    type Err = VkvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base" | "tree" => Ok(Self::Tree),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "export" => Ok(Self::Export),
            "markdown" | "md" => Ok(Self::Markdown),
            "policy" => Ok(Self::Policy),
            "template" | "tmpl" => Ok(Self::Template),
            other => Err(VkvError::bad_input(format!(
                "unsupported format '{}', use one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub only_keys: bool,
    pub only_paths: bool,
    pub show_values: bool,
    /// Cap for masked and truncated values; `-1` disables it.
    pub max_value_length: i64,
    pub show_version: bool,
    pub show_metadata: bool,
    pub template: Option<String>,
    pub export_upper: bool,
    pub export_include_path: bool,
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Tree,
            only_keys: false,
            only_paths: false,
            show_values: false,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            show_version: false,
            show_metadata: false,
            template: None,
            export_upper: false,
            export_include_path: false,
            color: false,
        }
    }
}

impl RenderOptions {
    pub fn with_format(format: OutputFormat) -> Self {
        Self { format, ..Self::default() }
    }

    /// Reject contradicting flags, then apply the settings each format
    /// forces on.
    pub fn normalize(mut self) -> Result<Self> {
        if self.only_keys && self.only_paths {
            return Err(VkvError::bad_option_combo(
                "cannot specify both --only-keys and --only-paths",
            ));
        }
        if self.only_keys && self.show_values {
            return Err(VkvError::bad_option_combo(
                "cannot specify both --only-keys and --show-values",
            ));
        }
        if self.only_paths && self.show_values {
            return Err(VkvError::bad_option_combo(
                "cannot specify both --only-paths and --show-values",
            ));
        }
        if self.max_value_length < -1 {
            return Err(VkvError::bad_input("--max-value-length must be -1 or greater"));
        }

        if self.format == OutputFormat::Template && self.template.is_none() {
            return Err(VkvError::bad_option_combo(
                "template format requires --template-string or --template-file",
            ));
        }

        if self.format.is_structural() {
            self.show_values = true;
            self.max_value_length = -1;
            self.only_keys = false;
            self.only_paths = false;
        }
        if self.format == OutputFormat::Policy {
            self.show_values = true;
        }
        Ok(self)
    }
}

/// Pick the template text from exactly one of an inline string or a file.
pub fn template_source(string: Option<String>, file: Option<&Path>) -> Result<Option<String>> {
    match (string, file) {
        (Some(_), Some(_)) => Err(VkvError::bad_option_combo(
            "cannot specify both --template-string and --template-file",
        )),
        (Some(text), None) => Ok(Some(text)),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| VkvError::io(path.display().to_string(), e)),
        (None, None) => Ok(None),
    }
}

/// Label of the tree root: `engine/` followed by the base directory.
pub fn root_label(engine: &str, base: &str) -> String {
    format!("{}/{}", engine.trim_matches('/'), base.trim_start_matches('/'))
}

/// A configured renderer.
#[derive(Debug, Clone)]
pub struct Renderer {
    options: RenderOptions,
    capabilities: BTreeMap<String, Capability>,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Result<Self> {
        Ok(Self { options: options.normalize()?, capabilities: BTreeMap::new() })
    }

    /// Capabilities for the policy backend, keyed by full path
    /// (`engine/sub/path`).
    pub fn with_capabilities(mut self, capabilities: BTreeMap<String, Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Apply key-only, path-only, masking or truncation.
    pub fn project(&self, tree: &Tree) -> Tree {
        let options = &self.options;
        if options.only_keys {
            only_keys(tree)
        } else if options.only_paths {
            only_paths(tree)
        } else if !options.show_values {
            mask_values(tree, options.max_value_length)
        } else {
            truncate_values(tree, options.max_value_length)
        }
    }

    /// Render `tree`, read from `engine` below `base`.
    pub fn render(&self, engine: &str, base: &str, tree: &Tree) -> Result<String> {
        let label = root_label(engine, base);
        let projected = self.project(tree);

        match self.options.format {
            OutputFormat::Tree => Ok(tree::render(&label, &projected, &self.options)),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&path_prefix(&projected, &label))
                    .map_err(|e| VkvError::internal(format!("failed to serialize YAML: {}", e)))
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&path_prefix(&projected, &label))
                    .map_err(|e| VkvError::internal(format!("failed to serialize JSON: {}", e)))?;
                Ok(format!("{}\n", json))
            }
            OutputFormat::Export => Ok(export::render(base, &projected, &self.options)),
            OutputFormat::Markdown => Ok(markdown::render(&label, &projected, &self.options)),
            OutputFormat::Policy => {
                Ok(policy::render(&label, &projected, &self.capabilities, self.options.color))
            }
            OutputFormat::Template => {
                let source = self.options.template.as_deref().unwrap_or_default();
                template::render(source, base, &projected)
            }
        }
    }

    /// Render into a writer.
    pub fn render_to<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        engine: &str,
        base: &str,
        tree: &Tree,
    ) -> Result<()> {
        let text = self.render(engine, base, tree)?;
        writer.write_all(text.as_bytes()).map_err(|e| VkvError::io("output", e))
    }
}
