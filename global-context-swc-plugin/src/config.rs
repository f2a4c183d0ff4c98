use serde::Deserialize;

use crate::error::{Error, Result};

pub const REACT_MODULE: &str = "react";
pub const CONTEXT_SELECTOR_MODULE: &str = "@fluentui/react-context-selector";
pub const CREATE_CONTEXT: &str = "createContext";

/// Which global factory a context-creating module is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Native,
    Selector,
}

/// One `{ moduleSource, importName }` pair recognised by the pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    pub module_source: String,
    pub import_name: String,
    #[serde(default)]
    pub variant: Option<Variant>,
}

impl ModuleSpec {
    pub fn new(module_source: impl Into<String>, import_name: impl Into<String>) -> Self {
        Self {
            module_source: module_source.into(),
            import_name: import_name.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Explicit variant, else `react` is native and anything else is a selector module.
    pub fn variant(&self) -> Variant {
        self.variant.unwrap_or(if self.module_source == REACT_MODULE {
            Variant::Native
        } else {
            Variant::Selector
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleSpec>,
}

fn default_modules() -> Vec<ModuleSpec> {
    vec![
        ModuleSpec::new(REACT_MODULE, CREATE_CONTEXT),
        ModuleSpec::new(CONTEXT_SELECTOR_MODULE, CREATE_CONTEXT),
    ]
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            modules: default_modules(),
        }
    }
}

impl PluginConfig {
    /// Parses plugin options; an empty or whitespace-only string means "use defaults".
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PluginConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(Error::InvalidConfig("`modules` must not be empty".into()));
        }
        for (i, m) in self.modules.iter().enumerate() {
            if m.module_source.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "modules[{i}].moduleSource must not be empty"
                )));
            }
            if m.import_name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "modules[{i}].importName must not be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn specs_for_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a ModuleSpec> {
        self.modules.iter().filter(move |m| m.module_source == source)
    }
}
