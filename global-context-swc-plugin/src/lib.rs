use std::path::{Path, PathBuf};

use swc_core::{
    ecma::{
        ast::*,
        visit::VisitMutWith,
    },
    plugin::{
        metadata::TransformPluginMetadataContextKind, plugin_transform,
        proxies::TransformPluginProgramMetadata,
    },
};
use tracing::{debug, warn};

pub mod collect;
pub mod config;
pub mod error;
pub mod hash;
pub mod provenance;
pub mod registry;
pub mod rewrite;

pub use collect::{analyze, CallSiteMatch, FileAnalysis, ImportBinding};
pub use config::{ModuleSpec, PluginConfig, Variant};
pub use error::{Error, Result};
pub use provenance::{FsManifestLocator, ManifestLocator, Provenance};
pub use registry::{ContextHandle, ContextRegistry, ExecutionEnv};
pub use rewrite::{ContextRewriter, Rewrite, RewritePlan};

// -----------------------------------------------------------------------------
// Globals
// -----------------------------------------------------------------------------

pub const NATIVE_FACTORY_LOCAL: &str = "__createGlobalContext";
pub const NATIVE_FACTORY_SOURCE: &str = "@global-context/react";
pub const SELECTOR_FACTORY_LOCAL: &str = "__createGlobalContextSelector";
pub const SELECTOR_FACTORY_SOURCE: &str = "@global-context/react-context-selector";

/// Locals starting with this belong to the plugin and are never treated as user imports.
pub const RESERVED_PREFIX: &str = "__createGlobalContext";

// -----------------------------------------------------------------------------
// Filename helpers
// -----------------------------------------------------------------------------

/// Strip bundler URL prefixes and anchor relative names at `cwd`.
fn normalize_filename(filename: &str, cwd: Option<&str>) -> PathBuf {
    let mut s = filename.replace('\\', "/");
    if let Some(rest) = s.strip_prefix("file:///") {
        // file:///C:/x keeps its drive; file:///repo/x is rooted.
        s = if has_drive_letter(rest) {
            rest.to_string()
        } else {
            format!("/{rest}")
        };
    } else if let Some(rest) = s.strip_prefix("file://") {
        s = rest.to_string();
    }
    let path = PathBuf::from(s);
    match cwd {
        Some(cwd) if path.is_relative() => Path::new(cwd).join(path),
        _ => path,
    }
}

fn has_drive_letter(path: &str) -> bool {
    let b = path.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

// -----------------------------------------------------------------------------
// Transform
// -----------------------------------------------------------------------------

pub struct GlobalContextTransform<L = FsManifestLocator> {
    config: PluginConfig,
    filename: Option<PathBuf>,
    locator: L,
}

impl GlobalContextTransform {
    pub fn new(config: PluginConfig, filename: Option<PathBuf>) -> Result<Self> {
        Self::with_locator(config, filename, FsManifestLocator)
    }
}

impl<L: ManifestLocator> GlobalContextTransform<L> {
    pub fn with_locator(config: PluginConfig, filename: Option<PathBuf>, locator: L) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            filename,
            locator,
        })
    }

    /// Turns an analysis into concrete edits. `None` means the file stays untouched.
    pub fn plan(&self, analysis: &FileAnalysis) -> Option<RewritePlan> {
        if analysis.eligible().next().is_none() {
            return None;
        }
        let Some(filename) = self.filename.as_deref() else {
            debug!("no filename for module; skipping global context rewrite");
            return None;
        };

        let provenance = match provenance::resolve(&self.locator, filename) {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!(file = %filename.display(), "no package.json found; skipping");
                return None;
            }
            Err(e) => {
                warn!(file = %filename.display(), error = %e, "unusable package.json; skipping");
                return None;
            }
        };
        let relative = provenance.relative_path(filename);

        let mut plan = RewritePlan {
            package_name: provenance.package_name,
            package_version: provenance.package_version,
            ..Default::default()
        };
        for m in analysis.eligible() {
            let Some(binding) = &m.binding else { continue };
            plan.rewrites.insert(
                (m.span, binding.clone()),
                Rewrite {
                    variant: m.variant,
                    identity: hash::context_identity(&relative, &binding.0),
                },
            );
        }
        for variant in [Variant::Native, Variant::Selector] {
            let local = rewrite::Factory::for_variant(variant).local;
            if analysis.has_eligible(variant) && !analysis.imports.binds_local(local) {
                plan.inject.push(variant);
            }
        }
        Some(plan)
    }

    /// Runs both phases over one module; returns the number of rewritten calls.
    pub fn transform_module(&self, module: &mut Module) -> usize {
        let analysis = analyze(&self.config, module);
        let Some(plan) = self.plan(&analysis) else {
            return 0;
        };
        let mut rewriter = ContextRewriter::new(&plan);
        module.visit_mut_with(&mut rewriter);
        debug!(
            rewritten = rewriter.applied(),
            package = %plan.package_name,
            "global context rewrite applied"
        );
        rewriter.applied()
    }

    pub fn transform_program(&self, program: &mut Program) -> usize {
        match program {
            Program::Module(m) => self.transform_module(m),
            Program::Script(_) => 0,
        }
    }
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

#[plugin_transform]
pub fn process_transform(mut program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let raw = metadata.get_transform_plugin_config().unwrap_or_default();
    let config = PluginConfig::from_json(&raw)
        .unwrap_or_else(|e| panic!("global-context plugin: {e}"));

    let cwd = metadata.get_context(&TransformPluginMetadataContextKind::Cwd);
    let filename = metadata
        .get_context(&TransformPluginMetadataContextKind::Filename)
        .map(|f| normalize_filename(&f, cwd.as_deref()));

    let transform = GlobalContextTransform::new(config, filename)
        .unwrap_or_else(|e| panic!("global-context plugin: {e}"));
    transform.transform_program(&mut program);
    program
}
