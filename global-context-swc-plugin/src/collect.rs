//! Read-only analysis of one module: which context-creating functions are
//! imported, and which calls invoke them.
//!
//! Nothing here mutates the tree. The result is a [`FileAnalysis`] that the
//! rewriter consumes once traversal is complete.

use std::collections::HashSet;

use swc_core::{
    common::Span,
    ecma::{
        ast::*,
        visit::{Visit, VisitWith},
    },
};
use tracing::debug;

use crate::config::{PluginConfig, Variant, CREATE_CONTEXT};
use crate::RESERVED_PREFIX;

/// Namespace identifier recognised in `React.createContext(...)` without an import.
pub const REACT_GLOBAL: &str = "React";

// -----------------------------------------------------------------------------
// Import table
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub module_source: String,
    pub local: Id,
    pub variant: Variant,
}

/// Default or namespace import of a native module, e.g. `import * as R from "react"`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NamespaceBinding {
    local: Id,
    import_name: String,
}

#[derive(Debug, Default, Clone)]
pub struct ImportTable {
    used: HashSet<Variant>,
    native: Option<ImportBinding>,
    selector: Option<ImportBinding>,
    namespaces: Vec<NamespaceBinding>,
    bound_locals: HashSet<String>,
}

impl ImportTable {
    /// True once any import from a configured module source was seen.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn uses(&self, variant: Variant) -> bool {
        self.used.contains(&variant)
    }

    pub fn binding(&self, variant: Variant) -> Option<&ImportBinding> {
        match variant {
            Variant::Native => self.native.as_ref(),
            Variant::Selector => self.selector.as_ref(),
        }
    }

    /// Whether any import in the module already binds `local`.
    pub fn binds_local(&self, local: &str) -> bool {
        self.bound_locals.contains(local)
    }

    fn record_decl(&mut self, config: &PluginConfig, decl: &ImportDecl) {
        for s in &decl.specifiers {
            let local = match s {
                ImportSpecifier::Named(n) => &n.local,
                ImportSpecifier::Default(d) => &d.local,
                ImportSpecifier::Namespace(ns) => &ns.local,
            };
            self.bound_locals.insert(local.sym.to_string());
        }

        let only_types = !decl.specifiers.is_empty()
            && decl
                .specifiers
                .iter()
                .all(|s| matches!(s, ImportSpecifier::Named(n) if n.is_type_only));
        if decl.type_only || only_types {
            return;
        }
        let source = decl.src.value.to_string();

        for spec in config.specs_for_source(&source) {
            let variant = spec.variant();
            self.used.insert(variant);

            for s in &decl.specifiers {
                match s {
                    ImportSpecifier::Named(named) => {
                        if named.is_type_only || imported_name(named) != spec.import_name {
                            continue;
                        }
                        if named.local.sym.starts_with(RESERVED_PREFIX) {
                            debug!(local = %named.local.sym, "skipping reserved import alias");
                            continue;
                        }
                        let binding = ImportBinding {
                            module_source: source.clone(),
                            local: named.local.to_id(),
                            variant,
                        };
                        match variant {
                            Variant::Native => self.native = Some(binding),
                            Variant::Selector => self.selector = Some(binding),
                        }
                    }
                    ImportSpecifier::Default(def) if variant == Variant::Native => {
                        self.namespaces.push(NamespaceBinding {
                            local: def.local.to_id(),
                            import_name: spec.import_name.clone(),
                        });
                    }
                    ImportSpecifier::Namespace(ns) if variant == Variant::Native => {
                        self.namespaces.push(NamespaceBinding {
                            local: ns.local.to_id(),
                            import_name: spec.import_name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
}

fn imported_name(named: &ImportNamedSpecifier) -> String {
    match &named.imported {
        Some(ModuleExportName::Ident(i)) => i.sym.to_string(),
        Some(ModuleExportName::Str(s)) => s.value.to_string(),
        None => named.local.sym.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Call-site classification
// -----------------------------------------------------------------------------

/// The callee forms the classifier distinguishes.
#[derive(Debug)]
pub enum CalleeShape<'a> {
    /// `createContext(...)`
    Ident(&'a Ident),
    /// `Namespace.member(...)`
    Qualified { object: &'a Ident, property: &'a str },
    Other,
}

impl<'a> CalleeShape<'a> {
    pub fn of(call: &'a CallExpr) -> Self {
        let Callee::Expr(callee) = &call.callee else {
            return CalleeShape::Other;
        };
        match &**callee {
            Expr::Ident(i) => CalleeShape::Ident(i),
            Expr::Member(MemberExpr {
                obj,
                prop: MemberProp::Ident(prop),
                ..
            }) => match &**obj {
                Expr::Ident(object) => CalleeShape::Qualified {
                    object,
                    property: prop.sym.as_ref(),
                },
                _ => CalleeShape::Other,
            },
            _ => CalleeShape::Other,
        }
    }
}

impl ImportTable {
    /// Which factory, if any, a call expression must be routed through.
    pub fn classify(&self, call: &CallExpr) -> Option<Variant> {
        match CalleeShape::of(call) {
            CalleeShape::Ident(callee) => {
                let id = callee.to_id();
                if self.native.as_ref().is_some_and(|b| b.local == id) {
                    Some(Variant::Native)
                } else if self.selector.as_ref().is_some_and(|b| b.local == id) {
                    Some(Variant::Selector)
                } else {
                    None
                }
            }
            CalleeShape::Qualified { object, property } => {
                let id = object.to_id();
                let via_namespace = self
                    .namespaces
                    .iter()
                    .any(|ns| ns.local == id && ns.import_name == property);
                let via_global = object.sym.as_ref() == REACT_GLOBAL && property == CREATE_CONTEXT;
                (via_namespace || via_global).then_some(Variant::Native)
            }
            CalleeShape::Other => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Analysis result
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteMatch {
    pub span: Span,
    /// Declarator binding the call initialises; `None` means not rewritable.
    pub binding: Option<Id>,
    pub variant: Variant,
}

impl CallSiteMatch {
    pub fn is_eligible(&self) -> bool {
        self.binding.is_some()
    }
}

#[derive(Debug, Default, Clone)]
pub struct FileAnalysis {
    pub imports: ImportTable,
    pub matches: Vec<CallSiteMatch>,
}

impl FileAnalysis {
    pub fn eligible(&self) -> impl Iterator<Item = &CallSiteMatch> {
        self.matches.iter().filter(|m| m.is_eligible())
    }

    pub fn has_eligible(&self, variant: Variant) -> bool {
        self.eligible().any(|m| m.variant == variant)
    }
}

pub fn analyze(config: &PluginConfig, module: &Module) -> FileAnalysis {
    let mut collector = ContextCollector {
        config,
        analysis: FileAnalysis::default(),
    };
    module.visit_with(&mut collector);
    collector.analysis
}

struct ContextCollector<'a> {
    config: &'a PluginConfig,
    analysis: FileAnalysis,
}

impl ContextCollector<'_> {
    fn record(&mut self, call: &CallExpr, binding: Option<Id>) {
        let Some(variant) = self.analysis.imports.classify(call) else {
            return;
        };
        if binding.is_none() {
            debug!(?variant, "context call is not a declarator initializer; left as is");
        }
        self.analysis.matches.push(CallSiteMatch {
            span: call.span,
            binding,
            variant,
        });
    }
}

impl Visit for ContextCollector<'_> {
    fn visit_module(&mut self, m: &Module) {
        // Imports are hoisted; resolve them all before looking at any call.
        for item in &m.body {
            if let ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) = item {
                self.analysis.imports.record_decl(self.config, decl);
            }
        }
        if self.analysis.imports.is_empty() {
            return;
        }
        m.visit_children_with(self);
    }

    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_var_declarator(&mut self, d: &VarDeclarator) {
        match (d.name.as_ident(), d.init.as_deref()) {
            (Some(name), Some(Expr::Call(call))) => {
                self.record(call, Some(name.id.to_id()));
                call.visit_children_with(self);
            }
            _ => d.visit_children_with(self),
        }
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        self.record(call, None);
        call.visit_children_with(self);
    }
}
