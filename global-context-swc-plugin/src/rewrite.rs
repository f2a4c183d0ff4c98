//! Mutation pass: injects factory imports and swaps matched calls for calls
//! into the global factories. Runs only after analysis has finished.

use std::collections::HashMap;

use swc_core::{
    common::{Span, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::config::{Variant, CREATE_CONTEXT};
use crate::{
    NATIVE_FACTORY_LOCAL, NATIVE_FACTORY_SOURCE, SELECTOR_FACTORY_LOCAL, SELECTOR_FACTORY_SOURCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Factory {
    pub local: &'static str,
    pub source: &'static str,
}

impl Factory {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Native => Factory {
                local: NATIVE_FACTORY_LOCAL,
                source: NATIVE_FACTORY_SOURCE,
            },
            Variant::Selector => Factory {
                local: SELECTOR_FACTORY_LOCAL,
                source: SELECTOR_FACTORY_SOURCE,
            },
        }
    }

    /// `import { createContext as <local> } from "<source>";`
    fn import_decl(&self) -> ModuleItem {
        ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
            span: DUMMY_SP,
            specifiers: vec![ImportSpecifier::Named(ImportNamedSpecifier {
                span: DUMMY_SP,
                local: Ident::new(self.local.into(), DUMMY_SP, SyntaxContext::empty()),
                imported: Some(ModuleExportName::Ident(Ident::new(
                    CREATE_CONTEXT.into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                ))),
                is_type_only: false,
            })],
            src: Box::new(str_lit(self.source)),
            type_only: false,
            with: None,
            phase: ImportPhase::Evaluation,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub variant: Variant,
    pub identity: String,
}

/// Everything the mutation pass needs, computed up front.
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    pub package_name: String,
    pub package_version: String,
    /// Keyed by the matched call's span and the binding it initialises.
    pub rewrites: HashMap<(Span, Id), Rewrite>,
    pub inject: Vec<Variant>,
}

pub struct ContextRewriter<'a> {
    plan: &'a RewritePlan,
    applied: usize,
}

impl<'a> ContextRewriter<'a> {
    pub fn new(plan: &'a RewritePlan) -> Self {
        Self { plan, applied: 0 }
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    fn rewrite_call(&self, call: &mut CallExpr, rewrite: &Rewrite) {
        let factory = Factory::for_variant(rewrite.variant);
        let mut args = std::mem::take(&mut call.args);
        args.push(str_arg(&rewrite.identity));
        args.push(str_arg(&self.plan.package_name));
        args.push(str_arg(&self.plan.package_version));

        call.callee = Callee::Expr(Box::new(Expr::Ident(Ident::new(
            factory.local.into(),
            DUMMY_SP,
            SyntaxContext::empty(),
        ))));
        call.args = args;
    }
}

impl VisitMut for ContextRewriter<'_> {
    fn visit_mut_module(&mut self, m: &mut Module) {
        // Native first so that the selector import ends up on top.
        for variant in [Variant::Native, Variant::Selector] {
            if self.plan.inject.contains(&variant) {
                m.body.insert(0, Factory::for_variant(variant).import_decl());
            }
        }
        m.visit_mut_children_with(self);
    }

    fn visit_mut_var_declarator(&mut self, d: &mut VarDeclarator) {
        d.visit_mut_children_with(self);

        let Some(name) = d.name.as_ident() else {
            return;
        };
        let id = name.id.to_id();
        let Some(Expr::Call(call)) = d.init.as_deref_mut() else {
            return;
        };
        if let Some(rewrite) = self.plan.rewrites.get(&(call.span, id)) {
            self.rewrite_call(call, rewrite);
            self.applied += 1;
        }
    }
}

fn str_lit(value: &str) -> Str {
    Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }
}

fn str_arg(value: &str) -> ExprOrSpread {
    ExprOrSpread {
        spread: None,
        expr: Box::new(Expr::Lit(Lit::Str(str_lit(value)))),
    }
}
