//! End-to-end tests for the global context rewrite.
//!
//! Each test parses real JavaScript, runs the resolver (as SWC does before
//! invoking a plugin), applies the transform against a temporary package tree
//! and prints the result.

use std::fs;
use std::path::{Path, PathBuf};

use swc_core::{
    common::{sync::Lrc, FileName, Globals, Mark, SourceMap, GLOBALS},
    ecma::{
        ast::{EsVersion, Module},
        codegen::{text_writer::JsWriter, Emitter},
        parser::{parse_file_as_module, Syntax, TsSyntax},
        transforms::base::resolver,
        visit::VisitMutWith,
    },
};
use tempfile::TempDir;

use global_context_swc_plugin::{
    hash::context_identity, GlobalContextTransform, ManifestLocator, PluginConfig,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Creates a temp directory holding a package.json.
fn create_package(name: &str, version: &str) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_manifest(temp_dir.path(), name, version);
    temp_dir
}

fn write_manifest(dir: &Path, name: &str, version: &str) {
    fs::create_dir_all(dir).expect("Failed to create package dir");
    let content = format!(r#"{{ "name": "{}", "version": "{}" }}"#, name, version);
    fs::write(dir.join("package.json"), content).expect("Failed to write package.json");
}

/// Never finds a manifest, regardless of what exists above the temp dir.
struct NoManifest;

impl ManifestLocator for NoManifest {
    fn locate(&self, _dir: &Path) -> Option<PathBuf> {
        None
    }

    fn read(&self, _manifest: &Path) -> global_context_swc_plugin::Result<String> {
        unreachable!("nothing is ever located")
    }
}

fn print(cm: &Lrc<SourceMap>, module: &Module) -> String {
    let mut buf = vec![];
    {
        let mut emitter = Emitter {
            cfg: Default::default(),
            cm: cm.clone(),
            comments: None,
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_module(module).expect("Failed to print module");
    }
    String::from_utf8(buf).expect("codegen emits utf-8")
}

/// Returns the printed module before and after the transform.
fn run<L: ManifestLocator>(src: &str, transform: &GlobalContextTransform<L>) -> (String, String) {
    run_with_syntax(src, Syntax::default(), transform)
}

fn run_with_syntax<L: ManifestLocator>(
    src: &str,
    syntax: Syntax,
    transform: &GlobalContextTransform<L>,
) -> (String, String) {
    let typescript = matches!(syntax, Syntax::Typescript(_));
    GLOBALS.set(&Globals::new(), || {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(FileName::Anon.into(), src.to_string());
        let mut errors = vec![];
        let mut module =
            parse_file_as_module(&fm, syntax, EsVersion::EsNext, None, &mut errors)
                .expect("Failed to parse input");
        module.visit_mut_with(&mut resolver(Mark::new(), Mark::new(), typescript));

        let before = print(&cm, &module);
        transform.transform_module(&mut module);
        (before, print(&cm, &module))
    })
}

fn transform_file(src: &str, file: &Path) -> (String, String) {
    let transform =
        GlobalContextTransform::new(PluginConfig::default(), Some(file.to_path_buf())).unwrap();
    run(src, &transform)
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{haystack}"))
}

// ============================================================================
// Rewriting
// ============================================================================

#[test]
fn test_rewrites_native_context() {
    let pkg = create_package("my-pkg", "1.0.0");
    let file = pkg.path().join("src").join("Foo.ts");

    let (_, out) = transform_file(
        "import { createContext } from 'react';\nconst Foo = createContext(null);\n",
        &file,
    );

    assert_eq!(context_identity("src/Foo.ts", "Foo"), "1w10upg");
    assert!(out.contains(r#"from "@global-context/react""#), "{out}");
    assert!(out.contains("__createGlobalContext"), "{out}");
    assert!(
        out.contains(r#"const Foo = __createGlobalContext(null, "1w10upg", "my-pkg", "1.0.0");"#),
        "{out}"
    );
    assert!(!out.contains("createContext(null)"), "{out}");
}

#[test]
fn test_injected_import_order() {
    let pkg = create_package("ui-kit", "4.2.0");
    let file = pkg.path().join("src").join("contexts.js");

    let (_, out) = transform_file(
        "import { createContext } from 'react';
import { createContext as createSelectable } from '@fluentui/react-context-selector';
const A = createContext(1);
const B = createSelectable(2);
",
        &file,
    );

    let selector_import = position(&out, r#""@global-context/react-context-selector""#);
    let native_import = position(&out, r#""@global-context/react""#);
    let original = position(&out, "from 'react'");
    assert!(selector_import < native_import, "{out}");
    assert!(native_import < original, "{out}");

    let a = context_identity("src/contexts.js", "A");
    let b = context_identity("src/contexts.js", "B");
    assert!(
        out.contains(&format!(r#"__createGlobalContext(1, "{a}", "ui-kit", "4.2.0")"#)),
        "{out}"
    );
    assert!(
        out.contains(&format!(r#"__createGlobalContextSelector(2, "{b}", "ui-kit", "4.2.0")"#)),
        "{out}"
    );
}

#[test]
fn test_typescript_type_arguments_are_preserved() {
    let pkg = create_package("my-pkg", "1.0.0");
    let file = pkg.path().join("src").join("Foo.ts");
    let transform =
        GlobalContextTransform::new(PluginConfig::default(), Some(file.clone())).unwrap();

    let (_, out) = run_with_syntax(
        "import { createContext } from 'react';
type Ctx<T> = { value: T };
type X = { id: string };
const Foo: Ctx<X> = createContext<X | null>(null);
const Bar = createContext(null) as any;
",
        Syntax::Typescript(TsSyntax::default()),
        &transform,
    );

    assert!(
        out.contains(
            r#"const Foo: Ctx<X> = __createGlobalContext<X | null>(null, "1w10upg", "my-pkg", "1.0.0");"#
        ),
        "{out}"
    );
    // Not a declarator initializer: the `as` expression sits in between.
    assert!(out.contains("const Bar = createContext(null) as any;"), "{out}");
    assert_eq!(out.matches("@global-context/react").count(), 1, "{out}");
}

#[test]
fn test_selector_only_injects_selector_import() {
    let pkg = create_package("ui-kit", "1.0.0");
    let file = pkg.path().join("index.js");

    let (_, out) = transform_file(
        "import { createContext } from '@fluentui/react-context-selector';
export const Ctx = createContext({ value: compute() });
",
        &file,
    );

    assert!(out.contains(r#""@global-context/react-context-selector""#), "{out}");
    assert!(!out.contains(r#""@global-context/react""#), "{out}");
    assert!(out.contains("export const Ctx = __createGlobalContextSelector("), "{out}");
    // Arguments are carried over untouched.
    assert!(out.contains("compute()"), "{out}");
    assert!(out.contains(&context_identity("index.js", "Ctx")), "{out}");
}

#[test]
fn test_react_namespace_form() {
    let pkg = create_package("my-pkg", "2.3.4");
    let file = pkg.path().join("src").join("Theme.js");

    let (_, out) = transform_file(
        "import React from 'react';\nconst Theme = React.createContext('light');\n",
        &file,
    );

    let id = context_identity("src/Theme.js", "Theme");
    assert!(
        out.contains(&format!(
            r#"const Theme = __createGlobalContext('light', "{id}", "my-pkg", "2.3.4");"#
        )),
        "{out}"
    );
    assert!(out.contains(r#""@global-context/react""#), "{out}");
}

#[test]
fn test_only_declarator_calls_are_rewritten() {
    let pkg = create_package("my-pkg", "1.0.0");
    let file = pkg.path().join("mixed.js");

    let (_, out) = transform_file(
        "import { createContext } from 'react';
register(createContext(0));
const Kept = createContext(1);
",
        &file,
    );

    assert!(out.contains("register(createContext(0));"), "{out}");
    assert!(out.contains("const Kept = __createGlobalContext(1, "), "{out}");
}

// ============================================================================
// No-op conditions
// ============================================================================

#[test]
fn test_unassigned_call_leaves_file_untouched() {
    let pkg = create_package("my-pkg", "1.0.0");
    let file = pkg.path().join("a.js");

    let (before, after) = transform_file(
        "import { createContext } from 'react';\nregister(createContext(x));\n",
        &file,
    );

    assert_eq!(before, after);
    assert!(!after.contains("@global-context"));
}

#[test]
fn test_no_manifest_is_noop() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let transform = GlobalContextTransform::with_locator(
        PluginConfig::default(),
        Some(dir.path().join("src").join("Foo.js")),
        NoManifest,
    )
    .unwrap();

    let (before, after) = run(
        "import { createContext } from 'react';\nconst Foo = createContext(null);\n",
        &transform,
    );
    assert_eq!(before, after);
}

#[test]
fn test_malformed_manifest_is_noop() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("package.json"), "{ not json").unwrap();

    let (before, after) = transform_file(
        "import { createContext } from 'react';\nconst Foo = createContext(null);\n",
        &dir.path().join("Foo.js"),
    );
    assert_eq!(before, after);
}

#[test]
fn test_file_without_configured_imports_is_noop() {
    let pkg = create_package("my-pkg", "1.0.0");
    let (before, after) = transform_file(
        "import { createContext } from './local';\nconst Foo = createContext(null);\n",
        &pkg.path().join("a.js"),
    );
    assert_eq!(before, after);
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_second_pass_is_idempotent() {
    let pkg = create_package("my-pkg", "1.0.0");
    let file = pkg.path().join("src").join("Foo.js");
    let src = "import { createContext } from 'react';\nconst Foo = createContext(null);\n";

    let (_, first) = transform_file(src, &file);
    let (reparsed, second) = transform_file(&first, &file);

    assert_eq!(reparsed, second);
    assert_eq!(second.matches("@global-context/react").count(), 1, "{second}");
}

#[test]
fn test_duplicated_installs_share_identity() {
    let root = TempDir::new().expect("Failed to create temp dir");
    let a = root.path().join("app-a").join("node_modules").join("lib");
    let b = root.path().join("app-b").join("node_modules").join("lib");
    write_manifest(&a, "lib", "1.2.0");
    write_manifest(&b, "lib", "1.9.9");

    let src = "import { createContext } from 'react';\nexport const Store = createContext(null);\n";
    let (_, out_a) = transform_file(src, &a.join("src").join("store.js"));
    let (_, out_b) = transform_file(src, &b.join("src").join("store.js"));

    let id = context_identity("src/store.js", "Store");
    assert!(out_a.contains(&format!(r#"(null, "{id}", "lib", "1.2.0")"#)), "{out_a}");
    assert!(out_b.contains(&format!(r#"(null, "{id}", "lib", "1.9.9")"#)), "{out_b}");
}

#[test]
fn test_nearest_manifest_wins() {
    let root = create_package("monorepo", "0.0.0");
    let inner = root.path().join("packages").join("widgets");
    write_manifest(&inner, "@acme/widgets", "3.0.1");

    let (_, out) = transform_file(
        "import { createContext } from 'react';\nconst Widget = createContext(0);\n",
        &inner.join("lib").join("Widget.js"),
    );

    let id = context_identity("lib/Widget.js", "Widget");
    assert!(
        out.contains(&format!(r#"(0, "{id}", "@acme/widgets", "3.0.1")"#)),
        "{out}"
    );
}
