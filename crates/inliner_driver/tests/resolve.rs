use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use inliner_core::InlineError;
use inliner_driver::{InlinerConfig, InlinerError, Workspace};

fn write(root: &Path, relative: &str, text: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

fn offset_of(path: &Path, marker: &str) -> usize {
    std::fs::read_to_string(path).unwrap().find(marker).unwrap()
}

fn workspace(root: &Path) -> Workspace {
    Workspace::with_config(root, InlinerConfig::default())
}

#[tokio::test]
async fn relative_imports_try_each_suffix() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/lib/math.ts", "export const double = (n: number) => n * 2;\n");
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { double } from \"./lib/math\";\nconst x = double(4);\n",
    );
    let rewrite = workspace(dir.path())
        .inline_call_at(&main, offset_of(&main, "double(4)"))
        .await
        .unwrap();
    assert_eq!(rewrite.replacement, "8");
    assert!(rewrite.imports.is_empty());
    insta::assert_snapshot!(rewrite.rewritten(), @r#"
    import { double } from "./lib/math";
    const x = 8;
    "#);
}

#[tokio::test]
async fn index_files_and_reexports_are_followed() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/lib/strings.ts",
        "export function shout(s: string) { return s + \"!\"; }\n",
    );
    write(
        dir.path(),
        "src/lib/index.ts",
        "export * from \"./strings\";\nexport { shout as loud } from \"./strings\";\n",
    );
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { loud, shout } from \"./lib\";\nconst a = loud(name);\nconst b = shout(name);\n",
    );
    let ws = workspace(dir.path());
    let loud = ws.inline_call_at(&main, offset_of(&main, "loud(name)")).await.unwrap();
    assert_eq!(loud.replacement, "name + \"!\"");
    let shout = ws.inline_call_at(&main, offset_of(&main, "shout(name)")).await.unwrap();
    assert_eq!(shout.replacement, "name + \"!\"");

    let definition = ws.resolve_name(&main, "loud").await.unwrap();
    assert_eq!(definition.name, "shout");
    assert!(definition.path.ends_with("src/lib/strings.ts"));
}

#[tokio::test]
async fn reexport_depth_is_limited() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/lib/inner.ts", "export const one = () => 1;\n");
    write(dir.path(), "src/lib/index.ts", "export * from \"./inner\";\n");
    let main = write(dir.path(), "src/main.ts", "import { one } from \"./lib\";\none();\n");
    let mut config = InlinerConfig::default();
    config.resolve.max_reexport_depth = 0;
    let err = Workspace::with_config(dir.path(), config)
        .resolve_name(&main, "one")
        .await
        .unwrap_err();
    assert!(matches!(err, InlinerError::Inline(InlineError::NotFound(_))));
}

#[tokio::test]
async fn package_entries_prefer_a_typescript_sibling() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "node_modules/mathkit/package.json",
        r#"{ "name": "mathkit", "main": "dist/index.js" }"#,
    );
    write(dir.path(), "node_modules/mathkit/dist/index.js", "export function roundTo() {}\n");
    write(
        dir.path(),
        "node_modules/mathkit/dist/index.ts",
        "import { floor } from \"basekit\";\nexport function roundTo(n: number) { return floor(n); }\n",
    );
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { roundTo } from \"mathkit\";\nconst r = roundTo(2.5);\n",
    );
    let rewrite = workspace(dir.path())
        .inline_call_at(&main, offset_of(&main, "roundTo(2.5)"))
        .await
        .unwrap();
    assert_eq!(rewrite.imports, vec!["import { floor } from \"basekit\";".to_string()]);
    insta::assert_snapshot!(rewrite.rewritten(), @r#"
    import { roundTo } from "mathkit";
    import { floor } from "basekit";
    const r = floor(2.5);
    "#);

    rewrite.write().await.unwrap();
    let written = std::fs::read_to_string(&main).unwrap();
    assert!(written.contains("const r = floor(2.5);"));
}

#[tokio::test]
async fn source_maps_supply_embedded_sources() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "node_modules/fmtkit/package.json",
        r#"{ "module": "lib/index.mjs" }"#,
    );
    write(
        dir.path(),
        "node_modules/fmtkit/lib/index.mjs",
        "export const pad = (s) => ` ${s} `;\n//# sourceMappingURL=index.mjs.map\n",
    );
    write(
        dir.path(),
        "node_modules/fmtkit/lib/index.mjs.map",
        r#"{"version":3,"sources":["../src/index.ts"],"sourcesContent":["export const pad = (s: string) => ` ${s} `;\n"],"mappings":""}"#,
    );
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { pad } from \"fmtkit\";\nconst p = pad(label);\n",
    );
    let rewrite = workspace(dir.path())
        .inline_call_at(&main, offset_of(&main, "pad(label)"))
        .await
        .unwrap();
    assert_eq!(rewrite.replacement, "` ${label} `");
}

#[tokio::test]
async fn inline_data_url_source_maps_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let map = r#"{"version":3,"sourceRoot":"../src","sources":["lib/unit.ts"],"mappings":""}"#;
    write(dir.path(), "node_modules/units/package.json", r#"{ "main": "out/unit.js" }"#);
    write(
        dir.path(),
        "node_modules/units/out/unit.js",
        &format!(
            "export function toPx(n) {{ return `${{n}}px`; }}\n//# sourceMappingURL=data:application/json;base64,{}\n",
            STANDARD.encode(map)
        ),
    );
    // sourceRoot is relative to the map, so the source resolves inside the package.
    write(
        dir.path(),
        "node_modules/units/src/lib/unit.ts",
        "export function toPx(n: number) { return `${n}px`; }\n",
    );
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { toPx } from \"units\";\nconst width = toPx(4);\n",
    );
    let ws = workspace(dir.path());
    let definition = ws.resolve_name(&main, "toPx").await.unwrap();
    assert!(definition.path.ends_with("node_modules/units/src/lib/unit.ts"));
    let rewrite = ws.inline_call_at(&main, offset_of(&main, "toPx(4)")).await.unwrap();
    assert_eq!(rewrite.replacement, "\"4px\"");
}

#[tokio::test]
async fn caller_parameters_are_not_mistaken_for_callee_literals() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "src/main.ts",
        "const pick = (x: boolean, y: boolean) => y ? 'yes' : 'no';\nfunction g(x: boolean) { return pick(true, x); }\n",
    );
    let rewrite = workspace(dir.path())
        .inline_call_at(&main, offset_of(&main, "pick(true, x)"))
        .await
        .unwrap();
    assert_eq!(rewrite.replacement, "x ? 'yes' : 'no'");
}

#[tokio::test]
async fn unresolvable_names_fail_closed() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "src/main.ts",
        "import * as util from \"./util\";\nimport { gone } from \"./missing\";\nimport type { Kind } from \"kinds\";\ngone(1);\n",
    );
    let ws = workspace(dir.path());
    let cases = [
        ("gone", "NotFound"),
        ("util", "Unsupported"),
        ("Kind", "NotFound"),
        ("nowhere", "NotFound"),
    ];
    for (name, expected) in cases {
        let err = ws.resolve_name(&main, name).await.unwrap_err();
        let actual = match err {
            InlinerError::Inline(InlineError::NotFound(_)) => "NotFound",
            InlinerError::Inline(InlineError::Unsupported(_)) => "Unsupported",
            other => panic!("unexpected error for {name}: {other}"),
        };
        assert_eq!(actual, expected, "{name}");
    }
}

#[tokio::test]
async fn workspace_config_is_read_from_the_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "inliner.toml", "[resolve]\nrelative_suffixes = [\".tsx\"]\n\n[output]\nimports = false\n");
    write(
        dir.path(),
        "src/view.tsx",
        "import { clsx } from \"clsx\";\nexport const classes = (on: boolean) => clsx(on);\n",
    );
    let main = write(
        dir.path(),
        "src/main.ts",
        "import { classes } from \"./view\";\nconst c = classes(true);\n",
    );
    let ws = Workspace::open(dir.path(), None).await.unwrap();
    assert_eq!(ws.config.resolve.relative_suffixes, vec![".tsx".to_string()]);
    let rewrite = ws.inline_call_at(&main, offset_of(&main, "classes(true)")).await.unwrap();
    assert_eq!(rewrite.replacement, "clsx(true)");
    assert!(rewrite.imports.is_empty());

    write(dir.path(), "inliner.toml", "[resolve]\nmax_reexport_depth = \"deep\"\n");
    let err = Workspace::open(dir.path(), None).await.unwrap_err();
    assert!(matches!(err, InlinerError::Config(_)));
}

#[tokio::test]
async fn fold_and_comprehension_rewrite_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "src/consts.ts",
        "const WIDTH = 4;\nconst area = WIDTH * WIDTH;\nconst steps = [1, 2, 3];\nconst scaled = steps.map((s, i) => s * 10 + i);\n",
    );
    let ws = workspace(dir.path());
    let fold = ws.fold_at(&main, offset_of(&main, "WIDTH * WIDTH")).await.unwrap();
    assert_eq!(fold.replacement, "16");
    let collapsed = ws.comprehension_at(&main, offset_of(&main, "steps.map")).await.unwrap();
    insta::assert_snapshot!(collapsed.rewritten(), @r"
    const WIDTH = 4;
    const area = WIDTH * WIDTH;
    const steps = [1, 2, 3];
    const scaled = [10, 21, 32];
    ");
}
