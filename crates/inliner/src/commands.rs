use std::path::{Path, PathBuf};

use inliner_core::{Position, Span, render_diagnostics};
use inliner_driver::{InlinerError, Rewrite, Workspace};

const INLINE_USAGE: &str = "usage: inliner inline <file> <line:col> [--root <dir>] [--write]";
const FOLD_USAGE: &str = "usage: inliner fold <file> <line:col> [--write]";
const COMPREHENSION_USAGE: &str = "usage: inliner comprehension <file> <line:col> [--write]";
const RESOLVE_USAGE: &str = "usage: inliner resolve <file> <name> [--root <dir>]";

/// The file and cursor a positional command acts on.
struct Target {
    path: PathBuf,
    source: String,
    offset: usize,
}

pub(crate) async fn cmd_inline(args: &[String], use_color: bool) -> Result<(), InlinerError> {
    let (write, args) = consume_flag("--write", args);
    let (workspace, args) = workspace_from_args(&args).await?;
    let [file, position] = args.as_slice() else {
        return Err(InlinerError::InvalidCommand(INLINE_USAGE.to_string()));
    };
    let target = target_at(file, position).await?;
    let result = workspace.inline_call_at(&target.path, target.offset).await;
    let rewrite = report(&target, result, use_color)?;
    emit(&rewrite, write).await
}

pub(crate) async fn cmd_fold(args: &[String], use_color: bool) -> Result<(), InlinerError> {
    let (write, args) = consume_flag("--write", args);
    let (workspace, args) = workspace_from_args(&args).await?;
    let [file, position] = args.as_slice() else {
        return Err(InlinerError::InvalidCommand(FOLD_USAGE.to_string()));
    };
    let target = target_at(file, position).await?;
    let result = workspace.fold_at(&target.path, target.offset).await;
    let rewrite = report(&target, result, use_color)?;
    emit(&rewrite, write).await
}

pub(crate) async fn cmd_comprehension(args: &[String], use_color: bool) -> Result<(), InlinerError> {
    let (write, args) = consume_flag("--write", args);
    let (workspace, args) = workspace_from_args(&args).await?;
    let [file, position] = args.as_slice() else {
        return Err(InlinerError::InvalidCommand(COMPREHENSION_USAGE.to_string()));
    };
    let target = target_at(file, position).await?;
    let result = workspace.comprehension_at(&target.path, target.offset).await;
    let rewrite = report(&target, result, use_color)?;
    emit(&rewrite, write).await
}

pub(crate) async fn cmd_resolve(args: &[String], use_color: bool) -> Result<(), InlinerError> {
    let (workspace, args) = workspace_from_args(args).await?;
    let [file, name] = args.as_slice() else {
        return Err(InlinerError::InvalidCommand(RESOLVE_USAGE.to_string()));
    };
    let path = PathBuf::from(file);
    let definition = match workspace.resolve_name(&path, name).await {
        Ok(definition) => definition,
        Err(InlinerError::Inline(err)) => {
            let source = tokio::fs::read_to_string(&path).await?;
            let target = Target {
                offset: 0,
                path,
                source,
            };
            return report(&target, Err(InlinerError::Inline(err)), use_color);
        }
        Err(err) => return Err(err),
    };
    match tokio::fs::read_to_string(&definition.path).await {
        Ok(source) => {
            let at = Position::of(&source, definition.function.span.start);
            println!(
                "{} {}:{}:{}",
                definition.name,
                definition.path.display(),
                at.line,
                at.column
            );
        }
        // Embedded in a source map only.
        Err(_) => println!("{} {} (source map)", definition.name, definition.path.display()),
    }
    Ok(())
}

async fn workspace_from_args(args: &[String]) -> Result<(Workspace, Vec<String>), InlinerError> {
    let (root, args) = consume_value_flag("--root", args)?;
    let (config, args) = consume_value_flag("--config", &args)?;
    let root = match root {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir()?,
    };
    let workspace = Workspace::open(&root, config.as_deref().map(Path::new)).await?;
    Ok((workspace, args))
}

async fn target_at(file: &str, position: &str) -> Result<Target, InlinerError> {
    let path = PathBuf::from(file);
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| InlinerError::InvalidPath(format!("{file}: {err}")))?;
    let position = parse_position(position)?;
    let offset = position.to_offset(&source).ok_or_else(|| {
        InlinerError::InvalidCommand(format!(
            "{}:{} is outside {file}",
            position.line, position.column
        ))
    })?;
    Ok(Target {
        path,
        source,
        offset,
    })
}

fn parse_position(text: &str) -> Result<Position, InlinerError> {
    let invalid = || InlinerError::InvalidCommand(format!("expected <line:col>, got `{text}`"));
    let (line, column) = text.split_once(':').ok_or_else(invalid)?;
    let line: usize = line.parse().map_err(|_| invalid())?;
    let column: usize = column.parse().map_err(|_| invalid())?;
    if line == 0 || column == 0 {
        return Err(invalid());
    }
    Ok(Position { line, column })
}

/// Renders an inliner refusal against the target file; other errors pass through.
fn report<T>(target: &Target, result: Result<T, InlinerError>, use_color: bool) -> Result<T, InlinerError> {
    match result {
        Err(InlinerError::Inline(err)) => {
            let end = (target.offset + 1).min(target.source.len());
            let diagnostic = err.to_diagnostic(Span::new(target.offset, end));
            let rendered = render_diagnostics(
                &target.path.display().to_string(),
                &target.source,
                std::slice::from_ref(&diagnostic),
                use_color,
            );
            eprintln!("{rendered}");
            Err(InlinerError::Diagnostics)
        }
        other => other,
    }
}

async fn emit(rewrite: &Rewrite, write: bool) -> Result<(), InlinerError> {
    if write {
        return rewrite.write().await;
    }
    println!("{}", rewrite.replacement);
    for import in &rewrite.imports {
        println!("{import}");
    }
    Ok(())
}

fn consume_flag(flag: &str, args: &[String]) -> (bool, Vec<String>) {
    let mut enabled = false;
    let mut out = Vec::new();
    for arg in args {
        if arg == flag {
            enabled = true;
        } else {
            out.push(arg.clone());
        }
    }
    (enabled, out)
}

fn consume_value_flag(flag: &str, args: &[String]) -> Result<(Option<String>, Vec<String>), InlinerError> {
    let mut value = None;
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            let Some(next) = iter.next() else {
                return Err(InlinerError::InvalidCommand(format!("{flag} expects a value")));
            };
            value = Some(next.clone());
        } else if let Some(inline) = arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            value = Some(inline.to_string());
        } else {
            out.push(arg.clone());
        }
    }
    Ok((value, out))
}
