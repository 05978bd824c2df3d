use inliner_core::syntax::quote;
use inliner_core::{ImportDecl, NeededImport, SourceFile, Span};

/// Replace `span` of the original source with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub text: String,
}

impl TextEdit {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::new(offset, offset),
            text: text.into(),
        }
    }
}

/// Applies non-overlapping edits given in original-source offsets.
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> String {
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    // Later edits first so earlier offsets stay valid; insertions at one offset keep their order.
    ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));
    let mut output = source.to_string();
    let mut pending_insert: Option<(usize, String)> = None;
    for edit in ordered {
        if edit.span.is_empty() {
            match &mut pending_insert {
                Some((offset, text)) if *offset == edit.span.start => {
                    text.push_str(&edit.text);
                }
                _ => {
                    flush(&mut output, pending_insert.take());
                    pending_insert = Some((edit.span.start, edit.text.clone()));
                }
            }
            continue;
        }
        flush(&mut output, pending_insert.take());
        output.replace_range(edit.span.start..edit.span.end, &edit.text);
    }
    flush(&mut output, pending_insert.take());
    output
}

fn flush(output: &mut String, insert: Option<(usize, String)>) {
    if let Some((offset, text)) = insert {
        output.insert_str(offset, &text);
    }
}

/// Edits adding `needed` to `file`: named specifiers join an existing value
/// import of the same module, everything else becomes a new statement after
/// the last import.
pub fn import_edits(file: &SourceFile, needed: &[NeededImport]) -> Vec<TextEdit> {
    let source = file.source();
    let mut edits = Vec::new();
    let mut statements: Vec<String> = Vec::new();
    let mut fresh_named: Vec<(String, Vec<String>)> = Vec::new();

    for import in needed {
        let Some(specifier) = import.named_specifier() else {
            statements.push(import.to_statement());
            continue;
        };
        let existing = file
            .imports()
            .iter()
            .filter(|decl| decl.module == import.module && !decl.type_only)
            .find_map(|decl| named_insert_offset(source, decl));
        match existing {
            Some((offset, separator)) => {
                edits.push(TextEdit::insert(offset, format!("{separator}{specifier}")));
            }
            None => match fresh_named.iter_mut().find(|(module, _)| *module == import.module) {
                Some((_, specifiers)) => specifiers.push(specifier),
                None => fresh_named.push((import.module.clone(), vec![specifier])),
            },
        }
    }

    for (module, specifiers) in fresh_named {
        statements.push(format!(
            "import {{ {} }} from {};",
            specifiers.join(", "),
            quote(&module)
        ));
    }
    if statements.is_empty() {
        return edits;
    }
    let block = statements.join("\n");
    match file.imports().iter().map(|decl| decl.span.end).max() {
        Some(end) => edits.push(TextEdit::insert(end, format!("\n{block}"))),
        None => edits.push(TextEdit::insert(0, format!("{block}\n"))),
    }
    edits
}

/// Where a new specifier goes inside the braces of `decl`, and what precedes it.
fn named_insert_offset(source: &str, decl: &ImportDecl) -> Option<(usize, &'static str)> {
    let text = source.get(decl.span.start..decl.span.end)?;
    let clause_end = text.rfind("from")?;
    let close = text[..clause_end].rfind('}')?;
    let before = text[..close].trim_end();
    let separator = if before.ends_with('{') || before.ends_with(',') {
        " "
    } else {
        ", "
    };
    Some((decl.span.start + before.len(), separator))
}
