/// Byte range into a source file. Synthesized nodes carry the range of the
/// expression they replace, or an empty range at offset zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 1-based line and column, derived from a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn of(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut line_start = 0;
        for (index, ch) in source.char_indices() {
            if index >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                line_start = index + 1;
            }
        }
        let column = source
            .get(line_start..offset)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        Self { line, column }
    }

    /// Inverse of [`Position::of`]; `None` when the position is past the end of its line.
    pub fn to_offset(self, source: &str) -> Option<usize> {
        let line_start = if self.line <= 1 {
            0
        } else {
            source
                .match_indices('\n')
                .nth(self.line - 2)
                .map(|(index, _)| index + 1)?
        };
        let line = source[line_start..].split('\n').next().unwrap_or("");
        let mut offset = line_start;
        for (column, ch) in line.chars().enumerate() {
            if column + 1 == self.column {
                return Some(offset);
            }
            offset += ch.len_utf8();
        }
        (self.column == line.chars().count() + 1).then_some(offset)
    }
}

/// An inliner refusal anchored at the selection it refers to.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub span: Span,
}

/// ANSI escapes for each part of a rendered diagnostic; all empty without color.
struct Palette {
    heading: &'static str,
    location: &'static str,
    message: &'static str,
    gutter: &'static str,
    carets: &'static str,
    reset: &'static str,
}

impl Palette {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                heading: "\x1b[1;33m",
                location: "\x1b[90m",
                message: "\x1b[97m",
                gutter: "\x1b[90m",
                carets: "\x1b[1;31m",
                reset: "\x1b[0m",
            }
        } else {
            Self {
                heading: "",
                location: "",
                message: "",
                gutter: "",
                carets: "",
                reset: "",
            }
        }
    }
}

pub fn render_diagnostics(
    path: &str,
    source: &str,
    diagnostics: &[Diagnostic],
    use_color: bool,
) -> String {
    let palette = Palette::new(use_color);
    diagnostics
        .iter()
        .map(|diagnostic| render_diagnostic(path, source, diagnostic, &palette))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_diagnostic(path: &str, source: &str, diagnostic: &Diagnostic, palette: &Palette) -> String {
    let Palette {
        heading,
        location,
        message,
        reset,
        ..
    } = palette;
    let at = Position::of(source, diagnostic.span.start);
    let mut output = format!(
        "{heading}error[{}]{reset} {location}{path}:{}:{}{reset}\n  {message}{}{reset}\n",
        diagnostic.code, at.line, at.column, diagnostic.message
    );
    if let Some(frame) = source_frame(source, diagnostic, palette) {
        output.push_str(&frame);
    }
    output.trim_end().to_string()
}

/// The first line of the span, underlined and annotated with the message.
fn source_frame(source: &str, diagnostic: &Diagnostic, palette: &Palette) -> Option<String> {
    let Palette {
        gutter,
        carets,
        reset,
        ..
    } = palette;
    let span = diagnostic.span;
    let start = Position::of(source, span.start);
    let end = Position::of(source, span.end.max(span.start));
    let line = source.lines().nth(start.line.checked_sub(1)?)?;
    let (indent, width) = underline(line, start, end);
    let line_no = start.line;
    let number_width = line_no.to_string().len();
    let blank = " ".repeat(number_width);
    Some(format!(
        "{gutter}{blank} |{reset}\n\
         {gutter}{line_no} |{reset} {line}\n\
         {gutter}{blank} |{reset} {}{carets}{}{reset} {}\n",
        " ".repeat(indent),
        "^".repeat(width),
        diagnostic.message
    ))
}

/// Columns before the carets and the caret count. Spans are end-exclusive and
/// a span running past its first line is underlined to the line's end.
fn underline(line: &str, start: Position, end: Position) -> (usize, usize) {
    let line_len = line.chars().count();
    let first = start.column.clamp(1, line_len + 1);
    let last = if start.line == end.line {
        end.column.saturating_sub(1)
    } else {
        line_len
    };
    let last = last.clamp(first, line_len.max(first));
    (first - 1, last - first + 1)
}
