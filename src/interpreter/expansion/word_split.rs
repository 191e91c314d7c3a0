//! Word Splitting
//!
//! IFS-based field splitting. Only unquoted expansion results are split;
//! literal and quoted text joins the field it is adjacent to.

/// Default field separators when IFS is unset
pub const DEFAULT_IFS: &str = " \t\n";

/// An expanded piece of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSplitSegment {
    pub value: String,
    /// Unquoted expansion result: subject to field splitting
    pub splittable: bool,
    /// Came from quoted text: keeps an otherwise empty field alive and is
    /// matched literally during pathname expansion
    pub quoted: bool,
}

impl WordSplitSegment {
    pub fn literal(value: impl Into<String>, quoted: bool) -> Self {
        Self { value: value.into(), splittable: false, quoted }
    }

    pub fn expansion(value: impl Into<String>, quoted: bool) -> Self {
        Self { value: value.into(), splittable: !quoted, quoted }
    }
}

/// A word's expansion: segments, with hard field boundaries between the
/// elements of `"$@"` and `${A[@]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Segment(WordSplitSegment),
    FieldBreak,
}

/// One resulting field, still carrying per-segment quoting for globbing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub segments: Vec<WordSplitSegment>,
    keep: bool,
}

impl Field {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.value.as_str()).collect()
    }

    fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.value.is_empty())
    }

    fn push(&mut self, segment: WordSplitSegment) {
        self.keep |= segment.quoted;
        self.segments.push(segment);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum IfsToken<'a> {
    Text(&'a str),
    /// `hard` is a non-whitespace separator: it always ends a field, even
    /// an empty one
    Delimiter { hard: bool },
}

fn tokenize_ifs<'a>(value: &'a str, ifs: &str) -> Vec<IfsToken<'a>> {
    let is_ifs = |c: char| ifs.contains(c);
    let is_ws = |c: char| ifs.contains(c) && c.is_ascii_whitespace();

    let mut tokens = Vec::new();
    let mut chars = value.char_indices().peekable();
    let mut text_start: Option<usize> = None;
    while let Some(&(i, c)) = chars.peek() {
        if !is_ifs(c) {
            text_start.get_or_insert(i);
            chars.next();
            continue;
        }
        if let Some(start) = text_start.take() {
            tokens.push(IfsToken::Text(&value[start..i]));
        }
        while chars.peek().is_some_and(|&(_, c)| is_ws(c)) {
            chars.next();
        }
        let mut hard = false;
        if let Some(&(_, c)) = chars.peek() {
            if is_ifs(c) && !is_ws(c) {
                hard = true;
                chars.next();
                while chars.peek().is_some_and(|&(_, c)| is_ws(c)) {
                    chars.next();
                }
            }
        }
        tokens.push(IfsToken::Delimiter { hard });
    }
    if let Some(start) = text_start {
        tokens.push(IfsToken::Text(&value[start..]));
    }
    tokens
}

/// Split a word's chunks into fields.
pub fn split_fields(chunks: Vec<Chunk>, ifs: &str) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut current = Field::default();

    fn finish(fields: &mut Vec<Field>, current: &mut Field, force: bool) {
        let field = std::mem::take(current);
        if force || field.keep || !field.is_empty() {
            fields.push(field);
        }
    }

    for chunk in chunks {
        match chunk {
            Chunk::FieldBreak => finish(&mut fields, &mut current, false),
            Chunk::Segment(segment) if !segment.splittable || ifs.is_empty() => current.push(segment),
            Chunk::Segment(segment) => {
                for token in tokenize_ifs(&segment.value, ifs) {
                    match token {
                        IfsToken::Text(text) => current.push(WordSplitSegment { value: text.to_string(), ..segment.clone() }),
                        IfsToken::Delimiter { hard } => finish(&mut fields, &mut current, hard),
                    }
                }
            }
        }
    }
    finish(&mut fields, &mut current, false);
    fields
}

/// Split plain text on IFS as `read` does, into at most `max` fields; the
/// last field keeps the rest of the line minus trailing IFS whitespace.
pub fn split_for_read(line: &str, ifs: &str, max: usize) -> Vec<String> {
    let is_ws = |c: char| ifs.contains(c) && c.is_ascii_whitespace();
    let skip_delimiter = |s: &str| -> usize {
        let trimmed = s.trim_start_matches(is_ws);
        let rest = match trimmed.chars().next() {
            Some(c) if ifs.contains(c) && !is_ws(c) => trimmed[c.len_utf8()..].trim_start_matches(is_ws),
            _ => trimmed,
        };
        s.len() - rest.len()
    };

    let mut fields = Vec::new();
    let mut rest = line.trim_start_matches(is_ws);
    while fields.len() + 1 < max && !rest.is_empty() {
        match rest.find(|c: char| ifs.contains(c)) {
            Some(i) => {
                fields.push(rest[..i].to_string());
                let after = &rest[i..];
                rest = &after[skip_delimiter(after)..];
            }
            None => {
                fields.push(rest.to_string());
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        fields.push(rest.trim_end_matches(is_ws).to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: Vec<Chunk>, ifs: &str) -> Vec<String> {
        split_fields(chunks, ifs).iter().map(Field::text).collect()
    }

    fn exp(v: &str) -> Chunk {
        Chunk::Segment(WordSplitSegment::expansion(v, false))
    }

    fn quoted(v: &str) -> Chunk {
        Chunk::Segment(WordSplitSegment::expansion(v, true))
    }

    fn lit(v: &str) -> Chunk {
        Chunk::Segment(WordSplitSegment::literal(v, false))
    }

    #[test]
    fn test_unquoted_expansion_splits() {
        assert_eq!(texts(vec![exp("  a  b ")], DEFAULT_IFS), vec!["a", "b"]);
        assert!(texts(vec![exp("   ")], DEFAULT_IFS).is_empty());
        assert!(texts(vec![exp("")], DEFAULT_IFS).is_empty());
    }

    #[test]
    fn test_quoted_expansion_is_one_field() {
        assert_eq!(texts(vec![quoted("a b")], DEFAULT_IFS), vec!["a b"]);
        assert_eq!(texts(vec![quoted("")], DEFAULT_IFS), vec![""]);
    }

    #[test]
    fn test_adjacent_text_joins_fields() {
        // pre$x"$y" with x="1 2" and y="3 4"
        assert_eq!(
            texts(vec![lit("pre"), exp("1 2"), quoted("3 4")], DEFAULT_IFS),
            vec!["pre1", "23 4"]
        );
        assert_eq!(texts(vec![lit("a"), exp(" b")], DEFAULT_IFS), vec!["a", "b"]);
    }

    #[test]
    fn test_non_whitespace_ifs() {
        assert_eq!(texts(vec![exp("a:b::c")], ":"), vec!["a", "b", "", "c"]);
        assert_eq!(texts(vec![exp(":a")], ":"), vec!["", "a"]);
        assert_eq!(texts(vec![exp("a:")], ":"), vec!["a"]);
        assert_eq!(texts(vec![exp("a : b")], " :"), vec!["a", "b"]);
    }

    #[test]
    fn test_field_breaks_and_empty_ifs() {
        assert_eq!(
            texts(vec![quoted("a b"), Chunk::FieldBreak, quoted("c")], DEFAULT_IFS),
            vec!["a b", "c"]
        );
        assert_eq!(texts(vec![exp("a b")], ""), vec!["a b"]);
    }

    #[test]
    fn test_split_for_read() {
        assert_eq!(split_for_read("  one two  three  ", DEFAULT_IFS, 2), vec!["one", "two  three"]);
        assert_eq!(split_for_read("a b c", DEFAULT_IFS, 5), vec!["a", "b", "c"]);
        assert_eq!(split_for_read("x:y:z", ":", 2), vec!["x", "y:z"]);
        assert_eq!(split_for_read("", DEFAULT_IFS, 1), Vec::<String>::new());
    }
}
