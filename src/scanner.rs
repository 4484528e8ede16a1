//! Lexical scanning primitives: balanced-delimiter spans, top-level
//! parameter splitting and `{...}` map literals.

use crate::TsexprError;

/// Cursor over expression text with an explicit position and balanced-span
/// skipping. All grammar delimiters are ASCII, so positions are byte offsets
/// and always fall on character boundaries.
#[derive(Debug)]
pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consumes a balanced `open ... close` span starting at the current
    /// position, which must sit on `open`, and returns it with delimiters
    /// included. When the span never closes the scanner consumes to
    /// end-of-input and returns `None`.
    pub(crate) fn skip_balanced(&mut self, open: char, close: char) -> Option<&'a str> {
        if self.peek() != Some(open) {
            return None;
        }
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(ch) = self.advance() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Some(&self.input[start..self.pos]);
                }
            }
        }
        None
    }
}

/// Splits the top-level comma-separated parameters of an argument list.
///
/// `text` begins immediately after the opening `(`. Commas nested inside
/// `(...)` or `{...}` do not split. A top-level `)` at end-of-input
/// terminates the final parameter; a `)` before end-of-input stops the scan
/// and returns only the parameters already collected. Input that runs out
/// without a top-level `)` likewise drops the unterminated trailing
/// parameter. Callers detect arity mismatches themselves.
pub fn split_params(text: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::new(text);
    while let Some(ch) = scanner.peek() {
        match ch {
            '(' => match scanner.skip_balanced('(', ')') {
                Some(span) => current.push_str(span),
                None => return params,
            },
            '{' => match scanner.skip_balanced('{', '}') {
                Some(span) => current.push_str(span),
                None => return params,
            },
            ',' => {
                scanner.advance();
                params.push(std::mem::take(&mut current));
            }
            ')' => {
                scanner.advance();
                if scanner.at_end() && !(params.is_empty() && current.is_empty()) {
                    params.push(current);
                }
                return params;
            }
            _ => {
                scanner.advance();
                current.push(ch);
            }
        }
    }
    params
}

/// Parses a `{key=value[,value2...]...}` map literal into key -> ordered raw
/// value tokens. Keys may repeat; their values accumulate in encounter order
/// and keys keep first-appearance order so parsing is deterministic.
pub fn parse_map(text: &str) -> Result<Vec<(String, Vec<String>)>, TsexprError> {
    if text.is_empty() {
        return Err(TsexprError::MapFormat("empty map"));
    }
    let mut scanner = Scanner::new(text);
    if scanner.advance() != Some('{') {
        return Err(TsexprError::MapFormat("missing '{' at the beginning of map"));
    }

    let mut entries: Vec<(String, Vec<String>)> = Vec::new();
    let mut key = String::new();
    while let Some(ch) = scanner.advance() {
        match ch {
            '=' => {
                if key.is_empty() {
                    return Err(TsexprError::MapFormat("map key cannot be empty"));
                }
                let idx = match entries.iter().position(|(k, _)| *k == key) {
                    Some(idx) => idx,
                    None => {
                        entries.push((key.clone(), Vec::new()));
                        entries.len() - 1
                    }
                };
                let mut value = String::new();
                loop {
                    match scanner.advance() {
                        Some(',') | Some('}') => {
                            if value.is_empty() {
                                return Err(TsexprError::MapFormat("map value cannot be empty"));
                            }
                            entries[idx].1.push(value);
                            break;
                        }
                        Some(ch) => value.push(ch),
                        // Unterminated value: the key stays registered with
                        // whatever values it already collected.
                        None => break,
                    }
                }
                key.clear();
            }
            ',' | '}' => return Err(TsexprError::MapFormat("bad map format")),
            _ => key.push(ch),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_balanced_nested() {
        let mut scanner = Scanner::new("(a,(b,c),d)rest");
        let span = scanner.skip_balanced('(', ')').unwrap();
        assert_eq!(span, "(a,(b,c),d)");
        assert_eq!(scanner.position(), span.len());
        assert_eq!(scanner.peek(), Some('r'));
    }

    #[test]
    fn test_skip_balanced_unclosed() {
        let mut scanner = Scanner::new("(a,(b,c)");
        assert_eq!(scanner.skip_balanced('(', ')'), None);
        assert!(scanner.at_end());
    }

    #[test]
    fn test_skip_balanced_requires_open() {
        let mut scanner = Scanner::new("abc");
        assert_eq!(scanner.skip_balanced('(', ')'), None);
        assert_eq!(scanner.position(), 0);
    }

    #[test]
    fn test_split_flat_params() {
        assert_eq!(split_params("m,null,1h-ago)"), vec!["m", "null", "1h-ago"]);
    }

    #[test]
    fn test_split_keeps_nested_call_whole() {
        assert_eq!(
            split_params("sum,query(m,null,1h))"),
            vec!["sum", "query(m,null,1h)"]
        );
    }

    #[test]
    fn test_split_keeps_map_literal_whole() {
        assert_eq!(
            split_params("m,{host=a,dc=b},1h)"),
            vec!["m", "{host=a,dc=b}", "1h"]
        );
    }

    #[test]
    fn test_split_lone_close_paren_is_empty() {
        assert_eq!(split_params(")"), Vec::<String>::new());
    }

    #[test]
    fn test_split_stops_at_early_close_paren() {
        // A `)` before end-of-input returns only completed parameters.
        assert_eq!(split_params("a,b),c"), vec!["a"]);
    }

    #[test]
    fn test_split_drops_unterminated_trailing_param() {
        assert_eq!(split_params("a,b"), vec!["a"]);
    }

    #[test]
    fn test_split_preserves_empty_params() {
        assert_eq!(split_params("a,,b)"), vec!["a", "", "b"]);
        assert_eq!(split_params("a,)"), vec!["a", ""]);
    }

    #[test]
    fn test_parse_map_single_pair() {
        let map = parse_map("{host=web01}").unwrap();
        assert_eq!(map, vec![("host".to_string(), vec!["web01".to_string()])]);
    }

    #[test]
    fn test_parse_map_repeated_key_accumulates() {
        let map = parse_map("{host=web01,dc=lax,host=web02}").unwrap();
        assert_eq!(
            map,
            vec![
                (
                    "host".to_string(),
                    vec!["web01".to_string(), "web02".to_string()]
                ),
                ("dc".to_string(), vec!["lax".to_string()]),
            ]
        );
    }

    #[test]
    fn test_parse_map_value_with_parens() {
        let map = parse_map("{host=wildcard(web*)}").unwrap();
        assert_eq!(
            map,
            vec![("host".to_string(), vec!["wildcard(web*)".to_string()])]
        );
    }

    #[test]
    fn test_parse_map_missing_brace() {
        assert_eq!(
            parse_map("host=web01}"),
            Err(TsexprError::MapFormat("missing '{' at the beginning of map"))
        );
    }

    #[test]
    fn test_parse_map_empty_input() {
        assert_eq!(parse_map(""), Err(TsexprError::MapFormat("empty map")));
    }

    #[test]
    fn test_parse_map_empty_key() {
        assert_eq!(
            parse_map("{=web01}"),
            Err(TsexprError::MapFormat("map key cannot be empty"))
        );
        assert_eq!(
            parse_map("{host=a,=b}"),
            Err(TsexprError::MapFormat("map key cannot be empty"))
        );
    }

    #[test]
    fn test_parse_map_empty_value() {
        assert_eq!(
            parse_map("{host=}"),
            Err(TsexprError::MapFormat("map value cannot be empty"))
        );
    }

    #[test]
    fn test_parse_map_misplaced_delimiter() {
        assert_eq!(
            parse_map("{}"),
            Err(TsexprError::MapFormat("bad map format"))
        );
        assert_eq!(
            parse_map("{host=a,}"),
            Err(TsexprError::MapFormat("bad map format"))
        );
    }
}
