//! Tokenizer for the template language, written with winnow combinators.

use winnow::combinator::{alt, opt, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stream};
use winnow::token::{any, literal, one_of, take_till, take_until, take_while};

use crate::span::Span;

type Input<'a> = LocatingSlice<&'a str>;

/// A syntax error with the source range it was found at.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexKind {
    Ident,
    Int,
    Float,
    Str,
    Char,
    Punct,
    Eof,
}

/// A lexical token. For string and char literals `text` holds the
/// unescaped value, not the quoted spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexToken {
    pub kind: LexKind,
    pub text: String,
    pub span: Span,
}

/// Operators and delimiters, longest spelling first.
const PUNCTUATION: &[&str] = &[
    "=>", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "++", "--", "+", "-", "*", "/", "%",
    "<", ">", "!", "=", "(", ")", "{", "}", "[", "]", ";", ",", ".", "?", ":",
];

/// Skip whitespace and comments.
fn trivia(input: &mut Input<'_>) -> ModalResult<()> {
    repeat::<_, _, (), _, _>(
        0..,
        alt((
            take_while(1.., |c: char| c.is_whitespace()).void(),
            ("//", take_till(0.., |c: char| c == '\n')).void(),
            ("/*", take_until(0.., "*/"), "*/").void(),
        )),
    )
    .parse_next(input)
}

fn ident(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .map(|text: &str| (LexKind::Ident, text.to_owned()))
        .parse_next(input)
}

fn number(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    let text: &str = (
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .parse_next(input)?;
    let kind = if text.contains('.') {
        LexKind::Float
    } else {
        LexKind::Int
    };
    Ok((kind, text.to_owned()))
}

/// Body of a quoted literal after the opening quote, through the closing one.
fn quoted_body(input: &mut Input<'_>, quote: char) -> ModalResult<String> {
    let mut value = String::new();
    loop {
        let c: char = any.parse_next(input)?;
        if c == quote {
            return Ok(value);
        }
        if c == '\\' {
            let escaped: char = any.parse_next(input)?;
            value.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
        } else {
            value.push(c);
        }
    }
}

fn string(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    '"'.parse_next(input)?;
    let value = quoted_body(input, '"')?;
    Ok((LexKind::Str, value))
}

fn character(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    '\''.parse_next(input)?;
    let value = quoted_body(input, '\'')?;
    if value.chars().count() != 1 {
        return Err(ErrMode::Cut(ContextError::new()));
    }
    Ok((LexKind::Char, value))
}

fn punct(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    for candidate in PUNCTUATION {
        let matched: ModalResult<&str> = literal(*candidate).parse_next(input);
        if let Ok(text) = matched {
            return Ok((LexKind::Punct, text.to_owned()));
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn token(input: &mut Input<'_>) -> ModalResult<(LexKind, String)> {
    alt((ident, number, string, character, punct)).parse_next(input)
}

/// Split `source` into tokens, ending with a single `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<LexToken>, ParseError> {
    let mut input = LocatingSlice::new(source);
    let mut tokens = Vec::new();
    loop {
        // Trivia never fails: every alternative may match nothing.
        let _ = trivia(&mut input);
        let offset = source.len() - input.eof_offset();
        if input.eof_offset() == 0 {
            break;
        }
        match token.with_span().parse_next(&mut input) {
            Ok(((kind, text), range)) => tokens.push(LexToken {
                kind,
                text,
                span: range.into(),
            }),
            Err(_) => {
                let message = match source[offset..].chars().next() {
                    Some('"') | Some('\'') => "unterminated or malformed literal".to_string(),
                    Some(c) => format!("unexpected character `{c}`"),
                    None => "unexpected end of input".to_string(),
                };
                return Err(ParseError::new(message, Span::new(offset, offset + 1)));
            }
        }
    }
    tokens.push(LexToken {
        kind: LexKind::Eof,
        text: String::new(),
        span: Span::new(source.len(), source.len()),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(LexKind, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_operators_prefer_longest() {
        let tokens = kinds("a += b == c => d");
        let puncts: Vec<_> = tokens
            .iter()
            .filter(|(k, _)| *k == LexKind::Punct)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(puncts, vec!["+=", "==", "=>"]);
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1 2.5 3.ToString");
        assert_eq!(tokens[0], (LexKind::Int, "1".to_string()));
        assert_eq!(tokens[1], (LexKind::Float, "2.5".to_string()));
        assert_eq!(tokens[2], (LexKind::Int, "3".to_string()));
        assert_eq!(tokens[3], (LexKind::Punct, ".".to_string()));
    }

    #[test]
    fn test_string_escapes_and_spans() {
        let tokens = tokenize(r#"  "a\"b\n" 'c'"#).unwrap();
        assert_eq!(tokens[0].kind, LexKind::Str);
        assert_eq!(tokens[0].text, "a\"b\n");
        assert_eq!(tokens[0].span, Span::new(2, 10));
        assert_eq!(tokens[1].kind, LexKind::Char);
        assert_eq!(tokens[1].text, "c");
        assert_eq!(tokens[2].kind, LexKind::Eof);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = kinds("a // line\n /* block */ b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].1, "b");
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = \"abc").unwrap_err();
        assert_eq!(err.span, Span::new(4, 5));
    }
}
