//! Tokenizer for FlowScript source.
//!
//! [`Token`] is a logos-derived lexer. Whitespace and `#` line comments are
//! skipped; every surviving token is paired with its 1-based source line,
//! computed from the token's byte span against a precomputed line index.

use logos::Logos;

use crate::error::ParseError;

/// One FlowScript token.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    /// Integer literal. The callback rejects values outside `i32`.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    Number(i32),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Keywords. Exact tokens outrank the identifier regex in logos.
    #[token("func")]
    Func,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("each")]
    Each,
    #[token("range")]
    Range,
    #[token("print")]
    Print,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // Operators.
    #[token("|>")]
    Pipe,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    // Punctuation.
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
}

impl Token {
    /// Short description for "unexpected <this>" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number '{v}'"),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Func => "'func'".into(),
            Token::Return => "'return'".into(),
            Token::If => "'if'".into(),
            Token::Else => "'else'".into(),
            Token::For => "'for'".into(),
            Token::Each => "'each'".into(),
            Token::Range => "'range'".into(),
            Token::Print => "'print'".into(),
            Token::And => "'and'".into(),
            Token::Or => "'or'".into(),
            Token::Not => "'not'".into(),
            Token::Pipe => "'|>'".into(),
            Token::EqEq => "'=='".into(),
            Token::NotEq => "'!='".into(),
            Token::LessEq => "'<='".into(),
            Token::GreaterEq => "'>='".into(),
            Token::Less => "'<'".into(),
            Token::Greater => "'>'".into(),
            Token::Assign => "'='".into(),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::Comma => "','".into(),
            Token::Semi => "';'".into(),
        }
    }
}

/// Byte-offset to 1-based line lookup.
struct LineIndex {
    /// Byte offset of the start of each line, ascending.
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        LineIndex { starts }
    }

    fn line(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&s| s <= offset) as u32
    }
}

/// Tokenize a whole source string, attaching line numbers.
pub fn lex(source: &str) -> Result<Vec<(Token, u32)>, ParseError> {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();

    for (result, span) in Token::lexer(source).spanned() {
        let line = index.line(span.start);
        match result {
            Ok(token) => tokens.push((token, line)),
            Err(()) => {
                let text = source[span].to_string();
                // A failed callback on an all-digit slice is an overflowing
                // literal; anything else is an unknown character.
                if text.bytes().all(|b| b.is_ascii_digit()) && !text.is_empty() {
                    return Err(ParseError::InvalidInteger { line, text });
                }
                return Err(ParseError::UnexpectedChar { line, text });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("func each ranged"),
            vec![Token::Func, Token::Each, Token::Ident("ranged".into())]
        );
    }

    #[test]
    fn pipe_and_comparisons_lex_greedily() {
        assert_eq!(
            kinds("a |> b <= c == d"),
            vec![
                Token::Ident("a".into()),
                Token::Pipe,
                Token::Ident("b".into()),
                Token::LessEq,
                Token::Ident("c".into()),
                Token::EqEq,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn line_numbers_follow_newlines() {
        let toks = lex("x = 1\n# a comment\ny = 2\n").unwrap();
        let lines: Vec<u32> = toks.iter().map(|(_, l)| *l).collect();
        assert_eq!(lines, vec![1, 1, 1, 3, 3, 3]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(kinds("# x = 1\n5"), vec![Token::Number(5)]);
    }

    #[test]
    fn overflowing_literal_is_reported_with_line() {
        let err = lex("x =\n99999999999").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidInteger {
                line: 2,
                text: "99999999999".into()
            }
        );
    }

    #[test]
    fn unknown_character_is_reported() {
        let err = lex("a @ b").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedChar { line: 1, .. }));
    }

    proptest! {
        #[test]
        fn nonnegative_i32_literals_roundtrip(value in 0i32..=i32::MAX) {
            let toks = lex(&value.to_string()).unwrap();
            prop_assert_eq!(toks, vec![(Token::Number(value), 1)]);
        }

        #[test]
        fn identifiers_lex_as_single_token(name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}") {
            prop_assume!(![
                "func", "return", "if", "else", "for", "each",
                "range", "print", "and", "or", "not",
            ]
            .contains(&name.as_str()));
            let toks = lex(&name).unwrap();
            prop_assert_eq!(toks, vec![(Token::Ident(name), 1)]);
        }
    }
}
