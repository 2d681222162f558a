#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_int_literals_with_bases_and_underscores() {
        let src = "let a = 1_000\nlet b = 0b1010_0110\nlet c = 0o755\nlet d = 0xDEAD_BEEF\n";
        let ints: Vec<u128> = kinds(src)
            .into_iter()
            .filter_map(|k| match k {
                TokenKind::Int(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(ints, vec![1000, 0b1010_0110, 0o755, 0xDEAD_BEEF]);
    }

    #[test]
    fn lex_rejects_bad_int_underscore_placement() {
        let err = Lexer::new("let x = 0x_DEAD\n").lex().unwrap_err();
        assert!(err.message.contains("invalid integer literal"));
    }

    #[test]
    fn lex_transfer_operators_greedily() {
        assert_eq!(
            kinds("x <-> y <- z ?? w"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Swap,
                TokenKind::Ident("y".into()),
                TokenKind::LeftArrow,
                TokenKind::Ident("z".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Ident("w".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_skips_comments() {
        let src = "// leading\nlet /* inline */ x = 1 // trailing\n/* multi\nline */";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::KwLet,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_records_line_breaks() {
        let tokens = Lexer::new("let x = y\n(z)").lex().unwrap();
        let lparen = tokens
            .iter()
            .find(|t| t.kind == TokenKind::LParen)
            .unwrap();
        assert!(lparen.line_break_before);
        assert!(!tokens[0].line_break_before);
        assert!(!tokens[1].line_break_before);
    }

    #[test]
    fn lex_string_escapes() {
        let s = kinds("\"a\\n\\t\\\"\\u{41}\"")
            .into_iter()
            .find_map(|k| match k {
                TokenKind::String(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(s, "a\n\t\"A");
    }

    #[test]
    fn lex_rejects_unknown_string_escape() {
        let err = Lexer::new("let s = \"\\q\"\n").lex().unwrap_err();
        assert!(err.message.contains("invalid string literal"));
    }
}
