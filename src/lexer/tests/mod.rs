use pretty_assertions::assert_eq;

use crate::lexer::{deindent, expand_env, indentation, tokenize_expr, tokenize_line, Keyword, Token};


fn toks(line: &str) -> Vec<Token> {
    tokenize_line(line, "test", 1)
        .expect("tokenization failed")
        .expect("expected tokens")
}

#[test]
fn blank_and_comment_lines() {
    assert_eq!(tokenize_line("", "test", 1).unwrap(), None);
    assert_eq!(tokenize_line("   \t ", "test", 1).unwrap(), None);
    assert_eq!(tokenize_line("# just a comment", "test", 1).unwrap(), None);
    assert_eq!(tokenize_line("  # indented comment", "test", 1).unwrap(), None);
}

#[test]
fn config_line() {
    assert_eq!(
        toks("config FOO"),
        vec![Token::Key(Keyword::Config), Token::Name("FOO".into())]
    );
}

#[test]
fn trailing_comment_is_dropped() {
    assert_eq!(
        toks("config FOO # not part of the statement"),
        vec![Token::Key(Keyword::Config), Token::Name("FOO".into())]
    );
}

#[test]
fn prompt_with_condition() {
    assert_eq!(
        toks("bool \"enable foo\" if BAR"),
        vec![
            Token::Key(Keyword::Bool),
            Token::Literal("enable foo".into()),
            Token::Key(Keyword::If),
            Token::Name("BAR".into()),
        ]
    );
}

#[test]
fn operators() {
    assert_eq!(
        toks("depends on A && (B || !C)"),
        vec![
            Token::Key(Keyword::Depends),
            Token::Key(Keyword::On),
            Token::Name("A".into()),
            Token::And,
            Token::OpenParen,
            Token::Name("B".into()),
            Token::Or,
            Token::Not,
            Token::Name("C".into()),
            Token::CloseParen,
        ]
    );
}

#[test]
fn relations() {
    assert_eq!(
        toks("default y if N > 3 && N <= 0x10 && M != n"),
        vec![
            Token::Key(Keyword::Default),
            Token::Name("y".into()),
            Token::Key(Keyword::If),
            Token::Name("N".into()),
            Token::Greater,
            Token::Name("3".into()),
            Token::And,
            Token::Name("N".into()),
            Token::LessEqual,
            Token::Name("0x10".into()),
            Token::And,
            Token::Name("M".into()),
            Token::Unequal,
            Token::Name("n".into()),
        ]
    );
}

#[test]
fn string_escapes() {
    assert_eq!(
        toks(r#"prompt "a \"quoted\" word and a backslash \\""#),
        vec![
            Token::Key(Keyword::Prompt),
            Token::Literal(r#"a "quoted" word and a backslash \"#.into()),
        ]
    );

    assert_eq!(
        toks(r"comment 'single \' quoted'"),
        vec![
            Token::Key(Keyword::Comment),
            Token::Literal("single ' quoted".into()),
        ]
    );
}

#[test]
fn unterminated_string_is_an_error() {
    assert!(tokenize_line("menu \"never closed", "test", 3).is_err());
}

#[test]
fn unknown_first_word_is_an_error() {
    assert!(tokenize_line("frobnicate FOO", "test", 7).is_err());
}

#[test]
fn dashed_help_spelling() {
    assert_eq!(toks("---help---"), vec![Token::Key(Keyword::Help)]);
    assert_eq!(toks("help"), vec![Token::Key(Keyword::Help)]);
}

#[test]
fn stray_characters_are_ignored() {
    // A single & or | is not an operator; unknowable bytes are skipped
    assert_eq!(
        toks("config A & $"),
        vec![Token::Key(Keyword::Config), Token::Name("A".into())]
    );
}

#[test]
fn expression_tokenization() {
    assert_eq!(
        tokenize_expr("FOO && m").unwrap(),
        vec![
            Token::Name("FOO".into()),
            Token::And,
            Token::Name("m".into()),
        ]
    );
}

#[test]
fn env_expansion() {
    std::env::set_var("KCONFIG_LEXER_TEST_VAR", "expanded");
    assert_eq!(
        expand_env("a $KCONFIG_LEXER_TEST_VAR b"),
        "a expanded b"
    );
    assert_eq!(
        expand_env("a $(KCONFIG_LEXER_TEST_VAR) b"),
        "a expanded b"
    );
    assert_eq!(expand_env("$KCONFIG_LEXER_TEST_UNSET_VAR"), "");

    assert_eq!(
        toks("menu \"$KCONFIG_LEXER_TEST_VAR menu\""),
        vec![
            Token::Key(Keyword::Menu),
            Token::Literal("expanded menu".into()),
        ]
    );
}

#[test]
fn env_expansion_is_not_recursive() {
    std::env::set_var("KCONFIG_LEXER_TEST_OUTER", "$KCONFIG_LEXER_TEST_INNER");
    std::env::set_var("KCONFIG_LEXER_TEST_INNER", "should not appear");
    assert_eq!(
        expand_env("$KCONFIG_LEXER_TEST_OUTER"),
        "$KCONFIG_LEXER_TEST_INNER"
    );
}

#[test]
fn indentation_and_deindent() {
    assert_eq!(indentation("    four"), 4);
    assert_eq!(indentation("\ttabbed"), 8);
    assert_eq!(indentation("  \tmixed"), 8);
    assert_eq!(indentation("none"), 0);

    assert_eq!(deindent("    text", 4), "text");
    assert_eq!(deindent("\t  text", 8), "  text");
    assert_eq!(deindent("  ", 4), "  ");
}
