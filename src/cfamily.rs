//! Token types and standard lexer for C-family sources

use crate::channels::{
    CharacterLiteralChannel, CommentChannel, IdentifierAndKeywordChannel, LineContinuationChannel,
    NumberChannel, PreprocessorChannel, PunctuatorChannel, StringLiteralChannel,
    UnknownCharacterChannel, WhitespaceChannel,
};
use crate::config::LexerConfig;
use crate::lexer::{DirectivesAsTrivia, Lexer};
use crate::token::{TokenClass, TokenType};

pub static NUMBER: TokenType = TokenType::new("NUMBER", "NUMBER", TokenClass::Literal);
pub static STRING: TokenType = TokenType::new("STRING", "STRING", TokenClass::Literal);
pub static CHARACTER: TokenType = TokenType::new("CHARACTER", "CHARACTER", TokenClass::Literal);
pub static PREPROCESSOR: TokenType =
    TokenType::new("PREPROCESSOR", "PREPROCESSOR", TokenClass::Preprocessor);

/// Declares one static per token type plus a table listing all of them
macro_rules! token_table {
    ($class:expr, $table:ident { $($name:ident => $value:literal),* $(,)? }) => {
        $(pub static $name: TokenType = TokenType::new(stringify!($name), $value, $class);)*

        pub static $table: &[&TokenType] = &[$(&$name),*];
    };
}

pub mod keyword {
    use super::*;

    token_table!(TokenClass::Keyword, ALL {
        AUTO => "auto",
        BOOL => "bool",
        BREAK => "break",
        CASE => "case",
        CHAR => "char",
        CLASS => "class",
        CONST => "const",
        CONTINUE => "continue",
        DEFAULT => "default",
        DELETE => "delete",
        DO => "do",
        DOUBLE => "double",
        ELSE => "else",
        ENUM => "enum",
        EXTERN => "extern",
        FALSE => "false",
        FLOAT => "float",
        FOR => "for",
        GOTO => "goto",
        IF => "if",
        INLINE => "inline",
        INT => "int",
        LONG => "long",
        NAMESPACE => "namespace",
        NEW => "new",
        NULLPTR => "nullptr",
        PRIVATE => "private",
        PROTECTED => "protected",
        PUBLIC => "public",
        REGISTER => "register",
        RETURN => "return",
        SHORT => "short",
        SIGNED => "signed",
        SIZEOF => "sizeof",
        STATIC => "static",
        STRUCT => "struct",
        SWITCH => "switch",
        TEMPLATE => "template",
        THIS => "this",
        TRUE => "true",
        TYPEDEF => "typedef",
        TYPENAME => "typename",
        UNION => "union",
        UNSIGNED => "unsigned",
        VIRTUAL => "virtual",
        VOID => "void",
        VOLATILE => "volatile",
        WHILE => "while",
    });
}

pub mod punctuator {
    use super::*;

    token_table!(TokenClass::Punctuator, ALL {
        SHIFT_LEFT_ASSIGN => "<<=",
        SHIFT_RIGHT_ASSIGN => ">>=",
        ELLIPSIS => "...",
        ARROW_STAR => "->*",
        SPACESHIP => "<=>",
        SCOPE => "::",
        ARROW => "->",
        INCREMENT => "++",
        DECREMENT => "--",
        SHIFT_LEFT => "<<",
        SHIFT_RIGHT => ">>",
        LE => "<=",
        GE => ">=",
        EQ => "==",
        NE => "!=",
        AND_AND => "&&",
        OR_OR => "||",
        ADD_ASSIGN => "+=",
        SUB_ASSIGN => "-=",
        MUL_ASSIGN => "*=",
        DIV_ASSIGN => "/=",
        MOD_ASSIGN => "%=",
        AND_ASSIGN => "&=",
        OR_ASSIGN => "|=",
        XOR_ASSIGN => "^=",
        DOT_STAR => ".*",
        HASH_HASH => "##",
        LBRACE => "{",
        RBRACE => "}",
        LBRACKET => "[",
        RBRACKET => "]",
        LPAREN => "(",
        RPAREN => ")",
        SEMICOLON => ";",
        COLON => ":",
        COMMA => ",",
        DOT => ".",
        QUESTION => "?",
        PLUS => "+",
        MINUS => "-",
        STAR => "*",
        DIV => "/",
        MOD => "%",
        XOR => "^",
        AND => "&",
        OR => "|",
        TILDE => "~",
        NOT => "!",
        ASSIGN => "=",
        LT => "<",
        GT => ">",
        HASH => "#",
    });
}

/// Lexer with the standard C-family channels and the default options
pub fn lexer() -> Lexer {
    standard_lexer(&LexerConfig::default())
}

/// Lexer with the standard C-family channels.
///
/// Channel order: whitespace, comments, line continuations, preprocessor
/// directives, character, string and numeric literals, identifiers and
/// keywords, punctuators, and finally the unknown-character fallback.
pub fn standard_lexer(config: &LexerConfig) -> Lexer {
    let mut builder = Lexer::builder()
        .with_config(config)
        .with_channel(WhitespaceChannel);
    if config.comments {
        builder = builder.with_channel(CommentChannel);
    }
    builder = builder.with_channel(LineContinuationChannel);
    if config.preprocessor {
        builder = builder.with_channel(PreprocessorChannel::new(&PREPROCESSOR));
    }
    builder = builder
        .with_channel(CharacterLiteralChannel::new(&CHARACTER))
        .with_channel(StringLiteralChannel::new(&STRING))
        .with_channel(NumberChannel::new(&NUMBER))
        .with_channel(IdentifierAndKeywordChannel::new(keyword::ALL))
        .with_channel(PunctuatorChannel::new(punctuator::ALL))
        .with_channel(UnknownCharacterChannel);
    if config.preprocessor && config.directives_as_trivia {
        builder = builder.with_preprocessor(DirectivesAsTrivia::new(&PREPROCESSOR));
    }
    builder.build()
}
