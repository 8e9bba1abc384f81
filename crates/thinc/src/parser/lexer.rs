use super::{ParseError, Span};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    BracketCurlyOpen,
    BracketCurlyClose,
    Comment(&'code str),
    Number(f64),
    Pipe,
    Wildcard,
    Implies,
    Colon,
    Comma,
    Dot,
    Newline,
    NotEqual,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    Equal,
    Minus,
    Plus,
    Asterisk,
    Slash,
    Text(&'code str),
    SnakeCaseIdentifier(&'code str),
    PascalCaseIdentifier(&'code str),
    Roc,
    List,
    When,
    Skip,
    // TEXT literal content: TEXT { content with {var} interpolation }
    // The content is the raw string between TEXT { and }
    TextContent(&'code str),
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::BracketCurlyOpen => "{".into(),
            Self::BracketCurlyClose => "}".into(),
            Self::Comment(comment) => comment.into(),
            Self::Number(number) => number.to_string().into(),
            Self::Pipe => "|>".into(),
            Self::Wildcard => "__".into(),
            Self::Implies => "=>".into(),
            Self::Colon => ":".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Newline => "\n".into(),
            Self::NotEqual => "=/=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Greater => ">".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Less => "<".into(),
            Self::Equal => "==".into(),
            Self::Minus => "-".into(),
            Self::Plus => "+".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Text(text) => text.into(),
            Self::SnakeCaseIdentifier(identifier) => identifier.into(),
            Self::PascalCaseIdentifier(identifier) => identifier.into(),
            Self::Roc => "roc".into(),
            Self::List => "LIST".into(),
            Self::When => "WHEN".into(),
            Self::Skip => "SKIP".into(),
            Self::TextContent(content) => format!("TEXT {{ {} }}", content).into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<(Token<'code>, Span)>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
        just('{').to(Token::BracketCurlyOpen),
        just('}').to(Token::BracketCurlyClose),
    ));

    let comparator = choice((
        just("=/=").to(Token::NotEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('>').to(Token::Greater),
        just("<=").to(Token::LessOrEqual),
        just('<').to(Token::Less),
        just("==").to(Token::Equal),
    ));

    let arithmetic_operator = choice((
        just('-').to(Token::Minus),
        just('+').to(Token::Plus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
    ));

    let comment = just("--")
        .ignore_then(
            any()
                .and_is(text::inline_whitespace().then(text::newline()).not())
                .repeated(),
        )
        .to_slice()
        .map(Token::Comment);

    let number = just('-')
        .repeated()
        .at_most(1)
        .then(text::int(10).then(just('.').then(text::digits(10)).or_not()))
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let text = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(Token::Text);

    // `roc` is the routing keyword, otherwise any lowercase run is an identifier
    let snake_case_identifier = any()
        .filter(char::is_ascii_lowercase)
        .then(
            any()
                .filter(|character: &char| {
                    *character == '_'
                        || character.is_ascii_lowercase()
                        || character.is_ascii_digit()
                })
                .repeated(),
        )
        .to_slice()
        .map(|identifier: &str| match identifier {
            "roc" => Token::Roc,
            _ => Token::SnakeCaseIdentifier(identifier),
        });

    let pascal_case_identifier = any()
        .filter(char::is_ascii_uppercase)
        .then(any().filter(|character: &char| character.is_ascii_lowercase() || character.is_ascii_uppercase() || character.is_ascii_digit()).repeated())
        .to_slice()
        .try_map(|identifier: &str, span| {
            if identifier.len() == 1 || identifier.chars().rev().any(|character| {
                character.is_ascii_lowercase() || character.is_ascii_digit()
            }) {
                Ok(Token::PascalCaseIdentifier(identifier))
            } else {
                Err(ParseError::custom(span, format!("PascalCase identifier has to contain at least one digit or lowercase character. Identifier: '{identifier}'")))
            }
        });

    let keyword = any()
        .filter(char::is_ascii_uppercase)
        .repeated()
        .at_least(2)
        .to_slice()
        .try_map(|keyword, span| match keyword {
            "LIST" => Ok(Token::List),
            "WHEN" => Ok(Token::When),
            "SKIP" => Ok(Token::Skip),
            // TEXT is handled specially below, not as a keyword
            _ => Err(ParseError::custom(
                span,
                format!("Unknown keyword '{keyword}'"),
            )),
        });

    // TEXT { content } - captures content between TEXT { and }
    // Content can include {var} for interpolation - we track brace depth to find the matching }
    let text_content_inner = recursive(|text_content_inner| {
        choice((
            just('{')
                .then(text_content_inner)
                .then(just('}'))
                .to_slice(),
            none_of("{}").to_slice(),
        ))
        .repeated()
        .to_slice()
    });

    let text_content = just("TEXT")
        .then(text::inline_whitespace())
        .ignore_then(just('{'))
        .ignore_then(text_content_inner)
        .then_ignore(just('}'))
        .map(|content: &str| Token::TextContent(content.trim()));

    let token = choice((
        bracket,
        comment,
        number,
        just("|>").to(Token::Pipe),
        just("__").to(Token::Wildcard),
        just("=>").to(Token::Implies),
        just(':').to(Token::Colon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        text::newline().to(Token::Newline),
        comparator,
        arithmetic_operator,
        text_content,
        text,
        snake_case_identifier,
        pascal_case_identifier,
        keyword,
    ));

    token
        .map_with(|token, extra| (token, extra.span()))
        .padded_by(text::inline_whitespace())
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(code: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(code)
            .output()
            .unwrap()
            .iter()
            .map(|(token, _)| *token)
            .collect()
    }

    #[test]
    fn test_roc_statement() {
        assert_eq!(
            tokens("roc console.line('hi')"),
            vec![
                Token::Roc,
                Token::SnakeCaseIdentifier("console"),
                Token::Dot,
                Token::SnakeCaseIdentifier("line"),
                Token::BracketRoundOpen,
                Token::Text("hi"),
                Token::BracketRoundClose,
            ]
        );
    }

    #[test]
    fn test_roc_prefixed_identifier_is_not_keyword() {
        assert_eq!(tokens("rocket"), vec![Token::SnakeCaseIdentifier("rocket")]);
    }

    #[test]
    fn test_text_content_simple() {
        assert_eq!(tokens("TEXT { hello }"), vec![Token::TextContent("hello")]);
    }

    #[test]
    fn test_text_content_with_interpolation() {
        assert_eq!(
            tokens("TEXT { hello {name} }"),
            vec![Token::TextContent("hello {name}")]
        );
    }

    #[test]
    fn test_number_and_operators() {
        assert_eq!(
            tokens("1 + 2.5"),
            vec![Token::Number(1.0), Token::Plus, Token::Number(2.5)]
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(tokens("-- note"), vec![Token::Comment("-- note")]);
    }
}
