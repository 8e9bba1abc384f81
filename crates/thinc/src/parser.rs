use chumsky::{input::ValueInput, pratt::*, prelude::*};

mod lexer;
pub use lexer::{Token, lexer};

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

/// A thinc program is a newline-separated sequence of statements.
#[derive(Debug, Clone)]
pub enum Statement<'code> {
    /// `name: expression`
    Binding {
        name: &'code str,
        value: Spanned<Expression<'code>>,
    },
    /// `roc target.port(expression)`
    Route {
        target: &'code str,
        port: &'code str,
        value: Spanned<Expression<'code>>,
    },
    /// A bare expression; the last one is the program result.
    Expression(Spanned<Expression<'code>>),
}

#[derive(Debug, Clone)]
pub enum Expression<'code> {
    Literal(Literal<'code>),
    // TEXT { content with {var} interpolation }
    TextLiteral {
        parts: Vec<TextPart<'code>>,
    },
    List {
        items: Vec<Spanned<Self>>,
    },
    Alias {
        name: &'code str,
    },
    When {
        arms: Vec<Arm<'code>>,
    },
    Pipe {
        from: Box<Spanned<Self>>,
        to: Box<Spanned<Self>>,
    },
    Comparator {
        operator: Comparator,
        operand_a: Box<Spanned<Self>>,
        operand_b: Box<Spanned<Self>>,
    },
    Arithmetic {
        operator: ArithmeticOperator,
        operand_a: Box<Spanned<Self>>,
        operand_b: Box<Spanned<Self>>,
    },
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'code> {
    Number(f64),
    Text(&'code str),
    Tag(&'code str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextPart<'code> {
    Text(&'code str),
    Interpolation { var: &'code str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone)]
pub struct Arm<'code> {
    pub pattern: Pattern<'code>,
    pub body: Spanned<Expression<'code>>,
}

#[derive(Debug, Clone)]
pub enum Pattern<'code> {
    Literal(Literal<'code>),
    Binding { name: &'code str },
    Wildcard,
}

pub fn parser<'code, I>()
-> impl Parser<'code, I, Vec<Spanned<Statement<'code>>>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let newlines = just(Token::Newline).repeated();

    let colon = just(Token::Colon);
    let comma = just(Token::Comma);
    let dot = just(Token::Dot);
    let bracket_round_open = just(Token::BracketRoundOpen);
    let bracket_round_close = just(Token::BracketRoundClose);
    let bracket_curly_open = just(Token::BracketCurlyOpen);
    let bracket_curly_close = just(Token::BracketCurlyClose);

    let snake_case_identifier = select! { Token::SnakeCaseIdentifier(identifier) => identifier };
    let pascal_case_identifier = select! { Token::PascalCaseIdentifier(identifier) => identifier };

    let expression = recursive(|expression| {
        let number = select! { Token::Number(number) => Literal::Number(number) };
        let text = select! { Token::Text(text) => Literal::Text(text) };
        let tag = pascal_case_identifier.map(Literal::Tag);

        let literal = choice((number, text, tag));
        let expression_literal = literal.map(Expression::Literal);

        let list = just(Token::List)
            .ignore_then(
                expression
                    .clone()
                    .separated_by(comma.ignored().or(newlines))
                    .collect()
                    .delimited_by(
                        bracket_curly_open.then(newlines),
                        newlines.then(bracket_curly_close),
                    ),
            )
            .map(|items| Expression::List { items });

        let alias = snake_case_identifier.map(|name| Expression::Alias { name });

        let pattern = choice((
            just(Token::Wildcard).to(Pattern::Wildcard),
            literal.map(Pattern::Literal),
            snake_case_identifier.map(|name| Pattern::Binding { name }),
        ));

        let arm = pattern
            .then_ignore(just(Token::Implies))
            .then(expression.clone())
            .map(|(pattern, body)| Arm { pattern, body });

        let when = just(Token::When)
            .ignore_then(
                arm.separated_by(comma.ignored().or(newlines))
                    .collect()
                    .delimited_by(
                        bracket_curly_open.then(newlines),
                        newlines.then(bracket_curly_close),
                    ),
            )
            .map(|arms| Expression::When { arms });

        let skip = just(Token::Skip).to(Expression::Skip);

        // TEXT { content with {var} interpolation }
        let text_literal = select! { Token::TextContent(content) => content }.map(
            |content: &str| {
                let mut parts = Vec::new();
                let mut current_text_start = 0;
                let mut chars = content.char_indices().peekable();

                while let Some((i, c)) = chars.next() {
                    if c == '{' {
                        if i > current_text_start {
                            parts.push(TextPart::Text(&content[current_text_start..i]));
                        }

                        let var_start = i + 1;
                        let mut var_end = var_start;
                        for (j, c2) in chars.by_ref() {
                            if c2 == '}' {
                                var_end = j;
                                break;
                            }
                        }

                        let var_name = content[var_start..var_end].trim();
                        if !var_name.is_empty() {
                            parts.push(TextPart::Interpolation { var: var_name });
                        }

                        current_text_start = var_end + 1;
                    }
                }

                if current_text_start < content.len() {
                    parts.push(TextPart::Text(&content[current_text_start..]));
                }

                Expression::TextLiteral { parts }
            },
        );

        let atom = choice((
            list,
            when,
            skip,
            text_literal,
            expression_literal,
            alias,
        ));

        let nested = expression
            .clone()
            .delimited_by(bracket_round_open, bracket_round_close);

        atom.map_with(|expression, extra| Spanned {
            span: extra.span(),
            node: expression,
        })
        .or(nested)
        .pratt((
            // Precedence 1 (lowest): Pipe
            infix(left(1), just(Token::Pipe), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Pipe {
                    from: Box::new(l),
                    to: Box::new(r),
                },
            }),
            // Precedence 3: Comparison operators
            infix(left(3), just(Token::Equal), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator {
                    operator: Comparator::Equal,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::NotEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator {
                    operator: Comparator::NotEqual,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::Greater), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator {
                    operator: Comparator::Greater,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::GreaterOrEqual), |l, _, r, extra| {
                Spanned {
                    span: extra.span(),
                    node: Expression::Comparator {
                        operator: Comparator::GreaterOrEqual,
                        operand_a: Box::new(l),
                        operand_b: Box::new(r),
                    },
                }
            }),
            infix(left(3), just(Token::Less), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator {
                    operator: Comparator::Less,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::LessOrEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Comparator {
                    operator: Comparator::LessOrEqual,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            // Precedence 5: Additive operators
            infix(left(5), just(Token::Plus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic {
                    operator: ArithmeticOperator::Add,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(5), just(Token::Minus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic {
                    operator: ArithmeticOperator::Subtract,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            // Precedence 7: Multiplicative operators
            infix(left(7), just(Token::Asterisk), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic {
                    operator: ArithmeticOperator::Multiply,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(7), just(Token::Slash), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Arithmetic {
                    operator: ArithmeticOperator::Divide,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
        ))
    });

    let route = just(Token::Roc)
        .ignore_then(snake_case_identifier)
        .then_ignore(dot)
        .then(snake_case_identifier)
        .then(
            expression
                .clone()
                .delimited_by(bracket_round_open, bracket_round_close),
        )
        .map(|((target, port), value)| Statement::Route {
            target,
            port,
            value,
        });

    let binding = snake_case_identifier
        .then_ignore(colon)
        .then(expression.clone())
        .map(|(name, value)| Statement::Binding { name, value });

    let statement = choice((
        route,
        binding,
        expression.map(Statement::Expression),
    ));

    statement
        .map_with(|statement, extra| Spanned {
            span: extra.span(),
            node: statement,
        })
        .padded_by(newlines)
        .repeated()
        .collect()
}
