//! Recursive-descent parser over the token stream produced by [`crate::lexer`].

use crate::kind::{SyntaxKind, TokenKind};
use crate::lexer::{LexKind, LexToken, ParseError, tokenize};
use crate::node::{SyntaxElement, SyntaxNode, SyntaxToken};
use crate::span::Span;

type PResult<T> = Result<T, ParseError>;

const KEYWORDS: &[&str] = &[
    "template", "var", "if", "else", "foreach", "in", "while", "do", "for", "return", "break",
    "continue", "goto", "switch", "case", "default", "lock", "function", "yield", "using",
    "await", "this", "true", "false", "null", "from", "where", "select",
];

/// Type names accepted in cast position.
pub const PREDEFINED_TYPES: &[&str] = &[
    "bool", "char", "string", "int", "long", "float", "double", "object", "dynamic",
];

/// Binary operators by increasing precedence.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["==", "!="],
    &["<", ">", "<=", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Parse a file containing any number of `template` declarations.
pub fn parse_compilation_unit(source: &str) -> PResult<SyntaxNode> {
    let mut parser = Parser::new(source)?;
    let mut templates = Vec::new();
    while parser.peek().kind != LexKind::Eof {
        templates.push(parser.template()?.into());
    }
    tracing::trace!(templates = templates.len(), "parsed compilation unit");
    Ok(SyntaxNode::new(
        SyntaxKind::CompilationUnit,
        Span::new(0, source.len()),
        templates,
    ))
}

/// Parse a single statement; the whole input must be consumed.
pub fn parse_statement(source: &str) -> PResult<SyntaxNode> {
    let mut parser = Parser::new(source)?;
    let statement = parser.statement()?;
    parser.expect_eof()?;
    Ok(statement)
}

/// Parse a single expression; the whole input must be consumed.
pub fn parse_expression(source: &str) -> PResult<SyntaxNode> {
    let mut parser = Parser::new(source)?;
    let expression = parser.expression()?;
    parser.expect_eof()?;
    Ok(expression)
}

struct Parser {
    tokens: Vec<LexToken>,
    pos: usize,
    last_end: usize,
}

impl Parser {
    fn new(source: &str) -> PResult<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            last_end: 0,
        })
    }

    // Token cursor

    fn peek(&self) -> &LexToken {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> &LexToken {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn bump(&mut self) -> LexToken {
        let token = self.tokens[self.pos].clone();
        if token.kind != LexKind::Eof {
            self.pos += 1;
        }
        self.last_end = token.span.end;
        token
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn nth_is_punct(&self, n: usize, punct: &str) -> bool {
        let token = self.nth(n);
        token.kind == LexKind::Punct && token.text == punct
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        let token = self.nth(n);
        token.kind == LexKind::Ident && token.text == keyword
    }

    fn nth_is_name(&self, n: usize) -> bool {
        let token = self.nth(n);
        token.kind == LexKind::Ident && !is_keyword(&token.text)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.nth_is_punct(0, punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.nth_is_keyword(0, keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> PResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{punct}`")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{keyword}`")))
        }
    }

    fn expect_eof(&self) -> PResult<()> {
        if self.peek().kind == LexKind::Eof {
            Ok(())
        } else {
            Err(self.error("expected end of input"))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.peek();
        let found = match token.kind {
            LexKind::Eof => "end of input".to_string(),
            LexKind::Str => "string literal".to_string(),
            LexKind::Char => "char literal".to_string(),
            _ => format!("`{}`", token.text),
        };
        ParseError::new(format!("{expected}, found {found}"), token.span)
    }

    /// Consume the next operator if it is one of `operators`.
    fn eat_operator(&mut self, operators: &[&str]) -> Option<SyntaxToken> {
        let token = self.peek();
        if token.kind != LexKind::Punct || !operators.contains(&token.text.as_str()) {
            return None;
        }
        let kind = TokenKind::from_operator(&token.text)?;
        let token = self.bump();
        Some(SyntaxToken::new(kind, token.text, token.span))
    }

    fn identifier(&mut self) -> PResult<SyntaxToken> {
        if !self.nth_is_name(0) {
            return Err(self.error("expected identifier"));
        }
        let token = self.bump();
        Ok(SyntaxToken::new(
            TokenKind::Identifier,
            token.text,
            token.span,
        ))
    }

    fn keyword_token(&mut self, kind: TokenKind) -> SyntaxToken {
        let token = self.bump();
        SyntaxToken::new(kind, token.text, token.span)
    }

    fn finish(&self, kind: SyntaxKind, start: usize, children: Vec<SyntaxElement>) -> SyntaxNode {
        SyntaxNode::new(kind, Span::new(start, self.last_end.max(start)), children)
    }

    // Declarations

    fn template(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_keyword("template")?;
        let mut children: Vec<SyntaxElement> = vec![self.identifier()?.into()];
        children.extend(self.parameter_list()?.into_iter().map(SyntaxElement::from));
        children.push(self.block()?.into());
        Ok(self.finish(SyntaxKind::Template, start, children))
    }

    fn parameter_list(&mut self) -> PResult<Vec<SyntaxNode>> {
        self.expect_punct("(")?;
        let mut parameters = Vec::new();
        if !self.at_punct(")") {
            loop {
                parameters.push(self.parameter()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok(parameters)
    }

    fn parameter(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let mut children: Vec<SyntaxElement> = Vec::new();
        if self.nth_is_name(1) || self.nth_is_punct(1, "<") {
            children.push(self.type_syntax()?.into());
        }
        children.push(self.identifier()?.into());
        Ok(self.finish(SyntaxKind::Parameter, start, children))
    }

    fn type_syntax(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let text = self.type_text()?;
        let token = SyntaxToken::new(TokenKind::TypeName, text, Span::new(start, self.last_end));
        Ok(self.finish(SyntaxKind::TypeSyntax, start, vec![token.into()]))
    }

    fn type_text(&mut self) -> PResult<String> {
        if self.peek().kind != LexKind::Ident {
            return Err(self.error("expected type name"));
        }
        let mut text = self.bump().text;
        if self.eat_punct("<") {
            text.push('<');
            loop {
                text.push_str(&self.type_text()?);
                if !self.eat_punct(",") {
                    break;
                }
                text.push_str(", ");
            }
            self.expect_punct(">")?;
            text.push('>');
        }
        Ok(text)
    }

    // Statements

    fn block(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.at_punct("}") {
            if self.peek().kind == LexKind::Eof {
                return Err(self.error("expected `}`"));
            }
            statements.push(self.statement()?.into());
        }
        self.expect_punct("}")?;
        Ok(self.finish(SyntaxKind::Block, start, statements))
    }

    fn statement(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        if self.at_punct("{") {
            return self.block();
        }
        if self.eat_punct(";") {
            return Ok(self.finish(SyntaxKind::EmptyStatement, start, Vec::new()));
        }
        if self.peek().kind == LexKind::Ident {
            let keyword = self.peek().text.clone();
            match keyword.as_str() {
                "var" => {
                    let declarators = self.declarators()?;
                    self.expect_punct(";")?;
                    return Ok(self.finish(SyntaxKind::LocalDeclaration, start, declarators));
                }
                "if" => return self.if_statement(),
                "foreach" => return self.foreach_statement(None),
                "using" => return self.using_statement(None),
                "await" if self.nth_is_keyword(1, "foreach") => {
                    let token = self.keyword_token(TokenKind::AwaitKeyword);
                    return self.foreach_statement(Some((start, token)));
                }
                "await" if self.nth_is_keyword(1, "using") => {
                    let token = self.keyword_token(TokenKind::AwaitKeyword);
                    return self.using_statement(Some((start, token)));
                }
                "while" => {
                    self.bump();
                    let condition = self.parenthesized_condition()?;
                    let body = self.statement()?;
                    return Ok(self.finish(
                        SyntaxKind::WhileStatement,
                        start,
                        vec![condition.into(), body.into()],
                    ));
                }
                "do" => {
                    self.bump();
                    let body = self.statement()?;
                    self.expect_keyword("while")?;
                    let condition = self.parenthesized_condition()?;
                    self.expect_punct(";")?;
                    return Ok(self.finish(
                        SyntaxKind::DoStatement,
                        start,
                        vec![body.into(), condition.into()],
                    ));
                }
                "for" => return self.for_statement(),
                "return" => {
                    self.bump();
                    let mut children = Vec::new();
                    if !self.at_punct(";") {
                        children.push(self.expression()?.into());
                    }
                    self.expect_punct(";")?;
                    return Ok(self.finish(SyntaxKind::ReturnStatement, start, children));
                }
                "break" | "continue" => {
                    self.bump();
                    self.expect_punct(";")?;
                    let kind = if keyword == "break" {
                        SyntaxKind::BreakStatement
                    } else {
                        SyntaxKind::ContinueStatement
                    };
                    return Ok(self.finish(kind, start, Vec::new()));
                }
                "goto" => {
                    self.bump();
                    let label = self.identifier()?;
                    self.expect_punct(";")?;
                    return Ok(self.finish(SyntaxKind::GotoStatement, start, vec![label.into()]));
                }
                "switch" => return self.switch_statement(),
                "lock" => {
                    self.bump();
                    let target = self.parenthesized_condition()?;
                    let body = self.statement()?;
                    return Ok(self.finish(
                        SyntaxKind::LockStatement,
                        start,
                        vec![target.into(), body.into()],
                    ));
                }
                "function" => {
                    self.bump();
                    let mut children: Vec<SyntaxElement> = vec![self.identifier()?.into()];
                    children.extend(self.parameter_list()?.into_iter().map(SyntaxElement::from));
                    children.push(self.block()?.into());
                    return Ok(self.finish(SyntaxKind::LocalFunction, start, children));
                }
                "yield" => {
                    self.bump();
                    if self.eat_keyword("return") {
                        let value = self.expression()?;
                        self.expect_punct(";")?;
                        return Ok(self.finish(
                            SyntaxKind::YieldReturnStatement,
                            start,
                            vec![value.into()],
                        ));
                    }
                    self.expect_keyword("break")?;
                    self.expect_punct(";")?;
                    return Ok(self.finish(SyntaxKind::YieldBreakStatement, start, Vec::new()));
                }
                _ => {}
            }
        }
        let expression = self.expression()?;
        self.expect_punct(";")?;
        Ok(self.finish(
            SyntaxKind::ExpressionStatement,
            start,
            vec![expression.into()],
        ))
    }

    /// `var a = e, b` without the trailing semicolon.
    fn declarators(&mut self) -> PResult<Vec<SyntaxElement>> {
        self.expect_keyword("var")?;
        let mut declarators = Vec::new();
        loop {
            let start = self.start();
            let mut children: Vec<SyntaxElement> = vec![self.identifier()?.into()];
            if self.eat_punct("=") {
                children.push(self.expression()?.into());
            }
            declarators.push(
                self.finish(SyntaxKind::VariableDeclarator, start, children)
                    .into(),
            );
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(declarators)
    }

    fn parenthesized_condition(&mut self) -> PResult<SyntaxNode> {
        self.expect_punct("(")?;
        let condition = self.expression()?;
        self.expect_punct(")")?;
        Ok(condition)
    }

    fn if_statement(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_keyword("if")?;
        let condition = self.parenthesized_condition()?;
        let then_branch = self.statement()?;
        let mut children: Vec<SyntaxElement> = vec![condition.into(), then_branch.into()];
        if self.at_keyword("else") {
            let else_start = self.start();
            self.bump();
            let body = self.statement()?;
            children.push(
                self.finish(SyntaxKind::ElseClause, else_start, vec![body.into()])
                    .into(),
            );
        }
        Ok(self.finish(SyntaxKind::IfStatement, start, children))
    }

    fn foreach_statement(&mut self, awaited: Option<(usize, SyntaxToken)>) -> PResult<SyntaxNode> {
        let start = awaited.as_ref().map_or(self.start(), |(start, _)| *start);
        let mut children: Vec<SyntaxElement> = Vec::new();
        if let Some((_, token)) = awaited {
            children.push(token.into());
        }
        self.expect_keyword("foreach")?;
        self.expect_punct("(")?;
        self.expect_keyword("var")?;
        children.push(self.identifier()?.into());
        self.expect_keyword("in")?;
        children.push(self.expression()?.into());
        self.expect_punct(")")?;
        children.push(self.statement()?.into());
        Ok(self.finish(SyntaxKind::ForEachStatement, start, children))
    }

    fn using_statement(&mut self, awaited: Option<(usize, SyntaxToken)>) -> PResult<SyntaxNode> {
        let start = awaited.as_ref().map_or(self.start(), |(start, _)| *start);
        let mut children: Vec<SyntaxElement> = Vec::new();
        if let Some((_, token)) = awaited {
            children.push(token.into());
        }
        self.expect_keyword("using")?;
        self.expect_punct("(")?;
        let declaration_start = self.start();
        let declarators = self.declarators()?;
        children.push(
            self.finish(SyntaxKind::LocalDeclaration, declaration_start, declarators)
                .into(),
        );
        self.expect_punct(")")?;
        children.push(self.statement()?.into());
        Ok(self.finish(SyntaxKind::UsingStatement, start, children))
    }

    fn for_statement(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_keyword("for")?;
        self.expect_punct("(")?;
        let initializer = if self.at_punct(";") {
            self.empty_part()
        } else if self.at_keyword("var") {
            let part_start = self.start();
            let declarators = self.declarators()?;
            self.finish(SyntaxKind::LocalDeclaration, part_start, declarators)
        } else {
            let part_start = self.start();
            let expression = self.expression()?;
            self.finish(
                SyntaxKind::ExpressionStatement,
                part_start,
                vec![expression.into()],
            )
        };
        self.expect_punct(";")?;
        let condition = if self.at_punct(";") {
            self.empty_part()
        } else {
            self.expression()?
        };
        self.expect_punct(";")?;
        let increment = if self.at_punct(")") {
            self.empty_part()
        } else {
            self.expression()?
        };
        self.expect_punct(")")?;
        let body = self.statement()?;
        Ok(self.finish(
            SyntaxKind::ForStatement,
            start,
            vec![
                initializer.into(),
                condition.into(),
                increment.into(),
                body.into(),
            ],
        ))
    }

    fn empty_part(&self) -> SyntaxNode {
        let at = self.start();
        SyntaxNode::new(SyntaxKind::EmptyStatement, Span::new(at, at), Vec::new())
    }

    fn switch_statement(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_keyword("switch")?;
        let subject = self.parenthesized_condition()?;
        self.expect_punct("{")?;
        let mut children: Vec<SyntaxElement> = vec![subject.into()];
        while !self.at_punct("}") {
            let section_start = self.start();
            let mut section: Vec<SyntaxElement> = Vec::new();
            if self.eat_keyword("case") {
                section.push(self.expression()?.into());
            } else if self.at_keyword("default") {
                section.push(self.keyword_token(TokenKind::DefaultKeyword).into());
            } else {
                return Err(self.error("expected `case` or `default`"));
            }
            self.expect_punct(":")?;
            while !(self.at_keyword("case") || self.at_keyword("default") || self.at_punct("}")) {
                if self.peek().kind == LexKind::Eof {
                    return Err(self.error("expected `}`"));
                }
                section.push(self.statement()?.into());
            }
            children.push(
                self.finish(SyntaxKind::SwitchSection, section_start, section)
                    .into(),
            );
        }
        self.expect_punct("}")?;
        Ok(self.finish(SyntaxKind::SwitchStatement, start, children))
    }

    // Expressions

    fn expression(&mut self) -> PResult<SyntaxNode> {
        if self.at_lambda() {
            return self.lambda();
        }
        let start = self.start();
        let target = self.conditional()?;
        if let Some(operator) = self.eat_operator(&["=", "+=", "-="]) {
            let value = self.expression()?;
            return Ok(self.finish(
                SyntaxKind::AssignmentExpression,
                start,
                vec![target.into(), operator.into(), value.into()],
            ));
        }
        Ok(target)
    }

    fn conditional(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let condition = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(condition);
        }
        let when_true = self.expression()?;
        self.expect_punct(":")?;
        let when_false = self.expression()?;
        Ok(self.finish(
            SyntaxKind::ConditionalExpression,
            start,
            vec![condition.into(), when_true.into(), when_false.into()],
        ))
    }

    fn binary(&mut self, level: usize) -> PResult<SyntaxNode> {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let start = self.start();
        let mut lhs = self.binary(level + 1)?;
        while let Some(operator) = self.eat_operator(operators) {
            let rhs = self.binary(level + 1)?;
            lhs = self.finish(
                SyntaxKind::BinaryExpression,
                start,
                vec![lhs.into(), operator.into(), rhs.into()],
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        if let Some(operator) = self.eat_operator(&["!", "-"]) {
            let operand = self.unary()?;
            return Ok(self.finish(
                SyntaxKind::PrefixUnaryExpression,
                start,
                vec![operator.into(), operand.into()],
            ));
        }
        if self.eat_keyword("await") {
            let operand = self.unary()?;
            return Ok(self.finish(SyntaxKind::AwaitExpression, start, vec![operand.into()]));
        }
        if self.at_cast() {
            self.bump();
            let ty = self.type_syntax()?;
            self.expect_punct(")")?;
            let operand = self.unary()?;
            return Ok(self.finish(
                SyntaxKind::CastExpression,
                start,
                vec![ty.into(), operand.into()],
            ));
        }
        self.postfix()
    }

    fn at_cast(&self) -> bool {
        self.at_punct("(")
            && self.nth(1).kind == LexKind::Ident
            && PREDEFINED_TYPES.contains(&self.nth(1).text.as_str())
            && self.nth_is_punct(2, ")")
    }

    fn postfix(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let mut expression = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.identifier()?;
                expression = self.finish(
                    SyntaxKind::MemberAccessExpression,
                    start,
                    vec![expression.into(), name.into()],
                );
            } else if self.at_punct("(") {
                let mut children: Vec<SyntaxElement> = vec![expression.into()];
                children.extend(self.arguments("(", ")")?.into_iter().map(SyntaxElement::from));
                expression = self.finish(SyntaxKind::InvocationExpression, start, children);
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expression = self.finish(
                    SyntaxKind::ElementAccessExpression,
                    start,
                    vec![expression.into(), index.into()],
                );
            } else if let Some(operator) = self.eat_operator(&["++", "--"]) {
                expression = self.finish(
                    SyntaxKind::PostfixUnaryExpression,
                    start,
                    vec![expression.into(), operator.into()],
                );
            } else {
                return Ok(expression);
            }
        }
    }

    fn arguments(&mut self, open: &str, close: &str) -> PResult<Vec<SyntaxNode>> {
        self.expect_punct(open)?;
        let mut arguments = Vec::new();
        if !self.at_punct(close) {
            loop {
                arguments.push(self.expression()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(close)?;
        Ok(arguments)
    }

    fn primary(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let token = self.peek().clone();
        let literal_kind = match token.kind {
            LexKind::Int => Some(TokenKind::IntLiteral),
            LexKind::Float => Some(TokenKind::FloatLiteral),
            LexKind::Str => Some(TokenKind::StringLiteral),
            LexKind::Char => Some(TokenKind::CharLiteral),
            LexKind::Ident => match token.text.as_str() {
                "true" => Some(TokenKind::TrueKeyword),
                "false" => Some(TokenKind::FalseKeyword),
                "null" => Some(TokenKind::NullKeyword),
                "default" => Some(TokenKind::DefaultKeyword),
                _ => None,
            },
            LexKind::Punct | LexKind::Eof => None,
        };
        if let Some(kind) = literal_kind {
            let token = self.keyword_token(kind);
            return Ok(self.finish(SyntaxKind::LiteralExpression, start, vec![token.into()]));
        }
        match token.kind {
            LexKind::Ident if token.text == "this" => {
                self.bump();
                Ok(self.finish(SyntaxKind::ThisExpression, start, Vec::new()))
            }
            LexKind::Ident if token.text == "from" => self.query(),
            LexKind::Ident if !is_keyword(&token.text) => {
                let name = self.identifier()?;
                Ok(self.finish(SyntaxKind::IdentifierName, start, vec![name.into()]))
            }
            LexKind::Punct if token.text == "(" => {
                self.bump();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(self.finish(
                    SyntaxKind::ParenthesizedExpression,
                    start,
                    vec![inner.into()],
                ))
            }
            LexKind::Punct if token.text == "[" => {
                let elements = self.arguments("[", "]")?;
                Ok(self.finish(
                    SyntaxKind::ListExpression,
                    start,
                    elements.into_iter().map(SyntaxElement::from).collect(),
                ))
            }
            _ => Err(self.error("expected expression")),
        }
    }

    /// `x => ...` or `(a, b) => ...`
    fn at_lambda(&self) -> bool {
        if self.nth_is_name(0) && self.nth_is_punct(1, "=>") {
            return true;
        }
        if !self.at_punct("(") {
            return false;
        }
        let mut n = 1;
        loop {
            if self.nth_is_punct(n, ")") {
                return self.nth_is_punct(n + 1, "=>");
            }
            if !(self.nth_is_name(n) || self.nth_is_punct(n, ",")) {
                return false;
            }
            n += 1;
        }
    }

    fn lambda(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        let mut children: Vec<SyntaxElement> = Vec::new();
        if self.eat_punct("(") {
            while !self.at_punct(")") {
                let parameter_start = self.start();
                let name = self.identifier()?;
                children.push(
                    self.finish(SyntaxKind::Parameter, parameter_start, vec![name.into()])
                        .into(),
                );
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct(")")?;
        } else {
            let name = self.identifier()?;
            children.push(
                self.finish(SyntaxKind::Parameter, start, vec![name.into()])
                    .into(),
            );
        }
        self.expect_punct("=>")?;
        let body = if self.at_punct("{") {
            self.block()?
        } else {
            self.expression()?
        };
        children.push(body.into());
        Ok(self.finish(SyntaxKind::LambdaExpression, start, children))
    }

    fn query(&mut self) -> PResult<SyntaxNode> {
        let start = self.start();
        self.expect_keyword("from")?;
        let mut children: Vec<SyntaxElement> = vec![self.identifier()?.into()];
        self.expect_keyword("in")?;
        children.push(self.expression()?.into());
        if self.at_keyword("where") {
            let clause_start = self.start();
            self.bump();
            let condition = self.expression()?;
            children.push(
                self.finish(SyntaxKind::WhereClause, clause_start, vec![condition.into()])
                    .into(),
            );
        }
        let clause_start = self.start();
        self.expect_keyword("select")?;
        let selection = self.expression()?;
        children.push(
            self.finish(SyntaxKind::SelectClause, clause_start, vec![selection.into()])
                .into(),
        );
        Ok(self.finish(SyntaxKind::QueryExpression, start, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + b * c == d").unwrap();
        assert_eq!(expr.kind(), SyntaxKind::BinaryExpression);
        let lhs = expr.child_node(0).unwrap();
        assert_eq!(lhs.kind(), SyntaxKind::BinaryExpression);
        assert_eq!(lhs.token().unwrap().kind(), TokenKind::Plus);
        let product = lhs.child_node(1).unwrap();
        assert_eq!(product.token().unwrap().kind(), TokenKind::Star);
    }

    #[test]
    fn test_member_call_chain() {
        let expr = parse_expression("meta.Target.Method.Name.ToUpper()").unwrap();
        assert_eq!(expr.kind(), SyntaxKind::InvocationExpression);
        let callee = expr.child_node(0).unwrap();
        assert_eq!(callee.kind(), SyntaxKind::MemberAccessExpression);
        assert_eq!(callee.name(), Some("ToUpper"));
        assert_eq!(expr.span(), Span::new(0, 33));
    }

    #[test]
    fn test_cast_versus_parenthesized() {
        let cast = parse_expression("(int)x").unwrap();
        assert_eq!(cast.kind(), SyntaxKind::CastExpression);
        let parens = parse_expression("(x)").unwrap();
        assert_eq!(parens.kind(), SyntaxKind::ParenthesizedExpression);
    }

    #[test]
    fn test_lambda_forms() {
        let single = parse_expression("x => x + 1").unwrap();
        assert_eq!(single.kind(), SyntaxKind::LambdaExpression);
        let empty = parse_expression("() => { return 1; }").unwrap();
        assert_eq!(empty.kind(), SyntaxKind::LambdaExpression);
        assert_eq!(empty.child_node(0).unwrap().kind(), SyntaxKind::Block);
    }

    #[test]
    fn test_if_else_and_foreach() {
        let stmt = parse_statement("if (n > 0) return \"a\"; else return \"b\";").unwrap();
        assert_eq!(stmt.kind(), SyntaxKind::IfStatement);
        let else_clause = stmt.child_node_of_kind(SyntaxKind::ElseClause).unwrap();
        assert_eq!(
            else_clause.child_node(0).unwrap().kind(),
            SyntaxKind::ReturnStatement
        );

        let stmt = parse_statement("await foreach (var p in ps) { }").unwrap();
        assert_eq!(stmt.kind(), SyntaxKind::ForEachStatement);
        assert!(stmt.token_of_kind(TokenKind::AwaitKeyword).is_some());
        assert_eq!(stmt.name(), Some("p"));
    }

    #[test]
    fn test_unsupported_statements_still_parse() {
        for source in [
            "while (x) { }",
            "do { } while (x);",
            "for (var i = 0; i < 3; i++) { }",
            "goto done;",
            "switch (x) { case 1: break; default: break; }",
            "lock (x) { }",
            "function f(a) { return a; }",
        ] {
            parse_statement(source).unwrap();
        }
    }

    #[test]
    fn test_query_expression() {
        let expr = parse_expression("from p in ps where p.Index > 0 select p.Name").unwrap();
        assert_eq!(expr.kind(), SyntaxKind::QueryExpression);
        assert!(expr.child_node_of_kind(SyntaxKind::WhereClause).is_some());
    }

    #[test]
    fn test_template_with_typed_parameters() {
        let unit =
            parse_compilation_unit("template T(int count, List<string> names, x) { }").unwrap();
        let template = unit.child_node(0).unwrap();
        assert_eq!(template.name(), Some("T"));
        let parameters: Vec<_> = template
            .child_nodes()
            .filter(|n| n.kind() == SyntaxKind::Parameter)
            .collect();
        assert_eq!(parameters.len(), 3);
        let ty = parameters[1]
            .child_node_of_kind(SyntaxKind::TypeSyntax)
            .unwrap();
        assert_eq!(ty.token().unwrap().text(), "List<string>");
        assert!(parameters[2].child_node_of_kind(SyntaxKind::TypeSyntax).is_none());
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse_statement("var = 1;").unwrap_err();
        assert_eq!(err.span, Span::new(4, 5));
        assert_eq!(err.message, "expected identifier, found `=`");
    }
}
