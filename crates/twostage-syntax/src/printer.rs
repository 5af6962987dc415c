//! Source rendering of syntax trees.
//!
//! [`pretty`] indents one statement per line; [`compact`] renders the same
//! text on a single line (`{ SomeCall(); return; }`).

use crate::kind::{SyntaxKind, TokenKind};
use crate::node::{SyntaxNode, SyntaxToken};

pub fn pretty(node: &SyntaxNode) -> String {
    Printer::new(false).print(node)
}

pub fn compact(node: &SyntaxNode) -> String {
    Printer::new(true).print(node)
}

struct Printer {
    out: String,
    indent: usize,
    compact: bool,
}

impl Printer {
    fn new(compact: bool) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            compact,
        }
    }

    fn print(mut self, node: &SyntaxNode) -> String {
        if node.kind().is_expression() {
            self.expr(node);
        } else {
            self.stmt(node);
        }
        self.out
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        if self.compact {
            self.out.push(' ');
        } else {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
        }
    }

    fn child(node: &SyntaxNode, index: usize) -> &SyntaxNode {
        node.child_node(index)
            .unwrap_or_else(|| panic!("{} is missing child {index}", node.kind()))
    }

    fn separated<'a>(&mut self, nodes: impl IntoIterator<Item = &'a SyntaxNode>) {
        for (i, node) in nodes.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(node);
        }
    }

    // Statements

    fn stmt(&mut self, node: &SyntaxNode) {
        use SyntaxKind::*;
        match node.kind() {
            CompilationUnit => {
                for (i, template) in node.child_nodes().enumerate() {
                    if i > 0 {
                        self.push(if self.compact { " " } else { "\n\n" });
                    }
                    self.stmt(template);
                }
            }
            Template | LocalFunction => {
                self.push(if node.kind() == Template {
                    "template "
                } else {
                    "function "
                });
                self.push(node.name().unwrap_or_default());
                self.parameters(node);
                self.push(" ");
                if let Some(body) = node.child_node_of_kind(Block) {
                    self.block(body);
                }
            }
            Block => self.block(node),
            LocalDeclaration => {
                self.declaration(node);
                self.push(";");
            }
            ExpressionStatement => {
                self.expr(Self::child(node, 0));
                self.push(";");
            }
            EmptyStatement => self.push(";"),
            IfStatement => self.if_statement(node),
            ForEachStatement => {
                if node.token_of_kind(TokenKind::AwaitKeyword).is_some() {
                    self.push("await ");
                }
                self.push("foreach (var ");
                self.push(node.name().unwrap_or_default());
                self.push(" in ");
                self.expr(Self::child(node, 0));
                self.push(")");
                self.embedded(Self::child(node, 1));
            }
            WhileStatement => {
                self.push("while (");
                self.expr(Self::child(node, 0));
                self.push(")");
                self.embedded(Self::child(node, 1));
            }
            DoStatement => {
                self.push("do");
                let body = Self::child(node, 0);
                self.embedded(body);
                if body.kind() == Block {
                    self.push(" ");
                } else {
                    self.newline();
                }
                self.push("while (");
                self.expr(Self::child(node, 1));
                self.push(");");
            }
            ForStatement => {
                self.push("for (");
                self.for_part(Self::child(node, 0));
                self.push("; ");
                self.for_part(Self::child(node, 1));
                self.push("; ");
                self.for_part(Self::child(node, 2));
                self.push(")");
                self.embedded(Self::child(node, 3));
            }
            ReturnStatement => {
                self.push("return");
                if let Some(value) = node.child_node(0) {
                    self.push(" ");
                    self.expr(value);
                }
                self.push(";");
            }
            BreakStatement => self.push("break;"),
            ContinueStatement => self.push("continue;"),
            GotoStatement => {
                self.push("goto ");
                self.push(node.name().unwrap_or_default());
                self.push(";");
            }
            SwitchStatement => {
                self.push("switch (");
                self.expr(Self::child(node, 0));
                self.push(") {");
                self.indent += 1;
                for section in node.child_nodes().skip(1) {
                    self.newline();
                    self.switch_section(section);
                }
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
            LockStatement => {
                self.push("lock (");
                self.expr(Self::child(node, 0));
                self.push(")");
                self.embedded(Self::child(node, 1));
            }
            YieldReturnStatement => {
                self.push("yield return ");
                self.expr(Self::child(node, 0));
                self.push(";");
            }
            YieldBreakStatement => self.push("yield break;"),
            UsingStatement => {
                if node.token_of_kind(TokenKind::AwaitKeyword).is_some() {
                    self.push("await ");
                }
                self.push("using (");
                self.declaration(Self::child(node, 0));
                self.push(")");
                self.embedded(Self::child(node, 1));
            }
            ElseClause => {
                self.push("else");
                self.embedded(Self::child(node, 0));
            }
            SwitchSection => self.switch_section(node),
            Parameter => self.parameter(node),
            TypeSyntax => self.push(node.token().map(SyntaxToken::text).unwrap_or_default()),
            VariableDeclarator => self.declarator(node),
            WhereClause | SelectClause => self.expr(Self::child(node, 0)),
            _ => self.expr(node),
        }
    }

    fn block(&mut self, node: &SyntaxNode) {
        if node.children().is_empty() {
            self.push("{ }");
            return;
        }
        self.push("{");
        self.indent += 1;
        for statement in node.child_nodes() {
            self.newline();
            self.stmt(statement);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    /// Body of a control statement: blocks stay on the same line.
    fn embedded(&mut self, node: &SyntaxNode) {
        if node.kind() == SyntaxKind::Block || self.compact {
            self.push(" ");
            self.stmt(node);
        } else {
            self.indent += 1;
            self.newline();
            self.stmt(node);
            self.indent -= 1;
        }
    }

    fn if_statement(&mut self, node: &SyntaxNode) {
        self.push("if (");
        self.expr(Self::child(node, 0));
        self.push(")");
        let then_branch = Self::child(node, 1);
        self.embedded(then_branch);
        let Some(else_clause) = node.child_node_of_kind(SyntaxKind::ElseClause) else {
            return;
        };
        if then_branch.kind() == SyntaxKind::Block || self.compact {
            self.push(" ");
        } else {
            self.newline();
        }
        self.push("else");
        let body = Self::child(else_clause, 0);
        if body.kind() == SyntaxKind::IfStatement {
            self.push(" ");
            self.stmt(body);
        } else {
            self.embedded(body);
        }
    }

    fn switch_section(&mut self, node: &SyntaxNode) {
        let mut statements = node.child_nodes().peekable();
        if node.token_of_kind(TokenKind::DefaultKeyword).is_some() {
            self.push("default:");
        } else if let Some(label) = statements.next() {
            self.push("case ");
            self.expr(label);
            self.push(":");
        }
        self.indent += 1;
        for statement in statements {
            self.newline();
            self.stmt(statement);
        }
        self.indent -= 1;
    }

    fn declaration(&mut self, node: &SyntaxNode) {
        self.push("var ");
        for (i, declarator) in node.child_nodes().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.declarator(declarator);
        }
    }

    fn declarator(&mut self, node: &SyntaxNode) {
        self.push(node.name().unwrap_or_default());
        if let Some(value) = node.child_node(0) {
            self.push(" = ");
            self.expr(value);
        }
    }

    fn for_part(&mut self, node: &SyntaxNode) {
        match node.kind() {
            SyntaxKind::EmptyStatement => {}
            SyntaxKind::LocalDeclaration => self.declaration(node),
            SyntaxKind::ExpressionStatement => self.expr(Self::child(node, 0)),
            _ => self.expr(node),
        }
    }

    fn parameters(&mut self, node: &SyntaxNode) {
        self.push("(");
        let parameters = node
            .child_nodes()
            .filter(|child| child.kind() == SyntaxKind::Parameter);
        for (i, parameter) in parameters.enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.parameter(parameter);
        }
        self.push(")");
    }

    fn parameter(&mut self, node: &SyntaxNode) {
        if let Some(ty) = node.child_node_of_kind(SyntaxKind::TypeSyntax) {
            self.push(ty.token().map(SyntaxToken::text).unwrap_or_default());
            self.push(" ");
        }
        self.push(node.name().unwrap_or_default());
    }

    // Expressions

    fn expr(&mut self, node: &SyntaxNode) {
        use SyntaxKind::*;
        match node.kind() {
            LiteralExpression => {
                if let Some(token) = node.token() {
                    self.literal(token);
                }
            }
            IdentifierName => self.push(node.name().unwrap_or_default()),
            ThisExpression => self.push("this"),
            ParenthesizedExpression => {
                self.push("(");
                self.expr(Self::child(node, 0));
                self.push(")");
            }
            BinaryExpression => {
                self.binary_operand(Self::child(node, 0));
                self.push(" ");
                self.push(node.token().map(SyntaxToken::text).unwrap_or_default());
                self.push(" ");
                self.binary_operand(Self::child(node, 1));
            }
            AssignmentExpression => {
                self.expr(Self::child(node, 0));
                self.push(" ");
                self.push(node.token().map(SyntaxToken::text).unwrap_or_default());
                self.push(" ");
                self.expr(Self::child(node, 1));
            }
            PrefixUnaryExpression => {
                self.push(node.token().map(SyntaxToken::text).unwrap_or_default());
                self.operand(Self::child(node, 0));
            }
            PostfixUnaryExpression => {
                self.operand(Self::child(node, 0));
                self.push(node.token().map(SyntaxToken::text).unwrap_or_default());
            }
            ConditionalExpression => {
                self.binary_operand(Self::child(node, 0));
                self.push(" ? ");
                self.expr(Self::child(node, 1));
                self.push(" : ");
                self.expr(Self::child(node, 2));
            }
            InvocationExpression => {
                self.operand(Self::child(node, 0));
                self.push("(");
                self.separated(node.child_nodes().skip(1));
                self.push(")");
            }
            MemberAccessExpression => {
                self.operand(Self::child(node, 0));
                self.push(".");
                self.push(node.name().unwrap_or_default());
            }
            ElementAccessExpression => {
                self.operand(Self::child(node, 0));
                self.push("[");
                self.expr(Self::child(node, 1));
                self.push("]");
            }
            CastExpression => {
                self.push("(");
                self.stmt(Self::child(node, 0));
                self.push(")");
                self.operand(Self::child(node, 1));
            }
            ListExpression => {
                self.push("[");
                self.separated(node.child_nodes());
                self.push("]");
            }
            LambdaExpression => {
                self.push("(");
                let parameters: Vec<_> = node
                    .child_nodes()
                    .filter(|child| child.kind() == Parameter)
                    .collect();
                for (i, parameter) in parameters.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.parameter(parameter);
                }
                self.push(") => ");
                if let Some(body) = node.child_nodes().last() {
                    if body.kind() == Block {
                        self.block(body);
                    } else if body.kind() != Parameter {
                        self.expr(body);
                    }
                }
            }
            AwaitExpression => {
                self.push("await ");
                self.operand(Self::child(node, 0));
            }
            QueryExpression => {
                self.push("from ");
                self.push(node.name().unwrap_or_default());
                self.push(" in ");
                self.expr(Self::child(node, 0));
                if let Some(clause) = node.child_node_of_kind(WhereClause) {
                    self.push(" where ");
                    self.expr(Self::child(clause, 0));
                }
                if let Some(clause) = node.child_node_of_kind(SelectClause) {
                    self.push(" select ");
                    self.expr(Self::child(clause, 0));
                }
            }
            _ => self.stmt(node),
        }
    }

    /// Operand of a postfix, prefix or cast operator.
    fn operand(&mut self, node: &SyntaxNode) {
        use SyntaxKind::*;
        let wrap = matches!(
            node.kind(),
            BinaryExpression
                | ConditionalExpression
                | AssignmentExpression
                | LambdaExpression
                | CastExpression
                | PrefixUnaryExpression
                | AwaitExpression
                | QueryExpression
        );
        self.wrapped(node, wrap);
    }

    fn binary_operand(&mut self, node: &SyntaxNode) {
        use SyntaxKind::*;
        let wrap = matches!(
            node.kind(),
            ConditionalExpression | AssignmentExpression | LambdaExpression | QueryExpression
        );
        self.wrapped(node, wrap);
    }

    fn wrapped(&mut self, node: &SyntaxNode, wrap: bool) {
        if wrap {
            self.push("(");
        }
        self.expr(node);
        if wrap {
            self.push(")");
        }
    }

    fn literal(&mut self, token: &SyntaxToken) {
        match token.kind() {
            TokenKind::StringLiteral => {
                self.out.push('"');
                self.escaped(token.text(), '"');
                self.out.push('"');
            }
            TokenKind::CharLiteral => {
                self.out.push('\'');
                self.escaped(token.text(), '\'');
                self.out.push('\'');
            }
            _ => self.push(token.text()),
        }
    }

    fn escaped(&mut self, text: &str, quote: char) {
        for c in text.chars() {
            match c {
                '\\' => self.push("\\\\"),
                '\n' => self.push("\\n"),
                '\t' => self.push("\\t"),
                '\r' => self.push("\\r"),
                '\0' => self.push("\\0"),
                c if c == quote => {
                    self.out.push('\\');
                    self.out.push(c);
                }
                c => self.out.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_compilation_unit, parse_statement};

    #[test]
    fn test_compact_block() {
        let stmt = parse_statement("{ SomeCall(); return; }").unwrap();
        insta::assert_snapshot!(compact(&stmt), @"{ SomeCall(); return; }");
    }

    #[test]
    fn test_pretty_template() {
        let unit = parse_compilation_unit(
            "template Log(string prefix) { if (n > 0) { Console.WriteLine(prefix + \"a\\n\"); } else return -x; foreach (var p in ps) p.Value++; }",
        )
        .unwrap();
        insta::assert_snapshot!(pretty(&unit), @r#"
        template Log(string prefix) {
            if (n > 0) {
                Console.WriteLine(prefix + "a\n");
            } else
                return -x;
            foreach (var p in ps)
                p.Value++;
        }
        "#);
    }

    #[test]
    fn test_expressions_round_trip() {
        for source in [
            "var x = (int)(a + b), y;",
            "f(() => { return 1; })();",
            "var q = from p in ps where p.Index > 0 select p.Name;",
            "x = c ? [1, 2] : [];",
            "await foreach (var item in Source()) yield return item;",
        ] {
            let stmt = parse_statement(source).unwrap();
            assert_eq!(compact(&stmt), source);
        }
    }
}
