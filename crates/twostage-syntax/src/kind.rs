//! Node and token kinds of the template language.
//!
//! Both enums are closed: every pass that dispatches on a kind matches
//! exhaustively, so adding a kind is a compile-time obligation everywhere.
//! Each kind has a stable name, used by generator programs to construct
//! nodes at generation time (`Syntax.IfStatement(...)`, `TokenKind.Plus`).

macro_rules! named_kinds {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        pub enum $name { $($(#[$vmeta])* $variant),* }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_kinds! {
    /// Composite node kinds. The comment on each variant gives its child layout.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum SyntaxKind {
        /// `Template*`
        CompilationUnit,
        /// `Identifier-token Parameter* Block`
        Template,
        /// `TypeSyntax? Identifier-token`
        Parameter,
        /// `TypeName-token`
        TypeSyntax,

        /// `statement*`
        Block,
        /// `VariableDeclarator+`
        LocalDeclaration,
        /// `Identifier-token expr?`
        VariableDeclarator,
        /// `expr`
        ExpressionStatement,
        /// (empty)
        EmptyStatement,
        /// `condition statement ElseClause?`
        IfStatement,
        /// `statement`
        ElseClause,
        /// `AwaitKeyword-token? Identifier-token source statement`
        ForEachStatement,
        /// `condition statement`
        WhileStatement,
        /// `statement condition`
        DoStatement,
        /// `initializer condition increment statement`, empty parts are `EmptyStatement`
        ForStatement,
        /// `expr?`
        ReturnStatement,
        /// (empty)
        BreakStatement,
        /// (empty)
        ContinueStatement,
        /// `Identifier-token`
        GotoStatement,
        /// `expr SwitchSection*`
        SwitchStatement,
        /// `(expr | DefaultKeyword-token) statement*`
        SwitchSection,
        /// `expr statement`
        LockStatement,
        /// `Identifier-token Parameter* Block`
        LocalFunction,
        /// `expr`
        YieldReturnStatement,
        /// (empty)
        YieldBreakStatement,
        /// `AwaitKeyword-token? LocalDeclaration statement`
        UsingStatement,

        /// `literal-token`
        LiteralExpression,
        /// `Identifier-token`
        IdentifierName,
        /// (empty)
        ThisExpression,
        /// `expr`
        ParenthesizedExpression,
        /// `expr operator-token expr`
        BinaryExpression,
        /// `operator-token expr`
        PrefixUnaryExpression,
        /// `expr operator-token`
        PostfixUnaryExpression,
        /// `target operator-token value`
        AssignmentExpression,
        /// `condition expr expr`
        ConditionalExpression,
        /// `callee argument*`
        InvocationExpression,
        /// `receiver Identifier-token`
        MemberAccessExpression,
        /// `receiver index`
        ElementAccessExpression,
        /// `TypeSyntax expr`
        CastExpression,
        /// `expr*`
        ListExpression,
        /// `Parameter* (Block | expr)`
        LambdaExpression,
        /// `expr`
        AwaitExpression,
        /// `Identifier-token source WhereClause? SelectClause`
        QueryExpression,
        /// `expr`
        WhereClause,
        /// `expr`
        SelectClause,
    }
}

impl SyntaxKind {
    pub fn is_statement(self) -> bool {
        use SyntaxKind::*;
        matches!(
            self,
            Block
                | LocalDeclaration
                | ExpressionStatement
                | EmptyStatement
                | IfStatement
                | ForEachStatement
                | WhileStatement
                | DoStatement
                | ForStatement
                | ReturnStatement
                | BreakStatement
                | ContinueStatement
                | GotoStatement
                | SwitchStatement
                | LockStatement
                | LocalFunction
                | YieldReturnStatement
                | YieldBreakStatement
                | UsingStatement
        )
    }

    pub fn is_expression(self) -> bool {
        use SyntaxKind::*;
        matches!(
            self,
            LiteralExpression
                | IdentifierName
                | ThisExpression
                | ParenthesizedExpression
                | BinaryExpression
                | PrefixUnaryExpression
                | PostfixUnaryExpression
                | AssignmentExpression
                | ConditionalExpression
                | InvocationExpression
                | MemberAccessExpression
                | ElementAccessExpression
                | CastExpression
                | ListExpression
                | LambdaExpression
                | AwaitExpression
                | QueryExpression
        )
    }
}

named_kinds! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum TokenKind {
        Identifier,
        TypeName,
        IntLiteral,
        FloatLiteral,
        StringLiteral,
        CharLiteral,
        TrueKeyword,
        FalseKeyword,
        NullKeyword,
        DefaultKeyword,
        AwaitKeyword,
        Plus,
        Minus,
        Star,
        Slash,
        Percent,
        EqualsEquals,
        BangEquals,
        Less,
        Greater,
        LessEquals,
        GreaterEquals,
        AmpersandAmpersand,
        BarBar,
        Bang,
        Equals,
        PlusEquals,
        MinusEquals,
        PlusPlus,
        MinusMinus,
    }
}

impl TokenKind {
    /// The fixed spelling of keyword and operator tokens.
    ///
    /// Returns `None` for kinds whose text varies (identifiers, literals,
    /// type names). Token-construction calls omit the text argument when
    /// the token's text equals this spelling.
    pub fn canonical_text(self) -> Option<&'static str> {
        use TokenKind::*;
        Some(match self {
            Identifier | TypeName | IntLiteral | FloatLiteral | StringLiteral | CharLiteral => {
                return None;
            }
            TrueKeyword => "true",
            FalseKeyword => "false",
            NullKeyword => "null",
            DefaultKeyword => "default",
            AwaitKeyword => "await",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            EqualsEquals => "==",
            BangEquals => "!=",
            Less => "<",
            Greater => ">",
            LessEquals => "<=",
            GreaterEquals => ">=",
            AmpersandAmpersand => "&&",
            BarBar => "||",
            Bang => "!",
            Equals => "=",
            PlusEquals => "+=",
            MinusEquals => "-=",
            PlusPlus => "++",
            MinusMinus => "--",
        })
    }

    /// Looks up an operator token by its spelling.
    pub fn from_operator(text: &str) -> Option<Self> {
        use TokenKind::*;
        [
            Plus,
            Minus,
            Star,
            Slash,
            Percent,
            EqualsEquals,
            BangEquals,
            Less,
            Greater,
            LessEquals,
            GreaterEquals,
            AmpersandAmpersand,
            BarBar,
            Bang,
            Equals,
            PlusEquals,
            MinusEquals,
            PlusPlus,
            MinusMinus,
        ]
        .into_iter()
        .find(|kind| kind.canonical_text() == Some(text))
    }

    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            IntLiteral
                | FloatLiteral
                | StringLiteral
                | CharLiteral
                | TrueKeyword
                | FalseKeyword
                | NullKeyword
                | DefaultKeyword
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in SyntaxKind::ALL {
            assert_eq!(SyntaxKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(SyntaxKind::from_name("Nope"), None);
    }

    #[test]
    fn test_statement_and_expression_are_disjoint() {
        for kind in SyntaxKind::ALL {
            assert!(!(kind.is_statement() && kind.is_expression()), "{kind}");
        }
    }

    #[test]
    fn test_canonical_text() {
        assert_eq!(TokenKind::Plus.canonical_text(), Some("+"));
        assert_eq!(TokenKind::Identifier.canonical_text(), None);
        assert_eq!(TokenKind::from_operator("<="), Some(TokenKind::LessEquals));
        assert_eq!(TokenKind::from_operator("=>"), None);
    }
}
