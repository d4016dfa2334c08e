//! Precedence-climbing parser for pattern expressions.
//!
//! Binary operators bind by the levels documented in [`symbols`](super::symbols); equal
//! levels associate to the left. Prefix `~` binds tighter than any binary operator and
//! applies to a single primary (an operand, a parenthesised group or another `~`).
//! There is no prefix minus: `-a` does not parse. Trees are at most 256 levels high and
//! parentheses nest at most 256 deep; deeper input is a parse failure.
//!
//! [`parse`] follows the lenient contract used for corpus patterns: failures are logged
//! and yield `None`, and tokens left over after a complete expression are reported but
//! do not discard the tree. [`ExprNode::from_str`](std::str::FromStr) is the strict
//! variant and turns both situations into [`Error::Parse`](crate::Error::Parse).

use std::{fmt, str::FromStr};

use crate::{
    il::Opcode,
    pattern::{
        symbols,
        token::{tokenize, Token, TokenKind},
    },
    Error,
};

const MAX_DEPTH: usize = 256;

/// A node of a parsed pattern tree.
///
/// Leaves are operands (no children), `~` nodes have one child and binary operators
/// two. Every node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprNode {
    token: Token,
    children: Vec<ExprNode>,
}

impl ExprNode {
    /// Creates an operand leaf.
    #[must_use]
    pub fn leaf(token: Token) -> Self {
        Self {
            token,
            children: Vec::new(),
        }
    }

    /// Creates a prefix operator node.
    #[must_use]
    pub fn unary(token: Token, operand: ExprNode) -> Self {
        Self {
            token,
            children: vec![operand],
        }
    }

    /// Creates a binary operator node.
    #[must_use]
    pub fn binary(token: Token, lhs: ExprNode, rhs: ExprNode) -> Self {
        Self {
            token,
            children: vec![lhs, rhs],
        }
    }

    /// Token this node was built from.
    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Child nodes, left to right.
    #[must_use]
    pub fn children(&self) -> &[ExprNode] {
        &self.children
    }

    /// Opcode of an operator node.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.token.opcode()
    }

    /// Returns true for operand leaves.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true for operator nodes.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.token.is_operator()
    }

    /// Returns true for variable (wildcard) leaves.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.token.is_variable()
    }

    /// Returns true for constant leaves.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.token.is_constant()
    }

    /// Distinct variable names in first-occurrence order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        if self.is_variable() && !names.contains(&self.token.text()) {
            names.push(self.token.text());
        }
        for child in &self.children {
            child.collect_variables(names);
        }
    }

    /// Height of the tree; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ExprNode::depth).max().unwrap_or(0)
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ExprNode::node_count).sum::<usize>()
    }

    /// Renders the tree one node per line, indented by depth.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(0, &mut out);
        out
    }

    fn dump_into(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(self.token.text());
        match self.opcode() {
            Some(op) => {
                out.push_str(" (");
                out.push_str(op.into());
                out.push(')');
            }
            None if self.is_constant() => out.push_str(" (const)"),
            None => out.push_str(" (var)"),
        }
        out.push('\n');
        for child in &self.children {
            child.dump_into(depth + 1, out);
        }
    }

    fn precedence(&self) -> u8 {
        if self.children.len() == 1 {
            symbols::UNARY_PRECEDENCE
        } else if self.is_operator() {
            symbols::precedence(self.token.text()).unwrap_or(0)
        } else {
            u8::MAX
        }
    }

    fn write_child(&self, f: &mut fmt::Formatter<'_>, child: &ExprNode, wrap: bool) -> fmt::Result {
        if wrap {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

/// Infix rendering with the minimum parentheses needed to parse back to the same tree.
impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.children.as_slice() {
            [] => f.write_str(self.token.text()),
            [operand] => {
                f.write_str(self.token.text())?;
                self.write_child(f, operand, operand.children.len() == 2)
            }
            [lhs, rhs] => {
                let level = self.precedence();
                self.write_child(f, lhs, lhs.precedence() < level)?;
                write!(f, " {} ", self.token.text())?;
                self.write_child(f, rhs, rhs.precedence() <= level)
            }
            _ => Err(fmt::Error),
        }
    }
}

impl FromStr for ExprNode {
    type Err = Error;

    /// Parses an expression, rejecting anything [`parse`] would only warn about.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s);
        if tokens.is_empty() {
            return Err(Error::Parse {
                expression: s.to_string(),
                message: "empty expression".to_string(),
            });
        }
        let mut parser = Parser::new(&tokens);
        let (tree, _) = parser.expression(0).map_err(|message| Error::Parse {
            expression: s.to_string(),
            message,
        })?;
        if let Some(extra) = parser.peek() {
            return Err(Error::Parse {
                expression: s.to_string(),
                message: format!("unexpected '{}' at offset {}", extra.text(), extra.offset()),
            });
        }
        Ok(tree)
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Parses operators binding at least as tightly as `min_precedence`.
    ///
    /// Returns the tree with its height.
    fn expression(&mut self, min_precedence: u8) -> Result<(ExprNode, usize), String> {
        let (mut lhs, mut height) = self.primary()?;

        while let Some(token) = self.peek() {
            if token.kind() != TokenKind::Operator || token.opcode() == Some(Opcode::Not) {
                break;
            }
            let Some(level) = symbols::precedence(token.text()) else {
                break;
            };
            if level < min_precedence {
                break;
            }
            self.pos += 1;
            let (rhs, rhs_height) = self.expression(level + 1)?;
            height = grow(height.max(rhs_height), token)?;
            lhs = ExprNode::binary(token.clone(), lhs, rhs);
        }

        Ok((lhs, height))
    }

    fn primary(&mut self) -> Result<(ExprNode, usize), String> {
        let Some(token) = self.advance() else {
            return Err("unexpected end of expression".to_string());
        };

        match token.kind() {
            TokenKind::Operand => Ok((ExprNode::leaf(token.clone()), 1)),
            TokenKind::LParen => {
                let inner = self.nested(token, |parser| parser.expression(0))?;
                match self.advance() {
                    Some(close) if close.kind() == TokenKind::RParen => Ok(inner),
                    _ => Err(format!("unmatched '(' at offset {}", token.offset())),
                }
            }
            TokenKind::Operator if token.opcode() == Some(Opcode::Not) => {
                let (operand, height) = self.nested(token, Self::primary)?;
                Ok((ExprNode::unary(token.clone(), operand), grow(height, token)?))
            }
            _ => Err(format!(
                "unexpected '{}' at offset {}",
                token.text(),
                token.offset()
            )),
        }
    }

    /// Runs `inner` one recursion level below `opener`.
    fn nested(
        &mut self,
        opener: &Token,
        inner: impl FnOnce(&mut Self) -> Result<(ExprNode, usize), String>,
    ) -> Result<(ExprNode, usize), String> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep(opener));
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }
}

/// Height of a node placed above a subtree of `height`.
fn grow(height: usize, operator: &Token) -> Result<usize, String> {
    if height >= MAX_DEPTH {
        Err(too_deep(operator))
    } else {
        Ok(height + 1)
    }
}

fn too_deep(token: &Token) -> String {
    format!("expression nested too deeply at offset {}", token.offset())
}

/// Parses a token sequence into a tree.
///
/// Returns `None` for an empty sequence or a malformed expression (missing operand,
/// unmatched parenthesis, operator in operand position). Tokens left over after a
/// complete expression are logged and ignored.
///
/// # Examples
///
/// ```rust
/// use deobscope::{il::Opcode, pattern::{parse, tokenize}};
///
/// let tree = parse(&tokenize("a+b*c")).unwrap();
/// assert_eq!(tree.opcode(), Some(Opcode::Add));
/// assert_eq!(tree.children()[1].opcode(), Some(Opcode::Mul));
/// assert!(parse(&tokenize("")).is_none());
/// ```
#[must_use]
pub fn parse(tokens: &[Token]) -> Option<ExprNode> {
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser::new(tokens);
    match parser.expression(0) {
        Ok((tree, _)) => {
            if let Some(extra) = parser.peek() {
                log::warn!(
                    "Ignoring {} trailing token(s) starting with '{}' at offset {}",
                    tokens.len() - parser.pos,
                    extra.text(),
                    extra.offset()
                );
            }
            Some(tree)
        }
        Err(message) => {
            log::warn!("Failed to parse expression: {message}");
            None
        }
    }
}

/// Tokenizes and parses an expression in one step.
#[must_use]
pub fn parse_expression(expression: &str) -> Option<ExprNode> {
    parse(&tokenize(expression))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> ExprNode {
        parse_expression(text).unwrap()
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let root = tree("a+b*c");
        assert_eq!(root.opcode(), Some(Opcode::Add));
        assert_eq!(root.children()[0].token().text(), "a");
        assert!(root.children()[0].is_leaf());
        let rhs = &root.children()[1];
        assert_eq!(rhs.opcode(), Some(Opcode::Mul));
        assert_eq!(rhs.children()[0].token().text(), "b");
        assert_eq!(rhs.children()[1].token().text(), "c");
    }

    #[test]
    fn test_parentheses_override() {
        let root = tree("(a+b)*c");
        assert_eq!(root.opcode(), Some(Opcode::Mul));
        assert_eq!(root.children()[0].opcode(), Some(Opcode::Add));
        assert_eq!(root.children()[1].token().text(), "c");
    }

    #[test]
    fn test_unary_not() {
        let root = tree("~a");
        assert_eq!(root.opcode(), Some(Opcode::Not));
        assert_eq!(root.children().len(), 1);
        assert!(root.children()[0].is_leaf());

        let root = tree("~a+b");
        assert_eq!(root.opcode(), Some(Opcode::Add));
        assert_eq!(root.children()[0].opcode(), Some(Opcode::Not));

        let root = tree("~~(a&b)");
        assert_eq!(root.depth(), 4);
    }

    #[test]
    fn test_left_associativity() {
        let root = tree("a-b-c");
        assert_eq!(root.children()[0].opcode(), Some(Opcode::Sub));
        assert_eq!(root.children()[1].token().text(), "c");
    }

    #[test]
    fn test_full_precedence_ladder() {
        let root = tree("a|b^c&d==e+f*~g");
        let mut node = &root;
        for expected in [
            Opcode::Or,
            Opcode::Xor,
            Opcode::And,
            Opcode::CmpE,
            Opcode::Add,
            Opcode::Mul,
            Opcode::Not,
        ] {
            assert_eq!(node.opcode(), Some(expected));
            node = node.children().last().unwrap();
        }
        assert_eq!(node.token().text(), "g");
    }

    #[test]
    fn test_shifts_share_comparison_level() {
        let root = tree("a<<b<c");
        assert_eq!(root.opcode(), Some(Opcode::CmpUlt));
        assert_eq!(root.children()[0].opcode(), Some(Opcode::Lsl));
    }

    #[test]
    fn test_failures_return_none() {
        assert!(parse(&[]).is_none());
        assert!(parse_expression("").is_none());
        assert!(parse_expression("(a+b").is_none());
        assert!(parse_expression("a+").is_none());
        assert!(parse_expression("*a").is_none());
        assert!(parse_expression("-a").is_none());
        assert!(parse_expression(")").is_none());
    }

    #[test]
    fn test_trailing_tokens_keep_partial_tree() {
        let root = tree("a+b)c");
        assert_eq!(root.opcode(), Some(Opcode::Add));
        let root = tree("a~b");
        assert!(root.is_leaf());
        assert_eq!(root.token().text(), "a");
    }

    #[test]
    fn test_display_round_trips() {
        for text in [
            "a + b * c",
            "(a + b) * c",
            "a - (b - c)",
            "a - b - c",
            "~(a & b) | 3",
            "~~a",
            "(a ^ b) + 2 * (a & b)",
            "a << 1 <= b",
        ] {
            let parsed = tree(text);
            assert_eq!(parsed.to_string(), text);
            assert_eq!(tree(&parsed.to_string()), parsed);
        }
        assert_eq!(tree("((a))+(b*c)").to_string(), "a + b * c");
    }

    #[test]
    fn test_from_str_is_strict() {
        assert!("a+b".parse::<ExprNode>().is_ok());
        assert!(matches!(
            "a+b)".parse::<ExprNode>(),
            Err(Error::Parse { .. })
        ));
        assert!(matches!("".parse::<ExprNode>(), Err(Error::Parse { .. })));
        assert!(matches!("(a".parse::<ExprNode>(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let groups = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(parse_expression(&groups).is_none());
        assert!(matches!(
            groups.parse::<ExprNode>(),
            Err(Error::Parse { message, .. }) if message.contains("nested too deeply")
        ));

        let nots = format!("{}a", "~".repeat(10_000));
        assert!(parse_expression(&nots).is_none());
        assert!(nots.parse::<ExprNode>().is_err());

        let chain = format!("a{}", "+a".repeat(10_000));
        assert!(parse_expression(&chain).is_none());

        let limit = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(tree(&limit).is_leaf());
        let limit = format!("{}a", "~".repeat(MAX_DEPTH - 1));
        assert_eq!(tree(&limit).depth(), MAX_DEPTH);
        let limit = format!("a{}", "+a".repeat(MAX_DEPTH - 1));
        assert_eq!(tree(&limit).depth(), MAX_DEPTH);
    }

    #[test]
    fn test_variables_and_metrics() {
        let root = tree("(a ^ b) + 2 * (a & c)");
        assert_eq!(root.variables(), ["a", "b", "c"]);
        assert_eq!(root.node_count(), 9);
        assert_eq!(root.depth(), 4);
        assert!(root.children()[1].children()[0].is_constant());
    }

    #[test]
    fn test_dump() {
        let root = tree("~a + 1");
        assert_eq!(root.dump(), "+ (ADD)\n  ~ (NOT)\n    a (var)\n  1 (const)\n");
    }
}
