use deobscope::pattern::{TokenKind, Tokenizer};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct TokenInfo {
    offset: usize,
    kind: String,
    text: String,
    opcode: Option<String>,
}

pub fn run(expression: &str, opts: &GlobalOptions) -> anyhow::Result<()> {
    let tokens: Vec<TokenInfo> = Tokenizer::new(expression)
        .keep_unknown()
        .map(|token| TokenInfo {
            offset: token.offset(),
            kind: kind_name(token.kind()).to_string(),
            text: token.text().to_string(),
            opcode: token.opcode().map(|op| op.to_string()),
        })
        .collect();

    print_output(&tokens, opts, |tokens| {
        let mut table = TabWriter::new(&[
            ("OFFSET", Align::Right),
            ("KIND", Align::Left),
            ("TEXT", Align::Left),
            ("OPCODE", Align::Left),
        ]);
        for token in tokens {
            table.row(vec![
                token.offset.to_string(),
                token.kind.clone(),
                token.text.clone(),
                token.opcode.clone().unwrap_or_default(),
            ]);
        }
        table.print();
    })
}

fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Operator => "operator",
        TokenKind::Operand => "operand",
        TokenKind::LParen => "lparen",
        TokenKind::RParen => "rparen",
        TokenKind::Unknown => "unknown",
    }
}
