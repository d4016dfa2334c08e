//! Operator symbol table shared by the tokenizer, the parser and the printers.
//!
//! Spellings are resolved longest-first: `<<<` before `<<` before `<`. Binding strength
//! is keyed on the first character of a spelling, which puts the shift operators on the
//! same level as the comparisons.
//!
//! | Level | Spellings                                   |
//! |-------|---------------------------------------------|
//! | 1     | `\|`                                        |
//! | 2     | `^`                                         |
//! | 3     | `&`                                         |
//! | 4     | `==` `!=` `<` `<=` `>` `>=` `<<` `>>` `<<<` `>>>` |
//! | 5     | `+` `-`                                     |
//! | 6     | `*` `/` `%`                                 |
//! | 7     | `~` (prefix)                                |

use crate::il::Opcode;

/// Longest operator spelling in the table.
pub const MAX_SYMBOL_LEN: usize = 3;

/// Every accepted spelling with its opcode, grouped by length (longest first).
pub const SYMBOLS: &[(&str, Opcode)] = &[
    ("<<<", Opcode::Lsl),
    (">>>", Opcode::Lsr),
    ("<<", Opcode::Lsl),
    (">>", Opcode::Lsr),
    ("==", Opcode::CmpE),
    ("!=", Opcode::CmpNe),
    ("<=", Opcode::CmpUle),
    (">=", Opcode::CmpUge),
    ("+", Opcode::Add),
    ("-", Opcode::Sub),
    ("*", Opcode::Mul),
    ("^", Opcode::Xor),
    ("&", Opcode::And),
    ("|", Opcode::Or),
    ("~", Opcode::Not),
    ("/", Opcode::DivU),
    ("%", Opcode::ModU),
    ("<", Opcode::CmpUlt),
    (">", Opcode::CmpUgt),
];

/// Binding strength of the prefix `~` operator.
pub const UNARY_PRECEDENCE: u8 = 7;

/// Resolves an exact operator spelling.
#[must_use]
pub fn lookup(symbol: &str) -> Option<Opcode> {
    SYMBOLS
        .iter()
        .find(|(spelling, _)| *spelling == symbol)
        .map(|(_, op)| *op)
}

/// Returns the canonical spelling of an opcode (`<<` for `Lsl`, `>>` for `Lsr`).
#[must_use]
pub fn symbol_for(opcode: Opcode) -> Option<&'static str> {
    let symbol = match opcode {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Xor => "^",
        Opcode::And => "&",
        Opcode::Or => "|",
        Opcode::Not => "~",
        Opcode::DivU => "/",
        Opcode::ModU => "%",
        Opcode::Lsl => "<<",
        Opcode::Lsr => ">>",
        Opcode::CmpE => "==",
        Opcode::CmpNe => "!=",
        Opcode::CmpUlt => "<",
        Opcode::CmpUle => "<=",
        Opcode::CmpUgt => ">",
        Opcode::CmpUge => ">=",
        _ => return None,
    };
    Some(symbol)
}

/// Binding strength of an operator spelling, `None` for anything that is not one.
#[must_use]
pub fn precedence(symbol: &str) -> Option<u8> {
    lookup(symbol)?;
    match symbol.chars().next()? {
        '|' => Some(1),
        '^' => Some(2),
        '&' => Some(3),
        '=' | '!' | '<' | '>' => Some(4),
        '+' | '-' => Some(5),
        '*' | '/' | '%' => Some(6),
        '~' => Some(UNARY_PRECEDENCE),
        _ => None,
    }
}

/// Binding strength of an opcode, using its canonical spelling.
#[must_use]
pub fn opcode_precedence(opcode: Opcode) -> Option<u8> {
    precedence(symbol_for(opcode)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_longest_first() {
        let lengths: Vec<usize> = SYMBOLS.iter().map(|(s, _)| s.len()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
        assert!(lengths.iter().all(|&l| l <= MAX_SYMBOL_LEN));
    }

    #[test]
    fn test_lookup_both_directions() {
        for (spelling, opcode) in SYMBOLS {
            assert_eq!(lookup(spelling), Some(*opcode));
            let canonical = symbol_for(*opcode).unwrap();
            assert_eq!(lookup(canonical), Some(*opcode));
        }
        assert_eq!(lookup("<<<"), Some(Opcode::Lsl));
        assert_eq!(lookup("=>"), None);
        assert_eq!(symbol_for(Opcode::Var), None);
    }

    #[test]
    fn test_precedence_levels() {
        assert!(precedence("|") < precedence("^"));
        assert!(precedence("^") < precedence("&"));
        assert!(precedence("&") < precedence("=="));
        assert!(precedence("<=") < precedence("+"));
        assert!(precedence("-") < precedence("%"));
        assert!(precedence("*") < precedence("~"));
        assert_eq!(precedence("<<"), precedence("<"));
        assert_eq!(precedence("a"), None);
        assert_eq!(opcode_precedence(Opcode::Lsr), Some(4));
    }
}
