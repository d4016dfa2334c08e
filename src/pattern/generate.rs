//! Generation of linear MBA identities for the pattern corpus.
//!
//! A linear MBA identity is an integer combination of bitwise expressions that is zero
//! for every input, `c1*e1 + ... + cn*en == 0`. Such a sum vanishes on every word width
//! exactly when it vanishes on the truth tables of the `ei`, so candidates are found by
//! taking `n` basis expressions at a time and picking an integer vector from the
//! nullspace of their truth-table matrix in which no coefficient is zero.
//!
//! Each solution becomes one corpus row: it is solved for a non-constant term with a
//! unit coefficient, which turns into the simplified side, and the remaining terms form
//! the obfuscated side. Rows are checked by evaluation before they are emitted.
//!
//! # Examples
//!
//! ```rust
//! use deobscope::pattern::generate::MbaGenerator;
//!
//! let generator = MbaGenerator::new(2, 3)?;
//! let row = generator
//!     .identities()
//!     .find(|identity| identity.obfuscated() == "(x&y)+(x&~y)")
//!     .unwrap();
//!
//! assert_eq!(row.to_string(), "x,(x&y)+(x&~y)");
//! assert!(row.holds());
//! # Ok::<(), deobscope::Error>(())
//! ```

use std::{
    collections::HashSet,
    fmt, fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use num_integer::Integer;

use crate::{
    il::Opcode,
    pattern::{parse_expression, ExprNode, DATASET_EXTENSION, DATASET_MARKER},
    Error, Result,
};

/// Names of the generated variables, in order.
pub const VARIABLE_NAMES: &[&str] = &["x", "y", "z"];

/// Header written at the top of every generated file.
pub const HEADER: &str = "Simplified,Obfuscated";

/// Per-variable values every identity is evaluated on. All-zero and all-one words cover
/// the truth table; the others exercise carries.
const SAMPLES: &[u64] = &[0, u64::MAX, 1, 0xdead_beef_cafe_f00d];

const NEGATIONS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

/// One bitwise basis expression with its truth table.
#[derive(Debug, Clone)]
struct Term {
    text: String,
    truth: Vec<i64>,
    compound: bool,
    constant: bool,
}

impl Term {
    /// Text of the term as a multiplication operand.
    fn operand(&self) -> String {
        if self.compound {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// A generated `simplified,obfuscated` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    simplified: String,
    obfuscated: String,
}

impl Identity {
    /// Creates an identity from its two sides.
    #[must_use]
    pub fn new(simplified: impl Into<String>, obfuscated: impl Into<String>) -> Self {
        Self {
            simplified: simplified.into(),
            obfuscated: obfuscated.into(),
        }
    }

    /// The simplified side.
    #[must_use]
    pub fn simplified(&self) -> &str {
        &self.simplified
    }

    /// The obfuscated side.
    #[must_use]
    pub fn obfuscated(&self) -> &str {
        &self.obfuscated
    }

    /// Returns true if both sides parse and agree on every sample assignment.
    ///
    /// Arithmetic wraps at 64 bits. Operators other than `+ - * & | ^ ~` make the
    /// identity fail the check.
    #[must_use]
    pub fn holds(&self) -> bool {
        let (Some(lhs), Some(rhs)) = (
            parse_expression(&self.simplified),
            parse_expression(&self.obfuscated),
        ) else {
            return false;
        };

        let mut names = lhs.variables();
        for name in rhs.variables() {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let agree = |values: &[u64]| {
            let bound: Vec<(&str, u64)> = names
                .iter()
                .copied()
                .zip(values.iter().copied())
                .collect();
            match (evaluate(&lhs, &bound), evaluate(&rhs, &bound)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        };

        if names.is_empty() {
            return agree(&[]);
        }
        itertools::repeat_n(SAMPLES.iter().copied(), names.len())
            .multi_cartesian_product()
            .all(|values| agree(values.as_slice()))
    }
}

/// Renders the identity as a corpus line.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.simplified, self.obfuscated)
    }
}

/// Enumerates linear MBA identities over a fixed number of variables and terms.
///
/// The basis holds every bitwise function of up to two of the variables that is not
/// constantly zero, one spelling per truth table, plus the all-ones constant `-1`.
#[derive(Debug, Clone)]
pub struct MbaGenerator {
    variables: usize,
    terms: usize,
    basis: Vec<Term>,
}

impl MbaGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    ///
    /// * `variables` - Number of variables, 2 or 3
    /// * `terms` - Basis expressions combined per identity, at least 2
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generator`] if either count is out of range.
    pub fn new(variables: usize, terms: usize) -> Result<Self> {
        if !(2..=VARIABLE_NAMES.len()).contains(&variables) {
            return Err(Error::Generator(format!(
                "{variables} variables requested, supported are 2 to {}",
                VARIABLE_NAMES.len()
            )));
        }
        let basis = basis(variables);
        if !(2..=basis.len()).contains(&terms) {
            return Err(Error::Generator(format!(
                "{terms} terms requested, supported are 2 to {}",
                basis.len()
            )));
        }
        Ok(Self {
            variables,
            terms,
            basis,
        })
    }

    /// Number of variables.
    #[must_use]
    pub fn variables(&self) -> usize {
        self.variables
    }

    /// Number of terms per identity.
    #[must_use]
    pub fn terms(&self) -> usize {
        self.terms
    }

    /// Spellings of the basis expressions, in enumeration order.
    pub fn basis(&self) -> impl Iterator<Item = &str> {
        self.basis.iter().map(|term| term.text.as_str())
    }

    /// File name the loader picks up, `mba-dataset-<variables>-<terms>.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{DATASET_MARKER}-{}-{}.{DATASET_EXTENSION}",
            self.variables, self.terms
        )
    }

    /// Lazily yields every identity, in combination order.
    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        (0..self.basis.len())
            .combinations(self.terms)
            .filter_map(|indices| self.solve(&indices))
            .filter(|identity| {
                let holds = identity.holds();
                if !holds {
                    log::warn!("Dropping generated identity that does not hold: {identity}");
                }
                holds
            })
    }

    /// Writes the header and up to `limit` identities, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if writing fails.
    pub fn write_dataset<W: Write>(&self, mut out: W, limit: Option<usize>) -> Result<usize> {
        writeln!(out, "{HEADER}")?;
        let mut written = 0;
        for identity in self.identities().take(limit.unwrap_or(usize::MAX)) {
            writeln!(out, "{identity}")?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }

    /// Writes a dataset file named by [`file_name`](Self::file_name) into `dir`.
    ///
    /// The directory is created if needed and an existing file is replaced. Returns the
    /// path of the file and the number of identities written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the directory or file cannot be written.
    pub fn write_to_directory(
        &self,
        dir: impl AsRef<Path>,
        limit: Option<usize>,
    ) -> Result<(PathBuf, usize)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let written = self.write_dataset(BufWriter::new(fs::File::create(&path)?), limit)?;
        log::info!("Wrote {written} identities to {}", path.display());
        Ok((path, written))
    }

    fn solve(&self, indices: &[usize]) -> Option<Identity> {
        let columns: Vec<&[i64]> = indices
            .iter()
            .map(|&i| self.basis[i].truth.as_slice())
            .collect();
        let coefficients = combine(&nullspace(&columns))?;

        let pivot = indices
            .iter()
            .zip(&coefficients)
            .position(|(&i, &c)| c.abs() == 1 && !self.basis[i].constant)?;
        let sign = -coefficients[pivot];
        let rest: Vec<(i64, &Term)> = indices
            .iter()
            .zip(&coefficients)
            .enumerate()
            .filter(|&(k, _)| k != pivot)
            .map(|(_, (&i, &c))| (sign * c, &self.basis[i]))
            .collect();

        Some(Identity::new(
            self.basis[indices[pivot]].text.clone(),
            render_sum(&rest),
        ))
    }
}

fn basis(variables: usize) -> Vec<Term> {
    let rows = 1usize << variables;
    let literal = |var: usize, negated: bool| {
        let name = VARIABLE_NAMES[var];
        let text = if negated {
            format!("~{name}")
        } else {
            name.to_string()
        };
        let truth: Vec<i64> = (0..rows)
            .map(|row| {
                let bit = ((row >> (variables - 1 - var)) & 1) as i64;
                if negated {
                    1 - bit
                } else {
                    bit
                }
            })
            .collect();
        (text, truth)
    };
    let operators: [(&str, fn(i64, i64) -> i64); 3] = [
        ("&", |p, q| p & q),
        ("|", |p, q| p | q),
        ("^", |p, q| p ^ q),
    ];

    let mut terms = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |text: String, truth: Vec<i64>, compound: bool, constant: bool| {
        if truth.iter().any(|&bit| bit != 0) && seen.insert(truth.clone()) {
            terms.push(Term {
                text,
                truth,
                compound,
                constant,
            });
        }
    };

    for var in 0..variables {
        let (text, truth) = literal(var, false);
        push(text, truth, false, false);
    }
    push("-1".to_string(), vec![1; rows], false, true);
    for var in 0..variables {
        let (text, truth) = literal(var, true);
        push(text, truth, false, false);
    }
    for (a, b) in (0..variables).tuple_combinations() {
        for (symbol, op) in operators {
            for (negate_a, negate_b) in NEGATIONS {
                let (lhs, lhs_truth) = literal(a, negate_a);
                let (rhs, rhs_truth) = literal(b, negate_b);
                let truth = lhs_truth
                    .iter()
                    .zip(&rhs_truth)
                    .map(|(&p, &q)| op(p, q))
                    .collect();
                push(format!("{lhs}{symbol}{rhs}"), truth, true, false);
            }
        }
    }
    terms
}

/// Divides a vector by the gcd of its entries.
fn reduce(values: &mut [i64]) {
    let gcd = values.iter().fold(0i64, |g, v| g.gcd(v));
    if gcd > 1 {
        for value in values.iter_mut() {
            *value /= gcd;
        }
    }
}

/// Integer basis of the nullspace of the matrix whose columns are `columns`.
fn nullspace(columns: &[&[i64]]) -> Vec<Vec<i64>> {
    let width = columns.len();
    let height = columns.first().map_or(0, |c| c.len());
    let mut rows: Vec<Vec<i64>> = (0..height)
        .map(|r| columns.iter().map(|c| c[r]).collect())
        .collect();

    let mut pivots = Vec::new();
    for col in 0..width {
        let row = pivots.len();
        if row == height {
            break;
        }
        let Some(found) = (row..height).find(|&r| rows[r][col] != 0) else {
            continue;
        };
        rows.swap(row, found);
        let pivot_row = rows[row].clone();
        for (r, current) in rows.iter_mut().enumerate() {
            let factor = current[col];
            if r == row || factor == 0 {
                continue;
            }
            for (value, &p) in current.iter_mut().zip(&pivot_row) {
                *value = *value * pivot_row[col] - p * factor;
            }
            reduce(current);
        }
        pivots.push(col);
    }

    let scale = pivots
        .iter()
        .enumerate()
        .fold(1i64, |l, (r, &c)| l.lcm(&rows[r][c]));
    (0..width)
        .filter(|col| !pivots.contains(col))
        .map(|free| {
            let mut vector = vec![0i64; width];
            vector[free] = scale;
            for (r, &col) in pivots.iter().enumerate() {
                vector[col] = -rows[r][free] * scale / rows[r][col];
            }
            reduce(&mut vector);
            vector
        })
        .collect()
}

/// Sums the basis vectors and keeps adding ones that cover zero entries until no entry
/// is zero. Returns `None` when that is not reachable.
fn combine(basis: &[Vec<i64>]) -> Option<Vec<i64>> {
    let (first, rest) = basis.split_first()?;
    let mut vector = first.clone();
    for other in rest {
        add(&mut vector, other);
    }

    for _ in 0..=vector.len() * basis.len() {
        let Some(zero) = vector.iter().position(|&c| c == 0) else {
            reduce(&mut vector);
            return Some(vector);
        };
        if basis.len() < 2 {
            return None;
        }
        add(&mut vector, basis.iter().find(|v| v[zero] != 0)?);
    }
    None
}

fn add(vector: &mut [i64], other: &[i64]) {
    for (value, o) in vector.iter_mut().zip(other) {
        *value += o;
    }
}

/// Renders `c1*t1 + c2*t2 + ...` with positive terms first.
fn render_sum(terms: &[(i64, &Term)]) -> String {
    let parts: Vec<(bool, String)> = terms
        .iter()
        .map(|&(coefficient, term)| {
            let magnitude = coefficient.unsigned_abs();
            if term.constant {
                // coefficient times all-ones is the negated coefficient
                (coefficient < 0, magnitude.to_string())
            } else if magnitude == 1 {
                (coefficient > 0, term.operand())
            } else {
                (coefficient > 0, format!("{magnitude}*{}", term.operand()))
            }
        })
        .collect();

    let mut out = String::new();
    let ordered = parts
        .iter()
        .filter(|(positive, _)| *positive)
        .chain(parts.iter().filter(|(positive, _)| !*positive));
    for (positive, text) in ordered {
        if !positive {
            if out.is_empty() {
                out.push('0');
            }
            out.push('-');
        } else if !out.is_empty() {
            out.push('+');
        }
        out.push_str(text);
    }
    out
}

fn evaluate(node: &ExprNode, values: &[(&str, u64)]) -> Option<u64> {
    if node.is_constant() {
        return node.token().constant_value().map(|v| v as u64);
    }
    if node.is_variable() {
        let name = node.token().text();
        return values.iter().find(|(n, _)| *n == name).map(|&(_, v)| v);
    }
    match (node.opcode()?, node.children()) {
        (Opcode::Not, [operand]) => Some(!evaluate(operand, values)?),
        (op, [lhs, rhs]) => {
            let (a, b) = (evaluate(lhs, values)?, evaluate(rhs, values)?);
            match op {
                Opcode::Add => Some(a.wrapping_add(b)),
                Opcode::Sub => Some(a.wrapping_sub(b)),
                Opcode::Mul => Some(a.wrapping_mul(b)),
                Opcode::And => Some(a & b),
                Opcode::Or => Some(a | b),
                Opcode::Xor => Some(a ^ b),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_has_one_spelling_per_truth_table() {
        let two = MbaGenerator::new(2, 3).unwrap();
        let spellings: Vec<_> = two.basis().collect();
        assert_eq!(spellings.len(), 15);
        assert_eq!(&spellings[..5], ["x", "y", "-1", "~x", "~y"]);
        assert!(spellings.contains(&"x^~y"));
        assert!(!spellings.contains(&"~x^y"));

        let three = MbaGenerator::new(3, 3).unwrap();
        assert_eq!(three.basis().count(), 37);
    }

    #[test]
    fn test_rejects_out_of_range_settings() {
        assert!(matches!(MbaGenerator::new(1, 3), Err(Error::Generator(_))));
        assert!(matches!(MbaGenerator::new(4, 3), Err(Error::Generator(_))));
        assert!(matches!(MbaGenerator::new(2, 1), Err(Error::Generator(_))));
        assert!(matches!(MbaGenerator::new(2, 16), Err(Error::Generator(_))));
        assert!(MbaGenerator::new(2, 15).is_ok());
    }

    #[test]
    fn test_nullspace_of_dependent_columns() {
        let x = [0, 0, 1, 1];
        let x_and_y = [0, 0, 0, 1];
        let x_and_not_y = [0, 0, 1, 0];
        let basis = nullspace(&[&x, &x_and_y, &x_and_not_y]);
        assert_eq!(basis, [vec![-1, 1, 1]]);
        assert_eq!(combine(&basis), Some(vec![-1, 1, 1]));

        let y = [0, 1, 0, 1];
        assert!(nullspace(&[&x, &y]).is_empty());
    }

    #[test]
    fn test_combine_needs_nonzero_coverage() {
        assert_eq!(combine(&[vec![1, 0, -1]]), None);
        assert_eq!(combine(&[vec![2, 0, -2], vec![0, 1, -1]]), Some(vec![2, 1, -3]));
        assert_eq!(combine(&[]), None);
    }

    #[test]
    fn test_render_sum_orders_signs() {
        let term = |text: &str, compound, constant| Term {
            text: text.to_string(),
            truth: Vec::new(),
            compound,
            constant,
        };
        let (x, and, ones) = (
            term("x", false, false),
            term("x&y", true, false),
            term("-1", false, true),
        );
        assert_eq!(render_sum(&[(-2, &and), (1, &x)]), "x-2*(x&y)");
        assert_eq!(render_sum(&[(-1, &x), (3, &ones)]), "0-x-3");
        assert_eq!(render_sum(&[(-1, &x), (-3, &ones)]), "3-x");
    }

    #[test]
    fn test_two_variable_identities_hold() {
        let three_terms: Vec<_> = MbaGenerator::new(2, 3).unwrap().identities().collect();
        assert!(three_terms.contains(&Identity::new("x", "(x&y)+(x&~y)")));
        assert!(three_terms.contains(&Identity::new("x", "0-1-~x")));

        let generator = MbaGenerator::new(2, 4).unwrap();
        let identities: Vec<_> = generator.identities().collect();
        assert!(!identities.is_empty());
        for identity in three_terms.iter().chain(&identities) {
            assert!(identity.holds(), "{identity}");
            assert!(!identity.obfuscated().contains(','));
            assert!(parse_expression(identity.simplified()).is_some_and(|t| t.depth() <= 3));
        }
    }

    #[test]
    fn test_holds_rejects_false_identities() {
        assert!(Identity::new("x+y", "(x|y)+(x&y)").holds());
        assert!(Identity::new("x-y", "x+~y+1").holds());
        assert!(!Identity::new("x+y", "x|y").holds());
        assert!(!Identity::new("x+y", "(x").holds());
        assert!(!Identity::new("x<<1", "x+x").holds());
    }

    #[test]
    fn test_write_dataset_limits_rows() {
        let generator = MbaGenerator::new(2, 3).unwrap();
        let mut out = Vec::new();
        assert_eq!(generator.write_dataset(&mut out, Some(2)).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(generator.file_name(), "mba-dataset-2-3.csv");
    }
}
