pub mod common;
pub mod corpus;
pub mod generate;
pub mod parse;
pub mod simplify;
pub mod tokens;
