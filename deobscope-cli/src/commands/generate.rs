use std::path::Path;

use anyhow::Context;
use deobscope::pattern::generate::MbaGenerator;
use serde::Serialize;

use crate::{app::GlobalOptions, output::print_output};

#[derive(Debug, Serialize)]
struct GenerateInfo {
    path: String,
    variables: usize,
    terms: usize,
    basis: usize,
    written: usize,
}

pub fn run(
    dir: &Path,
    variables: usize,
    terms: usize,
    limit: Option<usize>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let generator = MbaGenerator::new(variables, terms)?;
    let (path, written) = generator
        .write_to_directory(dir, limit)
        .with_context(|| format!("failed to write dataset into {}", dir.display()))?;

    let info = GenerateInfo {
        path: path.display().to_string(),
        variables,
        terms,
        basis: generator.basis().count(),
        written,
    };

    print_output(&info, opts, |info| {
        println!("Dataset:    {}", info.path);
        println!("Variables:  {}", info.variables);
        println!("Terms:      {}", info.terms);
        println!("Basis:      {} expressions", info.basis);
        println!("Identities: {}", info.written);
    })
}
