use deobscope::pattern::ExprNode;
use serde::Serialize;

use crate::{app::GlobalOptions, commands::common::parse_argument, output::print_output};

#[derive(Debug, Serialize)]
struct NodeInfo {
    text: String,
    opcode: Option<String>,
    children: Vec<NodeInfo>,
}

#[derive(Debug, Serialize)]
struct ParseInfo {
    input: String,
    canonical: String,
    depth: usize,
    nodes: usize,
    variables: Vec<String>,
    tree: NodeInfo,
    #[serde(skip)]
    dump: String,
}

pub fn run(expression: &str, opts: &GlobalOptions) -> anyhow::Result<()> {
    let tree = parse_argument(expression)?;

    let info = ParseInfo {
        input: expression.to_string(),
        canonical: tree.to_string(),
        depth: tree.depth(),
        nodes: tree.node_count(),
        variables: tree.variables().into_iter().map(str::to_string).collect(),
        tree: node_info(&tree),
        dump: tree.dump(),
    };

    print_output(&info, opts, |info| {
        println!("Canonical: {}", info.canonical);
        println!("Depth:     {}", info.depth);
        println!("Nodes:     {}", info.nodes);
        println!("Variables: {}", info.variables.join(", "));
        println!();
        print!("{}", info.dump);
    })
}

fn node_info(node: &ExprNode) -> NodeInfo {
    NodeInfo {
        text: node.token().text().to_string(),
        opcode: node.opcode().map(|op| op.to_string()),
        children: node.children().iter().map(node_info).collect(),
    }
}
