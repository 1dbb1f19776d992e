use crate::cli::TreesArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use tedana_rs::trees::{builtin_tree, BUILTIN_TREES};

#[derive(Serialize)]
struct TreeInfo {
    name: &'static str,
    description: &'static str,
    n_nodes: usize,
}

pub fn execute(args: TreesArgs) -> i32 {
    let mut trees = Vec::with_capacity(BUILTIN_TREES.len());
    for &(name, description) in BUILTIN_TREES {
        match builtin_tree(name) {
            Ok(tree) => trees.push(TreeInfo {
                name,
                description,
                n_nodes: tree.nodes.len(),
            }),
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    }

    if args.json {
        return output::print_json(&trees);
    }

    println!("Built-in decision trees:\n");
    println!("  {:<14} {:<6} {}", "Name", "Nodes", "Description");
    println!("  {}", "-".repeat(72));
    for tree in &trees {
        println!("  {:<14} {:<6} {}", tree.name, tree.n_nodes, tree.description);
    }
    exit_codes::SUCCESS
}
