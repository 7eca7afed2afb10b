// src/core/graph_display.rs

use crate::core::entity::{Component, Function, Module, Project};
use colored::Colorize;
use std::fmt::Write;

/// What to show besides node names.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    /// Show each node's directory.
    pub show_paths: bool,
    /// Stop after this many levels below the start node.
    pub max_depth: Option<usize>,
}

/// One line of the tree before it is rendered.
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

/// Renders the project as an ASCII tree, starting at the node addressed by `start` (the whole
/// project when `None`). Returns `None` if `start` names nothing.
pub fn render_project_tree(
    project: &Project,
    start: Option<&str>,
    options: &DisplayOptions,
) -> Option<String> {
    let root = match start.filter(|s| !s.is_empty()) {
        None => project_node(project, options),
        Some(s_path) => {
            let parts = crate::core::spath::parse(s_path);
            let component = project
                .components()
                .values()
                .find(|c| c.config().parts().component == parts.component)?;
            match (&parts.module, &parts.function) {
                (None, _) => component_node(component, options),
                (Some(module), None) => {
                    module_node(find_module(component, module)?, options)
                }
                (Some(module), Some(function)) => {
                    let module = find_module(component, module)?;
                    let function = module
                        .functions()
                        .values()
                        .find(|f| f.config().parts().function.as_ref() == Some(function))?;
                    function_node(function, options)
                }
            }
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", root.label);
    let count = root.children.len();
    for (i, child) in root.children.iter().enumerate() {
        print_node(&mut out, child, "", i + 1 == count, 1, options.max_depth);
    }
    Some(out)
}

fn find_module<'a>(component: &'a Component, segment: &str) -> Option<&'a Module> {
    component
        .modules()
        .values()
        .find(|m| m.config().parts().module.as_deref() == Some(segment))
}

fn with_path(label: String, path: Option<&std::path::Path>, options: &DisplayOptions) -> String {
    match path {
        Some(path) if options.show_paths => {
            format!("{} {}", label, format!("[{}]", path.display()).dimmed())
        }
        _ => label,
    }
}

fn project_node(project: &Project, options: &DisplayOptions) -> TreeNode {
    TreeNode {
        label: with_path(
            format!("{} {}", project.name().bold(), "(project)".dimmed()),
            project.config().full_path(),
            options,
        ),
        children: project
            .components()
            .values()
            .map(|c| component_node(c, options))
            .collect(),
    }
}

fn component_node(component: &Component, options: &DisplayOptions) -> TreeNode {
    let runtime = component.data().runtime().unwrap_or("?");
    TreeNode {
        label: with_path(
            format!("{} {}", component.name().cyan().bold(), format!("({})", runtime).dimmed()),
            component.config().full_path(),
            options,
        ),
        children: component
            .modules()
            .values()
            .map(|m| module_node(m, options))
            .collect(),
    }
}

fn module_node(module: &Module, options: &DisplayOptions) -> TreeNode {
    TreeNode {
        label: with_path(
            module.name().green().to_string(),
            module.config().full_path(),
            options,
        ),
        children: module
            .functions()
            .values()
            .map(|f| function_node(f, options))
            .collect(),
    }
}

fn function_node(function: &Function, options: &DisplayOptions) -> TreeNode {
    let endpoints = function.endpoints().iter().map(|e| TreeNode {
        label: format!("{} {}", e.method().yellow(), e.path()),
        children: Vec::new(),
    });
    let events = function.events().iter().map(|e| TreeNode {
        label: format!("{}{}", "#".magenta(), e.name()),
        children: Vec::new(),
    });
    TreeNode {
        label: with_path(
            function.name().to_string(),
            function.config().full_path(),
            options,
        ),
        children: endpoints.chain(events).collect(),
    }
}

/// Recursive function to print a tree node and its descendants.
fn print_node(
    out: &mut String,
    node: &TreeNode,
    prefix: &str,
    is_last: bool,
    depth: usize,
    max_depth: Option<usize>,
) {
    let connector = if is_last { "└─" } else { "├─" };
    let _ = writeln!(out, "{}{}{}", prefix, connector, node.label);

    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }

    // Prepare the prefix for the children of this node
    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        print_node(out, child, &child_prefix, i + 1 == count, depth + 1, max_depth);
    }
}
