//! KDL node access helpers.

use ::kdl::{KdlEntry, KdlNode};

/// Positional (unnamed) entries of a node
fn arguments(node: &KdlNode) -> impl Iterator<Item = &KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none())
}

/// First positional argument of a node, as a string
pub fn get_first_arg_string(node: &KdlNode) -> Option<String> {
    arguments(node)
        .next()
        .and_then(|e| e.value().as_string())
        .map(str::to_string)
}

/// Named property of a node, as a string
pub fn get_property_string(node: &KdlNode, key: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .and_then(|e| e.value().as_string())
        .map(str::to_string)
}

/// Child node with the given name
pub fn get_child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

/// First argument of the named child node, e.g. `url "https://..."`
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    get_child(node, name).and_then(get_first_arg_string)
}

/// Every string argument of the named child node, e.g. `contact-urls "a" "b"`
pub fn get_string_list(node: &KdlNode, name: &str) -> Vec<String> {
    get_child(node, name)
        .map(|child| {
            arguments(child)
                .filter_map(|e| e.value().as_string())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
