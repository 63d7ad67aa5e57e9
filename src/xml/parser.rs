//! Skein document reader
//!
//! Reading happens in two steps: every `<item>` is collected by its id string
//! first, then the tree is assembled from the root and checked for the
//! structural rules a skein must follow.

use super::errors::ParseError;
use crate::models::{NodeId, Skein, SkeinNode, START_LABEL};
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Get first child element with given tag name
fn get_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

/// Get the whole text content of a node (all text children joined)
fn get_text(node: Node) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Get text content of first child with given tag
fn get_child_text(node: Node, tag: &str) -> Option<String> {
    get_child(node, tag).map(get_text)
}

fn get_child_flag(node: Node, tag: &str) -> bool {
    get_child_text(node, tag).map_or(false, |text| parse_flag(&text))
}

fn parse_flag(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("true") || text == "1"
}

/// Get the `nodeId` of the first child element with the given tag
fn get_child_ref(node: Node, tags: &[&str]) -> Option<String> {
    tags.iter()
        .find_map(|tag| get_child(node, tag))
        .and_then(|n| n.attribute("nodeId"))
        .map(str::to_string)
}

// ============================================================================
// ITEM COLLECTION
// ============================================================================

/// One `<item>` as read from the document, before ids are assigned
struct RawItem {
    key: String,
    node: SkeinNode,
    children: Vec<String>,
}

fn read_item(item: Node) -> Option<RawItem> {
    let Some(key) = item.attribute("nodeId") else {
        log::warn!("⚠️ Skipping skein item without nodeId");
        return None;
    };

    let mut node = SkeinNode::new(NodeId(0), get_child_text(item, "command").unwrap_or_default());
    node.actual = get_child_text(item, "result");
    node.ideal = get_child_text(item, "ideal");
    node.annotation = get_child_text(item, "annotation");
    node.commentary = get_child_text(item, "commentary");
    node.played = get_child_flag(item, "played");
    node.changed = get_child_flag(item, "changed");
    node.is_test_sub_item = get_child_flag(item, "testSubItem");

    if let Some(temporary) = get_child(item, "temporary") {
        node.temporary = parse_flag(&get_text(temporary));
        node.temporary_score = temporary
            .attribute("score")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
    }

    let children = get_child(item, "children")
        .map(|list| {
            list.children()
                .filter(|n| n.is_element() && n.tag_name().name() == "child")
                .filter_map(|n| n.attribute("nodeId"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(RawItem {
        key: key.to_string(),
        node,
        children,
    })
}

// ============================================================================
// TREE ASSEMBLY
// ============================================================================

/// Parse a skein document
pub fn from_xml(xml: &str) -> Result<Skein, ParseError> {
    let doc = Document::parse(xml).map_err(|e| ParseError::InvalidXml(format!("XML parse error: {}", e)))?;

    let skein_element = doc.root_element();
    if skein_element.tag_name().name() != "Skein" {
        return Err(ParseError::UnexpectedRoot(skein_element.tag_name().name().to_string()));
    }
    let root_key = skein_element
        .attribute("rootNode")
        .ok_or(ParseError::MissingRootNode)?
        .to_string();

    let mut items: HashMap<String, RawItem> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for element in skein_element
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
    {
        let Some(item) = read_item(element) else {
            continue;
        };
        if items.contains_key(&item.key) {
            return Err(ParseError::DuplicateNodeId(item.key));
        }
        order.push(item.key.clone());
        items.insert(item.key.clone(), item);
    }

    if !items.contains_key(&root_key) {
        return Err(ParseError::MissingRootItem(root_key));
    }
    check_links(&items, &order, &root_key)?;

    // Walk from the root; anything not reached is a second root or a cycle
    let mut preorder = Vec::with_capacity(items.len());
    let mut stack = vec![root_key.clone()];
    while let Some(key) = stack.pop() {
        if let Some(item) = items.get(&key) {
            stack.extend(item.children.iter().rev().cloned());
        }
        preorder.push(key);
    }

    if preorder.len() < items.len() {
        let reached: BTreeSet<&String> = preorder.iter().collect();
        let has_parent: BTreeSet<&String> = items.values().flat_map(|i| i.children.iter()).collect();
        if let Some(key) = order.iter().find(|k| !reached.contains(k)) {
            return Err(if has_parent.contains(key) {
                ParseError::CyclicReference(key.clone())
            } else {
                ParseError::MultipleRoots(key.clone())
            });
        }
    }

    let ids = assign_ids(&preorder);
    let lookup = |key: &str| ids.get(key).copied();

    let mut nodes: BTreeMap<NodeId, SkeinNode> = BTreeMap::new();
    for key in &preorder {
        let Some(raw) = items.remove(key) else {
            continue;
        };
        let Some(id) = lookup(key.as_str()) else {
            continue;
        };

        let mut node = raw.node;
        node.id = id;
        node.children = raw.children.iter().filter_map(|c| lookup(c.as_str())).collect();
        nodes.insert(id, node);
    }

    let links: Vec<(NodeId, NodeId)> = nodes
        .values()
        .flat_map(|n| n.children.iter().map(move |c| (*c, n.id)))
        .collect();
    for (child, parent) in links {
        if let Some(node) = nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
    }

    let root = lookup(root_key.as_str()).ok_or_else(|| ParseError::MissingRootItem(root_key.clone()))?;
    if let Some(root_node) = nodes.get_mut(&root) {
        if !root_node.command.is_empty() && root_node.command != START_LABEL {
            log::debug!("Dropping root command '{}'", root_node.command);
        }
        root_node.command.clear();
        root_node.is_test_sub_item = false;
    }

    let active = resolve_reference(skein_element, &["activeNode", "activeItem"], &lookup);
    let winning = resolve_reference(skein_element, &["winningNode"], &lookup);

    log::info!("📂 Loaded skein with {} items", nodes.len());
    Ok(Skein::from_parts(nodes, root, active, winning))
}

/// Check child references: they must exist, have one parent, never point
/// at the root, and siblings must not share a command
fn check_links(items: &HashMap<String, RawItem>, order: &[String], root_key: &str) -> Result<(), ParseError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    for key in order {
        let Some(item) = items.get(key) else {
            continue;
        };

        let mut commands: BTreeSet<(&str, bool)> = BTreeSet::new();
        for child in &item.children {
            let Some(child_item) = items.get(child) else {
                return Err(ParseError::UnknownChild {
                    parent: key.clone(),
                    child: child.clone(),
                });
            };
            if child == root_key || child == key {
                return Err(ParseError::CyclicReference(child.clone()));
            }
            if !seen.insert(child.as_str()) {
                return Err(ParseError::MultipleParents(child.clone()));
            }
            if !commands.insert(child_item.node.key()) {
                return Err(ParseError::DuplicateChild {
                    parent: key.clone(),
                    command: child_item.node.command.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Numeric ids are kept; any other id scheme (UUIDs in older files, or
/// numbers that only differ in formatting) is replaced by fresh ids in pre-order
fn assign_ids(preorder: &[String]) -> HashMap<String, NodeId> {
    let numeric: Option<Vec<u64>> = preorder.iter().map(|k| k.trim().parse::<u64>().ok()).collect();
    let numeric = numeric.filter(|values| {
        let distinct: BTreeSet<&u64> = values.iter().collect();
        distinct.len() == values.len()
    });

    match numeric {
        Some(values) => preorder
            .iter()
            .cloned()
            .zip(values.into_iter().map(NodeId))
            .collect(),
        None => {
            log::debug!("Renumbering {} skein items", preorder.len());
            preorder
                .iter()
                .enumerate()
                .map(|(i, key)| (key.clone(), NodeId(i as u64 + 1)))
                .collect()
        }
    }
}

fn resolve_reference(
    skein_element: Node,
    tags: &[&str],
    lookup: &impl Fn(&str) -> Option<NodeId>,
) -> Option<NodeId> {
    let key = get_child_ref(skein_element, tags)?;
    let id = lookup(key.as_str());
    if id.is_none() {
        log::warn!("⚠️ Ignoring reference to unknown skein item '{}'", key);
    }
    id
}
