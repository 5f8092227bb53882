//! Service-mesh filter: structural removal of same-service proxy hops.

use tracelens_core::model::node::Node;

/// Top-down rewrite: a child with the same service as its parent is a
/// sidecar hop, not a real call. The hop is elided and its children spliced
/// in at its position; its own timing is dropped. The splice point is
/// re-examined, so whole chains (app -> sidecar -> sidecar -> app) collapse
/// to a single node in one pass.
pub fn collapse_same_service(node: &mut Node) {
    let mut i = 0;
    while i < node.children.len() {
        if node.children[i].service == node.service {
            let hop = node.children.remove(i);
            node.children.splice(i..i, hop.children);
        } else {
            i += 1;
        }
    }
    for child in &mut node.children {
        collapse_same_service(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::model::span::SpanKind;

    fn node(service: &str, children: Vec<Node>) -> Node {
        let mut n = Node::new(service, SpanKind::Internal);
        n.display = service.to_string();
        n.children = children;
        n
    }

    #[test]
    fn sidecar_chain_collapses_to_one_node() {
        // app -> sidecar(app) -> sidecar(app) -> app hop, with the innermost
        // hop holding the real downstream call.
        let downstream = node("billing", Vec::new());
        let mut root = node(
            "app",
            vec![node("app", vec![node("app", vec![node("app", vec![downstream])])])],
        );
        collapse_same_service(&mut root);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].service, "billing");
    }

    #[test]
    fn cross_service_children_are_kept_in_order() {
        let mut root = node(
            "app",
            vec![
                node("auth", Vec::new()),
                node("app", vec![node("billing", Vec::new())]),
                node("search", Vec::new()),
            ],
        );
        collapse_same_service(&mut root);
        let services: Vec<_> = root.children.iter().map(|c| c.service.as_str()).collect();
        assert_eq!(services, vec!["auth", "billing", "search"]);
    }

    #[test]
    fn collapse_applies_below_the_root_too() {
        let mut root = node(
            "edge",
            vec![node("app", vec![node("app", vec![node("db", Vec::new())])])],
        );
        collapse_same_service(&mut root);
        assert_eq!(root.children[0].service, "app");
        assert_eq!(root.children[0].children[0].service, "db");
    }
}
