use serde::Serialize;

use crate::node::Node;
use crate::nodes::{NanoBanana, NanoBananaAio, NanoBananaGrounding, NanoBananaMultiTurnChat};

/// What a host needs to list a node before instantiating it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub return_names: &'static [&'static str],
}

impl NodeDescriptor {
    fn of<N: Node>() -> Self {
        Self {
            name: N::NAME,
            display_name: N::DISPLAY_NAME,
            category: N::CATEGORY,
            return_names: N::RETURN_NAMES,
        }
    }
}

/// Every node this crate provides, in registration order
pub fn node_class_mappings() -> Vec<NodeDescriptor> {
    vec![
        NodeDescriptor::of::<NanoBanana>(),
        NodeDescriptor::of::<NanoBananaGrounding>(),
        NodeDescriptor::of::<NanoBananaAio>(),
        NodeDescriptor::of::<NanoBananaMultiTurnChat>(),
    ]
}

/// Looks a node up by identifier
pub fn find_node(name: &str) -> Option<NodeDescriptor> {
    node_class_mappings().into_iter().find(|d| d.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CATEGORY;

    #[test]
    fn test_all_nodes_registered_in_order() {
        let names: Vec<&str> = node_class_mappings().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "NanoBanana",
                "NanoBananaGrounding",
                "NanoBananaAIO",
                "NanoBananaMultiTurnChat"
            ]
        );
        assert!(node_class_mappings().iter().all(|d| d.category == CATEGORY));
    }

    #[test]
    fn test_find_node() {
        let chat = find_node("NanoBananaMultiTurnChat").unwrap();
        assert_eq!(chat.display_name, "Nano Banana Multi-Turn Chat");
        assert_eq!(
            chat.return_names,
            &["image", "response_text", "metadata", "chat_history"]
        );
        assert!(find_node("NanoBananaVideo").is_none());
    }
}
