use std::fmt;

use termtree::Tree;
use tracing::instrument;

use crate::arena::Fern;
use crate::id::FrondId;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

// Renders the live forest below Root, children in chain order (newest first).
impl<P: fmt::Display> TreeNodeConvert for Fern<P> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        let mut tree = Tree::new(FrondId::ROOT.to_string());

        fn build_tree<P: fmt::Display>(fern: &Fern<P>, id: FrondId, parent_tree: &mut Tree<String>) {
            if let Ok(children) = fern.children(id) {
                for child_id in children {
                    if let Ok(payload) = fern.payload_of(child_id) {
                        let mut child_tree = Tree::new(format!("{}: {}", child_id, payload));
                        build_tree(fern, child_id, &mut child_tree);
                        parent_tree.push(child_tree);
                    }
                }
            }
        }

        build_tree(self, FrondId::ROOT, &mut tree);
        tree
    }
}
