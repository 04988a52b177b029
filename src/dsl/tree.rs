//! Arena-backed element tree operations.

use super::{
    BlockElement, BlockKind, Element, ElementId, ElementKindFilter, ElementPayload,
    ElementState, ExprElement, ExprStyle, ExprValue,
};
use crate::base::DslName;
use smol_str::SmolStr;

/// Owns every element of one parsed file.
///
/// The root is a nameless block covering the whole file. Ids are stable
/// until the tree is rebuilt by a reparse.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<Element>,
    root: ElementId,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    pub fn new() -> Self {
        let root = Element {
            name: DslName::new(""),
            parent: None,
            anchor: None,
            state: ElementState::Parsed,
            payload: ElementPayload::Block(BlockElement {
                kind: BlockKind::Root,
                children: Vec::new(),
            }),
        };
        Self {
            nodes: vec![root],
            root: ElementId(0),
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn alloc(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.nodes.len() as u32);
        self.nodes.push(element);
        id
    }

    /// All elements in the arena, live or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Ordered child ids of a block-like element (live and removed alike;
    /// write-back needs both).
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        match &self.get(id).payload {
            ElementPayload::Block(b) => b.children.clone(),
            ElementPayload::Map(m) => m.entries.values().copied().collect(),
            ElementPayload::Expr(e) => match &e.value {
                ExprValue::List(items) => items.clone(),
                ExprValue::Call { args, .. } => args.clone(),
                _ => Vec::new(),
            },
        }
    }

    /// The last live child matching `name` regardless of kind. Last, not
    /// first: later writes shadow earlier ones within a block.
    pub fn find_child(&self, parent: ElementId, name: &str) -> Option<ElementId> {
        self.children(parent)
            .into_iter()
            .filter(|&c| self.get(c).is_live())
            .filter(|&c| self.get(c).name.matches(name))
            .next_back()
    }

    /// The last live block-like child matching `name`. A block and a scalar
    /// property may share a name; kind disambiguates.
    pub fn find_child_block(&self, parent: ElementId, name: &str) -> Option<ElementId> {
        self.children(parent)
            .into_iter()
            .filter(|&c| {
                let el = self.get(c);
                el.is_live() && el.is_block_like() && el.name.matches(name)
            })
            .next_back()
    }

    /// The last live expression child matching `name`.
    pub fn find_child_expr(&self, parent: ElementId, name: &str) -> Option<ElementId> {
        self.children(parent)
            .into_iter()
            .filter(|&c| {
                let el = self.get(c);
                el.is_live() && el.as_expr().is_some() && el.name.matches(name)
            })
            .next_back()
    }

    /// All live children matching the kind filter, in order. Duplicate
    /// names are preserved (repeated block invocations, dependency lists).
    pub fn property_elements(
        &self,
        parent: ElementId,
        filter: ElementKindFilter,
    ) -> Vec<ElementId> {
        self.children(parent)
            .into_iter()
            .filter(|&c| {
                let el = self.get(c);
                el.is_live()
                    && match filter {
                        ElementKindFilter::Any => true,
                        ElementKindFilter::Blocks => el.is_block_like(),
                        ElementKindFilter::Expressions => el.as_expr().is_some(),
                    }
            })
            .collect()
    }

    /// Depth of an element below the root. Root children are at depth 0.
    pub fn depth(&self, id: ElementId) -> usize {
        let mut depth = 0usize;
        let mut current = self.get(id).parent;
        while let Some(p) = current {
            depth += 1;
            current = self.get(p).parent;
        }
        depth.saturating_sub(1)
    }

    // =========================================================================
    // Construction (parse side)
    // =========================================================================

    /// Attaches a freshly parsed child element to its parent, routing
    /// through the per-block-kind dispatch hooks (see [`super::build`]).
    pub fn add_parsed_element(&mut self, parent: ElementId, element: Element) -> ElementId {
        let name = SmolStr::new(element.name.as_str());
        let id = self.alloc(element);
        self.get_mut(id).parent = Some(parent);
        self.attach(parent, name, id);
        super::build::run_parsed_element_hook(self, parent, id);
        id
    }

    /// Inserts an in-memory element (state `Added`), used when code adds a
    /// new block or property not present in source.
    pub fn set_new_element(&mut self, parent: ElementId, mut element: Element) -> ElementId {
        element.state = ElementState::Added;
        element.anchor = None;
        let name = SmolStr::new(element.name.as_str());
        let id = self.alloc(element);
        self.get_mut(id).parent = Some(parent);
        self.attach(parent, name, id);
        id
    }

    fn attach(&mut self, parent: ElementId, name: SmolStr, id: ElementId) {
        match &mut self.get_mut(parent).payload {
            ElementPayload::Block(b) => b.children.push(id),
            ElementPayload::Map(m) => {
                // Unique keys: a later entry with the same name replaces the
                // earlier one in the map, which keeps lookups unambiguous.
                m.entries.insert(name, id);
            }
            ElementPayload::Expr(e) => match &mut e.value {
                ExprValue::List(items) => items.push(id),
                ExprValue::Call { args, .. } => args.push(id),
                _ => {
                    debug_assert!(false, "cannot attach a child to a scalar expression");
                }
            },
        }
    }

    // =========================================================================
    // Mutation (consumer side)
    // =========================================================================

    /// Creates a new property `name = value` under `parent`.
    pub fn add_property(
        &mut self,
        parent: ElementId,
        name: &str,
        value: ExprValue,
    ) -> ElementId {
        self.set_new_element(
            parent,
            Element {
                name: DslName::new(name),
                parent: None,
                anchor: None,
                state: ElementState::Added,
                payload: ElementPayload::Expr(ExprElement {
                    style: ExprStyle::Assignment,
                    value,
                }),
            },
        )
    }

    /// Creates a new empty block under `parent`.
    pub fn add_block(&mut self, parent: ElementId, name: &str) -> ElementId {
        self.set_new_element(
            parent,
            Element {
                name: DslName::new(name),
                parent: None,
                anchor: None,
                state: ElementState::Added,
                payload: ElementPayload::Block(BlockElement {
                    kind: BlockKind::Generic,
                    children: Vec::new(),
                }),
            },
        )
    }

    /// Replaces the value of an expression element, marking it modified.
    ///
    /// Removed elements are left untouched: state only moves forward within
    /// an edit cycle.
    pub fn set_value(&mut self, id: ElementId, value: ExprValue) -> bool {
        let element = self.get_mut(id);
        if element.state == ElementState::Removed {
            return false;
        }
        let ElementPayload::Expr(expr) = &mut element.payload else {
            return false;
        };
        expr.value = value;
        if element.state == ElementState::Parsed {
            element.state = ElementState::Modified;
        }
        true
    }

    /// Marks every live child named `name` as removed. Physical deletion
    /// happens at write-back.
    pub fn remove_property(&mut self, parent: ElementId, name: &str) -> usize {
        let targets: Vec<_> = self
            .children(parent)
            .into_iter()
            .filter(|&c| self.get(c).is_live() && self.get(c).name.matches(name))
            .collect();
        for &id in &targets {
            self.get_mut(id).state = ElementState::Removed;
        }
        targets.len()
    }

    // =========================================================================
    // Edit-cycle bookkeeping
    // =========================================================================

    /// Whether any element carries an unapplied edit.
    pub fn has_pending_edits(&self) -> bool {
        self.walk()
            .into_iter()
            .any(|id| self.get(id).state != ElementState::Parsed)
    }

    /// Ids of all elements, depth-first in insertion order from the root.
    pub fn walk(&self) -> Vec<ElementId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.children(id);
            for &c in children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Transitions every dirty element to `Applied`. The write-back engine
    /// calls this after its edit batch lands and before re-anchoring.
    pub(crate) fn mark_all_applied(&mut self) {
        for element in &mut self.nodes {
            if element.state != ElementState::Parsed {
                element.state = ElementState::Applied;
            }
        }
    }

    /// Map-block helper: live entry ids keyed by name, insertion order.
    pub fn map_entries(&self, id: ElementId) -> Vec<(SmolStr, ElementId)> {
        match &self.get(id).payload {
            ElementPayload::Map(m) => m
                .entries
                .iter()
                .filter(|&(_, &v)| self.get(v).is_live())
                .map(|(k, &v)| (k.clone(), v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::LiteralValue;

    fn expr(name: &str, value: ExprValue) -> Element {
        Element {
            name: DslName::new(name),
            parent: None,
            anchor: None,
            state: ElementState::Parsed,
            payload: ElementPayload::Expr(ExprElement {
                style: ExprStyle::Assignment,
                value,
            }),
        }
    }

    #[test]
    fn quoted_and_bare_names_find_the_same_child() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        tree.add_property(root, "version", ExprValue::Literal(LiteralValue::Int(1)));
        assert!(tree.find_child(root, "version").is_some());
        assert!(tree.find_child(root, "\"version\"").is_some());
        assert!(tree.find_child(root, "'version'").is_some());
    }

    #[test]
    fn later_definition_shadows_earlier_within_a_block() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let first = tree.add_parsed_element(
            root,
            expr("v", ExprValue::Literal(LiteralValue::Int(1))),
        );
        let second = tree.add_parsed_element(
            root,
            expr("v", ExprValue::Literal(LiteralValue::Int(2))),
        );
        assert_ne!(first, second);
        assert_eq!(tree.find_child(root, "v"), Some(second));
    }

    #[test]
    fn block_and_scalar_sharing_a_name_are_disambiguated_by_kind() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let prop = tree.add_property(root, "lint", ExprValue::Literal(LiteralValue::Bool(true)));
        let block = tree.add_block(root, "lint");
        assert_eq!(tree.find_child_expr(root, "lint"), Some(prop));
        assert_eq!(tree.find_child_block(root, "lint"), Some(block));
    }

    #[test]
    fn removed_elements_stay_in_tree_but_leave_lookups() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        tree.add_property(root, "a", ExprValue::Literal(LiteralValue::Int(1)));
        assert_eq!(tree.remove_property(root, "a"), 1);
        assert!(tree.find_child(root, "a").is_none());
        assert_eq!(tree.children(root).len(), 1);
        assert!(tree.has_pending_edits());
    }

    #[test]
    fn removed_elements_cannot_be_modified() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let id = tree.add_property(root, "a", ExprValue::Literal(LiteralValue::Int(1)));
        tree.remove_property(root, "a");
        assert!(!tree.set_value(id, ExprValue::Literal(LiteralValue::Int(2))));
    }

    #[test]
    fn walk_is_depth_first_in_insertion_order() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let block = tree.add_block(root, "outer");
        let inner = tree.add_property(block, "x", ExprValue::Literal(LiteralValue::Int(1)));
        let after = tree.add_property(root, "y", ExprValue::Literal(LiteralValue::Int(2)));
        assert_eq!(tree.walk(), vec![root, block, inner, after]);
    }
}
