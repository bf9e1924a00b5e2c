//! The split tree: an arena of nodes addressed by handle, never by pointer
//! (spec.md §9 design notes — avoids Rc<RefCell<>> cycles between parent and
//! child). Leaves hold a [`PaneHandle`]; split nodes hold an axis, a list of
//! child handles, and a parallel list of ratios summing to 1.

use crate::config::{MIN_PANE_HEIGHT, MIN_PANE_WIDTH, MIN_RATIO};
use crate::error::{Error, Result};
use crate::pane::PaneHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn axis(self) -> Axis {
        match self {
            // Vertical splits divide width (side-by-side panes), so left/right
            // movement walks a vertical split; horizontal splits stack panes
            // top/bottom (spec.md §4.1 "Minimum-size gate").
            Direction::Left | Direction::Right => Axis::Vertical,
            Direction::Up | Direction::Down => Axis::Horizontal,
        }
    }

    /// `true` if this direction moves toward later siblings (down/right).
    fn forward(self) -> bool {
        matches!(self, Direction::Down | Direction::Right)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(PaneHandle),
    Split {
        axis: Axis,
        children: Vec<NodeHandle>,
        ratios: Vec<f64>,
    },
}

/// A rectangle in screen coordinates, as assigned by [`Tree::compute_rects`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// An arena of nodes with a designated root and a tracked active leaf.
/// Slots are never physically removed (only tombstoned as unreachable from
/// root) so existing [`NodeHandle`]s never dangle across an in-place
/// mutation.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    root: NodeHandle,
    active_leaf: NodeHandle,
}

impl Tree {
    /// A tree with a single leaf pointing at `pane`, active.
    pub fn single(pane: PaneHandle) -> Self {
        Self {
            nodes: vec![Some(Node::Leaf(pane))],
            root: NodeHandle(0),
            active_leaf: NodeHandle(0),
        }
    }

    /// Builds a tree directly from a flattened arena, a root, and the pane
    /// that should be active — used by [`crate::snapshot::rebuild_tree`] to
    /// restore a captured structure (with its original ratios) in one shot,
    /// rather than replaying it through [`Tree::split_active`]. Falls back
    /// to the root's first leaf if `active_pane` isn't present in `nodes`.
    pub fn from_arena(nodes: Vec<Node>, root: NodeHandle, active_pane: PaneHandle) -> Self {
        let mut tree = Self {
            nodes: nodes.into_iter().map(Some).collect(),
            root,
            active_leaf: root,
        };
        tree.active_leaf = tree.find_leaf(active_pane).unwrap_or_else(|| tree.first_leaf(root));
        tree
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn active_leaf(&self) -> NodeHandle {
        self.active_leaf
    }

    pub fn active_pane(&self) -> PaneHandle {
        match self.node(self.active_leaf) {
            Node::Leaf(p) => *p,
            Node::Split { .. } => unreachable!("active_leaf always points at a Leaf"),
        }
    }

    /// Forces the active leaf to the one holding `pane`, if present.
    pub fn set_active_pane(&mut self, pane: PaneHandle) {
        if let Some(leaf) = self.find_leaf(pane) {
            self.active_leaf = leaf;
        }
    }

    pub fn node(&self, h: NodeHandle) -> &Node {
        self.nodes[h.0].as_ref().expect("dangling node handle")
    }

    fn node_mut(&mut self, h: NodeHandle) -> &mut Node {
        self.nodes[h.0].as_mut().expect("dangling node handle")
    }

    fn alloc(&mut self, node: Node) -> NodeHandle {
        self.nodes.push(Some(node));
        NodeHandle(self.nodes.len() - 1)
    }

    /// Finds the leaf holding `pane`, returning its node handle.
    pub fn find_leaf(&self, pane: PaneHandle) -> Option<NodeHandle> {
        self.find_leaf_from(self.root, pane)
    }

    fn find_leaf_from(&self, at: NodeHandle, pane: PaneHandle) -> Option<NodeHandle> {
        match self.node(at) {
            Node::Leaf(p) if *p == pane => Some(at),
            Node::Leaf(_) => None,
            Node::Split { children, .. } => {
                let children = children.clone();
                children.into_iter().find_map(|c| self.find_leaf_from(c, pane))
            }
        }
    }

    fn find_parent(&self, at: NodeHandle, target: NodeHandle) -> Option<NodeHandle> {
        match self.node(at) {
            Node::Leaf(_) => None,
            Node::Split { children, .. } => {
                let children = children.clone();
                if children.contains(&target) {
                    return Some(at);
                }
                children.into_iter().find_map(|c| self.find_parent(c, target))
            }
        }
    }

    /// The first leaf reachable from `at`, descending the first child at
    /// each split.
    fn first_leaf(&self, at: NodeHandle) -> NodeHandle {
        match self.node(at) {
            Node::Leaf(_) => at,
            Node::Split { children, .. } => self.first_leaf(children[0]),
        }
    }

    /// All panes in depth-first, left-to-right order.
    pub fn panes(&self) -> Vec<PaneHandle> {
        let mut out = Vec::new();
        self.collect_panes(self.root, &mut out);
        out
    }

    fn collect_panes(&self, at: NodeHandle, out: &mut Vec<PaneHandle>) {
        match self.node(at) {
            Node::Leaf(p) => out.push(*p),
            Node::Split { children, .. } => {
                let children = children.clone();
                for c in children {
                    self.collect_panes(c, out);
                }
            }
        }
    }

    /// Splits the active leaf along `axis`, inserting `new_pane` as a new
    /// leaf. Rejects the split if `current_extent / 2` would fall below the
    /// configured minimum along the split's axis (spec.md §4.1).
    pub fn split_active(&mut self, axis: Axis, new_pane: PaneHandle, area: Rect) -> Result<NodeHandle> {
        let leaf = self.active_leaf;
        let Some((_, rect)) = self.compute_rects(area).into_iter().find(|(p, _)| *p == self.active_pane()) else {
            return Err(Error::InvalidSplit);
        };
        match axis {
            Axis::Vertical if (rect.width as i32) / 2 < MIN_PANE_WIDTH => return Err(Error::InvalidSplit),
            Axis::Horizontal if (rect.height as i32) / 2 < MIN_PANE_HEIGHT => return Err(Error::InvalidSplit),
            _ => {}
        }

        let parent = self.find_parent(self.root, leaf);
        if let Some(parent) = parent {
            let add_to_group = match self.node(parent) {
                Node::Split { axis: paxis, ratios, .. } => {
                    *paxis == axis && ratios_are_equal(ratios)
                }
                Node::Leaf(_) => false,
            };
            if add_to_group {
                let new_leaf = self.alloc(Node::Leaf(new_pane));
                let Node::Split { children, ratios, .. } = self.node_mut(parent) else {
                    unreachable!()
                };
                children.push(new_leaf);
                let n = children.len();
                for r in ratios.iter_mut() {
                    *r = 1.0 / n as f64;
                }
                ratios.push(1.0 / n as f64);
                self.active_leaf = new_leaf;
                return Ok(new_leaf);
            }
        }

        let new_leaf = self.alloc(Node::Leaf(new_pane));
        let old_leaf_copy = self.node(leaf).clone();
        let existing_leaf = self.alloc(old_leaf_copy);
        *self.node_mut(leaf) = Node::Split {
            axis,
            children: vec![existing_leaf, new_leaf],
            ratios: vec![0.5, 0.5],
        };
        self.active_leaf = new_leaf;
        Ok(new_leaf)
    }

    /// Closes the active leaf per spec.md §4.1's close algorithm. Returns the
    /// closed pane so the caller (workspace) can stop its app. Returns an
    /// error if the active leaf is the tree's only pane — the workspace is
    /// responsible for replacing the whole tree in that case.
    pub fn close_active_leaf(&mut self) -> Result<PaneHandle> {
        let leaf = self.active_leaf;
        if leaf == self.root {
            return Err(Error::InvalidSplit);
        }
        let closed = match self.node(leaf) {
            Node::Leaf(p) => *p,
            Node::Split { .. } => unreachable!(),
        };
        let parent = self.find_parent(self.root, leaf).expect("non-root leaf has a parent");
        let (idx, children_len) = {
            let Node::Split { children, ratios, .. } = self.node_mut(parent) else {
                unreachable!("parent of a leaf is always a split")
            };
            let idx = children.iter().position(|c| *c == leaf).expect("leaf listed under its own parent");
            children.remove(idx);
            ratios.remove(idx);
            (idx, children.len())
        };

        if children_len == 0 {
            if parent == self.root {
                // Nothing left to collapse into; the workspace must replace
                // the whole tree. Leave a structurally valid placeholder so
                // the arena stays internally consistent until it does.
                *self.node_mut(parent) = Node::Leaf(closed);
                self.active_leaf = parent;
                return Ok(closed);
            }
            self.collapse_empty(parent)?;
            return Ok(closed);
        }

        {
            let Node::Split { ratios, .. } = self.node_mut(parent) else { unreachable!() };
            let total: f64 = ratios.iter().sum();
            if total > 0.0 {
                for r in ratios.iter_mut() {
                    *r /= total;
                }
            }
        }

        if children_len == 1 {
            let Node::Split { children, .. } = self.node(parent) else { unreachable!() };
            let survivor = self.node(children[0]).clone();
            *self.node_mut(parent) = survivor;
            self.active_leaf = self.first_leaf(parent);
        } else {
            let Node::Split { children, .. } = self.node(parent) else { unreachable!() };
            // The closed index, clamped into the post-removal range by
            // stepping back one rather than forward (spec.md §4.1/§8: closing
            // the middle of a 3-pane group leaves the *first* pane active,
            // not the third).
            let new_idx = idx.saturating_sub(1).min(children.len() - 1);
            let new_active_branch = children[new_idx];
            self.active_leaf = self.first_leaf(new_active_branch);
        }
        Ok(closed)
    }

    /// Recursively collapses a split node left with zero children, climbing
    /// toward the root (spec.md §4.1: "If P has 0 children left, recursively
    /// apply the same procedure to P").
    fn collapse_empty(&mut self, empty: NodeHandle) -> Result<()> {
        if empty == self.root {
            return Ok(());
        }
        let parent = self.find_parent(self.root, empty).expect("non-root node has a parent");
        let children_len = {
            let Node::Split { children, ratios, .. } = self.node_mut(parent) else {
                unreachable!()
            };
            let idx = children.iter().position(|c| *c == empty).unwrap();
            children.remove(idx);
            ratios.remove(idx);
            children.len()
        };
        if children_len == 0 {
            self.collapse_empty(parent)
        } else {
            {
                let Node::Split { ratios, .. } = self.node_mut(parent) else { unreachable!() };
                let total: f64 = ratios.iter().sum();
                if total > 0.0 {
                    for r in ratios.iter_mut() {
                        *r /= total;
                    }
                }
            }
            if children_len == 1 {
                let Node::Split { children, .. } = self.node(parent) else { unreachable!() };
                let survivor = self.node(children[0]).clone();
                *self.node_mut(parent) = survivor;
                self.active_leaf = self.first_leaf(parent);
            } else {
                self.active_leaf = self.first_leaf(parent);
            }
            Ok(())
        }
    }

    /// Walks up from the active leaf to find the first ancestor split whose
    /// axis matches `dir` and that has a sibling on the requested side,
    /// returning that sibling's node handle (not yet descended to a leaf).
    fn neighbor_branch(&self, dir: Direction) -> Option<NodeHandle> {
        let mut current = self.active_leaf;
        loop {
            let parent = self.find_parent(self.root, current)?;
            let Node::Split { axis, children, .. } = self.node(parent) else {
                unreachable!()
            };
            if *axis == dir.axis() {
                let idx = children.iter().position(|c| *c == current).unwrap();
                let neighbor_idx = if dir.forward() { idx + 1 } else { idx.checked_sub(1)? };
                if let Some(&n) = children.get(neighbor_idx) {
                    return Some(n);
                }
            }
            current = parent;
            if current == self.root {
                return None;
            }
        }
    }

    /// The pane adjacent to the active leaf in `dir`, without moving focus.
    /// Used by interactive keyboard-resize to find the shrinker before
    /// committing to a navigation (spec.md §4.1 "interactive resize by key").
    pub fn neighbor_pane(&self, dir: Direction) -> Option<PaneHandle> {
        let branch = self.neighbor_branch(dir)?;
        match self.node(self.first_leaf(branch)) {
            Node::Leaf(p) => Some(*p),
            Node::Split { .. } => unreachable!(),
        }
    }

    /// `move_active(dir)`: descends into the neighbor branch's first leaf,
    /// with no wrapping.
    pub fn move_active(&mut self, dir: Direction) -> bool {
        let Some(branch) = self.neighbor_branch(dir) else { return false };
        self.active_leaf = self.first_leaf(branch);
        true
    }

    /// `swap_active(dir)`: swaps the active leaf's pane with the neighbor
    /// leaf's pane, preserving tree structure and ratios. Returns the swapped
    /// pane pair.
    pub fn swap_active(&mut self, dir: Direction) -> Option<(PaneHandle, PaneHandle)> {
        let branch = self.neighbor_branch(dir)?;
        let neighbor_leaf = self.first_leaf(branch);
        let active = self.active_pane();
        let neighbor_pane = match self.node(neighbor_leaf) {
            Node::Leaf(p) => *p,
            Node::Split { .. } => unreachable!(),
        };
        *self.node_mut(self.active_leaf) = Node::Leaf(neighbor_pane);
        *self.node_mut(neighbor_leaf) = Node::Leaf(active);
        Some((active, neighbor_pane))
    }

    /// Adjusts the ratio between two adjacent children of the same split by
    /// `delta` (positive grows `grower`, shrinks `shrinker`), clamped so
    /// neither drops below [`MIN_RATIO`]. Returns `false` if the pair isn't
    /// adjacent siblings under a common split, or if the clamp leaves no room
    /// to move.
    pub fn adjust_ratio(&mut self, grower: PaneHandle, shrinker: PaneHandle, delta: f64) -> bool {
        let Some(grower_leaf) = self.find_leaf(grower) else { return false };
        let Some(shrinker_leaf) = self.find_leaf(shrinker) else { return false };
        let Some(parent) = self.find_parent(self.root, grower_leaf) else { return false };
        if self.find_parent(self.root, shrinker_leaf) != Some(parent) {
            return false;
        }
        let Node::Split { children, ratios, .. } = self.node_mut(parent) else { return false };
        let Some(gi) = children.iter().position(|c| *c == grower_leaf) else { return false };
        let Some(si) = children.iter().position(|c| *c == shrinker_leaf) else { return false };
        let applied = delta.min(ratios[si] - MIN_RATIO).max(-(ratios[gi] - MIN_RATIO));
        if applied.abs() < f64::EPSILON {
            return false;
        }
        ratios[gi] += applied;
        ratios[si] -= applied;
        true
    }

    /// Assigns each leaf a rectangle within `area`, splitting each split
    /// node's area along its axis using floor-based integer division so
    /// children's widths sum exactly to the parent's (any remainder goes to
    /// the last child).
    pub fn compute_rects(&self, area: Rect) -> Vec<(PaneHandle, Rect)> {
        let mut out = Vec::new();
        self.compute_rects_from(self.root, area, &mut out);
        out
    }

    fn compute_rects_from(&self, at: NodeHandle, area: Rect, out: &mut Vec<(PaneHandle, Rect)>) {
        match self.node(at) {
            Node::Leaf(p) => out.push((*p, area)),
            Node::Split { axis, children, ratios } => {
                let children = children.clone();
                let ratios = ratios.clone();
                // Vertical splits divide width (side-by-side); horizontal
                // splits divide height (stacked) — spec.md §4.1 "Resize".
                let total = match axis {
                    Axis::Vertical => area.width,
                    Axis::Horizontal => area.height,
                } as i64;
                let mut sizes: Vec<i64> = ratios.iter().map(|r| (r * total as f64).floor() as i64).collect();
                let used: i64 = sizes.iter().sum();
                if let Some(last) = sizes.last_mut() {
                    *last += total - used;
                }
                let mut offset: i64 = 0;
                for (child, size) in children.into_iter().zip(sizes) {
                    let size = size.max(0) as u16;
                    let child_rect = match axis {
                        Axis::Vertical => Rect {
                            x: area.x + offset as u16,
                            y: area.y,
                            width: size,
                            height: area.height,
                        },
                        Axis::Horizontal => Rect {
                            x: area.x,
                            y: area.y + offset as u16,
                            width: area.width,
                            height: size,
                        },
                    };
                    self.compute_rects_from(child, child_rect, out);
                    offset += size as i64;
                }
            }
        }
    }

    /// Finds the pane whose rect (per `compute_rects` over `area`) contains
    /// `(x, y)`.
    pub fn pane_at(&self, area: Rect, x: u16, y: u16) -> Option<PaneHandle> {
        self.compute_rects(area)
            .into_iter()
            .find(|(_, r)| x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height)
            .map(|(p, _)| p)
    }
}

fn ratios_are_equal(ratios: &[f64]) -> bool {
    let Some(first) = ratios.first() else { return true };
    ratios.iter().all(|r| (r - first).abs() < 1e-3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ph(i: usize) -> PaneHandle {
        PaneHandle(i)
    }

    const AREA: Rect = Rect { x: 0, y: 0, width: 120, height: 40 };

    #[test]
    fn single_pane_fills_area() {
        let tree = Tree::single(ph(0));
        let rects = tree.compute_rects(AREA);
        assert_eq!(rects, vec![(ph(0), AREA)]);
    }

    #[test]
    fn split_vertical_twice_yields_three_pane_group_equal_ratios() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.split_active(Axis::Vertical, ph(2), AREA).unwrap();
        let Node::Split { axis, children, ratios } = tree.node(tree.root()) else {
            panic!("expected split")
        };
        assert_eq!(*axis, Axis::Vertical);
        assert_eq!(children.len(), 3);
        for r in ratios {
            assert!((r - 1.0 / 3.0).abs() < 1e-3);
        }
        assert_eq!(tree.active_pane(), ph(2));
    }

    #[test]
    fn close_middle_of_three_pane_group_redistributes_ratios() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.split_active(Axis::Vertical, ph(2), AREA).unwrap();
        tree.set_active_pane(ph(1));
        let closed = tree.close_active_leaf().unwrap();
        assert_eq!(closed, ph(1));
        let Node::Split { children, ratios, .. } = tree.node(tree.root()) else {
            panic!("expected split")
        };
        assert_eq!(children.len(), 2);
        assert!((ratios[0] - 0.5).abs() < 1e-3);
        assert!((ratios[1] - 0.5).abs() < 1e-3);
        // spec.md §8 scenario 2: active leaf lands on index 0 (clamped).
        assert_eq!(tree.active_pane(), ph(0));
    }

    #[test]
    fn close_leaves_two_child_split_collapsed_to_single_leaf() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.close_active_leaf().unwrap();
        assert!(matches!(tree.node(tree.root()), Node::Leaf(p) if *p == ph(0)));
        assert_eq!(tree.active_pane(), ph(0));
    }

    #[test]
    fn move_active_is_reversible_in_non_splitting_tree() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.set_active_pane(ph(0));
        assert!(tree.move_active(Direction::Right));
        assert_eq!(tree.active_pane(), ph(1));
        assert!(tree.move_active(Direction::Left));
        assert_eq!(tree.active_pane(), ph(0));
    }

    #[test]
    fn move_active_does_not_wrap() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.set_active_pane(ph(1));
        assert!(!tree.move_active(Direction::Right));
        assert_eq!(tree.active_pane(), ph(1));
    }

    #[test]
    fn swap_active_exchanges_panes_not_nodes() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.set_active_pane(ph(0));
        let swapped = tree.swap_active(Direction::Right).unwrap();
        assert_eq!(swapped, (ph(0), ph(1)));
        let rects = tree.compute_rects(AREA);
        // ph(1) now occupies the left slot, ph(0) the right.
        assert_eq!(rects[0].0, ph(1));
        assert_eq!(rects[1].0, ph(0));
    }

    #[test]
    fn split_rejected_below_minimum_pane_width() {
        let mut tree = Tree::single(ph(0));
        let tiny = Rect { x: 0, y: 0, width: 30, height: 40 };
        assert!(tree.split_active(Axis::Vertical, ph(1), tiny).is_err());
    }

    #[test]
    fn mouse_drag_on_border_shifts_ratios_while_summing_to_one() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        assert!(tree.adjust_ratio(ph(0), ph(1), 4.0 / AREA.width as f64));
        let Node::Split { ratios, .. } = tree.node(tree.root()) else { panic!("expected split") };
        assert!(ratios[0] > 0.5);
        assert!(ratios[1] < 0.5);
        let sum: f64 = ratios.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn adjust_ratio_respects_min_ratio_floor() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        let moved = tree.adjust_ratio(ph(0), ph(1), 10.0);
        assert!(moved);
        let Node::Split { ratios, .. } = tree.node(tree.root()) else { panic!("expected split") };
        assert!((ratios[1] - MIN_RATIO).abs() < 1e-9);
        assert!((ratios[0] - (1.0 - MIN_RATIO)).abs() < 1e-9);
    }

    #[test]
    fn pane_at_resolves_point_to_correct_leaf() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        assert_eq!(tree.pane_at(AREA, 10, 5), Some(ph(0)));
        assert_eq!(tree.pane_at(AREA, 100, 5), Some(ph(1)));
    }

    #[test]
    fn rects_exactly_partition_area_with_uneven_division() {
        let mut tree = Tree::single(ph(0));
        tree.split_active(Axis::Vertical, ph(1), AREA).unwrap();
        tree.split_active(Axis::Vertical, ph(2), AREA).unwrap();
        let odd_area = Rect { x: 0, y: 0, width: 121, height: 40 };
        let rects = tree.compute_rects(odd_area);
        let total_width: u16 = rects.iter().map(|(_, r)| r.width).sum();
        assert_eq!(total_width, odd_area.width);
    }
}
