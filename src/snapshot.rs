//! Structural capture and faithful rebuild of the whole layout (spec.md
//! §4.5).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::buffer::Buffer;
use crate::pane::PaneHandle;
use crate::tree::{Axis, Node, NodeHandle, Rect, Tree};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl From<Rect> for Rectangle {
    fn from(r: Rect) -> Self {
        Self { x: r.x, y: r.y, width: r.width, height: r.height }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneSnapshot {
    pub id: [u8; 16],
    pub title: String,
    pub buffer: Buffer,
    pub rect: Rectangle,
    pub app_type: Option<String>,
    pub app_config: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNodeCapture {
    Leaf {
        pane_index: i32,
    },
    Split {
        split: SplitAxis,
        split_ratios: Vec<f64>,
        children: Vec<TreeNodeCapture>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SplitAxis {
    Horizontal,
    Vertical,
}

impl From<Axis> for SplitAxis {
    fn from(a: Axis) -> Self {
        match a {
            Axis::Horizontal => SplitAxis::Horizontal,
            Axis::Vertical => SplitAxis::Vertical,
        }
    }
}

impl From<SplitAxis> for Axis {
    fn from(a: SplitAxis) -> Self {
        match a {
            SplitAxis::Horizontal => Axis::Horizontal,
            SplitAxis::Vertical => Axis::Vertical,
        }
    }
}

/// The whole desktop, captured: every pane (shared across workspaces, each
/// assigned a fresh index), each workspace's tree structure, and which leaf
/// was active in each (spec.md §4.5, §8 round-trip property: "structure,
/// ratios, active leaf, and pane ids all match the original").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeCapture {
    pub panes: Vec<PaneSnapshot>,
    pub workspace_roots: HashMap<i32, TreeNodeCapture>,
    pub workspace_active_leaf: HashMap<i32, i32>,
    pub active_workspace_id: i32,
}

/// Serializes `tree`'s structure into a [`TreeNodeCapture`], appending each
/// leaf's pane snapshot (built by `snapshot_pane`) into `panes`, recording
/// its index, and noting which pane handle got which index in
/// `pane_indices` so the caller can look up the active leaf's index
/// afterward.
pub fn capture_node<F>(
    tree: &Tree,
    at: NodeHandle,
    panes: &mut Vec<PaneSnapshot>,
    pane_indices: &mut HashMap<PaneHandle, i32>,
    snapshot_pane: &mut F,
) -> TreeNodeCapture
where
    F: FnMut(PaneHandle) -> PaneSnapshot,
{
    match tree.node(at) {
        Node::Leaf(pane) => {
            let pane = *pane;
            let idx = panes.len() as i32;
            pane_indices.insert(pane, idx);
            panes.push(snapshot_pane(pane));
            TreeNodeCapture::Leaf { pane_index: idx }
        }
        Node::Split { axis, children, ratios } => {
            let axis = *axis;
            let ratios = ratios.clone();
            let children: Vec<_> = children
                .clone()
                .into_iter()
                .map(|c| capture_node(tree, c, panes, pane_indices, snapshot_pane))
                .collect();
            TreeNodeCapture::Split {
                split: axis.into(),
                split_ratios: ratios,
                children,
            }
        }
    }
}

/// Captures a single workspace's tree, appending its panes into the shared
/// `panes` vector and returning both the structure and the pane index of
/// its active leaf (-1 if the active pane was somehow never visited, which
/// cannot happen for a well-formed tree but is handled the same way a
/// missing index is on restore).
pub fn capture_workspace<F>(tree: &Tree, panes: &mut Vec<PaneSnapshot>, snapshot_pane: &mut F) -> (TreeNodeCapture, i32)
where
    F: FnMut(PaneHandle) -> PaneSnapshot,
{
    let mut pane_indices = HashMap::new();
    let capture = capture_node(tree, tree.root(), panes, &mut pane_indices, snapshot_pane);
    let active_index = pane_indices.get(&tree.active_pane()).copied().unwrap_or(-1);
    (capture, active_index)
}

/// Rebuilds a [`Tree`] directly from a [`TreeNodeCapture`], preserving its
/// ratios and nested structure exactly (spec.md §4.5, §8 round-trip
/// property) rather than replaying the capture through repeated
/// `split_active` calls. `resolve` maps a captured `pane_index` to a
/// concrete [`PaneHandle`] in whatever arena the caller is building (and is
/// responsible for substituting a "missing pane" placeholder handle for an
/// out-of-range index — spec.md §4.5 restore step 2 / `Error::RestoreMismatch`).
/// The active leaf is restored by `active_leaf_pane_index`, falling back to
/// the tree's first leaf if that index was never visited.
pub fn rebuild_tree<F>(capture: &TreeNodeCapture, active_leaf_pane_index: i32, resolve: &mut F) -> Tree
where
    F: FnMut(i32) -> PaneHandle,
{
    let mut nodes = Vec::new();
    let mut index_map: HashMap<i32, PaneHandle> = HashMap::new();
    let root = build_arena(capture, resolve, &mut nodes, &mut index_map);
    let active_pane = index_map
        .get(&active_leaf_pane_index)
        .copied()
        .unwrap_or(PaneHandle(usize::MAX));
    Tree::from_arena(nodes, root, active_pane)
}

/// Recursively builds a flattened node arena bottom-up, recursing into
/// every child of a `Split` capture (not just the first) so nested trees
/// round-trip with every leaf intact (spec.md §8 property 5).
fn build_arena<F>(capture: &TreeNodeCapture, resolve: &mut F, nodes: &mut Vec<Node>, index_map: &mut HashMap<i32, PaneHandle>) -> NodeHandle
where
    F: FnMut(i32) -> PaneHandle,
{
    match capture {
        TreeNodeCapture::Leaf { pane_index } => {
            let pane = resolve(*pane_index);
            index_map.insert(*pane_index, pane);
            nodes.push(Node::Leaf(pane));
            NodeHandle(nodes.len() - 1)
        }
        TreeNodeCapture::Split { split, split_ratios, children } => {
            let axis: Axis = (*split).into();
            let child_handles: Vec<_> = children.iter().map(|c| build_arena(c, resolve, nodes, index_map)).collect();
            nodes.push(Node::Split {
                axis,
                children: child_handles,
                ratios: split_ratios.clone(),
            });
            NodeHandle(nodes.len() - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(p: PaneHandle) -> PaneSnapshot {
        PaneSnapshot {
            id: [0; 16],
            title: format!("{p:?}"),
            buffer: Buffer::blank(1, 1),
            rect: Rectangle { x: 0, y: 0, width: 1, height: 1 },
            app_type: None,
            app_config: None,
        }
    }

    #[test]
    fn capture_and_rebuild_round_trips_leaf_count() {
        let mut tree = Tree::single(PaneHandle(0));
        tree.split_active(Axis::Vertical, PaneHandle(1), Rect { x: 0, y: 0, width: 100, height: 30 })
            .unwrap();
        let mut panes = Vec::new();
        let (capture, active_idx) = capture_workspace(&tree, &mut panes, &mut |p| snap(p));
        assert_eq!(panes.len(), 2);
        let resolved = [PaneHandle(10), PaneHandle(11)];
        let rebuilt = rebuild_tree(&capture, active_idx, &mut |i| resolved.get(i as usize).copied().unwrap_or(PaneHandle(999)));
        assert_eq!(rebuilt.panes().len(), 2);
    }

    #[test]
    fn rebuild_preserves_ratios_after_a_resize_drag() {
        let area = Rect { x: 0, y: 0, width: 120, height: 40 };
        let mut tree = Tree::single(PaneHandle(0));
        tree.split_active(Axis::Vertical, PaneHandle(1), area).unwrap();
        assert!(tree.adjust_ratio(PaneHandle(0), PaneHandle(1), 0.1));

        let mut panes = Vec::new();
        let (capture, active_idx) = capture_workspace(&tree, &mut panes, &mut |p| snap(p));
        let resolved = [PaneHandle(0), PaneHandle(1)];
        let rebuilt = rebuild_tree(&capture, active_idx, &mut |i| resolved.get(i as usize).copied().unwrap_or(PaneHandle(999)));

        let Node::Split { ratios, .. } = rebuilt.node(rebuilt.root()) else {
            panic!("expected split")
        };
        assert!((ratios[0] - 0.6).abs() < 1e-6);
        assert!((ratios[1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn rebuild_preserves_every_leaf_in_a_nested_tree() {
        let area = Rect { x: 0, y: 0, width: 120, height: 40 };
        let mut tree = Tree::single(PaneHandle(0));
        tree.split_active(Axis::Vertical, PaneHandle(1), area).unwrap();
        tree.set_active_pane(PaneHandle(1));
        tree.split_active(Axis::Horizontal, PaneHandle(2), area).unwrap();
        tree.set_active_pane(PaneHandle(2));
        tree.split_active(Axis::Horizontal, PaneHandle(3), area).unwrap();

        let mut panes = Vec::new();
        let (capture, active_idx) = capture_workspace(&tree, &mut panes, &mut |p| snap(p));
        assert_eq!(panes.len(), 4);
        let resolved: Vec<_> = (0..4).map(PaneHandle).collect();
        let rebuilt = rebuild_tree(&capture, active_idx, &mut |i| resolved.get(i as usize).copied().unwrap_or(PaneHandle(999)));

        let mut original: Vec<_> = tree.panes();
        let mut restored: Vec<_> = rebuilt.panes();
        original.sort();
        restored.sort();
        assert_eq!(original, restored);
        assert_eq!(rebuilt.active_pane(), PaneHandle(3));
    }

    #[test]
    fn rebuild_substitutes_missing_pane_for_out_of_range_index() {
        let capture = TreeNodeCapture::Leaf { pane_index: 7 };
        let rebuilt = rebuild_tree(&capture, 0, &mut |i| if i == 7 { PaneHandle(usize::MAX) } else { PaneHandle(0) });
        assert_eq!(rebuilt.panes(), vec![PaneHandle(usize::MAX)]);
    }
}
