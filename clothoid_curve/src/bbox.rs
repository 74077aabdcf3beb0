//! Axis aligned bounding box tree over the sub-arcs of one clothoid

use serde::{Deserialize, Serialize};

use crate::clothoid::Clothoid;
use crate::Float;

/// most heading a leaf may turn through
pub const LEAF_MAX_SWEEP: Float = 0.1;
/// leaves are at most this fraction of the whole arc
pub const LEAF_LENGTH_FRACTION: Float = 1.0 / 8.0;
/// no subdivision below this depth
const MAX_DEPTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: Float,
    pub y_min: Float,
    pub x_max: Float,
    pub y_max: Float,
}

impl BBox {
    pub fn from_points(points: &[(Float, Float)]) -> Self {
        let mut bbox = Self {
            x_min: Float::INFINITY,
            y_min: Float::INFINITY,
            x_max: Float::NEG_INFINITY,
            y_max: Float::NEG_INFINITY,
        };
        for &(x, y) in points {
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }
        bbox
    }

    pub fn inflate(&self, margin: Float) -> Self {
        Self {
            x_min: self.x_min - margin,
            y_min: self.y_min - margin,
            x_max: self.x_max + margin,
            y_max: self.y_max + margin,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.x_min <= other.x_max
            && other.x_min <= self.x_max
            && self.y_min <= other.y_max
            && other.y_min <= self.y_max
    }

    pub fn contains(&self, x: Float, y: Float) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    fn extent(&self) -> Float {
        (self.x_max - self.x_min).max(self.y_max - self.y_min)
    }
}

/// the sub-arc [s0, s1] and its box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leaf {
    pub s0: Float,
    pub s1: Float,
    pub bbox: BBox,
}

impl Leaf {
    pub fn length(&self) -> Float {
        self.s1 - self.s0
    }

    pub fn mid(&self) -> Float {
        0.5 * (self.s0 + self.s1)
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { bbox: BBox, leaf: usize },
    Inner { bbox: BBox, left: usize, right: usize },
}

impl Node {
    fn bbox(&self) -> &BBox {
        match self {
            Node::Leaf { bbox, .. } | Node::Inner { bbox, .. } => bbox,
        }
    }
}

/// Boxes over an adaptive subdivision of a clothoid, every leaf turning at most
/// LEAF_MAX_SWEEP and no longer than LEAF_LENGTH_FRACTION of the arc
#[derive(Debug, Clone)]
pub struct AabbTree {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
    root: usize,
}

/// total heading swept over [s0, s1], counting both sides of a curvature sign change
fn sweep(clothoid: &Clothoid, s0: Float, s1: Float) -> Float {
    let k0 = clothoid.kappa(s0);
    let k1 = clothoid.kappa(s1);
    if k0 * k1 < 0.0 {
        let sz = s0 - k0 / clothoid.dk();
        (clothoid.theta(sz) - clothoid.theta(s0)).abs()
            + (clothoid.theta(s1) - clothoid.theta(sz)).abs()
    } else {
        (clothoid.theta(s1) - clothoid.theta(s0)).abs()
    }
}

impl AabbTree {
    pub fn build(clothoid: &Clothoid) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            root: 0,
        };
        let max_leaf_length = clothoid.length() * LEAF_LENGTH_FRACTION;
        tree.root = tree.split(clothoid, 0.0, clothoid.length(), max_leaf_length, 0);
        tree
    }

    fn split(
        &mut self,
        clothoid: &Clothoid,
        s0: Float,
        s1: Float,
        max_leaf_length: Float,
        depth: usize,
    ) -> usize {
        let h = s1 - s0;
        let small = sweep(clothoid, s0, s1) <= LEAF_MAX_SWEEP && h <= max_leaf_length;
        let node = if small || depth >= MAX_DEPTH {
            let (x0, y0) = clothoid.eval(s0);
            let (x1, y1) = clothoid.eval(s1);
            let chord_box = BBox::from_points(&[(x0, y0), (x1, y1)]);
            // sagitta bound plus room for rounding
            let k = clothoid.max_abs_kappa(s0, s1);
            let scale = chord_box.extent().max(x0.abs()).max(y0.abs()).max(1.0);
            let bbox = chord_box.inflate(k * h * h / 4.0 + 1e-12 * scale);
            self.leaves.push(Leaf { s0, s1, bbox });
            Node::Leaf {
                bbox,
                leaf: self.leaves.len() - 1,
            }
        } else {
            let sm = 0.5 * (s0 + s1);
            let left = self.split(clothoid, s0, sm, max_leaf_length, depth + 1);
            let right = self.split(clothoid, sm, s1, max_leaf_length, depth + 1);
            Node::Inner {
                bbox: self.nodes[left].bbox().union(self.nodes[right].bbox()),
                left,
                right,
            }
        };
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// leaves in arc length order
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn bbox(&self) -> &BBox {
        self.nodes[self.root].bbox()
    }

    /// Index pairs (into self.leaves(), other.leaves()) of leaves whose boxes overlap,
    /// found by descending both trees together
    pub fn overlapping_leaves(&self, other: &AabbTree) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        let mut stack = vec![(self.root, other.root)];
        while let Some((a, b)) = stack.pop() {
            let node_a = &self.nodes[a];
            let node_b = &other.nodes[b];
            if !node_a.bbox().overlaps(node_b.bbox()) {
                continue;
            }
            let split_self = match (node_a, node_b) {
                (Node::Leaf { leaf: la, .. }, Node::Leaf { leaf: lb, .. }) => {
                    pairs.push((*la, *lb));
                    continue;
                }
                (Node::Inner { .. }, Node::Leaf { .. }) => true,
                (Node::Leaf { .. }, Node::Inner { .. }) => false,
                // descend the bigger box first
                (Node::Inner { bbox, .. }, Node::Inner { bbox: bbox_b, .. }) => {
                    bbox.extent() >= bbox_b.extent()
                }
            };
            match (split_self, node_a, node_b) {
                (true, Node::Inner { left, right, .. }, _) => {
                    stack.push((*left, b));
                    stack.push((*right, b));
                }
                (false, _, Node::Inner { left, right, .. }) => {
                    stack.push((a, *left));
                    stack.push((a, *right));
                }
                _ => {}
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_cover_the_arc() {
        let c = Clothoid::new(0.0, 0.0, 0.2, -1.0, 0.6, 7.0).unwrap();
        let tree = AabbTree::build(&c);
        let leaves = tree.leaves();
        assert!(leaves.len() >= 8);
        assert_eq!(leaves[0].s0, 0.0);
        assert_eq!(leaves[leaves.len() - 1].s1, 7.0);
        for pair in leaves.windows(2) {
            assert_eq!(pair[0].s1, pair[1].s0);
        }
        for leaf in leaves {
            assert!(leaf.length() <= 7.0 / 8.0);
            assert!(sweep(&c, leaf.s0, leaf.s1) <= LEAF_MAX_SWEEP);
        }
    }

    #[test]
    fn boxes_contain_the_curve() {
        let c = Clothoid::new(1.0, -2.0, 1.0, 2.0, -0.9, 5.0).unwrap();
        let tree = AabbTree::build(&c);
        for leaf in tree.leaves() {
            for i in 0..=50 {
                let s = leaf.s0 + leaf.length() * i as Float / 50.0;
                let (x, y) = c.eval(s);
                assert!(leaf.bbox.contains(x, y), "{s} ({x}, {y}) outside {:?}", leaf.bbox);
                assert!(tree.bbox().contains(x, y));
            }
        }
    }

    #[test]
    fn straight_line_tree() {
        let c = Clothoid::new(0.0, 0.0, 0.0, 0.0, 0.0, 8.0).unwrap();
        let tree = AabbTree::build(&c);
        assert_eq!(tree.leaves().len(), 8);
        let b = tree.bbox();
        assert!(b.y_max - b.y_min < 1e-9);
        assert!(b.contains(4.0, 0.0));
    }

    #[test]
    fn overlap_pairs() {
        let a = Clothoid::new(0.0, -1.0, core::f64::consts::FRAC_PI_2, 0.0, 0.0, 2.0).unwrap();
        let b = Clothoid::new(-1.0, 0.0, 0.0, 0.0, 0.0, 2.0).unwrap();
        let ta = AabbTree::build(&a);
        let tb = AabbTree::build(&b);
        let pairs = ta.overlapping_leaves(&tb);
        assert!(!pairs.is_empty());
        // the crossing at the origin is the middle of both segments
        for (i, j) in &pairs {
            let la = ta.leaves()[*i];
            let lb = tb.leaves()[*j];
            assert!(la.s0 <= 1.0 + 1e-9 && la.s1 >= 1.0 - 1e-9);
            assert!(lb.s0 <= 1.0 + 1e-9 && lb.s1 >= 1.0 - 1e-9);
        }

        let far = Clothoid::new(10.0, 10.0, 0.0, 0.0, 0.0, 1.0).unwrap();
        assert!(ta.overlapping_leaves(&AabbTree::build(&far)).is_empty());

        let mut b = BBox::from_points(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(b.overlaps(&BBox::from_points(&[(1.0, 1.0), (2.0, 2.0)])));
        b = b.inflate(-0.1);
        assert!(!b.overlaps(&BBox::from_points(&[(1.0, 1.0), (2.0, 2.0)])));
    }
}
