//! Branching river trees.
//!
//! A river is a binary tree: internal nodes record flow that has already
//! been divided, leaves carry the live state (hydrograph, hinge point,
//! avulsion angle, current mouth). Splitting a leaf halves its channel
//! width and bed-load flux into two children that then avulse
//! independently.

use crate::{reduce_angle, Hydro};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use uuid::Uuid;

/// The hinge point a stream swings around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HingePoint {
    /// Grid index of the hinge
    pub i: usize,
    pub j: usize,
    /// Current angle off the hinge (rad, in (-pi, pi])
    pub angle: f64,
    /// Hard angle bounds (rad)
    pub min_angle: f64,
    pub max_angle: f64,
    /// Standard deviation of one avulsion step (rad)
    pub std_dev: f64,
}

impl HingePoint {
    pub fn new(i: usize, j: usize) -> Self {
        Self {
            i,
            j,
            angle: 0.0,
            min_angle: -PI + 1e-12,
            max_angle: PI,
            std_dev: 0.0,
        }
    }
}

/// Live state of one distributary mouth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverLeaf {
    pub id: Uuid,
    pub hydro: Hydro,
    pub hinge: HingePoint,
    /// Grid index of the current mouth
    pub mouth: (usize, usize),
    /// Opaque per-leaf data for external consumers
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub user_data: IndexMap<String, serde_json::Value>,
}

impl RiverLeaf {
    pub fn new(hydro: Hydro, hinge: HingePoint) -> Self {
        let mouth = (hinge.i, hinge.j);
        Self {
            id: Uuid::new_v4(),
            hydro,
            hinge,
            mouth,
            user_data: IndexMap::new(),
        }
    }

    pub fn angle(&self) -> f64 {
        self.hinge.angle
    }

    /// Set the angle, reduced into (-pi, pi]. An angle landing exactly on
    /// pi is nudged below it so the reduction stays stable.
    pub fn set_angle(&mut self, a: f64) {
        let mut a = a;
        if (a - PI).abs() < 1e-12 {
            a -= 1e-12;
        }
        self.hinge.angle = reduce_angle(a);
    }

    pub fn increment_angle(&mut self, da: f64) {
        self.set_angle(self.hinge.angle + da);
    }

    /// Set the angle bounds, both reduced into (-pi, pi]. Ignored if the
    /// reduced bounds cross.
    pub fn set_angle_limit(&mut self, a_min: f64, a_max: f64) {
        let mut a_max = a_max;
        if (a_max - PI).abs() < 1e-12 {
            a_max -= 1e-12;
        }
        let a_min = reduce_angle(a_min);
        let a_max = reduce_angle(a_max);
        if a_min <= a_max {
            self.hinge.min_angle = a_min;
            self.hinge.max_angle = a_max;
        }
    }

    /// Straight-line channel length from hinge to mouth (m)
    pub fn channel_length(&self, dx: f64, dy: f64) -> f64 {
        let di = (self.hinge.i as f64 - self.mouth.0 as f64) * dx;
        let dj = (self.hinge.j as f64 - self.mouth.1 as f64) * dy;
        (di * di + dj * dj).sqrt().max(f64::EPSILON)
    }
}

/// One node of the river tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiverNode {
    Leaf(Box<RiverLeaf>),
    Branch(Box<RiverNode>, Box<RiverNode>),
}

impl RiverNode {
    pub fn n_leaves(&self) -> usize {
        match self {
            RiverNode::Leaf(_) => 1,
            RiverNode::Branch(l, r) => l.n_leaves() + r.n_leaves(),
        }
    }

    pub fn n_branches(&self) -> usize {
        match self {
            RiverNode::Leaf(_) => 1,
            RiverNode::Branch(l, r) => 1 + l.n_branches() + r.n_branches(),
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a RiverLeaf>) {
        match self {
            RiverNode::Leaf(leaf) => out.push(leaf),
            RiverNode::Branch(l, r) => {
                l.collect(out);
                r.collect(out);
            }
        }
    }

    fn collect_mut<'a>(&'a mut self, out: &mut Vec<&'a mut RiverLeaf>) {
        match self {
            RiverNode::Leaf(leaf) => out.push(leaf),
            RiverNode::Branch(l, r) => {
                l.collect_mut(out);
                r.collect_mut(out);
            }
        }
    }
}

/// A rooted river with a name and a tree of distributaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct River {
    pub name: String,
    root: RiverNode,
}

impl River {
    pub fn new(name: impl Into<String>, hydro: Hydro, hinge: HingePoint) -> Self {
        Self {
            name: name.into(),
            root: RiverNode::Leaf(Box::new(RiverLeaf::new(hydro, hinge))),
        }
    }

    pub fn root(&self) -> &RiverNode {
        &self.root
    }

    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }

    pub fn n_branches(&self) -> usize {
        self.root.n_branches()
    }

    /// Leaves in left-to-right tree order
    pub fn leaves(&self) -> Vec<&RiverLeaf> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    pub fn leaves_mut(&mut self) -> Vec<&mut RiverLeaf> {
        let mut out = Vec::new();
        self.root.collect_mut(&mut out);
        out
    }

    /// Split the weakest leaf (smallest water discharge) into two
    /// children. Each child inherits half the parent's width and half
    /// its bed load, and the parent's full angle state.
    pub fn split_weakest_leaf(&mut self) {
        fn score(node: &RiverNode) -> f64 {
            match node {
                RiverNode::Leaf(leaf) => leaf.hydro.water_flux(),
                RiverNode::Branch(l, r) => score(l).min(score(r)),
            }
        }

        fn path_to_weakest(node: &RiverNode, path: &mut Vec<bool>) {
            if let RiverNode::Branch(l, r) = node {
                if score(l) <= score(r) {
                    path.push(false);
                    path_to_weakest(l, path);
                } else {
                    path.push(true);
                    path_to_weakest(r, path);
                }
            }
        }

        fn descend<'a>(node: &'a mut RiverNode, path: &[bool]) -> &'a mut RiverNode {
            match (path.split_first(), node) {
                (Some((&go_right, rest)), RiverNode::Branch(l, r)) => {
                    if go_right {
                        descend(r, rest)
                    } else {
                        descend(l, rest)
                    }
                }
                (_, node) => node,
            }
        }

        let mut path = Vec::new();
        path_to_weakest(&self.root, &mut path);
        let slot = descend(&mut self.root, &path);

        if let RiverNode::Leaf(leaf) = slot {
            let mut child = (**leaf).clone();
            child.hydro.width /= 2.0;
            child.hydro.bed_load /= 2.0;
            let mut left = child.clone();
            let mut right = child;
            left.id = Uuid::new_v4();
            right.id = Uuid::new_v4();
            *slot = RiverNode::Branch(
                Box::new(RiverNode::Leaf(Box::new(left))),
                Box::new(RiverNode::Leaf(Box::new(right))),
            );
        }
    }

    /// Total water discharge entering the tree (m^3/s). With the halving
    /// split rule every leaf carries the divided geometry, so the trunk
    /// discharge is the sum over leaves.
    pub fn water_flux(&self) -> f64 {
        self.leaves().iter().map(|l| l.hydro.water_flux()).sum()
    }

    pub fn bed_load(&self) -> f64 {
        self.leaves().iter().map(|l| l.hydro.bed_load).sum()
    }
}
