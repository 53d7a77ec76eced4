//! # Joint hierarchy
//!
//! A [`JointHierarchy`] is a rooted tree over markers: each [`Joint`] maps a parent marker to
//! an ordered list of child markers. The root is always given explicitly, it is never inferred
//! from declaration order.
//!
//! [`JointHierarchy::check_tree`] guarantees that:
//!
//! * a parent is declared at most once,
//! * the root is never a child and every other marker has at most one parent,
//! * every declared parent is reachable from the root.
//!
//! Together these make the hierarchy an acyclic tree connected to its root, so that
//! [`JointHierarchy::bfs_edges`] visits every parent before its children and reaches every
//! child through exactly one bone.
//! [`AnatomicalStructureBuilder::with_joint_hierarchy`](crate::anatomical_structure::AnatomicalStructureBuilder::with_joint_hierarchy)
//! also checks that every name is a known marker, and
//! [`RigidBoneEngine::new`](crate::biomechanics::RigidBoneEngine::new) refuses a hierarchy
//! that is not a tree.
use std::collections::{HashSet, VecDeque};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::bonefit_errors::BonefitError;
use crate::constants::MarkerName;

/// A parent marker and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joint {
    pub parent: MarkerName,
    pub children: Vec<MarkerName>,
}

/// Rooted tree of parent → children marker relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointHierarchy {
    root: MarkerName,
    #[serde(default)]
    joints: Vec<Joint>,
}

impl JointHierarchy {
    /// Start a hierarchy rooted at `root`, without any joint.
    pub fn new(root: impl Into<MarkerName>) -> Self {
        JointHierarchy {
            root: root.into(),
            joints: Vec::new(),
        }
    }

    /// Append a joint declaring the ordered `children` of `parent`.
    pub fn joint<P, I, C>(mut self, parent: P, children: I) -> Self
    where
        P: Into<MarkerName>,
        I: IntoIterator<Item = C>,
        C: Into<MarkerName>,
    {
        self.joints.push(Joint {
            parent: parent.into(),
            children: children.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Children of `parent`, empty when `parent` is a leaf or unknown.
    pub fn children(&self, parent: &str) -> &[MarkerName] {
        self.joints
            .iter()
            .find(|joint| joint.parent == parent)
            .map(|joint| joint.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of (parent, child) bones declared.
    pub fn num_edges(&self) -> usize {
        self.joints.iter().map(|joint| joint.children.len()).sum()
    }

    /// `true` when no bone is declared.
    pub fn is_empty(&self) -> bool {
        self.num_edges() == 0
    }

    /// Every (parent, child) pair, in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.joints.iter().flat_map(|joint| {
            joint
                .children
                .iter()
                .map(move |child| (joint.parent.as_str(), child.as_str()))
        })
    }

    /// Every (parent, child) pair in breadth-first order from the root.
    ///
    /// A parent is always emitted before any edge that starts at one of its descendants.
    /// Markers that cannot be reached from the root are not visited. Each marker is reached
    /// once: on a hierarchy that is not a tree, an edge into an already visited marker (a
    /// second parent, a cycle back to an ancestor) is left out.
    pub fn bfs_edges(&self) -> Vec<(&str, &str)> {
        let mut edges = Vec::with_capacity(self.num_edges());
        let mut visited: HashSet<&str, RandomState> = HashSet::default();
        visited.insert(self.root.as_str());
        let mut queue = VecDeque::from([self.root.as_str()]);

        while let Some(parent) = queue.pop_front() {
            for child in self.children(parent) {
                if visited.insert(child.as_str()) {
                    edges.push((parent, child.as_str()));
                    queue.push_back(child.as_str());
                }
            }
        }
        edges
    }

    /// Check that every name of the hierarchy belongs to `valid_markers`, then that the
    /// hierarchy is a tree (see [`JointHierarchy::check_tree`]).
    pub(crate) fn validate(
        &self,
        valid_markers: &HashSet<MarkerName, RandomState>,
    ) -> Result<(), BonefitError> {
        let unknown = |marker: &str, context: String| BonefitError::UnknownMarker {
            context,
            marker: marker.to_string(),
        };

        if !valid_markers.contains(&self.root) {
            return Err(unknown(&self.root, "joint hierarchy root".into()));
        }
        for joint in &self.joints {
            if !valid_markers.contains(&joint.parent) {
                return Err(unknown(&joint.parent, "joint hierarchy".into()));
            }
            if let Some(child) = joint
                .children
                .iter()
                .find(|child| !valid_markers.contains(*child))
            {
                return Err(unknown(
                    child,
                    format!("joint hierarchy children of '{}'", joint.parent),
                ));
            }
        }

        self.check_tree()
    }

    /// Check that the hierarchy is an acyclic tree connected to its root.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::InvalidJointHierarchy)` if a parent is declared twice, the root is
    ///   declared as a child, a marker has two parents, or a parent cannot be reached from the
    ///   root.
    pub fn check_tree(&self) -> Result<(), BonefitError> {
        let mut parents: HashSet<&str, RandomState> = HashSet::default();
        let mut children: HashSet<&str, RandomState> = HashSet::default();

        for joint in &self.joints {
            if !parents.insert(joint.parent.as_str()) {
                return Err(BonefitError::InvalidJointHierarchy(format!(
                    "parent '{}' is declared more than once",
                    joint.parent
                )));
            }

            for child in &joint.children {
                if *child == self.root {
                    return Err(BonefitError::InvalidJointHierarchy(format!(
                        "root '{}' cannot be the child of '{}'",
                        self.root, joint.parent
                    )));
                }
                if !children.insert(child.as_str()) {
                    return Err(BonefitError::InvalidJointHierarchy(format!(
                        "marker '{child}' has more than one parent"
                    )));
                }
            }
        }

        // With a single parent per marker and a parentless root, every cycle is cut off
        // from the root: reachability of all parents rules cycles out.
        let reachable: HashSet<&str, RandomState> = self
            .bfs_edges()
            .into_iter()
            .map(|(_, child)| child)
            .chain(std::iter::once(self.root.as_str()))
            .collect();

        if let Some(orphan) = self
            .joints
            .iter()
            .find(|joint| !joint.children.is_empty() && !reachable.contains(joint.parent.as_str()))
        {
            return Err(BonefitError::InvalidJointHierarchy(format!(
                "parent '{}' is not reachable from root '{}'",
                orphan.parent, self.root
            )));
        }

        Ok(())
    }
}
