use indexmap::IndexSet;
use slotmap::{SlotMap, new_key_type};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::utils::id::JobId;
use crate::domain::workflow::job::Job;
use crate::error::{Error, Result};

new_key_type! {
    pub struct NodeKey;
}

/// Depth of a node that has not been annotated yet.
pub const UNSET_DEPTH: i32 = -1;

/// A job in the workflow graph together with its adjacency.
///
/// Edges are only changed through [`Graph`], which keeps `parents` and
/// `children` of both endpoints in sync.
#[derive(Debug, Clone)]
pub struct Node {
    pub job: Job,
    depth: i32,
    parents: IndexSet<NodeKey>,
    children: IndexSet<NodeKey>,
}

impl Node {
    pub fn id(&self) -> &JobId {
        &self.job.id
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn parents(&self) -> &IndexSet<NodeKey> {
        &self.parents
    }

    pub fn children(&self) -> &IndexSet<NodeKey> {
        &self.children
    }
}

/// Directed acyclic graph of jobs.
///
/// Nodes live in a slot map arena; iteration follows insertion order as long
/// as no node is removed, which the refinement never does.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage.
    nodes: SlotMap<NodeKey, Node>,

    /// Index lookup NodeKey using the job id.
    name_index: HashMap<JobId, NodeKey>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key(), name_index: HashMap::new() }
    }

    /// Adds a job without any edges.
    ///
    /// # Returns
    /// Returns the NodeKey of the new node, or an error if a job with the same id exists.
    pub fn add_node(&mut self, job: Job) -> Result<NodeKey> {
        if self.name_index.contains_key(&job.id) {
            return Err(Error::ModelConstructionError(format!("Job id {} is used more than once", job.id)));
        }

        let id = job.id.clone();
        let key = self.nodes.insert(Node { job, depth: UNSET_DEPTH, parents: IndexSet::new(), children: IndexSet::new() });
        self.name_index.insert(id, key);

        Ok(key)
    }

    /// Adds the edge `parent -> child`. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        if parent == child {
            return Err(Error::ModelConstructionError(format!("Job {} cannot depend on itself", self.describe(parent))));
        }
        if !self.nodes.contains_key(child) {
            return Err(Error::UnknownNode(format!("{:?}", child)));
        }

        let parent_node = self.nodes.get_mut(parent).ok_or_else(|| Error::UnknownNode(format!("{:?}", parent)))?;
        parent_node.children.insert(child);
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parents.insert(parent);
        }

        Ok(())
    }

    /// Removes the edge `parent -> child`.
    ///
    /// # Returns
    /// Returns true if the edge existed.
    pub fn remove_edge(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        let removed = self.nodes.get_mut(parent).is_some_and(|node| node.children.shift_remove(&child));
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parents.shift_remove(&parent);
        }
        removed
    }

    pub fn has_edge(&self, parent: NodeKey, child: NodeKey) -> bool {
        self.nodes.get(parent).is_some_and(|node| node.children.contains(&child))
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn job(&self, key: NodeKey) -> Option<&Job> {
        self.nodes.get(key).map(|node| &node.job)
    }

    pub fn job_mut(&mut self, key: NodeKey) -> Option<&mut Job> {
        self.nodes.get_mut(key).map(|node| &mut node.job)
    }

    pub fn key_of(&self, id: &JobId) -> Option<NodeKey> {
        self.name_index.get(id).copied()
    }

    /// Get a node by its job id.
    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.key_of(&JobId::new(id)).and_then(|key| self.nodes.get(key))
    }

    pub fn parents(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.get(key).into_iter().flat_map(|node| node.parents.iter().copied())
    }

    pub fn children(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.get(key).into_iter().flat_map(|node| node.children.iter().copied())
    }

    pub fn set_depth(&mut self, key: NodeKey, depth: i32) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.depth = depth;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.children.len()).sum()
    }

    /// Nodes without parents, in insertion order.
    pub fn roots(&self) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, node)| node.parents.is_empty()).map(|(key, _)| key).collect()
    }

    /// Nodes without children, in insertion order.
    pub fn leaves(&self) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, node)| node.children.is_empty()).map(|(key, _)| key).collect()
    }

    /// Kahn's algorithm.
    ///
    /// # Returns
    /// Returns every node in topological order, or `Error::CycleDetected`
    /// naming the jobs that could not be ordered.
    pub fn topological_order(&self) -> Result<Vec<NodeKey>> {
        let mut in_degree: HashMap<NodeKey, usize> = self.nodes.iter().map(|(key, node)| (key, node.parents.len())).collect();
        let mut queue: VecDeque<NodeKey> = self.roots().into();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(key) = queue.pop_front() {
            order.push(key);
            for child in self.children(key) {
                if let Some(count) = in_degree.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let ordered: HashSet<NodeKey> = order.into_iter().collect();
            let jobs = self.nodes.iter().filter(|(key, _)| !ordered.contains(key)).map(|(_, node)| node.job.id.id.clone()).collect();
            return Err(Error::CycleDetected { jobs });
        }

        Ok(order)
    }

    /// Returns true if `ancestor` reaches `descendant` through one or more edges.
    pub fn is_ancestor(&self, ancestor: NodeKey, descendant: NodeKey) -> bool {
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut queue: VecDeque<NodeKey> = self.parents(descendant).collect();

        while let Some(key) = queue.pop_front() {
            if key == ancestor {
                return true;
            }
            if visited.insert(key) {
                queue.extend(self.parents(key));
            }
        }
        false
    }

    /// Job id for log and error messages.
    pub fn describe(&self, key: NodeKey) -> String {
        match self.nodes.get(key) {
            Some(node) => node.job.id.id.clone(),
            None => format!("{:?}", key),
        }
    }
}
