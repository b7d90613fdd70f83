//! Broad-phase spatial index: a self-balancing bounding-volume tree over
//! fixture proxies, plus the pair manager that turns proxy motion into
//! candidate collision pairs.

use glam::Vec2;

use crate::{
    collision::queries::{Aabb, RayCastInput},
    config::{AABB_EXTENSION, AABB_MULTIPLIER},
    utils::math::cross,
};

/// Opaque proxy identifier. Reused from a free list after destruction.
pub type ProxyId = usize;

const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct TreeNode<T> {
    /// Fattened AABB; for internal nodes, the union of the children.
    aabb: Aabb,
    parent: usize,
    child1: usize,
    child2: usize,
    /// -1 marks a free-list entry, 0 a leaf.
    height: i32,
    user_data: Option<T>,
}

impl<T> TreeNode<T> {
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Dynamic AABB tree. Leaves are fattened so small motions need no tree
/// surgery; internal nodes keep an AVL-style balance via rotations.
pub struct DynamicTree<T: Copy> {
    nodes: Vec<TreeNode<T>>,
    root: usize,
    free_list: usize,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
        }
    }

    fn allocate_node(&mut self) -> usize {
        if self.free_list != NULL_NODE {
            let node_id = self.free_list;
            self.free_list = self.nodes[node_id].parent;
            let node = &mut self.nodes[node_id];
            node.parent = NULL_NODE;
            node.child1 = NULL_NODE;
            node.child2 = NULL_NODE;
            node.height = 0;
            node.user_data = None;
            return node_id;
        }

        self.nodes.push(TreeNode {
            aabb: Aabb::default(),
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: 0,
            user_data: None,
        });
        self.nodes.len() - 1
    }

    fn free_node(&mut self, node_id: usize) {
        let node = &mut self.nodes[node_id];
        node.parent = self.free_list;
        node.height = -1;
        node.user_data = None;
        self.free_list = node_id;
    }

    /// Inserts a proxy with a fattened copy of `aabb`.
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let proxy_id = self.allocate_node();
        self.nodes[proxy_id].aabb = aabb.extend(AABB_EXTENSION);
        self.nodes[proxy_id].user_data = Some(user_data);
        self.nodes[proxy_id].height = 0;
        self.insert_leaf(proxy_id);
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Moves a proxy. Returns `false` (and does nothing) when the new tight
    /// AABB still fits inside the stored fattened one; otherwise the proxy is
    /// reinserted with a fresh margin extended along `displacement`.
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.nodes[proxy_id].is_leaf());

        if self.nodes[proxy_id].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(proxy_id);

        let mut fat = aabb.extend(AABB_EXTENSION);
        let d = AABB_MULTIPLIER * displacement;
        if d.x < 0.0 {
            fat.min.x += d.x;
        } else {
            fat.max.x += d.x;
        }
        if d.y < 0.0 {
            fat.min.y += d.y;
        } else {
            fat.max.y += d.y;
        }

        self.nodes[proxy_id].aabb = fat;
        self.insert_leaf(proxy_id);
        true
    }

    pub fn user_data(&self, proxy_id: ProxyId) -> T {
        self.nodes[proxy_id]
            .user_data
            .expect("proxy id refers to a live leaf")
    }

    /// The stored (fattened) AABB of a proxy.
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.nodes[proxy_id].aabb
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Visits every leaf whose fat AABB overlaps `aabb`. The callback returns
    /// `false` to stop the query.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(ProxyId) -> bool) {
        let mut stack = Vec::with_capacity(64);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Ray cast through the tree. For each candidate leaf the callback
    /// returns a new maximum fraction: 0 stops the cast, a smaller fraction
    /// clips the ray, and any other value leaves it unchanged.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId) -> f32,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize_or_zero();
        if r == Vec2::ZERO {
            return;
        }

        // Perpendicular to the ray; used for the fat-AABB separation test.
        let v = Vec2::new(-r.y, r.x);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = segment_bounds(p1, p2, max_fraction);

        let mut stack = Vec::with_capacity(64);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            // Separating-axis test between the segment and the node box.
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = cross(r, p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };
                let value = callback(&sub_input, node_id);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 && value < max_fraction {
                    max_fraction = value;
                    segment_aabb = segment_bounds(p1, p2, max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling: greedy descent minimizing the enlargement
        // cost of ancestor AABBs (perimeter heuristic).
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;

            let area = self.nodes[index].aabb.perimeter();
            let combined_area = self.nodes[index].aabb.union(&leaf_aabb).perimeter();

            // Cost of making a new parent for this node and the leaf.
            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);

            let child_cost = |tree: &Self, child: usize| {
                let combined = leaf_aabb.union(&tree.nodes[child].aabb);
                if tree.nodes[child].is_leaf() {
                    combined.perimeter() + inheritance_cost
                } else {
                    let old_area = tree.nodes[child].aabb.perimeter();
                    combined.perimeter() - old_area + inheritance_cost
                }
            };

            let cost1 = child_cost(self, child1);
            let cost2 = child_cost(self, child2);

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        // Create a new parent above the sibling.
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        self.nodes[new_parent].height = self.nodes[sibling].height + 1;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent].child1 == sibling {
                self.nodes[old_parent].child1 = new_parent;
            } else {
                self.nodes[old_parent].child2 = new_parent;
            }
        } else {
            self.root = new_parent;
        }
        self.nodes[new_parent].child1 = sibling;
        self.nodes[new_parent].child2 = leaf;
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        // Walk up refitting AABBs and rebalancing.
        let mut index = self.nodes[leaf].parent;
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;
            self.nodes[index].height =
                1 + self.nodes[child1].height.max(self.nodes[child2].height);
            self.nodes[index].aabb = self.nodes[child1].aabb.union(&self.nodes[child2].aabb);

            index = self.nodes[index].parent;
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent != NULL_NODE {
            if self.nodes[grand_parent].child1 == parent {
                self.nodes[grand_parent].child1 = sibling;
            } else {
                self.nodes[grand_parent].child2 = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.free_node(parent);

            let mut index = grand_parent;
            while index != NULL_NODE {
                index = self.balance(index);

                let child1 = self.nodes[index].child1;
                let child2 = self.nodes[index].child2;
                self.nodes[index].aabb = self.nodes[child1].aabb.union(&self.nodes[child2].aabb);
                self.nodes[index].height =
                    1 + self.nodes[child1].height.max(self.nodes[child2].height);

                index = self.nodes[index].parent;
            }
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Performs a left or right rotation if subtree `a` is imbalanced.
    /// Returns the new root of the subtree.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let b = self.nodes[a].child1;
        let c = self.nodes[a].child2;
        let balance = self.nodes[c].height - self.nodes[b].height;

        // Rotate C up.
        if balance > 1 {
            let f = self.nodes[c].child1;
            let g = self.nodes[c].child2;

            self.nodes[c].child1 = a;
            self.nodes[c].parent = self.nodes[a].parent;
            self.nodes[a].parent = c;

            let c_parent = self.nodes[c].parent;
            if c_parent != NULL_NODE {
                if self.nodes[c_parent].child1 == a {
                    self.nodes[c_parent].child1 = c;
                } else {
                    self.nodes[c_parent].child2 = c;
                }
            } else {
                self.root = c;
            }

            if self.nodes[f].height > self.nodes[g].height {
                self.nodes[c].child2 = f;
                self.nodes[a].child2 = g;
                self.nodes[g].parent = a;
                self.nodes[a].aabb = self.nodes[b].aabb.union(&self.nodes[g].aabb);
                self.nodes[c].aabb = self.nodes[a].aabb.union(&self.nodes[f].aabb);
                self.nodes[a].height = 1 + self.nodes[b].height.max(self.nodes[g].height);
                self.nodes[c].height = 1 + self.nodes[a].height.max(self.nodes[f].height);
            } else {
                self.nodes[c].child2 = g;
                self.nodes[a].child2 = f;
                self.nodes[f].parent = a;
                self.nodes[a].aabb = self.nodes[b].aabb.union(&self.nodes[f].aabb);
                self.nodes[c].aabb = self.nodes[a].aabb.union(&self.nodes[g].aabb);
                self.nodes[a].height = 1 + self.nodes[b].height.max(self.nodes[f].height);
                self.nodes[c].height = 1 + self.nodes[a].height.max(self.nodes[g].height);
            }

            return c;
        }

        // Rotate B up.
        if balance < -1 {
            let d = self.nodes[b].child1;
            let e = self.nodes[b].child2;

            self.nodes[b].child1 = a;
            self.nodes[b].parent = self.nodes[a].parent;
            self.nodes[a].parent = b;

            let b_parent = self.nodes[b].parent;
            if b_parent != NULL_NODE {
                if self.nodes[b_parent].child1 == a {
                    self.nodes[b_parent].child1 = b;
                } else {
                    self.nodes[b_parent].child2 = b;
                }
            } else {
                self.root = b;
            }

            if self.nodes[d].height > self.nodes[e].height {
                self.nodes[b].child2 = d;
                self.nodes[a].child1 = e;
                self.nodes[e].parent = a;
                self.nodes[a].aabb = self.nodes[c].aabb.union(&self.nodes[e].aabb);
                self.nodes[b].aabb = self.nodes[a].aabb.union(&self.nodes[d].aabb);
                self.nodes[a].height = 1 + self.nodes[c].height.max(self.nodes[e].height);
                self.nodes[b].height = 1 + self.nodes[a].height.max(self.nodes[d].height);
            } else {
                self.nodes[b].child2 = e;
                self.nodes[a].child1 = d;
                self.nodes[d].parent = a;
                self.nodes[a].aabb = self.nodes[c].aabb.union(&self.nodes[d].aabb);
                self.nodes[b].aabb = self.nodes[a].aabb.union(&self.nodes[e].aabb);
                self.nodes[a].height = 1 + self.nodes[c].height.max(self.nodes[d].height);
                self.nodes[b].height = 1 + self.nodes[a].height.max(self.nodes[e].height);
            }

            return b;
        }

        a
    }
}

fn segment_bounds(p1: Vec2, p2: Vec2, fraction: f32) -> Aabb {
    let t = p1 + fraction * (p2 - p1);
    Aabb {
        min: p1.min(t),
        max: p1.max(t),
    }
}

/// Broad-phase driver: tracks which proxies moved since the last pass and
/// produces deduplicated candidate pairs for the contact manager.
pub struct BroadPhase<T: Copy> {
    tree: DynamicTree<T>,
    moved: Vec<ProxyId>,
    pairs: Vec<(ProxyId, ProxyId)>,
    proxy_count: usize,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            moved: Vec::new(),
            pairs: Vec::new(),
            proxy_count: 0,
        }
    }

    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let id = self.tree.create_proxy(aabb, user_data);
        self.proxy_count += 1;
        self.moved.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        self.moved.retain(|&id| id != proxy_id);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(proxy_id);
    }

    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.moved.push(proxy_id);
        }
    }

    /// Forces a pair pass for this proxy on the next update even though it
    /// did not move (used when filters change).
    pub fn touch_proxy(&mut self, proxy_id: ProxyId) {
        self.moved.push(proxy_id);
    }

    pub fn user_data(&self, proxy_id: ProxyId) -> T {
        self.tree.user_data(proxy_id)
    }

    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        self.tree.fat_aabb(a).overlaps(&self.tree.fat_aabb(b))
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    pub fn query(&self, aabb: &Aabb, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId) -> f32,
    ) {
        self.tree.ray_cast(input, callback);
    }

    /// Enumerates new candidate pairs involving proxies that moved since the
    /// last call. Pairs are sorted and deduplicated, which also keeps the
    /// enumeration order deterministic.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        self.pairs.clear();

        for i in 0..self.moved.len() {
            let query_proxy = self.moved[i];
            let fat_aabb = self.tree.fat_aabb(query_proxy);

            let tree = &self.tree;
            let pairs = &mut self.pairs;
            tree.query(&fat_aabb, |proxy_id| {
                if proxy_id != query_proxy {
                    pairs.push((query_proxy.min(proxy_id), query_proxy.max(proxy_id)));
                }
                true
            });
        }
        self.moved.clear();

        self.pairs.sort_unstable();
        self.pairs.dedup();

        for &(a, b) in &self.pairs {
            callback(self.tree.user_data(a), self.tree.user_data(b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn aabb_at(x: f32, y: f32, half: f32) -> Aabb {
        Aabb::new(Vec2::new(x - half, y - half), Vec2::new(x + half, y + half))
    }

    #[test]
    fn query_finds_overlapping_proxies() {
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let a = tree.create_proxy(aabb_at(0.0, 0.0, 1.0), 1);
        let _b = tree.create_proxy(aabb_at(10.0, 0.0, 1.0), 2);
        let c = tree.create_proxy(aabb_at(0.5, 0.5, 1.0), 3);

        let mut found = Vec::new();
        tree.query(&aabb_at(0.0, 0.0, 1.5), |id| {
            found.push(id);
            true
        });
        assert!(found.contains(&a));
        assert!(found.contains(&c));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn move_proxy_is_a_noop_within_the_margin() {
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let a = tree.create_proxy(aabb_at(0.0, 0.0, 1.0), 1);

        // Well inside the fattening margin.
        let moved = tree.move_proxy(a, aabb_at(0.01, 0.01, 1.0), Vec2::new(0.01, 0.01));
        assert!(!moved);

        let moved = tree.move_proxy(a, aabb_at(5.0, 0.0, 1.0), Vec2::new(5.0, 0.0));
        assert!(moved);
    }

    #[test]
    fn tree_height_stays_logarithmic_under_churn() {
        let mut tree: DynamicTree<usize> = DynamicTree::new();
        let mut ids = Vec::new();
        for i in 0..256 {
            let x = (i % 16) as f32 * 2.5;
            let y = (i / 16) as f32 * 2.5;
            ids.push(tree.create_proxy(aabb_at(x, y, 1.0), i));
        }
        // Remove and reinsert a quarter of them.
        for i in (0..256).step_by(4) {
            tree.destroy_proxy(ids[i]);
        }
        for i in (0..256).step_by(4) {
            let x = (i % 16) as f32 * 2.5 + 0.3;
            let y = (i / 16) as f32 * 2.5;
            tree.create_proxy(aabb_at(x, y, 1.0), i);
        }

        // A balanced tree over 256 leaves has height 8; allow slack for the
        // heuristic but reject a degenerate list.
        assert!(tree.height() <= 16, "height was {}", tree.height());
    }

    #[test]
    fn ray_cast_clips_subtrees_beyond_the_reported_fraction() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        // Insert the far proxy first so the near one is visited first.
        tree.create_proxy(aabb_at(18.0, 0.0, 1.0), 2);
        tree.create_proxy(aabb_at(5.0, 0.0, 1.0), 1);

        let mut visited = Vec::new();
        tree.ray_cast(
            &RayCastInput {
                p1: Vec2::ZERO,
                p2: Vec2::new(20.0, 0.0),
                max_fraction: 1.0,
            },
            |_, id| {
                let data = tree.user_data(id);
                visited.push(data);
                // Report the hit fraction at the entry face of each box.
                if data == 1 {
                    0.2
                } else {
                    0.85
                }
            },
        );
        // Clipping at the near box makes the far box unreachable.
        assert_eq!(visited, vec![1]);
    }

    #[test]
    fn ray_cast_stops_when_callback_returns_zero() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        tree.create_proxy(aabb_at(5.0, 0.0, 1.0), 1);
        tree.create_proxy(aabb_at(10.0, 0.0, 1.0), 2);

        let mut count = 0;
        tree.ray_cast(
            &RayCastInput {
                p1: Vec2::ZERO,
                p2: Vec2::new(20.0, 0.0),
                max_fraction: 1.0,
            },
            |_, _| {
                count += 1;
                0.0
            },
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn update_pairs_reports_each_pair_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        bp.create_proxy(aabb_at(0.0, 0.0, 1.0), 1);
        bp.create_proxy(aabb_at(1.0, 0.0, 1.0), 2);
        bp.create_proxy(aabb_at(20.0, 0.0, 1.0), 3);

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(1, 2)]);

        // No motion: no new pairs.
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }
}
