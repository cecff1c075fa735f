//! Red-black tree over pooled tasks.
//!
//! Nodes are tasks in a `TaskPool<TreeLink>`; parent, children and color live in the
//! task's `TreeLink` and point at other tasks by `TaskId`. The tree only provides
//! the balancing primitives. Ordering is the caller's job: find the insertion point,
//! `link_node` it, then `insert_color`.
use crate::SchedError;

use super::{pool::TaskPool, Link, TaskId};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Red,
    Black,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Tree links embedded in each pooled task.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeLink {
    parent: Option<TaskId>,
    left: Option<TaskId>,
    right: Option<TaskId>,
    color: Color,
    linked: bool,
}

impl TreeLink {
    pub fn color(&self) -> Color {
        self.color
    }

    fn child(&self, side: Side) -> Option<TaskId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn child_mut(&mut self, side: Side) -> &mut Option<TaskId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

impl Link for TreeLink {
    fn is_linked(&self) -> bool {
        self.linked
    }
}

type Pool = TaskPool<TreeLink>;

fn parent(pool: &Pool, node: TaskId) -> Option<TaskId> {
    pool.link(node).parent
}

fn child(pool: &Pool, node: TaskId, side: Side) -> Option<TaskId> {
    pool.link(node).child(side)
}

fn is_red(pool: &Pool, node: Option<TaskId>) -> bool {
    node.is_some_and(|n| pool.link(n).color == Color::Red)
}

// leaves count as black
fn is_black(pool: &Pool, node: Option<TaskId>) -> bool {
    !is_red(pool, node)
}

fn set_color(pool: &mut Pool, node: TaskId, color: Color) {
    pool.link_mut(node).color = color;
}

fn set_parent(pool: &mut Pool, node: Option<TaskId>, parent: Option<TaskId>) {
    if let Some(node) = node {
        pool.link_mut(node).parent = parent;
    }
}

/// Root of a red-black tree whose nodes live in a `TaskPool<TreeLink>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RbRoot {
    node: Option<TaskId>,
}

impl RbRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<TaskId> {
        self.node
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn parent_of(pool: &Pool, node: TaskId) -> Option<TaskId> {
        parent(pool, node)
    }

    pub fn left_of(pool: &Pool, node: TaskId) -> Option<TaskId> {
        child(pool, node, Side::Left)
    }

    pub fn right_of(pool: &Pool, node: TaskId) -> Option<TaskId> {
        child(pool, node, Side::Right)
    }

    /// Point `parent`'s edge (or the root) that referenced `old` at `new`.
    fn replace_child(
        &mut self,
        pool: &mut Pool,
        parent: Option<TaskId>,
        old: TaskId,
        new: Option<TaskId>,
    ) {
        match parent {
            Some(p) => {
                let link = pool.link_mut(p);
                if link.left == Some(old) {
                    link.left = new;
                } else {
                    link.right = new;
                }
            }
            None => self.node = new,
        }
    }

    /// Rotate `node` down towards `side`; its child on the other side takes its place.
    fn rotate(&mut self, pool: &mut Pool, node: TaskId, side: Side) {
        let Some(pivot) = child(pool, node, side.opposite()) else {
            return;
        };
        let up = parent(pool, node);
        let inner = child(pool, pivot, side);

        *pool.link_mut(node).child_mut(side.opposite()) = inner;
        set_parent(pool, inner, Some(node));
        *pool.link_mut(pivot).child_mut(side) = Some(node);
        pool.link_mut(pivot).parent = up;
        self.replace_child(pool, up, node, Some(pivot));
        pool.link_mut(node).parent = Some(pivot);
    }

    /// Attach an unlinked `node` as a red leaf under `parent` (or as the root).
    pub fn link_node(&mut self, pool: &mut Pool, node: TaskId, parent: Option<TaskId>, side: Side) {
        *pool.link_mut(node) = TreeLink {
            parent,
            left: None,
            right: None,
            color: Color::Red,
            linked: true,
        };
        match parent {
            Some(p) => *pool.link_mut(p).child_mut(side) = Some(node),
            None => self.node = Some(node),
        }
    }

    /// Restore the coloring invariants after `link_node`.
    pub fn insert_color(&mut self, pool: &mut Pool, node: TaskId) {
        let mut node = node;
        while let Some(mut up) = parent(pool, node) {
            if is_black(pool, Some(up)) {
                break;
            }
            // a red node is never the root, so the grandparent exists
            let Some(grand) = parent(pool, up) else {
                break;
            };
            let side = if child(pool, grand, Side::Left) == Some(up) {
                Side::Left
            } else {
                Side::Right
            };

            let uncle = child(pool, grand, side.opposite());
            if let Some(uncle) = uncle.filter(|&u| is_red(pool, Some(u))) {
                set_color(pool, uncle, Color::Black);
                set_color(pool, up, Color::Black);
                set_color(pool, grand, Color::Red);
                node = grand;
                continue;
            }

            if child(pool, up, side.opposite()) == Some(node) {
                self.rotate(pool, up, side);
                std::mem::swap(&mut up, &mut node);
            }

            set_color(pool, up, Color::Black);
            set_color(pool, grand, Color::Red);
            self.rotate(pool, grand, side.opposite());
        }

        if let Some(root) = self.node {
            set_color(pool, root, Color::Black);
        }
    }

    /// Unlink `node` and rebalance. The caller guarantees `node` is in this tree.
    pub fn erase(&mut self, pool: &mut Pool, node: TaskId) {
        let TreeLink { left, right, .. } = *pool.link(node);

        let (child, up, color) = match (left, right) {
            (Some(_), Some(succ_root)) => {
                // two children: the in-order successor takes over node's place
                let mut succ = succ_root;
                while let Some(l) = child(pool, succ, Side::Left) {
                    succ = l;
                }
                let succ_child = child(pool, succ, Side::Right);
                let mut up = parent(pool, succ);
                let color = pool.link(succ).color;

                set_parent(pool, succ_child, up);
                if up == Some(node) {
                    pool.link_mut(node).right = succ_child;
                    up = Some(succ);
                } else if let Some(p) = up {
                    pool.link_mut(p).left = succ_child;
                }

                let old = *pool.link(node);
                *pool.link_mut(succ) = old;
                self.replace_child(pool, old.parent, node, Some(succ));
                set_parent(pool, old.left, Some(succ));
                set_parent(pool, old.right, Some(succ));
                (succ_child, up, color)
            }
            _ => {
                let child = left.or(right);
                let up = parent(pool, node);
                let color = pool.link(node).color;
                set_parent(pool, child, up);
                self.replace_child(pool, up, node, child);
                (child, up, color)
            }
        };

        *pool.link_mut(node) = TreeLink::default();

        if color == Color::Black {
            self.erase_color(pool, child, up);
        }
    }

    /// Double-black fix-up: `node` (possibly a leaf) under `up` is one black short.
    fn erase_color(&mut self, pool: &mut Pool, node: Option<TaskId>, up: Option<TaskId>) {
        let mut node = node;
        let mut up = up;
        while is_black(pool, node) && node != self.node {
            let Some(p) = up else {
                break;
            };
            let side = if child(pool, p, Side::Left) == node {
                Side::Left
            } else {
                Side::Right
            };

            let Some(mut other) = child(pool, p, side.opposite()) else {
                break;
            };
            if is_red(pool, Some(other)) {
                set_color(pool, other, Color::Black);
                set_color(pool, p, Color::Red);
                self.rotate(pool, p, side);
                let Some(next) = child(pool, p, side.opposite()) else {
                    break;
                };
                other = next;
            }

            let near = child(pool, other, side);
            let far = child(pool, other, side.opposite());
            if is_black(pool, near) && is_black(pool, far) {
                set_color(pool, other, Color::Red);
                node = Some(p);
                up = parent(pool, p);
                continue;
            }

            if is_black(pool, far) {
                if let Some(near) = near {
                    set_color(pool, near, Color::Black);
                }
                set_color(pool, other, Color::Red);
                self.rotate(pool, other, side.opposite());
                let Some(next) = child(pool, p, side.opposite()) else {
                    break;
                };
                other = next;
            }
            let parent_color = pool.link(p).color;
            set_color(pool, other, parent_color);
            set_color(pool, p, Color::Black);
            if let Some(far) = child(pool, other, side.opposite()) {
                set_color(pool, far, Color::Black);
            }
            self.rotate(pool, p, side);
            node = self.node;
            break;
        }
        if let Some(node) = node {
            set_color(pool, node, Color::Black);
        }
    }

    fn extreme(&self, pool: &Pool, side: Side) -> Option<TaskId> {
        let mut node = self.node?;
        while let Some(next) = child(pool, node, side) {
            node = next;
        }
        Some(node)
    }

    /// Smallest node in sort order.
    pub fn first(&self, pool: &Pool) -> Option<TaskId> {
        self.extreme(pool, Side::Left)
    }

    /// Largest node in sort order.
    pub fn last(&self, pool: &Pool) -> Option<TaskId> {
        self.extreme(pool, Side::Right)
    }

    fn step(pool: &Pool, node: TaskId, side: Side) -> Option<TaskId> {
        if !pool.link(node).linked {
            return None;
        }
        // down once towards `side`, then all the way the other way
        if let Some(mut next) = child(pool, node, side) {
            while let Some(n) = child(pool, next, side.opposite()) {
                next = n;
            }
            return Some(next);
        }
        // otherwise climb until we arrive from the opposite side
        let mut node = node;
        while let Some(up) = parent(pool, node) {
            if child(pool, up, side) != Some(node) {
                return Some(up);
            }
            node = up;
        }
        None
    }

    /// In-order successor of `node`.
    pub fn next(pool: &Pool, node: TaskId) -> Option<TaskId> {
        Self::step(pool, node, Side::Right)
    }

    /// In-order predecessor of `node`.
    pub fn prev(pool: &Pool, node: TaskId) -> Option<TaskId> {
        Self::step(pool, node, Side::Left)
    }

    /// Put unlinked `new` exactly where `victim` is, without rebalancing.
    ///
    /// `victim` comes out unlinked. Ordering is only preserved if `new` sorts where
    /// `victim` did.
    pub fn replace_node(&mut self, pool: &mut Pool, victim: TaskId, new: TaskId) {
        let link = *pool.link(victim);
        self.replace_child(pool, link.parent, victim, Some(new));
        set_parent(pool, link.left, Some(new));
        set_parent(pool, link.right, Some(new));
        *pool.link_mut(new) = link;
        *pool.link_mut(victim) = TreeLink::default();
    }

    /// Walk the whole tree and verify links, ordering and coloring.
    ///
    /// Returns the black height and node count.
    pub fn check(&self, pool: &Pool) -> Result<(usize, usize), SchedError> {
        let Some(root) = self.node else {
            return Ok((0, 0));
        };
        if pool.link(root).parent.is_some() {
            return Err(SchedError::Corrupted("root has a parent"));
        }
        if is_red(pool, Some(root)) {
            return Err(SchedError::Corrupted("root is red"));
        }
        Self::check_subtree(pool, root, None, None)
    }

    fn check_subtree(
        pool: &Pool,
        node: TaskId,
        low: Option<u64>,
        high: Option<u64>,
    ) -> Result<(usize, usize), SchedError> {
        let link = pool.link(node);
        let key = pool.key_of(node);
        if !link.linked {
            return Err(SchedError::Corrupted("reachable node is not marked linked"));
        }
        if low.is_some_and(|low| key < low) || high.is_some_and(|high| key > high) {
            return Err(SchedError::Corrupted("keys out of order"));
        }

        let mut heights = [0usize; 2];
        let mut count = 1;
        for (slot, side) in [Side::Left, Side::Right].into_iter().enumerate() {
            let Some(kid) = link.child(side) else {
                continue;
            };
            if pool.link(kid).parent != Some(node) {
                return Err(SchedError::Corrupted("child does not point back at its parent"));
            }
            if link.color == Color::Red && is_red(pool, Some(kid)) {
                return Err(SchedError::Corrupted("red node has a red child"));
            }
            let (lo, hi) = match side {
                Side::Left => (low, Some(key)),
                Side::Right => (Some(key), high),
            };
            let (height, nodes) = Self::check_subtree(pool, kid, lo, hi)?;
            heights[slot] = height;
            count += nodes;
        }
        if heights[0] != heights[1] {
            return Err(SchedError::Corrupted("black heights differ"));
        }
        let own = usize::from(link.color == Color::Black);
        Ok((heights[0] + own, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain ordered insert, ties to the right.
    fn insert(root: &mut RbRoot, pool: &mut Pool, id: TaskId, key: u64) {
        pool.set_key(id, key);
        let mut up = None;
        let mut side = Side::Left;
        let mut cur = root.root();
        while let Some(n) = cur {
            up = Some(n);
            side = if key < pool.key_of(n) {
                Side::Left
            } else {
                Side::Right
            };
            cur = child(pool, n, side);
        }
        root.link_node(pool, id, up, side);
        root.insert_color(pool, id);
    }

    fn in_order(root: &RbRoot, pool: &Pool) -> Vec<u64> {
        let mut keys = Vec::new();
        let mut cur = root.first(pool);
        while let Some(n) = cur {
            keys.push(pool.key_of(n));
            cur = RbRoot::next(pool, n);
        }
        keys
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut pool = Pool::with_capacity(1024).unwrap();
        let mut root = RbRoot::new();
        for (i, id) in pool.ids().collect::<Vec<_>>().into_iter().enumerate() {
            insert(&mut root, &mut pool, id, i as u64);
            root.check(&pool).unwrap();
        }
        let (black_height, count) = root.check(&pool).unwrap();
        assert_eq!(count, 1024);
        // height <= 2 * black height, and 2^bh - 1 <= n
        assert!(black_height <= 11);
        assert_eq!(in_order(&root, &pool), (0..1024).collect::<Vec<_>>());
    }

    #[test]
    fn erase_every_shape() {
        let mut pool = Pool::with_capacity(200).unwrap();
        let mut root = RbRoot::new();
        let ids: Vec<_> = pool.ids().collect();
        for &id in &ids {
            // scrambled keys, with duplicates
            insert(&mut root, &mut pool, id, (id.0 as u64 * 37) % 101);
        }
        // interior nodes, leaves and the root all get removed at some point
        for &id in ids.iter().step_by(3).chain(ids.iter().skip(1).step_by(3)) {
            root.erase(&mut pool, id);
            assert!(!pool.link(id).is_linked());
            root.check(&pool).unwrap();
        }
        let keys = in_order(&root, &pool);
        assert_eq!(keys.len(), ids.len() - ids.len().div_ceil(3) - (ids.len() - 1).div_ceil(3));
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        while let Some(root_id) = root.root() {
            root.erase(&mut pool, root_id);
            root.check(&pool).unwrap();
        }
        assert!(root.is_empty());
    }

    #[test]
    fn neighbours() {
        let mut pool = Pool::with_capacity(5).unwrap();
        let mut root = RbRoot::new();
        for (id, key) in pool.ids().collect::<Vec<_>>().into_iter().zip([30, 10, 50, 20, 40]) {
            insert(&mut root, &mut pool, id, key);
        }
        let first = root.first(&pool).unwrap();
        let last = root.last(&pool).unwrap();
        assert_eq!(pool.key_of(first), 10);
        assert_eq!(pool.key_of(last), 50);
        assert_eq!(RbRoot::prev(&pool, first), None);
        assert_eq!(RbRoot::next(&pool, last), None);
        let second = RbRoot::next(&pool, first).unwrap();
        assert_eq!(pool.key_of(second), 20);
        assert_eq!(RbRoot::prev(&pool, second), Some(first));
    }

    #[test]
    fn replace_keeps_shape() {
        let mut pool = Pool::with_capacity(8).unwrap();
        let mut root = RbRoot::new();
        let ids: Vec<_> = pool.ids().collect();
        for (&id, key) in ids[..7].iter().zip(1..) {
            insert(&mut root, &mut pool, id, key * 10);
        }
        let victim = ids[3];
        let spare = ids[7];
        pool.set_key(spare, pool.key_of(victim));
        root.replace_node(&mut pool, victim, spare);
        assert!(!pool.link(victim).is_linked());
        assert!(pool.link(spare).is_linked());
        let (_, count) = root.check(&pool).unwrap();
        assert_eq!(count, 7);
        assert_eq!(in_order(&root, &pool), vec![10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn checker_catches_red_root() {
        let mut pool = Pool::with_capacity(1).unwrap();
        let mut root = RbRoot::new();
        let id = TaskId(0);
        root.link_node(&mut pool, id, None, Side::Left);
        assert_eq!(
            root.check(&pool).unwrap_err(),
            SchedError::Corrupted("root is red")
        );
        root.insert_color(&mut pool, id);
        assert_eq!(root.check(&pool).unwrap(), (1, 1));
    }
}
