//! 持久化有序映射
//!
//! 不可变的 AVL 平衡二叉搜索树。每次 `insert`/`delete` 返回新树，
//! 旧树保持不变；未受影响的子树通过 `Arc` 在各版本之间共享。
//! 图层与实体集合都存放在这种映射中，撤销/重做只需保留旧的根。

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    height: usize,
    count: usize,
}

fn height<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn count<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.count)
}

/// 由子树构造节点，并重新计算高度与数量
fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    let height = 1 + height(&left).max(height(&right));
    let count = 1 + count(&left) + count(&right);
    Arc::new(Node {
        key,
        value,
        left,
        right,
        height,
        count,
    })
}

impl<K: Clone, V: Clone> Node<K, V> {
    fn with_children(&self, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
        make(self.key.clone(), self.value.clone(), left, right)
    }

    fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }
}

fn rotate_right<K: Clone, V: Clone>(node: &Node<K, V>) -> Arc<Node<K, V>> {
    match &node.left {
        Some(pivot) => {
            let new_right = node.with_children(pivot.right.clone(), node.right.clone());
            pivot.with_children(pivot.left.clone(), Some(new_right))
        }
        None => node.with_children(node.left.clone(), node.right.clone()),
    }
}

fn rotate_left<K: Clone, V: Clone>(node: &Node<K, V>) -> Arc<Node<K, V>> {
    match &node.right {
        Some(pivot) => {
            let new_left = node.with_children(node.left.clone(), pivot.left.clone());
            pivot.with_children(Some(new_left), pivot.right.clone())
        }
        None => node.with_children(node.left.clone(), node.right.clone()),
    }
}

/// 根据子树高度差选择单旋或双旋
fn rebalance<K: Clone, V: Clone>(node: Arc<Node<K, V>>) -> Arc<Node<K, V>> {
    let factor = node.balance_factor();
    if factor > 1 {
        let left_heavy_right = node.left.as_ref().is_some_and(|l| l.balance_factor() < 0);
        if left_heavy_right {
            let left = node.left.as_deref().map(rotate_left);
            rotate_right(&node.with_children(left, node.right.clone()))
        } else {
            rotate_right(&node)
        }
    } else if factor < -1 {
        let right_heavy_left = node.right.as_ref().is_some_and(|r| r.balance_factor() > 0);
        if right_heavy_left {
            let right = node.right.as_deref().map(rotate_right);
            rotate_left(&node.with_children(node.left.clone(), right))
        } else {
            rotate_left(&node)
        }
    } else {
        node
    }
}

fn insert<K: Ord + Clone, V: Clone>(link: &Link<K, V>, key: K, value: V) -> Arc<Node<K, V>> {
    match link {
        None => make(key, value, None, None),
        Some(node) => match key.cmp(&node.key) {
            Ordering::Less => {
                let left = insert(&node.left, key, value);
                rebalance(node.with_children(Some(left), node.right.clone()))
            }
            Ordering::Greater => {
                let right = insert(&node.right, key, value);
                rebalance(node.with_children(node.left.clone(), Some(right)))
            }
            Ordering::Equal => make(key, value, node.left.clone(), node.right.clone()),
        },
    }
}

/// 移除并返回子树中的最小节点（中序后继）
fn take_min<K: Clone, V: Clone>(node: &Node<K, V>) -> (Link<K, V>, K, V) {
    match &node.left {
        None => (node.right.clone(), node.key.clone(), node.value.clone()),
        Some(left) => {
            let (rest, key, value) = take_min(left);
            let rebuilt = rebalance(node.with_children(rest, node.right.clone()));
            (Some(rebuilt), key, value)
        }
    }
}

/// 返回删除后的子树；键不存在时返回 `None` 表示子树未变
fn delete<K, V, Q>(link: &Link<K, V>, key: &Q) -> Option<Link<K, V>>
where
    K: Ord + Clone + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
{
    let node = link.as_ref()?;
    match key.cmp(node.key.borrow()) {
        Ordering::Less => {
            let left = delete(&node.left, key)?;
            Some(Some(rebalance(node.with_children(left, node.right.clone()))))
        }
        Ordering::Greater => {
            let right = delete(&node.right, key)?;
            Some(Some(rebalance(node.with_children(node.left.clone(), right))))
        }
        Ordering::Equal => match (&node.left, &node.right) {
            (None, None) => Some(None),
            (Some(only), None) | (None, Some(only)) => Some(Some(only.clone())),
            (Some(left), Some(right)) => {
                let (rest, succ_key, succ_value) = take_min(right);
                let replaced = make(succ_key, succ_value, Some(left.clone()), rest);
                Some(Some(rebalance(replaced)))
            }
        },
    }
}

/// 由已排序且无重复的序列构建完全平衡的子树
fn build_sorted<K: Clone, V: Clone>(items: &[(K, V)]) -> Link<K, V> {
    if items.is_empty() {
        return None;
    }
    let mid = items.len() / 2;
    let left = build_sorted(&items[..mid]);
    let right = build_sorted(&items[mid + 1..]);
    let (key, value) = items[mid].clone();
    Some(make(key, value, left, right))
}

/// 不可变的有序映射
///
/// 克隆只复制根引用，代价为 O(1)。
pub struct ReadOnlyTree<K, V> {
    root: Link<K, V>,
}

impl<K, V> Clone for ReadOnlyTree<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for ReadOnlyTree<K, V> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<K, V> ReadOnlyTree<K, V> {
    /// 空树
    pub fn new() -> Self {
        Self::default()
    }

    /// 不同键的数量
    pub fn len(&self) -> usize {
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// 树高（空树为 0）
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// 按键升序遍历
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::with_capacity(self.height()),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// 升序键序列
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// 按键顺序的值序列
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// 两棵树是否共享同一个根（同一版本）
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K: Ord, V> ReadOnlyTree<K, V> {
    /// 查找键对应的值
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(node.key.borrow()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    /// 同 [`get`](Self::get)
    pub fn try_find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Ord + Clone, V: Clone> ReadOnlyTree<K, V> {
    /// 返回绑定了 `key` 的新树；已存在的键会被替换
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        Self {
            root: Some(insert(&self.root, key, value)),
        }
    }

    /// 返回删除了 `key` 的新树；键不存在时返回与原树共享根的副本
    #[must_use]
    pub fn delete<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match delete(&self.root, key) {
            Some(root) => Self { root },
            None => self.clone(),
        }
    }

    /// 批量构建：按键稳定排序后自底向上建树，重复键保留最后出现的值
    pub fn from_values(values: impl IntoIterator<Item = V>, key_fn: impl Fn(&V) -> K) -> Self {
        values.into_iter().map(|v| (key_fn(&v), v)).collect()
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for ReadOnlyTree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut items: Vec<(K, V)> = iter.into_iter().collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));

        // 相邻重复键只保留最后一个
        let mut unique: Vec<(K, V)> = Vec::with_capacity(items.len());
        for item in items {
            match unique.last_mut() {
                Some(last) if last.0 == item.0 => *last = item,
                _ => unique.push(item),
            }
        }

        Self {
            root: build_sorted(&unique),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ReadOnlyTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a ReadOnlyTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 中序迭代器
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn assert_balanced<K: Ord, V>(link: &Link<K, V>) -> usize {
        match link {
            None => 0,
            Some(node) => {
                if let Some(l) = &node.left {
                    assert!(l.key < node.key);
                }
                if let Some(r) = &node.right {
                    assert!(r.key > node.key);
                }
                let lh = assert_balanced(&node.left);
                let rh = assert_balanced(&node.right);
                assert!(lh.abs_diff(rh) <= 1, "unbalanced node");
                assert_eq!(node.height, 1 + lh.max(rh));
                assert_eq!(node.count, 1 + count(&node.left) + count(&node.right));
                node.height
            }
        }
    }

    #[test]
    fn test_insert_and_find() {
        let tree = ReadOnlyTree::new()
            .insert(5, "five")
            .insert(3, "three")
            .insert(8, "eight");
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(&3), Some(&"three"));
        assert!(tree.contains_key(&8));
        assert!(tree.try_find(&4).is_none());
    }

    #[test]
    fn test_insert_replaces_value() {
        let tree = ReadOnlyTree::new().insert("a", 1).insert("a", 2);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("a"), Some(&2));
    }

    #[test]
    fn test_persistence() {
        let t1 = ReadOnlyTree::new().insert(1, 'a').insert(2, 'b');
        let t2 = t1.insert(3, 'c');
        let t3 = t2.delete(&1);

        assert_eq!(t1.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(t2.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(t3.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let tree = ReadOnlyTree::new().insert(1, ()).insert(2, ());
        let same = tree.delete(&42);
        assert!(same.ptr_eq(&tree));
        assert_eq!(same.len(), 2);
        assert!(ReadOnlyTree::<i32, ()>::new().delete(&1).is_empty());
    }

    #[test]
    fn test_delete_two_children() {
        let mut tree = ReadOnlyTree::new();
        for k in [50, 30, 70, 20, 40, 60, 80] {
            tree = tree.insert(k, k * 10);
        }
        let tree = tree.delete(&50);
        assert_eq!(
            tree.keys().copied().collect::<Vec<_>>(),
            vec![20, 30, 40, 60, 70, 80]
        );
        assert_balanced(&tree.root);
    }

    #[test]
    fn test_sequential_insert_stays_balanced() {
        let mut tree = ReadOnlyTree::new();
        for k in 0..1024 {
            tree = tree.insert(k, ());
        }
        assert_eq!(tree.height(), 11);
        assert_balanced(&tree.root);
    }

    #[test]
    fn test_from_values_last_duplicate_wins() {
        let tree = ReadOnlyTree::from_values(
            vec![("b", 1), ("a", 2), ("b", 3)],
            |&(name, _)| name.to_string(),
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("b"), Some(&("b", 3)));
        assert_eq!(tree.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_balanced(&tree.root);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let tree: ReadOnlyTree<i32, i32> = (0..10).map(|k| (k, k)).collect();
        let first: Vec<_> = tree.values().copied().collect();
        let second: Vec<_> = tree.values().copied().collect();
        assert_eq!(first, second);
        assert_eq!(tree.iter().len(), 10);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u8, u32),
        Delete(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u8>(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
            any::<u8>().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_btreemap(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let mut tree = ReadOnlyTree::new();
            let mut model = BTreeMap::new();
            let mut history = Vec::new();

            for op in ops {
                history.push((tree.clone(), model.clone()));
                match op {
                    Op::Insert(k, v) => {
                        tree = tree.insert(k, v);
                        model.insert(k, v);
                    }
                    Op::Delete(k) => {
                        tree = tree.delete(&k);
                        model.remove(&k);
                    }
                }
                prop_assert_eq!(tree.len(), model.len());
            }

            assert_balanced(&tree.root);
            let entries: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
            let expected: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(entries, expected);

            // 旧版本不受后续操作影响
            for (old_tree, old_model) in &history {
                let keys: Vec<_> = old_tree.keys().copied().collect();
                let expected: Vec<_> = old_model.keys().copied().collect();
                prop_assert_eq!(keys, expected);
            }
        }

        #[test]
        fn prop_bulk_build_equals_sequential(keys in prop::collection::vec(any::<i16>(), 0..100)) {
            let bulk: ReadOnlyTree<i16, usize> =
                keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
            let mut sequential = ReadOnlyTree::new();
            for (i, k) in keys.iter().enumerate() {
                sequential = sequential.insert(*k, i);
            }
            assert_balanced(&bulk.root);
            let a: Vec<_> = bulk.iter().map(|(k, v)| (*k, *v)).collect();
            let b: Vec<_> = sequential.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(a, b);
        }
    }
}
