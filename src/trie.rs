use std::collections::BTreeMap;

/// Values that can be ordered by usage.
pub trait Ranked {
    fn rank(&self) -> u64;
}

#[derive(Debug)]
struct Node<V> {
    children: BTreeMap<char, Node<V>>,
    value: Option<V>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            value: None,
        }
    }
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

/// Character trie mapping string keys to values.
///
/// Results of [`PrefixTrie::find`] are ordered on every call, so rank
/// changes made through shared values are always reflected.
#[derive(Debug)]
pub struct PrefixTrie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<V> PrefixTrie<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or overwrites `key`, returning the previous value.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let mut node = &mut self.root;
        for ch in key.chars() {
            node = node.children.entry(ch).or_default();
        }
        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.node(key)?.value.as_ref()
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let chars: Vec<char> = key.chars().collect();
        let removed = remove_at(&mut self.root, &chars);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn node(&self, prefix: &str) -> Option<&Node<V>> {
        let mut node = &self.root;
        for ch in prefix.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }
}

impl<V: Clone + Ranked> PrefixTrie<V> {
    /// Every entry whose key starts with `prefix`, highest rank first, ties
    /// broken by ascending key.
    pub fn find(&self, prefix: &str) -> Vec<(String, V)> {
        let Some(start) = self.node(prefix) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut key = prefix.to_string();
        collect(start, &mut key, &mut found);

        let mut ranked: Vec<(u64, String, V)> = found
            .into_iter()
            .map(|(k, v)| (v.rank(), k, v))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked.into_iter().map(|(_, k, v)| (k, v)).collect()
    }
}

fn collect<V: Clone>(node: &Node<V>, key: &mut String, out: &mut Vec<(String, V)>) {
    if let Some(value) = node.value.as_ref() {
        out.push((key.clone(), value.clone()));
    }
    for (ch, child) in node.children.iter() {
        key.push(*ch);
        collect(child, key, out);
        key.pop();
    }
}

fn remove_at<V>(node: &mut Node<V>, key: &[char]) -> Option<V> {
    let Some((first, rest)) = key.split_first() else {
        return node.value.take();
    };
    let child = node.children.get_mut(first)?;
    let removed = remove_at(child, rest);
    if child.is_empty() {
        node.children.remove(first);
    }
    removed
}
