//! Persistent map: a hash-array-mapped trie from `Value` to `Value`.
//!
//! Interior nodes are 32-way branches addressed by successive 5-bit slices
//! of the key's hash; children are stored sparsely behind a bitmap. Leaves
//! hold one entry, or a collision vector when full hashes collide. Every
//! operation path-copies from the root, so the input map is never touched.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

const BITS: u32 = 5;
const CHUNK_MASK: u64 = (1 << BITS) - 1;
const MAX_SHIFT: u32 = 60;

/// Failures from map operations.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// `insert` refused to overwrite an existing key.
    DuplicateKey(Value),
    /// The key's value kind cannot be hashed (named kind).
    NotHashable(&'static str),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::DuplicateKey(key) => {
                write!(f, "insert of already-existing key into map: {key}")
            }
            MapError::NotHashable(kind) => write!(f, "cannot hash {kind} objects"),
        }
    }
}

impl std::error::Error for MapError {}

enum Node {
    Branch {
        bitmap: u32,
        children: Vec<Rc<Node>>,
    },
    Leaf {
        hash: u64,
        entries: Vec<(Value, Value)>,
    },
}

/// An immutable hash-array-mapped trie.
#[derive(Clone, Default)]
pub struct Map {
    root: Option<Rc<Node>>,
    size: usize,
}

fn chunk(hash: u64, shift: u32) -> u32 {
    ((hash >> shift) & CHUNK_MASK) as u32
}

fn sparse_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

fn key_hash(key: &Value) -> Result<u64, MapError> {
    key.try_hash().map_err(MapError::NotHashable)
}

impl Map {
    pub fn new() -> Map {
        Map::default()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// A new map with `key → value` added. Fails if `key` is already present.
    pub fn insert(&self, key: &Value, value: &Value) -> Result<Map, MapError> {
        self.insert_impl(key, value, false)
    }

    /// A new map with `key → value` added or replaced.
    pub fn insert_or_update(&self, key: &Value, value: &Value) -> Result<Map, MapError> {
        self.insert_impl(key, value, true)
    }

    fn insert_impl(&self, key: &Value, value: &Value, replace: bool) -> Result<Map, MapError> {
        let hash = key_hash(key)?;
        match &self.root {
            None => Ok(Map {
                root: Some(Rc::new(Node::Leaf {
                    hash,
                    entries: vec![(key.clone(), value.clone())],
                })),
                size: 1,
            }),
            Some(root) => {
                let (new_root, added) = insert_rec(root, hash, 0, key, value, replace)?;
                Ok(Map {
                    root: Some(new_root),
                    size: self.size + usize::from(added),
                })
            }
        }
    }

    /// Remove `key`, returning the removed value and the remaining map.
    pub fn pop(&self, key: &Value) -> Result<Option<(Value, Map)>, MapError> {
        let hash = key_hash(key)?;
        let Some(root) = &self.root else {
            return Ok(None);
        };
        Ok(remove_rec(root, hash, 0, key).map(|(removed, new_root)| {
            (
                removed,
                Map {
                    root: new_root,
                    size: self.size - 1,
                },
            )
        }))
    }

    /// Look up `key`.
    pub fn find(&self, key: &Value) -> Result<Option<&Value>, MapError> {
        let hash = key_hash(key)?;
        let mut node = match &self.root {
            Some(root) => root.as_ref(),
            None => return Ok(None),
        };
        let mut shift = 0;
        loop {
            match node {
                Node::Leaf { hash: h, entries } => {
                    if *h != hash {
                        return Ok(None);
                    }
                    return Ok(entries.iter().find(|(k, _)| k == key).map(|(_, v)| v));
                }
                Node::Branch { bitmap, children } => {
                    let bit = 1u32 << chunk(hash, shift);
                    if bitmap & bit == 0 {
                        return Ok(None);
                    }
                    node = children[sparse_index(*bitmap, bit)].as_ref();
                    shift += BITS;
                }
            }
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.root.iter().map(|n| n.as_ref()).collect(),
            leaf: None,
        }
    }
}

fn insert_rec(
    node: &Rc<Node>,
    hash: u64,
    shift: u32,
    key: &Value,
    value: &Value,
    replace: bool,
) -> Result<(Rc<Node>, bool), MapError> {
    match node.as_ref() {
        Node::Leaf { hash: h, entries } => {
            if *h == hash {
                let mut entries = entries.clone();
                if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
                    if !replace {
                        return Err(MapError::DuplicateKey(key.clone()));
                    }
                    slot.1 = value.clone();
                    return Ok((Rc::new(Node::Leaf { hash, entries }), false));
                }
                entries.push((key.clone(), value.clone()));
                return Ok((Rc::new(Node::Leaf { hash, entries }), true));
            }
            // Prefix collision: split the leaf into a branch and retry.
            let split = split_leaf(node.clone(), *h, shift);
            insert_rec(&split, hash, shift, key, value, replace)
        }
        Node::Branch { bitmap, children } => {
            let bit = 1u32 << chunk(hash, shift);
            let pos = sparse_index(*bitmap, bit);
            let mut children = children.clone();
            if bitmap & bit != 0 {
                let (child, added) =
                    insert_rec(&children[pos], hash, shift + BITS, key, value, replace)?;
                children[pos] = child;
                Ok((
                    Rc::new(Node::Branch {
                        bitmap: *bitmap,
                        children,
                    }),
                    added,
                ))
            } else {
                children.insert(
                    pos,
                    Rc::new(Node::Leaf {
                        hash,
                        entries: vec![(key.clone(), value.clone())],
                    }),
                );
                Ok((
                    Rc::new(Node::Branch {
                        bitmap: bitmap | bit,
                        children,
                    }),
                    true,
                ))
            }
        }
    }
}

/// Replace a leaf with a single-child branch keyed by the leaf's hash chunk
/// at `shift`. Past `MAX_SHIFT` the remaining hash bits are exhausted, so
/// differing hashes can no longer be separated; the caller's equal-hash path
/// handles that case before we get here.
fn split_leaf(leaf: Rc<Node>, leaf_hash: u64, shift: u32) -> Rc<Node> {
    debug_assert!(shift <= MAX_SHIFT);
    let bit = 1u32 << chunk(leaf_hash, shift);
    Rc::new(Node::Branch {
        bitmap: bit,
        children: vec![leaf],
    })
}

fn remove_rec(
    node: &Rc<Node>,
    hash: u64,
    shift: u32,
    key: &Value,
) -> Option<(Value, Option<Rc<Node>>)> {
    match node.as_ref() {
        Node::Leaf { hash: h, entries } => {
            if *h != hash {
                return None;
            }
            let pos = entries.iter().position(|(k, _)| k == key)?;
            let removed = entries[pos].1.clone();
            if entries.len() == 1 {
                return Some((removed, None));
            }
            let mut entries = entries.clone();
            entries.remove(pos);
            Some((removed, Some(Rc::new(Node::Leaf { hash, entries }))))
        }
        Node::Branch { bitmap, children } => {
            let bit = 1u32 << chunk(hash, shift);
            if bitmap & bit == 0 {
                return None;
            }
            let pos = sparse_index(*bitmap, bit);
            let (removed, replacement) = remove_rec(&children[pos], hash, shift + BITS, key)?;
            let mut children = children.clone();
            let bitmap = match replacement {
                Some(child) => {
                    children[pos] = child;
                    *bitmap
                }
                None => {
                    children.remove(pos);
                    bitmap & !bit
                }
            };
            if children.is_empty() {
                return Some((removed, None));
            }
            Some((removed, Some(Rc::new(Node::Branch { bitmap, children }))))
        }
    }
}

pub struct Iter<'a> {
    stack: Vec<&'a Node>,
    leaf: Option<(&'a [(Value, Value)], usize)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Value, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entries, idx)) = &mut self.leaf {
                if *idx < entries.len() {
                    let (k, v) = &entries[*idx];
                    *idx += 1;
                    return Some((k, v));
                }
                self.leaf = None;
            }
            match self.stack.pop()? {
                Node::Leaf { entries, .. } => self.leaf = Some((entries, 0)),
                Node::Branch { children, .. } => {
                    self.stack.extend(children.iter().rev().map(|c| c.as_ref()));
                }
            }
        }
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Map) -> bool {
        self.size == other.size
            && self
                .iter()
                .all(|(k, v)| matches!(other.find(k), Ok(Some(found)) if found == v))
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{{")?;
        let mut first = true;
        for (k, v) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{k} => {v}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    fn sym(name: &str) -> Value {
        Value::Symbol(Symbol::intern(name))
    }

    fn int(i: i64) -> Value {
        Value::Integer(i)
    }

    #[test]
    fn insert_find_round_trip() {
        let m = Map::new().insert(&sym("a"), &int(1)).unwrap();
        assert_eq!(m.find(&sym("a")).unwrap(), Some(&int(1)));
        assert_eq!(m.find(&sym("b")).unwrap(), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn insert_rejects_duplicates() {
        let m = Map::new().insert(&sym("a"), &int(1)).unwrap();
        assert_eq!(
            m.insert(&sym("a"), &int(2)),
            Err(MapError::DuplicateKey(sym("a")))
        );
    }

    #[test]
    fn insert_or_update_replaces() {
        let m = Map::new().insert(&sym("a"), &int(1)).unwrap();
        let m2 = m.insert_or_update(&sym("a"), &int(2)).unwrap();
        assert_eq!(m2.find(&sym("a")).unwrap(), Some(&int(2)));
        assert_eq!(m2.len(), 1);
        // The original is unchanged.
        assert_eq!(m.find(&sym("a")).unwrap(), Some(&int(1)));
    }

    #[test]
    fn pop_removes_and_preserves_input() {
        let m = Map::new()
            .insert(&sym("a"), &int(1))
            .unwrap()
            .insert(&sym("b"), &int(2))
            .unwrap();
        let (removed, rest) = m.pop(&sym("a")).unwrap().unwrap();
        assert_eq!(removed, int(1));
        assert_eq!(rest.find(&sym("a")).unwrap(), None);
        assert_eq!(rest.find(&sym("b")).unwrap(), Some(&int(2)));
        assert_eq!(m.len(), 2);
        assert!(m.pop(&sym("missing")).unwrap().is_none());
    }

    #[test]
    fn many_keys_survive_trie_splits() {
        let mut m = Map::new();
        for i in 0..500 {
            m = m.insert(&int(i), &int(i * 10)).unwrap();
        }
        assert_eq!(m.len(), 500);
        for i in 0..500 {
            assert_eq!(m.find(&int(i)).unwrap(), Some(&int(i * 10)));
        }
        let mut count = 0;
        for (k, v) in m.iter() {
            if let (Value::Integer(k), Value::Integer(v)) = (k, v) {
                assert_eq!(*v, k * 10);
            }
            count += 1;
        }
        assert_eq!(count, 500);
    }

    #[test]
    fn tuple_keys_hash_structurally() {
        let key = Value::Tuple(crate::tuple::Tuple::new(vec![sym("a"), int(1)]));
        let same = Value::Tuple(crate::tuple::Tuple::new(vec![sym("a"), int(1)]));
        let m = Map::new().insert(&key, &int(7)).unwrap();
        assert_eq!(m.find(&same).unwrap(), Some(&int(7)));
    }

    #[test]
    fn unhashable_keys_are_rejected() {
        let key = Value::List(crate::list::List::new());
        assert_eq!(
            Map::new().insert(&key, &int(1)),
            Err(MapError::NotHashable("list"))
        );
    }
}
