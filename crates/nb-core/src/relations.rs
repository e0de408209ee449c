//! Typed-dependency relation hierarchy.
//!
//! Relation labels printed by the engine form a tree rooted at `dep`
//! (`dobj` is an `obj`, which is a `comp`, which is an `arg`, ...). The
//! hierarchy answers "is this relation a kind of that one".

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Root of the hierarchy.
pub const ROOT_RELATION: &str = "dep";

/// `(relation, parent)` edges.
const EDGES: &[(&str, &str)] = &[
    ("aux", "dep"),
    ("auxpass", "aux"),
    ("cop", "aux"),
    ("arg", "dep"),
    ("agent", "arg"),
    ("comp", "arg"),
    ("acomp", "comp"),
    ("attr", "comp"),
    ("ccomp", "comp"),
    ("xcomp", "comp"),
    ("compl", "comp"),
    ("obj", "comp"),
    ("dobj", "obj"),
    ("iobj", "obj"),
    ("pobj", "obj"),
    ("mark", "comp"),
    ("rel", "comp"),
    ("subj", "arg"),
    ("nsubj", "subj"),
    ("nsubjpass", "nsubj"),
    ("csubj", "subj"),
    ("cc", "dep"),
    ("conj", "dep"),
    ("expl", "dep"),
    ("mod", "dep"),
    ("abbrev", "mod"),
    ("amod", "mod"),
    ("appos", "mod"),
    ("advcl", "mod"),
    ("purpcl", "mod"),
    ("det", "mod"),
    ("predet", "mod"),
    ("preconj", "mod"),
    ("infmod", "mod"),
    ("partmod", "mod"),
    ("advmod", "mod"),
    ("neg", "advmod"),
    ("rcmod", "mod"),
    ("quantmod", "mod"),
    ("tmod", "mod"),
    ("measure", "mod"),
    ("nn", "mod"),
    ("num", "mod"),
    ("number", "mod"),
    ("prep", "mod"),
    ("poss", "mod"),
    ("possessive", "mod"),
    ("prt", "mod"),
    ("parataxis", "dep"),
    ("punct", "dep"),
    ("ref", "dep"),
    ("sdep", "dep"),
    ("xsubj", "sdep"),
];

static STANDARD: Lazy<DependencyHierarchy> = Lazy::new(|| DependencyHierarchy::from_edges(EDGES));

/// Parent/child view over the relation tree.
#[derive(Debug, Clone)]
pub struct DependencyHierarchy {
    parents: BTreeMap<String, String>,
    children: BTreeMap<String, Vec<String>>,
}

impl DependencyHierarchy {
    /// The Stanford typed-dependency hierarchy.
    pub fn standard() -> &'static DependencyHierarchy {
        &STANDARD
    }

    pub fn from_edges(edges: &[(&str, &str)]) -> Self {
        let mut parents = BTreeMap::new();
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (child, parent) in edges {
            parents.insert(child.to_string(), parent.to_string());
            children
                .entry(parent.to_string())
                .or_default()
                .push(child.to_string());
            children.entry(child.to_string()).or_default();
        }
        for list in children.values_mut() {
            list.sort();
        }
        Self { parents, children }
    }

    /// Whether `relation` names a node of the tree (after collapsing).
    pub fn contains(&self, relation: &str) -> bool {
        self.children.contains_key(canonical(relation))
    }

    pub fn parent(&self, relation: &str) -> Option<&str> {
        self.parents.get(canonical(relation)).map(String::as_str)
    }

    /// Direct children, sorted.
    pub fn children(&self, relation: &str) -> &[String] {
        self.children
            .get(canonical(relation))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All relations below `relation`, sorted.
    pub fn descendants(&self, relation: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self.children(relation).iter().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            out.push(next.to_string());
            stack.extend(self.children(next).iter().map(String::as_str));
        }
        out.sort();
        out
    }

    /// Path from `relation` up to the root, excluding `relation` itself.
    pub fn ancestors(&self, relation: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = canonical(relation);
        while let Some(parent) = self.parents.get(current) {
            out.push(parent.clone());
            current = parent.as_str();
        }
        out
    }

    /// True when `relation` is `ancestor` or lies below it.
    ///
    /// Collapsed labels such as `prep_on` or `conj_and` are judged by their
    /// base relation. Unknown labels are never a kind of anything.
    pub fn isa(&self, relation: &str, ancestor: &str) -> bool {
        let relation = canonical(relation);
        let ancestor = canonical(ancestor);
        if !self.children.contains_key(relation) || !self.children.contains_key(ancestor) {
            return false;
        }
        relation == ancestor || self.ancestors(relation).iter().any(|a| a == ancestor)
    }

    /// Every relation in the tree, sorted.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// Base relation of a collapsed label (`prep_on` and `prepc_while` -> `prep`).
pub fn canonical(relation: &str) -> &str {
    match relation.split_once('_') {
        Some(("prepc", _)) => "prep",
        Some((base, _)) if !base.is_empty() => base,
        _ => relation,
    }
}
