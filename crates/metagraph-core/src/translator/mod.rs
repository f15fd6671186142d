//! Translator graph and path planning
//!
//! Translators are unit-cost directed edges between concrete types. The
//! planner runs a breadth-first search over them, exploring outgoing edges in
//! registration order so that ties between equal-length chains always resolve
//! the same way.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::{KernelError, MetagraphError, Result};
use crate::types::ConcreteTypeId;
use crate::value::Value;

/// Translator body.
pub type TranslateFn = Arc<dyn Fn(Value) -> Result<Value, KernelError> + Send + Sync>;

/// Pure single-step conversion between two concrete types.
#[derive(Clone)]
pub struct Translator {
    name: String,
    src: ConcreteTypeId,
    dst: ConcreteTypeId,
    func: TranslateFn,
}

impl Translator {
    pub fn new(
        name: impl Into<String>,
        src: impl Into<ConcreteTypeId>,
        dst: impl Into<ConcreteTypeId>,
        func: impl Fn(Value) -> Result<Value, KernelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
            dst: dst.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src(&self) -> &ConcreteTypeId {
        &self.src
    }

    pub fn dst(&self) -> &ConcreteTypeId {
        &self.dst
    }

    pub fn call(&self, value: Value) -> Result<Value, KernelError> {
        (self.func)(value)
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Translator<{}: {} -> {}>", self.name, self.src, self.dst)
    }
}

/// A planned chain of translators, executed only on request.
#[derive(Debug, Clone)]
pub struct TranslationPath {
    src: ConcreteTypeId,
    dst: ConcreteTypeId,
    steps: Vec<Arc<Translator>>,
    verify: bool,
}

impl TranslationPath {
    /// Zero-hop path. `verify` asks the executor to re-check membership.
    pub fn identity(ty: ConcreteTypeId, verify: bool) -> Self {
        Self {
            src: ty.clone(),
            dst: ty,
            steps: Vec::new(),
            verify,
        }
    }

    pub fn src(&self) -> &ConcreteTypeId {
        &self.src
    }

    pub fn dst(&self) -> &ConcreteTypeId {
        &self.dst
    }

    pub fn steps(&self) -> &[Arc<Translator>] {
        &self.steps
    }

    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn requires_verification(&self) -> bool {
        self.verify
    }

    /// Thread `value` through every step in order.
    pub fn translate(&self, value: Value) -> Result<Value> {
        self.steps.iter().try_fold(value, |current, step| {
            step.call(current)
                .map_err(|err| MetagraphError::kernel(format!("translator {}", step.name()), err))
        })
    }
}

/// Directed graph of registered translators.
#[derive(Debug, Default)]
pub struct TranslatorGraph {
    edges: Vec<Arc<Translator>>,
    outgoing: HashMap<ConcreteTypeId, Vec<usize>>,
    pairs: HashMap<(ConcreteTypeId, ConcreteTypeId), usize>,
    max_hops: Option<usize>,
}

impl TranslatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the search depth; longer chains count as missing.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn set_max_hops(&mut self, max_hops: Option<usize>) {
        self.max_hops = max_hops;
    }

    /// Add one edge. At most one translator per ordered pair.
    pub fn add(&mut self, translator: Translator) -> Result<()> {
        let pair = (translator.src.clone(), translator.dst.clone());
        if let Some(&existing) = self.pairs.get(&pair) {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "translator {} -> {} ({} conflicts with {})",
                pair.0,
                pair.1,
                translator.name,
                self.edges[existing].name
            )));
        }

        let idx = self.edges.len();
        self.outgoing.entry(pair.0.clone()).or_default().push(idx);
        self.pairs.insert(pair, idx);
        self.edges.push(Arc::new(translator));
        Ok(())
    }

    pub fn get(&self, src: &ConcreteTypeId, dst: &ConcreteTypeId) -> Option<&Arc<Translator>> {
        self.pairs
            .get(&(src.clone(), dst.clone()))
            .map(|&idx| &self.edges[idx])
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Translators in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Translator>> {
        self.edges.iter()
    }

    /// Find the fewest-hop chain from `src` to `dst`.
    pub fn find_path(
        &self,
        src: &ConcreteTypeId,
        dst: &ConcreteTypeId,
        exact: bool,
    ) -> Result<TranslationPath> {
        if src == dst {
            return Ok(TranslationPath::identity(src.clone(), exact));
        }

        let mut parent: HashMap<&ConcreteTypeId, usize> = HashMap::new();
        let mut visited: HashSet<&ConcreteTypeId> = HashSet::from([src]);
        let mut queue: VecDeque<(&ConcreteTypeId, usize)> = VecDeque::from([(src, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if self.max_hops.is_some_and(|max| depth >= max) {
                continue;
            }
            for &edge_idx in self.outgoing.get(node).into_iter().flatten() {
                let next = &self.edges[edge_idx].dst;
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, edge_idx);
                if next == dst {
                    let path = self.walk_back(&parent, src, dst);
                    tracing::debug!(
                        src = %src,
                        dst = %dst,
                        hops = path.hops(),
                        "translation path found"
                    );
                    return Ok(path);
                }
                queue.push_back((next, depth + 1));
            }
        }

        Err(MetagraphError::NoTranslationPath {
            src: src.clone(),
            dst: dst.clone(),
        })
    }

    fn walk_back(
        &self,
        parent: &HashMap<&ConcreteTypeId, usize>,
        src: &ConcreteTypeId,
        dst: &ConcreteTypeId,
    ) -> TranslationPath {
        let mut steps = Vec::new();
        let mut cursor = dst;
        while cursor != src {
            let edge = &self.edges[parent[cursor]];
            steps.push(edge.clone());
            cursor = &edge.src;
        }
        steps.reverse();
        TranslationPath {
            src: src.clone(),
            dst: dst.clone(),
            steps,
            verify: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &'static str) -> impl Fn(Value) -> Result<Value, KernelError> {
        move |value| {
            let mut trail = value.cast::<Vec<&'static str>>()?.clone();
            trail.push(name);
            Ok(Value::new(trail))
        }
    }

    fn graph(edges: &[(&'static str, &str, &str)]) -> TranslatorGraph {
        let mut graph = TranslatorGraph::new();
        for (name, src, dst) in edges {
            graph
                .add(Translator::new(*name, *src, *dst, tag(*name)))
                .expect("add translator");
        }
        graph
    }

    fn id(name: &str) -> ConcreteTypeId {
        ConcreteTypeId::from(name)
    }

    #[test]
    fn test_single_translator_gives_one_hop() {
        let graph = graph(&[("a_to_b", "A", "B")]);
        let path = graph.find_path(&id("A"), &id("B"), false).expect("path");
        assert_eq!(path.hops(), 1);
        assert_eq!(path.steps()[0].name(), "a_to_b");
    }

    #[test]
    fn test_two_hop_chain_without_direct_edge() {
        let graph = graph(&[("a_to_b", "A", "B"), ("b_to_c", "B", "C")]);
        let path = graph.find_path(&id("A"), &id("C"), false).expect("path");
        assert_eq!(path.hops(), 2);

        let out = path.translate(Value::new(Vec::<&'static str>::new())).expect("run");
        assert_eq!(
            out.cast::<Vec<&'static str>>().expect("trail"),
            &vec!["a_to_b", "b_to_c"]
        );
    }

    #[test]
    fn test_direct_edge_preferred_over_chain() {
        let graph = graph(&[
            ("a_to_b", "A", "B"),
            ("b_to_c", "B", "C"),
            ("a_to_c", "A", "C"),
        ]);
        let path = graph.find_path(&id("A"), &id("C"), false).expect("path");
        assert_eq!(path.hops(), 1);
        assert_eq!(path.steps()[0].name(), "a_to_c");
    }

    #[test]
    fn test_equal_length_chains_break_ties_by_registration_order() {
        let graph = graph(&[
            ("a_to_x", "A", "X"),
            ("a_to_y", "A", "Y"),
            ("y_to_d", "Y", "D"),
            ("x_to_d", "X", "D"),
        ]);
        let path = graph.find_path(&id("A"), &id("D"), false).expect("path");
        let names: Vec<_> = path.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a_to_x", "x_to_d"]);
    }

    #[test]
    fn test_identity_when_types_match() {
        let graph = graph(&[("a_to_b", "A", "B")]);
        let path = graph.find_path(&id("A"), &id("A"), false).expect("identity");
        assert!(path.is_identity());
        assert!(!path.requires_verification());
        assert!(graph
            .find_path(&id("A"), &id("A"), true)
            .expect("exact identity")
            .requires_verification());
    }

    #[test]
    fn test_missing_path_names_both_types() {
        let graph = graph(&[("a_to_b", "A", "B")]);
        let err = graph.find_path(&id("B"), &id("A"), false).expect_err("no path");
        let message = err.to_string();
        assert!(message.contains("from B to A"), "{message}");
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let mut graph = graph(&[("a_to_b", "A", "B")]);
        let err = graph
            .add(Translator::new("other_a_to_b", "A", "B", tag("other")))
            .expect_err("duplicate");
        assert!(matches!(err, MetagraphError::DuplicateRegistration(_)));
    }

    #[test]
    fn test_max_hops_bounds_search() {
        let graph = graph(&[("a_to_b", "A", "B"), ("b_to_c", "B", "C")]).with_max_hops(1);
        assert!(graph.find_path(&id("A"), &id("B"), false).is_ok());
        assert!(graph.find_path(&id("A"), &id("C"), false).is_err());
    }
}
