//! Algorithm dispatcher
//!
//! Selects a concrete implementation for an abstract call and the translation
//! plan for each argument that does not already have an accepted type.
//!
//! Selection order:
//! 1. first implementation (registration order) matching every argument as-is
//! 2. otherwise the viable implementation with the fewest total hops,
//!    ties broken by registration order

use std::sync::Arc;

use crate::algorithm::{AbstractAlgorithm, Accepts, AlgorithmCatalog, ConcreteAlgorithm};
use crate::error::{MetagraphError, Result};
use crate::translator::{TranslationPath, TranslatorGraph};
use crate::types::ConcreteTypeId;

/// Planning-time view of one argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSignature {
    /// Argument at an abstract-typed position, with its concrete type
    Typed(ConcreteTypeId),
    /// Argument at a plain value position
    Value,
}

/// How implementations are chosen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Consider every registered implementation
    #[default]
    General,
    /// Consider only the named plugin's implementations
    Exact {
        plugin: String,
        allow_translation: bool,
    },
}

impl Dispatch {
    pub fn exact(plugin: impl Into<String>) -> Self {
        Self::Exact {
            plugin: plugin.into(),
            allow_translation: true,
        }
    }

    /// Exact dispatch that refuses to translate arguments.
    pub fn exact_strict(plugin: impl Into<String>) -> Self {
        Self::Exact {
            plugin: plugin.into(),
            allow_translation: false,
        }
    }
}

/// Selected implementation plus per-argument translations
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    algorithm: Arc<ConcreteAlgorithm>,
    translations: Vec<Option<TranslationPath>>,
}

impl DispatchPlan {
    pub fn algorithm(&self) -> &Arc<ConcreteAlgorithm> {
        &self.algorithm
    }

    /// `None` for arguments passed through unchanged
    pub fn translations(&self) -> &[Option<TranslationPath>] {
        &self.translations
    }

    pub fn hops(&self) -> usize {
        self.translations.iter().flatten().map(|p| p.hops()).sum()
    }

    pub fn is_direct(&self) -> bool {
        self.translations.iter().all(Option::is_none)
    }
}

/// Read-only planner over the catalog and translator graph
pub struct Dispatcher<'a> {
    catalog: &'a AlgorithmCatalog,
    translators: &'a TranslatorGraph,
}

impl<'a> Dispatcher<'a> {
    pub fn new(catalog: &'a AlgorithmCatalog, translators: &'a TranslatorGraph) -> Self {
        Self {
            catalog,
            translators,
        }
    }

    pub fn resolve(
        &self,
        signature: &AbstractAlgorithm,
        args: &[ArgSignature],
        dispatch: &Dispatch,
    ) -> Result<DispatchPlan> {
        let path = signature.path();
        let candidates: Vec<&Arc<ConcreteAlgorithm>> = match dispatch {
            Dispatch::General => self.catalog.implementations(path).iter().collect(),
            Dispatch::Exact { plugin, .. } => {
                let chosen: Vec<_> = self
                    .catalog
                    .implementations(path)
                    .iter()
                    .filter(|c| c.plugin() == plugin)
                    .collect();
                if chosen.is_empty() {
                    return Err(MetagraphError::UnknownAlgorithm(format!(
                        "{}.{}",
                        path, plugin
                    )));
                }
                chosen
            }
        };

        if let Some(direct) = candidates.iter().find(|c| matches_exactly(c, args)) {
            tracing::debug!(
                algorithm = %path,
                plugin = %direct.plugin(),
                implementation = %direct.name(),
                "dispatch matched exactly"
            );
            return Ok(DispatchPlan {
                algorithm: Arc::clone(direct),
                translations: vec![None; args.len()],
            });
        }

        let mut best: Option<DispatchPlan> = None;
        let mut rejections = Vec::new();
        for candidate in &candidates {
            match self.plan_for(candidate, args) {
                Ok(plan) => {
                    if best.as_ref().map_or(true, |b| plan.hops() < b.hops()) {
                        best = Some(plan);
                    }
                }
                Err(reason) => {
                    tracing::debug!(
                        algorithm = %path,
                        plugin = %candidate.plugin(),
                        implementation = %candidate.name(),
                        reason = %reason,
                        "dispatch candidate not viable"
                    );
                    rejections.push(reason);
                }
            }
        }

        if best.is_none() {
            tracing::warn!(
                algorithm = %path,
                candidates = candidates.len(),
                "no dispatch candidate is viable"
            );
        }

        match (dispatch, best) {
            (Dispatch::General, Some(plan)) => {
                tracing::debug!(
                    algorithm = %path,
                    plugin = %plan.algorithm.plugin(),
                    implementation = %plan.algorithm.name(),
                    hops = plan.hops(),
                    "dispatch selected translated plan"
                );
                Ok(plan)
            }
            (Dispatch::General, None) => Err(MetagraphError::NoViableDispatch(path.to_string())),
            (
                Dispatch::Exact {
                    plugin,
                    allow_translation,
                },
                Some(plan),
            ) => {
                if !allow_translation {
                    let params: Vec<&str> = signature
                        .params()
                        .iter()
                        .zip(plan.translations())
                        .filter(|(_, t)| t.is_some())
                        .map(|(p, _)| p.name())
                        .collect();
                    return Err(MetagraphError::TranslationsRequired {
                        algorithm: path.to_string(),
                        plugin: plugin.clone(),
                        params: params.join(", "),
                    });
                }
                Ok(plan)
            }
            (Dispatch::Exact { plugin, .. }, None) => {
                Err(MetagraphError::ExactDispatchUnsatisfiable {
                    algorithm: path.to_string(),
                    plugin: plugin.clone(),
                    reason: rejections.join("; "),
                })
            }
        }
    }

    fn plan_for(
        &self,
        candidate: &Arc<ConcreteAlgorithm>,
        args: &[ArgSignature],
    ) -> std::result::Result<DispatchPlan, String> {
        let mut translations = Vec::with_capacity(args.len());
        for (position, (accepts, arg)) in candidate.accepts().iter().zip(args).enumerate() {
            let translation = match (accepts, arg) {
                (Accepts::Value, _) => None,
                (Accepts::Concrete(choices), ArgSignature::Typed(src)) => {
                    if choices.contains(src) {
                        None
                    } else {
                        let shortest = choices
                            .iter()
                            .filter_map(|dst| self.translators.find_path(src, dst, false).ok())
                            .min_by_key(TranslationPath::hops);
                        match shortest {
                            Some(path) => Some(path),
                            None => {
                                return Err(format!(
                                    "argument {} of type {} cannot be translated to {}",
                                    position,
                                    src,
                                    join_types(choices)
                                ))
                            }
                        }
                    }
                }
                (Accepts::Concrete(_), ArgSignature::Value) => {
                    return Err(format!("argument {} has no concrete type", position))
                }
            };
            translations.push(translation);
        }
        Ok(DispatchPlan {
            algorithm: Arc::clone(candidate),
            translations,
        })
    }
}

fn matches_exactly(candidate: &ConcreteAlgorithm, args: &[ArgSignature]) -> bool {
    candidate
        .accepts()
        .iter()
        .zip(args)
        .all(|(accepts, arg)| match (accepts, arg) {
            (Accepts::Value, _) => true,
            (Accepts::Concrete(choices), ArgSignature::Typed(ty)) => choices.contains(ty),
            (Accepts::Concrete(_), ArgSignature::Value) => false,
        })
}

fn join_types(types: &[ConcreteTypeId]) -> String {
    types
        .iter()
        .map(ConcreteTypeId::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}
