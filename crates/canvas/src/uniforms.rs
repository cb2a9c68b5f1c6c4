//! The uniform provider registry.
//!
//! Providers are kept in insertion order — evaluation order is observable to
//! scripts with shared state, so it must stay deterministic. A provider whose
//! evaluator is missing or misbehaves contributes nothing for that frame; the
//! GPU keeps whatever value the uniform last had.

use crate::script::{ScriptCompileError, ScriptEngine, UniformEvaluator, UniformScript};
use crate::types::{FrameContext, UniformType, UniformValue};

/// Stable identity for a provider, used by callers to correlate UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("value shape {actual} does not match declared type {declared}")]
    ValueShape {
        declared: UniformType,
        actual: UniformType,
    },
    #[error("no provider with the requested id")]
    UnknownProvider,
    #[error("provider is not script-backed")]
    NotScripted,
    #[error(transparent)]
    Script(#[from] ScriptCompileError),
}

enum ProviderKind {
    /// Fixed value uploaded every frame.
    Static(UniformValue),
    /// Script-backed value; contributes nothing until its script compiles.
    Scripted {
        script: UniformScript,
        evaluator: Option<Box<dyn UniformEvaluator>>,
    },
}

pub struct UniformProvider {
    id: ProviderId,
    name: String,
    ty: UniformType,
    kind: ProviderKind,
}

impl UniformProvider {
    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> UniformType {
        self.ty
    }

    /// Whether this provider will contribute a value next frame (static, or
    /// scripted with a successfully compiled evaluator).
    pub fn is_live(&self) -> bool {
        match &self.kind {
            ProviderKind::Static(_) => true,
            ProviderKind::Scripted { evaluator, .. } => evaluator.is_some(),
        }
    }

    pub fn script(&self) -> Option<&UniformScript> {
        match &self.kind {
            ProviderKind::Scripted { script, .. } => Some(script),
            ProviderKind::Static(_) => None,
        }
    }
}

/// One `(name, type, value)` triple ready for backend dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformUpdate {
    pub name: String,
    pub ty: UniformType,
    pub value: UniformValue,
}

/// Ordered collection of uniform providers.
#[derive(Default)]
pub struct UniformRegistry {
    providers: Vec<UniformProvider>,
    next_id: u64,
}

impl UniformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed-value provider. The value's shape must match the declared
    /// type; mismatches are rejected here so the backend never sees them.
    pub fn add_static(
        &mut self,
        name: impl Into<String>,
        ty: UniformType,
        value: UniformValue,
    ) -> Result<ProviderId, RegistryError> {
        if !value.matches(ty) {
            return Err(RegistryError::ValueShape {
                declared: ty,
                actual: value.kind(),
            });
        }
        let id = self.allocate_id();
        self.providers.push(UniformProvider {
            id,
            name: name.into(),
            ty,
            kind: ProviderKind::Static(value),
        });
        Ok(id)
    }

    /// Adds a script-backed provider. It contributes nothing until
    /// [`UniformRegistry::compile_provider`] succeeds for it.
    pub fn add_scripted(&mut self, script: UniformScript) -> ProviderId {
        let id = self.allocate_id();
        self.providers.push(UniformProvider {
            id,
            name: script.name.clone(),
            ty: script.ty,
            kind: ProviderKind::Scripted {
                script,
                evaluator: None,
            },
        });
        id
    }

    /// Removes a provider; returns false when the id is absent.
    pub fn remove(&mut self, id: ProviderId) -> bool {
        let before = self.providers.len();
        self.providers.retain(|provider| provider.id != id);
        self.providers.len() != before
    }

    /// Replaces a scripted provider's source. The installed evaluator (if
    /// any) keeps running until the next successful
    /// [`UniformRegistry::compile_provider`].
    pub fn set_script(&mut self, id: ProviderId, script: UniformScript) -> Result<(), RegistryError> {
        let provider = self
            .providers
            .iter_mut()
            .find(|provider| provider.id == id)
            .ok_or(RegistryError::UnknownProvider)?;
        match &mut provider.kind {
            ProviderKind::Static(_) => Err(RegistryError::NotScripted),
            ProviderKind::Scripted { script: current, .. } => {
                provider.name = script.name.clone();
                provider.ty = script.ty;
                *current = script;
                Ok(())
            }
        }
    }

    /// (Re)compiles one provider's script through `engine`. On failure the
    /// previously installed evaluator (if any) keeps running.
    pub fn compile_provider(
        &mut self,
        id: ProviderId,
        engine: &dyn ScriptEngine,
    ) -> Result<(), RegistryError> {
        let provider = self
            .providers
            .iter_mut()
            .find(|provider| provider.id == id)
            .ok_or(RegistryError::UnknownProvider)?;
        match &mut provider.kind {
            ProviderKind::Static(_) => Err(RegistryError::NotScripted),
            ProviderKind::Scripted { script, evaluator } => {
                let compiled = engine.compile(script)?;
                *evaluator = Some(compiled);
                Ok(())
            }
        }
    }

    /// Evaluates every live provider against `ctx`, in insertion order.
    ///
    /// A provider that raises or yields the wrong shape is skipped for this
    /// frame only — one misbehaving script must never stop the draw loop.
    pub fn evaluate_all(&mut self, ctx: &FrameContext) -> Vec<UniformUpdate> {
        let mut updates = Vec::with_capacity(self.providers.len());
        for provider in &mut self.providers {
            let value = match &mut provider.kind {
                ProviderKind::Static(value) => value.clone(),
                ProviderKind::Scripted {
                    evaluator: None, ..
                } => continue,
                ProviderKind::Scripted {
                    evaluator: Some(evaluator),
                    ..
                } => match evaluator.evaluate(ctx) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::debug!(
                            uniform = %provider.name,
                            error = %err,
                            "uniform script failed; skipping this frame"
                        );
                        continue;
                    }
                },
            };
            if !value.matches(provider.ty) {
                tracing::debug!(
                    uniform = %provider.name,
                    declared = %provider.ty,
                    actual = %value.kind(),
                    "uniform value shape mismatch; skipping this frame"
                );
                continue;
            }
            updates.push(UniformUpdate {
                name: provider.name.clone(),
                ty: provider.ty,
                value,
            });
        }
        updates
    }

    /// `(name, type)` pairs in insertion order, from which the caller can
    /// generate `uniform <type> <name>;` declarations for the header segment.
    pub fn declarations(&self) -> Vec<(String, UniformType)> {
        self.providers
            .iter()
            .map(|provider| (provider.name.clone(), provider.ty))
            .collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &UniformProvider> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn allocate_id(&mut self) -> ProviderId {
        let id = ProviderId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptRuntimeError, UniformEvaluator};

    struct FixedEvaluator(UniformValue);

    impl UniformEvaluator for FixedEvaluator {
        fn evaluate(&mut self, _ctx: &FrameContext) -> Result<UniformValue, ScriptRuntimeError> {
            Ok(self.0.clone())
        }
    }

    struct ThrowingEvaluator;

    impl UniformEvaluator for ThrowingEvaluator {
        fn evaluate(&mut self, _ctx: &FrameContext) -> Result<UniformValue, ScriptRuntimeError> {
            Err(ScriptRuntimeError::Evaluation("deliberate".into()))
        }
    }

    /// Engine that installs a canned evaluator per compile call.
    struct CannedEngine(fn() -> Box<dyn UniformEvaluator>);

    impl ScriptEngine for CannedEngine {
        fn compile(
            &self,
            _script: &UniformScript,
        ) -> Result<Box<dyn UniformEvaluator>, ScriptCompileError> {
            Ok((self.0)())
        }
    }

    struct RejectingEngine;

    impl ScriptEngine for RejectingEngine {
        fn compile(
            &self,
            _script: &UniformScript,
        ) -> Result<Box<dyn UniformEvaluator>, ScriptCompileError> {
            Err(ScriptCompileError::Parse("no".into()))
        }
    }

    fn ctx() -> FrameContext {
        FrameContext {
            canvas_width: 640,
            canvas_height: 480,
            time_seconds: 1.0,
            pointer: [0.0, 0.0],
            buttons: 0,
        }
    }

    fn script(name: &str, ty: UniformType) -> UniformScript {
        UniformScript {
            name: name.into(),
            ty,
            init: String::new(),
            frame: String::new(),
        }
    }

    #[test]
    fn static_provider_shape_is_checked_at_add() {
        let mut registry = UniformRegistry::new();
        let err = registry
            .add_static("tint", UniformType::Vec3, UniformValue::Vec2([0.0; 2]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValueShape { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_reports_absence_without_panicking() {
        let mut registry = UniformRegistry::new();
        let id = registry
            .add_static("t", UniformType::Float, UniformValue::Float(1.0))
            .unwrap();
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
    }

    #[test]
    fn uncompiled_scripted_provider_contributes_nothing() {
        let mut registry = UniformRegistry::new();
        registry.add_scripted(script("lazy", UniformType::Float));
        assert!(registry.evaluate_all(&ctx()).is_empty());
    }

    #[test]
    fn failed_compile_keeps_previous_evaluator() {
        let mut registry = UniformRegistry::new();
        let id = registry.add_scripted(script("v", UniformType::Float));
        let good = CannedEngine(|| Box::new(FixedEvaluator(UniformValue::Float(2.5))));
        registry.compile_provider(id, &good).unwrap();

        assert!(registry.compile_provider(id, &RejectingEngine).is_err());
        let updates = registry.evaluate_all(&ctx());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].value, UniformValue::Float(2.5));
    }

    #[test]
    fn throwing_provider_skips_without_stopping_the_others() {
        let mut registry = UniformRegistry::new();
        registry
            .add_static("a", UniformType::Float, UniformValue::Float(1.0))
            .unwrap();
        let bad = registry.add_scripted(script("b", UniformType::Float));
        registry
            .compile_provider(bad, &CannedEngine(|| Box::new(ThrowingEvaluator)))
            .unwrap();
        registry
            .add_static("c", UniformType::Int, UniformValue::Int(3))
            .unwrap();

        // Frame K: the throwing provider contributes nothing, its neighbours do.
        for _ in 0..2 {
            let updates = registry.evaluate_all(&ctx());
            let names: Vec<&str> = updates.iter().map(|u| u.name.as_str()).collect();
            assert_eq!(names, ["a", "c"]);
        }
    }

    #[test]
    fn set_script_keeps_the_old_evaluator_until_recompiled() {
        let mut registry = UniformRegistry::new();
        let id = registry.add_scripted(script("v", UniformType::Float));
        registry
            .compile_provider(
                id,
                &CannedEngine(|| Box::new(FixedEvaluator(UniformValue::Float(1.0)))),
            )
            .unwrap();
        registry
            .set_script(id, script("renamed", UniformType::Float))
            .unwrap();

        let updates = registry.evaluate_all(&ctx());
        assert_eq!(updates[0].name, "renamed");
        assert_eq!(updates[0].value, UniformValue::Float(1.0));
    }

    #[test]
    fn shape_mismatch_from_evaluator_is_skipped() {
        let mut registry = UniformRegistry::new();
        let id = registry.add_scripted(script("v3", UniformType::Vec3));
        registry
            .compile_provider(
                id,
                &CannedEngine(|| Box::new(FixedEvaluator(UniformValue::Vec2([1.0, 2.0])))),
            )
            .unwrap();
        assert!(registry.evaluate_all(&ctx()).is_empty());
    }

    #[test]
    fn evaluation_preserves_insertion_order() {
        let mut registry = UniformRegistry::new();
        for name in ["one", "two", "three"] {
            registry
                .add_static(name, UniformType::Float, UniformValue::Float(0.0))
                .unwrap();
        }
        let names: Vec<String> = registry
            .evaluate_all(&ctx())
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, ["one", "two", "three"]);
    }

    #[test]
    fn declarations_track_the_provider_list() {
        let mut registry = UniformRegistry::new();
        registry
            .add_static("scale", UniformType::Float, UniformValue::Float(1.0))
            .unwrap();
        let id = registry.add_scripted(script("spin", UniformType::Mat2));
        assert_eq!(
            registry.declarations(),
            vec![
                ("scale".to_string(), UniformType::Float),
                ("spin".to_string(), UniformType::Mat2),
            ]
        );
        registry.remove(id);
        assert_eq!(registry.declarations().len(), 1);
    }
}
