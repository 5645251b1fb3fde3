//! The metadata registry.
//!
//! # Responsibilities
//! - Store metadata per controller type, in registration order
//! - Reject duplicate `(method, pattern)` actions on the same type
//! - Answer lookups across a type and its declared ancestors
//!
//! # Design Decisions
//! - An owned value, populated at startup and read when dispatchers are
//!   built; no global state
//! - Multi-entry lookups merge ancestors first, then the type itself
//! - Single-entry lookups return the closest registration (self first)
//! - Errors from the fluent builder are recorded and reported when a
//!   dispatcher for an affected controller is built

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use crate::error::ConfigError;
use crate::registry::metadata::{
    ActionMetadata, ContextInjectionMetadata, ControllerMetadata, ControllerType, ErrorFn, HookFn,
    HookMetadata, Instance, MiddlewareMetadata, ParentLink, RouteFn, UpcastFn,
};

#[derive(Default)]
struct TypeMetadata {
    parent: Option<ParentLink>,
    controller: Option<ControllerMetadata>,
    actions: Vec<ActionMetadata>,
    methods: HashMap<String, RouteFn>,
    middlewares: Vec<MiddlewareMetadata>,
    contexts: Vec<ContextInjectionMetadata>,
    error_handler: Option<HookMetadata<ErrorFn>>,
    no_match_handler: Option<HookMetadata<RouteFn>>,
    before_request: Option<HookMetadata<HookFn>>,
    after_request: Option<HookMetadata<HookFn>>,
}

/// Metadata for every registered controller type.
#[derive(Default)]
pub struct MetadataRegistry {
    types: HashMap<TypeId, TypeMetadata>,
    errors: Vec<(TypeId, ConfigError)>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, target: ControllerType) -> &mut TypeMetadata {
        self.types.entry(target.id).or_default()
    }

    pub fn add_controller(&mut self, metadata: ControllerMetadata) {
        let target = metadata.target;
        self.entry(target).controller = Some(metadata);
    }

    /// Register an action. Fails if the type already has an action with the
    /// same method and pattern; ancestors are not considered.
    pub fn add_action(&mut self, metadata: ActionMetadata) -> Result<(), ConfigError> {
        let entry = self.entry(metadata.target);

        if entry.actions.iter().any(|action| action.same_route(&metadata)) {
            return Err(ConfigError::ConflictingRoute {
                controller: metadata.target.name,
                method: metadata.method,
                pattern: metadata.pattern.key(),
            });
        }

        entry.actions.push(metadata);
        Ok(())
    }

    /// Define or override a method on `target`.
    pub fn add_method(&mut self, target: ControllerType, name: impl Into<String>, handler: RouteFn) {
        self.entry(target).methods.insert(name.into(), handler);
    }

    pub fn add_middleware(&mut self, metadata: MiddlewareMetadata) {
        self.entry(metadata.target).middlewares.push(metadata);
    }

    pub fn add_context(&mut self, metadata: ContextInjectionMetadata) {
        self.entry(metadata.target).contexts.push(metadata);
    }

    pub fn set_error_handler(&mut self, metadata: HookMetadata<ErrorFn>) {
        let target = metadata.target;
        self.entry(target).error_handler = Some(metadata);
    }

    pub fn set_no_match_handler(&mut self, metadata: HookMetadata<RouteFn>) {
        let target = metadata.target;
        self.entry(target).no_match_handler = Some(metadata);
    }

    pub fn set_before_request(&mut self, metadata: HookMetadata<HookFn>) {
        let target = metadata.target;
        self.entry(target).before_request = Some(metadata);
    }

    pub fn set_after_request(&mut self, metadata: HookMetadata<HookFn>) {
        let target = metadata.target;
        self.entry(target).after_request = Some(metadata);
    }

    /// Declare `parent` as the ancestor of `child`. `upcast` projects a
    /// child instance onto the parent instance it embeds.
    pub fn set_parent(&mut self, child: ControllerType, parent: ControllerType, upcast: UpcastFn) {
        self.entry(parent);
        self.entry(child).parent = Some(ParentLink {
            target: parent,
            upcast,
        });
    }

    pub(crate) fn record_error(&mut self, target: ControllerType, error: ConfigError) {
        self.errors.push((target.id, error));
    }

    /// First recorded registration error affecting `target` or an ancestor.
    pub fn error_for(&self, target: TypeId) -> Option<&ConfigError> {
        let lineage: HashSet<TypeId> = self.lineage(target).into_iter().collect();
        self.errors
            .iter()
            .find(|(id, _)| lineage.contains(id))
            .map(|(_, error)| error)
    }

    pub fn contains(&self, target: TypeId) -> bool {
        self.types.contains_key(&target)
    }

    /// `target` followed by its ancestors, closest first. Stops at a cycle.
    pub fn lineage(&self, target: TypeId) -> Vec<TypeId> {
        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(target);

        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            lineage.push(id);
            current = self
                .types
                .get(&id)
                .and_then(|meta| meta.parent.as_ref())
                .map(|link| link.target.id);
        }

        lineage
    }

    /// Ancestors first, then `target`.
    fn lineage_root_first(&self, target: TypeId) -> impl Iterator<Item = &TypeMetadata> {
        let mut lineage = self.lineage(target);
        lineage.reverse();
        lineage.into_iter().filter_map(move |id| self.types.get(&id))
    }

    fn closest<T>(&self, target: TypeId, pick: impl Fn(&TypeMetadata) -> Option<&T>) -> Option<&T> {
        self.lineage(target)
            .into_iter()
            .filter_map(|id| self.types.get(&id))
            .find_map(pick)
    }

    pub fn get_controller(&self, target: TypeId) -> Option<&ControllerMetadata> {
        self.closest(target, |meta| meta.controller.as_ref())
    }

    /// Actions of `target` and its ancestors. A `(method, pattern)` declared
    /// again by a descendant replaces the ancestor's action in place.
    pub fn get_actions(&self, target: TypeId) -> Vec<ActionMetadata> {
        let mut merged: Vec<ActionMetadata> = Vec::new();

        for meta in self.lineage_root_first(target) {
            for action in &meta.actions {
                match merged.iter_mut().find(|existing| existing.same_route(action)) {
                    Some(existing) => *existing = action.clone(),
                    None => merged.push(action.clone()),
                }
            }
        }

        merged
    }

    pub fn get_middlewares(&self, target: TypeId) -> Vec<MiddlewareMetadata> {
        self.lineage_root_first(target)
            .flat_map(|meta| meta.middlewares.iter().cloned())
            .collect()
    }

    pub fn get_contexts(&self, target: TypeId) -> Vec<ContextInjectionMetadata> {
        self.lineage_root_first(target)
            .flat_map(|meta| meta.contexts.iter().cloned())
            .collect()
    }

    pub fn get_error_handler(&self, target: TypeId) -> Option<&HookMetadata<ErrorFn>> {
        self.closest(target, |meta| meta.error_handler.as_ref())
    }

    pub fn get_no_match_handler(&self, target: TypeId) -> Option<&HookMetadata<RouteFn>> {
        self.closest(target, |meta| meta.no_match_handler.as_ref())
    }

    pub fn get_before_request(&self, target: TypeId) -> Option<&HookMetadata<HookFn>> {
        self.closest(target, |meta| meta.before_request.as_ref())
    }

    pub fn get_after_request(&self, target: TypeId) -> Option<&HookMetadata<HookFn>> {
        self.closest(target, |meta| meta.after_request.as_ref())
    }

    /// Resolve a method by name, most-derived definition first. Returns the
    /// type that defines it along with the handler.
    pub fn resolve_method(&self, target: TypeId, name: &str) -> Option<(TypeId, RouteFn)> {
        self.lineage(target).into_iter().find_map(|id| {
            self.types
                .get(&id)
                .and_then(|meta| meta.methods.get(name))
                .map(|handler| (id, handler.clone()))
        })
    }

    /// Project `instance` onto every type in its lineage.
    pub fn instances(
        &self,
        target: ControllerType,
        instance: Instance,
    ) -> Result<HashMap<TypeId, Instance>, ConfigError> {
        let mut instances = HashMap::new();
        let mut current = (target, instance);
        let mut seen = HashSet::new();

        loop {
            let (ty, instance) = current;
            if !seen.insert(ty.id) {
                break;
            }
            instances.insert(ty.id, instance.clone());

            let Some(link) = self.types.get(&ty.id).and_then(|meta| meta.parent.as_ref()) else {
                break;
            };
            let parent = (link.upcast)(&instance).ok_or(ConfigError::MissingParent {
                child: ty.name,
                parent: link.target.name,
            })?;
            current = (link.target, parent);
        }

        Ok(instances)
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("types", &self.types.len())
            .field("errors", &self.errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ActionMethod, RoutePattern};
    use std::sync::Arc;

    struct Base;
    struct Derived;

    fn action(target: ControllerType, method: ActionMethod, pattern: &str, name: &str) -> ActionMetadata {
        ActionMetadata {
            target,
            pattern: RoutePattern::from(pattern),
            method,
            method_name: name.to_string(),
        }
    }

    fn upcast_to_base() -> UpcastFn {
        Arc::new(|_instance: &Instance| Some(Arc::new(Base) as Instance))
    }

    #[test]
    fn test_duplicate_action_is_rejected() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();

        registry.add_action(action(base, ActionMethod::Get, "/a", "a")).unwrap();
        registry.add_action(action(base, ActionMethod::Post, "/a", "a2")).unwrap();
        let err = registry
            .add_action(action(base, ActionMethod::Get, "/a", "a3"))
            .unwrap_err();

        assert!(matches!(err, ConfigError::ConflictingRoute { .. }));
        assert_eq!(registry.get_actions(base.id).len(), 2);
    }

    #[test]
    fn test_regex_and_path_with_same_text_do_not_conflict() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();

        registry.add_action(action(base, ActionMethod::Get, "/x/", "path")).unwrap();
        registry
            .add_action(ActionMetadata {
                target: base,
                pattern: RoutePattern::from(regex::Regex::new("x").unwrap()),
                method: ActionMethod::Get,
                method_name: "regex".to_string(),
            })
            .unwrap();

        assert_eq!(registry.get_actions(base.id).len(), 2);
    }

    #[test]
    fn test_same_route_on_child_is_not_a_conflict() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();
        let derived = ControllerType::of::<Derived>();
        registry.set_parent(derived, base, upcast_to_base());

        registry.add_action(action(base, ActionMethod::Get, "/number", "base_number")).unwrap();
        registry.add_action(action(base, ActionMethod::Get, "/string", "string")).unwrap();
        registry.add_action(action(derived, ActionMethod::Get, "/number", "number")).unwrap();
        registry.add_action(action(derived, ActionMethod::Get, "/extra", "extra")).unwrap();

        let names: Vec<String> = registry
            .get_actions(derived.id)
            .into_iter()
            .map(|a| a.method_name)
            .collect();
        assert_eq!(names, vec!["number", "string", "extra"]);
    }

    #[test]
    fn test_single_entry_lookup_prefers_closest() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();
        let derived = ControllerType::of::<Derived>();
        registry.set_parent(derived, base, upcast_to_base());

        let config = crate::registry::ControllerConfig::new().status_code_on_null(200);
        registry.add_controller(ControllerMetadata { target: base, config });
        assert_eq!(
            registry.get_controller(derived.id).map(|c| c.config.status_code_on_null),
            Some(200)
        );

        let config = crate::registry::ControllerConfig::new().status_code_on_null(204);
        registry.add_controller(ControllerMetadata { target: derived, config });
        assert_eq!(
            registry.get_controller(derived.id).map(|c| c.config.status_code_on_null),
            Some(204)
        );
        assert_eq!(
            registry.get_controller(base.id).map(|c| c.config.status_code_on_null),
            Some(200)
        );
    }

    #[test]
    fn test_lineage_is_cycle_safe() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();
        let derived = ControllerType::of::<Derived>();
        registry.set_parent(derived, base, upcast_to_base());
        registry.set_parent(base, derived, Arc::new(|i: &Instance| Some(i.clone())));

        assert_eq!(registry.lineage(derived.id), vec![derived.id, base.id]);
    }

    #[test]
    fn test_missing_parent_projection() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();
        let derived = ControllerType::of::<Derived>();
        registry.set_parent(derived, base, Arc::new(|_: &Instance| None));

        let err = registry
            .instances(derived, Arc::new(Derived) as Instance)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParent { .. }));
    }

    #[test]
    fn test_recorded_errors_follow_lineage() {
        let mut registry = MetadataRegistry::new();
        let base = ControllerType::of::<Base>();
        let derived = ControllerType::of::<Derived>();
        registry.set_parent(derived, base, upcast_to_base());
        registry.record_error(base, ConfigError::InvalidPrefix("x".into()));

        assert!(registry.error_for(derived.id).is_some());
        assert!(registry.error_for(TypeId::of::<u8>()).is_none());
    }
}
