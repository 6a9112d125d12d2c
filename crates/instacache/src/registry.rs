// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type resolution by qualified or bare name.

use std::sync::Arc;

use crate::{EntityType, Error};

/// The set of entity types a cache knows about.
///
/// Names resolve either qualified (`namespace.Type`, namespace matched exactly)
/// or bare (`Type`); type names always match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<Arc<EntityType>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type, replacing any type registered under the same label.
    pub fn register(&mut self, entity_type: EntityType) -> Arc<EntityType> {
        let entity_type = Arc::new(entity_type);
        let label = entity_type.label();
        match self.types.iter_mut().find(|existing| existing.label() == label) {
            Some(existing) => *existing = Arc::clone(&entity_type),
            None => self.types.push(Arc::clone(&entity_type)),
        }
        entity_type
    }

    /// Returns the registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.types.iter()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolves a type name to its descriptor.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if nothing matches and `AmbiguousType` if a bare name
    /// matches types in more than one namespace.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<EntityType>, Error> {
        if let Some((namespace, name)) = type_name.split_once('.') {
            let wanted = name.to_lowercase();
            return self
                .types
                .iter()
                .find(|ty| ty.namespace() == namespace && ty.model_name() == wanted)
                .map(Arc::clone)
                .ok_or_else(|| Error::unknown_type(type_name));
        }

        // Model names are stored lowercased.
        let wanted = type_name.to_lowercase();
        let mut matches = self.types.iter().filter(|ty| ty.model_name() == wanted);
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(Arc::clone(only)),
            (None, _) => Err(Error::unknown_type(type_name)),
            (Some(_), Some(_)) => {
                let candidates: Vec<String> = self
                    .types
                    .iter()
                    .filter(|ty| ty.model_name() == wanted)
                    .map(|ty| ty.label())
                    .collect();
                Err(Error::ambiguous_type(type_name, &candidates))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::model::tests::Gizmo;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(EntityType::builder("shop", "Widget").field("id").build::<Gizmo>());
        registry.register(EntityType::builder("shop", "Order").field("id").build::<Gizmo>());
        registry.register(EntityType::builder("stock", "Order").field("id").build::<Gizmo>());
        registry
    }

    #[test]
    fn bare_name_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.resolve("widget").unwrap().label(), "shop.widget");
        assert_eq!(registry.resolve("WIDGET").unwrap().label(), "shop.widget");
    }

    #[test]
    fn non_ascii_names_fold_case() {
        let mut registry = registry();
        registry.register(EntityType::builder("shop", "Äpfel").field("id").build::<Gizmo>());

        assert_eq!(registry.resolve("Äpfel").unwrap().label(), "shop.äpfel");
        assert_eq!(registry.resolve("äpfel").unwrap().label(), "shop.äpfel");
        assert_eq!(registry.resolve("shop.ÄPFEL").unwrap().label(), "shop.äpfel");
    }

    #[test]
    fn qualified_name_disambiguates() {
        let registry = registry();
        assert_eq!(registry.resolve("stock.Order").unwrap().label(), "stock.order");
        assert_eq!(registry.resolve("shop.order").unwrap().label(), "shop.order");
    }

    #[test]
    fn bare_name_matching_two_namespaces_is_ambiguous() {
        let error = registry().resolve("Order").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AmbiguousType);
        assert!(error.to_string().contains("shop.order"));
        assert!(error.to_string().contains("stock.order"));
    }

    #[test]
    fn unknown_names_fail() {
        let registry = registry();
        assert_eq!(registry.resolve("Gadget").unwrap_err().kind(), ErrorKind::UnknownType);
        assert_eq!(registry.resolve("depot.Widget").unwrap_err().kind(), ErrorKind::UnknownType);
        assert_eq!(registry.resolve("Shop.Widget").unwrap_err().kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn reregistering_a_label_replaces_it() {
        let mut registry = registry();
        assert_eq!(registry.len(), 3);
        registry.register(
            EntityType::builder("shop", "widget")
                .field("id")
                .field("name")
                .build::<Gizmo>(),
        );
        assert_eq!(registry.len(), 3);
        assert!(registry.resolve("Widget").unwrap().declares("name"));
        assert!(!registry.is_empty());
        assert_eq!(registry.types().count(), 3);
    }
}
