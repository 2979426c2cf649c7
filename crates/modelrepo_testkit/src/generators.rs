//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random model content that
//! maintains required invariants.

use modelrepo_model::{Bounds, Element, Feature, FolderKind, ObjectId, Property};
use proptest::prelude::*;

/// Strategy for generating valid object IDs.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::array::uniform16(any::<u8>()).prop_map(ObjectId::from_bytes)
}

/// Strategy for generating object names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 _-]{0,39}").expect("Invalid regex")
}

/// Strategy for generating concrete type tags.
pub fn type_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "BusinessActor".to_string(),
        "BusinessService".to_string(),
        "ApplicationComponent".to_string(),
        "Node".to_string(),
        "Capability".to_string(),
    ])
}

/// Strategy for generating a single property.
pub fn property_strategy() -> impl Strategy<Value = Property> {
    (
        prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex"),
        prop::string::string_regex("[ -~]{0,32}").expect("Invalid regex"),
    )
        .prop_map(|(key, value)| Property::new(key, value))
}

/// Strategy for generating an ordered property list.
pub fn properties_strategy() -> impl Strategy<Value = Vec<Property>> {
    prop::collection::vec(property_strategy(), 0..5)
}

/// Strategy for generating a feature set with distinct names.
pub fn features_strategy() -> impl Strategy<Value = Vec<Feature>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex"),
        prop::string::string_regex("[ -~]{0,32}").expect("Invalid regex"),
        0..5,
    )
    .prop_map(|map| {
        map.into_iter()
            .map(|(name, value)| Feature::new(name, value))
            .collect()
    })
}

/// Strategy for generating pixel bounds.
pub fn bounds_strategy() -> impl Strategy<Value = Bounds> {
    (0i32..2000, 0i32..2000, 1i32..800, 1i32..600).prop_map(|(x, y, width, height)| Bounds {
        x,
        y,
        width,
        height,
    })
}

/// Strategy for generating folder kinds.
pub fn folder_kind_strategy() -> impl Strategy<Value = FolderKind> {
    prop::sample::select(vec![
        FolderKind::Strategy,
        FolderKind::Business,
        FolderKind::Application,
        FolderKind::Technology,
        FolderKind::Motivation,
        FolderKind::Implementation,
        FolderKind::Relations,
        FolderKind::Diagrams,
        FolderKind::Other,
    ])
}

/// Strategy for generating fully populated elements.
pub fn element_strategy() -> impl Strategy<Value = Element> {
    (
        type_name_strategy(),
        name_strategy(),
        properties_strategy(),
        features_strategy(),
    )
        .prop_map(|(type_name, name, properties, features)| {
            let mut element = Element::new(type_name, name);
            element.properties = properties;
            element.features = features;
            element
        })
}
