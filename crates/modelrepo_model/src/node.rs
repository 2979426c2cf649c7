//! The closed set of node variants that make up a model graph.
//!
//! Every variant implements the [`ModelObject`] capability: a stable
//! identifier, versioning metadata, and a checksum hook. Type-specific
//! export/import logic dispatches on [`ObjectKind`] rather than on a
//! parallel inheritance ladder.

use crate::checksum::{ChecksumBuilder, Checksummed};
use crate::id::ObjectId;
use crate::metadata::VersionedMetadata;

/// Tag identifying one node variant.
///
/// The declaration order is the pipeline order: parents strictly precede
/// the kinds that reference them, so containment and reference assignment
/// never dangle during import and foreign keys resolve during export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    /// Classification profile (specialization tag).
    Profile,
    /// Container folder.
    Folder,
    /// Leaf content element.
    Element,
    /// Relationship between two elements.
    Relationship,
    /// View container (diagram).
    View,
    /// Visual node inside a view.
    ViewNode,
    /// Visual connection inside a view.
    ViewConnection,
    /// Attached binary image.
    Image,
}

impl ObjectKind {
    /// All kinds, in pipeline order.
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Profile,
        ObjectKind::Folder,
        ObjectKind::Element,
        ObjectKind::Relationship,
        ObjectKind::View,
        ObjectKind::ViewNode,
        ObjectKind::ViewConnection,
        ObjectKind::Image,
    ];

    /// Stable lowercase label, used for progress reporting and table names.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Profile => "profile",
            ObjectKind::Folder => "folder",
            ObjectKind::Element => "element",
            ObjectKind::Relationship => "relationship",
            ObjectKind::View => "view",
            ObjectKind::ViewNode => "view_node",
            ObjectKind::ViewConnection => "view_connection",
            ObjectKind::Image => "image",
        }
    }

    /// Returns true for kinds that contain other objects.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, ObjectKind::Folder | ObjectKind::View)
    }
}

/// Common capability of every identified versioned object.
pub trait ModelObject: Checksummed {
    /// Stable identifier.
    fn id(&self) -> ObjectId;
    /// Variant tag.
    fn kind(&self) -> ObjectKind;
    /// Versioning metadata.
    fn metadata(&self) -> &VersionedMetadata;
    /// Mutable versioning metadata.
    fn metadata_mut(&mut self) -> &mut VersionedMetadata;
}

/// A key/value property attached to an object, in rank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: String,
}

impl Property {
    /// Creates a property.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A free-form metadata entry. Features form an unordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Feature name.
    pub name: String,
    /// Feature value.
    pub value: String,
}

impl Feature {
    /// Creates a feature.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One poly-line bend-point of a view connection, in rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bendpoint {
    /// X offset from the connection's source endpoint.
    pub start_x: i32,
    /// Y offset from the connection's source endpoint.
    pub start_y: i32,
    /// X offset from the connection's target endpoint.
    pub end_x: i32,
    /// Y offset from the connection's target endpoint.
    pub end_y: i32,
}

/// Pixel bounds of a view node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

/// Partition a folder belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FolderKind {
    /// Strategy layer content.
    Strategy,
    /// Business layer content.
    Business,
    /// Application layer content.
    Application,
    /// Technology layer content.
    Technology,
    /// Motivation content.
    Motivation,
    /// Implementation and migration content.
    Implementation,
    /// Relationship folder.
    Relations,
    /// Diagram (view) folder.
    Diagrams,
    /// Anything else.
    #[default]
    Other,
}

impl FolderKind {
    /// Stable code stored in folder rows.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            FolderKind::Strategy => 0,
            FolderKind::Business => 1,
            FolderKind::Application => 2,
            FolderKind::Technology => 3,
            FolderKind::Motivation => 4,
            FolderKind::Implementation => 5,
            FolderKind::Relations => 6,
            FolderKind::Diagrams => 7,
            FolderKind::Other => 8,
        }
    }

    /// Parses a stored code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FolderKind::Strategy),
            1 => Some(FolderKind::Business),
            2 => Some(FolderKind::Application),
            3 => Some(FolderKind::Technology),
            4 => Some(FolderKind::Motivation),
            5 => Some(FolderKind::Implementation),
            6 => Some(FolderKind::Relations),
            7 => Some(FolderKind::Diagrams),
            8 => Some(FolderKind::Other),
            _ => None,
        }
    }
}

macro_rules! impl_model_object {
    ($ty:ty, $kind:expr) => {
        impl ModelObject for $ty {
            fn id(&self) -> ObjectId {
                self.id
            }

            fn kind(&self) -> ObjectKind {
                $kind
            }

            fn metadata(&self) -> &VersionedMetadata {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut VersionedMetadata {
                &mut self.metadata
            }
        }
    };
}

fn write_properties(builder: &mut ChecksumBuilder, properties: &[Property]) {
    // Properties are ranked; order is semantic.
    builder.number("props", properties.len() as i64);
    for property in properties {
        builder.field(&property.key, &property.value);
    }
}

fn write_features(builder: &mut ChecksumBuilder, features: &[Feature]) {
    builder.unordered_set(
        "features",
        features.iter().map(|f| (f.name.as_str(), f.value.as_str())),
    );
}

/// Classification profile applicable to elements of one type.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Profile name.
    pub name: String,
    /// Type name of the concepts this profile applies to.
    pub applies_to: String,
    /// Optional attached image path.
    pub image_path: Option<String>,
}

impl Profile {
    /// Creates a profile as a local user action.
    #[must_use]
    pub fn new(name: impl Into<String>, applies_to: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            name: name.into(),
            applies_to: applies_to.into(),
            image_path: None,
        }
    }
}

impl Checksummed for Profile {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "profile")
            .field("name", &self.name)
            .field("applies_to", &self.applies_to)
            .opt_field("image_path", self.image_path.as_deref());
    }
}

impl_model_object!(Profile, ObjectKind::Profile);

/// A container folder with ordered children.
#[derive(Debug, Clone)]
pub struct Folder {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Folder name.
    pub name: String,
    /// Free-text documentation.
    pub documentation: String,
    /// Partition this folder belongs to.
    pub folder_kind: FolderKind,
    /// Key/value properties in rank order.
    pub properties: Vec<Property>,
    /// Children (sub-folders and content objects) in rank order.
    pub children: Vec<ObjectId>,
}

impl Folder {
    /// Creates a folder as a local user action.
    #[must_use]
    pub fn new(name: impl Into<String>, folder_kind: FolderKind) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            name: name.into(),
            documentation: String::new(),
            folder_kind,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Checksummed for Folder {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "folder")
            .field("name", &self.name)
            .field("documentation", &self.documentation)
            .number("folder_kind", i64::from(self.folder_kind.code()));
        write_properties(builder, &self.properties);
        // Ordered child identifiers, so a move or reorder surfaces as a
        // content change of the affected folders. Child content stays out;
        // editing an element must not dirty its ancestors.
        builder.number("children", self.children.len() as i64);
        for child in &self.children {
            builder.child(&child.to_string());
        }
    }
}

impl_model_object!(Folder, ObjectKind::Folder);

/// A leaf content element.
#[derive(Debug, Clone)]
pub struct Element {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Concrete type tag (e.g. `BusinessActor`).
    pub type_name: String,
    /// Element name.
    pub name: String,
    /// Free-text documentation.
    pub documentation: String,
    /// Key/value properties in rank order.
    pub properties: Vec<Property>,
    /// Free-form metadata entries (unordered).
    pub features: Vec<Feature>,
    /// Profiles classifying this element.
    pub profiles: Vec<ObjectId>,
}

impl Element {
    /// Creates an element as a local user action.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            type_name: type_name.into(),
            name: name.into(),
            documentation: String::new(),
            properties: Vec::new(),
            features: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

impl Checksummed for Element {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "element")
            .field("type", &self.type_name)
            .field("name", &self.name)
            .field("documentation", &self.documentation);
        write_properties(builder, &self.properties);
        write_features(builder, &self.features);
        for profile in &self.profiles {
            builder.field("profile", &profile.to_string());
        }
    }
}

impl_model_object!(Element, ObjectKind::Element);

/// A relationship between two endpoints.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Concrete type tag (e.g. `AssignmentRelationship`).
    pub type_name: String,
    /// Relationship name.
    pub name: String,
    /// Free-text documentation.
    pub documentation: String,
    /// Source endpoint (element or relationship).
    pub source: ObjectId,
    /// Target endpoint (element or relationship).
    pub target: ObjectId,
    /// Key/value properties in rank order.
    pub properties: Vec<Property>,
    /// Free-form metadata entries (unordered).
    pub features: Vec<Feature>,
}

impl Relationship {
    /// Creates a relationship as a local user action.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        source: ObjectId,
        target: ObjectId,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            type_name: type_name.into(),
            name: name.into(),
            documentation: String::new(),
            source,
            target,
            properties: Vec::new(),
            features: Vec::new(),
        }
    }
}

impl Checksummed for Relationship {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "relationship")
            .field("type", &self.type_name)
            .field("name", &self.name)
            .field("documentation", &self.documentation)
            .field("source", &self.source.to_string())
            .field("target", &self.target.to_string());
        write_properties(builder, &self.properties);
        write_features(builder, &self.features);
    }
}

impl_model_object!(Relationship, ObjectKind::Relationship);

/// A view (diagram) container.
#[derive(Debug, Clone)]
pub struct View {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// View name.
    pub name: String,
    /// Free-text documentation.
    pub documentation: String,
    /// Optional viewpoint tag.
    pub viewpoint: Option<String>,
    /// Background style code.
    pub background: Option<i32>,
    /// Connection router style code.
    pub connection_router: Option<i32>,
    /// Key/value properties in rank order.
    pub properties: Vec<Property>,
    /// Top-level view nodes in rank order.
    pub nodes: Vec<ObjectId>,
    /// View connections in rank order.
    pub connections: Vec<ObjectId>,
}

impl View {
    /// Creates a view as a local user action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            name: name.into(),
            documentation: String::new(),
            viewpoint: None,
            background: None,
            connection_router: None,
            properties: Vec::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl Checksummed for View {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "view")
            .field("name", &self.name)
            .field("documentation", &self.documentation)
            .opt_field("viewpoint", self.viewpoint.as_deref())
            .opt_field("background", self.background.map(|v| v.to_string()).as_deref())
            .opt_field(
                "connection_router",
                self.connection_router.map(|v| v.to_string()).as_deref(),
            );
        write_properties(builder, &self.properties);
        // Ordered child identifiers, as for folders: a reorder or re-home
        // inside the view changes the view's own content, not just its
        // subtree checksum. Child content stays out.
        builder.number("nodes", self.nodes.len() as i64);
        for node in &self.nodes {
            builder.child(&node.to_string());
        }
        builder.number("connections", self.connections.len() as i64);
        for connection in &self.connections {
            builder.child(&connection.to_string());
        }
    }
}

impl_model_object!(View, ObjectKind::View);

/// A visual node inside a view.
#[derive(Debug, Clone)]
pub struct ViewNode {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Owning view.
    pub view: ObjectId,
    /// Element this node depicts, if any (notes and groups have none).
    pub element: Option<ObjectId>,
    /// Pixel bounds relative to the parent.
    pub bounds: Bounds,
    /// Fill color as `#rrggbb`, if overridden.
    pub fill_color: Option<String>,
    /// Free text for nodes without an element reference.
    pub content: Option<String>,
    /// Nested view nodes in rank order.
    pub children: Vec<ObjectId>,
}

impl ViewNode {
    /// Creates a view node depicting an element.
    #[must_use]
    pub fn for_element(view: ObjectId, element: ObjectId, bounds: Bounds) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            view,
            element: Some(element),
            bounds,
            fill_color: None,
            content: None,
            children: Vec::new(),
        }
    }

    /// Creates a free-standing note node.
    #[must_use]
    pub fn note(view: ObjectId, content: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            view,
            element: None,
            bounds,
            fill_color: None,
            content: Some(content.into()),
            children: Vec::new(),
        }
    }
}

impl Checksummed for ViewNode {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "view_node")
            .opt_field("element", self.element.map(|id| id.to_string()).as_deref())
            .number("x", i64::from(self.bounds.x))
            .number("y", i64::from(self.bounds.y))
            .number("width", i64::from(self.bounds.width))
            .number("height", i64::from(self.bounds.height))
            .opt_field("fill_color", self.fill_color.as_deref())
            .opt_field("content", self.content.as_deref());
        // Ordered nested-node identifiers, as for folders and views.
        builder.number("children", self.children.len() as i64);
        for child in &self.children {
            builder.child(&child.to_string());
        }
    }
}

impl_model_object!(ViewNode, ObjectKind::ViewNode);

/// A visual connection inside a view.
#[derive(Debug, Clone)]
pub struct ViewConnection {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Owning view.
    pub view: ObjectId,
    /// Relationship this connection depicts, if any.
    pub relationship: Option<ObjectId>,
    /// Source view node.
    pub source: ObjectId,
    /// Target view node.
    pub target: ObjectId,
    /// Line color as `#rrggbb`, if overridden.
    pub line_color: Option<String>,
    /// Poly-line bend-points in rank order.
    pub bendpoints: Vec<Bendpoint>,
}

impl ViewConnection {
    /// Creates a view connection depicting a relationship.
    #[must_use]
    pub fn for_relationship(
        view: ObjectId,
        relationship: ObjectId,
        source: ObjectId,
        target: ObjectId,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            view,
            relationship: Some(relationship),
            source,
            target,
            line_color: None,
            bendpoints: Vec::new(),
        }
    }
}

impl Checksummed for ViewConnection {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "view_connection")
            .opt_field(
                "relationship",
                self.relationship.map(|id| id.to_string()).as_deref(),
            )
            .field("source", &self.source.to_string())
            .field("target", &self.target.to_string())
            .opt_field("line_color", self.line_color.as_deref());
        builder.number("bendpoints", self.bendpoints.len() as i64);
        for bendpoint in &self.bendpoints {
            builder
                .number("sx", i64::from(bendpoint.start_x))
                .number("sy", i64::from(bendpoint.start_y))
                .number("ex", i64::from(bendpoint.end_x))
                .number("ey", i64::from(bendpoint.end_y));
        }
    }
}

impl_model_object!(ViewConnection, ObjectKind::ViewConnection);

/// An attached binary image, keyed by repository path.
#[derive(Debug, Clone)]
pub struct ImageRef {
    /// Stable identifier.
    pub id: ObjectId,
    /// Versioning metadata.
    pub metadata: VersionedMetadata,
    /// Repository path, unique per image.
    pub path: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl ImageRef {
    /// Creates an image attachment as a local user action.
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: VersionedMetadata::created_in_model(),
            path: path.into(),
            bytes,
        }
    }
}

impl Checksummed for ImageRef {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "image")
            .field("path", &self.path)
            .bytes("bytes", &self.bytes);
    }
}

impl_model_object!(ImageRef, ObjectKind::Image);
