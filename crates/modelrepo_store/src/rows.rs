//! Row types exchanged with the backing store.
//!
//! Every versioned table carries the composite primary key `(id, version)`.
//! Containment is recorded in junction rows ("object X at version Y belongs
//! to model M at generation V under parent P, rank R"); sub-structures
//! (properties, features, bend-points) are child rows keyed by
//! `(parent id, parent version, rank)`.

use modelrepo_model::{
    AnyObject, Bendpoint, Bounds, Element, Feature, Folder, FolderKind, ImageRef, ObjectId,
    ObjectKind, Profile, Property, Relationship, VersionRecord, VersionedMetadata, View,
    ViewConnection, ViewNode,
};

use crate::error::{StoreError, StoreResult};

/// The projection of one version row the comparison engine works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStamp {
    /// Object identifier.
    pub id: ObjectId,
    /// Version number.
    pub version: u32,
    /// Content checksum stored with the row.
    pub checksum: String,
    /// Container checksum, for view rows.
    pub container_checksum: Option<String>,
    /// Who wrote the row.
    pub created_by: String,
    /// When the row was written (Unix milliseconds).
    pub created_at: u64,
}

impl VersionStamp {
    /// Converts the stamp into a version record.
    #[must_use]
    pub fn to_record(&self) -> VersionRecord {
        VersionRecord {
            version: self.version,
            checksum: self.checksum.clone(),
            container_checksum: self.container_checksum.clone(),
            timestamp: self.created_at,
        }
    }
}

/// One version row of the models table.
#[derive(Debug, Clone)]
pub struct ModelRow {
    /// Model identifier.
    pub id: ObjectId,
    /// Model version (the database generation number).
    pub version: u32,
    /// Model name.
    pub name: String,
    /// Model purpose text.
    pub purpose: String,
    /// Content checksum of the model row.
    pub checksum: String,
    /// Who wrote the row.
    pub created_by: String,
    /// When the row was written.
    pub created_at: u64,
}

/// Per-kind semantic columns of one object row.
#[derive(Debug, Clone)]
pub enum ObjectPayload {
    /// Profile columns.
    Profile {
        /// Profile name.
        name: String,
        /// Concept type the profile applies to.
        applies_to: String,
        /// Optional image path.
        image_path: Option<String>,
    },
    /// Folder columns.
    Folder {
        /// Folder name.
        name: String,
        /// Documentation text.
        documentation: String,
        /// Folder partition code.
        folder_kind: u8,
    },
    /// Element columns (plus its profile junction entries).
    Element {
        /// Concrete type tag.
        type_name: String,
        /// Element name.
        name: String,
        /// Documentation text.
        documentation: String,
        /// Classifying profiles.
        profiles: Vec<ObjectId>,
    },
    /// Relationship columns.
    Relationship {
        /// Concrete type tag.
        type_name: String,
        /// Relationship name.
        name: String,
        /// Documentation text.
        documentation: String,
        /// Source endpoint.
        source: ObjectId,
        /// Target endpoint.
        target: ObjectId,
    },
    /// View columns.
    View {
        /// View name.
        name: String,
        /// Documentation text.
        documentation: String,
        /// Viewpoint tag.
        viewpoint: Option<String>,
        /// Background style code.
        background: Option<i32>,
        /// Connection router code.
        connection_router: Option<i32>,
    },
    /// View node columns.
    ViewNode {
        /// Owning view.
        view: ObjectId,
        /// Depicted element, if any.
        element: Option<ObjectId>,
        /// Left edge.
        x: i32,
        /// Top edge.
        y: i32,
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
        /// Fill color override.
        fill_color: Option<String>,
        /// Free text for element-less nodes.
        content: Option<String>,
    },
    /// View connection columns.
    ViewConnection {
        /// Owning view.
        view: ObjectId,
        /// Depicted relationship, if any.
        relationship: Option<ObjectId>,
        /// Source view node.
        source: ObjectId,
        /// Target view node.
        target: ObjectId,
        /// Line color override.
        line_color: Option<String>,
    },
    /// Image columns.
    Image {
        /// Repository path (unique).
        path: String,
        /// Raw bytes.
        bytes: Vec<u8>,
    },
}

impl ObjectPayload {
    /// The kind of table this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectPayload::Profile { .. } => ObjectKind::Profile,
            ObjectPayload::Folder { .. } => ObjectKind::Folder,
            ObjectPayload::Element { .. } => ObjectKind::Element,
            ObjectPayload::Relationship { .. } => ObjectKind::Relationship,
            ObjectPayload::View { .. } => ObjectKind::View,
            ObjectPayload::ViewNode { .. } => ObjectKind::ViewNode,
            ObjectPayload::ViewConnection { .. } => ObjectKind::ViewConnection,
            ObjectPayload::Image { .. } => ObjectKind::Image,
        }
    }
}

/// One version row of a per-kind object table.
#[derive(Debug, Clone)]
pub struct ObjectRow {
    /// Object identifier.
    pub id: ObjectId,
    /// Version number.
    pub version: u32,
    /// Content checksum.
    pub checksum: String,
    /// Container checksum, for views.
    pub container_checksum: Option<String>,
    /// Who wrote the row.
    pub created_by: String,
    /// When the row was written.
    pub created_at: u64,
    /// Per-kind columns.
    pub payload: ObjectPayload,
}

impl ObjectRow {
    /// The kind of table this row belongs to.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.payload.kind()
    }

    /// The comparison projection of this row.
    #[must_use]
    pub fn stamp(&self) -> VersionStamp {
        VersionStamp {
            id: self.id,
            version: self.version,
            checksum: self.checksum.clone(),
            container_checksum: self.container_checksum.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
        }
    }
}

/// One junction row: object X at version Y belongs to model M at
/// generation V under parent P, rank R.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRow {
    /// Owning model.
    pub model: ObjectId,
    /// Model generation.
    pub model_version: u32,
    /// Kind of the contained object.
    pub kind: ObjectKind,
    /// Contained object.
    pub object: ObjectId,
    /// Contained object's version at this generation.
    pub object_version: u32,
    /// Containing parent (`None` for root folders).
    pub parent: Option<ObjectId>,
    /// Ordering within the parent.
    pub rank: u32,
}

/// One key/value property child row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    /// Owning object.
    pub parent: ObjectId,
    /// Owning object's version.
    pub parent_version: u32,
    /// Ordering within the parent.
    pub rank: u32,
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: String,
}

/// One free-form metadata child row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    /// Owning object.
    pub parent: ObjectId,
    /// Owning object's version.
    pub parent_version: u32,
    /// Feature name.
    pub name: String,
    /// Feature value.
    pub value: String,
}

/// One poly-line bend-point child row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BendpointRow {
    /// Owning connection.
    pub parent: ObjectId,
    /// Owning connection's version.
    pub parent_version: u32,
    /// Ordering within the connection.
    pub rank: u32,
    /// X offset from the source endpoint.
    pub start_x: i32,
    /// Y offset from the source endpoint.
    pub start_y: i32,
    /// X offset from the target endpoint.
    pub end_x: i32,
    /// Y offset from the target endpoint.
    pub end_y: i32,
}

/// An object taken apart into its main row and child rows, ready to write.
#[derive(Debug, Clone)]
pub struct ObjectParts {
    /// The main versioned row.
    pub row: ObjectRow,
    /// Property child rows in rank order.
    pub properties: Vec<PropertyRow>,
    /// Feature child rows.
    pub features: Vec<FeatureRow>,
    /// Bend-point child rows in rank order.
    pub bendpoints: Vec<BendpointRow>,
}

fn property_rows(parent: ObjectId, version: u32, properties: &[Property]) -> Vec<PropertyRow> {
    properties
        .iter()
        .enumerate()
        .map(|(rank, property)| PropertyRow {
            parent,
            parent_version: version,
            rank: rank as u32,
            key: property.key.clone(),
            value: property.value.clone(),
        })
        .collect()
}

fn feature_rows(parent: ObjectId, version: u32, features: &[Feature]) -> Vec<FeatureRow> {
    features
        .iter()
        .map(|feature| FeatureRow {
            parent,
            parent_version: version,
            name: feature.name.clone(),
            value: feature.value.clone(),
        })
        .collect()
}

/// Takes an object apart into rows, stamped with the version and checksum
/// held in `metadata.current`.
#[must_use]
pub fn deconstruct(object: &AnyObject, created_by: &str, created_at: u64) -> ObjectParts {
    let metadata = object.metadata();
    let id = object.id();
    let version = metadata.current.version;
    let mut properties = Vec::new();
    let mut features = Vec::new();
    let mut bendpoints = Vec::new();

    let payload = match object {
        AnyObject::Profile(profile) => ObjectPayload::Profile {
            name: profile.name.clone(),
            applies_to: profile.applies_to.clone(),
            image_path: profile.image_path.clone(),
        },
        AnyObject::Folder(folder) => {
            properties = property_rows(id, version, &folder.properties);
            ObjectPayload::Folder {
                name: folder.name.clone(),
                documentation: folder.documentation.clone(),
                folder_kind: folder.folder_kind.code(),
            }
        }
        AnyObject::Element(element) => {
            properties = property_rows(id, version, &element.properties);
            features = feature_rows(id, version, &element.features);
            ObjectPayload::Element {
                type_name: element.type_name.clone(),
                name: element.name.clone(),
                documentation: element.documentation.clone(),
                profiles: element.profiles.clone(),
            }
        }
        AnyObject::Relationship(relationship) => {
            properties = property_rows(id, version, &relationship.properties);
            features = feature_rows(id, version, &relationship.features);
            ObjectPayload::Relationship {
                type_name: relationship.type_name.clone(),
                name: relationship.name.clone(),
                documentation: relationship.documentation.clone(),
                source: relationship.source,
                target: relationship.target,
            }
        }
        AnyObject::View(view) => {
            properties = property_rows(id, version, &view.properties);
            ObjectPayload::View {
                name: view.name.clone(),
                documentation: view.documentation.clone(),
                viewpoint: view.viewpoint.clone(),
                background: view.background,
                connection_router: view.connection_router,
            }
        }
        AnyObject::ViewNode(node) => ObjectPayload::ViewNode {
            view: node.view,
            element: node.element,
            x: node.bounds.x,
            y: node.bounds.y,
            width: node.bounds.width,
            height: node.bounds.height,
            fill_color: node.fill_color.clone(),
            content: node.content.clone(),
        },
        AnyObject::ViewConnection(connection) => {
            bendpoints = connection
                .bendpoints
                .iter()
                .enumerate()
                .map(|(rank, bendpoint)| BendpointRow {
                    parent: id,
                    parent_version: version,
                    rank: rank as u32,
                    start_x: bendpoint.start_x,
                    start_y: bendpoint.start_y,
                    end_x: bendpoint.end_x,
                    end_y: bendpoint.end_y,
                })
                .collect();
            ObjectPayload::ViewConnection {
                view: connection.view,
                relationship: connection.relationship,
                source: connection.source,
                target: connection.target,
                line_color: connection.line_color.clone(),
            }
        }
        AnyObject::Image(image) => ObjectPayload::Image {
            path: image.path.clone(),
            bytes: image.bytes.clone(),
        },
    };

    ObjectParts {
        row: ObjectRow {
            id,
            version,
            checksum: metadata.current.checksum.clone(),
            container_checksum: metadata.current.container_checksum.clone(),
            created_by: created_by.to_string(),
            created_at,
            payload,
        },
        properties,
        features,
        bendpoints,
    }
}

/// Rebuilds an in-memory object from its rows.
///
/// Containment lists (folder children, view nodes and connections) are left
/// empty; the import pipeline reattaches them from junction rows. The
/// object's metadata baselines (`initial`, `database`, `latest_database`)
/// are set from the row; `current` stays unset until the next comparison.
pub fn materialize(
    row: &ObjectRow,
    properties: &[PropertyRow],
    features: &[FeatureRow],
    bendpoints: &[BendpointRow],
) -> StoreResult<AnyObject> {
    let record = VersionRecord {
        version: row.version,
        checksum: row.checksum.clone(),
        container_checksum: row.container_checksum.clone(),
        timestamp: row.created_at,
    };
    let metadata = VersionedMetadata::imported(record);
    let props: Vec<Property> = properties
        .iter()
        .map(|p| Property::new(p.key.clone(), p.value.clone()))
        .collect();
    let feats: Vec<Feature> = features
        .iter()
        .map(|f| Feature::new(f.name.clone(), f.value.clone()))
        .collect();

    let object = match &row.payload {
        ObjectPayload::Profile {
            name,
            applies_to,
            image_path,
        } => AnyObject::Profile(Profile {
            id: row.id,
            metadata,
            name: name.clone(),
            applies_to: applies_to.clone(),
            image_path: image_path.clone(),
        }),
        ObjectPayload::Folder {
            name,
            documentation,
            folder_kind,
        } => AnyObject::Folder(Folder {
            id: row.id,
            metadata,
            name: name.clone(),
            documentation: documentation.clone(),
            folder_kind: FolderKind::from_code(*folder_kind).ok_or_else(|| {
                StoreError::integrity(format!("unknown folder kind code {folder_kind}"))
            })?,
            properties: props,
            children: Vec::new(),
        }),
        ObjectPayload::Element {
            type_name,
            name,
            documentation,
            profiles,
        } => AnyObject::Element(Element {
            id: row.id,
            metadata,
            type_name: type_name.clone(),
            name: name.clone(),
            documentation: documentation.clone(),
            properties: props,
            features: feats,
            profiles: profiles.clone(),
        }),
        ObjectPayload::Relationship {
            type_name,
            name,
            documentation,
            source,
            target,
        } => AnyObject::Relationship(Relationship {
            id: row.id,
            metadata,
            type_name: type_name.clone(),
            name: name.clone(),
            documentation: documentation.clone(),
            source: *source,
            target: *target,
            properties: props,
            features: feats,
        }),
        ObjectPayload::View {
            name,
            documentation,
            viewpoint,
            background,
            connection_router,
        } => AnyObject::View(View {
            id: row.id,
            metadata,
            name: name.clone(),
            documentation: documentation.clone(),
            viewpoint: viewpoint.clone(),
            background: *background,
            connection_router: *connection_router,
            properties: props,
            nodes: Vec::new(),
            connections: Vec::new(),
        }),
        ObjectPayload::ViewNode {
            view,
            element,
            x,
            y,
            width,
            height,
            fill_color,
            content,
        } => AnyObject::ViewNode(ViewNode {
            id: row.id,
            metadata,
            view: *view,
            element: *element,
            bounds: Bounds {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            },
            fill_color: fill_color.clone(),
            content: content.clone(),
            children: Vec::new(),
        }),
        ObjectPayload::ViewConnection {
            view,
            relationship,
            source,
            target,
            line_color,
        } => AnyObject::ViewConnection(ViewConnection {
            id: row.id,
            metadata,
            view: *view,
            relationship: *relationship,
            source: *source,
            target: *target,
            line_color: line_color.clone(),
            bendpoints: bendpoints
                .iter()
                .map(|b| Bendpoint {
                    start_x: b.start_x,
                    start_y: b.start_y,
                    end_x: b.end_x,
                    end_y: b.end_y,
                })
                .collect(),
        }),
        ObjectPayload::Image { path, bytes } => AnyObject::Image(ImageRef {
            id: row.id,
            metadata,
            path: path.clone(),
            bytes: bytes.clone(),
        }),
    };
    Ok(object)
}
