//! Shape and group types for the whiteboard document.
//!
//! Shapes carry geometry, style, and per-shape layer metadata. Groups are
//! structural parents (distinct from relationship-graph parents) with their
//! own visibility/lock flags.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shape identifier - UUID for global uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape type tag - rendering and hit-testing live in the shape-plugin
/// layer, the core only needs the tag for relationship rule predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Rect,
    Ellipse,
    Line,
    Arrow,
    Text,
    Frame,
    Sticky,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rect => "Rect",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Line => "Line",
            ShapeKind::Arrow => "Arrow",
            ShapeKind::Text => "Text",
            ShapeKind::Frame => "Frame",
            ShapeKind::Sticky => "Sticky",
        }
    }
}

/// Visual style fields - interpreted by external renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: "transparent".to_string(),
            stroke: "black".to_string(),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

/// Per-shape layer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub visible: bool,
    pub locked: bool,
    pub z_index: i32,
    /// Structural parent group, if the shape is grouped
    pub parent_group: Option<GroupId>,
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            visible: true,
            locked: false,
            z_index: 0,
            parent_group: None,
        }
    }
}

/// A shape in the document. Owned by the document store and mutated only
/// through commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub style: ShapeStyle,
    pub layer: LayerInfo,
}

impl Shape {
    /// Create a shape with default style and layer metadata
    pub fn new(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: ShapeId::new(),
            kind,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            style: ShapeStyle::default(),
            layer: LayerInfo::default(),
        }
    }

    pub fn with_id(mut self, id: ShapeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn locked(mut self) -> Self {
        self.layer.locked = true;
        self
    }

    /// Apply a patch, overwriting only the fields the patch sets
    pub fn apply_patch(&mut self, patch: &ShapePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(ref fill) = patch.fill {
            self.style.fill = fill.clone();
        }
        if let Some(ref stroke) = patch.stroke {
            self.style.stroke = stroke.clone();
        }
        if let Some(stroke_width) = patch.stroke_width {
            self.style.stroke_width = stroke_width;
        }
        if let Some(opacity) = patch.opacity {
            self.style.opacity = opacity;
        }
        if let Some(visible) = patch.visible {
            self.layer.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.layer.locked = locked;
        }
        if let Some(z_index) = patch.z_index {
            self.layer.z_index = z_index;
        }
        if let Some(ref parent_group) = patch.parent_group {
            self.layer.parent_group = *parent_group;
        }
    }

    /// Capture the current values of the fields a patch would touch.
    /// This is the minimal snapshot a command needs to undo itself.
    pub fn capture_patch(&self, patch: &ShapePatch) -> ShapePatch {
        ShapePatch {
            x: patch.x.map(|_| self.x),
            y: patch.y.map(|_| self.y),
            width: patch.width.map(|_| self.width),
            height: patch.height.map(|_| self.height),
            rotation: patch.rotation.map(|_| self.rotation),
            fill: patch.fill.as_ref().map(|_| self.style.fill.clone()),
            stroke: patch.stroke.as_ref().map(|_| self.style.stroke.clone()),
            stroke_width: patch.stroke_width.map(|_| self.style.stroke_width),
            opacity: patch.opacity.map(|_| self.style.opacity),
            visible: patch.visible.map(|_| self.layer.visible),
            locked: patch.locked.map(|_| self.layer.locked),
            z_index: patch.z_index.map(|_| self.layer.z_index),
            parent_group: patch.parent_group.as_ref().map(|_| self.layer.parent_group),
        }
    }
}

/// A partial shape update - every field optional, unset fields untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub z_index: Option<i32>,
    /// `Some(None)` clears the parent group
    pub parent_group: Option<Option<GroupId>>,
}

impl ShapePatch {
    /// Patch that moves a shape to an absolute position
    pub fn move_to(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Patch that resizes a shape
    pub fn resize_to(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the patch only touches layer metadata (visible, locked,
    /// z-index, parent group). Layer metadata updates are allowed on
    /// locked shapes - everything else is rejected.
    pub fn is_layer_only(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.rotation.is_none()
            && self.fill.is_none()
            && self.stroke.is_none()
            && self.stroke_width.is_none()
            && self.opacity.is_none()
            && !self.is_empty()
    }

    /// Combine two patches: fields set by `later` win, fields only set by
    /// `self` are kept
    pub fn overlaid_with(&self, later: &ShapePatch) -> ShapePatch {
        ShapePatch {
            x: later.x.or(self.x),
            y: later.y.or(self.y),
            width: later.width.or(self.width),
            height: later.height.or(self.height),
            rotation: later.rotation.or(self.rotation),
            fill: later.fill.clone().or_else(|| self.fill.clone()),
            stroke: later.stroke.clone().or_else(|| self.stroke.clone()),
            stroke_width: later.stroke_width.or(self.stroke_width),
            opacity: later.opacity.or(self.opacity),
            visible: later.visible.or(self.visible),
            locked: later.locked.or(self.locked),
            z_index: later.z_index.or(self.z_index),
            parent_group: later.parent_group.or(self.parent_group),
        }
    }
}

/// A named group of shapes - a structural parent with its own lock and
/// visibility flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeGroup {
    pub id: GroupId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub z_index: i32,
    /// Ordered member shapes
    pub child_ids: Vec<ShapeId>,
}

impl ShapeGroup {
    pub fn new(name: impl Into<String>, child_ids: Vec<ShapeId>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            visible: true,
            locked: false,
            z_index: 0,
            child_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_apply_and_capture_round_trip() {
        let mut shape = Shape::new(ShapeKind::Rect, 10.0, 20.0, 100.0, 50.0);
        let patch = ShapePatch {
            x: Some(42.0),
            fill: Some("red".to_string()),
            ..ShapePatch::default()
        };

        let previous = shape.capture_patch(&patch);
        shape.apply_patch(&patch);
        assert_eq!(shape.x, 42.0);
        assert_eq!(shape.style.fill, "red");

        shape.apply_patch(&previous);
        assert_eq!(shape.x, 10.0);
        assert_eq!(shape.style.fill, "transparent");
        // Untouched fields never appear in the captured patch
        assert!(previous.y.is_none());
        assert!(previous.width.is_none());
    }

    #[test]
    fn layer_only_patch_detection() {
        let lock_patch = ShapePatch {
            locked: Some(true),
            ..ShapePatch::default()
        };
        assert!(lock_patch.is_layer_only());

        let move_patch = ShapePatch::move_to(1.0, 2.0);
        assert!(!move_patch.is_layer_only());

        assert!(!ShapePatch::default().is_layer_only());
    }

    #[test]
    fn overlay_keeps_earlier_fields_and_prefers_later() {
        let first = ShapePatch {
            x: Some(10.0),
            y: Some(5.0),
            ..ShapePatch::default()
        };
        let second = ShapePatch {
            x: Some(20.0),
            ..ShapePatch::default()
        };

        let combined = first.overlaid_with(&second);
        assert_eq!(combined.x, Some(20.0));
        assert_eq!(combined.y, Some(5.0));
    }
}
