//! Remote widget snapshots and the typed mutation payloads sent back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a remote widget, as reported in its `widget_type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetType {
    Note,
    Image,
    Video,
    Pdf,
    Browser,
    Connector,
    Anchor,
    Other(String),
}

impl From<String> for WidgetType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "note" => Self::Note,
            "image" => Self::Image,
            "video" => Self::Video,
            "pdf" => Self::Pdf,
            "browser" => Self::Browser,
            "connector" => Self::Connector,
            "anchor" => Self::Anchor,
            _ => Self::Other(s),
        }
    }
}

impl From<WidgetType> for String {
    fn from(t: WidgetType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Note => "Note",
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Pdf => "Pdf",
            Self::Browser => "Browser",
            Self::Connector => "Connector",
            Self::Anchor => "Anchor",
            Self::Other(s) => s.as_str(),
        };
        f.write_str(name)
    }
}

impl WidgetType {
    /// Collection segment of the typed REST endpoint for this kind.
    ///
    /// The generic `widgets` collection is read-only upstream, so every
    /// mutation must go through one of these.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Note => Some("notes"),
            Self::Image => Some("images"),
            Self::Video => Some("videos"),
            Self::Pdf => Some("pdfs"),
            Self::Browser => Some("browsers"),
            Self::Connector => Some("connectors"),
            Self::Anchor => Some("anchors"),
            Self::Other(_) => None,
        }
    }

    /// Anchors and connectors describe canvas structure, not content.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Anchor | Self::Connector)
    }

    /// Kinds whose content lives in an uploaded file.
    pub fn carries_binary(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Pdf)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Snapshot of a remote widget. Never mutated; transformations build new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    pub widget_type: WidgetType,
    #[serde(default)]
    pub location: Point,
    #[serde(default)]
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

impl Widget {
    pub fn new(id: impl Into<String>, widget_type: WidgetType, location: Point) -> Self {
        Self {
            id: id.into(),
            widget_type,
            location,
            size: Size::default(),
            scale: None,
            pinned: false,
            title: String::new(),
            background_color: None,
            text: None,
            url: None,
            original_filename: None,
        }
    }

    /// Scale with the upstream default of 1 applied.
    pub fn effective_scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }

    /// Copy of this widget placed elsewhere.
    pub fn placed(&self, location: Point, scale: f64) -> Self {
        Self {
            location,
            scale: Some(scale),
            ..self.clone()
        }
    }

    /// Creation body for a copy of this widget at its current geometry.
    pub fn to_new_widget(&self) -> NewWidget {
        NewWidget {
            title: (!self.title.is_empty()).then(|| self.title.clone()),
            location: self.location,
            size: (self.size != Size::default()).then_some(self.size),
            scale: self.scale,
            pinned: self.pinned.then_some(true),
            background_color: self.background_color.clone(),
            text: self.text.clone(),
            url: self.url.clone(),
            original_filename: self.original_filename.clone(),
        }
    }
}

/// Partial update sent to a typed widget endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl WidgetPatch {
    pub fn relocate(location: Point) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    pub fn place(location: Point, scale: f64) -> Self {
        Self {
            location: Some(location),
            scale: Some(scale),
            ..Self::default()
        }
    }

    pub fn pin(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Self::default()
        }
    }
}

/// Creation body for a new widget (the JSON part of a multipart upload for binaries).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWidget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub location: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

/// One intended mutation, consumed by the batch executor.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetUpdatePlan {
    pub widget_id: String,
    pub widget_type: WidgetType,
    pub payload: WidgetPatch,
}

impl WidgetUpdatePlan {
    pub fn new(widget: &Widget, payload: WidgetPatch) -> Self {
        Self {
            widget_id: widget.id.clone(),
            widget_type: widget.widget_type.clone(),
            payload,
        }
    }
}
