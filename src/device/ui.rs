//! UI-hierarchy snapshot parsing.
//!
//! The device dumps its view hierarchy as XML with `bounds="[x1,y1][x2,y2]"`
//! attributes. Only text, resource-id, and bounds are of interest here, so
//! the scan is a small attribute extractor over `<node` tags in document
//! order rather than a full XML parse.

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapPoint {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

/// Axis-aligned element bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
}

impl Bounds {
    /// Center point of the box.
    pub fn center(&self) -> TapPoint {
        TapPoint {
            x: (self.x1 + self.x2) / 2,
            y: (self.y1 + self.y2) / 2,
        }
    }

    /// Box area in square pixels.
    pub fn area(&self) -> i64 {
        let w = i64::from(self.x2 - self.x1).max(0);
        let h = i64::from(self.y2 - self.y1).max(0);
        w * h
    }

    /// True when `other` lies fully inside this box.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
    }
}

/// One element of the dumped hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    /// Visible text label, possibly empty.
    pub text: String,
    /// Resource identifier, possibly empty.
    pub resource_id: String,
    /// On-screen bounding box.
    pub bounds: Bounds,
}

/// A parsed UI dump, nodes in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiSnapshot {
    nodes: Vec<UiNode>,
}

impl UiSnapshot {
    /// Extracts nodes from a raw hierarchy dump.
    ///
    /// Nodes without parseable bounds are skipped.
    pub fn parse(dump: &str) -> Self {
        let mut nodes = Vec::new();
        let mut rest = dump;

        while let Some(start) = rest.find("<node") {
            let tag_rest = &rest[start..];
            let Some(end) = tag_rest.find('>') else {
                break;
            };
            let tag = &tag_rest[..end];

            if let Some(bounds) = attr_value(tag, "bounds").and_then(parse_bounds) {
                nodes.push(UiNode {
                    text: attr_value(tag, "text").map(unescape).unwrap_or_default(),
                    resource_id: attr_value(tag, "resource-id")
                        .map(unescape)
                        .unwrap_or_default(),
                    bounds,
                });
            }

            rest = &tag_rest[end..];
        }

        Self { nodes }
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> &[UiNode] {
        &self.nodes
    }

    /// First node whose text equals `label`.
    pub fn find_text(&self, label: &str) -> Option<&UiNode> {
        self.nodes.iter().find(|n| n.text == label)
    }

    /// True when any node's text equals `label`.
    pub fn has_text(&self, label: &str) -> bool {
        self.find_text(label).is_some()
    }

    /// True when any node's text contains `marker` as a substring.
    pub fn contains_marker(&self, marker: &str) -> bool {
        self.nodes.iter().any(|n| n.text.contains(marker))
    }

    /// Number of parsed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes were parsed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn parse_bounds(raw: &str) -> Option<Bounds> {
    // "[x1,y1][x2,y2]"
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    let (first, second) = inner.split_once("][")?;
    let (x1, y1) = first.split_once(',')?;
    let (x2, y2) = second.split_once(',')?;
    Some(Bounds {
        x1: x1.trim().parse().ok()?,
        y1: y1.trim().parse().ok()?,
        x2: x2.trim().parse().ok()?,
        y2: y2.trim().parse().ok()?,
    })
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
