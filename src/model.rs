//! Core graph data types: nodes, connections (ports), edges and attribute values.
//!
//! These are plain data. Invariants that span several entities (edge endpoints
//! resolving to live connections, single occupancy of inputs) are enforced by
//! [`crate::graph::Graph`], not here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Stable identifier of a node. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Stable identifier of an edge. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Identifier of a connection within its owning node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

/// Globally addresses one connection: the owning node plus the port within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub node: NodeId,
    pub port: PortId,
}

impl ConnectionRef {
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

impl fmt::Display for ConnectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port.0)
    }
}

/// Any addressable item of the graph, used in errors and selections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRef {
    Node(NodeId),
    Edge(EdgeId),
    Connection(ConnectionRef),
    /// A named port on a node (used while building nodes, before ports have ids).
    PortName(NodeId, String),
    Attribute(NodeId, String),
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Node(id) => write!(f, "{}", id),
            ItemRef::Edge(id) => write!(f, "{}", id),
            ItemRef::Connection(c) => write!(f, "connection {}", c),
            ItemRef::PortName(node, name) => write!(f, "port '{}' on {}", name, node),
            ItemRef::Attribute(node, name) => write!(f, "attribute '{}' on {}", name, node),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A 2D position in scene coordinates. Equality is bitwise.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attributes
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of attribute value types an attribute editor can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    Float,
    Int,
    Float2,
    Float3,
    Int2,
    Int3,
    Bool,
    Color,
    String,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrKind::Float => "float",
            AttrKind::Int => "int",
            AttrKind::Float2 => "float2",
            AttrKind::Float3 => "float3",
            AttrKind::Int2 => "int2",
            AttrKind::Int3 => "int3",
            AttrKind::Bool => "bool",
            AttrKind::Color => "color",
            AttrKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A tagged attribute value.
///
/// Floats compare by bit pattern, so `NaN` equals itself and `0.0` differs
/// from `-0.0`. Writing back a value that is already stored is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Float2([f64; 2]),
    Float3([f64; 3]),
    Int2([i64; 2]),
    Int3([i64; 3]),
    Bool(bool),
    /// RGBA, 8 bits per channel.
    Color([u8; 4]),
    String(String),
}

fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Float(a), AttrValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttrValue::Float2(a), AttrValue::Float2(b)) => same_bits(a, b),
            (AttrValue::Float3(a), AttrValue::Float3(b)) => same_bits(a, b),
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Int2(a), AttrValue::Int2(b)) => a == b,
            (AttrValue::Int3(a), AttrValue::Int3(b)) => a == b,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Color(a), AttrValue::Color(b)) => a == b,
            (AttrValue::String(a), AttrValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float2(_) => AttrKind::Float2,
            AttrValue::Float3(_) => AttrKind::Float3,
            AttrValue::Int2(_) => AttrKind::Int2,
            AttrValue::Int3(_) => AttrKind::Int3,
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Color(_) => AttrKind::Color,
            AttrValue::String(_) => AttrKind::String,
        }
    }

    /// Text used for list/table cells.
    pub fn display_text(&self) -> String {
        match self {
            AttrValue::Float(v) => format!("{}", v),
            AttrValue::Int(v) => format!("{}", v),
            AttrValue::Float2([a, b]) => format!("[{}, {}]", a, b),
            AttrValue::Float3([a, b, c]) => format!("[{}, {}, {}]", a, b, c),
            AttrValue::Int2([a, b]) => format!("[{}, {}]", a, b),
            AttrValue::Int3([a, b, c]) => format!("[{}, {}, {}]", a, b, c),
            AttrValue::Bool(v) => if *v { "on" } else { "off" }.to_string(),
            AttrValue::Color([r, g, b, a]) => format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a),
            AttrValue::String(s) => s.clone(),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connections, nodes, edges
// ────────────────────────────────────────────────────────────────────────────

/// Direction of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// A port on a node through which edges attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: PortId,
    pub name: String,
    pub direction: Direction,
}

impl Connection {
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub position: Point,
    /// Attribute name → value, in the order attributes were first set.
    pub attributes: IndexMap<String, AttrValue>,
    /// Owned connections in declaration order.
    pub connections: Vec<Connection>,
}

impl Node {
    pub fn connection(&self, port: PortId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == port)
    }

    pub fn connection_named(&self, name: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// Reference to the named connection, for wiring by port name.
    pub fn port(&self, name: &str) -> Option<ConnectionRef> {
        self.connection_named(name)
            .map(|c| ConnectionRef::new(self.id, c.id))
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(|c| c.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(|c| c.is_output())
    }
}

/// A directed link from an output connection to an input connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: ConnectionRef,
    pub target: ConnectionRef,
}

impl Edge {
    pub fn touches_node(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builders
// ────────────────────────────────────────────────────────────────────────────

/// Description of a port to create on a new node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub direction: Direction,
}

impl PortSpec {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Input,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Output,
        }
    }
}

/// Everything needed to create a node, minus its identifier.
///
/// # Example
///
/// ```rust
/// use scenegraph::model::{NodeSpec, Point};
///
/// let spec = NodeSpec::new("Blur", Point::new(10.0, 20.0))
///     .with_input("image")
///     .with_output("result")
///     .with_attribute("radius", 2.5);
/// assert_eq!(spec.ports.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub position: Point,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttrValue>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, position: Point) -> Self {
        Self {
            name: name.into(),
            position,
            ports: Vec::new(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.ports.push(PortSpec::input(name));
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.ports.push(PortSpec::output(name));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
