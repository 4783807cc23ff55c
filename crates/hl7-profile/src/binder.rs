//! Instance binding
//!
//! The binder takes a message that has already been split into positioned
//! nodes and builds the instance tree the validators walk: each node is
//! matched with the requirement declared at its position, complex elements
//! receive the requirements of their children, simple values are typed with
//! the declared data type, and locations are computed.
//!
//! Nodes without content are absent. Nodes at undeclared positions are not
//! bound; their parent is flagged as having extra children instead.

use crate::model::MessageProfile;
use crate::{Error, Result};
use hl7_ir::separators::Separators;
use hl7_ir::{Complex, Element, Line, Location, Message, Req, Simple, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A positioned node of a split message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    pub position: u32,

    #[serde(default = "first_instance")]
    pub instance: u32,

    /// Raw value of a leaf; ignored when `children` is not empty
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub children: Vec<RawNode>,

    /// Source line, 0 when unknown
    #[serde(default)]
    pub line: usize,

    #[serde(default)]
    pub column: usize,
}

fn first_instance() -> u32 {
    1
}

impl RawNode {
    /// Create a leaf node
    pub fn leaf(position: u32, instance: u32, value: impl Into<String>) -> Self {
        Self {
            position,
            instance,
            value: Some(value.into()),
            children: Vec::new(),
            line: 0,
            column: 0,
        }
    }

    /// Create an inner node
    pub fn node(position: u32, instance: u32, children: Vec<RawNode>) -> Self {
        Self {
            position,
            instance,
            value: None,
            children,
            line: 0,
            column: 0,
        }
    }

    /// Set the source position
    #[must_use]
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

/// A split message, as handed over by the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message id the sender claims, checked against the profile when present
    #[serde(default)]
    pub id: Option<String>,

    /// Encoding characters in `|^~\&` notation
    #[serde(default = "default_separators")]
    pub separators: String,

    /// Children of the message root (segments and groups)
    pub segments: Vec<RawNode>,

    #[serde(default)]
    pub invalid: Vec<Line>,

    #[serde(default)]
    pub unexpected: Vec<Line>,
}

fn default_separators() -> String {
    Separators::default().notation()
}

/// Binds split messages to one profile
#[derive(Debug, Clone, Copy)]
pub struct Binder<'p> {
    profile: &'p MessageProfile,
}

impl<'p> Binder<'p> {
    /// Create a new binder for a profile
    #[must_use]
    pub fn new(profile: &'p MessageProfile) -> Self {
        Self { profile }
    }

    /// Build the instance tree of a split message
    ///
    /// # Errors
    ///
    /// Returns an error when the message id does not match the profile, a
    /// node has a position or instance of 0, or the separators are malformed.
    pub fn bind(&self, raw: RawMessage) -> Result<Message> {
        if let Some(id) = &raw.id {
            if id != &self.profile.id {
                return Err(Error::Binding(format!(
                    "message '{id}' cannot be bound to profile '{}'",
                    self.profile.id
                )));
            }
        }

        check_numbering(&raw.segments)?;
        let separators = Separators::from_notation(&raw.separators)?;
        let description = if self.profile.description.is_empty() {
            self.profile.id.clone()
        } else {
            self.profile.description.clone()
        };

        let mut root = Complex::new(
            1,
            1,
            Location::new("", description, 1, 1),
            self.profile.structure.clone(),
        );
        bind_children(&mut root, raw.segments, Parent::Root);

        debug!(
            "Bound message {}: {} top-level elements",
            self.profile.id,
            root.children.len()
        );

        Ok(Message::new(self.profile.id.clone(), root, separators)
            .with_invalid(raw.invalid)
            .with_unexpected(raw.unexpected))
    }
}

/// Positions and instances are 1-based
fn check_numbering(nodes: &[RawNode]) -> Result<()> {
    for node in nodes {
        if node.position == 0 || node.instance == 0 {
            return Err(Error::Binding(format!(
                "node at position {} instance {} (line {}): positions and instances start at 1",
                node.position, node.instance, node.line
            )));
        }
        check_numbering(&node.children)?;
    }
    Ok(())
}

/// What the element whose children are being bound is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Root,
    /// Segment or group
    Named,
    /// Field or component
    Positional,
}

impl Parent {
    fn of(req: &Req) -> Self {
        if req.name.is_empty() {
            Self::Positional
        } else {
            Self::Named
        }
    }
}

fn bind_children(parent: &mut Complex, raws: Vec<RawNode>, kind: Parent) {
    for raw in raws {
        let Some(req) = parent.req_at(raw.position).cloned() else {
            trace!("Undeclared position {} under '{}'", raw.position, parent.location.path);
            parent.set_has_extra(true);
            continue;
        };

        let path = child_path(&parent.location.path, kind, &req, raw.instance);
        let description = if req.description.is_empty() {
            req.name.clone()
        } else {
            req.description.clone()
        };
        let location = if raw.line == 0 {
            parent.location.child(path, description)
        } else {
            Location::new(path, description, raw.line, raw.column)
        };

        if let Some(element) = bind_node(parent, &req, raw, location) {
            parent.add_child(element);
        }
    }
}

fn bind_node(parent: &mut Complex, req: &Req, raw: RawNode, location: Location) -> Option<Element> {
    if req.is_complex() {
        let mut children = raw.children;
        if children.is_empty() {
            // A bare value stands for the first component
            if let Some(value) = raw.value.filter(|v| !v.is_empty()) {
                children.push(RawNode::leaf(1, 1, value).at(raw.line, raw.column));
            }
        }

        let mut complex = Complex::new(raw.position, raw.instance, location, req.children.clone());
        bind_children(&mut complex, children, Parent::of(req));
        if complex.children.is_empty() && !complex.has_extra {
            return None;
        }
        return Some(complex.into());
    }

    let value = match raw.value {
        Some(value) if raw.children.is_empty() => value,
        _ => {
            // Structure below a simple position is not declared
            if !raw.children.is_empty() {
                parent.set_has_extra(true);
            }
            raw.children
                .into_iter()
                .find(|c| c.position == 1)
                .and_then(|c| c.value)
                .unwrap_or_default()
        }
    };
    if value.is_empty() {
        return None;
    }

    Some(Simple::new(raw.position, raw.instance, location, Value::new(req.data_type, value)).into())
}

/// Paths look like `PID[1]`, `GRP[1].PID[1]`, `PID[1]-3[2]` and `PID[1]-3[2].1[1]`
fn child_path(parent: &str, kind: Parent, req: &Req, instance: u32) -> String {
    match kind {
        _ if !req.name.is_empty() && parent.is_empty() => format!("{}[{instance}]", req.name),
        _ if !req.name.is_empty() => format!("{parent}.{}[{instance}]", req.name),
        Parent::Root => format!("{}[{instance}]", req.position),
        Parent::Named => format!("{parent}-{}[{instance}]", req.position),
        Parent::Positional => format!("{parent}.{}[{instance}]", req.position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_ir::{DataType, Range, Usage};

    fn profile() -> MessageProfile {
        let one = Range::bounded(1, 1).unwrap();
        let many = Range::unbounded(0);
        MessageProfile::new(
            "ADT_A01",
            vec![
                Req::new(1, Usage::R, one).named("MSH").with_children(vec![
                    Req::new(9, Usage::R, one).with_children(vec![
                        Req::new(1, Usage::R, one),
                        Req::new(2, Usage::R, one),
                    ]),
                ]),
                Req::new(2, Usage::R, one).named("PID").with_children(vec![
                    Req::new(3, Usage::R, many).with_children(vec![
                        Req::new(1, Usage::R, one),
                        Req::new(4, Usage::O, one),
                    ]),
                    Req::new(7, Usage::O, one).with_data_type(DataType::Date),
                    Req::new(8, Usage::O, one),
                ]),
            ],
        )
    }

    fn raw(segments: Vec<RawNode>) -> RawMessage {
        RawMessage {
            id: None,
            separators: "|^~\\&".into(),
            segments,
            invalid: Vec::new(),
            unexpected: Vec::new(),
        }
    }

    #[test]
    fn test_bind_paths_and_types() {
        let profile = profile();
        let message = Binder::new(&profile)
            .bind(raw(vec![
                RawNode::node(1, 1, vec![RawNode::node(9, 1, vec![
                    RawNode::leaf(1, 1, "ADT"),
                    RawNode::leaf(2, 1, "A01"),
                ])])
                .at(1, 1),
                RawNode::node(2, 1, vec![
                    RawNode::node(3, 2, vec![RawNode::leaf(1, 1, "12345")]),
                    RawNode::leaf(7, 1, "19800101"),
                ])
                .at(2, 1),
            ]))
            .unwrap();

        let pid = &message.root.children()[1];
        assert_eq!(pid.location().path, "PID[1]");
        assert_eq!(pid.location().line, 2);

        let cx = &pid.children()[0];
        assert_eq!(cx.location().path, "PID[1]-3[2]");
        assert_eq!(cx.children()[0].location().path, "PID[1]-3[2].1[1]");

        let dob = &pid.children()[1];
        assert_eq!(dob.value(), Some(&Value::new(DataType::Date, "19800101")));
        assert!(!message.root_complex().unwrap().has_extra);
    }

    #[test]
    fn test_undeclared_positions_flag_extra() {
        let profile = profile();
        let message = Binder::new(&profile)
            .bind(raw(vec![
                RawNode::node(2, 1, vec![RawNode::leaf(3, 1, "1"), RawNode::leaf(20, 1, "x")]),
                RawNode::node(9, 1, vec![]),
            ]))
            .unwrap();

        assert!(message.root_complex().unwrap().has_extra);
        let pid = message.root.children()[0].as_complex().unwrap();
        assert!(pid.has_extra);
        assert_eq!(pid.children.len(), 1);
    }

    #[test]
    fn test_bare_value_becomes_first_component() {
        let profile = profile();
        let message = Binder::new(&profile)
            .bind(raw(vec![RawNode::node(2, 1, vec![RawNode::leaf(3, 1, "12345")])]))
            .unwrap();

        let cx = &message.root.children()[0].children()[0];
        assert_eq!(cx.children()[0].value(), Some(&Value::text("12345")));
    }

    #[test]
    fn test_empty_nodes_are_absent() {
        let profile = profile();
        let message = Binder::new(&profile)
            .bind(raw(vec![RawNode::node(2, 1, vec![
                RawNode::leaf(7, 1, ""),
                RawNode::node(3, 1, vec![RawNode::leaf(1, 1, "")]),
            ])]))
            .unwrap();
        assert!(message.root.children().is_empty());
    }

    #[test]
    fn test_id_mismatch_and_bad_separators() {
        let profile = profile();
        let mut wrong = raw(vec![]);
        wrong.id = Some("ORU_R01".into());
        assert!(matches!(Binder::new(&profile).bind(wrong), Err(Error::Binding(_))));

        let mut bad = raw(vec![]);
        bad.separators = "|^^".into();
        assert!(matches!(Binder::new(&profile).bind(bad), Err(Error::Ir(_))));
    }

    #[test]
    fn test_zero_instance_or_position_is_rejected() {
        let profile = profile();
        let zero_instance = raw(vec![RawNode::node(2, 1, vec![RawNode::leaf(7, 0, "19800101")])]);
        assert!(matches!(
            Binder::new(&profile).bind(zero_instance),
            Err(Error::Binding(message)) if message.contains("instance 0")
        ));

        let zero_position = raw(vec![RawNode::node(0, 1, vec![])]);
        assert!(matches!(Binder::new(&profile).bind(zero_position), Err(Error::Binding(_))));

        let json: RawMessage =
            serde_json::from_str(r#"{"segments": [{"position": 2, "instance": 0, "children": []}]}"#).unwrap();
        assert!(matches!(Binder::new(&profile).bind(json), Err(Error::Binding(_))));
    }

    #[test]
    fn test_raw_message_defaults() {
        let raw: RawMessage = serde_json::from_str(r#"{"segments": [{"position": 1, "value": "x"}]}"#).unwrap();
        assert_eq!(raw.separators, "|^~\\&");
        assert_eq!(raw.segments[0].instance, 1);
        assert!(raw.invalid.is_empty());
    }
}
