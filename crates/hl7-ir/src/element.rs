//! Elements of the instance tree

use crate::location::Location;
use crate::requirement::Req;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A node of the instance tree
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Leaf carrying a value
    Simple(Simple),
    /// Inner node carrying children and their requirements
    Complex(Complex),
}

/// Leaf element (field, component or sub-component without children)
#[derive(Debug, Clone, PartialEq)]
pub struct Simple {
    /// 1-based position within the parent
    pub position: u32,

    /// 1-based repetition number
    pub instance: u32,

    /// Where the element sits
    pub location: Location,

    /// Value found in the message
    pub value: Value,
}

/// Inner element (group, segment, composite field or component)
#[derive(Debug, Clone, PartialEq)]
pub struct Complex {
    /// 1-based position within the parent
    pub position: u32,

    /// 1-based repetition number
    pub instance: u32,

    /// Where the element sits
    pub location: Location,

    /// Children in message order
    pub children: Vec<Element>,

    /// Children exist at positions no requirement declares
    pub has_extra: bool,

    /// Requirements the children must satisfy, in declared order
    pub reqs: Arc<[Req]>,
}

impl Simple {
    /// Create a simple element
    pub fn new(position: u32, instance: u32, location: Location, value: Value) -> Self {
        Self {
            position,
            instance,
            location,
            value,
        }
    }
}

impl Complex {
    /// Create a complex element without children
    pub fn new(position: u32, instance: u32, location: Location, reqs: Arc<[Req]>) -> Self {
        Self {
            position,
            instance,
            location,
            children: Vec::new(),
            has_extra: false,
            reqs,
        }
    }

    /// Add a child element
    pub fn add_child(&mut self, child: impl Into<Element>) -> &mut Self {
        self.children.push(child.into());
        self
    }

    /// Set the extra flag
    pub fn set_has_extra(&mut self, has_extra: bool) -> &mut Self {
        self.has_extra = has_extra;
        self
    }

    /// Children grouped by position, each group in message order
    #[must_use]
    pub fn children_by_position(&self) -> BTreeMap<u32, Vec<&Element>> {
        let mut groups: BTreeMap<u32, Vec<&Element>> = BTreeMap::new();
        for child in &self.children {
            groups.entry(child.position()).or_default().push(child);
        }
        groups
    }

    /// Find the requirement declared for a position
    #[must_use]
    pub fn req_at(&self, position: u32) -> Option<&Req> {
        self.reqs.iter().find(|r| r.position == position)
    }
}

impl From<Simple> for Element {
    fn from(simple: Simple) -> Self {
        Element::Simple(simple)
    }
}

impl From<Complex> for Element {
    fn from(complex: Complex) -> Self {
        Element::Complex(complex)
    }
}

impl Element {
    /// 1-based position within the parent
    #[must_use]
    pub fn position(&self) -> u32 {
        match self {
            Element::Simple(s) => s.position,
            Element::Complex(c) => c.position,
        }
    }

    /// 1-based repetition number
    #[must_use]
    pub fn instance(&self) -> u32 {
        match self {
            Element::Simple(s) => s.instance,
            Element::Complex(c) => c.instance,
        }
    }

    /// Where the element sits
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Element::Simple(s) => &s.location,
            Element::Complex(c) => &c.location,
        }
    }

    /// Value of a simple element
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Element::Simple(s) => Some(&s.value),
            Element::Complex(_) => None,
        }
    }

    /// Children of a complex element; empty for simple elements
    #[must_use]
    pub fn children(&self) -> &[Element] {
        match self {
            Element::Simple(_) => &[],
            Element::Complex(c) => &c.children,
        }
    }

    /// A simple element holding the null literal; complex elements are never null
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value().is_some_and(Value::is_null)
    }

    /// Borrow as complex element
    #[must_use]
    pub fn as_complex(&self) -> Option<&Complex> {
        match self {
            Element::Complex(c) => Some(c),
            Element::Simple(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::{Range, Usage};

    fn simple(position: u32, instance: u32, raw: &str) -> Element {
        Simple::new(
            position,
            instance,
            Location::new(format!("{position}[{instance}]"), "", 1, 1),
            Value::text(raw),
        )
        .into()
    }

    #[test]
    fn test_simple_accessors() {
        let e = simple(3, 2, "abc");
        assert_eq!(e.position(), 3);
        assert_eq!(e.instance(), 2);
        assert_eq!(e.location().path, "3[2]");
        assert_eq!(e.value(), Some(&Value::text("abc")));
        assert!(e.children().is_empty());
        assert!(e.as_complex().is_none());
        assert!(!e.is_null());
    }

    #[test]
    fn test_null_detection() {
        let e = simple(1, 1, "\"\"");
        assert!(e.is_null());

        let c: Element = Complex::new(1, 1, Location::default(), Arc::from(Vec::new())).into();
        assert!(!c.is_null());
        assert!(c.value().is_none());
    }

    #[test]
    fn test_children_by_position() {
        let mut c = Complex::new(1, 1, Location::default(), Arc::from(Vec::new()));
        c.add_child(simple(2, 1, "a"))
            .add_child(simple(1, 1, "b"))
            .add_child(simple(2, 2, "c"));

        let groups = c.children_by_position();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&1].len(), 1);
        let second: Vec<u32> = groups[&2].iter().map(|e| e.instance()).collect();
        assert_eq!(second, vec![1, 2]);
    }

    #[test]
    fn test_req_lookup() {
        let one = Range::bounded(1, 1).unwrap();
        let reqs: Arc<[Req]> = Arc::from(vec![Req::new(1, Usage::R, one), Req::new(4, Usage::O, one)]);
        let c = Complex::new(1, 1, Location::default(), reqs);
        assert!(c.req_at(4).is_some());
        assert!(c.req_at(2).is_none());
    }
}
