//! Declarative form of expressions
//!
//! An expression is stored as an attribute tree: the node name gives the
//! kind, attributes carry the parameters and children are sub-expressions.
//!
//! ```xml
//! <AND>
//!   <Presence Path="3[1]"/>
//!   <PlainText Path="3[1].1[1]" Text="MR" IgnoreCase="false"/>
//! </AND>
//! ```
//!
//! The same tree can be embedded in a YAML or JSON profile as
//! `{ name, attributes, children }`.

use crate::ast::{Expression, Operator, Pattern};
use crate::{Error, Result};
use hl7_ir::format::{self, parse_number};
use hl7_ir::{DataType, Value};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of the attribute tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprNode {
    pub name: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub children: Vec<ExprNode>,
}

impl ExprNode {
    /// Create a node without attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a child node
    #[must_use]
    pub fn child(mut self, child: ExprNode) -> Self {
        self.children.push(child);
        self
    }

    /// Read a node tree from an XML fragment with a single root element
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML, text content between elements, or
    /// a document without exactly one root element.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut open: Vec<ExprNode> = Vec::new();
        let mut root: Option<ExprNode> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => open.push(node_from(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = node_from(&e)?;
                    attach(&mut open, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = open
                        .pop()
                        .ok_or_else(|| Error::Xml("unexpected closing tag".to_string()))?;
                    attach(&mut open, &mut root, node)?;
                }
                Ok(Event::Text(text)) => {
                    let text = String::from_utf8_lossy(&text).into_owned();
                    if !text.trim().is_empty() {
                        return Err(Error::Xml(format!("unexpected text content '{}'", text.trim())));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "at position {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err(Error::Xml("unclosed element".to_string()));
        }
        root.ok_or_else(|| Error::Xml("no expression element found".to_string()))
    }

    fn required(&self, attribute: &str) -> Result<&str> {
        self.attributes
            .get(attribute)
            .map(String::as_str)
            .ok_or_else(|| Error::missing_attribute(&self.name, attribute))
    }

    fn expect_children(&self, expected: usize) -> Result<()> {
        if self.children.len() == expected {
            Ok(())
        } else {
            Err(Error::child_count(&self.name, expected, self.children.len()))
        }
    }
}

fn node_from(start: &BytesStart<'_>) -> Result<ExprNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = ExprNode::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::Xml(e.to_string()))?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(open: &mut [ExprNode], root: &mut Option<ExprNode>, node: ExprNode) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(Error::Xml("more than one root element".to_string())),
    }
    Ok(())
}

/// Build an expression from its attribute tree
///
/// # Errors
///
/// Returns an error for unknown node names, missing attributes, malformed
/// booleans, numbers, operators, types or patterns, and wrong child counts.
pub fn deserialize(node: &ExprNode) -> Result<Expression> {
    match node.name.as_str() {
        "Presence" => {
            node.expect_children(0)?;
            Ok(Expression::presence(node.required("Path")?))
        }
        "PathValue" => {
            node.expect_children(0)?;
            Ok(Expression::path_value(
                node.required("Path1")?,
                Operator::from_name(node.required("Operator")?)?,
                node.required("Path2")?,
            ))
        }
        "PlainText" => {
            node.expect_children(0)?;
            Ok(Expression::plain_text(
                node.required("Path")?,
                node.required("Text")?,
                parse_bool("IgnoreCase", node.required("IgnoreCase")?)?,
            ))
        }
        "Format" => {
            node.expect_children(0)?;
            Ok(Expression::Format {
                path: node.required("Path")?.to_string(),
                pattern: Pattern::new(node.required("Regex")?)?,
            })
        }
        "NumberList" => {
            node.expect_children(0)?;
            let numbers = split_csv(node.required("CSV")?)
                .map(|item| {
                    parse_number(item).map_err(|reason| Error::InvalidNumber {
                        value: item.to_string(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Expression::number_list(node.required("Path")?, numbers))
        }
        "StringList" => {
            node.expect_children(0)?;
            let values = split_csv(node.required("CSV")?).map(str::to_string).collect();
            Ok(Expression::string_list(node.required("Path")?, values))
        }
        "SimpleValue" => {
            node.expect_children(0)?;
            let data_type = match node.attributes.get("Type") {
                Some(name) => {
                    DataType::from_name(name).ok_or_else(|| Error::InvalidType(name.clone()))?
                }
                None => DataType::Text,
            };
            let value = literal(data_type, node.required("Value")?)?;
            Ok(Expression::simple_value(
                node.required("Path")?,
                Operator::from_name(node.required("Operator")?)?,
                value,
            ))
        }
        "AND" | "OR" | "XOR" | "IMPLY" => {
            node.expect_children(2)?;
            let left = deserialize(&node.children[0])?;
            let right = deserialize(&node.children[1])?;
            Ok(match node.name.as_str() {
                "AND" => Expression::and(left, right),
                "OR" => Expression::or(left, right),
                "XOR" => Expression::xor(left, right),
                _ => Expression::imply(left, right),
            })
        }
        "NOT" => {
            node.expect_children(1)?;
            Ok(Expression::not(deserialize(&node.children[0])?))
        }
        "EXIST" | "FORALL" => {
            node.expect_children(1)?;
            let path = node.required("Path")?;
            let inner = deserialize(&node.children[0])?;
            Ok(if node.name == "EXIST" {
                Expression::exist(path, inner)
            } else {
                Expression::for_all(path, inner)
            })
        }
        other => Err(Error::UnknownNode(other.to_string())),
    }
}

/// `true`/`1` and `false`/`0`, case-sensitive
fn parse_bool(attribute: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::InvalidBoolean {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }),
    }
}

fn split_csv(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim)
}

/// Typed literal; a malformed numeric or temporal lexeme is rejected here
/// rather than making every evaluation inconclusive
fn literal(data_type: DataType, raw: &str) -> Result<Value> {
    let value = Value::new(data_type, raw);
    match format::check(&value) {
        Some(reason) => Err(Error::InvalidLiteral {
            data_type: data_type.to_string(),
            value: raw.to_string(),
            reason,
        }),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_ignore_case() {
        let node = ExprNode::new("PlainText")
            .attr("Path", "1[1]")
            .attr("Text", "XX")
            .attr("IgnoreCase", "1");
        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::plain_text("1[1]", "XX", true)
        );

        let node = node.attr("IgnoreCase", "0");
        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::plain_text("1[1]", "XX", false)
        );
    }

    #[test]
    fn test_booleans_are_case_sensitive() {
        let node = ExprNode::new("PlainText")
            .attr("Path", "1[1]")
            .attr("Text", "XX")
            .attr("IgnoreCase", "TRUE");
        assert!(matches!(
            deserialize(&node),
            Err(Error::InvalidBoolean { .. })
        ));
    }

    #[test]
    fn test_number_list_is_trimmed() {
        let node = ExprNode::new("NumberList")
            .attr("Path", "2[1]")
            .attr("CSV", " 1 , 2.0 , 3 ");
        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::number_list("2[1]", vec![1.0, 2.0, 3.0])
        );

        let bad = ExprNode::new("NumberList").attr("Path", "2[1]").attr("CSV", "1,two");
        assert!(matches!(deserialize(&bad), Err(Error::InvalidNumber { .. })));
    }

    #[test]
    fn test_string_list_is_trimmed() {
        let node = ExprNode::new("StringList")
            .attr("Path", "2[1]")
            .attr("CSV", "A, B ,C");
        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::string_list("2[1]", vec!["A".into(), "B".into(), "C".into()])
        );
    }

    #[test]
    fn test_simple_value_type() {
        let untyped = ExprNode::new("SimpleValue")
            .attr("Path", "1")
            .attr("Operator", "EQ")
            .attr("Value", "5");
        assert_eq!(
            deserialize(&untyped).unwrap(),
            Expression::simple_value("1", Operator::Eq, Value::text("5"))
        );

        let typed = untyped.clone().attr("Type", "Number");
        assert_eq!(
            deserialize(&typed).unwrap(),
            Expression::simple_value("1", Operator::Eq, Value::new(DataType::Number, "5"))
        );

        let bad_type = untyped.clone().attr("Type", "Coded");
        assert!(matches!(deserialize(&bad_type), Err(Error::InvalidType(_))));

        let bad_literal = untyped.attr("Type", "Date").attr("Value", "2024-01-01");
        assert!(matches!(
            deserialize(&bad_literal),
            Err(Error::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            deserialize(&ExprNode::new("Exists")),
            Err(Error::UnknownNode(_))
        ));
        assert!(matches!(
            deserialize(&ExprNode::new("Presence")),
            Err(Error::MissingAttribute { .. })
        ));
        assert!(matches!(
            deserialize(&ExprNode::new("NOT")),
            Err(Error::ChildCount { expected: 1, found: 0, .. })
        ));
        let bad_op = ExprNode::new("PathValue")
            .attr("Path1", "1")
            .attr("Operator", "EQUALS")
            .attr("Path2", "2");
        assert!(matches!(deserialize(&bad_op), Err(Error::InvalidOperator(_))));
        let bad_regex = ExprNode::new("Format").attr("Path", "1").attr("Regex", "[");
        assert!(matches!(deserialize(&bad_regex), Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_from_xml() {
        let xml = r#"
            <AND>
              <Presence Path="3[1]"/>
              <NOT>
                <PlainText Path="3[1].1[1]" Text="A&amp;B" IgnoreCase="false"></PlainText>
              </NOT>
            </AND>
        "#;
        let node = ExprNode::from_xml(xml).unwrap();
        assert_eq!(node.name, "AND");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].children[0].attributes["Text"], "A&B");

        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::and(
                Expression::presence("3[1]"),
                Expression::not(Expression::plain_text("3[1].1[1]", "A&B", false)),
            )
        );
    }

    #[test]
    fn test_from_xml_errors() {
        assert!(ExprNode::from_xml("").is_err());
        assert!(ExprNode::from_xml("<AND>").is_err());
        assert!(ExprNode::from_xml("<A/><B/>").is_err());
        assert!(ExprNode::from_xml("<NOT>text</NOT>").is_err());
    }

    #[test]
    fn test_serde_tree() {
        let yaml = r#"
name: EXIST
attributes:
  Path: "4[*]"
children:
  - name: Format
    attributes:
      Path: "."
      Regex: "[0-9]+"
"#;
        let node: ExprNode = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            deserialize(&node).unwrap(),
            Expression::exist("4[*]", Expression::format(".", "[0-9]+").unwrap())
        );
    }
}
