//! Position paths and their resolution against the instance tree
//!
//! A path is a dot-separated list of steps `position[instance]`, relative to a
//! context element: `3[1].2[*]` selects every occurrence of component 2
//! inside the first occurrence of field 3. The instance is a 1-based number or `*`; a
//! step without brackets selects every instance. The empty path (or `.`)
//! selects the context element itself.

use crate::element::Element;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Which repetitions a step selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    /// One repetition (1-based)
    Nth(u32),
    /// Every repetition
    All,
}

/// One step of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub position: u32,
    pub instance: Instance,
}

impl Step {
    /// Whether an element is selected by this step
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        element.position() == self.position
            && match self.instance {
                Instance::Nth(n) => element.instance() == n,
                Instance::All => true,
            }
    }
}

/// A parsed position path
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// Parse a path such as `2[1].5[*].1`
    ///
    /// # Errors
    ///
    /// Returns an error for empty steps, non-numeric or zero positions,
    /// unclosed brackets and invalid instances.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::default());
        }

        let steps = trimmed
            .split('.')
            .map(|step| parse_step(path, step))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { steps })
    }

    /// The steps of this path
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the path designates the context element itself
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every descendant of `context` selected by this path, in tree order
    #[must_use]
    pub fn resolve<'a>(&self, context: &'a Element) -> Vec<&'a Element> {
        let mut current = vec![context];
        for step in &self.steps {
            current = current
                .into_iter()
                .flat_map(|element| element.children().iter().filter(|c| step.matches(c)))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

fn parse_step(path: &str, step: &str) -> Result<Step> {
    let step = step.trim();
    if step.is_empty() {
        return Err(Error::invalid_path(path, "empty step"));
    }

    let (position, instance) = match step.find('[') {
        Some(open) => {
            let close = step
                .strip_suffix(']')
                .ok_or_else(|| Error::invalid_path(path, format!("unclosed bracket in '{step}'")))?;
            (&step[..open], Some(&close[open + 1..]))
        }
        None => (step, None),
    };

    let position: u32 = position
        .parse()
        .map_err(|_| Error::invalid_path(path, format!("invalid position in '{step}'")))?;
    if position == 0 {
        return Err(Error::invalid_path(path, "positions are 1-based"));
    }

    let instance = match instance {
        None | Some("*") => Instance::All,
        Some(n) => match n.parse::<u32>() {
            Ok(0) => return Err(Error::invalid_path(path, "instances are 1-based")),
            Ok(n) => Instance::Nth(n),
            Err(_) => {
                return Err(Error::invalid_path(
                    path,
                    format!("invalid instance in '{step}'"),
                ));
            }
        },
    };

    Ok(Step { position, instance })
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str(".");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match step.instance {
                Instance::Nth(n) => write!(f, "{}[{n}]", step.position)?,
                Instance::All => write!(f, "{}[*]", step.position)?,
            }
        }
        Ok(())
    }
}

/// Parse `path` and resolve it against `context`
///
/// # Errors
///
/// Returns an error when the path is malformed.
pub fn resolve<'a>(context: &'a Element, path: &str) -> Result<Vec<&'a Element>> {
    Ok(Path::parse(path)?.resolve(context))
}
