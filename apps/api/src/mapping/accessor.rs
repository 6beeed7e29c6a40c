//! Typed accessors for stored data-source paths.
//!
//! A path such as `parsed_data.work_experiences[].company || parsed_data.basic_info.location`
//! is parsed once into an [`AccessorChain`] and then evaluated against the
//! canonical resume as JSON. `[]` marks the row boundary of a collection;
//! a bare number (`education.0.school`) or `[0]` indexes an array.

use serde_json::Value;

use crate::mapping::text::is_blank;

const ROOT_PREFIX: &str = "parsed_data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
    Each,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    segments: Vec<Segment>,
}

impl Accessor {
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = Vec::new();
        for (i, piece) in path.trim().split('.').enumerate() {
            let piece = piece.trim();
            if piece.is_empty() || (i == 0 && piece == ROOT_PREFIX) {
                continue;
            }
            let (name, brackets) = match piece.find('[') {
                Some(pos) => (&piece[..pos], &piece[pos..]),
                None => (piece, ""),
            };
            if !name.is_empty() {
                segments.push(match name.parse::<usize>() {
                    Ok(n) => Segment::Index(n),
                    Err(_) => Segment::Key(name.to_string()),
                });
            }
            for inner in brackets.split('[').skip(1) {
                let inner = inner.trim_end_matches(']').trim();
                segments.push(match inner.parse::<usize>() {
                    Ok(n) => Segment::Index(n),
                    Err(_) => Segment::Each,
                });
            }
        }
        (!segments.is_empty()).then_some(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluates from the document root. Row boundaries have no meaning here.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        walk(root, &self.segments)
    }

    /// Evaluates against one collection row: the part after `[]`, or the
    /// whole path and then its last key when the path has no boundary.
    pub fn resolve_in_row<'a>(&self, row: &'a Value) -> Option<&'a Value> {
        match self.segments.iter().position(|s| *s == Segment::Each) {
            Some(pos) => {
                let suffix = &self.segments[pos + 1..];
                if suffix.is_empty() {
                    Some(row)
                } else {
                    walk(row, suffix)
                }
            }
            None => walk(row, &self.segments).or_else(|| match self.segments.last() {
                Some(last @ Segment::Key(_)) => walk(row, std::slice::from_ref(last)),
                _ => None,
            }),
        }
    }
}

/// `a || b || c`: the first accessor that yields a non-blank value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorChain {
    accessors: Vec<Accessor>,
}

impl AccessorChain {
    pub fn parse(path: &str) -> Self {
        Self {
            accessors: path.split("||").filter_map(Accessor::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.accessors
            .iter()
            .filter_map(|a| a.resolve(root))
            .find(|v| !is_blank(v))
    }

    pub fn resolve_in_row<'a>(&self, row: &'a Value) -> Option<&'a Value> {
        self.accessors
            .iter()
            .filter_map(|a| a.resolve_in_row(row))
            .find(|v| !is_blank(v))
    }
}

fn walk<'a>(mut current: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    for segment in segments {
        current = match segment {
            Segment::Key(k) => lookup(current, k)?,
            Segment::Index(i) => current.as_array()?.get(*i)?,
            // the first row stands in for the collection outside a row context
            Segment::Each => current.as_array()?.first()?,
        };
    }
    Some(current)
}

/// Key lookup that tolerates singular/plural drift (`work_experience` vs `work_experiences`).
fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    map.get(key)
        .or_else(|| map.get(&format!("{key}s")))
        .or_else(|| key.strip_suffix('s').and_then(|k| map.get(k)))
}
