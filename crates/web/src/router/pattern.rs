use crate::error::RouteError;

/// The name a catch-all gets when the pattern does not give one, as in `/static/*`.
pub const CATCH_ALL_NAME: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// A parsed route pattern such as `/users/:id/files/*path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Empty patterns become `/` and a missing leading slash is added.
pub(crate) fn normalize(pattern: &str) -> String {
    if pattern.is_empty() {
        "/".to_owned()
    } else if pattern.starts_with('/') {
        pattern.to_owned()
    } else {
        format!("/{pattern}")
    }
}

fn is_plain(label: &str) -> bool {
    !label.contains([':', '*'])
}

impl Pattern {
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        let raw = normalize(pattern);
        if raw == "/" {
            return Ok(Self { raw, segments: Vec::new() });
        }

        let parts = raw[1..].split('/').collect::<Vec<_>>();
        if parts.iter().filter(|part| part.starts_with('*')).count() > 1 {
            return Err(RouteError::DuplicateCatchAll { pattern: raw });
        }

        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<String> = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(RouteError::EmptySegment { pattern: raw });
            }

            let invalid = || RouteError::InvalidSegment { segment: (*part).to_owned(), pattern: raw.clone() };

            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RouteError::EmptyParamName { pattern: raw });
                }
                if !is_plain(name) {
                    return Err(invalid());
                }
                Segment::Param(name.to_owned())
            } else if let Some(name) = part.strip_prefix('*') {
                if index != last {
                    return Err(RouteError::CatchAllNotLast { pattern: raw });
                }
                if !is_plain(name) {
                    return Err(invalid());
                }
                Segment::CatchAll(if name.is_empty() { CATCH_ALL_NAME } else { name }.to_owned())
            } else {
                if !is_plain(part) {
                    return Err(invalid());
                }
                Segment::Static((*part).to_owned())
            };

            if let Segment::Param(name) | Segment::CatchAll(name) = &segment {
                if names.contains(name) {
                    return Err(RouteError::DuplicateParam { name: name.clone(), pattern: raw });
                }
                names.push(name.clone());
            }

            segments.push(segment);
        }

        Ok(Self { raw, segments })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in declaration order.
    pub(crate) fn param_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) | Segment::CatchAll(name) => Some(name.clone()),
                Segment::Static(_) => None,
            })
            .collect()
    }
}
