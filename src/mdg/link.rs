//! Links and lexical path handling
//!
//! Documents are addressed by slash separated reference paths ("/guide/intro"). A [`Link`]
//! targets either a whole document, an anchor inside a document, or a global tag. Tags are
//! absolute anchors without a document part ("#/figures/main").
//!
//! The path helpers mirror plain lexical path handling: no file system access, `..` above the
//! root is dropped.

use std::fmt;

/// Address of a referencable element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Link {
    path: String,
    anchor: String,
    tag: String,
}

impl Link {
    pub fn new(path: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            anchor: anchor.into(),
            tag: String::new(),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Parses `path`, `path#anchor`, `#anchor` or `#/tag`.
    ///
    /// With `as_anchor` a string without `#` is taken as an anchor instead of a path.
    pub fn parse(link: &str, as_anchor: bool) -> Result<Self, String> {
        let comps: Vec<&str> = link.split('#').collect();
        if comps.len() > 2 {
            return Err(format!("invalid link target {:?}", link));
        }
        let (p, a) = match comps.as_slice() {
            [only] if as_anchor => ("", *only),
            [only] => {
                if only.is_empty() {
                    return Err(format!("invalid link target {:?}", link));
                }
                return Ok(Self::new(*only, ""));
            }
            [p, a] => (*p, *a),
            _ => return Err(format!("invalid link target {:?}", link)),
        };
        if p.is_empty() {
            if is_abs(a) {
                Ok(Self::tag(a))
            } else {
                Ok(Self::new("", a))
            }
        } else if is_abs(a) {
            Err(format!("invalid absolute anchor {:?} (path not possible)", a))
        } else {
            Ok(Self::new(p, a))
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.tag.is_empty() || !self.anchor.is_empty() || !self.path.is_empty()
    }

    pub fn is_tag(&self) -> bool {
        !self.tag.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The anchor, or the tag for tag links.
    pub fn anchor(&self) -> &str {
        if self.tag.is_empty() {
            &self.anchor
        } else {
            &self.tag
        }
    }

    /// Makes the link absolute relative to the document `base`.
    ///
    /// A bare anchor only receives the base path if `global` is set, so that local lookups
    /// still see it as document relative.
    pub fn abs(&self, base: &str, global: bool) -> Result<Self, String> {
        if self.is_tag() || is_abs(&self.path) {
            return Ok(self.clone());
        }
        let mut r = Self::new(if global { base } else { "" }, self.anchor.clone());
        if !self.path.is_empty() {
            let b = base.strip_prefix('/').unwrap_or(base);
            if join(&dir(b), &self.path).starts_with('.') {
                return Err(format!("link {:?} outside of tree {:?}", self.path, base));
            }
            r.path = join(&dir(base), &self.path);
        }
        Ok(r)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tag.is_empty() {
            write!(f, "#{}", self.tag)
        } else if self.anchor.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}#{}", self.path, self.anchor)
        }
    }
}

pub fn is_abs(p: &str) -> bool {
    p.starts_with('/')
}

/// Lexically normalizes a slash separated path.
pub fn clean(p: &str) -> String {
    if p.is_empty() {
        return ".".to_string();
    }
    let rooted = is_abs(p);
    let mut out: Vec<&str> = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if rooted => {}
                _ => out.push(".."),
            },
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Joins path elements, ignoring empty ones, and cleans the result.
pub fn join(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean(b),
        (false, true) => clean(a),
        (false, false) => clean(&format!("{}/{}", a, b)),
    }
}

pub fn dir(p: &str) -> String {
    match p.rfind('/') {
        Some(i) => clean(&p[..=i]),
        None => ".".to_string(),
    }
}

pub fn base(p: &str) -> String {
    let trimmed = p.trim_end_matches('/');
    if trimmed.is_empty() {
        return if p.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Relative path leading from directory `from` to `to`. Both must be absolute.
pub fn relative(from: &str, to: &str) -> String {
    let from = clean(from);
    let to = clean(to);
    let f: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let t: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let common = f.iter().zip(t.iter()).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = vec![".."; f.len() - common];
    parts.extend_from_slice(&t[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest(
        input,
        expected,
        case("/a/b/../c", "/a/c"),
        case("a/./b/", "a/b"),
        case("/../a", "/a"),
        case("../a", "../a"),
        case("", ".")
    )]
    fn test_clean(input: &str, expected: &str) {
        assert_eq!(clean(input), expected);
    }

    #[test]
    fn test_parse_link_forms() {
        assert_eq!(Link::parse("/doc#sec", false).unwrap(), Link::new("/doc", "sec"));
        assert_eq!(Link::parse("#sec", false).unwrap(), Link::new("", "sec"));
        assert_eq!(Link::parse("#/fig", false).unwrap(), Link::tag("/fig"));
        assert_eq!(Link::parse("other", false).unwrap(), Link::new("other", ""));
        assert_eq!(Link::parse("sec", true).unwrap(), Link::new("", "sec"));
        assert!(Link::parse("a#b#c", false).is_err());
        assert!(Link::parse("doc#/abs", false).is_err());
    }

    #[test]
    fn test_abs_link() {
        let l = Link::parse("sub/other#x", false).unwrap();
        assert_eq!(l.abs("/guide/intro", false).unwrap(), Link::new("/guide/sub/other", "x"));

        let local = Link::new("", "x");
        assert_eq!(local.abs("/guide/intro", false).unwrap(), Link::new("", "x"));
        assert_eq!(local.abs("/guide/intro", true).unwrap(), Link::new("/guide/intro", "x"));

        assert!(Link::new("../../x", "").abs("/guide/intro", false).is_err());
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("/a/b", "/a/c/d.md"), "../c/d.md");
        assert_eq!(relative("/", "/x.md"), "x.md");
        assert_eq!(relative("/a", "/a"), ".");
        assert_eq!(dir("/a/b"), "/a");
        assert_eq!(base("/a/b"), "b");
    }
}
