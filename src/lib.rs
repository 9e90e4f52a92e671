//! # mdg-core
//!
//! Label numbering and cross-document resolution for the mdg multi-document markup compiler.
//!
//! Documents are added to a [`mdg::Tree`] (usually from YAML descriptions, see
//! [`mdg::source`]) and resolved in one run. The resulting [`mdg::Resolution`] provides the
//! bound labels, titles and links of every labeled node.
//!
//! ```text
//! let mut tree = Tree::new(Options::default());
//! tree.add_yaml("/guide", GUIDE)?;
//! let res = tree.resolve()?;
//! res.label_for("/guide", "#intro");
//! ```

pub mod mdg;
