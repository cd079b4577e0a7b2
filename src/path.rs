//! Hierarchy path parsing
//!
//! Body trackers report joints with flat names whose segments encode the
//! ancestry root-to-leaf, e.g. `hips_joint/spine_1_joint/spine_2_joint`.

/// Separator between hierarchy segments
pub const DELIMITER: char = '/';

/// A joint name split into its ordered hierarchy segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyPath<'a> {
    segments: Vec<&'a str>,
}

impl<'a> HierarchyPath<'a> {
    /// Split a joint name on [`DELIMITER`].
    ///
    /// Empty input yields a single empty segment.
    pub fn parse(name: &'a str) -> Self {
        Self {
            segments: name.split(DELIMITER).collect(),
        }
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Number of segments (never zero)
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// First segment: the name of the joint at the top of this path
    pub fn first(&self) -> &'a str {
        self.segments.first().copied().unwrap_or_default()
    }

    /// Last segment: the joint's own name
    pub fn leaf(&self) -> &'a str {
        self.segments.last().copied().unwrap_or_default()
    }

    /// Name of the immediate ancestor, or `root_name` for single-segment paths
    pub fn ancestor_name<'r>(&self, root_name: &'r str) -> &'r str
    where
        'a: 'r,
    {
        if self.depth() >= 2 {
            self.segments[self.depth() - 2]
        } else {
            root_name
        }
    }
}

/// Ordered segments of a joint name
pub fn segments(name: &str) -> Vec<&str> {
    HierarchyPath::parse(name).segments
}

/// Number of segments in a joint name
pub fn depth(name: &str) -> usize {
    HierarchyPath::parse(name).depth()
}

/// Immediate ancestor of a joint name, falling back to `root_name`
pub fn ancestor_name<'r>(name: &'r str, root_name: &'r str) -> &'r str {
    HierarchyPath::parse(name).ancestor_name(root_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_in_order() {
        assert_eq!(segments("root/arm/hand"), vec!["root", "arm", "hand"]);
        assert_eq!(depth("root/arm/hand"), 3);
    }

    #[test]
    fn test_empty_name_is_single_empty_segment() {
        assert_eq!(segments(""), vec![""]);
        assert_eq!(depth(""), 1);
    }

    #[test]
    fn test_ancestor_name() {
        assert_eq!(ancestor_name("root/arm/hand", "root"), "arm");
        assert_eq!(ancestor_name("root/arm", "root"), "root");
        assert_eq!(ancestor_name("lonely", "root"), "root");
    }

    #[test]
    fn test_leaf_and_first() {
        let path = HierarchyPath::parse("hips_joint/spine_1_joint/spine_2_joint");
        assert_eq!(path.first(), "hips_joint");
        assert_eq!(path.leaf(), "spine_2_joint");
    }
}
