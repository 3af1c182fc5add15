use super::{TransformMetadata, Visitor};
use crate::ast::Segment;

/// Records declared sections
pub struct SectionDetectionPlugin;

impl Visitor for SectionDetectionPlugin {
    fn enter(&mut self, segment: &Segment, metadata: &mut TransformMetadata) -> bool {
        if let Segment::Section(section) = segment {
            if !metadata.sections_declared.insert(section.name.clone()) {
                metadata.duplicate_sections.push(section.name.clone());
            }
        }
        true
    }
}
