use super::{TransformMetadata, Visitor};
use crate::ast::{Expression, Segment};

/// Records declared helpers and every unqualified call site
pub struct HelperDetectionPlugin;

impl Visitor for HelperDetectionPlugin {
    fn enter(&mut self, segment: &Segment, metadata: &mut TransformMetadata) -> bool {
        if let Segment::Helper(helper) = segment {
            if !metadata.helpers_declared.insert(helper.name.clone()) {
                metadata.duplicate_helpers.push(helper.name.clone());
            }
        }
        true
    }

    fn expression(&mut self, expression: &Expression, metadata: &mut TransformMetadata) {
        if let Some(name) = unqualified_callee(expression) {
            metadata.helpers_called.insert(name.to_string());
        }
    }
}

/// Name of the function called by `name(...)`, if `expression` is such a call.
fn unqualified_callee(expression: &Expression) -> Option<&str> {
    let Expression::MethodCall(call) = expression else {
        return None;
    };
    match call.callee.as_ref() {
        Expression::VariableAccess(access) if access.is_unqualified() => Some(&access.name),
        _ => None,
    }
}
