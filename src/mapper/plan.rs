use super::tag::FieldTag;
use crate::core::Property;

/// One mapped field of a record type, resolved once per type.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    ident: &'static str,
    name: String,
    tag: FieldTag,
}

impl FieldPlan {
    pub fn new(ident: &'static str, tag: &str) -> Self {
        let tag = FieldTag::parse(tag);
        let name = tag.property_name(ident);
        Self { ident, name, tag }
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &FieldTag {
        &self.tag
    }

    /// Hydration-only fields are decoded but never encoded.
    pub fn is_hydration_only(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn property(&self, prefix: &str) -> Property {
        Property::with_prefix(prefix, self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_resolves_names() {
        let plan = FieldPlan::new("CardLast4", "");
        assert_eq!(plan.name(), "card_last4");
        assert!(!plan.is_hydration_only());

        let hydrated = FieldPlan::new("created", "_created");
        assert!(hydrated.is_hydration_only());
        assert_eq!(hydrated.property("audit").to_string(), "audit._created");
    }
}
